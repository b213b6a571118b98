use futures_util::future::join_all;
use http::{header, StatusCode};

use api::recording::Recording;
use api::response::ErrorBody;

mod common;

use common::{spawn_server, spawn_server_with, upload};

#[tokio::test]
async fn test_empty_list() {
    let server = spawn_server().await;

    let res = reqwest::get(server.url(api::path::RECORDINGS)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    let body = res.json::<Vec<Recording>>().await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_upload_and_get_round_trip() {
    let server = spawn_server().await;
    let data: &'static [u8] = b"\x1a\x45\xdf\xa3 not really webm but close enough";

    let res = upload(&server, "recording-2024-01-01T00-00-00-000Z.webm", data).await;
    assert_eq!(StatusCode::OK, res.status());
    let created = res.json::<Recording>().await.unwrap();
    assert_eq!(created.size, data.len() as i64);
    assert!(created
        .filename
        .ends_with("-recording-2024-01-01T00-00-00-000Z.webm"));
    assert_eq!(created.url, api::path::upload(&created.filename));
    assert!(server.uploads().join(&created.filename).is_file());

    let res = reqwest::get(server.url(&api::path::recording(created.id)))
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, res.status());
    let fetched = res.json::<Recording>().await.unwrap();
    assert_eq!(fetched, created);

    let res = reqwest::get(server.url(&fetched.url)).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!(res.headers()[header::CONTENT_TYPE], "video/webm");
    assert_eq!(res.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(&res.bytes().await.unwrap()[..], data);
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let server = spawn_server().await;

    let mut ids = Vec::new();
    for name in ["a.webm", "b.webm", "c.webm"] {
        let res = upload(&server, name, b"payload").await;
        ids.push(res.json::<Recording>().await.unwrap().id);
    }

    let body = reqwest::get(server.url(api::path::RECORDINGS))
        .await
        .unwrap()
        .json::<Vec<Recording>>()
        .await
        .unwrap();
    let listed: Vec<i64> = body.iter().map(|r| r.id).collect();
    ids.reverse();
    assert_eq!(listed, ids);
    assert!(body[0].filename.ends_with("-c.webm"));
}

#[tokio::test]
async fn test_unsafe_names_are_sanitized() {
    let server = spawn_server().await;

    let res = upload(&server, "../my video (1).webm", b"x").await;
    assert_eq!(StatusCode::OK, res.status());
    let created = res.json::<Recording>().await.unwrap();
    let (prefix, rest) = created.filename.split_once('-').unwrap();
    assert!(prefix.chars().all(|c| c.is_ascii_digit()));
    assert!(rest
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')));
    assert!(!created.filename.contains('/'));
    assert!(server.uploads().join(&created.filename).is_file());
}

#[tokio::test]
async fn test_upload_without_file_is_rejected() {
    let server = spawn_server().await;

    let form = reqwest::multipart::Form::new().text("note", "nothing here");
    let res = reqwest::Client::new()
        .post(server.url(api::path::RECORDINGS))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    let body = res.json::<ErrorBody>().await.unwrap();
    assert_eq!(body.error, "No file uploaded");

    let res = reqwest::Client::new()
        .post(server.url(api::path::RECORDINGS))
        .body("plain text")
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::BAD_REQUEST, res.status());
    assert!(res.json::<ErrorBody>().await.is_ok());

    let body = reqwest::get(server.url(api::path::RECORDINGS))
        .await
        .unwrap()
        .json::<Vec<Recording>>()
        .await
        .unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_upload_over_size_limit_is_rejected() {
    let server = spawn_server_with(|cfg| cfg.upload.max_size = Some(1024)).await;

    let res = upload(&server, "big.webm", vec![7u8; 8 * 1024]).await;
    assert!(!res.status().is_success(), "{}", res.status());

    let body = reqwest::get(server.url(api::path::RECORDINGS))
        .await
        .unwrap()
        .json::<Vec<Recording>>()
        .await
        .unwrap();
    assert!(body.is_empty());
    assert_eq!(std::fs::read_dir(server.uploads()).unwrap().count(), 0);

    let res = upload(&server, "small.webm", &b"fits"[..]).await;
    assert_eq!(StatusCode::OK, res.status());
}

#[tokio::test]
async fn test_missing_records_and_blobs() {
    let server = spawn_server().await;

    for path in [api::path::recording(42), "/api/recordings/abc".to_string()] {
        let res = reqwest::get(server.url(&path)).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status());
        let body = res.json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Not found");
    }

    for path in ["/uploads/nope.webm", "/uploads/..%2Fscreenrec.db"] {
        let res = reqwest::get(server.url(path)).await.unwrap();
        assert_eq!(StatusCode::NOT_FOUND, res.status(), "{path}");
        let body = res.json::<ErrorBody>().await.unwrap();
        assert_eq!(body.error, "Not found");
    }
}

#[tokio::test]
async fn test_range_requests() {
    let server = spawn_server().await;
    let created = upload(&server, "r.webm", b"0123456789")
        .await
        .json::<Recording>()
        .await
        .unwrap();
    let client = reqwest::Client::new();
    let url = server.url(&created.url);

    let res = client
        .get(&url)
        .header(header::RANGE, "bytes=2-5")
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::PARTIAL_CONTENT, res.status());
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(&res.bytes().await.unwrap()[..], b"2345");

    let res = client
        .get(&url)
        .header(header::RANGE, "bytes=-3")
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::PARTIAL_CONTENT, res.status());
    assert_eq!(&res.bytes().await.unwrap()[..], b"789");

    let res = client
        .get(&url)
        .header(header::RANGE, "bytes=20-")
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, res.status());
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes */10");

    let res = client
        .get(&url)
        .header(header::RANGE, "bytes=0-1,4-5")
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, res.status());
    assert_eq!(res.headers()[header::CONTENT_RANGE], "bytes */10");
}

#[tokio::test]
async fn test_concurrent_uploads_do_not_collide() {
    let server = spawn_server().await;

    let uploads = (0..5).map(|_| upload(&server, "same.webm", b"same bytes"));
    let responses = join_all(uploads).await;
    for res in &responses {
        assert_eq!(StatusCode::OK, res.status());
    }

    let body = reqwest::get(server.url(api::path::RECORDINGS))
        .await
        .unwrap()
        .json::<Vec<Recording>>()
        .await
        .unwrap();
    assert_eq!(body.len(), 5);
    let mut names: Vec<_> = body.iter().map(|r| r.filename.clone()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 5);
    for name in &names {
        assert!(server.uploads().join(name).is_file());
    }
}
