use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;

use recclient::capture::synthetic::SyntheticBackend;
use recclient::session::{
    Phase, Session, SessionUpdate, UPLOAD_CANCELLED_MESSAGE, UPLOAD_OK_MESSAGE,
};
use recclient::{ApiClient, Gallery};

mod common;

use common::spawn_server;

async fn record_one_chunk(session: &mut Session) {
    session.start().await.unwrap();
    loop {
        if let Some(SessionUpdate::Chunk(n)) = session.next_event().await {
            if n > 0 {
                break;
            }
        }
    }
    session.stop().await.unwrap();
}

#[tokio::test]
async fn test_record_upload_and_browse() {
    let server = spawn_server().await;
    let client = ApiClient::new(format!("http://{}", server.addr));
    let mut gallery = Gallery::new(3);

    let backend = SyntheticBackend::new();
    let mut session = Session::new(Arc::new(backend.clone()));
    record_one_chunk(&mut session).await;
    assert_eq!(session.phase(), Phase::Stopped);
    assert!(backend.issued_tracks().iter().all(|t| !t.is_live()));

    let blob = session.recorded().unwrap().blob.clone();
    let recording = session.upload(&client, &mut gallery).await.unwrap();

    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(session.status(), Some(UPLOAD_OK_MESSAGE));
    assert!(session.previews().is_empty());
    assert!(recording.filename.contains("-recording-"));
    assert!(recording.filename.ends_with(".webm"));
    assert_eq!(recording.size, blob.len() as i64);

    assert_eq!(gallery.recordings().len(), 1);
    assert_eq!(gallery.recordings()[0], recording);
    assert!(gallery.error().is_none());

    let fetched = client.fetch_blob(&recording).await.unwrap();
    assert_eq!(fetched, blob.data);
    assert_eq!(client.get(recording.id).await.unwrap(), recording);
}

#[tokio::test]
async fn test_three_uploads_fill_one_page() {
    let server = spawn_server().await;
    let client = ApiClient::new(format!("http://{}", server.addr));
    let mut gallery = Gallery::new(3);
    let mut session = Session::new(Arc::new(SyntheticBackend::new()));

    let mut uploaded = Vec::new();
    for _ in 0..3 {
        record_one_chunk(&mut session).await;
        uploaded.push(session.upload(&client, &mut gallery).await.unwrap());
    }

    let view = gallery.view(client.base_url());
    assert_eq!(view.page, 1);
    assert_eq!(view.total_pages, 1);
    assert!(!view.has_prev);
    assert!(!view.has_next);
    assert_eq!(view.items.len(), 3);
    // newest first
    assert_eq!(view.items[0].recording, uploaded[2]);
    assert_eq!(view.items[2].recording, uploaded[0]);
    assert_eq!(
        view.items[0].stream_url,
        format!("http://{}{}", server.addr, uploaded[2].url)
    );
}

#[tokio::test]
async fn test_gallery_keeps_list_when_server_is_gone() {
    let server = spawn_server().await;
    let client = ApiClient::new(format!("http://{}", server.addr));
    let mut gallery = Gallery::default();
    let mut session = Session::new(Arc::new(SyntheticBackend::new()));
    record_one_chunk(&mut session).await;
    session.upload(&client, &mut gallery).await.unwrap();
    assert_eq!(gallery.recordings().len(), 1);

    let unreachable = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        ApiClient::new(format!("http://{}", listener.local_addr().unwrap()))
    };
    gallery.refresh(&unreachable).await;
    assert!(gallery.error().is_some());
    assert!(!gallery.is_loading());
    assert_eq!(gallery.recordings().len(), 1);
}

#[tokio::test]
async fn test_cancelled_upload_can_be_retried() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent = ApiClient::new(format!("http://{}", listener.local_addr().unwrap()));
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut gallery = Gallery::default();
    let mut session = Session::new(Arc::new(SyntheticBackend::new()));
    record_one_chunk(&mut session).await;
    let preview = session.recorded().unwrap().preview.clone();

    let res = timeout(
        Duration::from_millis(300),
        session.upload(&silent, &mut gallery),
    )
    .await;
    assert!(res.is_err());
    assert_eq!(session.phase(), Phase::Stopped);
    assert_eq!(session.status(), Some(UPLOAD_CANCELLED_MESSAGE));
    assert_eq!(session.recorded().unwrap().preview, preview);
    assert_eq!(session.previews().len(), 1);

    let server = spawn_server().await;
    let client = ApiClient::new(format!("http://{}", server.addr));
    let recording = session.upload(&client, &mut gallery).await.unwrap();
    assert_eq!(session.phase(), Phase::Idle);
    assert!(session.previews().is_empty());
    assert_eq!(gallery.recordings(), &[recording]);
}
