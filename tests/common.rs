use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use recserver::config::Config;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub async fn shutdown_signal() {
    let _str = utils::signal::wait_for_stop_signal().await;
}

/// A running server backed by a throwaway database and upload dir
pub struct TestServer {
    pub addr: SocketAddr,
    pub dir: TempDir,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn uploads(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }
}

pub async fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}).await
}

pub async fn spawn_server_with(configure: impl FnOnce(&mut Config)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();

    let mut cfg = Config::default();
    cfg.database.url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("screenrec.db").display()
    );
    cfg.storage.root = dir.path().join("uploads").to_str().unwrap().to_string();
    configure(&mut cfg);

    let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(recserver::serve(cfg, listener, shutdown_signal()));

    TestServer { addr, dir }
}

pub async fn upload(server: &TestServer, name: &str, data: impl Into<Vec<u8>>) -> reqwest::Response {
    let part = reqwest::multipart::Part::bytes(data.into())
        .file_name(name.to_string())
        .mime_str("video/webm")
        .unwrap();
    let form = reqwest::multipart::Form::new().part(api::path::UPLOAD_FIELD, part);
    reqwest::Client::new()
        .post(server.url(api::path::RECORDINGS))
        .multipart(form)
        .send()
        .await
        .unwrap()
}
