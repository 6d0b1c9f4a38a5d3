//! Server bootstrap over real sockets.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;

use sitecheck::WebServerConfig;
use sitecheck_cli::{ensure_web_server, WebServerHandle};

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn site() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("index.html"),
        "<html><head><title>Test Website</title></head><body><h1>Test Website</h1></body></html>",
    )
    .unwrap();
    std::fs::write(dir.path().join("script.js"), "console.log('ready');").unwrap();
    dir
}

fn server_config(dir: &Path, port: u16, reuse: bool) -> WebServerConfig {
    WebServerConfig {
        directory: dir.to_path_buf(),
        port,
        url: format!("http://127.0.0.1:{port}/"),
        reuse_existing_server: reuse,
        startup_timeout_ms: 5_000,
    }
}

#[tokio::test]
async fn test_starts_and_serves_page() {
    let dir = site();
    let port = free_port();
    let handle = ensure_web_server(&server_config(dir.path(), port, false))
        .await
        .unwrap();
    assert!(handle.is_started());

    let body = reqwest::get(format!("http://127.0.0.1:{port}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("Test Website"));

    let script = reqwest::get(format!("http://127.0.0.1:{port}/script.js"))
        .await
        .unwrap();
    assert_eq!(script.headers()["content-type"], "text/javascript");
    assert_eq!(script.headers()["cache-control"], "no-cache");
}

#[tokio::test]
async fn test_reuses_running_server_when_allowed() {
    let dir = site();
    let port = free_port();
    let _first = ensure_web_server(&server_config(dir.path(), port, true))
        .await
        .unwrap();

    let second = ensure_web_server(&server_config(dir.path(), port, true))
        .await
        .unwrap();
    assert!(matches!(second, WebServerHandle::Reused { .. }));
}

#[tokio::test]
async fn test_busy_url_is_an_error_without_reuse() {
    let dir = site();
    let port = free_port();
    let _first = ensure_web_server(&server_config(dir.path(), port, false))
        .await
        .unwrap();

    let err = ensure_web_server(&server_config(dir.path(), port, false))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already used"));
}

#[tokio::test]
async fn test_shipped_page_keeps_its_contract() {
    let public = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../public"));
    let port = free_port();
    let _server = ensure_web_server(&server_config(public, port, false))
        .await
        .unwrap();

    let html = reqwest::get(format!("http://127.0.0.1:{port}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let title = regex::Regex::new(r"<title>[^<]*Test Website[^<]*</title>").unwrap();
    assert!(title.is_match(&html));
    assert!(html.contains("<h1>Test Website</h1>"));
    assert!(html.contains(r#"id="actionButton""#));
    assert!(html.contains(r#"id="message""#));
    assert!(html.contains(r#"<script src="script.js">"#));

    let script = reqwest::get(format!("http://127.0.0.1:{port}/script.js"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(script.contains("'Button clicked!'"));
    assert!(script.contains("getElementById('actionButton')"));
    assert!(script.contains("getElementById('message')"));
}
