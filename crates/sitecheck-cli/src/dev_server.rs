//! Static page server
//!
//! Serves a directory (by default `public/`) with correct MIME types and
//! `Cache-Control: no-cache`, so every test run sees the files as they are on
//! disk. Directory requests fall back to their `index.html`.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               DevServer                 │
//! │  GET /            ──► index.html        │
//! │  GET /script.js   ──► text/javascript   │
//! │  GET /styles.css  ──► text/css          │
//! │  GET /../secret   ──► 404               │
//! └─────────────────────────────────────────┘
//! ```

use axum::{
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::set_header::SetResponseHeaderLayer;

/// Static server configuration
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Directory to serve static files from
    pub directory: PathBuf,
    /// HTTP port
    pub port: u16,
    /// Interface to bind
    pub host: IpAddr,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("public"),
            port: 3000,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        }
    }
}

impl DevServerConfig {
    /// Create a builder
    #[must_use]
    pub fn builder() -> DevServerConfigBuilder {
        DevServerConfigBuilder::default()
    }

    /// Socket address to bind
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Builder for [`DevServerConfig`]
#[derive(Debug, Default)]
pub struct DevServerConfigBuilder {
    config: DevServerConfig,
}

impl DevServerConfigBuilder {
    /// Set the directory to serve
    #[must_use]
    pub fn directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.directory = dir.into();
        self
    }

    /// Set the port
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the interface to bind
    #[must_use]
    pub const fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> DevServerConfig {
        self.config
    }
}

/// Static file server
#[derive(Debug, Clone)]
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a server
    #[must_use]
    pub const fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &DevServerConfig {
        &self.config
    }

    /// Get the HTTP URL
    #[must_use]
    pub fn http_url(&self) -> String {
        format!("http://localhost:{}", self.config.port)
    }

    /// Router serving the configured directory
    #[must_use]
    pub fn router(&self) -> Router {
        let directory = Arc::new(self.config.directory.clone());
        Router::new()
            .route(
                "/",
                get({
                    let dir = directory.clone();
                    move || serve_index(dir.clone())
                }),
            )
            .fallback({
                let dir = directory;
                move |uri: Uri| serve_static(dir.clone(), uri)
            })
            .layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                header::HeaderValue::from_static("no-cache"),
            ))
    }

    /// Start the server and block until it stops
    pub async fn run(&self) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.config.addr()).await?;

        println!("╔══════════════════════════════════════════════════════════════╗");
        println!("║                  sitecheck static server                     ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║  HTTP:      http://localhost:{:<32}║", self.config.port);
        println!(
            "║  Directory: {:<49}║",
            self.config
                .directory
                .display()
                .to_string()
                .chars()
                .take(49)
                .collect::<String>()
        );
        println!("╠══════════════════════════════════════════════════════════════╣");
        println!("║  Press Ctrl+C to stop                                        ║");
        println!("╚══════════════════════════════════════════════════════════════╝");

        tracing::info!(addr = %self.config.addr(), dir = %self.config.directory.display(), "serving");
        axum::serve(listener, self.router()).await
    }

    /// Bind and serve in a background task
    pub async fn spawn(&self) -> Result<RunningServer, std::io::Error> {
        let listener = TcpListener::bind(self.config.addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "static server stopped");
            }
        });
        tracing::info!(%addr, dir = %self.config.directory.display(), "static server started");
        Ok(RunningServer { addr, task })
    }
}

/// Server running in a background task; stopped when dropped
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// Bound address
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop serving
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve_index(directory: Arc<PathBuf>) -> Response {
    serve_file(&directory.join("index.html")).await
}

/// Serve a file below `directory`; directories serve their `index.html`
async fn serve_static(directory: Arc<PathBuf>, uri: Uri) -> Response {
    let Some(relative) = safe_relative_path(uri.path()) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };
    let file_path = directory.join(relative);

    if file_path.is_dir() {
        let index_path = file_path.join("index.html");
        if index_path.exists() {
            return serve_file(&index_path).await;
        }
    }

    serve_file(&file_path).await
}

/// Request path as a relative path that cannot leave the served directory
fn safe_relative_path(request_path: &str) -> Option<PathBuf> {
    let path = Path::new(request_path.trim_start_matches('/'));
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

async fn serve_file(path: &Path) -> Response {
    match tokio::fs::read(path).await {
        Ok(contents) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, get_mime_type(path))
            .body(axum::body::Body::from(contents))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error reading file: {e}"),
        )
            .into_response(),
    }
}

/// Get MIME type for a file path
#[must_use]
pub fn get_mime_type(path: &Path) -> String {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js" | "mjs") => "text/javascript".to_string(),
        Some("html" | "htm") => "text/html; charset=utf-8".to_string(),
        Some("css") => "text/css".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string(),
    }
}
