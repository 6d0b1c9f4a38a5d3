//! Web server bootstrap for a test run.
//!
//! Before the suite starts, the configured URL is probed. A server already
//! answering there is reused when the configuration allows it and is an error
//! otherwise. When nothing answers, the static server is started in-process
//! and polled until it responds or the startup timeout elapses.

use std::time::{Duration, Instant};

use sitecheck::WebServerConfig;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::dev_server::{DevServer, DevServerConfig, RunningServer};
use crate::error::{CliError, CliResult};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Server backing a test run
#[derive(Debug)]
pub enum WebServerHandle {
    /// A server that was already running
    Reused {
        /// URL it answered on
        url: String,
    },
    /// Started for this run; stops when dropped
    Started(RunningServer),
}

impl WebServerHandle {
    /// Whether the server was started by this process
    #[must_use]
    pub const fn is_started(&self) -> bool {
        matches!(self, Self::Started(_))
    }
}

fn client() -> CliResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(PROBE_TIMEOUT)
        .build()
        .map_err(|e| CliError::web_server(format!("cannot build HTTP client: {e}")))
}

/// Whether something answers `url` with a success or redirect status
pub async fn is_reachable(client: &reqwest::Client, url: &str) -> bool {
    match client.get(url).send().await {
        Ok(resp) => {
            let status = resp.status();
            if !(status.is_success() || status.is_redirection()) {
                debug!(%url, %status, "probe answered with an error status");
            }
            status.is_success() || status.is_redirection()
        }
        Err(e) => {
            if !e.is_connect() {
                debug!(%url, error = %e, "probe failed");
            }
            false
        }
    }
}

/// Reuse or start the server described by `config`
pub async fn ensure_web_server(config: &WebServerConfig) -> CliResult<WebServerHandle> {
    let client = client()?;

    if is_reachable(&client, &config.url).await {
        if config.reuse_existing_server {
            info!(url = %config.url, "reusing running web server");
            return Ok(WebServerHandle::Reused {
                url: config.url.clone(),
            });
        }
        return Err(CliError::web_server(format!(
            "{} is already used, make sure that nothing is running on port {} or enable server reuse",
            config.url, config.port
        )));
    }

    if !config.directory.is_dir() {
        return Err(CliError::web_server(format!(
            "cannot serve {}: not a directory",
            config.directory.display()
        )));
    }

    let server = DevServer::new(
        DevServerConfig::builder()
            .directory(&config.directory)
            .port(config.port)
            .build(),
    );
    let running = server.spawn().await.map_err(|e| {
        CliError::web_server(format!("cannot bind port {}: {e}", config.port))
    })?;

    wait_for_ready(&client, &config.url, config.startup_timeout()).await?;
    info!(url = %config.url, "web server ready");
    Ok(WebServerHandle::Started(running))
}

/// Poll `url` until it answers or `timeout` elapses
pub async fn wait_for_ready(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> CliResult<()> {
    let start = Instant::now();
    let mut attempts = 0u32;

    while start.elapsed() < timeout {
        attempts += 1;
        if is_reachable(client, url).await {
            return Ok(());
        }
        if attempts == 1 {
            info!(%url, "waiting for web server");
        }
        sleep(POLL_INTERVAL).await;
    }

    warn!(%url, attempts, "web server never became ready");
    Err(CliError::web_server(format!(
        "timed out after {}ms waiting for {url} ({attempts} attempts)",
        timeout.as_millis()
    )))
}
