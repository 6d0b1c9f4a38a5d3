//! Serve command handler

use crate::commands::ServeArgs;
use crate::dev_server::{DevServer, DevServerConfig};
use crate::error::{CliError, CliResult};

/// Format a server URL from port
#[must_use]
pub fn format_server_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

/// Execute the serve command: serve `--dir` until interrupted
pub async fn execute_serve(args: &ServeArgs) -> CliResult<()> {
    if !args.directory.is_dir() {
        return Err(CliError::invalid_argument(format!(
            "{} is not a directory",
            args.directory.display()
        )));
    }

    let server = DevServer::new(
        DevServerConfig::builder()
            .directory(&args.directory)
            .port(args.port)
            .build(),
    );
    tokio::select! {
        served = server.run() => served?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(url = %format_server_url(args.port), "static server stopped");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_server_url() {
        assert_eq!(format_server_url(3000), "http://localhost:3000");
    }

    #[tokio::test]
    async fn test_missing_directory_rejected() {
        let args = ServeArgs {
            directory: "no/such/dir".into(),
            port: 0,
        };
        let err = execute_serve(&args).await.unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }
}
