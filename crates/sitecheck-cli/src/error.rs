//! Error types for the CLI

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// The static page server could not be started or reached
    #[error("Web server error: {message}")]
    WebServer {
        /// Error message
        message: String,
    },

    /// The browser backend is not compiled in
    #[error("Browser support not enabled. Rebuild with --features browser")]
    BrowserUnavailable,

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Harness library error
    #[error(transparent)]
    Check(#[from] sitecheck::CheckError),

    /// Config serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
}

impl CliError {
    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a web server error
    #[must_use]
    pub fn web_server(message: impl Into<String>) -> Self {
        Self::WebServer {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<serde_yaml_ng::Error> for CliError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}
