//! Result and error types for sitecheck.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for sitecheck operations
pub type CheckResult<T> = Result<T, CheckError>;

/// Errors that can occur while driving or asserting against a page
#[derive(Debug, Error)]
pub enum CheckError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error (creation, evaluation, closed handle)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Expected UI state not observed within the timeout
    #[error("Assertion failed: {message}")]
    Assertion {
        /// Error message
        message: String,
    },

    /// Target element not visible/enabled within the timeout
    #[error("Element {selector} is not actionable: {message}")]
    Actionability {
        /// Selector description
        selector: String,
        /// Error message
        message: String,
    },

    /// Screenshot differs from its baseline beyond the tolerance
    #[error("Screenshot {name} differs from baseline: {ratio:.4} of pixels differ (max {max_ratio:.4})")]
    VisualMismatch {
        /// Snapshot name
        name: String,
        /// Ratio of differing pixels
        ratio: f64,
        /// Configured tolerance
        max_ratio: f64,
        /// Diff image written for the failure, if any
        diff_path: Option<PathBuf>,
    },

    /// No baseline stored for a screenshot comparison
    #[error("Baseline {} is missing{}", path.display(), if *written { ", writing actual" } else { "" })]
    BaselineMissing {
        /// Expected baseline path
        path: PathBuf,
        /// Whether the capture was recorded as the new baseline
        written: bool,
    },

    /// Operation timed out
    #[error("{operation} timed out after {ms}ms")]
    Timeout {
        /// What was being waited for
        operation: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Image comparison error
    #[error("Image comparison failed: {message}")]
    ImageComparison {
        /// Error message
        message: String,
    },

    /// Fixture error (setup/teardown failed)
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Focused scenarios are not allowed in this run
    #[error("Focused scenario '{title}' is not allowed when forbid_only is set")]
    ForbiddenOnly {
        /// Title of the focused scenario
        title: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CheckError {
    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an assertion error
    #[must_use]
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Short machine-friendly name of the error kind, used in reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::BrowserLaunch { .. } => "BrowserLaunchError",
            Self::Page { .. } => "PageError",
            Self::Navigation { .. } => "NavigationError",
            Self::Assertion { .. } => "AssertionError",
            Self::Actionability { .. } => "ActionabilityError",
            Self::VisualMismatch { .. } => "VisualMismatchError",
            Self::BaselineMissing { .. } => "BaselineMissingError",
            Self::Timeout { .. } => "TimeoutError",
            Self::Screenshot { .. } => "ScreenshotError",
            Self::ImageComparison { .. } => "ImageComparisonError",
            Self::Fixture { .. } => "FixtureError",
            Self::Config { .. } => "ConfigError",
            Self::ForbiddenOnly { .. } => "ForbiddenOnlyError",
            Self::Io(_) => "IoError",
            Self::Json(_) => "JsonError",
        }
    }
}
