//! Run configuration.
//!
//! The whole execution environment is described by one immutable [`RunConfig`]
//! built at startup and handed to the runner. Two modes exist:
//!
//! | setting            | CI            | local                 |
//! |--------------------|---------------|-----------------------|
//! | workers            | 1             | available parallelism |
//! | retries            | 2             | 0                     |
//! | headless           | yes           | no                    |
//! | artifact capture   | off           | trace, screenshot, video |
//! | expect timeout     | 60s           | 30s                   |
//! | reuse dev server   | no            | yes                   |
//!
//! The mode is chosen by the `CI` environment variable and the target origin by
//! `BASE_URL`. A `.env` file in the working directory is loaded first.

use crate::result::{CheckError, CheckResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable selecting CI mode
pub const CI_ENV: &str = "CI";

/// Environment variable overriding the target origin
pub const BASE_URL_ENV: &str = "BASE_URL";

/// Port the local static server binds when no external origin is given
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Origin used when `BASE_URL` is unset
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Canonical viewport for visual comparisons
pub const CANONICAL_VIEWPORT: Viewport = Viewport::new(1280, 720);

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Continuous integration: serial, retried, headless, no artifacts
    Ci,
    /// Local/interactive: parallel, no retries, headed, full artifacts
    #[default]
    Local,
}

impl RunMode {
    /// Derive the mode from the raw value of the `CI` variable.
    ///
    /// Any non-empty value other than `0` or `false` selects CI mode.
    #[must_use]
    pub fn from_ci_var(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("" | "0") => Self::Local,
            Some(v) if v.eq_ignore_ascii_case("false") => Self::Local,
            Some(_) => Self::Ci,
        }
    }

    /// Check if this is CI mode
    #[must_use]
    pub const fn is_ci(self) -> bool {
        matches!(self, Self::Ci)
    }
}

/// Viewport dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Which artifacts are captured for every test attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArtifactCapture {
    /// Action trace (`trace.json`)
    pub trace: bool,
    /// Final page screenshot
    pub screenshot: bool,
    /// Frame sequence captured after every page action
    pub video: bool,
}

impl ArtifactCapture {
    /// Capture everything
    #[must_use]
    pub const fn all() -> Self {
        Self {
            trace: true,
            screenshot: true,
            video: true,
        }
    }

    /// Capture nothing
    #[must_use]
    pub const fn none() -> Self {
        Self {
            trace: false,
            screenshot: false,
            video: false,
        }
    }

    /// Check if any artifact is captured
    #[must_use]
    pub const fn any(&self) -> bool {
        self.trace || self.screenshot || self.video
    }
}

/// What to do with screenshot baselines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotUpdate {
    /// Never write baselines; a missing baseline fails
    None,
    /// Write missing baselines (the comparison still fails)
    #[default]
    Missing,
    /// Overwrite every compared baseline with the capture and pass
    All,
}

/// Screenshot comparison settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotConfig {
    /// Maximum ratio (0.0-1.0) of pixels allowed to differ
    pub max_diff_pixel_ratio: f64,
    /// Per-pixel color difference (sum of RGB channel deltas) below which pixels count as equal
    pub color_threshold: u8,
    /// Directory holding baselines
    pub snapshot_dir: PathBuf,
    /// Baseline path template; `{snapshot_dir}`, `{arg}` and `{ext}` are substituted
    pub path_template: String,
    /// Baseline update policy
    pub update: SnapshotUpdate,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            max_diff_pixel_ratio: 0.02,
            color_threshold: 10,
            snapshot_dir: PathBuf::from("pages-screenshots"),
            path_template: String::from("{snapshot_dir}/{arg}{ext}"),
            update: SnapshotUpdate::Missing,
        }
    }
}

/// Local static server bootstrap settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebServerConfig {
    /// Directory served as the document root
    pub directory: PathBuf,
    /// Port to bind
    pub port: u16,
    /// URL polled for readiness
    pub url: String,
    /// Reuse a server already answering on `url` instead of failing
    pub reuse_existing_server: bool,
    /// Time allowed for the server to become ready
    pub startup_timeout_ms: u64,
}

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("public"),
            port: DEFAULT_SERVER_PORT,
            url: DEFAULT_BASE_URL.to_string(),
            reuse_existing_server: true,
            startup_timeout_ms: 60_000,
        }
    }
}

impl WebServerConfig {
    /// Startup timeout as Duration
    #[must_use]
    pub const fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }
}

/// Device descriptor for a browser project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device name
    pub name: String,
    /// Default viewport
    pub viewport: Viewport,
    /// Device scale factor
    pub device_scale_factor: f64,
    /// Is mobile device
    pub is_mobile: bool,
    /// User agent string
    pub user_agent: String,
}

impl DeviceDescriptor {
    /// Desktop Chrome
    #[must_use]
    pub fn desktop_chrome() -> Self {
        Self {
            name: "Desktop Chrome".to_string(),
            viewport: CANONICAL_VIEWPORT,
            device_scale_factor: 1.0,
            is_mobile: false,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        }
    }
}

/// A named browser target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserProject {
    /// Project name, shown in reports
    pub name: String,
    /// Emulated device
    pub device: DeviceDescriptor,
}

impl BrowserProject {
    /// The chromium desktop project
    #[must_use]
    pub fn chromium() -> Self {
        Self {
            name: "chromium".to_string(),
            device: DeviceDescriptor::desktop_chrome(),
        }
    }
}

/// Process-wide run configuration, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Execution mode
    pub mode: RunMode,
    /// Origin that relative page URLs resolve against
    pub base_url: String,
    /// Per-attempt artifact directory root
    pub output_dir: PathBuf,
    /// HTML/JSON report directory
    pub report_dir: PathBuf,
    /// Maximum concurrently running tests
    pub workers: usize,
    /// Run tests within one suite in parallel
    pub fully_parallel: bool,
    /// Reject focused (`only`) scenarios
    pub forbid_only: bool,
    /// Whole-test retries after a failure
    pub retries: u32,
    /// Budget for one test attempt
    pub test_timeout_ms: u64,
    /// Budget for one retrying assertion
    pub expect_timeout_ms: u64,
    /// Budget for one navigation
    pub navigation_timeout_ms: u64,
    /// Budget for one action (click)
    pub action_timeout_ms: u64,
    /// Run the browser without a window
    pub headless: bool,
    /// Fixed viewport; `None` keeps the window size
    pub viewport: Option<Viewport>,
    /// Extra browser launch arguments
    pub launch_args: Vec<String>,
    /// Artifact capture policy
    pub capture: ArtifactCapture,
    /// Screenshot comparison settings
    pub screenshot: ScreenshotConfig,
    /// Local server bootstrap, when the target is local
    pub web_server: Option<WebServerConfig>,
    /// Browser projects
    pub projects: Vec<BrowserProject>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::for_mode(RunMode::Local, None)
    }
}

impl RunConfig {
    /// Build the configuration for a mode and an optional `BASE_URL` value
    #[must_use]
    pub fn for_mode(mode: RunMode, base_url: Option<&str>) -> Self {
        let ci = mode.is_ci();
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map_or_else(|| DEFAULT_BASE_URL.to_string(), ToString::to_string);

        let web_server = is_local_origin(&base_url).then(|| WebServerConfig {
            reuse_existing_server: !ci,
            ..WebServerConfig::default()
        });

        let screenshot = ScreenshotConfig {
            update: if ci {
                SnapshotUpdate::None
            } else {
                SnapshotUpdate::Missing
            },
            ..ScreenshotConfig::default()
        };

        Self {
            mode,
            base_url,
            output_dir: PathBuf::from("target/sitecheck/test-results"),
            report_dir: PathBuf::from("target/sitecheck/report"),
            workers: if ci { 1 } else { available_workers() },
            fully_parallel: true,
            forbid_only: ci,
            retries: if ci { 2 } else { 0 },
            test_timeout_ms: if ci { 120_000 } else { 90_000 },
            expect_timeout_ms: if ci { 60_000 } else { 30_000 },
            navigation_timeout_ms: 60_000,
            action_timeout_ms: 60_000,
            headless: ci,
            viewport: ci.then_some(CANONICAL_VIEWPORT),
            launch_args: if ci {
                Vec::new()
            } else {
                vec!["--start-maximized".to_string()]
            },
            capture: if ci {
                ArtifactCapture::none()
            } else {
                ArtifactCapture::all()
            },
            screenshot,
            web_server,
            projects: vec![BrowserProject::chromium()],
        }
    }

    /// Build the configuration from the process environment.
    ///
    /// Loads `.env` from the working directory if present, then reads `CI`
    /// and `BASE_URL`.
    ///
    /// # Errors
    ///
    /// Returns error if `.env` exists but cannot be parsed, or the result is invalid.
    pub fn from_env() -> CheckResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded environment file"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(CheckError::config(format!("cannot load .env: {e}"))),
        }

        let ci = std::env::var(CI_ENV).ok();
        let base_url = std::env::var(BASE_URL_ENV).ok();
        let config = Self::for_mode(RunMode::from_ci_var(ci.as_deref()), base_url.as_deref());
        config.validate()?;
        Ok(config)
    }

    /// Set worker count (0 keeps the mode default)
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        if workers > 0 {
            self.workers = workers;
        }
        self
    }

    /// Set retry count
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the baseline update policy
    #[must_use]
    pub const fn with_snapshot_update(mut self, update: SnapshotUpdate) -> Self {
        self.screenshot.update = update;
        self
    }

    /// Set the artifact and report directories under one root
    #[must_use]
    pub fn with_output_root(mut self, root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        self.output_dir = root.join("test-results");
        self.report_dir = root.join("report");
        self
    }

    /// Set the baseline directory
    #[must_use]
    pub fn with_snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot.snapshot_dir = dir.into();
        self
    }

    /// Set the artifact capture policy
    #[must_use]
    pub const fn with_capture(mut self, capture: ArtifactCapture) -> Self {
        self.capture = capture;
        self
    }

    /// Test attempt timeout
    #[must_use]
    pub const fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    /// Assertion timeout
    #[must_use]
    pub const fn expect_timeout(&self) -> Duration {
        Duration::from_millis(self.expect_timeout_ms)
    }

    /// Navigation timeout
    #[must_use]
    pub const fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Action timeout
    #[must_use]
    pub const fn action_timeout(&self) -> Duration {
        Duration::from_millis(self.action_timeout_ms)
    }

    /// Check the configuration for values the runner cannot honor
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid value
    pub fn validate(&self) -> CheckResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CheckError::config(format!(
                "{BASE_URL_ENV} must be an http(s) origin, got '{}'",
                self.base_url
            )));
        }
        if self.workers == 0 {
            return Err(CheckError::config("workers must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.screenshot.max_diff_pixel_ratio) {
            return Err(CheckError::config(format!(
                "max_diff_pixel_ratio must be within [0, 1], got {}",
                self.screenshot.max_diff_pixel_ratio
            )));
        }
        if self.test_timeout_ms <= self.expect_timeout_ms {
            return Err(CheckError::config(format!(
                "test timeout ({}ms) must exceed the expect timeout ({}ms)",
                self.test_timeout_ms, self.expect_timeout_ms
            )));
        }
        if self.projects.is_empty() {
            return Err(CheckError::config("at least one browser project is required"));
        }
        if let Some(project) = self.projects.iter().find(|p| p.name != "chromium") {
            return Err(CheckError::config(format!(
                "unsupported browser project '{}', only chromium is available",
                project.name
            )));
        }
        Ok(())
    }
}

/// Check whether an origin points at this machine
#[must_use]
pub fn is_local_origin(url: &str) -> bool {
    url.contains("localhost") || url.contains("127.0.0.1")
}

fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
