//! Page handle: one live browser tab for one test attempt.
//!
//! A [`Page`] wraps a [`PageDriver`] with base URL resolution, operation
//! timeouts, action tracing and optional frame capture. Clones share the same
//! tab; closing is idempotent and every later call fails.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::{ArtifactCapture, RunConfig, ScreenshotConfig, Viewport};
use crate::driver::PageDriver;
use crate::locator::{AriaRole, ElementState, Locator, Selector};
use crate::result::{CheckError, CheckResult};
use crate::trace::{ActionCategory, TraceRecorder};

/// Per-page settings derived from the run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PageSettings {
    /// Origin relative URLs resolve against
    pub base_url: String,
    /// Budget for one navigation
    pub navigation_timeout: Duration,
    /// Budget for one action, including the actionability wait
    pub action_timeout: Duration,
    /// Budget for one retrying assertion
    pub expect_timeout: Duration,
    /// Screenshot comparison settings
    pub screenshot: ScreenshotConfig,
    /// Directory for this attempt's artifacts
    pub artifact_dir: PathBuf,
    /// Artifact capture policy
    pub capture: ArtifactCapture,
}

impl PageSettings {
    /// Derive settings for one attempt
    #[must_use]
    pub fn from_config(config: &RunConfig, artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: config.base_url.clone(),
            navigation_timeout: config.navigation_timeout(),
            action_timeout: config.action_timeout(),
            expect_timeout: config.expect_timeout(),
            screenshot: config.screenshot.clone(),
            artifact_dir: artifact_dir.into(),
            capture: config.capture,
        }
    }
}

impl Default for PageSettings {
    fn default() -> Self {
        let config = RunConfig::default();
        Self::from_config(&config, config.output_dir.clone())
    }
}

#[derive(Debug)]
struct PageInner {
    id: String,
    driver: Arc<dyn PageDriver>,
    settings: PageSettings,
    trace: TraceRecorder,
    frames: Mutex<Vec<Vec<u8>>>,
    url: Mutex<Option<String>>,
    viewport: Mutex<Option<Viewport>>,
    closed: AtomicBool,
}

/// Handle to one live browser tab
#[derive(Debug, Clone)]
pub struct Page {
    inner: Arc<PageInner>,
}

impl Page {
    /// Wrap a driver
    #[must_use]
    pub fn new(driver: Arc<dyn PageDriver>, settings: PageSettings) -> Self {
        let id = Uuid::new_v4().to_string();
        let trace = TraceRecorder::new(id.clone(), settings.capture.trace);
        Self {
            inner: Arc::new(PageInner {
                id,
                driver,
                settings,
                trace,
                frames: Mutex::new(Vec::new()),
                url: Mutex::new(None),
                viewport: Mutex::new(None),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Unique page ID
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Settings this page was created with
    #[must_use]
    pub fn settings(&self) -> &PageSettings {
        &self.inner.settings
    }

    /// Recorded action trace
    #[must_use]
    pub fn trace(&self) -> &TraceRecorder {
        &self.inner.trace
    }

    /// URL of the last successful navigation
    #[must_use]
    pub fn url(&self) -> Option<String> {
        self.inner
            .url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Viewport set through [`Page::set_viewport_size`]
    #[must_use]
    pub fn viewport_size(&self) -> Option<Viewport> {
        *self
            .inner
            .viewport
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Frames captured after each action when video capture is on
    #[must_use]
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.inner
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Check if the page has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolve a path against the base URL; absolute URLs pass through
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!(
            "{}/{}",
            self.inner.settings.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Navigate and wait for the load event.
    ///
    /// # Errors
    ///
    /// `Navigation` if the target is unreachable or does not load within the
    /// navigation timeout.
    pub async fn goto(&self, path: &str) -> CheckResult<()> {
        self.ensure_open()?;
        let url = self.resolve_url(path);
        let timeout = self.inner.settings.navigation_timeout;
        let started = Instant::now();
        tracing::debug!(page = %self.id(), %url, "goto");

        let result = match tokio::time::timeout(timeout, self.inner.driver.navigate(&url)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(CheckError::Navigation { url, message })) => {
                Err(CheckError::Navigation { url, message })
            }
            Ok(Err(e)) => Err(CheckError::Navigation {
                url: url.clone(),
                message: e.to_string(),
            }),
            Err(_) => Err(CheckError::Navigation {
                url: url.clone(),
                message: format!("timed out after {}ms", timeout.as_millis()),
            }),
        };

        self.inner.trace.record(
            "goto",
            ActionCategory::Navigation,
            Some(url.clone()),
            started,
            result.as_ref().map(|_| ()),
        );
        result?;

        *self
            .inner
            .url
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(url);
        self.capture_frame().await;
        Ok(())
    }

    /// Current document title
    pub async fn title(&self) -> CheckResult<String> {
        self.ensure_open()?;
        self.inner.driver.title().await
    }

    /// Locator for a CSS selector
    #[must_use]
    pub fn locator(&self, css: impl Into<String>) -> Locator {
        Locator::new(self.clone(), Selector::css(css))
    }

    /// Locator for an element with `role` whose accessible name contains `name`
    #[must_use]
    pub fn get_by_role(&self, role: AriaRole, name: impl Into<String>) -> Locator {
        Locator::new(self.clone(), Selector::role(role, name))
    }

    /// Locator for `#id`
    #[must_use]
    pub fn get_by_id(&self, id: impl Into<String>) -> Locator {
        Locator::new(self.clone(), Selector::id(id))
    }

    /// Locator for the leaf element containing `text`
    #[must_use]
    pub fn get_by_text(&self, text: impl Into<String>) -> Locator {
        Locator::new(self.clone(), Selector::text(text))
    }

    /// Override the viewport size
    pub async fn set_viewport_size(&self, viewport: Viewport) -> CheckResult<()> {
        self.ensure_open()?;
        let started = Instant::now();
        tracing::debug!(page = %self.id(), %viewport, "set viewport");
        let result = self.inner.driver.set_viewport(viewport).await;
        self.inner.trace.record(
            "setViewportSize",
            ActionCategory::Page,
            Some(viewport.to_string()),
            started,
            result.as_ref().map(|_| ()),
        );
        result?;
        *self
            .inner
            .viewport
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(viewport);
        Ok(())
    }

    /// Capture a PNG screenshot
    pub async fn screenshot(&self, full_page: bool) -> CheckResult<Vec<u8>> {
        self.ensure_open()?;
        let started = Instant::now();
        let result = self.inner.driver.screenshot(full_page).await;
        self.inner.trace.record(
            "screenshot",
            ActionCategory::Screenshot,
            None,
            started,
            result.as_ref().map(|_| ()),
        );
        result
    }

    /// Close the tab. Closing twice is a no-op.
    pub async fn close(&self) -> CheckResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::debug!(page = %self.id(), "close");
        self.inner.driver.close().await
    }

    pub(crate) async fn query(&self, selector: &Selector) -> CheckResult<ElementState> {
        self.ensure_open()?;
        self.inner.driver.query(selector).await
    }

    /// Dispatch a click, bounded by what remains of the action budget
    pub(crate) async fn click(&self, selector: &Selector, timeout: Duration) -> CheckResult<()> {
        self.ensure_open()?;
        let started = Instant::now();
        tracing::debug!(page = %self.id(), %selector, "click");

        let result = tokio::time::timeout(timeout, self.inner.driver.click(selector))
            .await
            .unwrap_or_else(|_| {
                Err(CheckError::Timeout {
                    operation: format!("click {selector}"),
                    ms: timeout.as_millis() as u64,
                })
            });

        self.inner.trace.record(
            "click",
            ActionCategory::Interaction,
            Some(selector.to_string()),
            started,
            result.as_ref().map(|_| ()),
        );
        result?;
        self.capture_frame().await;
        Ok(())
    }

    /// Record an assertion outcome in the trace
    pub(crate) fn record_assertion(
        &self,
        name: &str,
        target: Option<String>,
        started: Instant,
        outcome: &CheckResult<()>,
    ) {
        self.inner.trace.record(
            name,
            ActionCategory::Assertion,
            target,
            started,
            outcome.as_ref().map(|_| ()),
        );
    }

    async fn capture_frame(&self) {
        if !self.inner.settings.capture.video {
            return;
        }
        match self.inner.driver.screenshot(false).await {
            Ok(frame) => self
                .inner
                .frames
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(frame),
            Err(e) => tracing::warn!(page = %self.id(), error = %e, "frame capture failed"),
        }
    }

    fn ensure_open(&self) -> CheckResult<()> {
        if self.is_closed() {
            return Err(CheckError::page(format!("page {} has been closed", self.id())));
        }
        Ok(())
    }
}
