//! Fixture Management.
//!
//! Every test attempt gets its own [`Fixtures`]: a fresh tab from the browser
//! session wrapped in an [`IndexPage`]. Teardown collects the attempt's
//! artifacts and closes the tab, and [`FixtureProvider::run`] guarantees it
//! happens whether the body passes, fails or times out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;

use crate::browser::BrowserSession;
use crate::config::RunConfig;
use crate::page::{Page, PageSettings};
use crate::pages::IndexPage;
use crate::result::{CheckError, CheckResult};

/// State of a fixture set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Set up and usable
    SetUp,
    /// Torn down; the page is closed
    TornDown,
}

/// Values handed to a test body
#[derive(Debug)]
pub struct Fixtures {
    /// Page object over this attempt's page
    pub index_page: IndexPage,
    page: Page,
    state: FixtureState,
}

impl Fixtures {
    /// The attempt's page
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> FixtureState {
        self.state
    }

    /// Save artifacts, then close the page. A second call does nothing.
    ///
    /// Artifact capture problems are logged and never fail the teardown.
    ///
    /// # Errors
    ///
    /// `Fixture` if the page cannot be closed
    pub async fn teardown(&mut self, failed: bool) -> CheckResult<Vec<PathBuf>> {
        if self.state == FixtureState::TornDown {
            return Ok(Vec::new());
        }
        self.state = FixtureState::TornDown;

        let artifacts = match self.save_artifacts(failed).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(page = %self.page.id(), error = %e, "artifact capture failed");
                Vec::new()
            }
        };

        self.page.close().await.map_err(|e| CheckError::Fixture {
            message: format!("failed to close page: {e}"),
        })?;
        Ok(artifacts)
    }

    async fn save_artifacts(&self, failed: bool) -> CheckResult<Vec<PathBuf>> {
        let settings = self.page.settings();
        let capture = settings.capture;
        if !capture.any() {
            return Ok(Vec::new());
        }

        let dir = &settings.artifact_dir;
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        if capture.screenshot && !self.page.is_closed() {
            let name = if failed {
                "test-failed-1.png"
            } else {
                "test-finished-1.png"
            };
            let path = dir.join(name);
            std::fs::write(&path, self.page.screenshot(true).await?)?;
            written.push(path);
        }

        if capture.video {
            let frames = self.page.frames();
            if !frames.is_empty() {
                let video_dir = dir.join("video");
                std::fs::create_dir_all(&video_dir)?;
                for (i, frame) in frames.iter().enumerate() {
                    std::fs::write(video_dir.join(format!("frame-{i:04}.png")), frame)?;
                }
                written.push(video_dir);
            }
        }

        // Last, so the screenshot above is part of the trace.
        if capture.trace {
            let path = dir.join("trace.json");
            self.page.trace().save(&path)?;
            written.push(path);
        }

        Ok(written)
    }
}

/// Outcome of one fixture-wrapped attempt
#[derive(Debug)]
pub struct AttemptOutcome {
    /// Body result; setup and timeout failures included
    pub result: CheckResult<()>,
    /// The body exceeded its time budget
    pub timed_out: bool,
    /// Artifact files written during teardown
    pub artifacts: Vec<PathBuf>,
}

/// Builds fixtures from one browser session
#[derive(Debug, Clone)]
pub struct FixtureProvider {
    session: Arc<dyn BrowserSession>,
    config: Arc<RunConfig>,
}

impl FixtureProvider {
    /// Create a provider
    #[must_use]
    pub fn new(session: Arc<dyn BrowserSession>, config: Arc<RunConfig>) -> Self {
        Self { session, config }
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Open a fresh page and build the fixtures over it
    ///
    /// # Errors
    ///
    /// `Fixture` if the session cannot open a page or apply the viewport
    pub async fn setup(&self, artifact_dir: PathBuf) -> CheckResult<Fixtures> {
        let driver = self
            .session
            .new_page()
            .await
            .map_err(|e| CheckError::Fixture {
                message: format!("cannot open page: {e}"),
            })?;

        let page = Page::new(driver, PageSettings::from_config(&self.config, artifact_dir));
        if let Some(viewport) = self.config.viewport {
            if let Err(e) = page.set_viewport_size(viewport).await {
                let _ = page.close().await;
                return Err(CheckError::Fixture {
                    message: format!("cannot set viewport {viewport}: {e}"),
                });
            }
        }

        tracing::debug!(page = %page.id(), "fixtures set up");
        Ok(Fixtures {
            index_page: IndexPage::new(page.clone()),
            page,
            state: FixtureState::SetUp,
        })
    }

    /// Set up, run `body` within `timeout`, and always tear down.
    ///
    /// A teardown failure fails an otherwise passing attempt.
    pub async fn run<F>(&self, artifact_dir: PathBuf, timeout: Duration, body: F) -> AttemptOutcome
    where
        F: for<'a> FnOnce(&'a Fixtures) -> BoxFuture<'a, CheckResult<()>> + Send,
    {
        let mut fixtures = match self.setup(artifact_dir).await {
            Ok(fixtures) => fixtures,
            Err(e) => {
                return AttemptOutcome {
                    result: Err(e),
                    timed_out: false,
                    artifacts: Vec::new(),
                }
            }
        };

        let (result, timed_out) = match tokio::time::timeout(timeout, body(&fixtures)).await {
            Ok(result) => (result, false),
            Err(_) => (
                Err(CheckError::Timeout {
                    operation: "test".to_string(),
                    ms: timeout.as_millis() as u64,
                }),
                true,
            ),
        };

        let (result, artifacts) = match fixtures.teardown(result.is_err()).await {
            Ok(artifacts) => (result, artifacts),
            Err(teardown) => (result.and(Err(teardown)), Vec::new()),
        };

        AttemptOutcome {
            result,
            timed_out,
            artifacts,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::browser::MockSession;
    use crate::config::{ArtifactCapture, RunMode};
    use crate::page_object::PageObject;
    use futures::FutureExt;

    fn provider(mode: RunMode) -> (FixtureProvider, Arc<MockSession>) {
        let session = Arc::new(MockSession::serving_index());
        let config = Arc::new(RunConfig::for_mode(mode, None));
        (FixtureProvider::new(session.clone(), config), session)
    }

    mod setup_tests {
        use super::*;

        #[tokio::test]
        async fn test_setup_opens_one_page() {
            let (provider, session) = provider(RunMode::Local);
            let fixtures = provider.setup(PathBuf::from("unused")).await.unwrap();
            assert_eq!(session.pages_opened(), 1);
            assert_eq!(fixtures.state(), FixtureState::SetUp);
            assert_eq!(fixtures.index_page.page().id(), fixtures.page().id());
        }

        #[tokio::test]
        async fn test_ci_applies_canonical_viewport() {
            let (provider, session) = provider(RunMode::Ci);
            let _fixtures = provider.setup(PathBuf::from("unused")).await.unwrap();
            assert!(session.pages()[0].was_called("viewport:1280x720"));
        }

        #[tokio::test]
        async fn test_local_keeps_window_size() {
            let (provider, session) = provider(RunMode::Local);
            let _fixtures = provider.setup(PathBuf::from("unused")).await.unwrap();
            assert!(!session.pages()[0].was_called("viewport"));
        }

        #[tokio::test]
        async fn test_closed_session_is_fixture_error() {
            let (provider, session) = provider(RunMode::Ci);
            session.close().await.unwrap();
            let err = provider.setup(PathBuf::from("unused")).await.unwrap_err();
            assert_eq!(err.kind(), "FixtureError");
        }
    }

    mod run_tests {
        use super::*;

        #[tokio::test]
        async fn test_teardown_after_success() {
            let dir = tempfile::tempdir().unwrap();
            let (provider, session) = provider(RunMode::Ci);
            let outcome = provider
                .run(dir.path().to_path_buf(), Duration::from_secs(5), |f| {
                    async move { f.index_page.goto().await }.boxed()
                })
                .await;
            assert!(outcome.result.is_ok());
            assert_eq!(session.pages_closed(), 1);
            assert!(outcome.artifacts.is_empty());
        }

        #[tokio::test]
        async fn test_teardown_after_failure() {
            let dir = tempfile::tempdir().unwrap();
            let (provider, session) = provider(RunMode::Ci);
            let outcome = provider
                .run(dir.path().to_path_buf(), Duration::from_secs(5), |_| {
                    async { Err(CheckError::assertion("boom")) }.boxed()
                })
                .await;
            assert!(outcome.result.is_err());
            assert!(!outcome.timed_out);
            assert_eq!(session.pages_closed(), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_timeout_still_tears_down() {
            let dir = tempfile::tempdir().unwrap();
            let (provider, session) = provider(RunMode::Ci);
            let outcome = provider
                .run(dir.path().to_path_buf(), Duration::from_millis(100), |_| {
                    async {
                        tokio::time::sleep(Duration::from_secs(10)).await;
                        Ok(())
                    }
                    .boxed()
                })
                .await;
            assert!(outcome.timed_out);
            assert_eq!(outcome.result.unwrap_err().kind(), "TimeoutError");
            assert_eq!(session.pages_closed(), 1);
        }

        #[tokio::test]
        async fn test_local_capture_writes_artifacts() {
            let dir = tempfile::tempdir().unwrap();
            let (provider, _) = provider(RunMode::Local);
            assert_eq!(provider.config().capture, ArtifactCapture::all());

            let outcome = provider
                .run(dir.path().to_path_buf(), Duration::from_secs(5), |f| {
                    async move {
                        f.index_page.goto().await?;
                        f.index_page.click_action_button().await
                    }
                    .boxed()
                })
                .await;
            assert!(outcome.result.is_ok());
            assert!(dir.path().join("trace.json").exists());
            assert!(dir.path().join("test-finished-1.png").exists());
            assert!(dir.path().join("video/frame-0000.png").exists());
            assert!(dir.path().join("video/frame-0001.png").exists());
        }

        #[tokio::test]
        async fn test_failed_attempt_screenshot_name() {
            let dir = tempfile::tempdir().unwrap();
            let (provider, _) = provider(RunMode::Local);
            let outcome = provider
                .run(dir.path().to_path_buf(), Duration::from_secs(5), |_| {
                    async { Err(CheckError::assertion("boom")) }.boxed()
                })
                .await;
            assert!(outcome.result.is_err());
            assert!(dir.path().join("test-failed-1.png").exists());
        }
    }

    #[tokio::test]
    async fn test_double_teardown_is_noop() {
        let (provider, session) = provider(RunMode::Ci);
        let mut fixtures = provider.setup(PathBuf::from("unused")).await.unwrap();
        fixtures.teardown(false).await.unwrap();
        assert!(fixtures.teardown(false).await.unwrap().is_empty());
        assert_eq!(fixtures.state(), FixtureState::TornDown);
        assert_eq!(session.pages_closed(), 1);
    }
}
