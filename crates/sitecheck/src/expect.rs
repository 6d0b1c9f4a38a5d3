//! Retrying assertions.
//!
//! ```ignore
//! expect_page(&page).to_have_title(&Regex::new("Test Website")?).await?;
//! expect(&page.get_by_id("message")).to_have_text("Button clicked!").await?;
//! ```
//!
//! Each matcher re-queries the page until the condition holds or the expect
//! timeout elapses, then fails with an `Assertion` error naming what was last
//! observed.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use regex::Regex;

use crate::config::SnapshotUpdate;
use crate::locator::{ElementState, Locator};
use crate::page::Page;
use crate::result::{CheckError, CheckResult};
use crate::visual_regression::{
    snapshot_stem, write_failure_artifacts, ImageDiffResult, SnapshotStore,
    VisualRegressionTester,
};
use crate::wait::{poll_until, Probe, WaitOptions};

/// Start an assertion on a locator
#[must_use]
pub fn expect(locator: &Locator) -> LocatorAssertions<'_> {
    LocatorAssertions {
        locator,
        timeout: None,
    }
}

/// Start an assertion on a page
#[must_use]
pub fn expect_page(page: &Page) -> PageAssertions<'_> {
    PageAssertions {
        page,
        timeout: None,
    }
}

/// Assertions on one element
#[derive(Debug, Clone, Copy)]
pub struct LocatorAssertions<'a> {
    locator: &'a Locator,
    timeout: Option<Duration>,
}

impl LocatorAssertions<'_> {
    /// Override the expect timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn options(&self) -> WaitOptions {
        WaitOptions::new().with_timeout(
            self.timeout
                .unwrap_or_else(|| self.locator.page().settings().expect_timeout),
        )
    }

    /// Resolve once, failing outright when more than one element matches
    async fn strict_state(&self) -> CheckResult<ElementState> {
        let state = self.locator.state().await?;
        if state.count > 1 {
            return Err(CheckError::assertion(format!(
                "strict mode violation: {} resolved to {}",
                self.locator.selector(),
                state.describe()
            )));
        }
        Ok(state)
    }

    /// Element exists and is visible
    pub async fn to_be_visible(&self) -> CheckResult<()> {
        let started = Instant::now();
        let selector = self.locator.selector().to_string();
        let waited = poll_until(&self.options(), || async {
            let state = self.strict_state().await?;
            Ok(if state.visible {
                Probe::Ready(())
            } else {
                Probe::Pending(state.describe())
            })
        })
        .await;

        let outcome = match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(timeout)) => Err(CheckError::assertion(format!(
                "expected {selector} to be visible within {}ms, last state: {}",
                timeout.elapsed.as_millis(),
                timeout.last_observed
            ))),
            Err(e) => Err(e),
        };
        self.locator
            .page()
            .record_assertion("toBeVisible", Some(selector), started, &outcome);
        outcome
    }

    /// Element text equals `expected` after trimming surrounding whitespace
    pub async fn to_have_text(&self, expected: &str) -> CheckResult<()> {
        let started = Instant::now();
        let selector = self.locator.selector().to_string();
        let waited = poll_until(&self.options(), || async {
            let state = self.strict_state().await?;
            Ok(match state.text.as_deref().map(str::trim) {
                Some(text) if text == expected.trim() => Probe::Ready(()),
                Some(text) => Probe::Pending(format!("text {text:?}")),
                None => Probe::Pending(state.describe()),
            })
        })
        .await;

        let outcome = match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(timeout)) => Err(CheckError::assertion(format!(
                "expected {selector} to have text {expected:?}, last observed: {}",
                timeout.last_observed
            ))),
            Err(e) => Err(e),
        };
        self.locator
            .page()
            .record_assertion("toHaveText", Some(selector), started, &outcome);
        outcome
    }
}

/// Assertions on a whole page
#[derive(Debug, Clone, Copy)]
pub struct PageAssertions<'a> {
    page: &'a Page,
    timeout: Option<Duration>,
}

impl PageAssertions<'_> {
    /// Override the expect timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn options(&self) -> WaitOptions {
        WaitOptions::new()
            .with_timeout(self.timeout.unwrap_or(self.page.settings().expect_timeout))
    }

    /// Document title matches `pattern`
    pub async fn to_have_title(&self, pattern: &Regex) -> CheckResult<()> {
        let started = Instant::now();
        let waited = poll_until(&self.options(), || async {
            let title = self.page.title().await?;
            Ok(if pattern.is_match(&title) {
                Probe::Ready(())
            } else {
                Probe::Pending(format!("title {title:?}"))
            })
        })
        .await;

        let outcome = match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(timeout)) => Err(CheckError::assertion(format!(
                "expected page title to match /{pattern}/, last observed: {}",
                timeout.last_observed
            ))),
            Err(e) => Err(e),
        };
        self.page
            .record_assertion("toHaveTitle", Some(pattern.to_string()), started, &outcome);
        outcome
    }

    /// Full-page screenshot matches the stored baseline.
    ///
    /// A missing baseline always fails unless the update policy is
    /// [`SnapshotUpdate::All`]; with [`SnapshotUpdate::Missing`] the capture is
    /// also stored as the new baseline. On mismatch the actual, expected and
    /// diff images are written to the page's artifact directory.
    pub async fn to_have_screenshot(&self, name_path: &[&str]) -> CheckResult<()> {
        let started = Instant::now();
        let name = name_path.join("/");
        let outcome = self.compare_screenshot(name_path, &name).await;
        self.page
            .record_assertion("toHaveScreenshot", Some(name), started, &outcome);
        outcome
    }

    async fn compare_screenshot(&self, name_path: &[&str], name: &str) -> CheckResult<()> {
        let settings = self.page.settings();
        let store = SnapshotStore::from_config(&settings.screenshot);
        let tester = VisualRegressionTester::from_config(&settings.screenshot);
        let path = store.path_for(name_path);
        let stem = snapshot_stem(name_path);
        let update = settings.screenshot.update;

        let Some(expected) = store.read(&path)? else {
            let actual = self.page.screenshot(true).await?;
            return match update {
                SnapshotUpdate::All => store.write(&path, &actual),
                SnapshotUpdate::Missing => {
                    store.write(&path, &actual)?;
                    write_failure_artifacts(&settings.artifact_dir, &stem, &actual, None, None)?;
                    Err(CheckError::BaselineMissing {
                        path,
                        written: true,
                    })
                }
                SnapshotUpdate::None => {
                    write_failure_artifacts(&settings.artifact_dir, &stem, &actual, None, None)?;
                    Err(CheckError::BaselineMissing {
                        path,
                        written: false,
                    })
                }
            };
        };

        if update == SnapshotUpdate::All {
            let actual = self.page.screenshot(true).await?;
            if !tester.compare_images(&actual, &expected)?.matches {
                store.write(&path, &actual)?;
            }
            return Ok(());
        }

        let last: Mutex<Option<(Vec<u8>, ImageDiffResult)>> = Mutex::new(None);
        let waited = poll_until(&self.options(), || async {
            let actual = self.page.screenshot(true).await?;
            let result = tester.compare_images(&actual, &expected)?;
            if result.matches {
                return Ok(Probe::Ready(()));
            }
            let observed = format!("{:.4} of pixels differ", result.diff_ratio);
            *last.lock().unwrap_or_else(PoisonError::into_inner) = Some((actual, result));
            Ok(Probe::Pending(observed))
        })
        .await?;

        if waited.is_ok() {
            return Ok(());
        }

        let Some((actual, result)) = last.into_inner().unwrap_or_else(PoisonError::into_inner)
        else {
            return Err(CheckError::assertion(format!(
                "screenshot {name} never matched its baseline"
            )));
        };
        let diff_path = write_failure_artifacts(
            &settings.artifact_dir,
            &stem,
            &actual,
            Some(&expected),
            result.diff_image.as_deref(),
        )?;
        Err(CheckError::VisualMismatch {
            name: name.to_string(),
            ratio: result.diff_ratio,
            max_ratio: tester.max_diff_pixel_ratio(),
            diff_path,
        })
    }
}
