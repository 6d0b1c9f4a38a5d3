//! Test runner.
//!
//! ```text
//! Suite::describe("Index Page")      TestRunner::run
//!   .test("...", body)      ──►   plan: only / skip / grep / forbid_only
//!   .test("...", body)             │
//!                                  ▼
//!                          Semaphore(workers) ── JoinSet
//!                                  │
//!                 attempt 0 ── retry 1 ── ... ── retry N   (fresh fixtures each)
//!                                  │
//!                                  ▼
//!                               Reporter
//! ```
//!
//! Scenario bodies are plain `fn` items returning a boxed future so they can be
//! registered in static tables:
//!
//! ```ignore
//! fn loads(f: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
//!     async move {
//!         f.index_page.goto().await?;
//!         f.index_page.assert_page_elements_loaded().await
//!     }
//!     .boxed()
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::browser::BrowserSession;
use crate::config::RunConfig;
use crate::fixture::{FixtureProvider, Fixtures};
use crate::reporter::{full_title, AttemptRecord, Reporter, TestResultEntry, TestStatus};
use crate::result::{CheckError, CheckResult};

/// A test body
pub type ScenarioFn = for<'a> fn(&'a Fixtures) -> BoxFuture<'a, CheckResult<()>>;

/// Focus marker of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mark {
    /// Runs normally
    #[default]
    Normal,
    /// Focused: when any scenario is focused only focused ones run
    Only,
    /// Reported as skipped, never run
    Skip,
}

/// One registered test
#[derive(Clone)]
pub struct Scenario {
    title: String,
    body: ScenarioFn,
    mark: Mark,
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("title", &self.title)
            .field("mark", &self.mark)
            .finish_non_exhaustive()
    }
}

impl Scenario {
    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Focus marker
    #[must_use]
    pub const fn mark(&self) -> Mark {
        self.mark
    }
}

/// A `describe` block: a titled group of scenarios
#[derive(Debug, Clone)]
pub struct Suite {
    title: String,
    scenarios: Vec<Scenario>,
}

impl Suite {
    /// Start a suite
    #[must_use]
    pub fn describe(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            scenarios: Vec::new(),
        }
    }

    fn push(mut self, title: impl Into<String>, body: ScenarioFn, mark: Mark) -> Self {
        self.scenarios.push(Scenario {
            title: title.into(),
            body,
            mark,
        });
        self
    }

    /// Register a scenario
    #[must_use]
    pub fn test(self, title: impl Into<String>, body: ScenarioFn) -> Self {
        self.push(title, body, Mark::Normal)
    }

    /// Register a focused scenario
    #[must_use]
    pub fn only(self, title: impl Into<String>, body: ScenarioFn) -> Self {
        self.push(title, body, Mark::Only)
    }

    /// Register a skipped scenario
    #[must_use]
    pub fn skip(self, title: impl Into<String>, body: ScenarioFn) -> Self {
        self.push(title, body, Mark::Skip)
    }

    /// Suite title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Registered scenarios
    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }
}

/// Progress callbacks
pub trait RunListener: Send + Sync {
    /// Tests are about to run
    fn on_run_start(&self, _total: usize, _workers: usize) {}

    /// An attempt is starting
    fn on_attempt_start(&self, _full_title: &str, _retry: u32) {}

    /// A test reached its final status
    fn on_test_end(&self, _result: &TestResultEntry) {}
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl RunListener for NoopListener {}

/// A scenario selected for this run
#[derive(Clone)]
pub struct PlannedTest {
    /// Suite title
    pub suite: String,
    /// Scenario title
    pub title: String,
    /// Reported as skipped instead of run
    pub skipped: bool,
    body: ScenarioFn,
}

impl std::fmt::Debug for PlannedTest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlannedTest")
            .field("suite", &self.suite)
            .field("title", &self.title)
            .field("skipped", &self.skipped)
            .finish_non_exhaustive()
    }
}

impl PlannedTest {
    /// `suite › title`
    #[must_use]
    pub fn full_title(&self) -> String {
        full_title(&self.suite, &self.title)
    }
}

/// Runs suites against one browser session
#[derive(Clone)]
pub struct TestRunner {
    config: Arc<RunConfig>,
    session: Arc<dyn BrowserSession>,
    grep: Option<Regex>,
    listener: Arc<dyn RunListener>,
}

impl std::fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunner")
            .field("workers", &self.config.workers)
            .field("retries", &self.config.retries)
            .field("grep", &self.grep)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl TestRunner {
    /// Create a runner
    #[must_use]
    pub fn new(config: RunConfig, session: Arc<dyn BrowserSession>) -> Self {
        Self {
            config: Arc::new(config),
            session,
            grep: None,
            listener: Arc::new(NoopListener),
        }
    }

    /// Only run tests whose full title matches
    #[must_use]
    pub fn with_grep(mut self, grep: Regex) -> Self {
        self.grep = Some(grep);
        self
    }

    /// Receive progress events
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn RunListener>) -> Self {
        self.listener = listener;
        self
    }

    /// Run configuration
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Select the tests to run, in registration order.
    ///
    /// # Errors
    ///
    /// `ForbiddenOnly` if a scenario is focused while `forbid_only` is set
    pub fn plan(&self, suites: &[Suite]) -> CheckResult<Vec<PlannedTest>> {
        let focused = suites
            .iter()
            .flat_map(|s| s.scenarios.iter().map(move |sc| (s, sc)))
            .find(|(_, sc)| sc.mark == Mark::Only);

        if let Some((suite, scenario)) = focused {
            if self.config.forbid_only {
                return Err(CheckError::ForbiddenOnly {
                    title: full_title(&suite.title, &scenario.title),
                });
            }
        }
        let focus_mode = focused.is_some();

        let mut planned = Vec::new();
        for suite in suites {
            for scenario in &suite.scenarios {
                if focus_mode && scenario.mark != Mark::Only {
                    continue;
                }
                let test = PlannedTest {
                    suite: suite.title.clone(),
                    title: scenario.title.clone(),
                    skipped: scenario.mark == Mark::Skip,
                    body: scenario.body,
                };
                let selected = self
                    .grep
                    .as_ref()
                    .map_or(true, |grep| grep.is_match(&test.full_title()));
                if selected {
                    planned.push(test);
                }
            }
        }

        Ok(planned)
    }

    /// Run every planned test and collect the results.
    ///
    /// The artifact directory is emptied first. Results keep plan order
    /// regardless of completion order.
    ///
    /// # Errors
    ///
    /// `ForbiddenOnly` from planning, or an I/O error preparing the artifact
    /// directory
    pub async fn run(&self, suites: &[Suite]) -> CheckResult<Reporter> {
        let started = Instant::now();
        let planned = self.plan(suites)?;
        prepare_output_dir(&self.config.output_dir)?;

        let project = self.session.name().to_string();
        let workers = self.config.workers.max(1);
        self.listener.on_run_start(planned.len(), workers);
        tracing::info!(tests = planned.len(), workers, retries = self.config.retries, "run started");

        let mut reporter = Reporter::new("sitecheck");
        let mut slots: Vec<Option<TestResultEntry>> = vec![None; planned.len()];

        // Units run concurrently; tests inside a unit run in order.
        let mut units: Vec<Vec<(usize, PlannedTest)>> = Vec::new();
        for (index, test) in planned.into_iter().enumerate() {
            if test.skipped {
                let entry = TestResultEntry::skipped(&test.suite, &test.title, &project);
                self.listener.on_test_end(&entry);
                slots[index] = Some(entry);
                continue;
            }
            let same_suite = units
                .last()
                .and_then(|u| u.last())
                .is_some_and(|(_, last)| last.suite == test.suite);
            if !self.config.fully_parallel && same_suite {
                if let Some(unit) = units.last_mut() {
                    unit.push((index, test));
                }
            } else {
                units.push(vec![(index, test)]);
            }
        }

        let semaphore = Arc::new(Semaphore::new(workers));
        let provider = FixtureProvider::new(self.session.clone(), self.config.clone());
        let mut set = JoinSet::new();

        for unit in units {
            let semaphore = semaphore.clone();
            let provider = provider.clone();
            let listener = self.listener.clone();
            let project = project.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let mut done = Vec::with_capacity(unit.len());
                for (index, test) in unit {
                    let entry = run_test(&provider, listener.as_ref(), &project, &test).await;
                    listener.on_test_end(&entry);
                    done.push((index, entry));
                }
                done
            });
        }

        while let Some(joined) = set.join_next().await {
            let done = joined.map_err(|e| CheckError::Fixture {
                message: format!("test worker crashed: {e}"),
            })?;
            for (index, entry) in done {
                slots[index] = Some(entry);
            }
        }

        for entry in slots.into_iter().flatten() {
            reporter.record(entry);
        }
        reporter.finish(started.elapsed());
        tracing::info!(summary = %reporter.summary(), "run finished");
        Ok(reporter)
    }
}

fn prepare_output_dir(dir: &std::path::Path) -> CheckResult<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Directory name for one attempt: `<slug>` then `<slug>-retry1`, ...
#[must_use]
pub fn artifact_dir_name(suite: &str, title: &str, project: &str, retry: u32) -> String {
    let mut slug = String::new();
    for word in [suite, title, project]
        .iter()
        .flat_map(|s| s.split(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|w| !w.is_empty())
    {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    if slug.len() > 80 {
        slug.truncate(80);
        slug = slug.trim_end_matches('-').to_string();
    }
    if retry > 0 {
        slug.push_str(&format!("-retry{retry}"));
    }
    slug
}

async fn run_test(
    provider: &FixtureProvider,
    listener: &dyn RunListener,
    project: &str,
    test: &PlannedTest,
) -> TestResultEntry {
    let config = provider.config();
    let title = test.full_title();
    let mut attempts = Vec::new();

    for retry in 0..=config.retries {
        listener.on_attempt_start(&title, retry);
        let dir = config.output_dir.join(artifact_dir_name(
            &test.suite,
            &test.title,
            project,
            retry,
        ));
        let body = test.body;
        let started = Instant::now();
        let outcome = provider
            .run(dir, config.test_timeout(), move |f| guarded(body, f))
            .await;

        let (status, error_kind, error, diff_path) = match &outcome.result {
            Ok(()) => (TestStatus::Passed, None, None, None),
            Err(e) => (
                if outcome.timed_out {
                    TestStatus::TimedOut
                } else {
                    TestStatus::Failed
                },
                Some(e.kind().to_string()),
                Some(e.to_string()),
                visual_diff_path(e),
            ),
        };

        attempts.push(AttemptRecord {
            retry,
            status,
            duration_ms: started.elapsed().as_millis() as u64,
            error_kind,
            error,
            artifacts: outcome.artifacts,
            diff_path,
        });

        if status.is_passed() {
            break;
        }
        if retry < config.retries {
            tracing::warn!(test = %title, retry = retry + 1, "attempt failed, retrying");
        }
    }

    let last = attempts.last().map_or(TestStatus::Failed, |a| a.status);
    let status = if last.is_passed() && attempts.len() > 1 {
        TestStatus::Flaky
    } else {
        last
    };
    tracing::info!(test = %title, %status, attempts = attempts.len(), "test finished");

    TestResultEntry {
        suite: test.suite.clone(),
        title: test.title.clone(),
        project: project.to_string(),
        status,
        attempts,
    }
}

fn guarded(body: ScenarioFn, fixtures: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
    AssertUnwindSafe(body(fixtures))
        .catch_unwind()
        .map(|caught| {
            caught.unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "test body panicked".to_string());
                Err(CheckError::assertion(format!("panic: {message}")))
            })
        })
        .boxed()
}

fn visual_diff_path(error: &CheckError) -> Option<PathBuf> {
    match error {
        CheckError::VisualMismatch { diff_path, .. } => diff_path.clone(),
        _ => None,
    }
}
