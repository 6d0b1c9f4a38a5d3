//! The registered suites against the scripted browser session.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::Path;
use std::sync::Arc;

use sitecheck::{
    MockDriver, MockSession, RunConfig, RunMode, SnapshotUpdate, TestRunner, TestStatus,
};
use sitecheck_cli::handlers::run_suites;
use sitecheck_cli::{specs, ProgressReporter};

const ELEMENTS: &str = "Index Page › should display all the index elements correctly";
const SCREENSHOT: &str = "Index Page › should visually display all the index elements correctly";
const MESSAGE: &str = "Index Page › should display message after clicking action button";

fn config(mode: RunMode, root: &Path) -> RunConfig {
    RunConfig::for_mode(mode, None)
        .with_output_root(root.join("out"))
        .with_snapshot_dir(root.join("pages-screenshots"))
}

fn quiet() -> Arc<ProgressReporter> {
    Arc::new(ProgressReporter::new(false, true))
}

#[test]
fn test_registered_titles() {
    let suites = specs::all();
    assert_eq!(suites.len(), 1);
    let titles: Vec<String> = suites[0]
        .scenarios()
        .iter()
        .map(|s| sitecheck::reporter::full_title(suites[0].title(), s.title()))
        .collect();
    assert_eq!(titles, vec![ELEMENTS, SCREENSHOT, MESSAGE]);
}

#[test]
fn test_nothing_focused_so_ci_plan_is_allowed() {
    let dir = tempfile::tempdir().unwrap();
    let runner = TestRunner::new(
        config(RunMode::Ci, dir.path()),
        Arc::new(MockSession::serving_index()),
    );
    assert_eq!(runner.plan(&specs::all()).unwrap().len(), 3);
}

#[tokio::test]
async fn test_all_pass_once_baseline_exists() {
    let dir = tempfile::tempdir().unwrap();

    let first = run_suites(
        config(RunMode::Ci, dir.path()).with_snapshot_update(SnapshotUpdate::All),
        None,
        Arc::new(MockSession::serving_index()),
        quiet(),
    )
    .await
    .unwrap();
    assert!(first.all_passed());
    assert!(dir.path().join("pages-screenshots/Index.png").exists());

    let second = run_suites(
        config(RunMode::Ci, dir.path()),
        None,
        Arc::new(MockSession::serving_index()),
        quiet(),
    )
    .await
    .unwrap();
    assert_eq!(second.passed_count(), 3);
    assert!(dir.path().join("out/report/index.html").exists());
}

#[tokio::test]
async fn test_local_first_run_writes_baseline_and_fails_screenshot() {
    let dir = tempfile::tempdir().unwrap();
    let report = run_suites(
        config(RunMode::Local, dir.path()).with_workers(2),
        None,
        Arc::new(MockSession::serving_index()),
        quiet(),
    )
    .await
    .unwrap();

    let statuses: Vec<(String, TestStatus)> = report
        .results()
        .iter()
        .map(|r| (r.full_title(), r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (ELEMENTS.to_string(), TestStatus::Passed),
            (SCREENSHOT.to_string(), TestStatus::Failed),
            (MESSAGE.to_string(), TestStatus::Passed),
        ]
    );
    let failure = &report.failures()[0].attempts[0];
    assert_eq!(failure.error_kind.as_deref(), Some("BaselineMissingError"));
    assert!(dir.path().join("pages-screenshots/Index.png").exists());
}

#[tokio::test]
async fn test_ci_missing_baseline_fails_every_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let grep = regex::Regex::new("visually").unwrap();
    let report = run_suites(
        config(RunMode::Ci, dir.path()),
        Some(grep),
        Arc::new(MockSession::serving_index()),
        quiet(),
    )
    .await
    .unwrap();

    let entry = &report.results()[0];
    assert_eq!(entry.status, TestStatus::Failed);
    assert_eq!(entry.attempts.len(), 3);
    assert!(!dir.path().join("pages-screenshots/Index.png").exists());
}

#[tokio::test(start_paused = true)]
async fn test_broken_page_fails_with_retries_on_fresh_pages() {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(MockSession::new(|| {
        MockDriver::serving_index().with_title("Under construction")
    }));
    let grep = regex::Regex::new("should display all the index elements").unwrap();

    let report = run_suites(
        config(RunMode::Ci, dir.path()),
        Some(grep),
        session.clone(),
        quiet(),
    )
    .await
    .unwrap();

    // Only the non-visual elements check matches the filter.
    assert_eq!(report.total_count(), 1);
    let entry = &report.results()[0];
    assert_eq!(entry.status, TestStatus::Failed);
    assert_eq!(entry.retries(), 2);
    assert_eq!(session.pages_opened(), 3);
    assert_eq!(session.pages_closed(), 3);
    assert!(entry.error().unwrap().contains("page title"));
}
