//! Reporter - HTML and JSON test reports.
//!
//! ```text
//! <report_dir>/
//! ├── index.html     human-readable summary, one row per test
//! └── results.json   every test with all of its attempts
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::result::CheckResult;

/// Test result status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Passed on the first attempt
    Passed,
    /// Passed after at least one failed attempt
    Flaky,
    /// Every attempt failed
    Failed,
    /// The last attempt exceeded the test timeout
    TimedOut,
    /// Not run
    Skipped,
}

impl TestStatus {
    /// Check if status is passing
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self, Self::Passed | Self::Flaky)
    }

    /// Check if status is failing
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed | Self::TimedOut)
    }

    /// Lower-case name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Flaky => "flaky",
            Self::Failed => "failed",
            Self::TimedOut => "timedout",
            Self::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt of one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 0 for the first run, then 1, 2, ... for retries
    pub retry: u32,
    /// Attempt outcome (never `Flaky` or `Skipped`)
    pub status: TestStatus,
    /// Wall time in milliseconds
    pub duration_ms: u64,
    /// Error kind, e.g. `AssertionError`
    pub error_kind: Option<String>,
    /// Error message
    pub error: Option<String>,
    /// Artifact files written for the attempt
    pub artifacts: Vec<PathBuf>,
    /// Visual diff image, when a screenshot comparison failed
    pub diff_path: Option<PathBuf>,
}

/// Individual test result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResultEntry {
    /// `describe` block title
    pub suite: String,
    /// Test title
    pub title: String,
    /// Browser project
    pub project: String,
    /// Final status across attempts
    pub status: TestStatus,
    /// Attempts in order
    pub attempts: Vec<AttemptRecord>,
}

impl TestResultEntry {
    /// Create a skipped test result
    #[must_use]
    pub fn skipped(
        suite: impl Into<String>,
        title: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            suite: suite.into(),
            title: title.into(),
            project: project.into(),
            status: TestStatus::Skipped,
            attempts: Vec::new(),
        }
    }

    /// `suite › title`
    #[must_use]
    pub fn full_title(&self) -> String {
        full_title(&self.suite, &self.title)
    }

    /// Total time across attempts
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.attempts.iter().map(|a| a.duration_ms).sum())
    }

    /// Error of the last attempt
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.attempts.last().and_then(|a| a.error.as_deref())
    }

    /// Number of retries used
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.attempts.last().map_or(0, |a| a.retry)
    }
}

/// `suite › title`, the way tests are displayed and filtered
#[must_use]
pub fn full_title(suite: &str, title: &str) -> String {
    if suite.is_empty() {
        title.to_string()
    } else {
        format!("{suite} › {title}")
    }
}

/// Collected results of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reporter {
    suite_name: String,
    started_at: DateTime<Utc>,
    duration_ms: u64,
    results: Vec<TestResultEntry>,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new("sitecheck")
    }
}

impl Reporter {
    /// Create an empty report starting now
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            suite_name: name.into(),
            started_at: Utc::now(),
            duration_ms: 0,
            results: Vec::new(),
        }
    }

    /// Record one test result
    pub fn record(&mut self, result: TestResultEntry) {
        self.results.push(result);
    }

    /// Mark the run finished after `elapsed`
    pub fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = elapsed.as_millis() as u64;
    }

    /// Wall time of the run
    #[must_use]
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// When the run started
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Tests passed on the first attempt
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.count(TestStatus::Passed)
    }

    /// Tests passed after a retry
    #[must_use]
    pub fn flaky_count(&self) -> usize {
        self.count(TestStatus::Flaky)
    }

    /// Tests failed or timed out
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status.is_failed()).count()
    }

    /// Tests not run
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.count(TestStatus::Skipped)
    }

    /// Get total test count
    #[must_use]
    pub fn total_count(&self) -> usize {
        self.results.len()
    }

    /// Check if no test failed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.failed_count() == 0
    }

    /// Get test results
    #[must_use]
    pub fn results(&self) -> &[TestResultEntry] {
        &self.results
    }

    /// Get failing tests
    #[must_use]
    pub fn failures(&self) -> Vec<&TestResultEntry> {
        self.results
            .iter()
            .filter(|r| r.status.is_failed())
            .collect()
    }

    /// Generate summary string
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = vec![format!("{} passed", self.passed_count())];
        if self.flaky_count() > 0 {
            parts.push(format!("{} flaky", self.flaky_count()));
        }
        if self.failed_count() > 0 {
            parts.push(format!("{} failed", self.failed_count()));
        }
        if self.skipped_count() > 0 {
            parts.push(format!("{} skipped", self.skipped_count()));
        }
        format!(
            "{}: {} ({:.1}s)",
            self.suite_name,
            parts.join(", "),
            self.duration().as_secs_f64()
        )
    }

    /// Write `index.html` and `results.json` into `dir`, returning the HTML path
    ///
    /// # Errors
    ///
    /// Returns error if file writing fails
    pub fn write(&self, dir: &Path) -> CheckResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("results.json"), self.render_json()?)?;
        let html_path = dir.join("index.html");
        std::fs::write(&html_path, self.render_html())?;
        tracing::info!(path = %html_path.display(), "report written");
        Ok(html_path)
    }

    /// Render the JSON report
    pub fn render_json(&self) -> CheckResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render HTML report content
    #[must_use]
    pub fn render_html(&self) -> String {
        let mut html = String::new();

        html.push_str(r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>sitecheck report</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 20px; }
        .summary { background: #f5f5f5; padding: 20px; border-radius: 8px; margin-bottom: 20px; }
        .test { padding: 10px; margin: 5px 0; border-radius: 4px; }
        .test.passed { background: #e8f5e9; border-left: 4px solid #4caf50; }
        .test.flaky { background: #fffde7; border-left: 4px solid #fbc02d; }
        .test.failed, .test.timedout { background: #ffebee; border-left: 4px solid #f44336; }
        .test.skipped { background: #fff3e0; border-left: 4px solid #ff9800; }
        .error { color: #d32f2f; font-family: monospace; white-space: pre-wrap; }
        .artifacts a { margin-right: 10px; }
        .visual-diff img { max-width: 400px; border: 1px solid #ddd; }
    </style>
</head>
<body>
"#);

        html.push_str(&format!(
            r#"<div class="summary">
    <h1>{}</h1>
    <h2>{}</h2>
    <p>Started {} · {} tests</p>
</div>
"#,
            escape_html(&self.suite_name),
            escape_html(&self.summary()),
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.total_count(),
        ));

        for result in &self.results {
            html.push_str(&format!(
                r#"<div class="test {}">
    <strong>{}</strong> [{}] - {} ({:.2}s, {} retries)
"#,
                result.status,
                escape_html(&result.full_title()),
                escape_html(&result.project),
                result.status,
                result.duration().as_secs_f64(),
                result.retries(),
            ));

            if let Some(error) = result.error() {
                html.push_str(&format!(
                    "    <div class=\"error\">{}</div>\n",
                    escape_html(error)
                ));
            }

            if let Some(last) = result.attempts.last() {
                if let Some(diff) = &last.diff_path {
                    html.push_str(&format!(
                        "    <div class=\"visual-diff\"><img alt=\"Diff\" src=\"{}\"></div>\n",
                        escape_html(&diff.display().to_string())
                    ));
                }
                if !last.artifacts.is_empty() {
                    html.push_str("    <div class=\"artifacts\">");
                    for artifact in &last.artifacts {
                        let path = escape_html(&artifact.display().to_string());
                        html.push_str(&format!("<a href=\"{path}\">{path}</a>"));
                    }
                    html.push_str("</div>\n");
                }
            }

            html.push_str("</div>\n");
        }

        html.push_str(
            r#"
<footer>
    <p>Generated by sitecheck</p>
</footer>
</body>
</html>
"#,
        );

        html
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
