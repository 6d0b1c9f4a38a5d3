//! Output formatting and progress reporting

use std::path::Path;
use std::sync::{Mutex, PoisonError};

use console::{style, Style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use sitecheck::reporter::Reporter;
use sitecheck::{RunListener, TestResultEntry, TestStatus};

/// Progress reporter for a suite run
#[derive(Debug)]
pub struct ProgressReporter {
    term: Term,
    progress_bar: Mutex<Option<ProgressBar>>,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl ProgressReporter {
    /// Create a new progress reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            progress_bar: Mutex::new(None),
            use_color,
            quiet,
        }
    }

    fn bar(&self) -> Option<ProgressBar> {
        self.progress_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_line(&self, line: &str) {
        match self.bar() {
            Some(pb) => pb.println(line),
            None => {
                let _ = self.term.write_line(line);
            }
        }
    }

    /// Start a progress bar for `total` tests
    pub fn start_progress(&self, total: u64, message: &str) {
        if self.quiet {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_message(message.to_string());
        *self
            .progress_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pb);
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        let bar = self
            .progress_bar
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pb) = bar {
            pb.finish_and_clear();
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("ℹ").blue().bold().to_string()
        } else {
            "INFO".to_string()
        };
        self.write_line(&format!("{prefix} {message}"));
    }

    /// Print the end-of-run summary, failures first
    pub fn summary(&self, report: &Reporter, report_path: Option<&Path>) {
        let failures = report.failures();
        if self.quiet && failures.is_empty() {
            return;
        }

        let _ = self.term.write_line("");
        for entry in &failures {
            let _ = self.term.write_line(&format_entry(entry, self.use_color));
            for line in failure_details(entry) {
                let _ = self.term.write_line(&format!("    {line}"));
            }
        }

        let line = report.summary();
        let styled = if !self.use_color {
            line
        } else if report.all_passed() {
            Style::new().green().bold().apply_to(line).to_string()
        } else {
            Style::new().red().bold().apply_to(line).to_string()
        };
        let _ = self.term.write_line(&styled);

        if let Some(path) = report_path {
            if !self.quiet {
                let _ = self
                    .term
                    .write_line(&format!("report: {}", path.display()));
            }
        }
    }
}

impl RunListener for ProgressReporter {
    fn on_run_start(&self, total: usize, workers: usize) {
        self.info(&format!(
            "running {total} test{} using {workers} worker{}",
            plural(total),
            plural(workers)
        ));
        self.start_progress(total as u64, "");
    }

    fn on_attempt_start(&self, full_title: &str, retry: u32) {
        if retry > 0 {
            self.warning(&format!("retry #{retry}: {full_title}"));
        }
        if let Some(pb) = self.bar() {
            pb.set_message(full_title.to_string());
        }
    }

    fn on_test_end(&self, result: &TestResultEntry) {
        if !self.quiet || result.status.is_failed() {
            self.write_line(&format_entry(result, self.use_color));
        }
        if let Some(pb) = self.bar() {
            pb.inc(1);
        }
    }
}

const fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// One result line: marker, full title, duration and retry note
#[must_use]
pub fn format_entry(entry: &TestResultEntry, use_color: bool) -> String {
    let (marker, plain) = match entry.status {
        TestStatus::Passed => (style("✓").green().bold(), "PASS"),
        TestStatus::Flaky => (style("⚠").yellow().bold(), "FLAKY"),
        TestStatus::Failed => (style("✗").red().bold(), "FAIL"),
        TestStatus::TimedOut => (style("✗").red().bold(), "TIMEOUT"),
        TestStatus::Skipped => (style("-").dim(), "SKIP"),
    };
    let marker = if use_color {
        marker.to_string()
    } else {
        plain.to_string()
    };

    let mut line = format!("{marker} [{}] {}", entry.project, entry.full_title());
    if entry.status != TestStatus::Skipped {
        line.push_str(&format!(" ({}ms)", entry.duration().as_millis()));
    }
    match entry.retries() {
        0 => {}
        1 => line.push_str(" after 1 retry"),
        n => line.push_str(&format!(" after {n} retries")),
    }
    line
}

fn failure_details(entry: &TestResultEntry) -> Vec<String> {
    let mut lines = Vec::new();
    let Some(last) = entry.attempts.last() else {
        return lines;
    };
    if let Some(error) = &last.error {
        match &last.error_kind {
            Some(kind) => lines.push(format!("{kind}: {error}")),
            None => lines.push(error.clone()),
        }
    }
    if let Some(diff) = &last.diff_path {
        lines.push(format!("diff: {}", diff.display()));
    }
    lines.extend(
        last.artifacts
            .iter()
            .map(|path| format!("artifact: {}", path.display())),
    );
    lines
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sitecheck::reporter::AttemptRecord;
    use std::path::PathBuf;

    fn entry(status: TestStatus, retries: u32) -> TestResultEntry {
        let attempts = (0..=retries)
            .map(|retry| AttemptRecord {
                retry,
                status: if retry == retries && status == TestStatus::Flaky {
                    TestStatus::Passed
                } else if status == TestStatus::Flaky {
                    TestStatus::Failed
                } else {
                    status
                },
                duration_ms: 100,
                error_kind: None,
                error: None,
                artifacts: Vec::new(),
                diff_path: None,
            })
            .collect();
        TestResultEntry {
            suite: "Index Page".to_string(),
            title: "button click".to_string(),
            project: "chromium".to_string(),
            status,
            attempts,
        }
    }

    mod format_tests {
        use super::*;

        #[test]
        fn test_passed_line() {
            let line = format_entry(&entry(TestStatus::Passed, 0), false);
            assert_eq!(line, "PASS [chromium] Index Page › button click (100ms)");
        }

        #[test]
        fn test_flaky_line_mentions_retries() {
            let line = format_entry(&entry(TestStatus::Flaky, 2), false);
            assert!(line.starts_with("FLAKY"));
            assert!(line.ends_with("(300ms) after 2 retries"));
        }

        #[test]
        fn test_skipped_line_has_no_duration() {
            let skipped = TestResultEntry::skipped("Index Page", "later", "chromium");
            assert_eq!(
                format_entry(&skipped, false),
                "SKIP [chromium] Index Page › later"
            );
        }

        #[test]
        fn test_colored_marker() {
            let line = format_entry(&entry(TestStatus::Failed, 0), true);
            assert!(line.contains('✗') || line.contains("\u{1b}["));
        }
    }

    #[test]
    fn test_failure_details() {
        let mut failed = entry(TestStatus::Failed, 0);
        let last = failed.attempts.last_mut().unwrap();
        last.error_kind = Some("VisualMismatchError".to_string());
        last.error = Some("screenshot Index.png differs".to_string());
        last.diff_path = Some(PathBuf::from("out/Index-diff.png"));
        last.artifacts = vec![PathBuf::from("out/trace.json")];

        let details = failure_details(&failed);
        assert_eq!(
            details,
            vec![
                "VisualMismatchError: screenshot Index.png differs".to_string(),
                "diff: out/Index-diff.png".to_string(),
                "artifact: out/trace.json".to_string(),
            ]
        );
    }

    #[test]
    fn test_listener_in_quiet_mode_has_no_bar() {
        let reporter = ProgressReporter::new(false, true);
        reporter.on_run_start(3, 1);
        assert!(reporter.bar().is_none());
        reporter.on_test_end(&entry(TestStatus::Passed, 0));
        reporter.finish();
    }

    #[test]
    fn test_listener_tracks_progress() {
        let reporter = ProgressReporter::new(false, false);
        reporter.on_run_start(2, 1);
        reporter.on_attempt_start("Index Page › button click", 0);
        reporter.on_test_end(&entry(TestStatus::Passed, 0));
        assert_eq!(reporter.bar().map(|pb| pb.position()), Some(1));
        reporter.finish();
        assert!(reporter.bar().is_none());
    }
}
