//! Test command handler

use std::sync::Arc;

use regex::Regex;
use sitecheck::{BrowserSession, RunConfig, SnapshotUpdate, TestRunner};
use sitecheck::reporter::Reporter;

use crate::commands::TestArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::ProgressReporter;
use crate::specs;
use crate::web_server::ensure_web_server;

/// Apply command line overrides on top of the environment configuration
pub fn apply_test_args(mut config: RunConfig, args: &TestArgs) -> CliResult<RunConfig> {
    if let Some(workers) = args.workers {
        if workers == 0 {
            return Err(CliError::invalid_argument("--workers must be at least 1"));
        }
        config = config.with_workers(workers);
    }
    if let Some(retries) = args.retries {
        config = config.with_retries(retries);
    }
    if args.update_snapshots {
        config = config.with_snapshot_update(SnapshotUpdate::All);
    }
    if args.headed {
        config = config.with_headless(false);
    }
    if let Some(root) = &args.output {
        config = config.with_output_root(root);
    }
    config.validate()?;
    Ok(config)
}

/// Compile the `--grep` pattern
pub fn compile_grep(args: &TestArgs) -> CliResult<Option<Regex>> {
    args.grep
        .as_deref()
        .map(|pattern| {
            Regex::new(pattern)
                .map_err(|e| CliError::invalid_argument(format!("--grep {pattern:?}: {e}")))
        })
        .transpose()
}

/// Run every registered suite on `session` and write the report
pub async fn run_suites(
    config: RunConfig,
    grep: Option<Regex>,
    session: Arc<dyn BrowserSession>,
    progress: Arc<ProgressReporter>,
) -> CliResult<Reporter> {
    let report_dir = config.report_dir.clone();
    let mut runner = TestRunner::new(config, session).with_listener(progress.clone());
    if let Some(grep) = grep {
        runner = runner.with_grep(grep);
    }

    let outcome = runner.run(&specs::all()).await;
    progress.finish();
    let report = outcome?;

    let html = report.write(&report_dir)?;
    progress.summary(&report, Some(&html));
    Ok(report)
}

/// Execute the test command: bootstrap the server, launch the browser, run
/// the suites. Test failures are reported through the returned [`Reporter`].
pub async fn execute_test(cli: &CliConfig, args: &TestArgs) -> CliResult<Reporter> {
    let config = apply_test_args(RunConfig::from_env()?, args)?;
    let grep = compile_grep(args)?;

    let _server = match &config.web_server {
        Some(web_server) => Some(ensure_web_server(web_server).await?),
        None => None,
    };

    let session = launch_session(&config).await?;
    let progress = Arc::new(ProgressReporter::new(
        cli.color.should_color(),
        cli.verbosity.is_quiet(),
    ));

    let outcome = run_suites(config, grep, session.clone(), progress).await;
    if let Err(e) = session.close().await {
        tracing::warn!(error = %e, "browser did not close cleanly");
    }
    outcome
}

#[cfg(feature = "browser")]
async fn launch_session(config: &RunConfig) -> CliResult<Arc<dyn BrowserSession>> {
    let session = sitecheck::ChromiumSession::launch(config).await?;
    Ok(Arc::new(session))
}

#[cfg(not(feature = "browser"))]
async fn launch_session(_config: &RunConfig) -> CliResult<Arc<dyn BrowserSession>> {
    Err(CliError::BrowserUnavailable)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sitecheck::{MockSession, RunMode};
    use std::path::PathBuf;

    mod args_tests {
        use super::*;

        #[test]
        fn test_no_overrides_keeps_mode_defaults() {
            let base = RunConfig::for_mode(RunMode::Ci, None);
            let config = apply_test_args(base.clone(), &TestArgs::default()).unwrap();
            assert_eq!(config, base);
        }

        #[test]
        fn test_overrides() {
            let args = TestArgs {
                workers: Some(3),
                retries: Some(1),
                update_snapshots: true,
                headed: true,
                output: Some(PathBuf::from("out")),
                ..TestArgs::default()
            };
            let config = apply_test_args(RunConfig::for_mode(RunMode::Ci, None), &args).unwrap();
            assert_eq!(config.workers, 3);
            assert_eq!(config.retries, 1);
            assert_eq!(config.screenshot.update, SnapshotUpdate::All);
            assert!(!config.headless);
            assert_eq!(config.output_dir, PathBuf::from("out/test-results"));
            assert_eq!(config.report_dir, PathBuf::from("out/report"));
        }

        #[test]
        fn test_zero_workers_rejected() {
            let args = TestArgs {
                workers: Some(0),
                ..TestArgs::default()
            };
            let err = apply_test_args(RunConfig::default(), &args).unwrap_err();
            assert!(err.to_string().contains("--workers"));
        }
    }

    mod grep_tests {
        use super::*;

        #[test]
        fn test_no_grep() {
            assert!(compile_grep(&TestArgs::default()).unwrap().is_none());
        }

        #[test]
        fn test_invalid_grep() {
            let args = TestArgs {
                grep: Some("(".to_string()),
                ..TestArgs::default()
            };
            assert!(compile_grep(&args).is_err());
        }
    }

    #[tokio::test]
    async fn test_run_suites_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::for_mode(RunMode::Ci, None)
            .with_output_root(dir.path())
            .with_snapshot_dir(dir.path().join("pages-screenshots"))
            .with_snapshot_update(SnapshotUpdate::All);
        let grep = Regex::new("clicking").unwrap();

        let report = run_suites(
            config,
            Some(grep),
            Arc::new(MockSession::serving_index()),
            Arc::new(ProgressReporter::new(false, true)),
        )
        .await
        .unwrap();

        assert_eq!(report.total_count(), 1);
        assert!(report.all_passed());
        assert!(dir.path().join("report/index.html").exists());
        assert!(dir.path().join("report/results.json").exists());
    }
}
