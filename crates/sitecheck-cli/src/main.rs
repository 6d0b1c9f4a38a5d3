//! sitecheck: end-to-end browser checks for the static index page
//!
//! ## Usage
//!
//! ```bash
//! sitecheck test                      # Run every suite
//! sitecheck test --grep "button"      # Filter by full title
//! sitecheck test --update-snapshots   # Rewrite screenshot baselines
//! sitecheck serve --dir public        # Serve the page on :3000
//! sitecheck config --format yaml      # Show the resolved configuration
//! ```

use clap::Parser;
use sitecheck_cli::{handlers, Cli, CliConfig, CliResult, Commands, Verbosity};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = build_config(&cli);
    init_tracing(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: cannot start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli.command, &config)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &CliConfig) -> CliResult<ExitCode> {
    match command {
        Commands::Test(args) => {
            let report = handlers::execute_test(config, &args).await?;
            Ok(if report.all_passed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Serve(args) => {
            handlers::execute_serve(&args).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(args) => {
            handlers::execute_config(&args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.clone().into())
        .with_log_json(cli.log_json)
}

fn init_tracing(config: &CliConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.verbosity.default_log_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if config.log_json {
        builder.json().init();
    } else {
        builder.with_ansi(config.color.should_color()).init();
    }
}
