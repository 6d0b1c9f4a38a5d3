//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// sitecheck: end-to-end browser checks for the static index page
#[derive(Parser, Debug)]
#[command(name = "sitecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the browser suite against the page
    Test(TestArgs),

    /// Serve the static page directory
    Serve(ServeArgs),

    /// Print the resolved run configuration
    Config(ConfigArgs),
}

/// Arguments for the test command
#[derive(Parser, Debug, Default)]
pub struct TestArgs {
    /// Only run tests whose full title matches this regex
    #[arg(short, long)]
    pub grep: Option<String>,

    /// Number of parallel workers (default: 1 in CI, all cores locally)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Retries per failing test (default: 2 in CI, 0 locally)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Overwrite screenshot baselines with the current captures
    #[arg(short = 'u', long)]
    pub update_snapshots: bool,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Root directory for test results and the report
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Directory to serve
    #[arg(short = 'd', long = "dir", default_value = "public")]
    pub directory: PathBuf,

    /// HTTP port to listen on
    #[arg(short, long, default_value = "3000")]
    pub port: u16,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Output format
    #[arg(short, long, default_value = "json")]
    pub format: ConfigFormat,
}

/// Format for printed configuration
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigFormat {
    /// Pretty JSON
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// Color argument
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}
