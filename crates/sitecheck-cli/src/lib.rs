//! sitecheck CLI library
//!
//! Command line, static page server, server bootstrap and progress output
//! for running the registered browser suites.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
pub mod dev_server;
mod error;
pub mod handlers;
mod output;
pub mod specs;
pub mod web_server;

pub use commands::{Cli, ColorArg, Commands, ConfigArgs, ConfigFormat, ServeArgs, TestArgs};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use dev_server::{get_mime_type, DevServer, DevServerConfig, DevServerConfigBuilder, RunningServer};
pub use error::{CliError, CliResult};
pub use output::{format_entry, ProgressReporter};
pub use web_server::{ensure_web_server, WebServerHandle};
