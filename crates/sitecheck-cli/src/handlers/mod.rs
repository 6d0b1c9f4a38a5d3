//! Command handlers - extracted from main.rs for testability

pub mod config;
pub mod serve;
pub mod test;

pub use config::{execute_config, render_config};
pub use serve::{execute_serve, format_server_url};
pub use test::{apply_test_args, compile_grep, execute_test, run_suites};
