//! sitecheck: page objects, fixtures and visual regression for browser tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   sitecheck Architecture                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  RunConfig ──► TestRunner ──► FixtureProvider ──► IndexPage     │
//! │                    │                │                 │         │
//! │                    ▼                ▼                 ▼         │
//! │                Reporter      BrowserSession      Locator/expect │
//! │                                     │                 │         │
//! │                                     ▼                 ▼         │
//! │                               PageDriver ◄──────── Page         │
//! │                          (chromium CDP or mock)                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sitecheck::prelude::*;
//!
//! fn shows_message(f: &Fixtures) -> BoxFuture<'_, CheckResult<()>> {
//!     async move {
//!         f.index_page.goto().await?;
//!         f.index_page.click_action_button().await?;
//!         f.index_page.assert_message_visible("Button clicked!").await
//!     }
//!     .boxed()
//! }
//!
//! let suite = Suite::describe("Index Page").test("shows message", shows_message);
//! let report = TestRunner::new(RunConfig::from_env()?, session).run(&[suite]).await?;
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

pub mod browser;
pub mod config;
pub mod driver;
pub mod expect;
pub mod fixture;
pub mod locator;
pub mod page;
pub mod page_object;
pub mod pages;
pub mod reporter;
pub mod result;
pub mod runner;
pub mod trace;
pub mod visual_regression;
pub mod wait;

pub use browser::{BrowserSession, MockSession};
#[cfg(feature = "browser")]
pub use browser::{CdpPageDriver, ChromiumSession};
pub use config::{
    ArtifactCapture, BrowserProject, RunConfig, RunMode, ScreenshotConfig, SnapshotUpdate,
    Viewport, WebServerConfig,
};
pub use driver::{MockDriver, MockElement, PageDriver};
pub use expect::{expect, expect_page};
pub use fixture::{FixtureProvider, Fixtures};
pub use locator::{AriaRole, Locator, Selector};
pub use page::{Page, PageSettings};
pub use page_object::PageObject;
pub use pages::IndexPage;
pub use reporter::{Reporter, TestResultEntry, TestStatus};
pub use result::{CheckError, CheckResult};
pub use runner::{RunListener, ScenarioFn, Suite, TestRunner};
pub use visual_regression::{ImageDiffResult, VisualRegressionTester};

/// Everything a test file needs
pub mod prelude {
    pub use crate::expect::{expect, expect_page};
    pub use crate::fixture::Fixtures;
    pub use crate::page_object::PageObject;
    pub use crate::pages::IndexPage;
    pub use crate::result::{CheckError, CheckResult};
    pub use crate::runner::{Suite, TestRunner};
    pub use crate::RunConfig;
    pub use futures::future::BoxFuture;
    pub use futures::FutureExt;
}
