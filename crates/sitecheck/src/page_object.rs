//! Page Object Model support.
//!
//! A page object owns one [`Page`] and exposes the page's semantic actions and
//! assertions. Every locator it hands out derives from that page.
//!
//! ```ignore
//! struct LoginPage {
//!     page: Page,
//!     submit: Locator,
//! }
//!
//! #[async_trait]
//! impl PageObject for LoginPage {
//!     fn url(&self) -> &str {
//!         "/login"
//!     }
//!
//!     fn page(&self) -> &Page {
//!         &self.page
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::page::Page;
use crate::result::CheckResult;

/// A page or component of the application under test
#[async_trait]
pub trait PageObject: Send + Sync {
    /// URL path of the page, resolved against the base URL
    fn url(&self) -> &str;

    /// The page handle every locator of this object derives from
    fn page(&self) -> &Page;

    /// Page name for logging
    fn page_name(&self) -> &str {
        std::any::type_name::<Self>()
            .rsplit("::")
            .next()
            .unwrap_or("page")
    }

    /// Navigate to [`PageObject::url`]
    async fn goto(&self) -> CheckResult<()> {
        tracing::debug!(page = self.page_name(), url = self.url(), "open page object");
        self.page().goto(self.url()).await
    }

    /// Check whether the page's current URL matches [`PageObject::url`]
    fn is_current(&self) -> bool {
        self.page()
            .url()
            .is_some_and(|current| url_matches(self.url(), &current))
    }
}

/// Match a URL against a path pattern where a trailing `*` matches any suffix.
///
/// Only the path part of `url` is compared; scheme, host and query are ignored.
#[must_use]
pub fn url_matches(pattern: &str, url: &str) -> bool {
    let path = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest.find('/').map_or("/", |i| &rest[i..]));
    let path = path.split(['?', '#']).next().unwrap_or(path);

    pattern.strip_suffix('*').map_or_else(
        || path == pattern,
        |prefix| path.starts_with(prefix),
    )
}
