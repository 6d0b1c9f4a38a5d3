//! The index page: title, heading, action button and message.

use regex::Regex;

use crate::config::CANONICAL_VIEWPORT;
use crate::expect::{expect, expect_page};
use crate::locator::{AriaRole, Locator};
use crate::page::Page;
use crate::page_object::PageObject;
use crate::result::{CheckError, CheckResult};

const DEFAULT_URL: &str = "/";
const DEFAULT_SCREENSHOT: &str = "Index.png";
const DEFAULT_TITLE: &str = "Test Website";
const ACTION_BUTTON_ID: &str = "actionButton";
const MESSAGE_ID: &str = "message";

/// Page object for `/`
#[derive(Debug, Clone)]
pub struct IndexPage {
    page: Page,
    url: String,
    screenshot_path: Vec<String>,
    title: String,
    heading: Locator,
    action_button: Locator,
    message: Locator,
}

/// Builder for [`IndexPage`]; every field has the served page's default
#[derive(Debug, Clone)]
pub struct IndexPageBuilder {
    page: Page,
    url: String,
    screenshot_path: Vec<String>,
    title: String,
    heading_name: String,
}

impl IndexPageBuilder {
    /// URL path to open
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Snapshot name path of the baseline
    #[must_use]
    pub fn screenshot_path<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.screenshot_path = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Title pattern (a regular expression)
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Accessible name of the page heading
    #[must_use]
    pub fn heading_name(mut self, name: impl Into<String>) -> Self {
        self.heading_name = name.into();
        self
    }

    /// Build the page object. Issues no browser calls.
    #[must_use]
    pub fn build(self) -> IndexPage {
        let page = self.page;
        IndexPage {
            heading: page.get_by_role(AriaRole::Heading, self.heading_name),
            action_button: page.locator(format!("#{ACTION_BUTTON_ID}")),
            message: page.locator(format!("#{MESSAGE_ID}")),
            page,
            url: self.url,
            screenshot_path: self.screenshot_path,
            title: self.title,
        }
    }
}

impl IndexPage {
    /// Start a builder over `page`
    #[must_use]
    pub fn builder(page: Page) -> IndexPageBuilder {
        IndexPageBuilder {
            page,
            url: DEFAULT_URL.to_string(),
            screenshot_path: vec![DEFAULT_SCREENSHOT.to_string()],
            title: DEFAULT_TITLE.to_string(),
            heading_name: DEFAULT_TITLE.to_string(),
        }
    }

    /// Index page with all defaults
    #[must_use]
    pub fn new(page: Page) -> Self {
        Self::builder(page).build()
    }

    /// Page heading locator
    #[must_use]
    pub const fn heading(&self) -> &Locator {
        &self.heading
    }

    /// Action button locator
    #[must_use]
    pub const fn action_button(&self) -> &Locator {
        &self.action_button
    }

    /// Message locator
    #[must_use]
    pub const fn message(&self) -> &Locator {
        &self.message
    }

    /// Locator for `#id` on this page
    #[must_use]
    pub fn custom_locator(&self, id: &str) -> Locator {
        self.page.locator(format!("#{id}"))
    }

    /// Title matches the pattern, then heading and action button are visible.
    /// Stops at the first failing check.
    pub async fn assert_page_elements_loaded(&self) -> CheckResult<()> {
        let title = Regex::new(&self.title)
            .map_err(|e| CheckError::config(format!("invalid title pattern: {e}")))?;
        expect_page(&self.page).to_have_title(&title).await?;
        expect(&self.heading).to_be_visible().await?;
        expect(&self.action_button).to_be_visible().await
    }

    /// Full-page capture at 1280x720 matches the stored baseline
    pub async fn assert_page_screenshot(&self) -> CheckResult<()> {
        self.page.set_viewport_size(CANONICAL_VIEWPORT).await?;
        let segments = self
            .screenshot_path
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>();
        expect_page(&self.page).to_have_screenshot(&segments).await
    }

    /// Click the action button once it is actionable
    pub async fn click_action_button(&self) -> CheckResult<()> {
        self.action_button.click().await
    }

    /// Message is visible and reads `expected`
    pub async fn assert_message_visible(&self, expected: &str) -> CheckResult<()> {
        expect(&self.message).to_be_visible().await?;
        expect(&self.message).to_have_text(expected).await
    }
}

impl PageObject for IndexPage {
    fn url(&self) -> &str {
        &self.url
    }

    fn page(&self) -> &Page {
        &self.page
    }
}
