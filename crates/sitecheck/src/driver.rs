//! PageDriver - abstract browser page automation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PageDriver (async trait)                                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────┐   ┌──────────────────────────┐  │
//! │  │  CdpPageDriver          │   │  MockDriver              │  │
//! │  │  (feature = "browser")  │   │  scripted in-memory DOM  │  │
//! │  │  chromiumoxide / CDP    │   │  for unit tests          │  │
//! │  └─────────────────────────┘   └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A driver is one browser tab. Every method is a single round trip; waiting,
//! retrying and timeouts live above this seam in [`crate::page`] and
//! [`crate::expect`].

use crate::config::{Viewport, CANONICAL_VIEWPORT};
use crate::locator::{normalize_name, AriaRole, ElementState, Selector};
use crate::result::{CheckError, CheckResult};
use async_trait::async_trait;
use image::{ImageEncoder, Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// One live browser tab
#[async_trait]
pub trait PageDriver: Send + Sync + std::fmt::Debug {
    /// Navigate to an absolute URL and wait for the load event
    async fn navigate(&self, url: &str) -> CheckResult<()>;

    /// Current document title
    async fn title(&self) -> CheckResult<String>;

    /// Resolve a selector and report the first match
    async fn query(&self, selector: &Selector) -> CheckResult<ElementState>;

    /// Click the center of the first match
    async fn click(&self, selector: &Selector) -> CheckResult<()>;

    /// Override the viewport size
    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()>;

    /// Capture a PNG screenshot
    async fn screenshot(&self, full_page: bool) -> CheckResult<Vec<u8>>;

    /// Close the tab
    async fn close(&self) -> CheckResult<()>;
}

/// An element of the scripted mock document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockElement {
    /// Tag name, lower case
    pub tag: String,
    /// `id` attribute
    pub id: Option<String>,
    /// Explicit `role` attribute
    pub role: Option<AriaRole>,
    /// `aria-label` attribute
    pub aria_label: Option<String>,
    /// Text content
    pub text: String,
    /// Rendered (not `display: none`)
    pub displayed: bool,
    /// Has no box while its text is empty
    pub collapses_when_empty: bool,
    /// `disabled` attribute absent
    pub enabled: bool,
    /// Queries answered as hidden before the element appears
    pub appears_after_queries: u32,
}

impl MockElement {
    /// Create a displayed, enabled element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_lowercase(),
            id: None,
            role: None,
            aria_label: None,
            text: String::new(),
            displayed: true,
            collapses_when_empty: false,
            enabled: true,
            appears_after_queries: 0,
        }
    }

    /// Set the id
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set an explicit role
    #[must_use]
    pub const fn with_role(mut self, role: AriaRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Set the aria-label
    #[must_use]
    pub fn with_aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    /// Hide the element
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.displayed = false;
        self
    }

    /// Disable the element
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Give the element no box while its text is empty, like an empty `<p>`
    #[must_use]
    pub const fn collapsing(mut self) -> Self {
        self.collapses_when_empty = true;
        self
    }

    /// Report the element hidden for the first `queries` lookups
    #[must_use]
    pub const fn appears_after(mut self, queries: u32) -> Self {
        self.appears_after_queries = queries;
        self
    }

    fn implicit_role(&self) -> Option<AriaRole> {
        self.role.or(match self.tag.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => Some(AriaRole::Heading),
            "button" => Some(AriaRole::Button),
            "a" => Some(AriaRole::Link),
            "img" => Some(AriaRole::Img),
            "input" | "textarea" => Some(AriaRole::Textbox),
            _ => None,
        })
    }

    fn accessible_name(&self) -> String {
        normalize_name(self.aria_label.as_deref().unwrap_or(&self.text))
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector {
            Selector::Id(id) => self.id.as_deref() == Some(id.as_str()),
            Selector::Css(css) => css.strip_prefix('#').map_or_else(
                || css.eq_ignore_ascii_case(&self.tag),
                |id| self.id.as_deref() == Some(id),
            ),
            Selector::Role { role, name } => {
                self.implicit_role() == Some(*role)
                    && name
                        .as_deref()
                        .map_or(true, |n| self.accessible_name().contains(&normalize_name(n)))
            }
            Selector::Text(text) => self.text.contains(text.as_str()),
        }
    }

    fn is_visible(&self) -> bool {
        self.displayed
            && self.appears_after_queries == 0
            && !(self.collapses_when_empty && self.text.is_empty())
    }
}

/// Clicking `trigger_id` sets the text of `target_id`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickHandler {
    /// Element whose click fires the handler
    pub trigger_id: String,
    /// Element whose text is replaced
    pub target_id: String,
    /// Replacement text
    pub text: String,
}

#[derive(Debug, Default)]
struct MockState {
    url: String,
    title: String,
    document: Vec<MockElement>,
    viewport: Option<Viewport>,
    history: Vec<String>,
    closed: bool,
}

/// Scripted in-memory page for unit testing.
///
/// The document template is loaded on every navigation, so handler effects do
/// not survive a reload. Screenshots are rendered deterministically from the
/// visible elements unless fixed bytes are supplied.
#[derive(Debug)]
pub struct MockDriver {
    title: String,
    template: Vec<MockElement>,
    handlers: Vec<ClickHandler>,
    reachable: bool,
    navigation_delay: Duration,
    click_delay: Duration,
    screenshot: Option<Vec<u8>>,
    closed_counter: Option<Arc<AtomicUsize>>,
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    /// Create an empty, reachable page
    #[must_use]
    pub fn new() -> Self {
        Self {
            title: String::new(),
            template: Vec::new(),
            handlers: Vec::new(),
            reachable: true,
            navigation_delay: Duration::ZERO,
            click_delay: Duration::ZERO,
            screenshot: None,
            closed_counter: None,
            state: Mutex::new(MockState {
                url: "about:blank".to_string(),
                ..MockState::default()
            }),
        }
    }

    /// The page served from `public/`: heading, action button, empty message
    /// and a click handler writing `Button clicked!`.
    #[must_use]
    pub fn serving_index() -> Self {
        Self::new()
            .with_title("Test Website")
            .with_element(MockElement::new("h1").with_text("Test Website"))
            .with_element(
                MockElement::new("p")
                    .with_text("A static page exercised by the sitecheck end-to-end suite."),
            )
            .with_element(
                MockElement::new("button")
                    .with_id("actionButton")
                    .with_text("Click me"),
            )
            .with_element(MockElement::new("p").with_id("message").collapsing())
            .with_click_handler("actionButton", "message", "Button clicked!")
    }

    /// Set the document title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Append an element to the document template
    #[must_use]
    pub fn with_element(mut self, element: MockElement) -> Self {
        self.template.push(element);
        self
    }

    /// Register a click handler
    #[must_use]
    pub fn with_click_handler(
        mut self,
        trigger_id: impl Into<String>,
        target_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        self.handlers.push(ClickHandler {
            trigger_id: trigger_id.into(),
            target_id: target_id.into(),
            text: text.into(),
        });
        self
    }

    /// Make every navigation fail
    #[must_use]
    pub const fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    /// Delay every navigation
    #[must_use]
    pub const fn with_navigation_delay(mut self, delay: Duration) -> Self {
        self.navigation_delay = delay;
        self
    }

    /// Delay every click dispatch
    #[must_use]
    pub const fn with_click_delay(mut self, delay: Duration) -> Self {
        self.click_delay = delay;
        self
    }

    /// Return fixed bytes from every screenshot
    #[must_use]
    pub fn with_screenshot(mut self, png: Vec<u8>) -> Self {
        self.screenshot = Some(png);
        self
    }

    /// Increment `counter` when the page is closed
    #[must_use]
    pub fn with_close_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        self.closed_counter = Some(counter);
        self
    }

    /// Calls received so far, e.g. `navigate:http://localhost:3000/`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().history.clone()
    }

    /// Check if a call with this prefix was made
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.lock().history.iter().any(|c| c.starts_with(method))
    }

    /// Current text of the element with `id`
    #[must_use]
    pub fn text_of(&self, id: &str) -> Option<String> {
        self.lock()
            .document
            .iter()
            .find(|e| e.id.as_deref() == Some(id))
            .map(|e| e.text.clone())
    }

    /// Whether the page has been closed
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn open_state(&self) -> CheckResult<MutexGuard<'_, MockState>> {
        let state = self.lock();
        if state.closed {
            return Err(CheckError::page("target page has been closed"));
        }
        Ok(state)
    }

    fn render(state: &MockState) -> CheckResult<Vec<u8>> {
        let Viewport { width, height } = state.viewport.unwrap_or(CANONICAL_VIEWPORT);
        let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        // One 24px band per visible element; text darkens the band.
        let band = 24u32;
        for (row, element) in state.document.iter().filter(|e| e.is_visible()).enumerate() {
            let top = 16 + row as u32 * (band + 8);
            if top + band > height {
                break;
            }
            let shade = if element.text.is_empty() { 200 } else { 40 };
            let text_width = (element.text.chars().count() as u32 * 8).clamp(16, width / 2);
            for y in top..top + band {
                for x in 16..16 + text_width {
                    img.put_pixel(x, y, Rgba([shade, shade, shade, 255]));
                }
            }
        }

        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .map_err(|e| CheckError::Screenshot {
                message: format!("failed to encode mock screenshot: {e}"),
            })?;
        Ok(buffer)
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> CheckResult<()> {
        self.open_state()?.history.push(format!("navigate:{url}"));
        if !self.navigation_delay.is_zero() {
            tokio::time::sleep(self.navigation_delay).await;
        }
        if !self.reachable {
            return Err(CheckError::Navigation {
                url: url.to_string(),
                message: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        let mut state = self.open_state()?;
        state.url = url.to_string();
        state.title.clone_from(&self.title);
        state.document.clone_from(&self.template);
        Ok(())
    }

    async fn title(&self) -> CheckResult<String> {
        Ok(self.open_state()?.title.clone())
    }

    async fn query(&self, selector: &Selector) -> CheckResult<ElementState> {
        let mut state = self.open_state()?;
        let mut matches = state
            .document
            .iter_mut()
            .filter(|e| e.matches(selector))
            .collect::<Vec<_>>();
        let count = matches.len();
        let Some(first) = matches.first_mut() else {
            return Ok(ElementState::missing());
        };
        let visible = first.is_visible();
        first.appears_after_queries = first.appears_after_queries.saturating_sub(1);
        Ok(ElementState {
            count,
            visible,
            enabled: first.enabled,
            text: Some(first.text.clone()),
        })
    }

    async fn click(&self, selector: &Selector) -> CheckResult<()> {
        if !self.click_delay.is_zero() {
            tokio::time::sleep(self.click_delay).await;
        }
        let mut state = self.open_state()?;
        state.history.push(format!("click:{selector}"));

        let trigger = state
            .document
            .iter()
            .find(|e| e.matches(selector))
            .cloned()
            .ok_or_else(|| CheckError::Actionability {
                selector: selector.to_string(),
                message: "no matching element".to_string(),
            })?;

        for handler in &self.handlers {
            if trigger.id.as_deref() == Some(handler.trigger_id.as_str()) {
                if let Some(target) = state
                    .document
                    .iter_mut()
                    .find(|e| e.id.as_deref() == Some(handler.target_id.as_str()))
                {
                    target.text.clone_from(&handler.text);
                }
            }
        }
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()> {
        let mut state = self.open_state()?;
        state.history.push(format!("viewport:{viewport}"));
        state.viewport = Some(viewport);
        Ok(())
    }

    async fn screenshot(&self, full_page: bool) -> CheckResult<Vec<u8>> {
        let mut state = self.open_state()?;
        state.history.push(format!("screenshot:full_page={full_page}"));
        match &self.screenshot {
            Some(png) => Ok(png.clone()),
            None => Self::render(&state),
        }
    }

    async fn close(&self) -> CheckResult<()> {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            state.history.push("close".to_string());
            if let Some(counter) = &self.closed_counter {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}
