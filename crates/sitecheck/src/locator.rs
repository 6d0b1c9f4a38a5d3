//! Locator abstraction for element selection and interaction.
//!
//! # Design Philosophy
//!
//! - **Lazy**: building a [`Locator`] never talks to the browser. The selector
//!   is re-resolved on every action or query.
//! - **Auto-Waiting**: actions wait for the element to be actionable (visible,
//!   enabled, uniquely matched) before dispatching.
//! - **Strict Selection**: more than one match is an error, never a guess.
//! - **Bound**: a locator is derived from exactly one [`Page`] and only ever
//!   queries that page.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::page::Page;
use crate::result::{CheckError, CheckResult};
use crate::wait::{poll_until, Probe, WaitOptions};

/// ARIA roles understood by role selectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AriaRole {
    /// `h1`-`h6` or `role=heading`
    Heading,
    /// `button`, button-like inputs or `role=button`
    Button,
    /// `a[href]` or `role=link`
    Link,
    /// Text inputs, `textarea` or `role=textbox`
    Textbox,
    /// `img` or `role=img`
    Img,
}

impl AriaRole {
    /// Role name as written in ARIA
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heading => "heading",
            Self::Button => "button",
            Self::Link => "link",
            Self::Textbox => "textbox",
            Self::Img => "img",
        }
    }

    /// CSS selector list of elements carrying this role implicitly or explicitly
    #[must_use]
    pub const fn css_candidates(self) -> &'static str {
        match self {
            Self::Heading => "h1, h2, h3, h4, h5, h6, [role=heading]",
            Self::Button => {
                "button, input[type=button], input[type=submit], input[type=reset], [role=button]"
            }
            Self::Link => "a[href], area[href], [role=link]",
            Self::Textbox => {
                "textarea, input:not([type]), input[type=text], input[type=email], input[type=search], [role=textbox]"
            }
            Self::Img => "img, [role=img]",
        }
    }
}

impl std::fmt::Display for AriaRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// Element id (without the leading `#`)
    Id(String),
    /// ARIA role, optionally filtered by accessible name
    Role {
        /// Role to match
        role: AriaRole,
        /// Accessible name; case-insensitive substring match after whitespace normalisation
        name: Option<String>,
    },
    /// Leaf elements whose text contains the given string
    Text(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an id selector
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a role selector with an accessible name
    #[must_use]
    pub fn role(role: AriaRole, name: impl Into<String>) -> Self {
        Self::Role {
            role,
            name: Some(name.into()),
        }
    }

    /// Create a text selector
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// JavaScript expression evaluating to an array of every matching element
    #[must_use]
    pub fn to_query_all(&self) -> String {
        match self {
            Self::Css(css) => format!("Array.from(document.querySelectorAll({}))", js_str(css)),
            Self::Id(id) => format!("[document.getElementById({})].filter(Boolean)", js_str(id)),
            Self::Role { role, name } => {
                let candidates = format!(
                    "Array.from(document.querySelectorAll({}))",
                    js_str(role.css_candidates())
                );
                match name {
                    None => candidates,
                    Some(name) => format!(
                        "{candidates}.filter(el => (el.getAttribute('aria-label') || el.textContent || '')\
                         .replace(/\\s+/g, ' ').trim().toLowerCase().includes({}))",
                        js_str(&normalize_name(name))
                    ),
                }
            }
            Self::Text(text) => format!(
                "Array.from(document.querySelectorAll('body *'))\
                 .filter(el => el.children.length === 0 && (el.textContent || '').includes({}))",
                js_str(text)
            ),
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(css) => write!(f, "{css}"),
            Self::Id(id) => write!(f, "#{id}"),
            Self::Role { role, name: None } => write!(f, "role={role}"),
            Self::Role {
                role,
                name: Some(name),
            } => write!(f, "role={role}[name={name:?}]"),
            Self::Text(text) => write!(f, "text={text:?}"),
        }
    }
}

/// Lower-case and collapse whitespace, the way accessible names are compared
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| String::from("\"\""))
}

/// Observed state of the first element a selector resolves to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementState {
    /// Number of matching elements
    pub count: usize,
    /// First match is rendered with a non-empty box and not hidden
    pub visible: bool,
    /// First match is not disabled
    pub enabled: bool,
    /// Text content of the first match
    pub text: Option<String>,
}

impl ElementState {
    /// State of a selector that matched nothing
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            count: 0,
            visible: false,
            enabled: false,
            text: None,
        }
    }

    /// Whether the selector matched anything
    #[must_use]
    pub const fn exists(&self) -> bool {
        self.count > 0
    }

    /// Whether a click can be dispatched
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        self.count == 1 && self.visible && self.enabled
    }

    /// Short human description, used in failure messages
    #[must_use]
    pub fn describe(&self) -> String {
        if self.count == 0 {
            "no matching element".to_string()
        } else if self.count > 1 {
            format!("{} matching elements", self.count)
        } else if !self.visible {
            "element is not visible".to_string()
        } else if !self.enabled {
            "element is disabled".to_string()
        } else {
            "element is visible and enabled".to_string()
        }
    }
}

/// A lazily resolved reference to an element on one page
#[derive(Debug, Clone)]
pub struct Locator {
    page: Page,
    selector: Selector,
    timeout: Option<Duration>,
}

impl Locator {
    /// Create a locator bound to `page`. Performs no browser call.
    #[must_use]
    pub(crate) const fn new(page: Page, selector: Selector) -> Self {
        Self {
            page,
            selector,
            timeout: None,
        }
    }

    /// Override the action timeout for this locator
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the page this locator queries
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    /// Resolve the selector once and report the element state
    pub async fn state(&self) -> CheckResult<ElementState> {
        self.page.query(&self.selector).await
    }

    /// Resolve once: is the element visible right now
    pub async fn is_visible(&self) -> CheckResult<bool> {
        Ok(self.state().await?.visible)
    }

    /// Resolve once: text content of the element, if it exists
    pub async fn text_content(&self) -> CheckResult<Option<String>> {
        Ok(self.state().await?.text)
    }

    /// Wait until the element is actionable, then click it.
    ///
    /// # Errors
    ///
    /// `Actionability` if the element is not uniquely matched, visible and
    /// enabled before the action timeout.
    pub async fn click(&self) -> CheckResult<()> {
        let timeout = self
            .timeout
            .unwrap_or_else(|| self.page.settings().action_timeout);
        let options = WaitOptions::new().with_timeout(timeout);
        let started = Instant::now();

        let waited = poll_until(&options, || async {
            let state = self.state().await?;
            if state.count > 1 {
                return Err(CheckError::Actionability {
                    selector: self.selector.to_string(),
                    message: format!("strict mode violation: {}", state.describe()),
                });
            }
            Ok(if state.is_actionable() {
                Probe::Ready(())
            } else {
                Probe::Pending(state.describe())
            })
        })
        .await?;

        if let Err(timeout) = waited {
            return Err(CheckError::Actionability {
                selector: self.selector.to_string(),
                message: format!(
                    "waited {}ms, last state: {}",
                    timeout.elapsed.as_millis(),
                    timeout.last_observed
                ),
            });
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(CheckError::Timeout {
                operation: format!("click {}", self.selector),
                ms: timeout.as_millis() as u64,
            });
        }
        self.page.click(&self.selector, remaining).await
    }
}
