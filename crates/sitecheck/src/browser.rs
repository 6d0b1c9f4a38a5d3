//! Browser sessions.
//!
//! A [`BrowserSession`] is one launched browser. Each call to
//! [`BrowserSession::new_page`] opens a fresh tab in its own browser context,
//! so no cookies or storage leak between test attempts.
//!
//! With the `browser` feature, [`ChromiumSession`] drives Chromium over the
//! DevTools Protocol via chromiumoxide. [`MockSession`] hands out scripted
//! [`MockDriver`] pages and needs no browser.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::driver::{MockDriver, PageDriver};
use crate::result::{CheckError, CheckResult};

/// One launched browser
#[async_trait]
pub trait BrowserSession: Send + Sync + std::fmt::Debug {
    /// Project name shown in reports
    fn name(&self) -> &str;

    /// Open a fresh, isolated tab
    async fn new_page(&self) -> CheckResult<Arc<dyn PageDriver>>;

    /// Shut the browser down
    async fn close(&self) -> CheckResult<()>;
}

type DriverFactory = Box<dyn Fn() -> MockDriver + Send + Sync>;

/// Session handing out scripted pages
pub struct MockSession {
    factory: DriverFactory,
    pages: Mutex<Vec<Arc<MockDriver>>>,
    closed_pages: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl std::fmt::Debug for MockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSession")
            .field("pages_opened", &self.pages_opened())
            .field("pages_closed", &self.pages_closed())
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockSession {
    /// Every page is built by `factory`
    #[must_use]
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> MockDriver + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            pages: Mutex::new(Vec::new()),
            closed_pages: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
        }
    }

    /// Every page serves the index page
    #[must_use]
    pub fn serving_index() -> Self {
        Self::new(MockDriver::serving_index)
    }

    /// Pages handed out so far, oldest first
    #[must_use]
    pub fn pages(&self) -> Vec<Arc<MockDriver>> {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of pages opened
    #[must_use]
    pub fn pages_opened(&self) -> usize {
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of pages closed
    #[must_use]
    pub fn pages_closed(&self) -> usize {
        self.closed_pages.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn name(&self) -> &str {
        "mock"
    }

    async fn new_page(&self) -> CheckResult<Arc<dyn PageDriver>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CheckError::page("browser session has been closed"));
        }
        let driver = Arc::new((self.factory)().with_close_counter(self.closed_pages.clone()));
        self.pages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(driver.clone());
        Ok(driver)
    }

    async fn close(&self) -> CheckResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
mod cdp {
    use super::*;
    use crate::config::{RunConfig, Viewport};
    use crate::locator::{ElementState, Selector};
    use base64::Engine;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
    use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
    use chromiumoxide::cdp::browser_protocol::page::{
        CaptureScreenshotFormat, CaptureScreenshotParams, GetLayoutMetricsParams,
        Viewport as ClipRect,
    };
    use chromiumoxide::cdp::browser_protocol::target::{
        CreateBrowserContextParams, CreateTargetParams,
    };
    use chromiumoxide::layout::Point;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::Deserialize;
    use tokio::sync::Mutex as AsyncMutex;

    /// Chromium launched over the DevTools Protocol
    #[derive(Debug)]
    pub struct ChromiumSession {
        name: String,
        browser: Arc<AsyncMutex<CdpBrowser>>,
        handle: tokio::task::JoinHandle<()>,
    }

    impl ChromiumSession {
        /// Launch Chromium configured for this run
        ///
        /// # Errors
        ///
        /// Returns error if browser cannot be launched
        pub async fn launch(config: &RunConfig) -> CheckResult<Self> {
            let mut builder = CdpConfig::builder().viewport(None);

            if !config.headless {
                builder = builder.with_head();
            }

            // Containers running CI jobs rarely allow the setuid sandbox.
            if config.mode.is_ci() {
                builder = builder.no_sandbox();
            }

            if let Some(viewport) = config.viewport {
                builder = builder.window_size(viewport.width, viewport.height);
            }

            let cdp_config = builder
                .args(config.launch_args.clone())
                .build()
                .map_err(|e| CheckError::BrowserLaunch { message: e })?;

            let (browser, mut handler) =
                CdpBrowser::launch(cdp_config)
                    .await
                    .map_err(|e| CheckError::BrowserLaunch {
                        message: e.to_string(),
                    })?;

            let handle = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let name = config
                .projects
                .first()
                .map_or_else(|| "chromium".to_string(), |p| p.name.clone());
            tracing::info!(project = %name, headless = config.headless, "browser launched");

            Ok(Self {
                name,
                browser: Arc::new(AsyncMutex::new(browser)),
                handle,
            })
        }
    }

    #[async_trait]
    impl BrowserSession for ChromiumSession {
        fn name(&self) -> &str {
            &self.name
        }

        async fn new_page(&self) -> CheckResult<Arc<dyn PageDriver>> {
            let mut browser = self.browser.lock().await;
            let context = browser
                .create_browser_context(CreateBrowserContextParams::default())
                .await
                .map_err(|e| CheckError::page(format!("cannot create browser context: {e}")))?;

            let target = CreateTargetParams::builder()
                .url("about:blank")
                .browser_context_id(context.clone())
                .build()
                .map_err(CheckError::page)?;

            let page = browser
                .new_page(target)
                .await
                .map_err(|e| CheckError::page(e.to_string()))?;

            Ok(Arc::new(CdpPageDriver {
                page,
                browser: self.browser.clone(),
                context,
            }))
        }

        async fn close(&self) -> CheckResult<()> {
            let mut browser = self.browser.lock().await;
            browser
                .close()
                .await
                .map_err(|e| CheckError::BrowserLaunch {
                    message: e.to_string(),
                })?;
            self.handle.abort();
            Ok(())
        }
    }

    #[derive(Debug, Deserialize)]
    struct ClickPoint {
        x: f64,
        y: f64,
    }

    /// One Chromium tab in its own browser context
    #[derive(Debug)]
    pub struct CdpPageDriver {
        page: CdpPage,
        browser: Arc<AsyncMutex<CdpBrowser>>,
        context: BrowserContextId,
    }

    impl CdpPageDriver {
        async fn eval<T: serde::de::DeserializeOwned>(&self, expr: String) -> CheckResult<T> {
            let result = self
                .page
                .evaluate(expr)
                .await
                .map_err(|e| CheckError::page(e.to_string()))?;
            result
                .into_value()
                .map_err(|e| CheckError::page(e.to_string()))
        }
    }

    fn state_script(selector: &Selector) -> String {
        format!(
            "(() => {{ \
               const els = {}; \
               const el = els[0]; \
               if (!el) return {{ count: 0, visible: false, enabled: false, text: null }}; \
               const rect = el.getBoundingClientRect(); \
               const style = window.getComputedStyle(el); \
               const visible = rect.width > 0 && rect.height > 0 \
                 && style.visibility !== 'hidden' && style.display !== 'none'; \
               return {{ count: els.length, visible, enabled: !el.disabled, text: el.textContent }}; \
             }})()",
            selector.to_query_all()
        )
    }

    fn center_script(selector: &Selector) -> String {
        format!(
            "(() => {{ \
               const el = ({})[0]; \
               if (!el) return null; \
               el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
               const r = el.getBoundingClientRect(); \
               return {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }}; \
             }})()",
            selector.to_query_all()
        )
    }

    #[async_trait]
    impl PageDriver for CdpPageDriver {
        async fn navigate(&self, url: &str) -> CheckResult<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| CheckError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn title(&self) -> CheckResult<String> {
            let title = self
                .page
                .get_title()
                .await
                .map_err(|e| CheckError::page(e.to_string()))?;
            Ok(title.unwrap_or_default())
        }

        async fn query(&self, selector: &Selector) -> CheckResult<ElementState> {
            self.eval(state_script(selector)).await
        }

        async fn click(&self, selector: &Selector) -> CheckResult<()> {
            let point: Option<ClickPoint> = self.eval(center_script(selector)).await?;
            let point = point.ok_or_else(|| CheckError::Actionability {
                selector: selector.to_string(),
                message: "element detached before click".to_string(),
            })?;
            self.page
                .click(Point::new(point.x, point.y))
                .await
                .map_err(|e| CheckError::Actionability {
                    selector: selector.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn set_viewport(&self, viewport: Viewport) -> CheckResult<()> {
            let params = SetDeviceMetricsOverrideParams::new(
                i64::from(viewport.width),
                i64::from(viewport.height),
                1.0,
                false,
            );
            self.page
                .execute(params)
                .await
                .map_err(|e| CheckError::page(e.to_string()))?;
            Ok(())
        }

        async fn screenshot(&self, full_page: bool) -> CheckResult<Vec<u8>> {
            let mut params = CaptureScreenshotParams::builder().format(CaptureScreenshotFormat::Png);

            if full_page {
                let metrics = self
                    .page
                    .execute(GetLayoutMetricsParams::default())
                    .await
                    .map_err(|e| CheckError::Screenshot {
                        message: e.to_string(),
                    })?;
                let size = &metrics.css_content_size;
                params = params
                    .clip(ClipRect {
                        x: 0.0,
                        y: 0.0,
                        width: size.width,
                        height: size.height,
                        scale: 1.0,
                    })
                    .capture_beyond_viewport(true);
            }

            let screenshot =
                self.page
                    .execute(params.build())
                    .await
                    .map_err(|e| CheckError::Screenshot {
                        message: e.to_string(),
                    })?;

            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(|e| CheckError::Screenshot {
                    message: e.to_string(),
                })
        }

        async fn close(&self) -> CheckResult<()> {
            self.page
                .clone()
                .close()
                .await
                .map_err(|e| CheckError::page(e.to_string()))?;
            let browser = self.browser.lock().await;
            if let Err(e) = browser.dispose_browser_context(self.context.clone()).await {
                tracing::warn!(error = %e, "failed to dispose browser context");
            }
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::{CdpPageDriver, ChromiumSession};
