//! Chromium-backed [`FormDriver`] over the DevTools protocol.
//!
//! Element handles store the winning JavaScript query expression and
//! re-evaluate it on every operation; there are no remote object references
//! to go stale across the page rewrites these forms perform. The resolver
//! re-validates state before acting on a handle, so a query that stops
//! matching surfaces as a driver error rather than a silent no-op.

use crate::driver::{ElementHandle, ElementState, FormDriver, OptionEntry};
use crate::locator::{BoundingBox, Point, Selector};
use crate::result::{TramitarError, TramitarResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Launch options for the Chromium session
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    /// Run without a visible window
    pub headless: bool,
    /// Keep the Chromium sandbox enabled
    pub sandbox: bool,
    /// Explicit Chromium executable, if not on the default path
    pub chromium_path: Option<PathBuf>,
    /// Window width in pixels
    pub window_width: u32,
    /// Window height in pixels
    pub window_height: u32,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: true,
            chromium_path: None,
            window_width: 1280,
            window_height: 960,
        }
    }
}

impl ChromiumConfig {
    /// Create a config with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run with a visible window
    #[must_use]
    pub const fn with_head(mut self) -> Self {
        self.headless = false;
        self
    }

    /// Disable the Chromium sandbox (containerized environments)
    #[must_use]
    pub const fn no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Use a specific Chromium executable
    #[must_use]
    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct FoundElement {
    tag: String,
    text: String,
}

/// Real Chromium driver
pub struct ChromiumFormDriver {
    browser: Arc<Mutex<CdpBrowser>>,
    page: Arc<Mutex<CdpPage>>,
    #[allow(dead_code)]
    handler: tokio::task::JoinHandle<()>,
}

impl ChromiumFormDriver {
    /// Launch a Chromium session and open a blank page.
    ///
    /// # Errors
    ///
    /// Returns [`TramitarError::SessionLaunch`] when the browser cannot be
    /// started or the initial page cannot be created.
    pub async fn launch(config: ChromiumConfig) -> TramitarResult<Self> {
        let mut builder = CdpConfig::builder()
            .window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if !config.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = config.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder.build().map_err(|e| TramitarError::SessionLaunch {
            message: e.to_string(),
        })?;

        let (browser, mut handler) =
            CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| TramitarError::SessionLaunch {
                    message: e.to_string(),
                })?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| TramitarError::SessionLaunch {
                message: e.to_string(),
            })?;
        tracing::info!(headless = config.headless, "chromium session launched");

        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            page: Arc::new(Mutex::new(page)),
            handler,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, expr: &str) -> TramitarResult<T> {
        let page = self.page.lock().await;
        let result = page.evaluate(expr).await.map_err(TramitarError::driver)?;
        result.into_value().map_err(TramitarError::driver)
    }

    async fn eval_unit(&self, expr: &str) -> TramitarResult<()> {
        let page = self.page.lock().await;
        page.evaluate(expr).await.map_err(TramitarError::driver)?;
        Ok(())
    }
}

impl std::fmt::Debug for ChromiumFormDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromiumFormDriver").finish_non_exhaustive()
    }
}

#[async_trait]
impl FormDriver for ChromiumFormDriver {
    async fn navigate(&mut self, url: &str) -> TramitarResult<()> {
        let page = self.page.lock().await;
        page.goto(url).await.map_err(TramitarError::driver)?;
        tracing::info!(url, "navigated");
        Ok(())
    }

    async fn find(&self, selector: &Selector) -> TramitarResult<Option<ElementHandle>> {
        let query = selector.to_query();
        let expr = format!(
            "(() => {{ const el = {query}; if (!el) return null; \
             return {{ tag: el.tagName.toLowerCase(), text: (el.textContent || '').trim() }}; }})()"
        );
        let found: Option<FoundElement> = self.eval(&expr).await?;
        Ok(found.map(|f| ElementHandle {
            id: query,
            tag_name: f.tag,
            text: (!f.text.is_empty()).then_some(f.text),
        }))
    }

    async fn state(&self, handle: &ElementHandle) -> TramitarResult<ElementState> {
        let expr = format!(
            "(() => {{ const el = {q}; \
             if (!el) return {{ exists: false, visible: false, enabled: false }}; \
             const style = window.getComputedStyle(el); \
             const rect = el.getBoundingClientRect(); \
             const visible = style.display !== 'none' && style.visibility !== 'hidden' \
                 && rect.width > 0 && rect.height > 0; \
             return {{ exists: true, visible, enabled: !el.disabled }}; }})()",
            q = handle.id
        );
        self.eval(&expr).await
    }

    async fn value(&self, handle: &ElementHandle) -> TramitarResult<String> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             return el.value !== undefined ? String(el.value) : (el.textContent || ''); }})()",
            q = handle.id
        );
        self.eval(&expr).await
    }

    async fn set_value(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             el.focus(); el.value = {value:?}; \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn is_checked(&self, handle: &ElementHandle) -> TramitarResult<bool> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             return !!el.checked; }})()",
            q = handle.id
        );
        self.eval(&expr).await
    }

    async fn options(&self, handle: &ElementHandle) -> TramitarResult<Vec<OptionEntry>> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el || !el.options) return []; \
             return Array.from(el.options).map(o => ({{ \
                 value: o.value, label: o.label || o.textContent.trim(), enabled: !o.disabled }})); }})()",
            q = handle.id
        );
        self.eval(&expr).await
    }

    async fn select_option(&self, handle: &ElementHandle, value: &str) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             el.value = {value:?}; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn invoke(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             const rect = el.getBoundingClientRect(); \
             if (rect.width === 0 && rect.height === 0) throw new Error('element not interactable'); \
             el.click(); }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn dispatch_activation(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             el.dispatchEvent(new MouseEvent('click', \
                 {{ bubbles: true, cancelable: true, view: window }})); }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn submit_container(&self, handle: &ElementHandle) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             const form = el.form || el.closest('form'); \
             if (!form) throw new Error('element has no submittable container'); \
             if (form.requestSubmit) form.requestSubmit(); else form.submit(); }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn press_key(&self, handle: &ElementHandle, key: &str) -> TramitarResult<()> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             el.focus(); \
             for (const type of ['keydown', 'keypress', 'keyup']) {{ \
                 el.dispatchEvent(new KeyboardEvent(type, \
                     {{ key: {key:?}, bubbles: true, cancelable: true }})); \
             }} }})()",
            q = handle.id
        );
        self.eval_unit(&expr).await
    }

    async fn click_point(&self, point: Point) -> TramitarResult<()> {
        let page = self.page.lock().await;
        for event_type in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let params = DispatchMouseEventParams::builder()
                .r#type(event_type)
                .x(point.x)
                .y(point.y)
                .button(MouseButton::Left)
                .click_count(1)
                .build()
                .map_err(TramitarError::driver)?;
            page.execute(params).await.map_err(TramitarError::driver)?;
        }
        Ok(())
    }

    async fn bounding_box(&self, handle: &ElementHandle) -> TramitarResult<Option<BoundingBox>> {
        let expr = format!(
            "(() => {{ const el = {q}; if (!el) return null; \
             const r = el.getBoundingClientRect(); \
             if (r.width === 0 && r.height === 0) return null; \
             return {{ x: r.x, y: r.y, width: r.width, height: r.height }}; }})()",
            q = handle.id
        );
        self.eval(&expr).await
    }

    async fn attach_file(&self, handle: &ElementHandle, path: &str) -> TramitarResult<()> {
        // SetFileInputFiles needs a DOM node, not a JS value; mark the
        // element so it can be re-found through the DOM domain.
        let mark = format!(
            "(() => {{ const el = {q}; if (!el) throw new Error('stale handle'); \
             el.setAttribute('data-upload-target', ''); }})()",
            q = handle.id
        );
        self.eval_unit(&mark).await?;

        let page = self.page.lock().await;
        let element = page
            .find_element("[data-upload-target]")
            .await
            .map_err(TramitarError::driver)?;
        let params = SetFileInputFilesParams::builder()
            .files(vec![path.to_string()])
            .backend_node_id(element.backend_node_id)
            .build()
            .map_err(TramitarError::driver)?;
        page.execute(params).await.map_err(TramitarError::driver)?;
        drop(page);

        let unmark = format!(
            "(() => {{ const el = {q}; \
             if (el) el.removeAttribute('data-upload-target'); }})()",
            q = handle.id
        );
        self.eval_unit(&unmark).await
    }

    async fn page_text(&self) -> TramitarResult<String> {
        self.eval("document.body ? document.body.innerText : ''")
            .await
    }

    async fn page_token(&self) -> TramitarResult<String> {
        self.eval(
            "location.href + '#' + (document.body ? document.body.innerText.length : 0)",
        )
        .await
    }

    async fn close(&mut self) -> TramitarResult<()> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(TramitarError::driver)?;
        tracing::info!("chromium session closed");
        Ok(())
    }
}
