use anyhow::{anyhow, Context, Result};
use headless_chrome::protocol::cdp::Page::{CaptureScreenshotFormatOption, Viewport};
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A headless Chromium with a single tab, reused for every page of a run.
/// Chromium is shut down when the session is dropped.
pub struct BrowserSession {
    // Held so the browser process lives as long as the tab.
    _browser: Browser,
    tab: Arc<Tab>,
}

impl std::fmt::Debug for BrowserSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserSession").finish_non_exhaustive()
    }
}

fn js_number(img: &Element<'_>, expression: &str) -> Result<f64> {
    let object = img
        .call_js_fn(
            &format!("function() {{ return {expression}; }}"),
            vec![],
            false,
        )
        .map_err(|err| anyhow!("{err}"))?;
    object
        .value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .with_context(|| format!("`{expression}` did not give a number"))
}

impl BrowserSession {
    /// `timeout` bounds every wait for navigation and elements.
    pub fn launch(timeout: Duration) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .map_err(|err| anyhow!("Browser configuration error: {err}"))?;

        let browser =
            Browser::new(options).map_err(|err| anyhow!("Browser initialization failed: {err}"))?;
        let tab = browser
            .new_tab()
            .map_err(|err| anyhow!("Tab creation failed: {err}"))?;
        tab.set_default_timeout(timeout);

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Renders `url` and screenshots the image on it at its natural size.
    pub fn capture(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "rendering page");
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|err| anyhow!("Navigation error: {err}"))?;

        let img = self
            .tab
            .wait_for_element("img")
            .map_err(|err| anyhow!("Element not found: {err}"))?;

        let clip = Viewport {
            x: js_number(&img, "this.getBoundingClientRect().left + window.scrollX")?,
            y: js_number(&img, "this.getBoundingClientRect().top + window.scrollY")?,
            width: js_number(&img, "this.naturalWidth")?,
            height: js_number(&img, "this.naturalHeight")?,
            scale: 1.0,
        };
        if clip.width <= 0.0 || clip.height <= 0.0 {
            anyhow::bail!("image at {} has no size", url);
        }

        self.tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|err| anyhow!("Screenshot failed: {err}"))
    }
}
