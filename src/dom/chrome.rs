// src/dom/chrome.rs

use anyhow::{anyhow, Context, Result};
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::{ffi::OsStr, sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::config::BrowserConfig;
use crate::dom::{wait::poll_until, DomControl, Locator};
use crate::error::{DomError, WaitKind};

/// One exclusively owned Chrome tab. Dropping the session closes the browser.
pub struct ChromeSession {
    _browser: Browser,
    tab: Arc<Tab>,
    poll: Duration,
}

#[derive(Deserialize)]
struct AttrProbe {
    found: bool,
    value: Option<String>,
}

impl ChromeSession {
    pub fn launch(cfg: &BrowserConfig, poll: Duration) -> Result<Self> {
        let mut args: Vec<String> = vec![
            "--disable-dev-shm-usage".into(),
            "--disable-blink-features=AutomationControlled".into(),
        ];
        if let Some(ua) = &cfg.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        let opts = LaunchOptionsBuilder::default()
            .headless(cfg.headless)
            .sandbox(cfg.sandbox)
            .window_size(Some((cfg.window_width, cfg.window_height)))
            .idle_browser_timeout(Duration::from_secs(600))
            .args(args.iter().map(OsStr::new).collect::<Vec<&OsStr>>())
            .build()
            .map_err(|e| anyhow!("building browser launch options: {}", e))?;

        let browser = Browser::new(opts).context("launching browser")?;
        let tab = browser.new_tab().context("opening browser tab")?;
        info!(headless = cfg.headless, "browser launched");
        Ok(Self {
            _browser: browser,
            tab,
            poll,
        })
    }

    /// Navigate to the dashboard and wait until its loading overlay is gone.
    pub fn open_dashboard(&self, url: &str, overlay: &Locator, timeout: Duration) -> Result<()> {
        self.tab
            .navigate_to(url)
            .with_context(|| format!("navigating to {}", url))?;
        self.tab
            .wait_until_navigated()
            .with_context(|| format!("waiting for {} to load", url))?;
        self.wait_invisible(overlay, timeout)
            .context("initial loading overlay did not disappear")?;
        info!(url = %url, "dashboard loaded");
        Ok(())
    }

    /// Run `body` with `el` bound to the first node matching `target` and
    /// decode the JSON string it returns.
    fn eval_json<T: DeserializeOwned>(&self, target: &Locator, body: &str) -> Result<T, DomError> {
        let js = format!(
            "(function() {{ const el = {}; return JSON.stringify((function() {{ {} }})()); }})()",
            resolve_first(target),
            body
        );
        self.eval_raw(target, &js)
    }

    fn eval_raw<T: DeserializeOwned>(&self, target: &Locator, js: &str) -> Result<T, DomError> {
        let obj = self
            .tab
            .evaluate(js, false)
            .map_err(|e| DomError::interaction(target, e))?;
        let text = obj
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .ok_or_else(|| DomError::interaction(target, "script returned no value"))?;
        serde_json::from_str(text).map_err(|e| DomError::interaction(target, e))
    }

    fn is_shown(&self, target: &Locator) -> Result<bool, DomError> {
        self.eval_json(target, &format!("return !!el && {};", VISIBLE_JS))
    }

    fn is_clickable(&self, target: &Locator) -> Result<bool, DomError> {
        self.eval_json(
            target,
            &format!(
                "return !!el && {} && !el.disabled && !el.classList.contains('ui-state-disabled');",
                VISIBLE_JS
            ),
        )
    }

    fn with_element<T>(
        &self,
        target: &Locator,
        f: impl FnOnce(&headless_chrome::Element<'_>) -> Result<T>,
    ) -> Result<T, DomError> {
        let el = match target {
            Locator::Css(s) => self.tab.find_element(s),
            Locator::XPath(s) => self.tab.find_element_by_xpath(s),
        }
        .map_err(|_| DomError::NotFound(target.clone()))?;
        f(&el).map_err(|e| DomError::interaction(target, e))
    }
}

const VISIBLE_JS: &str = "(el.offsetWidth > 0 || el.offsetHeight > 0 || el.getClientRects().length > 0) \
     && window.getComputedStyle(el).visibility !== 'hidden' \
     && window.getComputedStyle(el).display !== 'none'";

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

fn resolve_first(target: &Locator) -> String {
    match target {
        Locator::Css(s) => format!("document.querySelector({})", js_str(s)),
        Locator::XPath(s) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            js_str(s)
        ),
    }
}

fn resolve_all(target: &Locator) -> String {
    match target {
        Locator::Css(s) => format!("Array.from(document.querySelectorAll({}))", js_str(s)),
        Locator::XPath(s) => format!(
            "(function() {{ const r = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             const out = []; for (let i = 0; i < r.snapshotLength; i++) out.push(r.snapshotItem(i)); return out; }})()",
            js_str(s)
        ),
    }
}

impl DomControl for ChromeSession {
    fn click(&self, target: &Locator) -> Result<(), DomError> {
        debug!(target = %target, "click");
        self.with_element(target, |el| {
            el.click()?;
            Ok(())
        })
    }

    fn scroll_into_view(&self, target: &Locator) -> Result<(), DomError> {
        self.with_element(target, |el| {
            el.scroll_into_view()?;
            Ok(())
        })
    }

    fn wait_visible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        poll_until(target, WaitKind::Visible, timeout, self.poll, || {
            self.is_shown(target)
        })
    }

    fn wait_invisible(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        poll_until(target, WaitKind::Invisible, timeout, self.poll, || {
            self.is_shown(target).map(|shown| !shown)
        })
    }

    fn wait_clickable(&self, target: &Locator, timeout: Duration) -> Result<(), DomError> {
        poll_until(target, WaitKind::Clickable, timeout, self.poll, || {
            self.is_clickable(target)
        })
    }

    fn outer_html(&self, target: &Locator) -> Result<String, DomError> {
        let html: Option<String> = self.eval_json(target, "return el ? el.outerHTML : null;")?;
        html.ok_or_else(|| DomError::NotFound(target.clone()))
    }

    fn texts(&self, target: &Locator) -> Result<Vec<String>, DomError> {
        let js = format!(
            "JSON.stringify({}.map(n => (n.textContent || '').trim()).filter(t => t.length > 0))",
            resolve_all(target)
        );
        self.eval_raw(target, &js)
    }

    fn attribute(&self, target: &Locator, name: &str) -> Result<Option<String>, DomError> {
        let probe: AttrProbe = self.eval_json(
            target,
            &format!(
                "return {{ found: !!el, value: el ? el.getAttribute({}) : null }};",
                js_str(name)
            ),
        )?;
        if !probe.found {
            return Err(DomError::NotFound(target.clone()));
        }
        Ok(probe.value)
    }

    fn page_source(&self) -> Result<String, DomError> {
        self.tab
            .get_content()
            .map_err(|e| DomError::interaction(&Locator::xpath("/html"), e))
    }
}
