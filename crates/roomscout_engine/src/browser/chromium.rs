use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::{BrowserError, BrowserSession, Locator, SessionLauncher};
use crate::fetch::USER_AGENT;

const CLICK_TARGET_ATTR: &str = "data-roomscout-target";

#[derive(Debug, Clone)]
pub struct ChromiumSettings {
    pub headless: bool,
    /// Persistent profile; cookies and storage survive between runs.
    pub profile_dir: PathBuf,
    pub diagnostics_dir: PathBuf,
    pub window_size: (u32, u32),
    pub poll_interval: Duration,
}

impl ChromiumSettings {
    pub fn new(profile_dir: PathBuf, diagnostics_dir: PathBuf) -> Self {
        Self {
            headless: true,
            profile_dir,
            diagnostics_dir,
            window_size: (1280, 900),
            poll_interval: Duration::from_millis(250),
        }
    }
}

pub struct ChromiumLauncher {
    settings: ChromiumSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: ChromiumSettings) -> Self {
        Self { settings }
    }
}

#[async_trait::async_trait]
impl SessionLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let session = ChromiumSession::launch(self.settings.clone()).await?;
        Ok(Box::new(session))
    }
}

/// A single Chromium tab driven over the DevTools protocol.
pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    settings: ChromiumSettings,
    closed: bool,
}

impl ChromiumSession {
    pub async fn launch(settings: ChromiumSettings) -> Result<Self, BrowserError> {
        if settings.profile_dir.is_dir() {
            engine_info!("reusing browser profile {}", settings.profile_dir.display());
        } else {
            engine_info!("creating browser profile {}", settings.profile_dir.display());
            std::fs::create_dir_all(&settings.profile_dir)
                .map_err(|err| BrowserError::Launch(err.to_string()))?;
        }
        std::fs::create_dir_all(&settings.diagnostics_dir)
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        let (width, height) = settings.window_size;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(&settings.profile_dir)
            .window_size(width, height)
            .arg(format!("--user-agent={USER_AGENT}"))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-first-run");
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    engine_debug!("devtools handler event error: {err}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler_task,
            settings,
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), BrowserError> {
        if self.closed {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    /// Runs `body` with `el` bound to the first element matching `locator` (or `undefined`).
    async fn eval_on<T: DeserializeOwned>(
        &self,
        action: &'static str,
        locator: &Locator,
        body: &str,
    ) -> Result<T, BrowserError> {
        self.ensure_open()?;
        let css = serde_json::to_string(&locator.css)
            .map_err(|err| BrowserError::interaction(action, err))?;
        let texts = serde_json::to_string(&locator.text)
            .map_err(|err| BrowserError::interaction(action, err))?;
        let script = format!(
            "(() => {{ const texts = {texts}; \
             const el = Array.from(document.querySelectorAll({css})).find(e => \
               texts.length === 0 || texts.some(t => ((e.innerText || e.value || e.textContent || '')).includes(t))); \
             {body} }})()"
        );
        self.page
            .evaluate(script)
            .await
            .map_err(|err| BrowserError::interaction(action, err))?
            .into_value::<T>()
            .map_err(|err| BrowserError::interaction(action, err))
    }

    async fn poll_until(
        &self,
        locator: &Locator,
        body: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let session = self;
        poll_check(locator, timeout, self.settings.poll_interval, move || {
            session.eval_on::<bool>("wait", locator, body)
        })
        .await
    }
}

/// Re-runs `check` until it answers true or `timeout` passes.
///
/// Script failures count as "not yet": while a click navigates, the old
/// document's execution context is gone until the new one loads. A closed
/// session ends the wait at once.
async fn poll_check<F, Fut>(
    locator: &Locator,
    timeout: Duration,
    interval: Duration,
    mut check: F,
) -> Result<(), BrowserError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, BrowserError>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match check().await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err @ BrowserError::Interaction { .. }) => {
                engine_debug!("{locator} not ready yet: {err}");
            }
            Err(err) => return Err(err),
        }
        if Instant::now() >= deadline {
            return Err(BrowserError::ElementTimeout {
                locator: locator.to_string(),
                timeout,
            });
        }
        sleep(interval).await;
    }
}

const VISIBLE_JS: &str = "if (!el) return false; const r = el.getBoundingClientRect(); \
    const s = window.getComputedStyle(el); \
    return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none';";

const ENABLED_JS: &str = "return !!el && !el.disabled && !el.classList.contains('disabled') \
    && el.getAttribute('aria-disabled') !== 'true';";

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.ensure_open()?;
        engine_debug!("navigating to {url}");
        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(BrowserError::interaction("navigate", err)),
            Err(_) => Err(BrowserError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            }),
        }
    }

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.poll_until(locator, VISIBLE_JS, timeout).await
    }

    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        let needle = serde_json::to_string(text)
            .map_err(|err| BrowserError::interaction("wait for text", err))?;
        let body = format!(
            "return !!el && (el.innerText || el.textContent || '').includes({needle});"
        );
        self.poll_until(locator, &body, timeout).await
    }

    async fn is_enabled(&mut self, locator: &Locator) -> Result<bool, BrowserError> {
        self.eval_on("probe enabled", locator, ENABLED_JS).await
    }

    async fn fill_select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError> {
        let value_js = serde_json::to_string(value)
            .map_err(|err| BrowserError::interaction("select", err))?;
        let body = format!(
            "if (!el) return false; el.value = {value_js}; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return el.value === {value_js};"
        );
        if self.eval_on::<bool>("select", locator, &body).await? {
            Ok(())
        } else {
            Err(BrowserError::interaction(
                "select",
                format!("{locator} has no option {value}"),
            ))
        }
    }

    async fn check(&mut self, locator: &Locator, checked: bool) -> Result<(), BrowserError> {
        let body = format!(
            "if (!el) return false; if (el.checked !== {checked}) {{ el.click(); }} \
             return el.checked === {checked};"
        );
        if self.eval_on::<bool>("check", locator, &body).await? {
            Ok(())
        } else {
            Err(BrowserError::interaction(
                "check",
                format!("{locator} not found or not toggleable"),
            ))
        }
    }

    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError> {
        let body = format!(
            "if (!el) return false; \
             document.querySelectorAll('[{CLICK_TARGET_ATTR}]').forEach(e => e.removeAttribute('{CLICK_TARGET_ATTR}')); \
             el.setAttribute('{CLICK_TARGET_ATTR}', '1'); el.scrollIntoView({{ block: 'center' }}); \
             return true;"
        );
        if !self.eval_on::<bool>("click", locator, &body).await? {
            return Err(BrowserError::interaction("click", format!("{locator} not found")));
        }
        let element = self
            .page
            .find_element(format!("[{CLICK_TARGET_ATTR}]"))
            .await
            .map_err(|err| BrowserError::interaction("click", err))?;
        element
            .click()
            .await
            .map_err(|err| BrowserError::interaction("click", err))?;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        self.ensure_open()?;
        self.page
            .content()
            .await
            .map_err(|err| BrowserError::interaction("read content", err))
    }

    async fn screenshot(&mut self, name: &str) -> Result<PathBuf, BrowserError> {
        self.ensure_open()?;
        let path = self.settings.diagnostics_dir.join(format!("{name}.png"));
        self.page
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), &path)
            .await
            .map_err(|err| BrowserError::interaction("screenshot", err))?;
        engine_debug!("screenshot saved to {}", path.display());
        Ok(path)
    }

    async fn close(&mut self) -> Result<(), BrowserError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(err) = self.browser.close().await {
            engine_warn!("closing browser failed: {err}");
        }
        if let Err(err) = self.browser.wait().await {
            engine_warn!("waiting for browser exit failed: {err}");
        }
        self.handler_task.abort();
        engine_info!("browser closed");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
