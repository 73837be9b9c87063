//! One automated browser tab, as seen by the search state machine.
mod chromium;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;

pub use chromium::{ChromiumLauncher, ChromiumSession, ChromiumSettings};

/// CSS selector, optionally narrowed to elements whose text contains one of `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub css: String,
    pub text: Vec<String>,
}

impl Locator {
    pub fn css(css: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: Vec::new(),
        }
    }

    pub fn with_text(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: vec![text.into()],
        }
    }

    pub fn with_any_text<I, S>(css: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            css: css.into(),
            text: texts.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether an element with `element_text` satisfies the text filter.
    pub fn matches_text(&self, element_text: &str) -> bool {
        self.text.is_empty() || self.text.iter().any(|t| element_text.contains(t.as_str()))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.text.is_empty() {
            write!(f, "{}", self.css)
        } else {
            write!(f, "{} with text {:?}", self.css, self.text)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation to {url} timed out after {timeout:?}")]
    NavigationTimeout { url: String, timeout: Duration },
    #[error("{locator} not visible within {timeout:?}")]
    ElementTimeout { locator: String, timeout: Duration },
    #[error("{action} failed: {message}")]
    Interaction {
        action: &'static str,
        message: String,
    },
    #[error("browser session closed")]
    Closed,
}

impl BrowserError {
    pub fn interaction(action: &'static str, message: impl fmt::Display) -> Self {
        BrowserError::Interaction {
            action,
            message: message.to_string(),
        }
    }

    /// Timeouts are transient; a caller may retry the whole run.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            BrowserError::NavigationTimeout { .. } | BrowserError::ElementTimeout { .. }
        )
    }
}

/// Operations on one browser tab. Calls are strictly sequential.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    async fn wait_for_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Waits until the first element matching `locator` contains `text`.
    async fn wait_for_text(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    async fn is_enabled(&mut self, locator: &Locator) -> Result<bool, BrowserError>;

    async fn fill_select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError>;

    async fn check(&mut self, locator: &Locator, checked: bool) -> Result<(), BrowserError>;

    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError>;

    async fn content(&mut self) -> Result<String, BrowserError>;

    /// Saves a full-page screenshot named `name` in the diagnostics directory.
    async fn screenshot(&mut self, name: &str) -> Result<PathBuf, BrowserError>;

    async fn close(&mut self) -> Result<(), BrowserError>;

    /// Visibility probe: an element timeout means "not visible", other errors surface.
    async fn is_visible(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        match self.wait_for_visible(locator, timeout).await {
            Ok(()) => Ok(true),
            Err(BrowserError::ElementTimeout { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// Opens sessions. The pipeline asks for a fresh one per search attempt.
#[async_trait::async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// Random pause between two bounds, used to space out UI actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Jitter {
    pub min: Duration,
    pub max: Duration,
}

impl Jitter {
    pub fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub fn none() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
        }
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if max <= min {
            return self.min;
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    pub async fn pause(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
