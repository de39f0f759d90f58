//! Browser automation backends
//!
//! Every backend exposes the same capability set through [`BrowserDriver`]:
//! navigate, locate + fill / click / focus, key presses, element state and
//! attribute reads, bounded waits, the focused element, history, viewport
//! and layout boxes, page source, screenshots and session cleanup. The page
//! object only ever talks to this trait.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use parking_lot::Mutex;

use loginbdd_common::{
    BoundingBox, Browser, CredentialRegistry, DriverKind, ElementState, FocusedElement, Key, ReadySignal,
    SuiteConfig, Viewport, WaitState,
};

pub mod null;
pub mod playwright;
pub mod simulated;
pub mod webdriver;

pub use null::{CallLog, DriverCall, NullDriver};
pub use playwright::PlaywrightDriver;
pub use simulated::{SimulatedLoginApp, SimulatedServer};
pub use webdriver::WebDriverDriver;

/// Script returning the focused element's identity, or null for `<body>`
pub(crate) const FOCUSED_ELEMENT_JS: &str = r#"const e = document.activeElement;
if (!e || e === document.body) { return null; }
return { tag: e.tagName.toLowerCase(), id: e.id || '', name: e.getAttribute('name') || '', type: e.getAttribute('type') || '' };"#;

/// Low-level driver failures
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("no such element: {0}")]
    NoSuchElement(String),

    #[error("timed out after {timeout_ms} ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    #[error("session error: {0}")]
    Session(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DriverError {
    pub(crate) fn timeout(what: impl Into<String>, limit: Duration) -> Self {
        DriverError::Timeout {
            what: what.into(),
            timeout_ms: limit.as_millis() as u64,
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

impl From<DriverError> for loginbdd_common::Error {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Session(msg) if msg.contains("closed") => loginbdd_common::Error::SessionClosed,
            other => loginbdd_common::Error::Driver(other.to_string()),
        }
    }
}

/// One live browser session
#[async_trait]
pub trait BrowserDriver: Send {
    /// Backend name for logs and reports
    fn name(&self) -> &'static str;

    /// Navigate and wait for `ready` within `timeout`
    async fn goto(&mut self, url: &str, ready: &ReadySignal, timeout: Duration) -> DriverResult<()>;

    async fn current_url(&mut self) -> DriverResult<String>;

    /// Go one entry back in session history and wait for `ready`
    async fn go_back(&mut self, ready: &ReadySignal, timeout: Duration) -> DriverResult<()>;

    /// Clear the first element matching `selector`, then type `value` verbatim
    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()>;

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()>;

    async fn focus(&mut self, selector: &str) -> DriverResult<()>;

    /// Press a key on whatever holds focus
    async fn press_key(&mut self, key: Key) -> DriverResult<()>;

    /// State of the first match, `None` when nothing matches
    async fn element_state(&mut self, selector: &str) -> DriverResult<Option<ElementState>>;

    /// Attribute of the first match, `None` when absent
    async fn attribute(&mut self, selector: &str, name: &str) -> DriverResult<Option<String>>;

    async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> DriverResult<()>;

    /// Wait until the page stops loading after an interaction
    async fn wait_for_settle(&mut self, timeout: Duration) -> DriverResult<()>;

    async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>>;

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()>;

    /// Layout box of the first displayed match, `None` when nothing is rendered
    async fn bounding_box(&mut self, selector: &str) -> DriverResult<Option<BoundingBox>>;

    /// Serialized DOM
    async fn page_content(&mut self) -> DriverResult<String>;

    /// PNG bytes of the viewport
    async fn screenshot(&mut self) -> DriverResult<Vec<u8>>;

    /// Drop cookies and web storage
    async fn clear_state(&mut self) -> DriverResult<()>;

    /// End the session. Later calls fail with [`DriverError::Session`].
    async fn close(&mut self) -> DriverResult<()>;

    /// Synchronous best-effort release, used when a scenario is dropped
    /// without an orderly [`close`](BrowserDriver::close)
    fn abort(&mut self) {}
}

/// Creates the drivers of a scenario
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Start a session on `browser`
    async fn create(&self, browser: Browser) -> loginbdd_common::Result<Box<dyn BrowserDriver>>;

    /// Factory for a single scenario, when sessions of one scenario share
    /// state that must not leak into the next. `None` reuses this factory.
    fn for_scenario(&self) -> Option<Arc<dyn DriverFactory>> {
        None
    }
}

/// Factory that builds the backend named by the suite configuration
pub struct ConfiguredFactory {
    config: Arc<SuiteConfig>,
    credentials: Arc<CredentialRegistry>,
    /// Server behind every simulated session of the current scenario
    simulated: Option<Arc<Mutex<SimulatedServer>>>,
}

impl ConfiguredFactory {
    pub fn new(config: Arc<SuiteConfig>, credentials: Arc<CredentialRegistry>) -> Self {
        Self {
            config,
            credentials,
            simulated: None,
        }
    }

    fn simulated_server(&self) -> Arc<Mutex<SimulatedServer>> {
        match &self.simulated {
            Some(server) => server.clone(),
            None => Arc::new(Mutex::new(SimulatedServer::from_config(
                &self.config,
                &self.credentials,
            ))),
        }
    }
}

#[async_trait]
impl DriverFactory for ConfiguredFactory {
    async fn create(&self, browser: Browser) -> loginbdd_common::Result<Box<dyn BrowserDriver>> {
        let mut settings = self.config.browser.clone();
        settings.browser = browser;
        let driver: Box<dyn BrowserDriver> = match settings.driver {
            DriverKind::Playwright => Box::new(PlaywrightDriver::launch(&settings).await?),
            DriverKind::Webdriver => Box::new(WebDriverDriver::connect(&settings).await?),
            DriverKind::Simulated => Box::new(SimulatedLoginApp::with_shared_server(
                &self.config,
                self.simulated_server(),
            )),
            DriverKind::Null => Box::new(NullDriver::new()),
        };
        tracing::debug!("Created {} driver for {}", driver.name(), browser);
        Ok(driver)
    }

    /// A fresh simulated server per scenario, shared across its browser switches
    fn for_scenario(&self) -> Option<Arc<dyn DriverFactory>> {
        if self.config.browser.driver != DriverKind::Simulated {
            return None;
        }
        Some(Arc::new(ConfiguredFactory {
            config: self.config.clone(),
            credentials: self.credentials.clone(),
            simulated: Some(Arc::new(Mutex::new(SimulatedServer::from_config(
                &self.config,
                &self.credentials,
            )))),
        }))
    }
}
