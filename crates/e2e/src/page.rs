//! Login page object
//!
//! Semantic actions and queries over one [`BrowserDriver`] session.
//!
//! Actions (navigate, fill, click, key presses, history, viewport) surface
//! driver failures as [`Error::NavigationTimeout`], [`Error::ElementNotFound`]
//! or [`Error::ActionTimeout`]. Queries never fail: each is bounded by the query
//! timeout and degrades to `false`, an empty string or `None` when the
//! element is absent or the driver errors, because negative-path scenarios
//! routinely check for state that should not be there.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use loginbdd_common::config::{SelectorConfig, TimeoutConfig};
use loginbdd_common::{
    BoundingBox, ElementState, Error, Field, FocusedElement, Key, ReadySignal, Result, SuiteConfig,
    Viewport, WaitState,
};

use crate::driver::{BrowserDriver, DriverError};

/// Phrases that betray internals when shown to a user
pub const TECHNICAL_KEYWORDS: &[&str] = &[
    "stack", "trace", "exception", "at line", "database", "sql", "error:", "errno",
];

/// Phrases that reveal which credential was wrong
pub const SPECIFIC_KEYWORDS: &[&str] = &[
    "username incorrect",
    "password incorrect",
    "username not found",
    "invalid username",
    "invalid password",
];

/// Markers of a generic server error page
pub const SERVER_ERROR_MARKERS: &[&str] =
    &["500", "503", "internal server error", "service unavailable"];

/// Phrases of a lockout or challenge notice
pub const LOCKOUT_KEYWORDS: &[&str] = &["locked", "disabled", "too many"];

pub struct LoginPage {
    driver: Box<dyn BrowserDriver>,
    login_url: String,
    login_path: String,
    landing_paths: Vec<String>,
    selectors: SelectorConfig,
    timeouts: TimeoutConfig,
    /// Viewport the session was launched with
    viewport: Viewport,
    last_response_time: Option<Duration>,
    closed: bool,
}

impl LoginPage {
    pub fn new(driver: Box<dyn BrowserDriver>, config: &SuiteConfig) -> Self {
        Self {
            driver,
            login_url: config.app.login_url(),
            login_path: config.app.login_path.clone(),
            landing_paths: config.app.landing_paths.clone(),
            selectors: config.selectors.clone(),
            timeouts: config.timeouts.clone(),
            viewport: config.browser.viewport,
            last_response_time: None,
            closed: false,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.driver.name()
    }

    pub fn login_url(&self) -> &str {
        &self.login_url
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Navigate to the login entry point and wait for the username input
    pub async fn open(&mut self) -> Result<()> {
        let ready = ReadySignal::Element(self.selectors.username_input.clone());
        let limit = self.timeouts.navigation();
        debug!("Opening {}", self.login_url);
        let result = self.driver.goto(&self.login_url, &ready, limit).await;
        navigation_result(&self.login_url, result)
    }

    /// Load the current URL again, or the login page when there is none
    pub async fn reload(&mut self) -> Result<()> {
        let url = match self.current_url().await {
            url if url.is_empty() || url == "about:blank" => self.login_url.clone(),
            url => url,
        };
        debug!("Reloading {}", url);
        let result = self
            .driver
            .goto(&url, &ReadySignal::NetworkIdle, self.timeouts.navigation())
            .await;
        navigation_result(&url, result)
    }

    /// Browser Back button
    pub async fn go_back(&mut self) -> Result<()> {
        let result = self
            .driver
            .go_back(&ReadySignal::NetworkIdle, self.timeouts.navigation())
            .await;
        navigation_result("history back", result)
    }

    pub async fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        debug!("Resizing viewport to {}x{}", viewport.width, viewport.height);
        self.driver.set_viewport(viewport).await.map_err(Error::from)
    }

    /// Back to the configured viewport
    pub async fn restore_viewport(&mut self) -> Result<()> {
        let viewport = self.viewport;
        self.set_viewport(viewport).await
    }

    /// Clear the username field and type `value` as given
    pub async fn enter_username(&mut self, value: &str) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .fill(&self.selectors.username_input, value, limit)
            .await
            .map_err(|e| action_error("fill", &self.selectors.username_input, limit, e))
    }

    /// Clear the password field and type `value` as given
    pub async fn enter_password(&mut self, value: &str) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .fill(&self.selectors.password_input, value, limit)
            .await
            .map_err(|e| action_error("fill", &self.selectors.password_input, limit, e))
    }

    /// Click the submit control. Does not wait for the response.
    pub async fn click_login(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .click(&self.selectors.login_button, limit)
            .await
            .map_err(|e| action_error("click", &self.selectors.login_button, limit, e))
    }

    /// Click the show / hide password control
    pub async fn click_password_toggle(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .click(&self.selectors.password_toggle, limit)
            .await
            .map_err(|e| action_error("click", &self.selectors.password_toggle, limit, e))
    }

    /// Move focus to the document body, outside every form control
    pub async fn focus_body(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .focus("body")
            .await
            .map_err(|e| action_error("focus", "body", limit, e))
    }

    pub async fn focus_username(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .focus(&self.selectors.username_input)
            .await
            .map_err(|e| action_error("focus", &self.selectors.username_input, limit, e))
    }

    pub async fn focus_password(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .focus(&self.selectors.password_input)
            .await
            .map_err(|e| action_error("focus", &self.selectors.password_input, limit, e))
    }

    pub async fn press_tab(&mut self) -> Result<()> {
        self.press(Key::Tab).await
    }

    pub async fn press_enter(&mut self) -> Result<()> {
        self.press(Key::Enter).await
    }

    async fn press(&mut self, key: Key) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .press_key(key)
            .await
            .map_err(|e| action_error("press", key.as_str(), limit, e))
    }

    /// Wait for the page to settle after an interaction
    ///
    /// A settle wait that runs out is logged, not raised: the caller asserts
    /// on whatever state the page reached.
    pub async fn wait_for_settle(&mut self) -> Result<()> {
        match self.driver.wait_for_settle(self.timeouts.settle()).await {
            Ok(()) => Ok(()),
            Err(DriverError::Timeout { timeout_ms, .. }) => {
                warn!("Page did not settle within {} ms", timeout_ms);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Wait until the error region is displayed
    pub async fn wait_for_error(&mut self) -> Result<()> {
        let limit = self.timeouts.action();
        self.driver
            .wait_for(&self.selectors.error_message, WaitState::Visible, limit)
            .await
            .map_err(|e| action_error("wait for", &self.selectors.error_message, limit, e))
    }

    /// Fill both fields, submit and wait for the settle signal
    ///
    /// Returns the elapsed time, measured from just before the first field
    /// interaction, and remembers it as the last response time.
    pub async fn perform_login(&mut self, username: &str, password: &str) -> Result<Duration> {
        let start = Instant::now();
        self.enter_username(username).await?;
        self.enter_password(password).await?;
        self.click_login().await?;
        self.wait_for_settle().await?;
        let elapsed = start.elapsed();
        self.last_response_time = Some(elapsed);
        debug!("Login attempt took {} ms", elapsed.as_millis());
        Ok(elapsed)
    }

    /// [`perform_login`](Self::perform_login) in whole milliseconds
    pub async fn measure_login_response_time(&mut self, username: &str, password: &str) -> Result<u64> {
        let elapsed = self.perform_login(username, password).await?;
        Ok(elapsed.as_millis() as u64)
    }

    pub fn last_response_time(&self) -> Option<Duration> {
        self.last_response_time
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    async fn state(&mut self, selector: &str) -> Option<ElementState> {
        bounded(self.timeouts.query(), selector, self.driver.element_state(selector))
            .await
            .flatten()
    }

    async fn attr(&mut self, selector: &str, name: &str) -> Option<String> {
        bounded(self.timeouts.query(), selector, self.driver.attribute(selector, name))
            .await
            .flatten()
            .filter(|v| !v.trim().is_empty())
    }

    async fn shown(&mut self, selector: &str) -> bool {
        self.state(selector).await.is_some_and(|s| s.visible)
    }

    async fn usable(&mut self, selector: &str) -> bool {
        self.state(selector).await.is_some_and(|s| s.visible && s.enabled)
    }

    /// Current URL, empty when the driver cannot say
    pub async fn current_url(&mut self) -> String {
        bounded(self.timeouts.query(), "current url", self.driver.current_url())
            .await
            .unwrap_or_default()
    }

    fn on_path(url: &str, path: &str) -> bool {
        !path.is_empty() && url.contains(path)
    }

    pub async fn is_on_login_page(&mut self) -> bool {
        let url = self.current_url().await;
        Self::on_path(&url, &self.login_path)
    }

    /// Logged-in marker displayed, or the URL is an authenticated landing route
    pub async fn is_logged_in(&mut self) -> bool {
        let marker = self.selectors.logged_in_marker.clone();
        if self.shown(&marker).await {
            return true;
        }
        let url = self.current_url().await;
        !Self::on_path(&url, &self.login_path)
            && self.landing_paths.iter().any(|p| Self::on_path(&url, p))
    }

    /// Text of the error region when displayed, otherwise empty
    pub async fn error_message_text(&mut self) -> String {
        let selector = self.selectors.error_message.clone();
        match self.state(&selector).await {
            Some(state) if state.visible => state.text.trim().to_string(),
            _ => String::new(),
        }
    }

    pub async fn is_error_visible(&mut self) -> bool {
        let selector = self.selectors.error_message.clone();
        self.shown(&selector).await
    }

    pub async fn error_contains_technical_details(&mut self) -> bool {
        let text = self.error_message_text().await.to_lowercase();
        TECHNICAL_KEYWORDS.iter().any(|k| text.contains(k))
    }

    pub async fn error_is_overly_specific(&mut self) -> bool {
        let text = self.error_message_text().await.to_lowercase();
        SPECIFIC_KEYWORDS.iter().any(|k| text.contains(k))
    }

    pub async fn is_password_masked(&mut self) -> bool {
        self.password_input_type().await.as_deref() == Some("password")
    }

    /// `type` attribute of the password input
    pub async fn password_input_type(&mut self) -> Option<String> {
        let selector = self.selectors.password_input.clone();
        self.attr(&selector, "type").await
    }

    /// Non-blank `alt` text of the logo image
    pub async fn logo_alt_text(&mut self) -> Option<String> {
        let selector = self.selectors.logo_image.clone();
        self.attr(&selector, "alt").await
    }

    /// Text of the displayed welcome banner, otherwise empty
    pub async fn welcome_text(&mut self) -> String {
        let selector = self.selectors.welcome_message.clone();
        match self.state(&selector).await {
            Some(state) if state.visible => state.text.trim().to_string(),
            _ => String::new(),
        }
    }

    async fn bounding_box(&mut self, selector: &str) -> Option<BoundingBox> {
        bounded(self.timeouts.query(), selector, self.driver.bounding_box(selector))
            .await
            .flatten()
    }

    /// Boxes of the username input, password input and submit control, in
    /// that order, when all three are rendered
    pub async fn control_boxes(&mut self) -> Option<[BoundingBox; 3]> {
        let user = self.selectors.username_input.clone();
        let pass = self.selectors.password_input.clone();
        let button = self.selectors.login_button.clone();
        Some([
            self.bounding_box(&user).await?,
            self.bounding_box(&pass).await?,
            self.bounding_box(&button).await?,
        ])
    }

    pub async fn focused_element(&mut self) -> Option<FocusedElement> {
        bounded(self.timeouts.query(), "focused element", self.driver.focused_element())
            .await
            .flatten()
    }

    /// id, name, type or tag of the focused element
    pub async fn focused_element_label(&mut self) -> Option<String> {
        self.focused_element().await.map(|f| f.label())
    }

    pub async fn is_field_usable(&mut self, field: Field) -> bool {
        let selector = self.field_selector(field).to_string();
        self.usable(&selector).await
    }

    pub async fn is_login_button_usable(&mut self) -> bool {
        let selector = self.selectors.login_button.clone();
        self.usable(&selector).await
    }

    /// Both inputs and the submit control are displayed and enabled
    pub async fn controls_visible_and_enabled(&mut self) -> bool {
        self.is_field_usable(Field::Username).await
            && self.is_field_usable(Field::Password).await
            && self.is_login_button_usable().await
    }

    /// The essential controls are missing, hidden or disabled
    pub async fn has_layout_issues(&mut self) -> bool {
        !self.controls_visible_and_enabled().await
    }

    pub async fn has_generic_server_error(&mut self) -> bool {
        let content = bounded(self.timeouts.query(), "page content", self.driver.page_content())
            .await
            .unwrap_or_default()
            .to_lowercase();
        SERVER_ERROR_MARKERS.iter().any(|m| content.contains(m))
    }

    /// A lockout region is shown or the error text announces a lockout
    ///
    /// The page carries no user identity, so `username` only annotates logs.
    pub async fn is_account_locked(&mut self, username: &str) -> bool {
        let region = self.selectors.lockout_message.clone();
        let locked = self.shown(&region).await || {
            let text = self.error_message_text().await.to_lowercase();
            LOCKOUT_KEYWORDS.iter().any(|k| text.contains(k))
        };
        debug!("Lockout check for '{}': {}", username, locked);
        locked
    }

    /// Both inputs are present and empty
    pub async fn are_fields_cleared(&mut self) -> bool {
        let user = self.selectors.username_input.clone();
        let pass = self.selectors.password_input.clone();
        match (self.state(&user).await, self.state(&pass).await) {
            (Some(u), Some(p)) => u.value.is_empty() && p.value.is_empty(),
            _ => false,
        }
    }

    /// Text of a displayed label for `field`
    pub async fn label(&mut self, field: Field) -> Option<String> {
        let selector = match field {
            Field::Username => self.selectors.username_label.clone(),
            Field::Password => self.selectors.password_label.clone(),
        };
        self.state(&selector)
            .await
            .filter(|s| s.visible)
            .map(|s| s.text.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    pub async fn username_label(&mut self) -> Option<String> {
        self.label(Field::Username).await
    }

    pub async fn password_label(&mut self) -> Option<String> {
        self.label(Field::Password).await
    }

    /// aria-label, aria-labelledby, or a `label[for]` naming the field's id
    pub async fn has_accessible_name(&mut self, field: Field) -> bool {
        let selector = self.field_selector(field).to_string();
        if self.attr(&selector, "aria-label").await.is_some()
            || self.attr(&selector, "aria-labelledby").await.is_some()
        {
            return true;
        }
        match self.attr(&selector, "id").await {
            Some(id) => self.state(&format!("label[for='{}']", id)).await.is_some(),
            None => false,
        }
    }

    /// The submit control has visible text or an aria-label
    pub async fn is_login_button_accessible(&mut self) -> bool {
        let selector = self.selectors.login_button.clone();
        let text = self.state(&selector).await.map(|s| s.text).unwrap_or_default();
        !text.trim().is_empty() || self.attr(&selector, "aria-label").await.is_some()
    }

    fn field_selector(&self, field: Field) -> &str {
        match field {
            Field::Username => &self.selectors.username_input,
            Field::Password => &self.selectors.password_input,
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Write a PNG of the viewport to `path`
    pub async fn capture_screenshot(&mut self, path: &Path) -> Result<()> {
        let png = self.driver.screenshot().await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;
        info!("Screenshot saved to {}", path.display());
        Ok(())
    }

    /// Drop cookies and web storage
    pub async fn reset_state(&mut self) -> Result<()> {
        self.driver.clear_state().await.map_err(Error::from)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Clear state and end the session. Only the first call reaches the driver.
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.driver.clear_state().await {
            debug!("Clearing browser state before close failed: {}", e);
        }
        self.driver.close().await.map_err(Error::from)
    }

    /// Best-effort synchronous release for cancellation paths
    pub fn abort(&mut self) {
        if !self.closed {
            self.closed = true;
            self.driver.abort();
        }
    }
}

/// Run a query future within `limit`, logging and discarding failures
async fn bounded<T, F>(limit: Duration, what: &str, query: F) -> Option<T>
where
    F: Future<Output = std::result::Result<T, DriverError>>,
{
    match tokio::time::timeout(limit, query).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            debug!("Query on {} degraded to default: {}", what, e);
            None
        }
        Err(_) => {
            debug!("Query on {} timed out after {} ms", what, limit.as_millis());
            None
        }
    }
}

fn navigation_result(url: &str, result: std::result::Result<(), DriverError>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(DriverError::Timeout { timeout_ms, .. }) => Err(Error::NavigationTimeout {
            url: url.to_string(),
            timeout_ms,
        }),
        Err(e) => Err(e.into()),
    }
}

fn action_error(action: &str, selector: &str, limit: Duration, e: DriverError) -> Error {
    match e {
        DriverError::NoSuchElement(_) => Error::ElementNotFound {
            selector: selector.to_string(),
        },
        DriverError::Timeout { timeout_ms, .. } => Error::ActionTimeout {
            action: action.to_string(),
            selector: selector.to_string(),
            timeout_ms,
        },
        DriverError::NotInteractable(_) => Error::ActionTimeout {
            action: action.to_string(),
            selector: selector.to_string(),
            timeout_ms: limit.as_millis() as u64,
        },
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::simulated::{Fault, SimulatedLoginApp, SimulatedServer};
    use crate::driver::{CallLog, DriverCall, DriverResult, NullDriver};
    use async_trait::async_trait;

    /// Driver whose queries never answer
    struct HangingDriver;

    #[async_trait]
    impl BrowserDriver for HangingDriver {
        fn name(&self) -> &'static str {
            "hanging"
        }
        async fn goto(&mut self, _url: &str, _ready: &ReadySignal, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn current_url(&mut self) -> DriverResult<String> {
            std::future::pending().await
        }
        async fn go_back(&mut self, _ready: &ReadySignal, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn fill(&mut self, _selector: &str, _value: &str, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn click(&mut self, _selector: &str, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn focus(&mut self, _selector: &str) -> DriverResult<()> {
            Ok(())
        }
        async fn press_key(&mut self, _key: Key) -> DriverResult<()> {
            Ok(())
        }
        async fn element_state(&mut self, _selector: &str) -> DriverResult<Option<ElementState>> {
            std::future::pending().await
        }
        async fn attribute(&mut self, _selector: &str, _name: &str) -> DriverResult<Option<String>> {
            std::future::pending().await
        }
        async fn wait_for(&mut self, _selector: &str, _state: WaitState, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn wait_for_settle(&mut self, _timeout: Duration) -> DriverResult<()> {
            Ok(())
        }
        async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>> {
            std::future::pending().await
        }
        async fn set_viewport(&mut self, _viewport: Viewport) -> DriverResult<()> {
            Ok(())
        }
        async fn bounding_box(&mut self, _selector: &str) -> DriverResult<Option<BoundingBox>> {
            std::future::pending().await
        }
        async fn page_content(&mut self) -> DriverResult<String> {
            std::future::pending().await
        }
        async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
            Ok(Vec::new())
        }
        async fn clear_state(&mut self) -> DriverResult<()> {
            Ok(())
        }
        async fn close(&mut self) -> DriverResult<()> {
            Ok(())
        }
    }

    fn simulated(fault: Option<Fault>) -> LoginPage {
        let config = SuiteConfig::default();
        let server = SimulatedServer::new(3).with_account("alice", "s3cret");
        let mut app = SimulatedLoginApp::new(&config, server);
        if let Some(fault) = fault {
            app = app.with_fault(fault);
        }
        LoginPage::new(Box::new(app), &config)
    }

    #[tokio::test]
    async fn test_successful_login() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        assert!(page.is_on_login_page().await);
        assert!(page.controls_visible_and_enabled().await);
        assert!(page.is_password_masked().await);

        page.perform_login("alice", "s3cret").await.unwrap();
        assert!(page.is_logged_in().await);
        assert!(page.current_url().await.contains("/home"));
        assert!(page.last_response_time().is_some());
    }

    #[tokio::test]
    async fn test_failed_login_queries() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        page.perform_login("alice", "wrong").await.unwrap();
        assert!(!page.is_logged_in().await);
        assert!(page.is_error_visible().await);
        let text = page.error_message_text().await;
        assert!(!text.is_empty());
        assert!(!text.contains("alice"));
        assert!(!page.error_is_overly_specific().await);
        assert!(!page.error_contains_technical_details().await);
        assert!(!page.is_account_locked("alice").await);
        assert!(!page.are_fields_cleared().await);
    }

    #[tokio::test]
    async fn test_lockout_detected() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        for pw in ["a", "b", "c"] {
            page.perform_login("alice", pw).await.unwrap();
        }
        assert!(page.is_account_locked("alice").await);
        page.perform_login("alice", "s3cret").await.unwrap();
        assert!(!page.is_logged_in().await);
    }

    #[tokio::test]
    async fn test_accessibility_queries() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        assert_eq!(page.username_label().await.as_deref(), Some("Username"));
        assert_eq!(page.password_label().await.as_deref(), Some("Password"));
        assert!(page.has_accessible_name(Field::Username).await);
        assert!(page.has_accessible_name(Field::Password).await);
        assert!(page.is_login_button_accessible().await);

        page.focus_username().await.unwrap();
        page.press_tab().await.unwrap();
        assert_eq!(page.focused_element_label().await.as_deref(), Some("password"));
    }

    #[tokio::test]
    async fn test_open_times_out_on_server_error() {
        let mut page = simulated(Some(Fault::ServerError));
        let err = page.open().await.unwrap_err();
        assert!(matches!(err, Error::NavigationTimeout { .. }));
        assert!(page.has_generic_server_error().await);
    }

    #[tokio::test]
    async fn test_hidden_controls() {
        let mut page = simulated(Some(Fault::HiddenControls));
        page.open().await.unwrap();
        assert!(page.has_layout_issues().await);
        assert!(matches!(
            page.enter_username("x").await,
            Err(Error::ActionTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_queries_degrade_on_null_driver() {
        let mut page = LoginPage::new(Box::new(NullDriver::new()), &SuiteConfig::default());
        assert!(!page.is_logged_in().await);
        assert_eq!(page.error_message_text().await, "");
        assert!(!page.is_password_masked().await);
        assert_eq!(page.focused_element_label().await, None);
        assert!(!page.has_generic_server_error().await);
        assert!(page.has_layout_issues().await);
    }

    #[tokio::test]
    async fn test_queries_degrade_when_driver_errors() {
        let config = SuiteConfig::default();
        let mut app = SimulatedLoginApp::new(&config, SimulatedServer::new(3));
        app.close().await.unwrap();
        let mut page = LoginPage::new(Box::new(app), &config);
        assert!(!page.is_logged_in().await);
        assert!(!page.is_on_login_page().await);
        assert_eq!(page.error_message_text().await, "");
        assert!(!page.is_password_masked().await);
        assert_eq!(page.current_url().await, "");
        assert_eq!(page.control_boxes().await, None);
        assert!(matches!(page.enter_username("x").await, Err(Error::SessionClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_queries_bounded_by_query_timeout() {
        let config = SuiteConfig::default();
        let mut page = LoginPage::new(Box::new(HangingDriver), &config);
        let start = tokio::time::Instant::now();
        assert!(!page.is_logged_in().await);
        assert_eq!(page.error_message_text().await, "");
        assert_eq!(page.password_input_type().await, None);
        assert_eq!(page.focused_element_label().await, None);
        assert!(!page.has_generic_server_error().await);
        // is_logged_in waits on the marker and then the URL
        let elapsed = start.elapsed();
        assert!(elapsed >= config.timeouts.query() * 6);
        assert!(elapsed < config.timeouts.query() * 7);
    }

    #[tokio::test]
    async fn test_password_toggle_changes_input_type() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        assert_eq!(page.password_input_type().await.as_deref(), Some("password"));
        page.click_password_toggle().await.unwrap();
        assert_eq!(page.password_input_type().await.as_deref(), Some("text"));
        assert!(!page.is_password_masked().await);
        assert_eq!(page.logo_alt_text().await.as_deref(), Some("Company logo"));
    }

    #[tokio::test]
    async fn test_control_boxes_follow_viewport() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        page.set_viewport(Viewport { width: 360, height: 640 }).await.unwrap();
        let [user, pass, button] = page.control_boxes().await.unwrap();
        assert!(user.bottom() <= pass.y && pass.bottom() <= button.y);
        assert!(button.right() <= 360.0);
        page.restore_viewport().await.unwrap();
        let [user, ..] = page.control_boxes().await.unwrap();
        assert!(user.x > 16.0);
    }

    #[tokio::test]
    async fn test_welcome_and_back_navigation() {
        let mut page = simulated(None);
        page.open().await.unwrap();
        assert_eq!(page.welcome_text().await, "");
        page.perform_login("alice", "s3cret").await.unwrap();
        assert_eq!(page.welcome_text().await, "Welcome, alice!");
        page.go_back().await.unwrap();
        assert!(page.is_on_login_page().await);
        page.reload().await.unwrap();
        assert!(page.is_on_login_page().await);
    }

    #[tokio::test]
    async fn test_missing_control_is_element_not_found() {
        let config = SuiteConfig::default();
        let driver = NullDriver::new().missing_element(config.selectors.login_button.clone());
        let mut page = LoginPage::new(Box::new(driver), &config);
        let err = page.click_login().await.unwrap_err();
        assert!(matches!(err, Error::ElementNotFound { .. }));
    }

    #[tokio::test]
    async fn test_close_reaches_driver_once() {
        let log = CallLog::new();
        let mut page = LoginPage::new(Box::new(NullDriver::with_log(log.clone())), &SuiteConfig::default());
        page.close().await.unwrap();
        page.close().await.unwrap();
        page.abort();
        assert_eq!(log.count(|c| *c == DriverCall::Close), 1);
        assert_eq!(log.count(|c| *c == DriverCall::Abort), 0);
    }
}
