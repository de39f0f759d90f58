//! Per-scenario state
//!
//! A [`ScenarioContext`] owns at most one [`LoginPage`], created on first use
//! through the scenario's [`DriverFactory`], and the scalar facts steps hand
//! to each other. [`teardown`](ScenarioContext::teardown) releases the session exactly
//! once; dropping a context that was never torn down aborts the session
//! synchronously so a cancelled scenario still lets its browser go.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use loginbdd_common::{Browser, CredentialRegistry, Error, Field, Result, SuiteConfig};

use crate::driver::DriverFactory;
use crate::page::LoginPage;

pub struct ScenarioContext {
    config: Arc<SuiteConfig>,
    credentials: Arc<CredentialRegistry>,
    factory: Arc<dyn DriverFactory>,
    page: Option<LoginPage>,
    page_browser: Option<Browser>,
    browser: Browser,
    torn_down: bool,

    /// Duration of the most recent measured login
    pub last_response_time: Option<Duration>,
    /// Duration of the most recent navigation to the login page
    pub last_navigation_time: Option<Duration>,
    /// Label of the element focused by the last key press
    pub last_focused: Option<String>,
    /// Browser name as written in the scenario
    pub selected_browser: Option<String>,
    pub screen_reader: bool,
    /// Last values typed into each field
    pub last_username: Option<String>,
    pub last_password: Option<String>,
    /// Field most recently typed into
    pub last_field: Option<Field>,
    /// Submissions performed by composite steps
    pub login_attempts: u32,
    /// Consecutive submissions that did not sign in
    pub failed_attempts: u32,
}

impl ScenarioContext {
    pub fn new(
        config: Arc<SuiteConfig>,
        credentials: Arc<CredentialRegistry>,
        factory: Arc<dyn DriverFactory>,
    ) -> Self {
        let browser = config.browser.browser;
        let factory = factory.for_scenario().unwrap_or(factory);
        Self {
            config,
            credentials,
            factory,
            page: None,
            page_browser: None,
            browser,
            torn_down: false,
            last_response_time: None,
            last_navigation_time: None,
            last_focused: None,
            selected_browser: None,
            screen_reader: false,
            last_username: None,
            last_password: None,
            last_field: None,
            login_attempts: 0,
            failed_attempts: 0,
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.credentials
    }

    /// Resolve a credential token through the shared registry
    pub fn resolve(&self, token: &str) -> String {
        self.credentials.resolve(token)
    }

    /// The scenario's page, starting a browser session on first use
    pub async fn page(&mut self) -> Result<&mut LoginPage> {
        if self.torn_down {
            return Err(Error::SessionClosed);
        }
        if self.page.is_none() {
            let driver = self.factory.create(self.browser).await?;
            info!("Started {} session on {}", driver.name(), self.browser);
            self.page = Some(LoginPage::new(driver, &self.config));
            self.page_browser = Some(self.browser);
        }
        self.page.as_mut().ok_or(Error::SessionClosed)
    }

    /// The page if a session is already running
    pub fn current_page(&mut self) -> Option<&mut LoginPage> {
        self.page.as_mut()
    }

    pub fn has_page(&self) -> bool {
        self.page.is_some()
    }

    /// Switch the scenario to the browser named `label`
    ///
    /// A running session on another engine is closed; the next
    /// [`page`](Self::page) call starts one on the new engine through the same
    /// scenario factory, so application-side state such as failed-attempt
    /// counts carries over. Unknown names keep the configured engine.
    pub async fn select_browser(&mut self, label: &str) -> Result<()> {
        self.selected_browser = Some(label.to_string());
        let browser = match label.parse::<Browser>() {
            Ok(browser) => browser,
            Err(_) => {
                warn!("Unknown browser '{}', keeping {}", label, self.browser);
                return Ok(());
            }
        };
        self.browser = browser;
        if self.page_browser.is_some_and(|b| b != browser) {
            if let Some(mut page) = self.page.take() {
                debug!("Closing {} session to switch to {}", page.driver_name(), browser);
                page.close().await?;
            }
            self.page_browser = None;
        }
        Ok(())
    }

    pub fn browser(&self) -> Browser {
        self.browser
    }

    /// Release the browser session. Later calls do nothing.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        match self.page.take() {
            Some(mut page) => {
                debug!("Tearing down {} session", page.driver_name());
                page.close().await
            }
            None => Ok(()),
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for ScenarioContext {
    fn drop(&mut self) {
        if let Some(page) = self.page.as_mut() {
            if !page.is_closed() {
                warn!("Scenario context dropped with a live session, aborting it");
                page.abort();
            }
        }
    }
}
