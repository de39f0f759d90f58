//! Null driver: a browserless double for exercising the step catalog
//!
//! Actions succeed, queries report absence, and every call lands in a shared
//! [`CallLog`] so tests can assert on what the page object asked for.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use loginbdd_common::{BoundingBox, ElementState, FocusedElement, Key, ReadySignal, Viewport, WaitState};

use super::{BrowserDriver, DriverError, DriverResult};

/// A recorded driver call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Goto(String),
    Back,
    Fill { selector: String, value: String },
    Click(String),
    Focus(String),
    Press(Key),
    Viewport(Viewport),
    ClearState,
    Close,
    Abort,
}

/// Shared, clonable call log
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<DriverCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: DriverCall) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.0.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&DriverCall) -> bool) -> usize {
        self.0.lock().iter().filter(|c| pred(c)).count()
    }

    /// Values typed into fields matching `selector`, in order
    pub fn filled(&self, selector: &str) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                DriverCall::Fill { selector: s, value } if s == selector => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct NullDriver {
    log: CallLog,
    url: Option<String>,
    /// Actions on this selector fail with `NoSuchElement`
    missing: Option<String>,
    closed: bool,
}

impl NullDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver that records into an existing log
    pub fn with_log(log: CallLog) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    /// Make fill / click / focus on `selector` fail as if the control were absent
    pub fn missing_element(mut self, selector: impl Into<String>) -> Self {
        self.missing = Some(selector.into());
        self
    }

    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    fn check(&self, selector: &str) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Session("session closed".into()));
        }
        if self.missing.as_deref() == Some(selector) {
            return Err(DriverError::NoSuchElement(selector.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for NullDriver {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn goto(&mut self, url: &str, _ready: &ReadySignal, _timeout: Duration) -> DriverResult<()> {
        self.check("")?;
        self.log.push(DriverCall::Goto(url.to_string()));
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        Ok(self.url.clone().unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn go_back(&mut self, _ready: &ReadySignal, _timeout: Duration) -> DriverResult<()> {
        self.check("")?;
        self.log.push(DriverCall::Back);
        Ok(())
    }

    async fn fill(&mut self, selector: &str, value: &str, _timeout: Duration) -> DriverResult<()> {
        self.check(selector)?;
        self.log.push(DriverCall::Fill {
            selector: selector.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> DriverResult<()> {
        self.check(selector)?;
        self.log.push(DriverCall::Click(selector.to_string()));
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> DriverResult<()> {
        self.check(selector)?;
        self.log.push(DriverCall::Focus(selector.to_string()));
        Ok(())
    }

    async fn press_key(&mut self, key: Key) -> DriverResult<()> {
        self.check("")?;
        self.log.push(DriverCall::Press(key));
        Ok(())
    }

    async fn element_state(&mut self, _selector: &str) -> DriverResult<Option<ElementState>> {
        Ok(None)
    }

    async fn attribute(&mut self, _selector: &str, _name: &str) -> DriverResult<Option<String>> {
        Ok(None)
    }

    async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> DriverResult<()> {
        match state {
            WaitState::Hidden | WaitState::Detached => Ok(()),
            WaitState::Visible | WaitState::Attached => Err(DriverError::timeout(selector, timeout)),
        }
    }

    async fn wait_for_settle(&mut self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>> {
        Ok(None)
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        self.check("")?;
        self.log.push(DriverCall::Viewport(viewport));
        Ok(())
    }

    async fn bounding_box(&mut self, _selector: &str) -> DriverResult<Option<BoundingBox>> {
        Ok(None)
    }

    async fn page_content(&mut self) -> DriverResult<String> {
        Ok(String::new())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn clear_state(&mut self) -> DriverResult<()> {
        self.log.push(DriverCall::ClearState);
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.check("")?;
        self.closed = true;
        self.log.push(DriverCall::Close);
        Ok(())
    }

    fn abort(&mut self) {
        if !self.closed {
            self.closed = true;
            self.log.push(DriverCall::Abort);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queries_report_absence() {
        let mut driver = NullDriver::new();
        assert_eq!(driver.element_state("#username").await.unwrap(), None);
        assert_eq!(driver.attribute("#password", "type").await.unwrap(), None);
        assert_eq!(driver.focused_element().await.unwrap(), None);
        assert_eq!(driver.bounding_box("#login").await.unwrap(), None);
        assert_eq!(driver.current_url().await.unwrap(), "about:blank");
    }

    #[tokio::test]
    async fn test_calls_recorded_in_order() {
        let log = CallLog::new();
        let mut driver = NullDriver::with_log(log.clone());
        driver.fill("#u", "a", Duration::ZERO).await.unwrap();
        driver.click("#go", Duration::ZERO).await.unwrap();
        driver.fill("#u", "b", Duration::ZERO).await.unwrap();
        assert_eq!(log.filled("#u"), vec!["a", "b"]);
        assert_eq!(log.calls()[1], DriverCall::Click("#go".into()));
    }

    #[tokio::test]
    async fn test_missing_element_and_closed_session() {
        let mut driver = NullDriver::new().missing_element("#login");
        assert!(matches!(
            driver.click("#login", Duration::ZERO).await,
            Err(DriverError::NoSuchElement(_))
        ));
        driver.close().await.unwrap();
        assert!(matches!(
            driver.fill("#u", "x", Duration::ZERO).await,
            Err(DriverError::Session(_))
        ));
        driver.abort();
        assert_eq!(driver.log().count(|c| *c == DriverCall::Abort), 0);
    }
}
