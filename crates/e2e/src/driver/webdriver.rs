//! W3C WebDriver client (Selenium, chromedriver, geckodriver, safaridriver)

use async_trait::async_trait;
use base64::Engine;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use loginbdd_common::config::BrowserConfig;
use loginbdd_common::{
    BoundingBox, Browser, ElementState, FocusedElement, Key, ReadySignal, Viewport, WaitState,
};

use super::{BrowserDriver, DriverError, DriverResult, FOCUSED_ELEMENT_JS};

/// Key of a web element reference in WebDriver JSON
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Budget for the session DELETE sent when a scenario is dropped
const ABORT_TIMEOUT: Duration = Duration::from_secs(2);

/// WebDriver session over HTTP
pub struct WebDriverDriver {
    client: reqwest::Client,
    endpoint: String,
    session_id: Option<String>,
}

impl WebDriverDriver {
    /// Open a new session on the configured endpoint
    pub async fn connect(config: &BrowserConfig) -> DriverResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        let endpoint = config.webdriver_url.trim_end_matches('/').to_string();

        let mut driver = Self {
            client,
            endpoint,
            session_id: None,
        };

        let value = driver
            .send(Method::POST, "/session", Some(capabilities(config)))
            .await?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("new session response has no sessionId".into()))?
            .to_string();

        info!("WebDriver session {} on {}", session_id, driver.endpoint);
        driver.session_id = Some(session_id);
        let rect = json!({ "width": config.viewport.width, "height": config.viewport.height });
        if let Err(e) = driver.session(Method::POST, "/window/rect", Some(rect)).await {
            warn!("Could not size window: {}", e);
        }
        Ok(driver)
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> DriverResult<Value> {
        let url = format!("{}{}", self.endpoint, path);
        debug!("WebDriver {} {}", method, path);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        if status.is_success() {
            Ok(value)
        } else {
            Err(wire_error(status, &value))
        }
    }

    /// Command scoped to the current session
    async fn session(&self, method: Method, path: &str, body: Option<Value>) -> DriverResult<Value> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| DriverError::Session("session closed".into()))?;
        self.send(method, &format!("/session/{}{}", id, path), body).await
    }

    async fn find(&self, selector: &str) -> DriverResult<Option<String>> {
        let value = self
            .session(
                Method::POST,
                "/elements",
                Some(json!({ "using": "css selector", "value": selector })),
            )
            .await?;
        Ok(value
            .as_array()
            .and_then(|elements| elements.first())
            .and_then(|e| e.get(ELEMENT_KEY))
            .and_then(Value::as_str)
            .map(String::from))
    }

    /// Poll for an element until `timeout`
    async fn locate(&self, selector: &str, timeout: Duration) -> DriverResult<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(id) = self.find(selector).await? {
                return Ok(id);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::NoSuchElement(selector.to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn element(&self, method: Method, id: &str, path: &str, body: Option<Value>) -> DriverResult<Value> {
        self.session(method, &format!("/element/{}{}", id, path), body).await
    }

    async fn execute(&self, script: &str, args: Vec<Value>) -> DriverResult<Value> {
        self.session(
            Method::POST,
            "/execute/sync",
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    async fn document_ready(&self) -> DriverResult<bool> {
        let state = self.execute("return document.readyState;", vec![]).await?;
        Ok(state.as_str() == Some("complete"))
    }

    /// Poll `ready` until it holds or `timeout` has passed since `start`
    async fn await_ready(&self, ready: &ReadySignal, start: Instant, timeout: Duration, what: &str) -> DriverResult<()> {
        loop {
            let done = match ready {
                ReadySignal::NetworkIdle => self.document_ready().await?,
                ReadySignal::Element(selector) => self.find(selector).await?.is_some(),
            };
            if done {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::timeout(what, timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn displayed(&self, selector: &str) -> DriverResult<Option<bool>> {
        match self.find(selector).await? {
            Some(id) => {
                let shown = self.element(Method::GET, &id, "/displayed", None).await?;
                Ok(Some(shown.as_bool().unwrap_or(false)))
            }
            None => Ok(None),
        }
    }
}

/// DELETE a session from a thread with its own runtime, so the request
/// completes even while the caller's runtime is shutting down
fn delete_session_blocking(url: String) -> DriverResult<()> {
    let worker = std::thread::spawn(move || -> DriverResult<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(async {
            let client = reqwest::Client::builder().timeout(ABORT_TIMEOUT).build()?;
            client.delete(&url).send().await?.error_for_status()?;
            Ok::<(), DriverError>(())
        })
    });
    worker
        .join()
        .map_err(|_| DriverError::Session("session cleanup thread panicked".into()))?
}

fn capabilities(config: &BrowserConfig) -> Value {
    let mut always = json!({ "browserName": config.browser.webdriver_name() });
    if config.headless {
        match config.browser {
            Browser::Chromium => {
                always["goog:chromeOptions"] = json!({ "args": ["--headless=new"] });
            }
            Browser::Firefox => {
                always["moz:firefoxOptions"] = json!({ "args": ["-headless"] });
            }
            // safaridriver has no headless mode
            Browser::Webkit => {}
        }
    }
    json!({ "capabilities": { "alwaysMatch": always } })
}

/// Map a W3C error payload onto [`DriverError`]
fn wire_error(status: StatusCode, value: &Value) -> DriverError {
    let code = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match code {
        "no such element" | "stale element reference" => DriverError::NoSuchElement(message),
        "timeout" | "script timeout" => DriverError::Timeout {
            what: message,
            timeout_ms: 0,
        },
        "element not interactable" | "element click intercepted" | "invalid element state" => {
            DriverError::NotInteractable(message)
        }
        "invalid session id" | "session not created" => DriverError::Session(message),
        _ => DriverError::Protocol(format!("{} ({}): {}", code, status, message)),
    }
}

#[async_trait]
impl BrowserDriver for WebDriverDriver {
    fn name(&self) -> &'static str {
        "webdriver"
    }

    async fn goto(&mut self, url: &str, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        self.session(
            Method::POST,
            "/timeouts",
            Some(json!({ "pageLoad": timeout.as_millis() as u64 })),
        )
        .await?;
        let start = Instant::now();
        match self.session(Method::POST, "/url", Some(json!({ "url": url }))).await {
            Err(DriverError::Timeout { .. }) => return Err(DriverError::timeout(url, timeout)),
            other => other?,
        };
        self.await_ready(ready, start, timeout, url).await
    }

    async fn go_back(&mut self, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        let start = Instant::now();
        self.session(Method::POST, "/back", Some(json!({}))).await?;
        self.await_ready(ready, start, timeout, "history back").await
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        let value = self.session(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()> {
        let id = self.locate(selector, timeout).await?;
        self.element(Method::POST, &id, "/clear", Some(json!({}))).await?;
        self.element(Method::POST, &id, "/value", Some(json!({ "text": value })))
            .await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        let id = self.locate(selector, timeout).await?;
        self.element(Method::POST, &id, "/click", Some(json!({}))).await?;
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> DriverResult<()> {
        let id = self
            .find(selector)
            .await?
            .ok_or_else(|| DriverError::NoSuchElement(selector.to_string()))?;
        self.execute("arguments[0].focus();", vec![json!({ ELEMENT_KEY: id })])
            .await?;
        Ok(())
    }

    async fn press_key(&mut self, key: Key) -> DriverResult<()> {
        let code = key.webdriver_code();
        self.session(
            Method::POST,
            "/actions",
            Some(json!({
                "actions": [{
                    "type": "key",
                    "id": "keyboard",
                    "actions": [
                        { "type": "keyDown", "value": code },
                        { "type": "keyUp", "value": code },
                    ],
                }],
            })),
        )
        .await?;
        self.session(Method::DELETE, "/actions", None).await?;
        Ok(())
    }

    async fn element_state(&mut self, selector: &str) -> DriverResult<Option<ElementState>> {
        let Some(id) = self.find(selector).await? else {
            return Ok(None);
        };
        let visible = self.element(Method::GET, &id, "/displayed", None).await?;
        let enabled = self.element(Method::GET, &id, "/enabled", None).await?;
        let text = self.element(Method::GET, &id, "/text", None).await?;
        let value = self.element(Method::GET, &id, "/property/value", None).await?;
        Ok(Some(ElementState {
            visible: visible.as_bool().unwrap_or(false),
            enabled: enabled.as_bool().unwrap_or(false),
            text: text.as_str().unwrap_or_default().to_string(),
            value: value.as_str().unwrap_or_default().to_string(),
        }))
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        let Some(id) = self.find(selector).await? else {
            return Ok(None);
        };
        let value = self
            .element(Method::GET, &id, &format!("/attribute/{}", name), None)
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let reached = match state {
                WaitState::Visible => self.displayed(selector).await? == Some(true),
                WaitState::Hidden => self.displayed(selector).await? != Some(true),
                WaitState::Attached => self.find(selector).await?.is_some(),
                WaitState::Detached => self.find(selector).await?.is_none(),
            };
            if reached {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(DriverError::timeout(format!("{} to be {}", selector, state.as_str()), timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_settle(&mut self, timeout: Duration) -> DriverResult<()> {
        let deadline = Instant::now() + timeout;
        // give a submit-triggered navigation a moment to start
        tokio::time::sleep(POLL_INTERVAL).await;
        while !self.document_ready().await? {
            if Instant::now() >= deadline {
                return Err(DriverError::timeout("document ready", timeout));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>> {
        let value = self.execute(FOCUSED_ELEMENT_JS, vec![]).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Sizes the window, which bounds the viewport on desktop drivers
    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        let rect = json!({ "width": viewport.width, "height": viewport.height });
        self.session(Method::POST, "/window/rect", Some(rect)).await?;
        Ok(())
    }

    async fn bounding_box(&mut self, selector: &str) -> DriverResult<Option<BoundingBox>> {
        let Some(id) = self.find(selector).await? else {
            return Ok(None);
        };
        let shown = self.element(Method::GET, &id, "/displayed", None).await?;
        if !shown.as_bool().unwrap_or(false) {
            return Ok(None);
        }
        let rect = self.element(Method::GET, &id, "/rect", None).await?;
        Ok(Some(serde_json::from_value(rect)?))
    }

    async fn page_content(&mut self) -> DriverResult<String> {
        let value = self.session(Method::GET, "/source", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        let value = self.session(Method::GET, "/screenshot", None).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::Protocol("screenshot returned no data".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Protocol(format!("screenshot is not base64: {}", e)))
    }

    async fn clear_state(&mut self) -> DriverResult<()> {
        self.session(Method::DELETE, "/cookie", None).await?;
        if let Err(e) = self
            .execute("try { localStorage.clear(); sessionStorage.clear(); } catch (e) {}", vec![])
            .await
        {
            debug!("Web storage not cleared: {}", e);
        }
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let result = self.session(Method::DELETE, "", None).await;
        self.session_id = None;
        result.map(|_| ())
    }

    fn abort(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };
        let url = format!("{}/session/{}", self.endpoint, id);
        match delete_session_blocking(url) {
            Ok(()) => debug!("Deleted WebDriver session {}", id),
            Err(e) => warn!("Failed to delete WebDriver session {}: {}", id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_error_mapping() {
        let missing = wire_error(
            StatusCode::NOT_FOUND,
            &json!({ "error": "no such element", "message": "#nope" }),
        );
        assert!(matches!(missing, DriverError::NoSuchElement(m) if m == "#nope"));

        let blocked = wire_error(
            StatusCode::BAD_REQUEST,
            &json!({ "error": "element click intercepted", "message": "overlay" }),
        );
        assert!(matches!(blocked, DriverError::NotInteractable(_)));

        let other = wire_error(StatusCode::INTERNAL_SERVER_ERROR, &json!({}));
        assert!(matches!(other, DriverError::Protocol(_)));
    }

    /// One-shot HTTP endpoint answering a single request; yields its request line
    fn answer_once() -> (String, std::thread::JoinHandle<String>) {
        use std::io::{BufRead, BufReader, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut header = String::new();
            while reader.read_line(&mut header).unwrap() > 2 {
                header.clear();
            }
            let body = r#"{"value":null}"#;
            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            )
            .unwrap();
            request_line.trim().to_string()
        });
        (endpoint, server)
    }

    #[test]
    fn test_abort_deletes_session_without_runtime() {
        let (endpoint, server) = answer_once();
        let mut driver = WebDriverDriver {
            client: reqwest::Client::new(),
            endpoint,
            session_id: Some("abc".into()),
        };
        driver.abort();
        assert_eq!(server.join().unwrap(), "DELETE /session/abc HTTP/1.1");
        assert!(driver.session_id.is_none());
        // nothing left to delete, and no listener to answer
        driver.abort();
    }

    #[tokio::test]
    async fn test_abort_inside_runtime_sends_before_returning() {
        let (endpoint, server) = answer_once();
        let mut driver = WebDriverDriver {
            client: reqwest::Client::new(),
            endpoint,
            session_id: Some("s-1".into()),
        };
        driver.abort();
        assert_eq!(server.join().unwrap(), "DELETE /session/s-1 HTTP/1.1");
    }

    #[test]
    fn test_headless_capabilities() {
        let mut config = BrowserConfig::default();
        let caps = capabilities(&config);
        assert_eq!(caps["capabilities"]["alwaysMatch"]["browserName"], "chrome");
        assert_eq!(
            caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"][0],
            "--headless=new"
        );

        config.browser = Browser::Firefox;
        config.headless = false;
        let caps = capabilities(&config);
        assert_eq!(caps["capabilities"]["alwaysMatch"]["browserName"], "firefox");
        assert!(caps["capabilities"]["alwaysMatch"].get("moz:firefoxOptions").is_none());
    }
}
