//! Playwright browser automation
//!
//! Playwright has no wire protocol of its own, so the driver hosts a small
//! Node bridge: one long-lived `node` process keeps the browser, context and
//! page open and answers newline-delimited JSON commands on stdin/stdout.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use loginbdd_common::config::BrowserConfig;
use loginbdd_common::{BoundingBox, ElementState, FocusedElement, Key, ReadySignal, Viewport, WaitState};

use super::{BrowserDriver, DriverError, DriverResult, FOCUSED_ELEMENT_JS};

/// Environment variable carrying the bridge launch options
const BRIDGE_CONFIG_ENV: &str = "LOGINBDD_BRIDGE_CONFIG";

/// Extra allowance on top of a command's own timeout before the bridge is
/// considered hung
const BRIDGE_GRACE: Duration = Duration::from_secs(5);

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

const BRIDGE_JS: &str = r#"
const readline = require('readline');
const pw = require('playwright');

const config = JSON.parse(process.env.LOGINBDD_BRIDGE_CONFIG || '{}');
const write = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');

function failure(err) {
  const message = String((err && err.message) || err);
  let kind = 'other';
  if (err && err.kind) kind = err.kind;
  else if (err && err.name === 'TimeoutError') kind = 'timeout';
  else if (/not (visible|enabled|editable)|intercepts pointer|detached/i.test(message)) kind = 'not_interactable';
  return { kind, message };
}

(async () => {
  const browser = await pw[config.browser || 'chromium'].launch({ headless: config.headless !== false });
  const context = await browser.newContext({ viewport: config.viewport });
  const page = await context.newPage();

  const present = async (selector) => (await page.locator(selector).count()) > 0;
  const first = async (selector) => {
    if (!(await present(selector))) {
      const err = new Error('no element matches ' + selector);
      err.kind = 'no_such_element';
      throw err;
    }
    return page.locator(selector).first();
  };

  const waitUntil = (ready) => (ready.kind === 'network_idle' ? 'networkidle' : 'load');
  const awaitReady = async (c) => {
    if (c.ready.kind === 'element') {
      await page.waitForSelector(c.ready.selector, { state: 'attached', timeout: c.timeout });
    }
  };

  const ops = {
    goto: async (c) => {
      await page.goto(c.url, { timeout: c.timeout, waitUntil: waitUntil(c.ready) });
      await awaitReady(c);
      return null;
    },
    back: async (c) => {
      await page.goBack({ timeout: c.timeout, waitUntil: waitUntil(c.ready) });
      await awaitReady(c);
      return null;
    },
    url: async () => page.url(),
    fill: async (c) => {
      const el = await first(c.selector);
      await el.clear({ timeout: c.timeout });
      await el.fill(c.value, { timeout: c.timeout });
      return null;
    },
    click: async (c) => { await (await first(c.selector)).click({ timeout: c.timeout }); return null; },
    focus: async (c) => { await (await first(c.selector)).focus(); return null; },
    press: async (c) => { await page.keyboard.press(c.key); return null; },
    state: async (c) => {
      if (!(await present(c.selector))) return null;
      const el = page.locator(c.selector).first();
      return {
        visible: await el.isVisible(),
        enabled: await el.isEnabled().catch(() => false),
        text: await el.innerText().catch(() => ''),
        value: await el.inputValue().catch(() => ''),
      };
    },
    attribute: async (c) => {
      if (!(await present(c.selector))) return null;
      return await page.locator(c.selector).first().getAttribute(c.name);
    },
    wait: async (c) => { await page.waitForSelector(c.selector, { state: c.state, timeout: c.timeout }); return null; },
    settle: async (c) => { await page.waitForLoadState('networkidle', { timeout: c.timeout }); return null; },
    focused: async (c) => page.evaluate(new Function(c.script)),
    viewport: async (c) => { await page.setViewportSize({ width: c.width, height: c.height }); return null; },
    box: async (c) => {
      if (!(await present(c.selector))) return null;
      return await page.locator(c.selector).first().boundingBox();
    },
    content: async () => page.content(),
    screenshot: async () => (await page.screenshot()).toString('base64'),
    clear_state: async () => {
      await context.clearCookies();
      await page.evaluate(() => { try { localStorage.clear(); sessionStorage.clear(); } catch (e) {} });
      return null;
    },
    close: async () => { await browser.close(); return null; },
  };

  const rl = readline.createInterface({ input: process.stdin });
  rl.on('line', async (line) => {
    let cmd;
    try { cmd = JSON.parse(line); } catch (err) { return; }
    const op = ops[cmd.op];
    try {
      if (!op) throw new Error('unknown op ' + cmd.op);
      const value = await op(cmd);
      write({ id: cmd.id, ok: true, value: value === undefined ? null : value });
    } catch (err) {
      write({ id: cmd.id, ok: false, error: failure(err) });
    }
    if (cmd.op === 'close') process.exit(0);
  });
  write({ ready: true });
})().catch((err) => {
  write({ ready: false, error: failure(err) });
  process.exit(1);
});
"#;

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    ready: Option<bool>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<BridgeFailure>,
}

#[derive(Debug, Deserialize)]
struct BridgeFailure {
    kind: String,
    message: String,
}

impl BridgeFailure {
    fn into_error(self, what: &str, limit: Duration) -> DriverError {
        match self.kind.as_str() {
            "timeout" => DriverError::timeout(what, limit),
            "no_such_element" => DriverError::NoSuchElement(what.to_string()),
            "not_interactable" => DriverError::NotInteractable(format!("{}: {}", what, self.message)),
            _ => DriverError::Protocol(self.message),
        }
    }
}

/// Playwright session hosted by a Node bridge process
pub struct PlaywrightDriver {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    closed: bool,
}

impl PlaywrightDriver {
    /// Start the bridge and wait for the browser to come up
    pub async fn launch(config: &BrowserConfig) -> DriverResult<Self> {
        let launch = json!({
            "browser": config.browser.as_str(),
            "headless": config.headless,
            "viewport": { "width": config.viewport.width, "height": config.viewport.height },
        });

        info!("Launching Playwright {} via {}", config.browser, config.node_binary.display());

        let mut child = Command::new(&config.node_binary)
            .arg("-e")
            .arg(BRIDGE_JS)
            .env(BRIDGE_CONFIG_ENV, launch.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::Session(format!(
                    "failed to spawn {}: {}",
                    config.node_binary.display(),
                    e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Session("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Session("bridge stdout unavailable".into()))?;

        let mut driver = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            closed: false,
        };

        let ready = tokio::time::timeout(LAUNCH_TIMEOUT, driver.read_response(None))
            .await
            .map_err(|_| DriverError::timeout("Playwright launch", LAUNCH_TIMEOUT))??;
        match ready.ready {
            Some(true) => Ok(driver),
            _ => {
                let reason = ready
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| "bridge did not report ready".into());
                Err(DriverError::Session(format!(
                    "Playwright failed to start ({}). Install with: npm i playwright && npx playwright install",
                    reason
                )))
            }
        }
    }

    async fn read_response(&mut self, id: Option<u64>) -> DriverResult<BridgeResponse> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| DriverError::Session("Playwright bridge exited".into()))?;
            let response: BridgeResponse = match serde_json::from_str(&line) {
                Ok(r) => r,
                Err(_) => {
                    // page console output or Node warnings
                    debug!("bridge: {}", line);
                    continue;
                }
            };
            if id.is_none() || response.id == id {
                return Ok(response);
            }
        }
    }

    /// Send one command and wait for its answer
    async fn request(&mut self, op: &str, mut args: Value, what: &str, limit: Duration) -> DriverResult<Value> {
        if self.closed {
            return Err(DriverError::Session("session closed".into()));
        }
        let id = self.next_id;
        self.next_id += 1;

        if let Value::Object(map) = &mut args {
            map.insert("id".into(), json!(id));
            map.insert("op".into(), json!(op));
            map.insert("timeout".into(), json!(limit.as_millis() as u64));
        }
        let mut line = serde_json::to_string(&args)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        let guard = limit + BRIDGE_GRACE;
        let response = tokio::time::timeout(guard, self.read_response(Some(id)))
            .await
            .map_err(|_| DriverError::timeout(format!("bridge reply to {}", op), guard))??;

        if response.ok {
            Ok(response.value)
        } else {
            let failure = response.error.unwrap_or(BridgeFailure {
                kind: "other".into(),
                message: format!("{} failed without detail", op),
            });
            Err(failure.into_error(what, limit))
        }
    }
}

/// Timeout used for commands that carry none of their own
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

fn ready_json(ready: &ReadySignal) -> Value {
    match ready {
        ReadySignal::NetworkIdle => json!({ "kind": "network_idle" }),
        ReadySignal::Element(selector) => json!({ "kind": "element", "selector": selector }),
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    fn name(&self) -> &'static str {
        "playwright"
    }

    async fn goto(&mut self, url: &str, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        self.request("goto", json!({ "url": url, "ready": ready_json(ready) }), url, timeout)
            .await
            .map(|_| ())
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        let value = self.request("url", json!({}), "url", COMMAND_TIMEOUT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn go_back(&mut self, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        self.request("back", json!({ "ready": ready_json(ready) }), "history back", timeout)
            .await
            .map(|_| ())
    }

    async fn fill(&mut self, selector: &str, value: &str, timeout: Duration) -> DriverResult<()> {
        self.request("fill", json!({ "selector": selector, "value": value }), selector, timeout)
            .await
            .map(|_| ())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        self.request("click", json!({ "selector": selector }), selector, timeout)
            .await
            .map(|_| ())
    }

    async fn focus(&mut self, selector: &str) -> DriverResult<()> {
        self.request("focus", json!({ "selector": selector }), selector, COMMAND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn press_key(&mut self, key: Key) -> DriverResult<()> {
        self.request("press", json!({ "key": key.as_str() }), key.as_str(), COMMAND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn element_state(&mut self, selector: &str) -> DriverResult<Option<ElementState>> {
        let value = self
            .request("state", json!({ "selector": selector }), selector, COMMAND_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .request("attribute", json!({ "selector": selector, "name": name }), selector, COMMAND_TIMEOUT)
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> DriverResult<()> {
        self.request("wait", json!({ "selector": selector, "state": state.as_str() }), selector, timeout)
            .await
            .map(|_| ())
    }

    async fn wait_for_settle(&mut self, timeout: Duration) -> DriverResult<()> {
        self.request("settle", json!({}), "network idle", timeout)
            .await
            .map(|_| ())
    }

    async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>> {
        let value = self
            .request("focused", json!({ "script": FOCUSED_ELEMENT_JS }), "active element", COMMAND_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        self.request(
            "viewport",
            json!({ "width": viewport.width, "height": viewport.height }),
            "viewport",
            COMMAND_TIMEOUT,
        )
        .await
        .map(|_| ())
    }

    async fn bounding_box(&mut self, selector: &str) -> DriverResult<Option<BoundingBox>> {
        let value = self
            .request("box", json!({ "selector": selector }), selector, COMMAND_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn page_content(&mut self) -> DriverResult<String> {
        let value = self.request("content", json!({}), "content", COMMAND_TIMEOUT).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        let value = self.request("screenshot", json!({}), "screenshot", COMMAND_TIMEOUT).await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| DriverError::Protocol("screenshot returned no data".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| DriverError::Protocol(format!("screenshot is not base64: {}", e)))
    }

    async fn clear_state(&mut self) -> DriverResult<()> {
        self.request("clear_state", json!({}), "clear state", COMMAND_TIMEOUT)
            .await
            .map(|_| ())
    }

    async fn close(&mut self) -> DriverResult<()> {
        let result = self.request("close", json!({}), "close", COMMAND_TIMEOUT).await;
        self.closed = true;
        if let Err(e) = &result {
            warn!("Playwright close failed, killing bridge: {}", e);
            let _ = self.child.start_kill();
        }
        let _ = tokio::time::timeout(BRIDGE_GRACE, self.child.wait()).await;
        result.map(|_| ())
    }

    fn abort(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.child.start_kill();
        }
    }
}
