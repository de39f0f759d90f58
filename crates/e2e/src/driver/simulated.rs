//! Simulated login application
//!
//! An in-memory stand-in for the application under test: a login route with
//! labelled username / password inputs, a show-password toggle, a submit
//! button and an alert region, a landing route with a user menu and a welcome
//! banner, and a server side that counts failed attempts per account and locks
//! it after the configured maximum. The app keeps a history stack for back
//! navigation, lays the form out as a single column sized to the viewport,
//! and ends a session after the configured idle timeout. Selectors are matched
//! against a fixed alias list per element, which covers the default selector
//! configuration.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use loginbdd_common::config::LengthRule;
use loginbdd_common::{
    BoundingBox, CredentialRegistry, CredentialTrimming, ElementState, FocusedElement, Key,
    ReadySignal, SuiteConfig, Viewport, WaitState,
};

use super::{BrowserDriver, DriverError, DriverResult};

pub const GENERIC_FAILURE: &str = "Login failed. Please check your credentials and try again.";
pub const MISSING_FIELDS: &str = "Please enter both your username and password.";
pub const LENGTH_FAILURE: &str = "Login failed. The credentials do not meet the length requirements.";
pub const LOCKED_OUT: &str = "Your account has been temporarily locked after too many attempts.";
pub const LOGO_ALT: &str = "Company logo";

/// Widest the login column grows, in CSS pixels
const COLUMN_MAX_WIDTH: f64 = 360.0;
const COLUMN_MARGIN: f64 = 16.0;
const ROW_GAP: f64 = 8.0;

/// 1x1 transparent PNG
const BLANK_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Result of one submitted login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Rejected(&'static str),
    Locked,
}

/// Server half of the simulation: accounts and attempt counting
#[derive(Debug, Clone)]
pub struct SimulatedServer {
    accounts: HashMap<String, String>,
    failures: HashMap<String, u32>,
    max_attempts: u32,
    trim: bool,
    username_length: Option<LengthRule>,
    password_length: Option<LengthRule>,
    submissions: u32,
}

impl SimulatedServer {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            accounts: HashMap::new(),
            failures: HashMap::new(),
            max_attempts,
            trim: false,
            username_length: None,
            password_length: None,
            submissions: 0,
        }
    }

    /// One account (`valid_user` / `valid_password`) and the configured policies
    pub fn from_config(config: &SuiteConfig, credentials: &CredentialRegistry) -> Self {
        let policy = &config.policy;
        let mut server = Self::new(policy.lockout.max_attempts)
            .with_account(credentials.resolve("valid_user"), credentials.resolve("valid_password"));
        server.trim = policy.credential_trimming == CredentialTrimming::Trimmed;
        server.username_length = policy.username_length;
        server.password_length = policy.password_length;
        server
    }

    pub fn with_account(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.accounts.insert(username.into(), password.into());
        self
    }

    /// Total submissions received
    pub fn submissions(&self) -> u32 {
        self.submissions
    }

    pub fn failures(&self, username: &str) -> u32 {
        self.failures.get(username).copied().unwrap_or(0)
    }

    pub fn authenticate(&mut self, username: &str, password: &str) -> AuthOutcome {
        self.submissions += 1;
        let (username, password) = if self.trim {
            (username.trim(), password.trim())
        } else {
            (username, password)
        };

        if username.is_empty() || password.is_empty() {
            return AuthOutcome::Rejected(MISSING_FIELDS);
        }
        let len_ok = |rule: Option<LengthRule>, value: &str| {
            rule.map_or(true, |r| r.allows(value.chars().count()))
        };
        if !len_ok(self.username_length, username) || !len_ok(self.password_length, password) {
            return AuthOutcome::Rejected(LENGTH_FAILURE);
        }
        if self.failures(username) >= self.max_attempts {
            return AuthOutcome::Locked;
        }

        match self.accounts.get(username) {
            Some(expected) if expected == password => {
                self.failures.remove(username);
                AuthOutcome::Authenticated
            }
            Some(_) => {
                let count = self.failures.entry(username.to_string()).or_insert(0);
                *count += 1;
                if *count >= self.max_attempts {
                    AuthOutcome::Locked
                } else {
                    AuthOutcome::Rejected(GENERIC_FAILURE)
                }
            }
            None => AuthOutcome::Rejected(GENERIC_FAILURE),
        }
    }
}

/// Injected page faults for negative tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Every route renders a 500 page
    ServerError,
    /// Login controls render but are not displayed
    HiddenControls,
    /// The submit button is disabled
    DisabledSubmit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    UsernameInput,
    PasswordInput,
    LoginButton,
    UsernameLabel,
    PasswordLabel,
    ErrorBanner,
    LockoutBanner,
    UserMenu,
    PasswordToggle,
    Logo,
    WelcomeBanner,
    Body,
}

const TAB_ORDER: [Node; 3] = [Node::UsernameInput, Node::PasswordInput, Node::LoginButton];

impl Node {
    const ALL: [Node; 12] = [
        Node::UsernameInput,
        Node::PasswordInput,
        Node::LoginButton,
        Node::UsernameLabel,
        Node::PasswordLabel,
        Node::ErrorBanner,
        Node::LockoutBanner,
        Node::UserMenu,
        Node::PasswordToggle,
        Node::Logo,
        Node::WelcomeBanner,
        Node::Body,
    ];

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Node::UsernameInput => &[
                "input#username",
                "#username",
                "input[name='username']",
                "input[type='text']",
                "input[type='email']",
            ],
            Node::PasswordInput => &[
                "input#password",
                "#password",
                "input[name='password']",
                "input[type='password']",
            ],
            Node::LoginButton => &[
                "button#login",
                "#login",
                "button[type='submit']",
                "button:has-text('login')",
                "button",
            ],
            Node::UsernameLabel => &["label[for='username']", "label:has-text('username')"],
            Node::PasswordLabel => &["label[for='password']", "label:has-text('password')"],
            Node::ErrorBanner => &[".error", ".alert-danger", "[role='alert']", ".error-message"],
            Node::LockoutBanner => &["[data-testid='lockout-message']", ".lockout-message"],
            Node::UserMenu => &["#user-menu", ".user-profile", "[data-testid='user-menu']"],
            Node::PasswordToggle => &[
                "#show-hide-password",
                "button#show-hide-password",
                "[data-testid='password-toggle']",
                ".password-toggle",
            ],
            Node::Logo => &["img#app-logo", "#app-logo", "img.logo", "header img", "img"],
            Node::WelcomeBanner => &[".welcome-banner", "[data-testid='welcome-message']"],
            Node::Body => &["body", "html"],
        }
    }

    fn attribute(&self, name: &str) -> Option<&'static str> {
        let value = match (self, name) {
            (Node::UsernameInput, "id") | (Node::UsernameInput, "name") => "username",
            (Node::UsernameInput, "type") => "text",
            (Node::UsernameInput, "autocomplete") => "username",
            (Node::UsernameInput, "placeholder") => "Enter your username",
            (Node::PasswordInput, "id") | (Node::PasswordInput, "name") => "password",
            (Node::PasswordInput, "type") => "password",
            (Node::PasswordInput, "autocomplete") => "current-password",
            (Node::LoginButton, "id") => "login",
            (Node::LoginButton, "type") => "submit",
            (Node::UsernameLabel, "for") => "username",
            (Node::PasswordLabel, "for") => "password",
            (Node::ErrorBanner, "role") => "alert",
            (Node::ErrorBanner, "aria-live") => "assertive",
            (Node::ErrorBanner, "class") => "error-message",
            (Node::LockoutBanner, "data-testid") => "lockout-message",
            (Node::UserMenu, "id") => "user-menu",
            (Node::PasswordToggle, "id") => "show-hide-password",
            (Node::PasswordToggle, "type") => "button",
            (Node::PasswordToggle, "tabindex") => "-1",
            (Node::PasswordToggle, "aria-controls") => "password",
            (Node::Logo, "id") => "app-logo",
            (Node::Logo, "alt") => LOGO_ALT,
            (Node::Logo, "src") => "/static/logo.png",
            (Node::WelcomeBanner, "class") => "welcome-banner",
            _ => return None,
        };
        Some(value)
    }

    fn focusable(&self) -> bool {
        TAB_ORDER.contains(self)
    }

    fn tag(&self) -> &'static str {
        match self {
            Node::UsernameInput | Node::PasswordInput => "input",
            Node::LoginButton | Node::PasswordToggle => "button",
            Node::UsernameLabel | Node::PasswordLabel => "label",
            Node::UserMenu => "nav",
            Node::Logo => "img",
            Node::Body => "body",
            Node::ErrorBanner | Node::LockoutBanner | Node::WelcomeBanner => "div",
        }
    }

    /// Rendered height in the single-column layout
    fn height(&self) -> f64 {
        match self {
            Node::Logo => 48.0,
            Node::UsernameLabel | Node::PasswordLabel => 20.0,
            Node::UsernameInput | Node::PasswordInput => 40.0,
            Node::LoginButton => 44.0,
            _ => 32.0,
        }
    }
}

/// Render order of the column on each route
const LOGIN_COLUMN: [Node; 8] = [
    Node::Logo,
    Node::UsernameLabel,
    Node::UsernameInput,
    Node::PasswordLabel,
    Node::PasswordInput,
    Node::ErrorBanner,
    Node::LockoutBanner,
    Node::LoginButton,
];
const LANDING_COLUMN: [Node; 3] = [Node::Logo, Node::UserMenu, Node::WelcomeBanner];

fn normalize(selector: &str) -> String {
    selector
        .trim()
        .replace('"', "'")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Blank,
    Login,
    Landing,
    NotFound,
}

/// Browser half of the simulation
pub struct SimulatedLoginApp {
    base_url: String,
    login_path: String,
    landing_paths: Vec<String>,
    server: Arc<Mutex<SimulatedServer>>,
    fault: Option<Fault>,
    route: Route,
    path: String,
    /// Previously visited paths, most recent last
    history: Vec<String>,
    username: String,
    password: String,
    password_revealed: bool,
    error: Option<&'static str>,
    locked: bool,
    focus: Option<Node>,
    /// Account name of the live session
    account: Option<String>,
    session_timeout: Option<Duration>,
    last_activity: Instant,
    viewport: Viewport,
    closed: bool,
}

impl SimulatedLoginApp {
    pub fn new(config: &SuiteConfig, server: SimulatedServer) -> Self {
        Self::with_shared_server(config, Arc::new(Mutex::new(server)))
    }

    /// App backed by a server other sessions may share
    pub fn with_shared_server(config: &SuiteConfig, server: Arc<Mutex<SimulatedServer>>) -> Self {
        Self {
            base_url: config.app.base_url.trim_end_matches('/').to_string(),
            login_path: config.app.login_path.clone(),
            landing_paths: config.app.landing_paths.clone(),
            server,
            fault: None,
            route: Route::Blank,
            path: String::new(),
            history: Vec::new(),
            username: String::new(),
            password: String::new(),
            password_revealed: false,
            error: None,
            locked: false,
            focus: None,
            account: None,
            session_timeout: config.policy.session_timeout(),
            last_activity: Instant::now(),
            viewport: config.browser.viewport,
            closed: false,
        }
    }

    pub fn with_fault(mut self, fault: Fault) -> Self {
        self.fault = Some(fault);
        self
    }

    pub fn server(&self) -> Arc<Mutex<SimulatedServer>> {
        self.server.clone()
    }

    fn live(&self) -> DriverResult<()> {
        if self.closed {
            Err(DriverError::Session("session closed".into()))
        } else {
            Ok(())
        }
    }

    fn authenticated(&self) -> bool {
        self.account.is_some()
    }

    /// End an idle session, then count this call as activity
    fn touch(&mut self) {
        let now = Instant::now();
        if let Some(timeout) = self.session_timeout {
            if now.duration_since(self.last_activity) >= timeout {
                if let Some(account) = self.account.take() {
                    debug!("simulated session for '{}' expired after {:?}", account, timeout);
                }
            }
        }
        self.last_activity = now;
    }

    fn present(&self, node: Node) -> bool {
        if self.fault == Some(Fault::ServerError) {
            return false;
        }
        match self.route {
            Route::Login => match node {
                Node::ErrorBanner => self.error.is_some(),
                Node::LockoutBanner => self.locked,
                Node::UserMenu | Node::WelcomeBanner => false,
                _ => true,
            },
            Route::Landing => matches!(
                node,
                Node::UserMenu | Node::WelcomeBanner | Node::Logo | Node::Body
            ),
            Route::NotFound => node == Node::Body,
            Route::Blank => false,
        }
    }

    fn visible(&self, node: Node) -> bool {
        self.present(node)
            && !(self.fault == Some(Fault::HiddenControls) && TAB_ORDER.contains(&node))
    }

    fn enabled(&self, node: Node) -> bool {
        !(self.fault == Some(Fault::DisabledSubmit) && node == Node::LoginButton)
    }

    /// First present element matching any part of a selector list
    fn locate(&self, selector: &str) -> Option<Node> {
        let parts: Vec<String> = selector.split(',').map(normalize).collect();
        Node::ALL.into_iter().find(|node| {
            self.present(*node)
                && parts
                    .iter()
                    .any(|part| node.aliases().contains(&part.as_str()))
        })
    }

    fn interactable(&self, selector: &str) -> DriverResult<Node> {
        let node = self
            .locate(selector)
            .ok_or_else(|| DriverError::NoSuchElement(selector.to_string()))?;
        if !self.visible(node) || !self.enabled(node) {
            return Err(DriverError::NotInteractable(selector.to_string()));
        }
        Ok(node)
    }

    fn text(&self, node: Node) -> String {
        match node {
            Node::LoginButton => "Login".to_string(),
            Node::UsernameLabel => "Username".to_string(),
            Node::PasswordLabel => "Password".to_string(),
            Node::ErrorBanner => self.error.unwrap_or_default().to_string(),
            Node::LockoutBanner => LOCKED_OUT.to_string(),
            Node::UserMenu => "My account".to_string(),
            Node::PasswordToggle => {
                let label = if self.password_revealed { "Hide" } else { "Show" };
                label.to_string()
            }
            Node::WelcomeBanner => {
                format!("Welcome, {}!", self.account.as_deref().unwrap_or_default())
            }
            Node::UsernameInput | Node::PasswordInput | Node::Logo | Node::Body => String::new(),
        }
    }

    fn attribute_of(&self, node: Node, name: &str) -> Option<String> {
        match (node, name) {
            (Node::PasswordInput, "type") if self.password_revealed => Some("text".to_string()),
            (Node::PasswordToggle, "aria-pressed") => Some(self.password_revealed.to_string()),
            _ => node.attribute(name).map(String::from),
        }
    }

    /// Box of `node` in a single centred column as wide as the viewport allows
    fn layout(&self, node: Node) -> Option<BoundingBox> {
        let viewport_width = f64::from(self.viewport.width);
        if node == Node::Body {
            return Some(BoundingBox {
                x: 0.0,
                y: 0.0,
                width: viewport_width,
                height: f64::from(self.viewport.height),
            });
        }
        let width = (viewport_width - 2.0 * COLUMN_MARGIN).min(COLUMN_MAX_WIDTH).max(0.0);
        let x = ((viewport_width - width) / 2.0).max(COLUMN_MARGIN);
        if node == Node::PasswordToggle {
            let input = self.layout(Node::PasswordInput)?;
            return Some(BoundingBox {
                x: input.right() - 40.0,
                y: input.y + 4.0,
                width: 32.0,
                height: input.height - 8.0,
            });
        }
        let column: &[Node] = match self.route {
            Route::Login => &LOGIN_COLUMN,
            Route::Landing => &LANDING_COLUMN,
            Route::Blank | Route::NotFound => &[],
        };
        let mut y = 2.0 * COLUMN_MARGIN;
        for &item in column.iter().filter(|n| self.visible(**n)) {
            if item == node {
                return Some(BoundingBox {
                    x,
                    y,
                    width,
                    height: item.height(),
                });
            }
            y += item.height() + ROW_GAP;
        }
        None
    }

    fn value(&self, node: Node) -> String {
        match node {
            Node::UsernameInput => self.username.clone(),
            Node::PasswordInput => self.password.clone(),
            _ => String::new(),
        }
    }

    /// Leave the current page for `url`, recording it in history
    fn navigate(&mut self, url: &str) {
        if self.route != Route::Blank {
            self.history.push(self.path.clone());
        }
        self.load(url);
    }

    fn load(&mut self, url: &str) {
        let path = path_of(url, &self.base_url);
        self.route = if path == self.login_path || path == "/" {
            Route::Login
        } else if self.landing_paths.contains(&path) {
            if self.authenticated() {
                Route::Landing
            } else {
                Route::Login
            }
        } else {
            Route::NotFound
        };
        self.path = match self.route {
            Route::Login => self.login_path.clone(),
            _ => path,
        };
        self.username.clear();
        self.password.clear();
        self.password_revealed = false;
        self.error = None;
        self.locked = false;
        self.focus = None;
        debug!("simulated navigation to {} ({:?})", self.path, self.route);
    }

    fn submit(&mut self) {
        let outcome = self.server.lock().authenticate(&self.username, &self.password);
        debug!("simulated login for '{}': {:?}", self.username, outcome);
        match outcome {
            AuthOutcome::Authenticated => {
                self.history.push(self.path.clone());
                self.account = Some(self.username.clone());
                self.route = Route::Landing;
                self.path = self
                    .landing_paths
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "/dashboard".to_string());
                self.error = None;
                self.locked = false;
                self.focus = None;
                self.password_revealed = false;
            }
            AuthOutcome::Rejected(message) => {
                self.error = Some(message);
                self.locked = false;
                self.password.clear();
            }
            AuthOutcome::Locked => {
                self.error = Some(LOCKED_OUT);
                self.locked = true;
                self.password.clear();
            }
        }
    }

    fn check_ready(&self, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        if let ReadySignal::Element(selector) = ready {
            if self.locate(selector).is_none() {
                return Err(DriverError::timeout(selector.as_str(), timeout));
            }
        }
        Ok(())
    }

    fn render(&self) -> String {
        if self.fault == Some(Fault::ServerError) {
            return "<html><body><h1>500 Internal Server Error</h1></body></html>".to_string();
        }
        match self.route {
            Route::Blank => "<html><head></head><body></body></html>".to_string(),
            Route::NotFound => "<html><body><h1>Page not found</h1></body></html>".to_string(),
            Route::Landing => format!(
                "<html><body><header><img id=\"app-logo\" src=\"/static/logo.png\" alt=\"{}\"></header>\
                 <nav id=\"user-menu\">My account</nav>\
                 <div class=\"welcome-banner\">{}</div><h1>Dashboard</h1></body></html>",
                LOGO_ALT,
                self.text(Node::WelcomeBanner)
            ),
            Route::Login => {
                let password_type = if self.password_revealed { "text" } else { "password" };
                let mut html = format!(
                    "<html><body><header><img id=\"app-logo\" src=\"/static/logo.png\" alt=\"{}\"></header>\
                     <form id=\"login-form\">\
                     <label for=\"username\">Username</label>\
                     <input id=\"username\" name=\"username\" type=\"text\" placeholder=\"Enter your username\">\
                     <label for=\"password\">Password</label>\
                     <input id=\"password\" name=\"password\" type=\"{}\">\
                     <button id=\"show-hide-password\" type=\"button\" tabindex=\"-1\" aria-controls=\"password\">{}</button>\
                     <button id=\"login\" type=\"submit\">Login</button>",
                    LOGO_ALT,
                    password_type,
                    self.text(Node::PasswordToggle)
                );
                if let Some(error) = self.error {
                    html.push_str(&format!(
                        "<div class=\"error-message\" role=\"alert\">{}</div>",
                        error
                    ));
                }
                html.push_str("</form></body></html>");
                html
            }
        }
    }
}

/// Path component of `url`, relative to `base` when it is a prefix
fn path_of(url: &str, base: &str) -> String {
    let rest = if let Some(rest) = url.strip_prefix(base) {
        rest
    } else if let Some((_, after_scheme)) = url.split_once("://") {
        after_scheme.find('/').map_or("", |i| &after_scheme[i..])
    } else {
        url
    };
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    if rest.is_empty() {
        "/".to_string()
    } else if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    }
}

#[async_trait]
impl BrowserDriver for SimulatedLoginApp {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn goto(&mut self, url: &str, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        self.live()?;
        self.touch();
        self.navigate(url);
        self.check_ready(ready, timeout)
    }

    async fn current_url(&mut self) -> DriverResult<String> {
        self.live()?;
        if self.route == Route::Blank {
            return Ok("about:blank".to_string());
        }
        Ok(format!("{}{}", self.base_url, self.path))
    }

    async fn go_back(&mut self, ready: &ReadySignal, timeout: Duration) -> DriverResult<()> {
        self.live()?;
        self.touch();
        let Some(previous) = self.history.pop() else {
            return Ok(());
        };
        let url = format!("{}{}", self.base_url, previous);
        self.load(&url);
        self.check_ready(ready, timeout)
    }

    async fn fill(&mut self, selector: &str, value: &str, _timeout: Duration) -> DriverResult<()> {
        self.live()?;
        self.touch();
        let node = self.interactable(selector)?;
        match node {
            Node::UsernameInput => self.username = value.to_string(),
            Node::PasswordInput => self.password = value.to_string(),
            _ => return Err(DriverError::NotInteractable(selector.to_string())),
        }
        self.focus = Some(node);
        Ok(())
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> DriverResult<()> {
        self.live()?;
        self.touch();
        let node = self.interactable(selector)?;
        match node {
            Node::LoginButton => self.submit(),
            Node::PasswordToggle => self.password_revealed = !self.password_revealed,
            Node::UsernameLabel => self.focus = Some(Node::UsernameInput),
            Node::PasswordLabel => self.focus = Some(Node::PasswordInput),
            other if other.focusable() => self.focus = Some(other),
            _ => {}
        }
        Ok(())
    }

    async fn focus(&mut self, selector: &str) -> DriverResult<()> {
        self.live()?;
        let node = self
            .locate(selector)
            .ok_or_else(|| DriverError::NoSuchElement(selector.to_string()))?;
        if node.focusable() {
            self.focus = Some(node);
        } else if node == Node::Body {
            self.focus = None;
        }
        Ok(())
    }

    async fn press_key(&mut self, key: Key) -> DriverResult<()> {
        self.live()?;
        self.touch();
        match key {
            Key::Tab => {
                let order: Vec<Node> = TAB_ORDER
                    .into_iter()
                    .filter(|n| self.visible(*n) && self.enabled(*n))
                    .collect();
                self.focus = match self.focus.and_then(|f| order.iter().position(|n| *n == f)) {
                    Some(i) => order.get(i + 1).copied(),
                    None => order.first().copied(),
                };
            }
            Key::Enter => {
                if self.route == Route::Login
                    && self.focus.is_some_and(|f| f.focusable())
                    && self.enabled(Node::LoginButton)
                {
                    self.submit();
                }
            }
        }
        Ok(())
    }

    async fn element_state(&mut self, selector: &str) -> DriverResult<Option<ElementState>> {
        self.live()?;
        Ok(self.locate(selector).map(|node| ElementState {
            visible: self.visible(node),
            enabled: self.enabled(node),
            text: self.text(node),
            value: self.value(node),
        }))
    }

    async fn attribute(&mut self, selector: &str, name: &str) -> DriverResult<Option<String>> {
        self.live()?;
        Ok(self
            .locate(selector)
            .and_then(|node| self.attribute_of(node, name)))
    }

    async fn wait_for(&mut self, selector: &str, state: WaitState, timeout: Duration) -> DriverResult<()> {
        self.live()?;
        let node = self.locate(selector);
        let shown = node.is_some_and(|n| self.visible(n));
        let reached = match state {
            WaitState::Visible => shown,
            WaitState::Hidden => !shown,
            WaitState::Attached => node.is_some(),
            WaitState::Detached => node.is_none(),
        };
        if reached {
            Ok(())
        } else {
            Err(DriverError::timeout(
                format!("{} to be {}", selector, state.as_str()),
                timeout,
            ))
        }
    }

    async fn wait_for_settle(&mut self, _timeout: Duration) -> DriverResult<()> {
        self.live()
    }

    async fn focused_element(&mut self) -> DriverResult<Option<FocusedElement>> {
        self.live()?;
        Ok(self.focus.map(|node| FocusedElement {
            tag: node.tag().to_string(),
            id: self.attribute_of(node, "id").unwrap_or_default(),
            name: self.attribute_of(node, "name").unwrap_or_default(),
            input_type: self.attribute_of(node, "type").unwrap_or_default(),
        }))
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> DriverResult<()> {
        self.live()?;
        debug!("simulated viewport {}x{}", viewport.width, viewport.height);
        self.viewport = viewport;
        Ok(())
    }

    async fn bounding_box(&mut self, selector: &str) -> DriverResult<Option<BoundingBox>> {
        self.live()?;
        Ok(self
            .locate(selector)
            .filter(|node| self.visible(*node))
            .and_then(|node| self.layout(node)))
    }

    async fn page_content(&mut self) -> DriverResult<String> {
        self.live()?;
        Ok(self.render())
    }

    async fn screenshot(&mut self) -> DriverResult<Vec<u8>> {
        self.live()?;
        Ok(BLANK_PNG.to_vec())
    }

    async fn clear_state(&mut self) -> DriverResult<()> {
        self.live()?;
        self.account = None;
        Ok(())
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.live()?;
        self.closed = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.closed = true;
    }
}
