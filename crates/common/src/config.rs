//! Suite configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Browser, DriverKind, Viewport};

/// Prefix of environment variables that override the file
pub const ENV_PREFIX: &str = "LOGINBDD_";

/// Top-level suite configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SuiteConfig {
    /// Application under test
    pub app: AppConfig,

    /// Browser and driver selection
    pub browser: BrowserConfig,

    /// Bounded waits
    pub timeouts: TimeoutConfig,

    /// CSS selectors of the login form
    pub selectors: SelectorConfig,

    /// Policies the application-under-test contract defines
    pub policy: PolicyConfig,

    /// Credential token overrides and additions
    pub credentials: BTreeMap<String, String>,

    /// Optional process to spawn before the suite
    pub server: Option<ServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub login_path: String,
    /// Routes that count as the authenticated landing page
    pub landing_paths: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            login_path: "/login".to_string(),
            landing_paths: vec![
                "/home".to_string(),
                "/dashboard".to_string(),
                "/welcome".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Absolute URL of the login entry point
    pub fn login_url(&self) -> String {
        join_url(&self.base_url, &self.login_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub driver: DriverKind,
    pub browser: Browser,
    pub headless: bool,
    /// Selenium / chromedriver / geckodriver endpoint
    pub webdriver_url: String,
    /// Node binary used to host the Playwright bridge
    pub node_binary: PathBuf,
    pub viewport: Viewport,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            driver: DriverKind::Playwright,
            browser: Browser::Chromium,
            headless: true,
            webdriver_url: "http://localhost:4444".to_string(),
            node_binary: PathBuf::from("node"),
            viewport: Viewport::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub navigation_ms: u64,
    pub action_ms: u64,
    /// Post-submit settle wait
    pub settle_ms: u64,
    /// Upper bound for a single state query
    pub query_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            navigation_ms: 10_000,
            action_ms: 5_000,
            settle_ms: 5_000,
            query_ms: 3_000,
        }
    }
}

impl TimeoutConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }

    pub fn action(&self) -> Duration {
        Duration::from_millis(self.action_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub username_input: String,
    pub password_input: String,
    pub login_button: String,
    pub error_message: String,
    /// Present only for an authenticated user
    pub logged_in_marker: String,
    pub username_label: String,
    pub password_label: String,
    pub lockout_message: String,
    /// Control that shows or hides the password
    pub password_toggle: String,
    /// Logo and other images of the login page
    pub logo_image: String,
    /// Greeting shown after login
    pub welcome_message: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            username_input: "input#username, input[name='username'], input[type='email']".to_string(),
            password_input: "input#password, input[name='password'], input[type='password']".to_string(),
            login_button: "button[type='submit'], input[type='submit'], button#login".to_string(),
            error_message: ".error, .alert-danger, [role='alert'], .error-message".to_string(),
            logged_in_marker: "#user-menu, .user-profile, [data-testid='user-menu']".to_string(),
            username_label: "label[for='username']".to_string(),
            password_label: "label[for='password']".to_string(),
            lockout_message: "[data-testid='lockout-message'], .lockout-message".to_string(),
            password_toggle: "#show-hide-password, [data-testid='password-toggle'], .password-toggle".to_string(),
            logo_image: "img#app-logo, img.logo, header img".to_string(),
            welcome_message: ".welcome-banner, [data-testid='welcome-message']".to_string(),
        }
    }
}

/// How the application treats surrounding whitespace in credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialTrimming {
    /// The contract does not say; dependent steps are pending
    #[default]
    Unspecified,
    Trimmed,
    Preserved,
}

/// Inclusive length bounds for a credential field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRule {
    #[serde(default)]
    pub min: Option<usize>,
    #[serde(default)]
    pub max: Option<usize>,
}

impl LengthRule {
    pub fn allows(&self, len: usize) -> bool {
        self.min.map_or(true, |min| len >= min) && self.max.map_or(true, |max| len <= max)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutPolicy {
    /// Failed attempts tolerated before the account locks
    pub max_attempts: u32,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub credential_trimming: CredentialTrimming,
    pub username_length: Option<LengthRule>,
    pub password_length: Option<LengthRule>,
    pub lockout: LockoutPolicy,
    pub response_threshold_ms: u64,
    /// Idle time after which the application ends a session
    pub session_timeout_ms: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            credential_trimming: CredentialTrimming::Unspecified,
            username_length: None,
            password_length: None,
            lockout: LockoutPolicy::default(),
            response_threshold_ms: 3_000,
            session_timeout_ms: None,
        }
    }
}

impl PolicyConfig {
    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_ms.map(Duration::from_millis)
    }
}

/// Application-under-test process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Program followed by its arguments
    pub command: Vec<String>,

    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    /// Path polled until it answers with a success status
    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_startup_timeout_ms")]
    pub startup_timeout_ms: u64,
}

fn default_health_path() -> String {
    "/".to_string()
}

fn default_startup_timeout_ms() -> u64 {
    30_000
}

impl SuiteConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            debug!("Loaded configuration from {}", path.display());
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `LOGINBDD_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(std::env::vars())
    }

    /// Apply overrides from an explicit variable list
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let Some(name) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let value = value.into();
            match name {
                "BASE_URL" => self.app.base_url = value,
                "LOGIN_PATH" => self.app.login_path = value,
                "DRIVER" => self.browser.driver = value.parse()?,
                "BROWSER" => self.browser.browser = value.parse()?,
                "WEBDRIVER_URL" => self.browser.webdriver_url = value,
                "HEADLESS" => {
                    self.browser.headless = parse_bool(&value).ok_or_else(|| {
                        Error::InvalidConfig(format!("LOGINBDD_HEADLESS: '{}' is not a boolean", value))
                    })?
                }
                _ => continue,
            }
            debug!("Configuration override from {}{}", ENV_PREFIX, name);
        }
        self.validate()
    }

    /// Reject configurations no scenario can run against
    pub fn validate(&self) -> Result<()> {
        if self.app.base_url.is_empty() {
            return Err(Error::InvalidConfig("app.base_url must not be empty".into()));
        }
        if self.timeouts.navigation_ms == 0 || self.timeouts.action_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".into()));
        }
        for (name, rule) in [
            ("username_length", self.policy.username_length),
            ("password_length", self.policy.password_length),
        ] {
            if let Some(LengthRule { min: Some(min), max: Some(max) }) = rule {
                if min > max {
                    return Err(Error::InvalidConfig(format!(
                        "policy.{}: min {} exceeds max {}",
                        name, min, max
                    )));
                }
            }
        }
        if let Some(server) = &self.server {
            if server.command.is_empty() {
                return Err(Error::InvalidConfig("server.command must name a program".into()));
            }
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
