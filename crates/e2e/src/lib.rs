//! loginbdd E2E framework
//!
//! Turns declarative login-page scenarios into browser actions:
//! - A step registry maps sentences to async handlers
//! - A login page object wraps a swappable browser driver
//! - A scenario context owns one browser session per scenario
//! - A suite runner loads YAML features and reports results
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SuiteRunner                              │
//! │    ├── FeatureSpec::load_all(dir) -> [Scenario]             │
//! │    ├── StepRegistry::validate(sentences)                    │
//! │    └── run_scenario(scenario) -> ScenarioResult             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioContext                                            │
//! │    ├── CredentialRegistry (shared, read-only)               │
//! │    └── LoginPage                                            │
//! │          └── dyn BrowserDriver                              │
//! │                ├── PlaywrightDriver  (node bridge)          │
//! │                ├── WebDriverDriver   (W3C over HTTP)        │
//! │                ├── SimulatedLoginApp (in memory)            │
//! │                └── NullDriver        (call log)             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod driver;
pub mod page;
pub mod runner;
pub mod server;
pub mod spec;
pub mod steps;

pub use context::ScenarioContext;
pub use driver::{BrowserDriver, ConfiguredFactory, DriverError, DriverFactory};
pub use page::LoginPage;
pub use runner::{RunnerConfig, ScenarioResult, ScenarioStatus, StepStatus, SuiteResult, SuiteRunner};
pub use server::AppServer;
pub use spec::{FeatureSpec, Scenario};
pub use steps::{default_registry, StepRegistry};
