//! loginbdd Common Library
//!
//! Shared error taxonomy, suite configuration, credential registry and value
//! types used by the step catalog, the page object and the drivers.

pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{CredentialTrimming, LengthRule, SuiteConfig};
pub use credentials::CredentialRegistry;
pub use error::{Error, Result};
pub use types::*;

/// loginbdd version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "loginbdd.toml";
