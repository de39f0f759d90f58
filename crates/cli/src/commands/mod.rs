//! CLI Commands

pub mod check;
pub mod credentials;
pub mod run;
pub mod steps;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

use loginbdd_common::SuiteConfig;

/// Configuration file, then `LOGINBDD_*` variables
pub fn load_config(path: &Path) -> Result<SuiteConfig> {
    let mut config = SuiteConfig::load(path)
        .with_context(|| format!("loading configuration from {}", path.display()))?;
    config.apply_env().context("applying LOGINBDD_* overrides")?;
    debug!(
        "Using {} driver on {} against {}",
        config.browser.driver, config.browser.browser, config.app.base_url
    );
    Ok(config)
}
