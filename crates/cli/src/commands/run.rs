//! Run Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::warn;

use loginbdd_common::{Browser, DriverKind, SuiteConfig};
use loginbdd_e2e::{RunnerConfig, SuiteRunner};

use crate::output::{print_info, print_suite, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Directory of YAML feature files
    #[arg(short, long, default_value = "features")]
    pub specs: PathBuf,

    /// Run only scenarios carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only scenarios whose name contains this text
    #[arg(short, long)]
    pub name: Option<String>,

    /// Browser backend (playwright, webdriver, simulated, null)
    #[arg(long)]
    pub driver: Option<DriverKind>,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Base URL of the application under test
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output directory for results and screenshots
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Do not spawn the configured application server
    #[arg(long)]
    pub no_server: bool,
}

impl RunArgs {
    fn apply(&self, config: &mut SuiteConfig) {
        if let Some(driver) = self.driver {
            config.browser.driver = driver;
        }
        if let Some(browser) = self.browser {
            config.browser.browser = browser;
        }
        if let Some(url) = &self.base_url {
            config.app.base_url = url.clone();
        }
    }
}

/// Exit code 0 when nothing failed, 1 otherwise, 130 when interrupted
///
/// Ctrl-C drops the in-flight scenario while the runtime is still up, so its
/// browser session is released before the process exits.
pub async fn execute(args: RunArgs, mut config: SuiteConfig, format: OutputFormat) -> Result<ExitCode> {
    args.apply(&mut config);

    let mut runner = SuiteRunner::new(
        config,
        RunnerConfig {
            specs_dir: args.specs.clone(),
            output_dir: args.output.clone(),
            tag: args.tag.clone(),
            name: args.name.clone(),
            start_server: !args.no_server,
            ..RunnerConfig::default()
        },
    )?;

    let result = tokio::select! {
        result = runner.run_all() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received interrupt, abandoning the remaining scenarios");
            return Ok(ExitCode::from(130));
        }
    };
    let path = runner.write_results(&result)?;

    print_suite(&result, format);
    if let OutputFormat::Table = format {
        print_info(&format!("Results written to {}", path.display()));
    }
    Ok(if result.success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
