//! Check Command

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::process::ExitCode;

use loginbdd_common::SuiteConfig;
use loginbdd_e2e::{RunnerConfig, SuiteRunner};

use crate::output::{print_error, print_success};

#[derive(Args)]
pub struct CheckArgs {
    /// Directory of YAML feature files
    #[arg(short, long, default_value = "features")]
    pub specs: PathBuf,
}

/// Resolve every sentence without launching a browser
pub async fn execute(args: CheckArgs, config: SuiteConfig) -> Result<ExitCode> {
    let runner = SuiteRunner::new(
        config,
        RunnerConfig {
            specs_dir: args.specs,
            start_server: false,
            ..RunnerConfig::default()
        },
    )?;
    let scenarios = runner.load()?;
    let sentences: usize = scenarios.iter().map(|s| s.steps.len()).sum();

    match runner.check(&scenarios) {
        Ok(()) => {
            print_success(&format!(
                "{} scenarios, {} steps: every step matches exactly one pattern",
                scenarios.len(),
                sentences
            ));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_build_error() => {
            print_error(&e.to_string());
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}
