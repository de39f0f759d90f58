//! loginbdd CLI - Main Entry Point
//!
//! Runs declarative login page scenarios against a browser backend, and
//! inspects the step catalog and credential tokens they are written with.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod output;

use commands::{check, credentials, run, steps};
use loginbdd_common::DEFAULT_CONFIG_FILE;

/// Behaviour-driven login page test runner
#[derive(Parser)]
#[command(name = "loginbdd")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suite configuration file
    #[arg(short, long, env = "LOGINBDD_CONFIG", default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    log_format: LogFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run feature files
    Run(run::RunArgs),

    /// Check that every step of every feature matches exactly one pattern
    Check(check::CheckArgs),

    /// List the registered step patterns
    Steps,

    /// List credential tokens and the values they type
    Credentials,
}

fn init_logging(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Commands::Run(args) => {
            let config = commands::load_config(&cli.config)?;
            run::execute(args, config, cli.format).await
        }
        Commands::Check(args) => {
            let config = commands::load_config(&cli.config)?;
            check::execute(args, config).await
        }
        Commands::Steps => {
            steps::execute(cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Credentials => {
            let config = commands::load_config(&cli.config)?;
            credentials::execute(&config, cli.format)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_format);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}
