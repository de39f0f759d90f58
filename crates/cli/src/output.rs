//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use loginbdd_e2e::{ScenarioStatus, StepStatus, SuiteResult};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No items found.");
                return;
            }
            let mut table = table();
            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }
            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
    }
}

fn scenario_badge(status: ScenarioStatus) -> String {
    match status {
        ScenarioStatus::Passed => "✓ passed".green().to_string(),
        ScenarioStatus::Failed => "✗ failed".red().to_string(),
        ScenarioStatus::Skipped => "- pending".yellow().to_string(),
    }
}

/// Print a suite run: one row per scenario, failing steps underneath
pub fn print_suite(result: &SuiteResult, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(result).unwrap_or_default());
        return;
    }

    let mut table = table();
    table.set_header(vec!["Feature", "Scenario", "Status", "Duration"]);
    for scenario in &result.results {
        table.add_row(vec![
            scenario.feature.clone(),
            scenario.name.clone(),
            scenario_badge(scenario.status),
            format!("{} ms", scenario.duration_ms),
        ]);
    }
    println!("{table}");

    for scenario in result.results.iter().filter(|s| !s.passed()) {
        println!();
        println!("{} {}", scenario_badge(scenario.status), scenario.name.bold());
        for step in &scenario.steps {
            let marker = match step.status {
                StepStatus::Passed => "✓".green(),
                StepStatus::Failed => "✗".red(),
                StepStatus::Pending => "?".yellow(),
                StepStatus::Skipped => "-".dimmed(),
            };
            println!("  {} {}", marker, step.sentence);
            if let Some(error) = &step.error {
                println!("      {}", error.dimmed());
            }
        }
        if let Some(path) = &scenario.screenshot {
            println!("  screenshot: {}", path.display());
        }
    }

    println!();
    let summary = format!(
        "{} scenarios: {} passed, {} failed, {} pending ({} ms)",
        result.total, result.passed, result.failed, result.skipped, result.duration_ms
    );
    if result.success() {
        print_success(&summary);
    } else {
        print_error(&summary);
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}

/// Shorten long values to `keep` characters plus their full length
pub fn abbreviate(value: &str, keep: usize) -> String {
    let len = value.chars().count();
    if len <= keep {
        return value.to_string();
    }
    let head: String = value.chars().take(keep).collect();
    format!("{}… ({} chars)", head, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbreviate() {
        assert_eq!(abbreviate("short", 8), "short");
        assert_eq!(abbreviate(&"u".repeat(300), 4), "uuuu… (300 chars)");
    }
}
