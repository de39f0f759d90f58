//! Steps Command

use anyhow::Result;
use serde::Serialize;

use loginbdd_e2e::default_registry;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Serialize)]
pub struct StepDisplay {
    pub pattern: String,
    pub arguments: Vec<String>,
}

impl TableDisplay for StepDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Pattern", "Arguments"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.pattern.clone(), self.arguments.join(", ")]
    }
}

pub fn execute(format: OutputFormat) -> Result<()> {
    let registry = default_registry()?;
    let steps: Vec<StepDisplay> = registry
        .steps()
        .map(|step| StepDisplay {
            pattern: step.pattern().as_str().to_string(),
            arguments: step
                .pattern()
                .slots()
                .map(|slot| format!("{}: {}", slot.name, slot.kind))
                .collect(),
        })
        .collect();
    print_list(&steps, format);
    Ok(())
}
