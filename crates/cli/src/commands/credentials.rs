//! Credentials Command

use anyhow::Result;
use serde::Serialize;

use loginbdd_common::{CredentialRegistry, SuiteConfig};

use crate::output::{abbreviate, print_list, OutputFormat, TableDisplay};

const SHOWN_CHARS: usize = 32;

#[derive(Serialize)]
pub struct CredentialDisplay {
    pub token: String,
    pub value: String,
    pub length: usize,
}

impl TableDisplay for CredentialDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Token", "Value", "Length"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.token.clone(),
            format!("{:?}", self.value),
            self.length.to_string(),
        ]
    }
}

pub fn execute(config: &SuiteConfig, format: OutputFormat) -> Result<()> {
    let registry = CredentialRegistry::with_overrides(config.credentials.clone());
    let rows: Vec<CredentialDisplay> = registry
        .tokens()
        .into_iter()
        .map(|token| {
            let value = registry.resolve(token);
            CredentialDisplay {
                token: token.to_string(),
                value: abbreviate(&value, SHOWN_CHARS),
                length: value.chars().count(),
            }
        })
        .collect();
    print_list(&rows, format);
    Ok(())
}
