//! Declarative YAML scenario specifications
//!
//! A feature file names a feature, optional background sentences run
//! before every scenario, and the scenarios themselves. A scenario with
//! `examples` is an outline: it expands to one scenario per row, with every
//! `<column>` in its sentences replaced by the row's value.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use loginbdd_common::{Error, Result};

/// One feature file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags inherited by every scenario
    #[serde(default)]
    pub tags: Vec<String>,

    /// Sentences run before each scenario's own steps
    #[serde(default)]
    pub background: Vec<String>,

    pub scenarios: Vec<ScenarioSpec>,

    /// File the feature was read from
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub steps: Vec<String>,

    /// Outline rows, column name to value
    #[serde(default)]
    pub examples: Vec<BTreeMap<String, serde_yaml::Value>>,
}

/// A runnable scenario after background merge and outline expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub feature: String,
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<String>,
}

fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('@')
}

impl Scenario {
    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        self.tags.iter().any(|t| normalize_tag(t) == tag)
    }

    /// Case-insensitive match on the scenario or feature name
    pub fn name_matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.name.to_lowercase().contains(&needle) || self.feature.to_lowercase().contains(&needle)
    }
}

fn scalar_text(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Null => Some(String::new()),
        _ => None,
    }
}

impl FeatureSpec {
    /// Parse a feature from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: Self = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse a feature file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut spec = Self::from_yaml(&content)
            .map_err(|e| Error::SpecParse(format!("{}: {}", path.display(), e)))?;
        spec.source = Some(path.to_path_buf());
        Ok(spec)
    }

    /// Load every `.yaml` / `.yml` file under `dir`, in path order
    pub fn load_all(dir: &Path) -> Result<Vec<Self>> {
        if !dir.is_dir() {
            return Err(Error::SpecParse(format!(
                "spec directory {} does not exist",
                dir.display()
            )));
        }
        let mut specs = Vec::new();
        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            specs.push(Self::from_file(entry.path())?);
        }
        debug!("Loaded {} feature files from {}", specs.len(), dir.display());
        Ok(specs)
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::SpecParse("feature name must not be empty".into()));
        }
        if self.scenarios.is_empty() {
            return Err(Error::SpecParse(format!("feature '{}' has no scenarios", self.name)));
        }
        for scenario in &self.scenarios {
            if scenario.steps.is_empty() {
                return Err(Error::SpecParse(format!(
                    "scenario '{}' in '{}' has no steps",
                    scenario.name, self.name
                )));
            }
            for (i, row) in scenario.examples.iter().enumerate() {
                if let Some((column, _)) = row.iter().find(|(_, v)| scalar_text(v).is_none()) {
                    return Err(Error::SpecParse(format!(
                        "scenario '{}' example {}: column '{}' is not a scalar",
                        scenario.name,
                        i + 1,
                        column
                    )));
                }
            }
        }
        Ok(())
    }

    /// Runnable scenarios: background prepended, outlines expanded
    pub fn expand(&self) -> Vec<Scenario> {
        let mut out = Vec::new();
        for spec in &self.scenarios {
            let tags: Vec<String> = self.tags.iter().chain(&spec.tags).cloned().collect();
            let base: Vec<String> = self.background.iter().chain(&spec.steps).cloned().collect();

            if spec.examples.is_empty() {
                out.push(Scenario {
                    feature: self.name.clone(),
                    name: spec.name.clone(),
                    tags,
                    steps: base,
                });
                continue;
            }

            for (i, row) in spec.examples.iter().enumerate() {
                let values: Vec<(String, String)> = row
                    .iter()
                    .filter_map(|(k, v)| scalar_text(v).map(|t| (format!("<{}>", k), t)))
                    .collect();
                let fill = |text: &str| {
                    values
                        .iter()
                        .fold(text.to_string(), |acc, (key, value)| acc.replace(key, value))
                };
                out.push(Scenario {
                    feature: self.name.clone(),
                    name: format!("{} #{}", fill(&spec.name), i + 1),
                    tags: tags.clone(),
                    steps: base.iter().map(|step| fill(step)).collect(),
                });
            }
        }
        out
    }
}

/// Scenarios of `features` carrying `tag` and matching `name`
pub fn select(features: &[FeatureSpec], tag: Option<&str>, name: Option<&str>) -> Vec<Scenario> {
    features
        .iter()
        .flat_map(FeatureSpec::expand)
        .filter(|s| tag.map_or(true, |t| s.has_tag(t)))
        .filter(|s| name.map_or(true, |n| s.name_matches(n)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEATURE: &str = r#"
name: Login
tags: ["@login"]
background:
  - Given I am on the login page
scenarios:
  - name: Successful login
    tags: [smoke]
    steps:
      - When I enter "valid_user" into the username field
      - Then I should be successfully logged in
  - name: Boundary values
    steps:
      - When I enter "<username>" into the username field
      - And I enter "<password>" into the password field
      - Then the behaviour should follow the configured length rules and show "<expected>"
    examples:
      - { username: minimal_length_user, password: minimal_length_pass, expected: successful_or_policy_correct }
      - { username: overlong_username, password: 12345, expected: rejected_with_clear_message }
"#;

    #[test]
    fn test_expand_background_and_outline() {
        let feature = FeatureSpec::from_yaml(FEATURE).unwrap();
        let scenarios = feature.expand();
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[0].steps[0], "Given I am on the login page");
        assert_eq!(scenarios[0].steps.len(), 3);
        assert_eq!(scenarios[2].name, "Boundary values #2");
        assert_eq!(
            scenarios[2].steps[2],
            r#"And I enter "12345" into the password field"#
        );
    }

    #[test]
    fn test_select_by_tag_and_name() {
        let features = vec![FeatureSpec::from_yaml(FEATURE).unwrap()];
        assert_eq!(select(&features, Some("smoke"), None).len(), 1);
        assert_eq!(select(&features, Some("login"), None).len(), 3);
        assert_eq!(select(&features, None, Some("boundary")).len(), 2);
        assert!(select(&features, Some("@missing"), None).is_empty());
    }

    #[test]
    fn test_rejects_empty_scenarios() {
        let err = FeatureSpec::from_yaml("name: Empty\nscenarios: []\n").unwrap_err();
        assert!(matches!(err, Error::SpecParse(_)));
    }

    #[test]
    fn test_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), FEATURE.replace("name: Login", "name: B")).unwrap();
        std::fs::write(dir.path().join("a.yml"), FEATURE.replace("name: Login", "name: A")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let specs = FeatureSpec::load_all(dir.path()).unwrap();
        let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert!(specs[0].source.is_some());
    }
}
