//! Suite runner: loads scenarios, validates them against the step catalog,
//! then runs each one in its own [`ScenarioContext`].

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use loginbdd_common::{CredentialRegistry, Result, SuiteConfig};

use crate::context::ScenarioContext;
use crate::driver::{ConfiguredFactory, DriverFactory};
use crate::server::AppServer;
use crate::spec::{self, FeatureSpec, Scenario};
use crate::steps::{default_registry, StepRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Depends on an unconfigured policy
    Pending,
    /// Not run because an earlier step did not pass
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub sentence: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub feature: String,
    pub name: String,
    pub status: ScenarioStatus,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub screenshot: Option<PathBuf>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.status == ScenarioStatus::Passed
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

impl SuiteResult {
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Configuration for the suite runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tag: Option<String>,
    pub name: Option<String>,
    /// Spawn `server` from the suite configuration before the first scenario
    pub start_server: bool,
    pub screenshots: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("features"),
            output_dir: PathBuf::from("test-results"),
            tag: None,
            name: None,
            start_server: true,
            screenshots: true,
        }
    }
}

pub struct SuiteRunner {
    config: Arc<SuiteConfig>,
    credentials: Arc<CredentialRegistry>,
    factory: Arc<dyn DriverFactory>,
    registry: StepRegistry,
    runner: RunnerConfig,
    server: Option<AppServer>,
}

impl SuiteRunner {
    /// Runner over the default step catalog and the configured driver
    pub fn new(config: SuiteConfig, runner: RunnerConfig) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let credentials = Arc::new(CredentialRegistry::with_overrides(config.credentials.clone()));
        let factory = Arc::new(ConfiguredFactory::new(config.clone(), credentials.clone()));
        Ok(Self {
            config,
            credentials,
            factory,
            registry: default_registry()?,
            runner,
            server: None,
        })
    }

    pub fn with_factory(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.factory = factory;
        self
    }

    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    pub fn credentials(&self) -> &CredentialRegistry {
        &self.credentials
    }

    /// Scenarios from `specs_dir` after tag and name filters
    pub fn load(&self) -> Result<Vec<Scenario>> {
        let features = FeatureSpec::load_all(&self.runner.specs_dir)?;
        let scenarios = spec::select(
            &features,
            self.runner.tag.as_deref(),
            self.runner.name.as_deref(),
        );
        debug!(
            "Selected {} scenario(s) from {} feature(s)",
            scenarios.len(),
            features.len()
        );
        Ok(scenarios)
    }

    /// Every sentence must resolve to exactly one step
    pub fn check(&self, scenarios: &[Scenario]) -> Result<()> {
        self.registry
            .validate(scenarios.iter().flat_map(|s| s.steps.iter().map(String::as_str)))
    }

    /// Load, validate and run every selected scenario
    pub async fn run_all(&mut self) -> Result<SuiteResult> {
        let scenarios = self.load()?;
        self.run_scenarios(&scenarios).await
    }

    pub async fn run_scenarios(&mut self, scenarios: &[Scenario]) -> Result<SuiteResult> {
        self.check(scenarios)?;

        let started_at = Utc::now();
        let start = Instant::now();
        self.start_server().await?;
        info!("Running {} scenario(s)...", scenarios.len());

        let mut results = Vec::with_capacity(scenarios.len());
        let (mut passed, mut failed, mut skipped) = (0, 0, 0);
        for scenario in scenarios {
            let result = self.run_scenario(scenario).await;
            match result.status {
                ScenarioStatus::Passed => {
                    passed += 1;
                    info!("✓ {} ({} ms)", result.name, result.duration_ms);
                }
                ScenarioStatus::Skipped => {
                    skipped += 1;
                    warn!(
                        "- {} pending: {}",
                        result.name,
                        result.error.as_deref().unwrap_or("pending step")
                    );
                }
                ScenarioStatus::Failed => {
                    failed += 1;
                    error!(
                        "✗ {} - {}",
                        result.name,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Scenario results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(SuiteResult {
            started_at,
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    /// Run one scenario. The context is torn down on every path.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioResult {
        let span = info_span!("scenario", scenario = %scenario.name);
        self.execute(scenario).instrument(span).await
    }

    async fn execute(&self, scenario: &Scenario) -> ScenarioResult {
        let start = Instant::now();
        let mut ctx = ScenarioContext::new(
            self.config.clone(),
            self.credentials.clone(),
            self.factory.clone(),
        );

        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut status = ScenarioStatus::Passed;
        let mut error = None;

        for sentence in &scenario.steps {
            if status != ScenarioStatus::Passed {
                steps.push(StepResult {
                    sentence: sentence.clone(),
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                    error: None,
                });
                continue;
            }

            let step_start = Instant::now();
            let outcome = AssertUnwindSafe(self.registry.dispatch(sentence, &mut ctx))
                .catch_unwind()
                .await;
            let (step_status, step_error) = match outcome {
                Ok(Ok(())) => (StepStatus::Passed, None),
                Ok(Err(e)) if e.is_pending() => {
                    status = ScenarioStatus::Skipped;
                    (StepStatus::Pending, Some(e.to_string()))
                }
                Ok(Err(e)) => {
                    status = ScenarioStatus::Failed;
                    (StepStatus::Failed, Some(e.to_string()))
                }
                Err(panic) => {
                    status = ScenarioStatus::Failed;
                    (StepStatus::Failed, Some(format!("step panicked: {}", panic_message(&*panic))))
                }
            };
            if step_error.is_some() {
                error = step_error.clone();
            }
            steps.push(StepResult {
                sentence: sentence.clone(),
                status: step_status,
                duration_ms: step_start.elapsed().as_millis() as u64,
                error: step_error,
            });
        }

        let screenshot = if status == ScenarioStatus::Failed && self.runner.screenshots {
            self.capture_failure(&mut ctx, scenario).await
        } else {
            None
        };

        if let Err(e) = ctx.teardown().await {
            warn!("Teardown of '{}' failed: {}", scenario.name, e);
        }

        ScenarioResult {
            feature: scenario.feature.clone(),
            name: scenario.name.clone(),
            status,
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error,
            screenshot,
        }
    }

    async fn capture_failure(&self, ctx: &mut ScenarioContext, scenario: &Scenario) -> Option<PathBuf> {
        let page = ctx.current_page()?;
        let path = self
            .runner
            .output_dir
            .join("screenshots")
            .join(format!("{}.png", file_stem(&scenario.name)));
        match page.capture_screenshot(&path).await {
            Ok(()) => {
                info!("Saved failure screenshot to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not capture screenshot for '{}': {}", scenario.name, e);
                None
            }
        }
    }

    async fn start_server(&mut self) -> Result<()> {
        if self.server.is_some() || !self.runner.start_server {
            return Ok(());
        }
        if let Some(server) = &self.config.server {
            self.server = Some(AppServer::start(server, &self.config.app.base_url).await?);
        }
        Ok(())
    }

    /// Stop the application under test, if this runner started it
    pub fn stop_server(&mut self) -> Result<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &SuiteResult) -> Result<PathBuf> {
        write_results(&self.runner.output_dir, results)
    }
}

impl Drop for SuiteRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

pub fn write_results(output_dir: &Path, results: &SuiteResult) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loginbdd_common::DriverKind;
    use loginbdd_common::Error;

    fn simulated() -> SuiteConfig {
        let mut config = SuiteConfig::default();
        config.browser.driver = DriverKind::Simulated;
        config
    }

    fn scenario(steps: &[&str]) -> Scenario {
        Scenario {
            feature: "Login".into(),
            name: "Sample".into(),
            tags: vec![],
            steps: steps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn runner(output: &Path) -> SuiteRunner {
        SuiteRunner::new(
            simulated(),
            RunnerConfig {
                output_dir: output.to_path_buf(),
                ..RunnerConfig::default()
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_sentence_fails_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path());
        let err = runner
            .run_scenarios(&[scenario(&["Given I am on the login page", "When I dance"])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoMatchingStep(s) if s == "I dance"));
    }

    #[tokio::test]
    async fn test_failure_skips_rest_and_saves_screenshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path());
        let result = runner
            .run_scenarios(&[scenario(&[
                "Given I am on the login page",
                "Then I should be successfully logged in",
                "And the password should be masked",
            ])])
            .await
            .unwrap();
        assert_eq!(result.failed, 1);
        let scenario = &result.results[0];
        assert_eq!(scenario.steps[1].status, StepStatus::Failed);
        assert_eq!(scenario.steps[2].status, StepStatus::Skipped);
        assert!(scenario.screenshot.as_ref().unwrap().exists());
    }

    #[tokio::test]
    async fn test_unconfigured_policy_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut runner = runner(dir.path());
        let result = runner
            .run_scenarios(&[scenario(&[
                "Given I am on the login page",
                r#"When I enter "  valid_user  " into the username field"#,
                r#"And I enter "valid_password" into the password field"#,
                "And I click the Login button",
                "Then the system should treat the credentials as trimmed",
            ])])
            .await
            .unwrap();
        assert_eq!(result.skipped, 1);
        assert!(result.success());
        assert_eq!(result.results[0].steps[4].status, StepStatus::Pending);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = SuiteResult {
            started_at: Utc::now(),
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 1,
            results: vec![],
        };
        let path = write_results(dir.path(), &results).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["duration_ms"], 1);
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("Boundary values #2"), "boundary_values__2");
    }
}
