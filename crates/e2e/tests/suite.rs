use std::path::PathBuf;

use loginbdd_common::{DriverKind, Error, SuiteConfig};
use loginbdd_e2e::{FeatureSpec, RunnerConfig, ScenarioStatus, SuiteRunner};

fn specs_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/specs")
}

fn runner(output: &std::path::Path, tag: Option<&str>) -> SuiteRunner {
    let mut config = SuiteConfig::default();
    config.browser.driver = DriverKind::Simulated;
    config.policy.session_timeout_ms = Some(250);
    SuiteRunner::new(
        config,
        RunnerConfig {
            specs_dir: specs_dir(),
            output_dir: output.to_path_buf(),
            tag: tag.map(String::from),
            ..RunnerConfig::default()
        },
    )
    .unwrap()
}

/// Every bundled feature passes against the simulated application, except the
/// whitespace scenario, which waits on a trimming policy
#[tokio::test]
async fn bundled_features_pass_on_simulated_app() {
    let output = tempfile::tempdir().unwrap();
    let mut runner = runner(output.path(), None);
    let result = runner.run_all().await.unwrap();

    for scenario in &result.results {
        assert_ne!(
            scenario.status,
            ScenarioStatus::Failed,
            "{} failed: {:?}",
            scenario.name,
            scenario.error
        );
    }
    assert_eq!(result.total, 24);
    assert_eq!(result.skipped, 1);
    assert_eq!(result.passed, 23);

    let pending = result
        .results
        .iter()
        .find(|s| s.status == ScenarioStatus::Skipped)
        .unwrap();
    assert_eq!(pending.name, "Surrounding whitespace in credentials");

    let path = runner.write_results(&result).unwrap();
    assert!(path.ends_with("test-results.json"));
}

#[tokio::test]
async fn tag_filter_limits_the_run() {
    let output = tempfile::tempdir().unwrap();
    let mut runner = runner(output.path(), Some("@smoke"));
    let result = runner.run_all().await.unwrap();
    assert_eq!(result.total, 1);
    assert_eq!(result.passed, 1);
}

#[test]
fn bundled_features_validate() {
    let output = tempfile::tempdir().unwrap();
    let runner = runner(output.path(), None);
    let scenarios = runner.load().unwrap();
    runner.check(&scenarios).unwrap();
}

#[tokio::test]
async fn unknown_step_fails_the_build() {
    let specs = tempfile::tempdir().unwrap();
    std::fs::write(
        specs.path().join("broken.yaml"),
        "name: Broken\nscenarios:\n  - name: Typo\n    steps:\n      - Given I am on the logn page\n",
    )
    .unwrap();
    let feature = FeatureSpec::load_all(specs.path()).unwrap();
    assert_eq!(feature.len(), 1);

    let mut config = SuiteConfig::default();
    config.browser.driver = DriverKind::Simulated;
    let mut runner = SuiteRunner::new(
        config,
        RunnerConfig {
            specs_dir: specs.path().to_path_buf(),
            output_dir: specs.path().join("out"),
            ..RunnerConfig::default()
        },
    )
    .unwrap();
    let err = runner.run_all().await.unwrap_err();
    assert!(matches!(err, Error::NoMatchingStep(_)));
    assert!(!specs.path().join("out").exists());
}
