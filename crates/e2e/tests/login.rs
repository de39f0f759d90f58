use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use loginbdd_common::config::SelectorConfig;
use loginbdd_common::{Browser, CredentialRegistry, DriverKind, Error, Result, SuiteConfig};
use loginbdd_e2e::driver::{CallLog, DriverCall, NullDriver};
use loginbdd_e2e::steps::StepArgs;
use loginbdd_e2e::{
    default_registry, BrowserDriver, ConfiguredFactory, DriverFactory, ScenarioContext, StepRegistry,
};

fn simulated_context() -> ScenarioContext {
    simulated_context_with(SuiteConfig::default())
}

fn simulated_context_with(mut config: SuiteConfig) -> ScenarioContext {
    config.browser.driver = DriverKind::Simulated;
    let config = Arc::new(config);
    let credentials = Arc::new(CredentialRegistry::new());
    let factory = Arc::new(ConfiguredFactory::new(config.clone(), credentials.clone()));
    ScenarioContext::new(config, credentials, factory)
}

/// Hands out null drivers that all record into one log
struct LoggingFactory {
    log: CallLog,
    missing: Option<String>,
}

#[async_trait]
impl DriverFactory for LoggingFactory {
    async fn create(&self, _browser: Browser) -> Result<Box<dyn BrowserDriver>> {
        let driver = NullDriver::with_log(self.log.clone());
        Ok(match &self.missing {
            Some(selector) => Box::new(driver.missing_element(selector.clone())),
            None => Box::new(driver),
        })
    }
}

fn null_context(log: &CallLog, missing: Option<&str>) -> ScenarioContext {
    ScenarioContext::new(
        Arc::new(SuiteConfig::default()),
        Arc::new(CredentialRegistry::new()),
        Arc::new(LoggingFactory {
            log: log.clone(),
            missing: missing.map(String::from),
        }),
    )
}

/// Valid credentials reach an authenticated landing route
#[tokio::test]
async fn valid_credentials_log_in() {
    let mut ctx = simulated_context();
    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("valid_password");

    let page = ctx.page().await.unwrap();
    page.open().await.unwrap();
    page.enter_username(&username).await.unwrap();
    page.enter_password(&password).await.unwrap();
    page.click_login().await.unwrap();
    page.wait_for_settle().await.unwrap();

    assert!(page.is_logged_in().await);
    let url = page.current_url().await;
    assert!(
        url.contains("/home") || url.contains("/dashboard"),
        "unexpected landing url {}",
        url
    );
    ctx.teardown().await.unwrap();
}

/// An unknown user stays on the form with a message that echoes nothing
#[tokio::test]
async fn unknown_user_sees_generic_error() {
    let mut ctx = simulated_context();
    let username = ctx.resolve("unknown_user");
    let password = "any_password";

    let page = ctx.page().await.unwrap();
    page.open().await.unwrap();
    page.enter_username(&username).await.unwrap();
    page.enter_password(password).await.unwrap();
    page.click_login().await.unwrap();
    page.wait_for_settle().await.unwrap();

    assert!(!page.is_logged_in().await);
    assert!(page.is_on_login_page().await);
    let message = page.error_message_text().await;
    assert!(!message.is_empty());
    assert!(!message.contains(&username));
    assert!(!message.contains(password));
    ctx.teardown().await.unwrap();
}

/// Five wrong passwords lock the account, after which the right one fails too
#[tokio::test]
async fn repeated_failures_lock_the_account() {
    let registry = default_registry().unwrap();
    let mut ctx = simulated_context();

    for sentence in [
        "Given I am on the login page",
        r#"When I repeatedly attempt to log in with an existing username and invalid passwords "wrong1, wrong2, wrong3, wrong4, wrong5""#,
    ] {
        registry.dispatch(sentence, &mut ctx).await.unwrap();
    }
    assert_eq!(ctx.login_attempts, 5);

    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("valid_password");
    let page = ctx.page().await.unwrap();
    assert!(page.is_account_locked(&username).await);

    page.open().await.unwrap();
    page.perform_login(&username, &password).await.unwrap();
    assert!(!page.is_logged_in().await);
    assert!(page.is_account_locked(&username).await);
    ctx.teardown().await.unwrap();
}

/// A successful sign-in resets the streak, so the lockout step still
/// submits the full configured number of failures afterwards
#[tokio::test]
async fn lockout_after_successful_login() {
    let registry = default_registry().unwrap();
    let mut ctx = simulated_context();

    for sentence in [
        "Given I have successfully logged in",
        "When I navigate to the login page",
        "And I exceed the configured number of failed attempts",
        "Then the account should be locked or challenged according to policy",
    ] {
        registry.dispatch(sentence, &mut ctx).await.unwrap();
    }
    let max = ctx.config().policy.lockout.max_attempts;
    assert_eq!(ctx.failed_attempts, max);
    assert_eq!(ctx.login_attempts, max + 1);
    ctx.teardown().await.unwrap();
}

/// A thirty minute idle timeout expires the session without real waiting
#[tokio::test(start_paused = true)]
async fn idle_session_expires_and_back_stays_on_login() {
    let mut config = SuiteConfig::default();
    config.policy.session_timeout_ms = Some(30 * 60 * 1000);
    let mut ctx = simulated_context_with(config);
    let registry = default_registry().unwrap();

    for sentence in [
        "Given I have successfully logged in",
        "Then I should see a welcome message (e.g., \"Welcome, [Username]!\")",
        "When I remain inactive for the configured session timeout duration (e.g., 30 minutes)",
        "Then I should be automatically logged out and redirected to the login page",
        "And I should not be able to navigate back to the dashboard using the browser Back button",
    ] {
        registry.dispatch(sentence, &mut ctx).await.unwrap();
    }
    ctx.teardown().await.unwrap();
}

#[tokio::test]
async fn idle_step_pending_without_session_timeout() {
    let registry = default_registry().unwrap();
    let mut ctx = simulated_context();
    let err = registry
        .dispatch(
            "When I remain inactive for the configured session timeout duration (e.g., 30 minutes)",
            &mut ctx,
        )
        .await
        .unwrap_err();
    assert!(err.is_pending());
}

/// Only the "Correct Case" side keeps its case
#[tokio::test]
async fn cased_credentials_upper_case_the_other_side() {
    let log = CallLog::new();
    let mut ctx = null_context(&log, None);
    let registry = default_registry().unwrap();
    registry
        .dispatch(
            r#"When I enter the correct "Correct Case" and correct "Upper Case""#,
            &mut ctx,
        )
        .await
        .unwrap();

    let selectors = SelectorConfig::default();
    assert_eq!(log.filled(&selectors.username_input), vec![ctx.resolve("valid_user")]);
    assert_eq!(
        log.filled(&selectors.password_input),
        vec![ctx.resolve("valid_password").to_uppercase()]
    );
}

#[tokio::test]
async fn other_field_gets_the_valid_value() {
    let log = CallLog::new();
    let mut ctx = null_context(&log, None);
    let registry = default_registry().unwrap();

    let err = registry
        .dispatch("And I enter a valid input in the other field", &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidStepArgument { .. }));

    for sentence in [
        "When I enter a overlong_password in the password field",
        "And I enter a valid input in the other field",
    ] {
        registry.dispatch(sentence, &mut ctx).await.unwrap();
    }
    let selectors = SelectorConfig::default();
    assert_eq!(log.filled(&selectors.username_input), vec![ctx.resolve("valid_user")]);
}

/// Keyboard-only sign-in: Tab from the body reaches the button, Enter submits
#[tokio::test]
async fn tab_from_outside_reaches_login_button() {
    let registry = default_registry().unwrap();
    let mut ctx = simulated_context();
    for sentence in [
        "Given I am on the login page",
        "When I enter a valid username into the username field",
        "And I enter the corresponding valid password into the password field",
        "And I press the Tab key repeatedly, starting from outside the form",
        "Then the focus should move to the Login button",
        "When I press the Enter key",
        "Then I should be successfully logged in",
    ] {
        registry.dispatch(sentence, &mut ctx).await.unwrap();
    }
    assert_eq!(ctx.last_focused.as_deref(), Some("login"));
    ctx.teardown().await.unwrap();
}

/// Each listed password is one login action, in list order
#[tokio::test]
async fn repeated_attempts_submit_in_order() {
    let log = CallLog::new();
    let mut ctx = null_context(&log, None);
    let registry = default_registry().unwrap();

    registry
        .dispatch(
            r#"When I repeatedly attempt to log in with an existing username and invalid passwords "p1, p2, p3""#,
            &mut ctx,
        )
        .await
        .unwrap();

    let selectors = SelectorConfig::default();
    assert_eq!(log.filled(&selectors.password_input), vec!["p1", "p2", "p3"]);
    assert_eq!(log.count(|c| matches!(c, DriverCall::Click(_))), 3);

    // Every password is typed before the click that submits it
    let calls = log.calls();
    let order: Vec<&str> = calls
        .iter()
        .filter_map(|c| match c {
            DriverCall::Fill { selector, value } if *selector == selectors.password_input => {
                Some(value.as_str())
            }
            DriverCall::Click(_) => Some("click"),
            _ => None,
        })
        .collect();
    assert_eq!(order, vec!["p1", "click", "p2", "click", "p3", "click"]);
    ctx.teardown().await.unwrap();
}

/// A missing control fails the step, and teardown still closes exactly once
#[tokio::test]
async fn teardown_closes_once_after_element_not_found() {
    let log = CallLog::new();
    let selectors = SelectorConfig::default();
    let mut ctx = null_context(&log, Some(selectors.username_input.as_str()));
    let registry = default_registry().unwrap();

    registry.dispatch("Given I navigate to the login page", &mut ctx).await.unwrap();
    let err = registry
        .dispatch("When I enter a valid username into the username field", &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ElementNotFound { .. }));

    ctx.teardown().await.unwrap();
    ctx.teardown().await.unwrap();
    drop(ctx);

    assert_eq!(log.count(|c| *c == DriverCall::Close), 1);
    assert_eq!(log.count(|c| *c == DriverCall::Abort), 0);
}

/// A context dropped mid-scenario still releases its session
#[tokio::test]
async fn dropped_context_aborts_session() {
    let log = CallLog::new();
    let mut ctx = null_context(&log, None);
    ctx.page().await.unwrap().open().await.unwrap();
    drop(ctx);
    assert_eq!(log.count(|c| *c == DriverCall::Abort), 1);
}

fn noop(_ctx: &mut ScenarioContext, _args: StepArgs) -> BoxFuture<'_, Result<()>> {
    Box::pin(async { Ok(()) })
}

#[test]
fn duplicate_skeleton_is_rejected() {
    let mut registry = StepRegistry::new();
    registry
        .register(r#"I enter "{value}" into the username field"#, noop)
        .unwrap();
    let err = registry
        .register(r#"I enter "{other}" into the username field"#, noop)
        .unwrap_err();
    assert!(matches!(err, Error::DuplicatePattern { .. }));

    registry
        .register(r#"I enter "{value}" into the password field"#, noop)
        .unwrap();
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn unmatched_sentence_fails() {
    let registry = default_registry().unwrap();
    let mut ctx = simulated_context();
    let err = registry
        .dispatch("When I sing to the login page", &mut ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoMatchingStep(ref s) if s == "I sing to the login page"));
    assert!(!ctx.has_page());
}

#[tokio::test]
async fn tokens_resolve_the_same_every_time() {
    let ctx = simulated_context();
    let first = ctx.resolve("overlong_password");
    assert_eq!(first.len(), 300);
    assert_eq!(ctx.resolve("overlong_password"), first);
    assert_eq!(ctx.resolve("empty"), "");
    assert_eq!(ctx.resolve("'literal value'"), "literal value");
}
