//! The login step catalog
//!
//! Every sentence the login feature files use, grouped by concern. Handlers
//! are plain `async fn`s over the [`ScenarioContext`]; shared helpers below
//! keep the bookkeeping (typed values, attempt counts, timings) in one place.

use std::time::Instant;
use tracing::debug;

use loginbdd_common::{Field, Result};

use crate::context::ScenarioContext;
use crate::steps::StepRegistry;

/// Register `pattern => handler` pairs, propagating the first registration error
macro_rules! register_steps {
    ($registry:expr, { $($pattern:expr => $handler:path),* $(,)? }) => {{
        $( $registry.register($pattern, |ctx, args| Box::pin($handler(ctx, args)))?; )*
        Ok(())
    }};
}

mod accessibility;
mod actions;
mod messages;
mod outcome;
mod policy;
mod rendering;

/// Registry holding the full catalog
pub fn default_registry() -> Result<StepRegistry> {
    let mut registry = StepRegistry::new();
    actions::register(&mut registry)?;
    outcome::register(&mut registry)?;
    messages::register(&mut registry)?;
    accessibility::register(&mut registry)?;
    rendering::register(&mut registry)?;
    policy::register(&mut registry)?;
    debug!("Step catalog holds {} patterns", registry.len());
    Ok(registry)
}

/// Map a descriptive data name ("valid username", "SQL Injection") to a
/// registry token; anything else is resolved as written
pub(crate) fn data_token(kind: &str) -> String {
    let key = kind.trim().to_ascii_lowercase();
    let token = match key.as_str() {
        "<empty>" | "empty value" | "blank value" => "empty",
        "valid username" | "valid user" => "valid_user",
        "valid password" => "valid_password",
        "unknown username" | "invalid username" => "unknown_user",
        "invalid password" | "wrong password" => "wrong_password",
        "sql injection" => "sql_injection_text",
        "cross-site scripting (xss)" | "script tag" => "script_tag_text",
        _ => return kind.trim().to_string(),
    };
    token.to_string()
}

/// Navigate to the login page, recording how long it took
pub(crate) async fn open_login_page(ctx: &mut ScenarioContext) -> Result<()> {
    let start = Instant::now();
    ctx.page().await?.open().await?;
    ctx.last_navigation_time = Some(start.elapsed());
    Ok(())
}

/// Type `value` into `field` and remember it
pub(crate) async fn enter(ctx: &mut ScenarioContext, field: Field, value: String) -> Result<()> {
    let page = ctx.page().await?;
    match field {
        Field::Username => page.enter_username(&value).await?,
        Field::Password => page.enter_password(&value).await?,
    }
    match field {
        Field::Username => ctx.last_username = Some(value),
        Field::Password => ctx.last_password = Some(value),
    }
    ctx.last_field = Some(field);
    Ok(())
}

/// Count a settled submission, resetting the failure streak on sign-in
async fn record_attempt(ctx: &mut ScenarioContext) -> Result<()> {
    ctx.login_attempts += 1;
    if ctx.page().await?.is_logged_in().await {
        ctx.failed_attempts = 0;
    } else {
        ctx.failed_attempts += 1;
    }
    debug!(
        "{} submissions, {} consecutive failures",
        ctx.login_attempts, ctx.failed_attempts
    );
    Ok(())
}

/// One full attempt: fill both fields, submit, wait for the page to settle
pub(crate) async fn attempt_login(ctx: &mut ScenarioContext, username: String, password: String) -> Result<()> {
    let elapsed = ctx.page().await?.perform_login(&username, &password).await?;
    ctx.last_response_time = Some(elapsed);
    ctx.last_username = Some(username);
    ctx.last_password = Some(password);
    record_attempt(ctx).await
}

/// Submit through `submit`, timing until the page settles
pub(crate) async fn timed_submit(ctx: &mut ScenarioContext, press_enter: bool) -> Result<()> {
    let start = Instant::now();
    let page = ctx.page().await?;
    if press_enter {
        page.press_enter().await?;
    } else {
        page.click_login().await?;
    }
    page.wait_for_settle().await?;
    ctx.last_response_time = Some(start.elapsed());
    record_attempt(ctx).await
}

/// Whether the given values are the configured valid pair
pub(crate) fn is_valid_pair(ctx: &ScenarioContext, username: &str, password: &str) -> bool {
    username == ctx.resolve("valid_user") && password == ctx.resolve("valid_password")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_builds_without_ambiguity() {
        let registry = default_registry().unwrap();
        assert!(registry.len() > 60);
        let mut seen = std::collections::HashSet::new();
        for p in registry.patterns() {
            assert!(seen.insert(p), "{} registered twice", p);
        }
    }

    #[test]
    fn test_data_token() {
        assert_eq!(data_token("valid username"), "valid_user");
        assert_eq!(data_token("SQL Injection"), "sql_injection_text");
        assert_eq!(data_token("<empty>"), "empty");
        assert_eq!(data_token(" overlong_password "), "overlong_password");
    }

    #[test]
    fn test_every_catalog_sentence_resolves_once() {
        let registry = default_registry().unwrap();
        let sentences = [
            "Given I am on the login page",
            "When I enter \"valid_user\" into the username field",
            "And I enter \"valid_password\" into the password field",
            "And I enter \"SQL Injection\" in the username field",
            "And I enter a valid password in the password field",
            "And I click the Login button",
            "And I click the \"Login\" button",
            "When I press the Tab key from the username field",
            "When I press the Enter key",
            "Given I repeatedly attempt to log in with an existing username and invalid passwords \"a, b, c\"",
            "Then I should be redirected to the dashboard or home page",
            "Then I should be redirected to the authenticated home page",
            "Then the system response time for a successful login should not exceed 3 seconds",
            "Then the page should be fully rendered within 2 seconds (under a normal load)",
            "Then I should see an error message stating \"Login failed\"",
            "Then I should see the error message: \"Login failed\"",
            "Then the application should reject the input and neutralize the script",
            "Then the behaviour should follow the configured length rules and show \"rejected_with_clear_message\"",
            "Then the login result should match the outcome for the trimmed values \"valid_user\" and \"valid_password\"",
            "When I click the show password toggle",
            "Then the password field input type should change from \"password\" to \"text\" (text is visible)",
            "When I enter the correct \"Correct Case\" and correct \"Wrong Case\"",
            "When I press the Tab key repeatedly, starting from outside the form",
            "And I enter a valid input in the other field",
            "Then Alternative text should be available for the logo/image elements",
            "Then the login form elements should be stacked vertically and readable without horizontal scrolling",
            "Then I should see a welcome message (e.g., \"Welcome, [Username]!\")",
            "When I remain inactive for the configured session timeout duration (e.g., 30 minutes)",
            "Then I should be automatically logged out and redirected to the login page",
            "And I should not be able to navigate back to the dashboard using the browser Back button",
        ];
        registry.validate(sentences).unwrap();
    }
}
