//! Whitespace trimming, length rule and unsafe-character steps
//!
//! Trimming and length expectations come from `policy` in the suite
//! configuration. When the application contract leaves them unset these
//! steps report [`Error::PolicyUndefined`] and the scenario is pending.

use tracing::debug;

use loginbdd_common::config::LengthRule;
use loginbdd_common::{ensure, CredentialTrimming, Error, Result};

use super::is_valid_pair;
use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "the system should treat the credentials as trimmed" => treated_as_trimmed,
        r#"the login result should match the outcome for the trimmed values "{username}" and "{password}""# => matches_trimmed_outcome,
        r#"the behaviour should follow the configured length rules and show "{expected}""# => follows_length_rules,
        r#"the system should handle the characters safely and respond with "{expected}""# => handles_characters,
        "the application should {result} the input and {action} the script" => script_neutralised,
    })
}

fn trimming(ctx: &ScenarioContext) -> Result<CredentialTrimming> {
    match ctx.config().policy.credential_trimming {
        CredentialTrimming::Unspecified => Err(Error::PolicyUndefined(
            "policy.credential_trimming must be 'trimmed' or 'preserved'".into(),
        )),
        other => Ok(other),
    }
}

fn entered(ctx: &ScenarioContext) -> Result<(String, String)> {
    match (&ctx.last_username, &ctx.last_password) {
        (Some(u), Some(p)) => Ok((u.clone(), p.clone())),
        _ => Err(Error::assertion("Both credentials must be entered before checking the outcome")),
    }
}

async fn treated_as_trimmed(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    if trimming(ctx)? == CredentialTrimming::Preserved {
        return Err(Error::assertion(
            "policy.credential_trimming is 'preserved', credentials are not trimmed",
        ));
    }
    let (username, password) = entered(ctx)?;
    let expected = is_valid_pair(ctx, username.trim(), password.trim());
    let logged_in = ctx.page().await?.is_logged_in().await;
    ensure!(
        logged_in == expected,
        "Trimmed credentials should {}log in",
        if expected { "" } else { "not " }
    );
    Ok(())
}

async fn matches_trimmed_outcome(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let policy = trimming(ctx)?;
    let want_user = ctx.resolve(args.text("username")?);
    let want_pass = ctx.resolve(args.text("password")?);
    let (username, password) = entered(ctx)?;

    let expected = match policy {
        CredentialTrimming::Trimmed => {
            ensure!(
                username.trim() == want_user && password.trim() == want_pass,
                "Entered values do not trim to the expected credentials"
            );
            is_valid_pair(ctx, &want_user, &want_pass)
        }
        // Surrounding whitespace is significant, so the raw values decide
        _ => is_valid_pair(ctx, &username, &password),
    };
    debug!("Expecting login {} under {:?} trimming", if expected { "success" } else { "failure" }, policy);
    let logged_in = ctx.page().await?.is_logged_in().await;
    ensure!(
        logged_in == expected,
        "Login outcome {} does not match expected {}",
        logged_in,
        expected
    );
    Ok(())
}

fn within(rule: Option<LengthRule>, value: &str) -> bool {
    rule.map_or(true, |r| r.allows(value.chars().count()))
}

async fn follows_length_rules(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let policy = &ctx.config().policy;
    let (user_rule, pass_rule) = (policy.username_length, policy.password_length);
    if user_rule.is_none() && pass_rule.is_none() {
        return Err(Error::PolicyUndefined(
            "policy.username_length / policy.password_length are not configured".into(),
        ));
    }
    let expected = args.text("expected")?.to_lowercase();
    let (username, password) = entered(ctx)?;
    let allowed = within(user_rule, &username) && within(pass_rule, &password);
    if expected.contains("reject") {
        ensure!(
            !allowed,
            "Entered values satisfy the configured length rules, yet '{}' was expected",
            expected
        );
    }

    let page = ctx.page().await?;
    ensure!(!page.has_generic_server_error().await, "Length violation produced a server error");
    if !allowed {
        ensure!(!page.is_logged_in().await, "Out-of-range credentials should not log in");
        ensure!(
            !page.error_message_text().await.is_empty(),
            "Should display clear error message for length violation"
        );
    }
    Ok(())
}

async fn handles_characters(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let expected = args.text("expected")?.to_lowercase();
    let page = ctx.page().await?;
    ensure!(!page.has_generic_server_error().await, "Special characters produced a server error");
    if expected.contains("reject") {
        ensure!(!page.is_logged_in().await, "Special characters should be rejected");
        ensure!(!page.has_layout_issues().await, "UI should not break with special characters");
    } else {
        let ok = page.is_logged_in().await || !page.has_layout_issues().await;
        ensure!(ok, "UI should not break with special characters");
    }
    Ok(())
}

async fn script_neutralised(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    debug!(
        "Expecting the application to {} the input and {} the script",
        args.text("result")?,
        args.text("action")?
    );
    let page = ctx.page().await?;
    ensure!(!page.is_logged_in().await, "Script payload should not log in");
    ensure!(
        page.controls_visible_and_enabled().await,
        "Page should remain functional after a script payload"
    );
    Ok(())
}
