//! Error message content and placement steps

use loginbdd_common::{ensure, Result};

use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "I should see a generic login error message" => generic_error,
        r#"I should see an error message stating "{message}""# => error_contains,
        r#"I should see the error message: "{message}""# => error_contains,
        "the error message should not reveal whether the username or password was incorrect" => not_specific,
        "no technical error details should be displayed to the user" => no_technical_details,
        "the error message should not contain stack traces" => no_stack_traces,
        "the error message should not expose internal system details" => no_technical_details,
        "the password value should not appear in any visible label or error message" => password_not_echoed,
        "it should be visually prominent" => error_prominent,
        "it should be located near the input fields or at a consistent location on the form" => error_prominent,
        "the username and password fields should be cleared or safely handled according to policy" => fields_safe,
    })
}

async fn generic_error(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    let text = page.error_message_text().await;
    ensure!(!text.is_empty(), "Error message should be displayed");
    ensure!(!page.error_is_overly_specific().await, "Error message should be generic: {}", text);
    ensure!(
        !page.error_contains_technical_details().await,
        "Error message reveals internal details: {}",
        text
    );
    Ok(())
}

async fn error_contains(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let expected = args.text("message")?;
    let actual = ctx.page().await?.error_message_text().await;
    ensure!(
        actual.contains(expected),
        "Expected error message: '{}', but found: '{}'",
        expected,
        actual
    );
    Ok(())
}

async fn not_specific(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let specific = ctx.page().await?.error_is_overly_specific().await;
    ensure!(!specific, "Error message should not reveal which field was incorrect");
    Ok(())
}

async fn no_technical_details(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let technical = ctx.page().await?.error_contains_technical_details().await;
    ensure!(!technical, "Technical details are visible to the user");
    Ok(())
}

async fn no_stack_traces(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let text = ctx.page().await?.error_message_text().await.to_lowercase();
    ensure!(
        !text.contains("stack") && !text.contains("trace"),
        "Error message should not contain stack traces"
    );
    Ok(())
}

async fn password_not_echoed(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let password = match ctx.last_password.clone() {
        Some(p) if !p.is_empty() => p,
        _ => return Ok(()),
    };
    let page = ctx.page().await?;
    let mut visible = vec![page.error_message_text().await];
    visible.extend(page.username_label().await);
    visible.extend(page.password_label().await);
    ensure!(
        visible.iter().all(|text| !text.contains(&password)),
        "Password appears in a visible label or error message"
    );
    Ok(())
}

async fn error_prominent(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let visible = ctx.page().await?.is_error_visible().await;
    ensure!(visible, "Error message should be displayed prominently");
    Ok(())
}

async fn fields_safe(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let usable = ctx.page().await?.controls_visible_and_enabled().await;
    ensure!(usable, "Fields should be in a safe, usable state");
    Ok(())
}
