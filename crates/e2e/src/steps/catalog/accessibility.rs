//! Masking, focus order, labels, accessible-name and image alt-text steps

use loginbdd_common::{ensure, Field, Result};

use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "the password should be masked" => password_masked,
        r#"the password field input type should change from "{from_type}" to "{to_type}" (text is {visibility})"# => password_type_changed,
        "the focus should move to the password field" => focus_on_password,
        "the focus should move to the Login button" => focus_on_login_button,
        "the username field should have a clear and visible label" => username_label,
        "the password field should have a clear and visible label" => password_label,
        "any placeholder text should not replace the need for visible labels" => labels_not_placeholders,
        "the username field should be announced with an appropriate accessible name" => username_accessible,
        "the password field should be announced with an appropriate accessible name" => password_accessible,
        "the Login button should be announced as an actionable control" => login_button_accessible,
        "Alternative text should be available for the logo/image elements" => logo_alt_text,
    })
}

async fn password_masked(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let masked = ctx.page().await?.is_password_masked().await;
    ensure!(masked, "Password field should be masked (type='password')");
    Ok(())
}

async fn password_type_changed(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let from = args.text("from_type")?;
    let to = args.text("to_type")?;
    let actual = ctx.page().await?.password_input_type().await.unwrap_or_default();
    ensure!(
        actual == to,
        "Password field type did not change from '{}' to '{}' (text should be {}), but is '{}'",
        from,
        to,
        args.text("visibility")?,
        actual
    );
    Ok(())
}

async fn focus_on_password(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let focused = ctx.page().await?.focused_element_label().await.unwrap_or_default();
    ensure!(
        focused.to_lowercase().contains("password"),
        "Expected focus on password field, got '{}'",
        focused
    );
    Ok(())
}

async fn focus_on_login_button(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let focused = ctx.page().await?.focused_element().await.unwrap_or_default();
    let label = focused.label().to_lowercase();
    ensure!(
        focused.tag == "button"
            || focused.input_type == "submit"
            || ["submit", "button", "login"].iter().any(|k| label.contains(k)),
        "Expected focus on Login button, got '{}'",
        label
    );
    Ok(())
}

async fn has_label(ctx: &mut ScenarioContext, field: Field) -> Result<()> {
    let label = ctx.page().await?.label(field).await;
    ensure!(label.is_some(), "{} field should have a visible label", field);
    Ok(())
}

async fn username_label(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    has_label(ctx, Field::Username).await
}

async fn password_label(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    has_label(ctx, Field::Password).await
}

async fn labels_not_placeholders(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    let both = page.username_label().await.is_some() && page.password_label().await.is_some();
    ensure!(both, "Fields should have visible labels, not just placeholders");
    Ok(())
}

async fn accessible(ctx: &mut ScenarioContext, field: Field) -> Result<()> {
    let named = ctx.page().await?.has_accessible_name(field).await;
    ensure!(named, "{} field should have an accessible name", field);
    Ok(())
}

async fn username_accessible(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    accessible(ctx, Field::Username).await
}

async fn password_accessible(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    accessible(ctx, Field::Password).await
}

async fn login_button_accessible(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let ok = ctx.page().await?.is_login_button_accessible().await;
    ensure!(ok, "Login button should have an accessible name");
    Ok(())
}

async fn logo_alt_text(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let alt = ctx.page().await?.logo_alt_text().await;
    ensure!(alt.is_some(), "Logo image is missing alt text");
    Ok(())
}
