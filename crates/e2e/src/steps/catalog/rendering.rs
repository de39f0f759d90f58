//! Control visibility and layout steps

use tracing::debug;

use loginbdd_common::{ensure, Error, Field, Result, Viewport};

use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "the username field should be visible and enabled" => username_usable,
        "the password field should be visible and enabled" => password_usable,
        "the Login button should be visible and enabled" => button_usable,
        "the layout should not be broken" => layout_intact,
        "the page should continue to render correctly" => layout_intact,
        "the login form elements should be stacked vertically and readable without horizontal scrolling" => stacked_on_mobile,
    })
}

async fn field_usable(ctx: &mut ScenarioContext, field: Field) -> Result<()> {
    let usable = ctx.page().await?.is_field_usable(field).await;
    ensure!(usable, "{} field should be visible and enabled", field);
    Ok(())
}

async fn username_usable(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    field_usable(ctx, Field::Username).await
}

async fn password_usable(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    field_usable(ctx, Field::Password).await
}

async fn button_usable(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let usable = ctx.page().await?.is_login_button_usable().await;
    ensure!(usable, "Login button should be visible and enabled");
    Ok(())
}

async fn layout_intact(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let broken = ctx.page().await?.has_layout_issues().await;
    ensure!(!broken, "Layout appears broken");
    Ok(())
}

/// Small-phone viewport the stacked layout is checked at
const MOBILE_VIEWPORT: Viewport = Viewport { width: 360, height: 640 };

/// At phone width the controls form one column inside the viewport
async fn stacked_on_mobile(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    page.set_viewport(MOBILE_VIEWPORT).await?;
    let boxes = page.control_boxes().await;
    page.restore_viewport().await?;

    let boxes = boxes.ok_or_else(|| {
        Error::assertion("Login controls are not all rendered at 360 px width")
    })?;
    debug!("Control boxes at {} px: {:?}", MOBILE_VIEWPORT.width, boxes);
    let width = f64::from(MOBILE_VIEWPORT.width);
    for pair in boxes.windows(2) {
        ensure!(
            pair[1].y >= pair[0].bottom(),
            "Login controls overlap or sit side by side at {} px width",
            MOBILE_VIEWPORT.width
        );
    }
    for b in &boxes {
        ensure!(
            b.x >= 0.0 && b.right() <= width,
            "A login control extends past the {} px viewport (x {}, right {})",
            MOBILE_VIEWPORT.width,
            b.x,
            b.right()
        );
    }
    Ok(())
}
