//! Authentication outcome, session, availability, latency and lockout steps

use std::time::Duration;

use loginbdd_common::{ensure, Error, Result};

use super::{attempt_login, open_login_page};
use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "I should be successfully logged in" => logged_in,
        "I should be redirected to the authenticated home page" => on_landing_page,
        "I should be redirected to the {page} or home page" => on_named_landing_page,
        "I should remain on the login page" => remain_on_login_page,
        "the login should fail safely" => fail_safely,
        r#"I should see a welcome message (e.g., "Welcome, [Username]!")"# => welcome_shown,
        "I should be automatically logged out and redirected to the login page" => logged_out_to_login,
        "I should not be able to navigate back to the dashboard using the browser Back button" => back_stays_out,

        "the login page should load successfully" => page_loaded,
        "it should not display generic server error pages" => no_server_error_page,
        "the system should not return any HTTP 5xx errors" => no_server_error_page,

        "I should receive a response (success or failure) within the agreed performance threshold" => within_threshold,
        "the system response time for a successful login should not exceed {seconds:int} seconds" => login_within_seconds,
        "the page should be fully rendered within {seconds:int} seconds (under a normal load)" => rendered_within_seconds,

        "the account should be locked or challenged according to policy" => account_locked,
        "a clear message about the lockout or challenge should be displayed" => lockout_message,
        "subsequent login attempts with the correct password should be handled according to the lockout policy" => still_locked_out,
    })
}

async fn logged_in(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let logged_in = ctx.page().await?.is_logged_in().await;
    ensure!(logged_in, "User should be logged in but is not");
    Ok(())
}

async fn landing_url(ctx: &mut ScenarioContext, extra: Option<String>) -> Result<()> {
    let mut paths = ctx.config().app.landing_paths.clone();
    paths.extend(extra);
    let url = ctx.page().await?.current_url().await;
    ensure!(
        paths.iter().any(|p| url.contains(p.as_str())),
        "Unexpected post-login URL: {} (expected one of {})",
        url,
        paths.join(", ")
    );
    Ok(())
}

async fn on_landing_page(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    landing_url(ctx, None).await
}

async fn on_named_landing_page(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let page = format!("/{}", args.text("page")?.to_ascii_lowercase());
    landing_url(ctx, Some(page)).await
}

async fn remain_on_login_page(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let on_page = ctx.page().await?.is_on_login_page().await;
    ensure!(on_page, "Should remain on login page");
    Ok(())
}

async fn fail_safely(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    ensure!(!page.is_logged_in().await, "Login should fail");
    ensure!(page.is_on_login_page().await, "Should remain on login page");
    ensure!(!page.has_generic_server_error().await, "Got a server error page");
    Ok(())
}

async fn welcome_shown(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let text = ctx.page().await?.welcome_text().await;
    ensure!(
        text.to_lowercase().contains("welcome"),
        "Welcome message not found or incorrect: '{}'",
        text
    );
    Ok(())
}

async fn logged_out_to_login(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    ensure!(!page.is_logged_in().await, "Session is still active after the idle timeout");
    let url = page.current_url().await;
    ensure!(page.is_on_login_page().await, "Did not redirect to login page. Current URL: {}", url);
    Ok(())
}

async fn back_stays_out(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    page.go_back().await?;
    let url = page.current_url().await;
    ensure!(
        page.is_on_login_page().await && !page.is_logged_in().await,
        "Back button allowed access to non-login page: {}",
        url
    );
    Ok(())
}

async fn page_loaded(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    ensure!(page.is_on_login_page().await, "Login page did not load successfully");
    ensure!(
        !page.has_generic_server_error().await,
        "Login page shows a server error"
    );
    Ok(())
}

async fn no_server_error_page(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let server_error = ctx.page().await?.has_generic_server_error().await;
    ensure!(!server_error, "Generic server error page is displayed");
    Ok(())
}

fn measured(ctx: &ScenarioContext) -> Result<Duration> {
    ctx.last_response_time
        .ok_or_else(|| Error::assertion("No login response time was measured in this scenario"))
}

fn seconds(args: &StepArgs) -> Result<Duration> {
    let secs = args.int("seconds")?;
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidStepArgument {
            name: "seconds".into(),
            reason: format!("{} is negative", secs),
        })
}

async fn within_threshold(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let threshold = Duration::from_millis(ctx.config().policy.response_threshold_ms);
    let elapsed = measured(ctx)?;
    ensure!(
        elapsed <= threshold,
        "Login response time too slow: {} ms (threshold {} ms)",
        elapsed.as_millis(),
        threshold.as_millis()
    );
    Ok(())
}

async fn login_within_seconds(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let limit = seconds(&args)?;
    let elapsed = measured(ctx)?;
    ensure!(
        ctx.page().await?.is_logged_in().await,
        "Response time applies to a successful login, but the user is not logged in"
    );
    ensure!(
        elapsed <= limit,
        "Successful login took {} ms, limit {} s",
        elapsed.as_millis(),
        limit.as_secs()
    );
    Ok(())
}

async fn rendered_within_seconds(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let limit = seconds(&args)?;
    let elapsed = ctx
        .last_navigation_time
        .ok_or_else(|| Error::assertion("The login page was not opened in this scenario"))?;
    ensure!(
        elapsed <= limit,
        "Login page took {} ms to render, limit {} s",
        elapsed.as_millis(),
        limit.as_secs()
    );
    Ok(())
}

async fn account_locked(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let username = ctx.resolve("valid_user");
    let locked = ctx.page().await?.is_account_locked(&username).await;
    ensure!(locked, "Account is not locked or challenged");
    Ok(())
}

async fn lockout_message(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let text = ctx.page().await?.error_message_text().await;
    ensure!(!text.is_empty(), "No lockout/challenge message is displayed");
    let lower = text.to_lowercase();
    ensure!(
        crate::page::LOCKOUT_KEYWORDS.iter().any(|k| lower.contains(k)),
        "Message does not mention a lockout: {}",
        text
    );
    Ok(())
}

async fn still_locked_out(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("valid_password");
    open_login_page(ctx).await?;
    attempt_login(ctx, username, password).await?;
    let logged_in = ctx.page().await?.is_logged_in().await;
    ensure!(!logged_in, "Locked account should not be able to log in with the correct password");
    Ok(())
}
