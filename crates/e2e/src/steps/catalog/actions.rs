//! Navigation, credential entry and submission steps

use std::time::Duration;
use tracing::{debug, info};

use loginbdd_common::{ensure, Error, Field, Result};

use super::{attempt_login, data_token, enter, open_login_page, timed_submit};
use crate::context::ScenarioContext;
use crate::steps::{StepArgs, StepRegistry};

pub(super) fn register(registry: &mut StepRegistry) -> Result<()> {
    register_steps!(registry, {
        "I am on the login page" => on_login_page,
        "I navigate to the login page" => navigate,
        "I am using a screen reader on the login page" => with_screen_reader,
        r#"I open the login page in "{browser}""# => open_in_browser,

        "I enter a valid username into the username field" => enter_valid_username,
        "I enter the corresponding valid password into the password field" => enter_valid_password,
        "I enter an unknown username into the username field" => enter_unknown_username,
        "I enter an invalid password into the password field" => enter_invalid_password,
        "I enter a password into the password field" => enter_any_password,
        r#"I enter "{value}" into the username field"# => enter_username_token,
        r#"I enter "{value}" into the password field"# => enter_password_token,
        r#"I enter "{value}" in the username field"# => enter_username_data,
        r#"I enter "{value}" in the password field"# => enter_password_data,
        r#"I enter the correct "{username_case}" and correct "{password_case}""# => enter_cased_credentials,
        "I enter a valid input in the other field" => enter_other_field,
        "I enter a {value:text} in the username field" => enter_username_data,
        "I enter a {value:text} in the password field" => enter_password_data,

        "I click the Login button" => click_login,
        r#"I click the "{button}" button"# => click_named_button,
        "I click the {action:text} toggle" => click_password_toggle,
        "I press the Tab key from the username field" => tab_from_username,
        "I press the Tab key from the password field" => tab_from_password,
        "I press the Enter key" => press_enter,
        "I press the Tab key repeatedly, starting from outside the form" => tab_through_form,

        "I attempt to log in with invalid credentials" => attempt_invalid,
        "I attempt to log in with valid credentials" => attempt_valid,
        "I have successfully logged in" => logged_in_already,
        r#"I repeatedly attempt to log in with an existing username and invalid passwords "{attempts:list}""# => repeated_attempts,
        "I exceed the configured number of failed attempts" => exceed_attempts,
        "the error message is displayed" => error_displayed,
        "I remain inactive for the configured session timeout duration (e.g., 30 minutes)" => stay_idle,
    })
}

async fn on_login_page(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    open_login_page(ctx).await?;
    let on_page = ctx.page().await?.is_on_login_page().await;
    ensure!(on_page, "User is not on the login page");
    Ok(())
}

async fn navigate(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    open_login_page(ctx).await
}

async fn with_screen_reader(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    ctx.screen_reader = true;
    open_login_page(ctx).await
}

async fn open_in_browser(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let browser = args.text("browser")?;
    ctx.select_browser(browser).await?;
    open_login_page(ctx).await
}

async fn enter_token(ctx: &mut ScenarioContext, field: Field, token: &str) -> Result<()> {
    let value = ctx.resolve(token);
    debug!("Entering token '{}' into the {} field", token, field);
    enter(ctx, field, value).await
}

async fn enter_valid_username(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Username, "valid_user").await
}

async fn enter_valid_password(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Password, "valid_password").await
}

async fn enter_unknown_username(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Username, "unknown_user").await
}

async fn enter_invalid_password(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Password, "wrong_password").await
}

async fn enter_any_password(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Password, "any_password").await
}

async fn enter_username_token(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Username, args.text("value")?).await
}

async fn enter_password_token(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    enter_token(ctx, Field::Password, args.text("value")?).await
}

async fn enter_username_data(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let token = data_token(args.text("value")?);
    enter_token(ctx, Field::Username, &token).await
}

async fn enter_password_data(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let token = data_token(args.text("value")?);
    enter_token(ctx, Field::Password, &token).await
}

async fn click_login(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    timed_submit(ctx, false).await
}

async fn click_named_button(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let button = args.text("button")?;
    let name = button.to_ascii_lowercase();
    if ["login", "log in", "sign in"].iter().any(|n| name.contains(n)) {
        timed_submit(ctx, false).await
    } else {
        Err(Error::InvalidStepArgument {
            name: "button".into(),
            reason: format!("'{}' is not a control of the login form", button),
        })
    }
}

/// Valid credentials, upper-cased unless the case label reads "Correct Case"
async fn enter_cased_credentials(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let cased = |label: &str, value: String| {
        if label.contains("Correct Case") {
            value
        } else {
            value.to_uppercase()
        }
    };
    let username = cased(args.text("username_case")?, ctx.resolve("valid_user"));
    let password = cased(args.text("password_case")?, ctx.resolve("valid_password"));
    enter(ctx, Field::Username, username).await?;
    enter(ctx, Field::Password, password).await
}

/// Fill whichever field the previous step left alone with its valid value
async fn enter_other_field(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let (field, token) = match ctx.last_field {
        Some(Field::Username) => (Field::Password, "valid_password"),
        Some(Field::Password) => (Field::Username, "valid_user"),
        None => {
            return Err(Error::InvalidStepArgument {
                name: "field".into(),
                reason: "no field has been filled yet, so there is no other field".into(),
            })
        }
    };
    enter_token(ctx, field, token).await
}

async fn click_password_toggle(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    debug!("Clicking the {} toggle", args.text("action")?);
    ctx.page().await?.click_password_toggle().await
}

async fn tab_from(ctx: &mut ScenarioContext, field: Field) -> Result<()> {
    let page = ctx.page().await?;
    match field {
        Field::Username => page.focus_username().await?,
        Field::Password => page.focus_password().await?,
    }
    page.press_tab().await?;
    let focused = page.focused_element_label().await;
    debug!("Tab from {} focused {:?}", field, focused);
    ctx.last_focused = focused;
    Ok(())
}

async fn tab_from_username(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    tab_from(ctx, Field::Username).await
}

async fn tab_from_password(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    tab_from(ctx, Field::Password).await
}

/// Upper bound on Tab presses before the submit control must have focus
const MAX_TAB_PRESSES: usize = 20;

/// Tab from the document body until the submit control holds focus
async fn tab_through_form(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let page = ctx.page().await?;
    page.focus_body().await?;
    let mut trail = Vec::new();
    for _ in 0..MAX_TAB_PRESSES {
        page.press_tab().await?;
        let Some(focused) = page.focused_element().await else {
            continue;
        };
        let label = focused.label();
        trail.push(label.clone());
        let submit = focused.input_type == "submit"
            || (focused.tag == "button" && label.to_lowercase().contains("login"));
        if submit {
            debug!("Keyboard focus order: {}", trail.join(" -> "));
            ctx.last_focused = Some(label);
            return Ok(());
        }
    }
    Err(Error::AssertionFailed(format!(
        "Login button never received focus after {} Tab presses (visited: {})",
        MAX_TAB_PRESSES,
        trail.join(", ")
    )))
}

async fn press_enter(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    timed_submit(ctx, true).await
}

async fn attempt_invalid(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("wrong_password");
    attempt_login(ctx, username, password).await
}

async fn attempt_valid(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("valid_password");
    attempt_login(ctx, username, password).await
}

async fn logged_in_already(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    open_login_page(ctx).await?;
    attempt_valid(ctx, StepArgs::default()).await?;
    let logged_in = ctx.page().await?.is_logged_in().await;
    ensure!(logged_in, "Login with the valid credentials did not succeed");
    Ok(())
}

/// One full attempt per password, in the order given
async fn repeated_attempts(ctx: &mut ScenarioContext, args: StepArgs) -> Result<()> {
    let username = ctx.resolve("valid_user");
    let attempts = args.list("attempts")?.to_vec();
    info!("Attempting {} logins with invalid passwords", attempts.len());
    for token in &attempts {
        open_login_page(ctx).await?;
        let password = ctx.resolve(token);
        attempt_login(ctx, username.clone(), password).await?;
    }
    Ok(())
}

/// Fail with the wrong password until the configured maximum is reached
///
/// Only the current failure streak counts toward the maximum: a successful
/// sign-in earlier in the scenario resets it, as it does on the server.
async fn exceed_attempts(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let max = ctx.config().policy.lockout.max_attempts;
    let remaining = max.saturating_sub(ctx.failed_attempts);
    debug!("{} failures so far, {} more to reach {}", ctx.failed_attempts, remaining, max);
    let username = ctx.resolve("valid_user");
    let password = ctx.resolve("wrong_password");
    for _ in 0..remaining {
        open_login_page(ctx).await?;
        attempt_login(ctx, username.clone(), password.clone()).await?;
    }
    Ok(())
}

async fn error_displayed(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    ctx.page().await?.wait_for_error().await
}

/// Margin past the idle timeout before the page is reloaded
const IDLE_MARGIN: Duration = Duration::from_millis(50);

/// Sit idle past the configured session timeout, then reload
async fn stay_idle(ctx: &mut ScenarioContext, _args: StepArgs) -> Result<()> {
    let Some(timeout) = ctx.config().policy.session_timeout() else {
        return Err(Error::PolicyUndefined("policy.session_timeout_ms is not configured".into()));
    };
    info!("Idling {} ms for the session to expire", timeout.as_millis());
    tokio::time::sleep(timeout + IDLE_MARGIN).await;
    ctx.page().await?.reload().await
}
