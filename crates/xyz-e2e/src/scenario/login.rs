//! Login through the homepage modal, then check the account page
//!
//! Steps: homepage, open the login modal, email, next, password, sign in,
//! confirm the logged-in state, open the account page, and find the
//! username and email on it. A checkpoint screenshot follows every step
//! (`test_login_step{N}_{label}.png`).

use super::{Checkpoints, body_text, ensure};
use crate::automation::{BrowserAutomation, fill_form};
use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use crate::response::dom;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

pub const LOGIN_BUTTON: &str = "text=Sign Up / Log In";
pub const LOGIN_DIALOG: &str = r#"[role="dialog"]"#;
pub const EMAIL_INPUT: &str = r#"input[type="email"], input[placeholder*="email" i], input"#;
pub const PASSWORD_INPUT: &str = r#"input[type="password"]"#;

/// Tried in order before falling back to a scripted click
pub const SIGN_IN_BUTTONS: [&str; 3] = [
    r#"button[type="submit"]"#,
    "button.ant-btn-primary",
    r#"button[class*="primary" i]"#,
];

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);
const STATE_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub account_url: String,
    pub username: String,
    pub email: String,
    pub screenshots: Vec<PathBuf>,
}

pub async fn run<B>(browser: &B, config: &SuiteConfig) -> Result<LoginOutcome>
where
    B: BrowserAutomation + ?Sized,
{
    let credentials = &config.credentials;
    let mut shots = Checkpoints::new(browser, &config.screenshot_dir, "test_login");

    tracing::info!("Step 1: homepage");
    browser.navigate(&config.base_url).await?;
    browser.wait_for_navigation(None).await?;
    let url = browser.get_url().await?;
    ensure(url.contains(&config.base_url), || {
        format!("Expected {}, got {}", config.base_url, url)
    })?;
    shots.capture("step1_homepage").await;

    tracing::info!("Step 2: open login modal");
    browser.click(LOGIN_BUTTON, Some(STEP_TIMEOUT)).await?;
    shots.capture("step2_after_click").await;

    tracing::info!("Step 3: wait for modal");
    browser
        .wait_for_selector(LOGIN_DIALOG, Some(STEP_TIMEOUT), true)
        .await?;
    shots.capture("step3_modal_appeared").await;

    tracing::info!("Step 4: email");
    browser
        .wait_for_selector(EMAIL_INPUT, Some(STEP_TIMEOUT), true)
        .await?;
    fill_form(browser, &[(EMAIL_INPUT, credentials.email.as_str())]).await?;
    let entered = input_value(browser, EMAIL_INPUT).await?;
    ensure(entered.as_deref() == Some(credentials.email.as_str()), || {
        format!("Email input holds {:?}", entered)
    })?;
    shots.capture("step4_email_entered").await;

    tracing::info!("Step 5: next");
    let clicked = browser
        .evaluate_script(dom::CLICK_EMAIL_NEXT_SCRIPT)
        .await?;
    if clicked.as_bool() != Some(true) {
        tracing::warn!("No next button beside the email input, pressing Enter");
        browser.press(EMAIL_INPUT, "Enter", None).await?;
    }
    shots.capture("step5_after_next").await;

    tracing::info!("Step 6: password");
    browser
        .wait_for_selector(PASSWORD_INPUT, Some(STEP_TIMEOUT), true)
        .await?;
    browser.fill(PASSWORD_INPUT, &credentials.password).await?;
    let entered = input_value(browser, PASSWORD_INPUT).await?;
    ensure(entered.is_some_and(|v| !v.is_empty()), || {
        "Password input is empty".to_string()
    })?;
    shots.capture("step6_password_entered").await;

    tracing::info!("Step 7: sign in");
    sign_in(browser).await?;
    shots.capture("step7_after_login").await;

    tracing::info!("Step 8: verify logged-in state");
    wait_logged_in(browser, credentials.username(), config.navigation_timeout).await?;
    shots.capture("step8_login_verified").await;

    tracing::info!("Step 9: account page");
    let account_url = config.account_url();
    browser.navigate(&account_url).await?;
    browser.wait_for_navigation(None).await?;
    let url = browser.get_url().await?;
    ensure(url.contains(&account_url), || {
        format!("Expected {}, got {}", account_url, url)
    })?;
    shots.capture("step9_account_page").await;

    tracing::info!("Step 10: verify account details");
    browser.evaluate_script("window.scrollTo(0, 0)").await?;
    let text = body_text(browser).await?;
    ensure(text.contains(credentials.username()), || {
        format!("Username {} not on the account page", credentials.username())
    })?;
    ensure(text.contains(&credentials.email), || {
        format!("Email {} not on the account page", credentials.email)
    })?;
    shots.capture("step10_account_info_verified").await;

    Ok(LoginOutcome {
        account_url: url,
        username: credentials.username().to_string(),
        email: credentials.email.clone(),
        screenshots: shots.into_paths(),
    })
}

async fn input_value<B>(browser: &B, selector: &str) -> Result<Option<String>>
where
    B: BrowserAutomation + ?Sized,
{
    let value = browser
        .evaluate_script(&dom::input_value_script(selector)?)
        .await?;
    Ok(value.as_str().map(str::to_string))
}

/// Clicks the first visible candidate, else clicks by label from a script.
async fn sign_in<B>(browser: &B) -> Result<()>
where
    B: BrowserAutomation + ?Sized,
{
    for selector in SIGN_IN_BUTTONS {
        if browser
            .wait_for_selector(selector, Some(PROBE_TIMEOUT), true)
            .await
            .is_err()
        {
            continue;
        }
        match browser.click(selector, Some(PROBE_TIMEOUT)).await {
            Ok(_) => {
                tracing::debug!("Signed in via {}", selector);
                return Ok(());
            }
            Err(e) => tracing::warn!("Click on {} failed: {}", selector, e),
        }
    }

    let clicked = browser.evaluate_script(dom::CLICK_SIGN_IN_SCRIPT).await?;
    if clicked.as_bool() == Some(true) {
        return Ok(());
    }
    Err(Error::ElementNotFound("sign-in button".to_string()))
}

/// Logged in once the username shows on the page or the login button is gone.
async fn wait_logged_in<B>(browser: &B, username: &str, timeout: Duration) -> Result<()>
where
    B: BrowserAutomation + ?Sized,
{
    let start = Instant::now();
    let needle = username.to_lowercase();

    loop {
        let text = body_text(browser).await?;
        if text.to_lowercase().contains(&needle) {
            return Ok(());
        }
        match browser
            .wait_for_selector(LOGIN_BUTTON, Some(Duration::ZERO), false)
            .await
        {
            Err(e) if e.is_unresolved_target() => return Ok(()),
            Err(e) => return Err(e),
            Ok(_) => {}
        }

        if start.elapsed() >= timeout {
            return Err(Error::Assertion(format!(
                "Still logged out after {:?}",
                timeout
            )));
        }

        tokio::time::sleep(STATE_POLL).await;
    }
}
