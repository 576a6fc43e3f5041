//! Scenarios
//!
//! Each scenario is a sequence of facade calls against one session. They are
//! run through [`run_guarded`], which captures `{scenario}_error.png` when a
//! step fails and closes the session whatever happened.

pub mod banner;
pub mod checkpoint;
pub mod homepage;
pub mod login;
pub mod share_link;

pub use checkpoint::Checkpoints;

use crate::automation::BrowserAutomation;
use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use std::future::Future;

/// Runs `scenario`, then screenshots on failure and always closes `browser`.
///
/// The scenario's own error wins over a failed close.
pub async fn run_guarded<B, T, F>(
    browser: &B,
    config: &SuiteConfig,
    name: &str,
    scenario: F,
) -> Result<T>
where
    B: BrowserAutomation + ?Sized,
    F: Future<Output = Result<T>>,
{
    tracing::info!("Scenario '{}' started", name);
    let result = scenario.await;

    match &result {
        Ok(_) => tracing::info!("Scenario '{}' finished", name),
        Err(e) => {
            tracing::error!("Scenario '{}' failed: {}", name, e);
            let path = config.artifact_path(&format!("{}_error.png", name));
            match browser.screenshot(Some(&path)).await {
                Ok(_) => tracing::info!("Error screenshot saved: {}", path.display()),
                Err(shot) => tracing::warn!("Error screenshot failed: {}", shot),
            }
        }
    }

    let closed = browser.close().await;
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.context("Failed to close session")),
        (Err(e), closed) => {
            if let Err(close) = closed {
                tracing::warn!("Session close failed after error: {}", close);
            }
            Err(e)
        }
    }
}

/// `document.body.innerText` of the current page.
pub(crate) async fn body_text<B>(browser: &B) -> Result<String>
where
    B: BrowserAutomation + ?Sized,
{
    let value = browser
        .evaluate_script("() => document.body ? document.body.innerText : ''")
        .await?;
    Ok(value.as_str().unwrap_or_default().to_string())
}

/// Fails with [`Error::Assertion`] unless `condition` holds.
pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Assertion(message()))
    }
}
