//! Homepage smoke check

use super::ensure;
use crate::automation::{BrowserAutomation, verify_page_title, verify_page_url};
use crate::config::SuiteConfig;
use crate::error::Result;
use serde::Serialize;
use std::time::Duration;

/// Brands accepted in the homepage title
pub const TITLE_BRANDS: [&str; 2] = ["NetMind", "XYZ"];

#[derive(Debug, Clone, Serialize)]
pub struct HomepageCheck {
    pub url: String,
    pub title: String,
}

/// Loads the homepage and checks its URL and title.
pub async fn run<B>(browser: &B, config: &SuiteConfig) -> Result<HomepageCheck>
where
    B: BrowserAutomation + ?Sized,
{
    let nav = browser.navigate(&config.base_url).await?;
    ensure(nav.success, || format!("Navigation to {} failed", config.base_url))?;
    browser
        .wait_for_navigation(Some(Duration::from_secs(3)))
        .await?;

    ensure(verify_page_url(browser, &config.base_url).await?, || {
        format!("Homepage URL does not contain {}", config.base_url)
    })?;

    let mut branded = false;
    for brand in TITLE_BRANDS {
        if verify_page_title(browser, brand).await? {
            branded = true;
            break;
        }
    }

    let check = HomepageCheck {
        url: browser.get_url().await?,
        title: browser.get_title().await?,
    };
    ensure(branded, || format!("Unexpected homepage title: {}", check.title))?;

    tracing::info!("Homepage loaded: {} ({})", check.url, check.title);
    Ok(check)
}
