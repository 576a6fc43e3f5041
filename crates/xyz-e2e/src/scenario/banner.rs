//! Homepage banner navigation
//!
//! Follows each banner link from the homepage, checks where it lands, and
//! returns home before the next one. A broken link is recorded (with a
//! `failure_banner_{link}.png` screenshot) and the run moves on; the report
//! fails if any link did.

use super::ensure;
use crate::automation::{BrowserAutomation, screenshot_on_failure, verify_page_url};
use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::time::Duration;

const HOME_SETTLE: Duration = Duration::from_secs(3);
const LINK_SETTLE: Duration = Duration::from_secs(5);

/// How a link is followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Click(&'static str),
    /// Anchor links are opened directly, relative to the base URL
    Navigate(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct BannerLink {
    pub name: &'static str,
    pub action: LinkAction,
    /// The landing URL must contain one of these
    pub url_fragments: &'static [&'static str],
    /// Element expected on the landing page; only logged when missing
    pub landmark: Option<&'static str>,
}

/// Usher, Society, Pricing and Contact
pub fn default_links() -> Vec<BannerLink> {
    vec![
        BannerLink {
            name: "usher",
            action: LinkAction::Click("text=Usher"),
            url_fragments: &["agentSociety", "chat"],
            landmark: None,
        },
        BannerLink {
            name: "society",
            action: LinkAction::Click("text=Society"),
            url_fragments: &["society", "agentSociety"],
            landmark: None,
        },
        BannerLink {
            name: "pricing",
            action: LinkAction::Navigate("/#pricing"),
            url_fragments: &["#pricing"],
            landmark: Some("button"),
        },
        BannerLink {
            name: "contact",
            action: LinkAction::Click("text=Contact"),
            url_fragments: &["contact"],
            landmark: Some("input[type='email'], input[name*='email']"),
        },
    ]
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkOutcome {
    pub name: String,
    pub passed: bool,
    pub url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BannerReport {
    pub links: Vec<LinkOutcome>,
    pub final_url: String,
}

impl BannerReport {
    pub fn passed(&self) -> bool {
        self.links.iter().all(|link| link.passed)
    }

    /// [`Error::Assertion`] naming every failed link.
    pub fn into_result(self) -> Result<Self> {
        let failed: Vec<&str> = self
            .links
            .iter()
            .filter(|link| !link.passed)
            .map(|link| link.name.as_str())
            .collect();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(Error::Assertion(format!("Banner links failed: {}", failed.join(", "))))
        }
    }
}

/// Checks every link in `links`, in order.
pub async fn run<B>(browser: &B, config: &SuiteConfig, links: &[BannerLink]) -> Result<BannerReport>
where
    B: BrowserAutomation + ?Sized,
{
    go_home(browser, config).await?;

    let mut outcomes = Vec::with_capacity(links.len());
    for link in links {
        let outcome = match follow(browser, config, link).await {
            Ok(url) => {
                tracing::info!("Banner link '{}' -> {}", link.name, url);
                LinkOutcome {
                    name: link.name.to_string(),
                    passed: true,
                    url: Some(url),
                    error: None,
                }
            }
            Err(e) => {
                let name = format!("banner_{}", link.name);
                if let Err(shot) =
                    screenshot_on_failure(browser, &config.screenshot_dir, &name, &e.to_string()).await
                {
                    tracing::warn!("Failure screenshot for '{}' not captured: {}", link.name, shot);
                }
                LinkOutcome {
                    name: link.name.to_string(),
                    passed: false,
                    url: browser.get_url().await.ok(),
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
        go_home(browser, config).await?;
    }

    let final_url = browser.get_url().await?;
    ensure(final_url.contains(&config.base_url), || {
        format!("Expected to end on {}, got {}", config.base_url, final_url)
    })?;

    Ok(BannerReport {
        links: outcomes,
        final_url,
    })
}

async fn go_home<B>(browser: &B, config: &SuiteConfig) -> Result<()>
where
    B: BrowserAutomation + ?Sized,
{
    browser.navigate(&config.base_url).await?;
    browser.wait_for_navigation(Some(HOME_SETTLE)).await?;
    Ok(())
}

async fn follow<B>(browser: &B, config: &SuiteConfig, link: &BannerLink) -> Result<String>
where
    B: BrowserAutomation + ?Sized,
{
    match link.action {
        LinkAction::Click(target) => {
            browser.click(target, None).await?;
        }
        LinkAction::Navigate(path) => {
            browser.navigate(&config.page_url(path)).await?;
        }
    }
    browser.wait_for_navigation(Some(LINK_SETTLE)).await?;

    let mut landed = false;
    for fragment in link.url_fragments {
        if verify_page_url(browser, fragment).await? {
            landed = true;
            break;
        }
    }
    let url = browser.get_url().await?;
    ensure(landed, || {
        format!(
            "'{}' landed on {}, expected one of {:?}",
            link.name, url, link.url_fragments
        )
    })?;

    if let Some(landmark) = link.landmark {
        if let Err(e) = browser
            .wait_for_selector(landmark, Some(LINK_SETTLE), false)
            .await
        {
            tracing::debug!("Landmark for '{}' not found: {}", link.name, e);
        }
    }

    Ok(url)
}
