// Playwright backend
//
// Drives Chromium through the Playwright driver. One browser and one page per
// session; `close()` shuts the driver down.

use super::{
    ActionResult, BrowserAutomation, NavigateResult, NavigationResult, Target, WaitResult,
    element_not_found, millis,
};
use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use playwright_rs::protocol::{
    Browser, ClickOptions, FillOptions, GotoOptions, Locator, Page, Playwright, PressOptions,
    ScreenshotOptions, WaitUntil,
};
use playwright_rs::LaunchOptions;
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};

/// Polling interval for wait_for_selector / wait_for_navigation
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Playwright-backed browser session
pub struct PlaywrightBrowser {
    playwright: Playwright,
    browser: Browser,
    page: Page,
    default_timeout: Duration,
    navigation_timeout: Duration,
}

impl PlaywrightBrowser {
    /// Starts the driver, launches Chromium and opens a page.
    pub async fn launch(config: &SuiteConfig) -> Result<Self> {
        let playwright = Playwright::launch()
            .await
            .map_err(|e| Error::from(e).context("Failed to launch Playwright"))?;

        let options = LaunchOptions::new().headless(config.headless);
        let browser = playwright
            .chromium()
            .launch_with_options(options)
            .await
            .map_err(|e| Error::from(e).context("Failed to launch Chromium"))?;

        let page = browser.new_page().await?;
        tracing::debug!("Playwright session ready (headless={})", config.headless);

        Ok(Self {
            playwright,
            browser,
            page,
            default_timeout: config.default_timeout,
            navigation_timeout: config.navigation_timeout,
        })
    }

    /// Underlying page, for checks the facade does not cover.
    pub fn page(&self) -> &Page {
        &self.page
    }

    async fn locator(&self, target: &str) -> Result<Locator> {
        let selector = Target::parse(target).to_locator_selector()?;
        Ok(self.page.locator(&selector).await)
    }

    async fn first(&self, target: &str) -> Result<Locator> {
        Ok(self.locator(target).await?.first())
    }

    /// Maps driver timeouts on a target to ElementNotFound.
    fn target_error(&self, target: &str, timeout: Duration, error: playwright_rs::Error) -> Error {
        match error {
            playwright_rs::Error::Timeout(_) | playwright_rs::Error::ElementNotFound(_) => {
                element_not_found(target, timeout)
            }
            playwright_rs::Error::ProtocolError(msg) if msg.contains("Timeout") => {
                element_not_found(target, timeout)
            }
            other => Error::Driver(other),
        }
    }

    async fn is_present(&self, target: &str, visible: bool) -> Result<bool> {
        let locator = self.locator(target).await?;
        if locator.count().await? == 0 {
            return Ok(false);
        }
        if visible {
            return Ok(locator.first().is_visible().await?);
        }
        Ok(true)
    }
}

#[async_trait]
impl BrowserAutomation for PlaywrightBrowser {
    async fn navigate(&self, url: &str) -> Result<NavigateResult> {
        tracing::debug!("navigate: {}", url);
        let options = GotoOptions::new()
            .timeout(self.navigation_timeout)
            .wait_until(WaitUntil::DomContentLoaded);

        match self.page.goto(url, Some(options)).await {
            Ok(_) => {}
            Err(playwright_rs::Error::Timeout(_))
            | Err(playwright_rs::Error::NavigationTimeout { .. }) => {
                return Err(Error::NavigationTimeout {
                    url: url.to_string(),
                    duration_ms: millis(self.navigation_timeout),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(NavigateResult {
            success: true,
            url: self.page.url(),
            title: self.page.title().await?,
        })
    }

    async fn click(&self, target: &str, timeout: Option<Duration>) -> Result<ActionResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        tracing::debug!("click: {}", target);
        let options = ClickOptions::builder().timeout(millis(timeout) as f64).build();
        self.first(target)
            .await?
            .click(Some(options))
            .await
            .map_err(|e| self.target_error(target, timeout, e))?;
        Ok(ActionResult::OK)
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ActionResult> {
        let timeout = self.default_timeout;
        tracing::debug!("fill: {} ({} chars)", target, text.chars().count());
        let options = FillOptions::builder().timeout(millis(timeout) as f64).build();
        self.first(target)
            .await?
            .fill(text, Some(options))
            .await
            .map_err(|e| self.target_error(target, timeout, e))?;
        Ok(ActionResult::OK)
    }

    async fn press(&self, target: &str, key: &str, timeout: Option<Duration>) -> Result<ActionResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        tracing::debug!("press: {} on {}", key, target);
        let options = PressOptions::builder().timeout(millis(timeout) as f64).build();
        self.first(target)
            .await?
            .press(key, Some(options))
            .await
            .map_err(|e| self.target_error(target, timeout, e))?;
        Ok(ActionResult::OK)
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        self.first(target)
            .await?
            .inner_text()
            .await
            .map_err(|e| self.target_error(target, self.default_timeout, e))
    }

    async fn get_attribute(&self, target: &str, name: &str) -> Result<Option<String>> {
        self.first(target)
            .await?
            .get_attribute(name)
            .await
            .map_err(|e| self.target_error(target, self.default_timeout, e))
    }

    async fn wait_for_selector(
        &self,
        target: &str,
        timeout: Option<Duration>,
        visible: bool,
    ) -> Result<WaitResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        loop {
            if self.is_present(target, visible).await? {
                return Ok(WaitResult {
                    success: true,
                    found: true,
                });
            }

            if start.elapsed() >= timeout {
                return Err(element_not_found(target, timeout));
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn screenshot(&self, path: Option<&Path>) -> Result<String> {
        let options = ScreenshotOptions::builder().full_page(true).build();
        match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                self.page.screenshot_to_file(path, Some(options)).await?;
                tracing::debug!("Screenshot saved: {}", path.display());
                Ok(path.display().to_string())
            }
            None => {
                let bytes = self.page.screenshot(Some(options)).await?;
                Ok(base64::prelude::BASE64_STANDARD.encode(bytes))
            }
        }
    }

    async fn evaluate_script(&self, code: &str) -> Result<Value> {
        Ok(self.page.evaluate::<(), Value>(code, None).await?)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.page.url())
    }

    async fn get_title(&self) -> Result<String> {
        Ok(self.page.title().await?)
    }

    async fn wait_for_navigation(&self, timeout: Option<Duration>) -> Result<NavigationResult> {
        let timeout = timeout.unwrap_or(self.navigation_timeout);
        let start = Instant::now();

        loop {
            let state = self.page.evaluate_value("document.readyState").await?;
            if state == "complete" {
                return Ok(NavigationResult {
                    success: true,
                    url: self.page.url(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(Error::NavigationTimeout {
                    url: self.page.url(),
                    duration_ms: millis(timeout),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Browser close failed: {}", e);
        }
        self.playwright.shutdown().await?;
        Ok(())
    }
}
