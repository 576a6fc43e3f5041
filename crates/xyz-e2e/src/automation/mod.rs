//! Automation facade
//!
//! [`BrowserAutomation`] is the uniform surface scenarios drive. Each
//! operation maps onto one backend call and never retries on its own; callers
//! that need retries poll.
//!
//! Two backends implement it:
//! - [`PlaywrightBrowser`]: the Playwright driver, through `playwright-rs`
//! - [`McpBrowser`]: a Playwright MCP server spoken to over stdio

use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

pub mod mcp;
pub mod playwright;

pub use mcp::{McpBrowser, McpServerCommand};
pub use playwright::PlaywrightBrowser;

/// Outcome of [`BrowserAutomation::navigate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigateResult {
    pub success: bool,
    pub url: String,
    pub title: String,
}

/// Outcome of click, fill and press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActionResult {
    pub success: bool,
}

impl ActionResult {
    pub const OK: ActionResult = ActionResult { success: true };
}

/// Outcome of [`BrowserAutomation::wait_for_selector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitResult {
    pub success: bool,
    pub found: bool,
}

/// Outcome of [`BrowserAutomation::wait_for_navigation`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationResult {
    pub success: bool,
    pub url: String,
}

/// High-level browser session operations.
///
/// Targets are CSS selectors or `text=<literal>`, which matches the innermost
/// element whose trimmed text equals the literal. A `None` timeout means the
/// backend's configured default.
#[async_trait]
pub trait BrowserAutomation: Send + Sync {
    /// Loads `url` in the current page.
    async fn navigate(&self, url: &str) -> Result<NavigateResult>;

    async fn click(&self, target: &str, timeout: Option<Duration>) -> Result<ActionResult>;

    async fn fill(&self, target: &str, text: &str) -> Result<ActionResult>;

    /// Presses a key (Playwright key name, e.g. `Enter`) on the target.
    async fn press(&self, target: &str, key: &str, timeout: Option<Duration>) -> Result<ActionResult>;

    /// Visible text of the first element matching the target.
    async fn get_text(&self, target: &str) -> Result<String>;

    async fn get_attribute(&self, target: &str, name: &str) -> Result<Option<String>>;

    /// Waits until the target exists (and is visible when `visible` is set).
    ///
    /// Fails with [`Error::ElementNotFound`] on timeout.
    async fn wait_for_selector(
        &self,
        target: &str,
        timeout: Option<Duration>,
        visible: bool,
    ) -> Result<WaitResult>;

    /// Captures the page. With a path the image is written there and the
    /// path is returned; without one the PNG is returned base64-encoded.
    async fn screenshot(&self, path: Option<&Path>) -> Result<String>;

    /// Evaluates a JavaScript expression or function in the page.
    async fn evaluate_script(&self, code: &str) -> Result<Value>;

    async fn get_url(&self) -> Result<String>;

    async fn get_title(&self) -> Result<String>;

    /// Waits for the current document to finish loading.
    async fn wait_for_navigation(&self, timeout: Option<Duration>) -> Result<NavigationResult>;

    /// Tears the session down.
    async fn close(&self) -> Result<()>;
}

/// Which backend drives the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    #[default]
    Playwright,
    Mcp,
}

/// Opens a session on the chosen backend.
pub async fn launch(backend: Backend, config: &SuiteConfig) -> Result<Box<dyn BrowserAutomation>> {
    tracing::info!("Launching {:?} session (headless={})", backend, config.headless);
    match backend {
        Backend::Playwright => Ok(Box::new(PlaywrightBrowser::launch(config).await?)),
        Backend::Mcp => {
            let command = McpServerCommand::playwright_mcp(config.headless);
            Ok(Box::new(McpBrowser::launch(config, command).await?))
        }
    }
}

/// Waits for the target and compares its text against `expected`.
pub async fn wait_for_element_text<B>(
    browser: &B,
    target: &str,
    expected: &str,
    timeout: Option<Duration>,
) -> Result<bool>
where
    B: BrowserAutomation + ?Sized,
{
    browser.wait_for_selector(target, timeout, true).await?;
    let actual = browser.get_text(target).await?;
    Ok(actual == expected)
}

/// True when the current URL contains `expected`.
pub async fn verify_page_url<B>(browser: &B, expected: &str) -> Result<bool>
where
    B: BrowserAutomation + ?Sized,
{
    Ok(browser.get_url().await?.contains(expected))
}

/// True when the current title contains `expected`.
pub async fn verify_page_title<B>(browser: &B, expected: &str) -> Result<bool>
where
    B: BrowserAutomation + ?Sized,
{
    Ok(browser.get_title().await?.contains(expected))
}

/// Fills each `(target, value)` pair in order, stopping at the first failure.
pub async fn fill_form<B>(browser: &B, fields: &[(&str, &str)]) -> Result<Vec<ActionResult>>
where
    B: BrowserAutomation + ?Sized,
{
    let mut results = Vec::with_capacity(fields.len());
    for (target, value) in fields {
        results.push(browser.fill(target, value).await?);
    }
    Ok(results)
}

/// Writes `{dir}/failure_{test_name}.png` and returns its path.
pub async fn screenshot_on_failure<B>(
    browser: &B,
    dir: &Path,
    test_name: &str,
    failure_message: &str,
) -> Result<String>
where
    B: BrowserAutomation + ?Sized,
{
    tracing::warn!("{} failed: {}", test_name, failure_message);
    let path = dir.join(format!("failure_{}.png", test_name));
    browser.screenshot(Some(&path)).await
}

/// Selector forms understood by both backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<'a> {
    Css(&'a str),
    Text(&'a str),
}

impl<'a> Target<'a> {
    pub fn parse(target: &'a str) -> Target<'a> {
        match target.strip_prefix("text=") {
            Some(text) => Target::Text(text.trim_matches('"')),
            None => Target::Css(target),
        }
    }

    /// Selector for the Playwright locator engine. Text targets use the
    /// quoted form, which matches the full text rather than a substring.
    pub(crate) fn to_locator_selector(&self) -> Result<String> {
        match self {
            Target::Css(selector) => Ok(selector.to_string()),
            Target::Text(text) => Ok(format!("text={}", serde_json::to_string(text)?)),
        }
    }

    /// JavaScript expression that evaluates to the matching element or `null`.
    pub(crate) fn to_js(&self) -> Result<String> {
        match self {
            Target::Css(selector) => Ok(format!(
                "document.querySelector({})",
                serde_json::to_string(selector)?
            )),
            Target::Text(text) => Ok(format!(
                "(() => {{ const want = {}; let hit = null; \
                 for (const el of document.querySelectorAll('body *')) {{ \
                   if ((el.textContent || '').trim() !== want) continue; \
                   const inner = Array.from(el.children).some(c => (c.textContent || '').trim() === want); \
                   if (!inner) {{ hit = el; break; }} \
                 }} return hit; }})()",
                serde_json::to_string(text)?
            )),
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub(crate) fn element_not_found(target: &str, timeout: Duration) -> Error {
    Error::ElementNotFound(format!("{} (after {}ms)", target, millis(timeout)))
}
