//! Page observations taken while waiting for a response

use super::dom;
use crate::automation::BrowserAutomation;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One observation of the page. Immutable once taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub body_text: String,
    pub message_element_count: usize,
    pub captured_at_epoch_seconds: f64,
}

impl PageSnapshot {
    pub fn new(body_text: impl Into<String>, message_element_count: usize) -> Self {
        Self {
            body_text: body_text.into(),
            message_element_count,
            captured_at_epoch_seconds: now_epoch_seconds(),
        }
    }

    /// Body text length in characters.
    pub fn text_len(&self) -> usize {
        self.body_text.chars().count()
    }

    pub fn contains(&self, phrase: &str) -> bool {
        self.body_text.contains(phrase)
    }
}

/// A rendered element and its text, as seen by the extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    pub text: String,
    #[serde(default)]
    pub tag_name: String,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl TextElement {
    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Read-only view of the live page used by the wait loop and the extractor.
#[async_trait]
pub trait PageProbe: Send + Sync {
    async fn snapshot(&self) -> Result<PageSnapshot>;

    async fn text_elements(&self) -> Result<Vec<TextElement>>;
}

/// [`PageProbe`] over a browser session
pub struct BrowserProbe<'a, B: ?Sized> {
    browser: &'a B,
    message_selector: String,
}

impl<'a, B> BrowserProbe<'a, B>
where
    B: BrowserAutomation + ?Sized,
{
    pub fn new(browser: &'a B, message_selector: impl Into<String>) -> Self {
        Self {
            browser,
            message_selector: message_selector.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSnapshot {
    #[serde(default)]
    body_text: String,
    #[serde(default)]
    message_count: usize,
}

#[async_trait]
impl<B> PageProbe for BrowserProbe<'_, B>
where
    B: BrowserAutomation + ?Sized,
{
    async fn snapshot(&self) -> Result<PageSnapshot> {
        let script = dom::snapshot_script(&self.message_selector)?;
        let raw: RawSnapshot = serde_json::from_value(self.browser.evaluate_script(&script).await?)?;
        Ok(PageSnapshot::new(raw.body_text, raw.message_count))
    }

    async fn text_elements(&self) -> Result<Vec<TextElement>> {
        let value = self.browser.evaluate_script(dom::TEXT_ELEMENTS_SCRIPT).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn now_epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
