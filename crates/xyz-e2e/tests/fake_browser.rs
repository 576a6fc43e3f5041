// Fake browser - scripted BrowserAutomation for scenario tests
//
// Pages are keyed by URL. Each page lists the selectors present on it and
// its body text. Clicks can move to another URL or log the session in, and
// the chat page's body follows a timeline keyed on time since the question
// was submitted. Screenshots are written as small placeholder files so tests
// can check which checkpoints were taken.

// Each test binary compiles this module separately and uses a different part
// of it.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use xyz_e2e::automation::{
    ActionResult, BrowserAutomation, NavigateResult, NavigationResult, WaitResult,
};
use xyz_e2e::response::dom;
use xyz_e2e::{Error, Result};

/// Body text and message count for a given time since submission
pub type Timeline = Arc<dyn Fn(Duration) -> (String, usize) + Send + Sync>;

#[derive(Clone, Default)]
pub struct FakePage {
    pub title: String,
    pub body: String,
    pub selectors: HashSet<String>,
    pub texts: HashMap<String, String>,
    pub attributes: HashMap<(String, String), String>,
}

impl FakePage {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            selectors: HashSet::new(),
            texts: HashMap::new(),
            attributes: HashMap::new(),
        }
    }

    pub fn with(mut self, selectors: &[&str]) -> Self {
        self.selectors.extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    /// Adds an element with the given visible text.
    pub fn text(mut self, selector: &str, text: &str) -> Self {
        self.selectors.insert(selector.to_string());
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn attribute(mut self, selector: &str, name: &str, value: &str) -> Self {
        self.selectors.insert(selector.to_string());
        self.attributes
            .insert((selector.to_string(), name.to_string()), value.to_string());
        self
    }
}

#[derive(Clone)]
pub enum ClickEffect {
    Goto(String),
    LogIn,
}

#[derive(Default)]
struct State {
    url: String,
    pages: HashMap<String, FakePage>,
    clicks: HashMap<String, ClickEffect>,
    inputs: HashMap<String, String>,
    hidden_when_logged_in: HashSet<String>,
    logged_in: bool,
    chat: Option<Timeline>,
    chat_elements: Vec<Value>,
    submitted_at: Option<Instant>,
    email_next_button: bool,
    fail_screenshots: bool,
    screenshots: Vec<PathBuf>,
    calls: Vec<String>,
    closed: bool,
}

#[derive(Default)]
pub struct FakeBrowser {
    state: Mutex<State>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, page: FakePage) -> Self {
        self.lock().pages.insert(url.to_string(), page);
        self
    }

    pub fn on_click(self, target: &str, effect: ClickEffect) -> Self {
        self.lock().clicks.insert(target.to_string(), effect);
        self
    }

    pub fn hidden_when_logged_in(self, selector: &str) -> Self {
        self.lock().hidden_when_logged_in.insert(selector.to_string());
        self
    }

    pub fn email_next_button(self) -> Self {
        self.lock().email_next_button = true;
        self
    }

    /// Body text of every page follows `timeline` once Enter is pressed.
    pub fn chat(self, timeline: Timeline, elements: Vec<Value>) -> Self {
        {
            let mut state = self.lock();
            state.chat = Some(timeline);
            state.chat_elements = elements;
        }
        self
    }

    pub fn failing_screenshots(self) -> Self {
        self.lock().fail_screenshots = true;
        self
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.lock().screenshots.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }

    pub fn input(&self, selector: &str) -> Option<String> {
        self.lock().inputs.get(selector).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

impl State {
    fn current(&self) -> Option<&FakePage> {
        self.pages.get(&self.url)
    }

    fn has(&self, selector: &str) -> bool {
        if self.logged_in && self.hidden_when_logged_in.contains(selector) {
            return false;
        }
        self.current()
            .is_some_and(|page| page.selectors.contains(selector))
    }

    fn require(&self, selector: &str) -> Result<()> {
        if self.has(selector) {
            Ok(())
        } else {
            Err(Error::ElementNotFound(selector.to_string()))
        }
    }

    fn chat_state(&self) -> Option<(String, usize)> {
        let timeline = self.chat.as_ref()?;
        let elapsed = self
            .submitted_at
            .map(|at| at.elapsed())
            .unwrap_or_default();
        Some(timeline(elapsed))
    }

    fn body(&self) -> String {
        match self.chat_state() {
            Some((body, _)) => body,
            None => self
                .current()
                .map(|page| page.body.clone())
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl BrowserAutomation for FakeBrowser {
    async fn navigate(&self, url: &str) -> Result<NavigateResult> {
        let mut state = self.lock();
        state.calls.push(format!("navigate {}", url));
        let Some(page) = state.pages.get(url).cloned() else {
            return Err(Error::NavigationTimeout {
                url: url.to_string(),
                duration_ms: 15_000,
            });
        };
        state.url = url.to_string();
        Ok(NavigateResult {
            success: true,
            url: url.to_string(),
            title: page.title,
        })
    }

    async fn click(&self, target: &str, _timeout: Option<Duration>) -> Result<ActionResult> {
        let mut state = self.lock();
        state.calls.push(format!("click {}", target));
        state.require(target)?;
        match state.clicks.get(target).cloned() {
            Some(ClickEffect::Goto(url)) => state.url = url,
            Some(ClickEffect::LogIn) => state.logged_in = true,
            None => {}
        }
        Ok(ActionResult::OK)
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ActionResult> {
        let mut state = self.lock();
        state.calls.push(format!("fill {}", target));
        state.require(target)?;
        state.inputs.insert(target.to_string(), text.to_string());
        Ok(ActionResult::OK)
    }

    async fn press(&self, target: &str, key: &str, _timeout: Option<Duration>) -> Result<ActionResult> {
        let mut state = self.lock();
        state.calls.push(format!("press {} {}", target, key));
        state.require(target)?;
        if key == "Enter" && state.chat.is_some() {
            state.submitted_at = Some(Instant::now());
        }
        Ok(ActionResult::OK)
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        let state = self.lock();
        state.require(target)?;
        if let Some(value) = state.inputs.get(target) {
            return Ok(value.clone());
        }
        Ok(state
            .current()
            .and_then(|page| page.texts.get(target).cloned())
            .unwrap_or_default())
    }

    async fn get_attribute(&self, target: &str, name: &str) -> Result<Option<String>> {
        let state = self.lock();
        state.require(target)?;
        Ok(state.current().and_then(|page| {
            page.attributes
                .get(&(target.to_string(), name.to_string()))
                .cloned()
        }))
    }

    async fn wait_for_selector(
        &self,
        target: &str,
        _timeout: Option<Duration>,
        _visible: bool,
    ) -> Result<WaitResult> {
        self.lock().require(target)?;
        Ok(WaitResult {
            success: true,
            found: true,
        })
    }

    async fn screenshot(&self, path: Option<&Path>) -> Result<String> {
        let mut state = self.lock();
        if state.fail_screenshots {
            return Err(Error::ChannelClosed);
        }
        let Some(path) = path else {
            return Ok("inline".to_string());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, b"\x89PNG")?;
        state.screenshots.push(path.to_path_buf());
        Ok(path.display().to_string())
    }

    async fn evaluate_script(&self, code: &str) -> Result<Value> {
        let mut state = self.lock();

        if code.contains("messageCount") {
            let (body, count) = state.chat_state().unwrap_or_else(|| (state.body(), 0));
            return Ok(json!({ "bodyText": body, "messageCount": count }));
        }
        if code == dom::TEXT_ELEMENTS_SCRIPT {
            return Ok(Value::Array(state.chat_elements.clone()));
        }
        if code == dom::CLICK_EMAIL_NEXT_SCRIPT {
            return Ok(Value::Bool(state.email_next_button));
        }
        if code == dom::CLICK_SIGN_IN_SCRIPT {
            state.logged_in = true;
            return Ok(Value::Bool(true));
        }
        if code.contains("'value' in el") {
            let value = state
                .inputs
                .iter()
                .find(|(selector, _)| {
                    serde_json::to_string(selector).is_ok_and(|quoted| code.contains(&quoted))
                })
                .map(|(_, value)| Value::String(value.clone()));
            return Ok(value.unwrap_or(Value::Null));
        }
        if code.contains("innerText") {
            return Ok(Value::String(state.body()));
        }
        Ok(Value::Null)
    }

    async fn get_url(&self) -> Result<String> {
        Ok(self.lock().url.clone())
    }

    async fn get_title(&self) -> Result<String> {
        let state = self.lock();
        Ok(state
            .current()
            .map(|page| page.title.clone())
            .unwrap_or_default())
    }

    async fn wait_for_navigation(&self, _timeout: Option<Duration>) -> Result<NavigationResult> {
        Ok(NavigationResult {
            success: true,
            url: self.lock().url.clone(),
        })
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push("close".to_string());
        state.closed = true;
        Ok(())
    }
}

/// A visible text element as returned by the page script
pub fn text_element(text: &str, top: f64) -> Value {
    json!({
        "text": text,
        "tagName": "DIV",
        "top": top,
        "left": 16.0,
        "width": 600.0,
        "height": 40.0,
        "visible": true,
    })
}
