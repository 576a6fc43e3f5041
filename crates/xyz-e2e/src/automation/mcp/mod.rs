//! MCP backend
//!
//! Talks to a Playwright MCP server (`@playwright/mcp`) over stdio. Page
//! operations go through the server's `browser_evaluate` tool so that CSS and
//! `text=` targets resolve the same way they do in the Playwright backend;
//! navigation, key presses and screenshots use the dedicated tools.

pub mod connection;
pub mod transport;

use super::{
    ActionResult, BrowserAutomation, NavigateResult, NavigationResult, Target, WaitResult,
    element_not_found, millis,
};
use crate::config::SuiteConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use connection::Connection;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::Mutex as TokioMutex;
use transport::LineReceiver;

/// MCP protocol revision sent during `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How to start the MCP server process
#[derive(Debug, Clone)]
pub struct McpServerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl McpServerCommand {
    /// `npx @playwright/mcp@latest`, headless unless told otherwise.
    pub fn playwright_mcp(headless: bool) -> Self {
        let mut args = vec!["@playwright/mcp@latest".to_string()];
        if headless {
            args.push("--headless".to_string());
        }
        Self {
            program: "npx".to_string(),
            args,
            env: HashMap::new(),
        }
    }
}

/// Content returned by a `tools/call`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// All text blocks joined with newlines
    pub text: String,
    /// Base64 image blocks
    pub images: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Text { text: String },
    Image { data: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallToolResult {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    is_error: bool,
}

/// Browser session driven through an MCP server
pub struct McpBrowser {
    connection: Arc<Connection>,
    child: TokioMutex<Option<Child>>,
    default_timeout: Duration,
    navigation_timeout: Duration,
}

impl McpBrowser {
    /// Spawns the server process and performs the MCP handshake.
    pub async fn launch(config: &SuiteConfig, command: McpServerCommand) -> Result<Self> {
        tracing::debug!("Spawning MCP server: {} {:?}", command.program, command.args);
        let mut child = Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transport(format!("Failed to spawn '{}': {}", command.program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Transport("MCP server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Transport("MCP server stdout unavailable".to_string()))?;

        let browser = Self::connect(stdin, stdout, config).await?;
        *browser.child.lock().await = Some(child);
        Ok(browser)
    }

    /// Runs the handshake over an already-open stream pair.
    pub async fn connect<W, R>(writer: W, reader: R, config: &SuiteConfig) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let connection = Arc::new(Connection::new(writer));
        let (mut receiver, message_rx) = LineReceiver::new(reader);

        tokio::spawn(async move {
            if let Err(e) = receiver.run_loop().await {
                tracing::error!("MCP transport error: {}", e);
            }
        });
        let runner = Arc::clone(&connection);
        tokio::spawn(async move { runner.run(message_rx).await });

        let browser = Self {
            connection,
            child: TokioMutex::new(None),
            default_timeout: config.default_timeout,
            navigation_timeout: config.navigation_timeout,
        };
        browser.initialize().await?;
        Ok(browser)
    }

    async fn initialize(&self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            }
        });
        let response = self.request("initialize", params, REQUEST_TIMEOUT).await?;
        tracing::debug!(
            "MCP server initialized: {}",
            response["serverInfo"]["name"].as_str().unwrap_or("unknown")
        );
        self.connection
            .notify("notifications/initialized", Value::Null)
            .await
    }

    async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Value> {
        self.connection.request_within(method, params, timeout).await
    }

    /// Invokes one server tool.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        self.call_tool_within(name, arguments, REQUEST_TIMEOUT).await
    }

    async fn call_tool_within(
        &self,
        name: &str,
        arguments: Value,
        timeout: Duration,
    ) -> Result<ToolOutput> {
        let raw = self
            .request("tools/call", json!({ "name": name, "arguments": arguments }), timeout)
            .await?;
        let result: CallToolResult = serde_json::from_value(raw)?;

        let mut output = ToolOutput::default();
        let mut texts = Vec::new();
        for block in result.content {
            match block {
                ContentBlock::Text { text } => texts.push(text),
                ContentBlock::Image { data } => output.images.push(data),
                ContentBlock::Other => {}
            }
        }
        output.text = texts.join("\n");

        if result.is_error {
            return Err(Error::Tool {
                tool: name.to_string(),
                message: output.text,
            });
        }
        Ok(output)
    }

    /// Runs a page function and parses its JSON result.
    async fn eval(&self, function: &str) -> Result<Value> {
        let output = self
            .call_tool("browser_evaluate", json!({ "function": function }))
            .await?;
        Ok(parse_evaluate_output(&output.text))
    }

    async fn is_present(&self, target: &str, visible: bool) -> Result<bool> {
        let function = format!(
            "() => {{ const el = {}; if (!el) return false; if (!{}) return true; \
             const r = el.getBoundingClientRect(); const s = window.getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.display !== 'none' && s.visibility !== 'hidden'; }}",
            Target::parse(target).to_js()?,
            visible
        );
        Ok(self.eval(&function).await? == Value::Bool(true))
    }

    /// Runs `body` with `el` bound to the resolved target; `false` means unresolved.
    async fn with_element(&self, target: &str, body: &str) -> Result<Value> {
        let function = format!(
            "() => {{ const el = {}; if (!el) return false; {} }}",
            Target::parse(target).to_js()?,
            body
        );
        self.eval(&function).await
    }
}

#[async_trait]
impl BrowserAutomation for McpBrowser {
    async fn navigate(&self, url: &str) -> Result<NavigateResult> {
        tracing::debug!("navigate: {}", url);
        match self
            .call_tool_within("browser_navigate", json!({ "url": url }), self.navigation_timeout)
            .await
        {
            Ok(_) => {}
            Err(Error::Transport(msg)) if msg.contains("no reply") => {
                return Err(Error::NavigationTimeout {
                    url: url.to_string(),
                    duration_ms: millis(self.navigation_timeout),
                });
            }
            Err(e) => return Err(e),
        }

        let location = self
            .eval("() => ({ url: location.href, title: document.title })")
            .await?;
        Ok(NavigateResult {
            success: true,
            url: location["url"].as_str().unwrap_or(url).to_string(),
            title: location["title"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn click(&self, target: &str, timeout: Option<Duration>) -> Result<ActionResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.wait_for_selector(target, Some(timeout), true).await?;
        let clicked = self
            .with_element(target, "el.scrollIntoView({ block: 'center' }); el.click(); return true;")
            .await?;
        if clicked != Value::Bool(true) {
            return Err(element_not_found(target, timeout));
        }
        Ok(ActionResult::OK)
    }

    async fn fill(&self, target: &str, text: &str) -> Result<ActionResult> {
        let timeout = self.default_timeout;
        self.wait_for_selector(target, Some(timeout), true).await?;
        let body = format!(
            "const text = {}; el.focus(); \
             if ('value' in el) {{ \
               const desc = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value'); \
               if (desc && desc.set) desc.set.call(el, text); else el.value = text; \
             }} else {{ el.textContent = text; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return true;",
            serde_json::to_string(text)?
        );
        if self.with_element(target, &body).await? != Value::Bool(true) {
            return Err(element_not_found(target, timeout));
        }
        Ok(ActionResult::OK)
    }

    async fn press(&self, target: &str, key: &str, timeout: Option<Duration>) -> Result<ActionResult> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.wait_for_selector(target, Some(timeout), true).await?;
        if self.with_element(target, "el.focus(); return true;").await? != Value::Bool(true) {
            return Err(element_not_found(target, timeout));
        }
        self.call_tool("browser_press_key", json!({ "key": key }))
            .await?;
        Ok(ActionResult::OK)
    }

    async fn get_text(&self, target: &str) -> Result<String> {
        let value = self
            .with_element(target, "return { text: el.innerText ?? el.textContent ?? '' };")
            .await?;
        value["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::ElementNotFound(target.to_string()))
    }

    async fn get_attribute(&self, target: &str, name: &str) -> Result<Option<String>> {
        let body = format!(
            "return {{ value: el.getAttribute({}) }};",
            serde_json::to_string(name)?
        );
        let value = self.with_element(target, &body).await?;
        match value {
            Value::Object(map) => Ok(map.get("value").and_then(Value::as_str).map(str::to_string)),
            _ => Err(Error::ElementNotFound(target.to_string())),
        }
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
        let output = self
            .call_tool("browser_take_screenshot", json!({ "fullPage": true }))
            .await?;
        let data = output.images.into_iter().next().ok_or_else(|| Error::Tool {
            tool: "browser_take_screenshot".to_string(),
            message: "no image content returned".to_string(),
        })?;

        match path {
            Some(path) => {
                let bytes = base64::prelude::BASE64_STANDARD
                    .decode(data.as_bytes())
                    .map_err(|e| Error::Protocol(format!("Failed to decode screenshot: {}", e)))?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, bytes).await?;
                Ok(path.display().to_string())
            }
            None => Ok(data),
        }
    }

    async fn evaluate_script(&self, code: &str) -> Result<Value> {
        self.eval(&as_function(code)).await
    }

    async fn get_url(&self) -> Result<String> {
        let value = self.eval("() => location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn get_title(&self) -> Result<String> {
        let value = self.eval("() => document.title").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn wait_for_navigation(&self, timeout: Option<Duration>) -> Result<NavigationResult> {
        let timeout = timeout.unwrap_or(self.navigation_timeout);
        let start = Instant::now();

        loop {
            let state = self
                .eval("() => ({ state: document.readyState, url: location.href })")
                .await?;
            if state["state"] == "complete" {
                return Ok(NavigationResult {
                    success: true,
                    url: state["url"].as_str().unwrap_or_default().to_string(),
                });
            }

            if start.elapsed() >= timeout {
                return Err(Error::NavigationTimeout {
                    url: state["url"].as_str().unwrap_or_default().to_string(),
                    duration_ms: millis(timeout),
                });
            }

            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.call_tool("browser_close", json!({})).await {
            tracing::warn!("browser_close failed: {}", e);
        }
        if let Some(mut child) = self.child.lock().await.take() {
            child.kill().await?;
        }
        Ok(())
    }
}

/// Wraps a bare expression into the function form `browser_evaluate` expects.
pub(crate) fn as_function(code: &str) -> String {
    let trimmed = code.trim();
    let is_function = trimmed.starts_with("function")
        || trimmed.starts_with("async ")
        || (trimmed.starts_with('(') && trimmed.contains("=>"));
    if is_function {
        trimmed.to_string()
    } else {
        format!("() => ({})", trimmed)
    }
}

/// Pulls the JSON result out of a `browser_evaluate` reply.
///
/// The server answers in markdown: either a `### Result` section or a
/// `- Result:` line, optionally fenced. Anything that does not parse as JSON
/// comes back as a string.
pub(crate) fn parse_evaluate_output(text: &str) -> Value {
    let section = if let Some((_, rest)) = text.split_once("### Result") {
        rest.split("\n### ").next().unwrap_or(rest)
    } else if let Some(line) = text.lines().find_map(|l| l.trim().strip_prefix("- Result:")) {
        line
    } else {
        text
    };

    let mut body = section.trim();
    if let Some(stripped) = body.strip_prefix("```") {
        let stripped = stripped.split_once('\n').map(|(_, rest)| rest).unwrap_or(stripped);
        body = stripped.trim_end().strip_suffix("```").unwrap_or(stripped).trim();
    }

    serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
}
