//! Suite configuration
//!
//! One [`SuiteConfig`] is built at scenario start and handed to every
//! component by reference. Nothing reads the process environment after that.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default site under test
pub const DEFAULT_BASE_URL: &str = "https://xyz-beta.protago-dev.com";

/// Default share link used by the chat scenario
pub const DEFAULT_SHARE_LINK: &str =
    "https://xyz-beta.protago-dev.com/share/ac292053cc66421ea437e7c9c9a59050";

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const NAVIGATION_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_SCREENSHOT_DIR: &str = "screenshots";

/// Login credentials for one account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Display name shown on the account page (the email's local part).
    pub fn username(&self) -> &str {
        self.email
            .split_once('@')
            .map(|(local, _)| local)
            .unwrap_or(&self.email)
    }
}

/// Configuration shared by every scenario
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Site root, without a trailing slash
    pub base_url: String,
    /// Share link opened by the chat scenario
    pub share_link: String,
    pub credentials: Credentials,
    pub admin_credentials: Credentials,
    /// Per-operation timeout for element lookups
    pub default_timeout: Duration,
    /// Per-operation timeout for navigations
    pub navigation_timeout: Duration,
    /// Where checkpoint screenshots and result records land
    pub screenshot_dir: PathBuf,
    pub headless: bool,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            share_link: DEFAULT_SHARE_LINK.to_string(),
            credentials: Credentials::new("test@example.com", "test_password"),
            admin_credentials: Credentials::new("admin@example.com", "admin_password"),
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            navigation_timeout: Duration::from_millis(NAVIGATION_TIMEOUT_MS),
            screenshot_dir: PathBuf::from(DEFAULT_SCREENSHOT_DIR),
            headless: true,
        }
    }
}

impl SuiteConfig {
    /// Builds a config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str, fallback: &str| lookup(key).unwrap_or_else(|| fallback.to_string());

        let config = Self {
            base_url: get("PROTAGO_BASE_URL", &defaults.base_url),
            share_link: get("PROTAGO_SHARE_LINK", &defaults.share_link),
            credentials: Credentials::new(
                get("PROTAGO_TEST_EMAIL", &defaults.credentials.email),
                get("PROTAGO_TEST_PASSWORD", &defaults.credentials.password),
            ),
            admin_credentials: Credentials::new(
                get("PROTAGO_ADMIN_EMAIL", &defaults.admin_credentials.email),
                get("PROTAGO_ADMIN_PASSWORD", &defaults.admin_credentials.password),
            ),
            default_timeout: parse_millis("DEFAULT_TIMEOUT", lookup("DEFAULT_TIMEOUT"))?
                .unwrap_or(defaults.default_timeout),
            navigation_timeout: parse_millis("NAVIGATION_TIMEOUT", lookup("NAVIGATION_TIMEOUT"))?
                .unwrap_or(defaults.navigation_timeout),
            screenshot_dir: lookup("SCREENSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.screenshot_dir),
            headless: parse_bool("HEADLESS", lookup("HEADLESS"))?.unwrap_or(defaults.headless),
        };

        config.validated()
    }

    /// Sets the base URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the share link
    pub fn share_link(mut self, share_link: impl Into<String>) -> Self {
        self.share_link = share_link.into();
        self
    }

    /// Sets the test account
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the screenshot directory
    pub fn screenshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.screenshot_dir = dir.into();
        self
    }

    /// Sets headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Sets both per-operation timeouts
    pub fn timeouts(mut self, default_timeout: Duration, navigation_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self.navigation_timeout = navigation_timeout;
        self
    }

    /// Checks that the URLs parse and strips any trailing slash from the base.
    pub fn validated(mut self) -> Result<Self> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("base URL '{}': {}", self.base_url, e)))?;
        Url::parse(&self.share_link)
            .map_err(|e| Error::Config(format!("share link '{}': {}", self.share_link, e)))?;
        while self.base_url.ends_with('/') {
            self.base_url.pop();
        }
        Ok(self)
    }

    /// Logs in with the admin account instead of the test account.
    pub fn as_admin(mut self) -> Self {
        self.credentials = self.admin_credentials.clone();
        self
    }

    /// `path` (starting with `/`) resolved against the base URL
    pub fn page_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Account settings page
    pub fn account_url(&self) -> String {
        self.page_url("/agentSociety/setting/account")
    }

    /// Path of a file inside the screenshot directory
    pub fn artifact_path(&self, file_name: &str) -> PathBuf {
        self.screenshot_dir.join(file_name)
    }
}

fn parse_millis(key: &str, raw: Option<String>) -> Result<Option<Duration>> {
    raw.map(|value| {
        value
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| Error::Config(format!("{} must be milliseconds, got '{}': {}", key, value, e)))
    })
    .transpose()
}

fn parse_bool(key: &str, raw: Option<String>) -> Result<Option<bool>> {
    raw.map(|value| match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be a boolean, got '{}'", key, value))),
    })
    .transpose()
}
