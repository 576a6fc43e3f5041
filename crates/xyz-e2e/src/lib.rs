//! xyz-e2e: browser end-to-end suite for the XYZ web application
//!
//! The suite drives a real browser through the [`BrowserAutomation`] facade,
//! backed either by the Playwright driver or by a Playwright MCP server. On
//! top of it sit the scenarios: homepage smoke check, banner navigation,
//! login and account page, and the share-link chat.
//!
//! The share-link chat is the one with real logic. Its reply arrives
//! asynchronously with no completion event, so [`response::ResponseWaiter`]
//! infers readiness from page snapshots, [`response::Extractor`] recovers the
//! reply from the rendered DOM, and [`verify::RuleBook`] checks it.
//!
//! # Example
//!
//! ```ignore
//! use xyz_e2e::{Backend, SuiteConfig, automation, scenario};
//!
//! #[tokio::main]
//! async fn main() -> xyz_e2e::Result<()> {
//!     let config = SuiteConfig::from_env()?;
//!     let browser = automation::launch(Backend::Playwright, &config).await?;
//!
//!     let options = scenario::share_link::ShareLinkOptions::default();
//!     let outcome = scenario::run_guarded(
//!         &*browser,
//!         &config,
//!         "share_full",
//!         scenario::share_link::run(&*browser, &config, &options),
//!     )
//!     .await?;
//!
//!     println!("verified: {}", outcome.passed());
//!     Ok(())
//! }
//! ```

pub mod automation;
pub mod config;
mod error;
pub mod report;
pub mod response;
pub mod scenario;
pub mod verify;

pub use error::{Error, Result};

pub use automation::{
    ActionResult, Backend, BrowserAutomation, McpBrowser, NavigateResult, NavigationResult,
    PlaywrightBrowser, WaitResult,
};

pub use config::{Credentials, SuiteConfig};

pub use report::ShareLinkRecord;

pub use verify::{RuleBook, VerificationResult, VerificationRule};
