// Flags and setup shared by the scenario binaries

use anyhow::Context;
use clap::Args;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use xyz_e2e::{Backend, SuiteConfig};

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Site root
    #[arg(long, env = "PROTAGO_BASE_URL")]
    pub base_url: Option<String>,

    /// Where screenshots and result records are written
    #[arg(long, env = "SCREENSHOT_DIR")]
    pub screenshot_dir: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Automation backend
    #[arg(long, value_enum, env = "XYZ_BACKEND", default_value_t = Backend::Playwright)]
    pub backend: Backend,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

impl SessionArgs {
    /// Environment config with the flags applied on top.
    pub fn config(&self) -> anyhow::Result<SuiteConfig> {
        let mut config = SuiteConfig::from_env().context("Invalid environment configuration")?;
        if let Some(base_url) = &self.base_url {
            config = config.base_url(base_url.as_str());
        }
        if let Some(dir) = &self.screenshot_dir {
            config = config.screenshot_dir(dir);
        }
        if self.headed {
            config = config.headless(false);
        }
        Ok(config.validated()?)
    }

    pub fn init_tracing(&self) {
        let filter = if self.debug {
            EnvFilter::new(format!("xyz_e2e=debug,{}=debug", env!("CARGO_CRATE_NAME")))
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new(format!("xyz_e2e=info,{}=info", env!("CARGO_CRATE_NAME")))
            })
        };

        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}
