//! Homepage smoke check followed by every banner link

mod common;

use anyhow::Context;
use clap::Parser;
use common::SessionArgs;
use std::process::ExitCode;
use tracing::{info, warn};
use xyz_e2e::automation;
use xyz_e2e::scenario::{self, banner, homepage};

#[derive(Parser)]
#[command(name = "xyz-banner-links")]
#[command(about = "Check the XYZ homepage and its banner navigation links")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.session.init_tracing();
    let config = cli.session.config()?;

    let browser = automation::launch(cli.session.backend, &config)
        .await
        .context("Failed to open a browser session")?;
    let links = banner::default_links();
    let report = scenario::run_guarded(&*browser, &config, "banner_links", async {
        homepage::run(&*browser, &config).await?;
        banner::run(&*browser, &config, &links).await
    })
    .await?;

    for link in &report.links {
        match &link.error {
            None => info!("{}: ok ({})", link.name, link.url.as_deref().unwrap_or("-")),
            Some(error) => warn!("{}: {}", link.name, error),
        }
    }

    Ok(match report.into_result() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            warn!("{}", e);
            ExitCode::FAILURE
        }
    })
}
