//! Login through the homepage modal and check the account page

mod common;

use anyhow::Context;
use clap::Parser;
use common::SessionArgs;
use std::process::ExitCode;
use tracing::info;
use xyz_e2e::scenario::{self, login};
use xyz_e2e::{Credentials, automation};

#[derive(Parser)]
#[command(name = "xyz-login")]
#[command(about = "Log in to XYZ and verify the account page")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    /// Account email (default: PROTAGO_TEST_EMAIL)
    #[arg(long)]
    email: Option<String>,

    /// Account password (default: PROTAGO_TEST_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Log in with PROTAGO_ADMIN_EMAIL / PROTAGO_ADMIN_PASSWORD instead
    #[arg(long, conflicts_with_all = ["email", "password"])]
    admin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.session.init_tracing();

    let mut config = cli.session.config()?;
    if cli.admin {
        config = config.as_admin();
    }
    if cli.email.is_some() || cli.password.is_some() {
        let current = config.credentials.clone();
        config = config.credentials(Credentials::new(
            cli.email.unwrap_or(current.email),
            cli.password.unwrap_or(current.password),
        ));
    }

    let browser = automation::launch(cli.session.backend, &config)
        .await
        .context("Failed to open a browser session")?;
    let outcome = scenario::run_guarded(
        &*browser,
        &config,
        "test_login",
        login::run(&*browser, &config),
    )
    .await?;

    info!(
        "Logged in as {} <{}>, account page {}",
        outcome.username, outcome.email, outcome.account_url
    );
    Ok(ExitCode::SUCCESS)
}
