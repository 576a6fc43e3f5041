//! Share-link chat: ask one question and verify the reply

mod common;

use anyhow::Context;
use clap::Parser;
use common::SessionArgs;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;
use xyz_e2e::automation;
use xyz_e2e::response::{DomHeuristicExtractor, ExtractionConfig, WaitConfig};
use xyz_e2e::scenario::{self, share_link};
use xyz_e2e::verify::KNOWLEDGE_BASE_QUESTION;

#[derive(Parser)]
#[command(name = "xyz-share-link")]
#[command(about = "Ask a shared XYZ agent a question and verify the reply")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    /// Share link to open
    #[arg(long, env = "PROTAGO_SHARE_LINK")]
    share_link: Option<String>,

    /// Question to ask
    #[arg(long, default_value = KNOWLEDGE_BASE_QUESTION)]
    question: String,

    /// Reply wait ceiling, in seconds
    #[arg(long, default_value_t = 120)]
    max_wait: u64,

    /// Regex for page text to leave out of the extracted reply (repeatable)
    #[arg(long = "ignore-pattern", value_name = "REGEX")]
    ignore_patterns: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    cli.session.init_tracing();

    let mut config = cli.session.config()?;
    if let Some(link) = &cli.share_link {
        config = config.share_link(link.as_str()).validated()?;
    }

    let wait = WaitConfig {
        max_wait: Duration::from_secs(cli.max_wait),
        ..WaitConfig::default()
    };
    let mut extraction = ExtractionConfig::default();
    for pattern in &cli.ignore_patterns {
        extraction = extraction.with_chrome_pattern(pattern)?;
    }
    let options = share_link::ShareLinkOptions::default()
        .question(cli.question.as_str())
        .wait(wait)
        .extractor(DomHeuristicExtractor::new(extraction));

    let browser = automation::launch(cli.session.backend, &config)
        .await
        .context("Failed to open a browser session")?;
    let outcome = scenario::run_guarded(
        &*browser,
        &config,
        "share_full",
        share_link::run(&*browser, &config, &options),
    )
    .await?;

    let record = &outcome.record;
    info!(
        "Question: {} | response time {:.2}s ({:.1} min) | ready: {} | verified: {} ({} passed, {} failed)",
        record.question,
        record.response_time_seconds,
        record.response_time_minutes,
        record.response_ready,
        record.verification.passed,
        record.verification.satisfied_checks.len(),
        record.verification.failures.len(),
    );
    info!("Record: {}", outcome.record_path.display());

    Ok(if outcome.passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
