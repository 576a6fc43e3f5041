//! Share-link chat
//!
//! Opens a shared agent, asks one question, waits for the reply, extracts
//! and verifies it, and writes `share_link_response.json`. An unverified or
//! missing reply is recorded in the outcome rather than raised; only facade
//! failures end the run early.

use crate::automation::BrowserAutomation;
use crate::config::SuiteConfig;
use crate::error::Result;
use crate::report::ShareLinkRecord;
use crate::response::{
    BrowserProbe, DomHeuristicExtractor, ExtractedConversation, Extractor, ResponseWaiter,
    WaitConfig, WaitOutcome, extract_conversation,
};
use crate::verify::{KNOWLEDGE_BASE_QUESTION, RuleBook};
use std::path::PathBuf;
use tokio::time::Instant;

/// Chat input on the share page
pub const CHAT_INPUT: &str = r#"[role="textbox"]"#;

pub struct ShareLinkOptions {
    pub question: String,
    pub wait: WaitConfig,
    pub extractor: Box<dyn Extractor>,
    pub rules: RuleBook,
}

impl Default for ShareLinkOptions {
    fn default() -> Self {
        Self {
            question: KNOWLEDGE_BASE_QUESTION.to_string(),
            wait: WaitConfig::default(),
            extractor: Box::new(DomHeuristicExtractor::default()),
            rules: RuleBook::builtin(),
        }
    }
}

impl ShareLinkOptions {
    pub fn question(mut self, question: impl Into<String>) -> Self {
        self.question = question.into();
        self
    }

    pub fn wait(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }
}

#[derive(Debug)]
pub struct ShareLinkOutcome {
    pub wait: WaitOutcome,
    pub conversation: ExtractedConversation,
    pub record: ShareLinkRecord,
    pub record_path: PathBuf,
    /// Checkpoint screenshots that were written
    pub screenshots: Vec<PathBuf>,
}

impl ShareLinkOutcome {
    pub fn passed(&self) -> bool {
        self.record.verification.passed
    }
}

pub async fn run<B>(
    browser: &B,
    config: &SuiteConfig,
    options: &ShareLinkOptions,
) -> Result<ShareLinkOutcome>
where
    B: BrowserAutomation + ?Sized,
{
    let question = options.question.as_str();
    let mut shots = super::Checkpoints::new(browser, &config.screenshot_dir, "share_full");

    tracing::info!("Step 1: open {}", config.share_link);
    browser.navigate(&config.share_link).await?;
    browser.wait_for_navigation(None).await?;
    shots.capture("step1_loaded").await;

    tracing::info!("Step 2: enter question: {}", question);
    browser.wait_for_selector(CHAT_INPUT, None, true).await?;
    browser.fill(CHAT_INPUT, question).await?;
    let typed = browser.get_text(CHAT_INPUT).await?;
    if !typed.contains(question) {
        tracing::warn!("Chat input may be incomplete: {:?}", typed);
    }
    shots.capture("step2_input_done").await;

    tracing::info!("Step 3: submit");
    let submitted_at = Instant::now();
    browser.press(CHAT_INPUT, "Enter", None).await?;
    shots.capture("step3_submitted").await;

    tracing::info!("Step 4: wait for the reply");
    let probe = BrowserProbe::new(browser, options.wait.message_selector.as_str());
    let wait = ResponseWaiter::new(options.wait.clone()).wait(&probe).await?;
    if let Err(e) = wait.ensure_ready() {
        tracing::warn!("{}; extracting from the current page anyway", e);
    }
    let response_time = submitted_at.elapsed();
    tracing::info!("Response time: {:.2}s", response_time.as_secs_f64());

    tracing::info!("Step 5: extract the reply");
    shots.capture("step5_final").await;
    let conversation = extract_conversation(&probe, options.extractor.as_ref(), question).await?;
    match conversation.require_response() {
        Ok(reply) => tracing::info!("Reply ({} chars):\n{}", reply.chars().count(), reply),
        Err(e) => tracing::warn!(
            "{} ({} text elements on the page)",
            e,
            conversation.all_candidate_texts.len()
        ),
    }

    tracing::info!("Step 6: verify");
    let verification = options.rules.verify(question, conversation.response());
    for check in &verification.satisfied_checks {
        tracing::info!("  pass: {}", check);
    }
    for failure in &verification.failures {
        tracing::warn!("  fail: {}", failure);
    }

    let record = ShareLinkRecord::new(
        question,
        response_time,
        wait.signal,
        conversation.agent_response_text.clone(),
        verification,
    );
    let record_path = record.write_to_dir(&config.screenshot_dir).await?;

    Ok(ShareLinkOutcome {
        wait,
        conversation,
        record,
        record_path,
        screenshots: shots.into_paths(),
    })
}
