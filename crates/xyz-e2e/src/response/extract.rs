//! Conversation extraction from rendered page text
//!
//! The chat has no stable markup for replies, so the reply is recovered from
//! geometry: visible text elements are put in reading order, the first one
//! holding the question becomes the anchor, and what follows it (minus UI
//! chrome and nested duplicates) is taken as the reply.
//!
//! [`Extractor`] keeps these heuristics swappable per site without touching
//! the wait loop.

use super::snapshot::{PageProbe, TextElement};
use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;

/// Separator placed between reply fragments
pub const DEFAULT_DELIMITER: &str = "\n\n---\n\n";

/// Text that belongs to the page furniture, not to a reply
#[derive(Debug, Clone)]
pub enum ChromeFilter {
    /// Drops text containing the string anywhere
    Contains(String),
    /// Drops text equal to the string after trimming
    Exact(String),
    /// Drops text that begins with the string after trimming
    StartsWith(String),
    Pattern(Regex),
}

impl ChromeFilter {
    pub fn contains(s: impl Into<String>) -> Self {
        Self::Contains(s.into())
    }

    pub fn exact(s: impl Into<String>) -> Self {
        Self::Exact(s.into())
    }

    pub fn starts_with(s: impl Into<String>) -> Self {
        Self::StartsWith(s.into())
    }

    pub fn pattern(re: &str) -> Result<Self> {
        Regex::new(re)
            .map(Self::Pattern)
            .map_err(|e| Error::Config(format!("chrome pattern '{}': {}", re, e)))
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(s) => text.contains(s.as_str()),
            Self::Exact(s) => text.trim() == s.as_str(),
            Self::StartsWith(s) => text.trim_start().starts_with(s.as_str()),
            Self::Pattern(re) => re.is_match(text),
        }
    }
}

/// Thresholds and denylist for [`DomHeuristicExtractor`]
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Shorter elements are ignored
    pub min_text_chars: usize,
    /// Prefix length compared when dropping near-duplicates
    pub dedup_prefix_chars: usize,
    pub delimiter: String,
    pub chrome: Vec<ChromeFilter>,
    /// Denylist for the body-line fallback, where chrome shares lines with
    /// other text
    pub line_chrome: Vec<ChromeFilter>,
    pub anchor_chars: usize,
    pub candidate_chars: usize,
    /// Line fallback: lines this short or shorter are skipped
    pub min_line_chars: usize,
    pub max_lines: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_text_chars: 20,
            dedup_prefix_chars: 50,
            delimiter: DEFAULT_DELIMITER.to_string(),
            chrome: vec![
                ChromeFilter::contains("I am Claudia"),
                ChromeFilter::contains("Working on it"),
                ChromeFilter::contains("Ask me anything"),
                ChromeFilter::contains("Clear history"),
                ChromeFilter::contains("DEBUG"),
                ChromeFilter::contains("Copy"),
                ChromeFilter::exact("NetMind XYZ"),
            ],
            line_chrome: vec![
                ChromeFilter::contains("Working on it"),
                ChromeFilter::contains("Ask me anything"),
                ChromeFilter::contains("DEBUG"),
                ChromeFilter::contains("Clear history"),
                ChromeFilter::contains("Copy"),
                ChromeFilter::contains("NetMind XYZ"),
                ChromeFilter::starts_with("I am Claudia"),
            ],
            anchor_chars: 200,
            candidate_chars: 150,
            min_line_chars: 10,
            max_lines: 30,
        }
    }
}

impl ExtractionConfig {
    /// Adds a regex denylist entry used by both element and line extraction.
    pub fn with_chrome_pattern(mut self, re: &str) -> Result<Self> {
        let filter = ChromeFilter::pattern(re)?;
        self.line_chrome.push(filter.clone());
        self.chrome.push(filter);
        Ok(self)
    }
}

/// What the page says was asked and answered
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedConversation {
    pub user_question_text: Option<String>,
    pub agent_response_text: Option<String>,
    /// Every visible text element in reading order, truncated
    pub all_candidate_texts: Vec<String>,
}

impl ExtractedConversation {
    pub fn response(&self) -> Option<&str> {
        self.agent_response_text.as_deref()
    }

    /// The reply, or [`Error::ExtractionEmpty`].
    pub fn require_response(&self) -> Result<&str> {
        self.response().ok_or(Error::ExtractionEmpty)
    }
}

/// Turns page text into an [`ExtractedConversation`].
pub trait Extractor: Send + Sync {
    /// Extracts from element geometry. Never fails; a missing anchor gives an
    /// absent reply.
    fn extract(&self, question: &str, elements: &[TextElement]) -> ExtractedConversation;

    /// Recovers a reply from plain body text when element extraction found none.
    fn extract_from_lines(&self, question: &str, body_text: &str) -> Option<String>;
}

/// Default reading-order heuristic
#[derive(Debug, Clone, Default)]
pub struct DomHeuristicExtractor {
    config: ExtractionConfig,
}

impl DomHeuristicExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn is_chrome(&self, text: &str) -> bool {
        self.config.chrome.iter().any(|filter| filter.matches(text))
    }

    fn is_line_chrome(&self, line: &str) -> bool {
        self.config.line_chrome.iter().any(|filter| filter.matches(line))
    }

    fn is_duplicate(&self, text: &str, accepted: &[&str]) -> bool {
        let n = self.config.dedup_prefix_chars;
        let prefix = truncate_chars(text, n);
        accepted
            .iter()
            .any(|other| other.contains(prefix) || text.contains(truncate_chars(other, n)))
    }
}

impl Extractor for DomHeuristicExtractor {
    fn extract(&self, question: &str, elements: &[TextElement]) -> ExtractedConversation {
        let mut ordered: Vec<&TextElement> = elements
            .iter()
            .filter(|el| el.visible && el.has_area())
            .filter(|el| el.text.chars().count() >= self.config.min_text_chars)
            .collect();
        ordered.sort_by(|a, b| a.top.total_cmp(&b.top).then(a.left.total_cmp(&b.left)));

        let all_candidate_texts = ordered
            .iter()
            .map(|el| truncate_chars(&el.text, self.config.candidate_chars).to_string())
            .collect();

        let Some(anchor) = ordered.iter().position(|el| el.text.contains(question)) else {
            tracing::debug!("Question not found among {} text elements", ordered.len());
            return ExtractedConversation {
                all_candidate_texts,
                ..Default::default()
            };
        };

        let mut accepted: Vec<&str> = Vec::new();
        for el in &ordered[anchor + 1..] {
            let text = el.text.as_str();
            if self.is_chrome(text) || self.is_duplicate(text, &accepted) {
                continue;
            }
            accepted.push(text);
        }

        ExtractedConversation {
            user_question_text: Some(
                truncate_chars(&ordered[anchor].text, self.config.anchor_chars).to_string(),
            ),
            agent_response_text: (!accepted.is_empty())
                .then(|| accepted.join(self.config.delimiter.as_str())),
            all_candidate_texts,
        }
    }

    fn extract_from_lines(&self, question: &str, body_text: &str) -> Option<String> {
        let mut lines = body_text.lines().skip_while(|line| !line.contains(question));
        lines.next()?;

        let collected: Vec<&str> = lines
            .map(str::trim)
            .filter(|line| !line.contains(question))
            .filter(|line| line.chars().count() > self.config.min_line_chars)
            .filter(|line| !self.is_line_chrome(line))
            .take(self.config.max_lines)
            .collect();

        (!collected.is_empty()).then(|| collected.join("\n"))
    }
}

/// Runs element extraction against the live page, falling back to body lines.
pub async fn extract_conversation<P, E>(
    probe: &P,
    extractor: &E,
    question: &str,
) -> Result<ExtractedConversation>
where
    P: PageProbe + ?Sized,
    E: Extractor + ?Sized,
{
    let elements = probe.text_elements().await?;
    let mut conversation = extractor.extract(question, &elements);

    if conversation.agent_response_text.is_none() {
        let body = probe.snapshot().await?.body_text;
        conversation.agent_response_text = extractor.extract_from_lines(question, &body);
        if conversation.agent_response_text.is_some() {
            tracing::warn!("Element extraction found no reply; using body text lines");
        }
    }

    Ok(conversation)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
