//! Reply verification
//!
//! A [`VerificationRule`] describes what a good reply to one question looks
//! like. Rules are looked up by the literal question in a [`RuleBook`].
//! Every check runs and is recorded; there is no short-circuit.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;

/// Question used by the share-link scenario
pub const KNOWLEDGE_BASE_QUESTION: &str = "列出knowledge-base目錄下的檔案";

/// Failure recorded when there is no reply to check
pub const MISSING_RESPONSE: &str = "未找到响应内容";

const NO_RULE: &str = "未找到验证规则，跳过验证";

/// Expectations for the reply to one question
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VerificationRule {
    /// Each must appear (case-insensitive)
    pub required_keywords: Vec<String>,
    /// None may appear (case-insensitive)
    pub exclude_keywords: Vec<String>,
    pub expected_substring: Option<String>,
    /// In characters
    pub minimum_length: usize,
}

impl VerificationRule {
    pub fn new(minimum_length: usize) -> Self {
        Self {
            minimum_length,
            ..Default::default()
        }
    }

    pub fn require<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keywords
            .extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn expect(mut self, substring: impl Into<String>) -> Self {
        self.expected_substring = Some(substring.into());
        self
    }

    /// Applies every check to `text`. Absent text fails with a single
    /// [`MISSING_RESPONSE`] entry.
    pub fn evaluate(&self, text: Option<&str>) -> VerificationResult {
        let mut result = VerificationResult::default();

        let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
            result.failures.push(MISSING_RESPONSE.to_string());
            return result.finish();
        };

        let haystack = text.to_lowercase();
        let has = |needle: &str| haystack.contains(&needle.to_lowercase());

        let length = text.chars().count();
        if length >= self.minimum_length {
            result.satisfied_checks.push("响应长度符合要求".to_string());
        } else {
            result
                .failures
                .push(format!("响应长度不足: {} < {}", length, self.minimum_length));
        }

        for keyword in &self.required_keywords {
            if has(keyword.as_str()) {
                result.satisfied_checks.push(format!("包含关键词: {}", keyword));
            } else {
                result.failures.push(format!("缺少关键词: {}", keyword));
            }
        }

        let found: Vec<&String> = self.exclude_keywords.iter().filter(|k| has(k.as_str())).collect();
        if found.is_empty() {
            result.satisfied_checks.push("未包含错误关键词".to_string());
        }
        for keyword in found {
            result.failures.push(format!("包含错误关键词: {}", keyword));
        }

        if let Some(expected) = &self.expected_substring {
            if has(expected.as_str()) {
                result.satisfied_checks.push(format!("包含预期内容: {}", expected));
            } else {
                result.failures.push(format!("未找到预期内容: {}", expected));
            }
        }

        result.finish()
    }
}

/// Outcome of applying a rule to a reply
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VerificationResult {
    /// True iff `failures` is empty
    pub passed: bool,
    #[serde(rename = "checks")]
    pub satisfied_checks: Vec<String>,
    #[serde(rename = "errors")]
    pub failures: Vec<String>,
}

impl VerificationResult {
    fn finish(mut self) -> Self {
        self.passed = self.failures.is_empty();
        self
    }

    /// Passing result used when a question has no rule.
    pub fn skipped() -> Self {
        Self {
            passed: true,
            satisfied_checks: vec![NO_RULE.to_string()],
            failures: Vec::new(),
        }
    }

    /// [`Error::VerificationFailed`] carrying the failures, if any.
    pub fn into_result(self) -> Result<Self> {
        if self.passed {
            Ok(self)
        } else {
            Err(Error::VerificationFailed(self.failures))
        }
    }
}

/// Rules keyed by the literal question text
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: HashMap<String, VerificationRule>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules for the questions the suite asks.
    pub fn builtin() -> Self {
        Self::new().with_rule(
            KNOWLEDGE_BASE_QUESTION,
            VerificationRule::new(50)
                .require(["knowledge-base", "檔案", "hello.md"])
                .expect("hello.md")
                .exclude(["错误", "error", "无法", "失败"]),
        )
    }

    pub fn with_rule(mut self, question: impl Into<String>, rule: VerificationRule) -> Self {
        self.rules.insert(question.into(), rule);
        self
    }

    pub fn get(&self, question: &str) -> Option<&VerificationRule> {
        self.rules.get(question)
    }

    /// Verifies the reply to `question`. Questions without a rule pass, but
    /// absent or blank text still fails.
    pub fn verify(&self, question: &str, text: Option<&str>) -> VerificationResult {
        let text = text.filter(|t| !t.trim().is_empty());
        match (self.get(question), text) {
            (Some(rule), _) => rule.evaluate(text),
            (None, None) => VerificationRule::default().evaluate(None),
            (None, Some(_)) => {
                tracing::warn!("No verification rule for '{}', skipping", question);
                VerificationResult::skipped()
            }
        }
    }
}
