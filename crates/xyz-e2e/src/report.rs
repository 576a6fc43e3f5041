// Share-link result record
//
// Written once per share-link run as pretty JSON next to the screenshots.

use crate::error::Result;
use crate::response::ReadinessSignal;
use crate::verify::VerificationResult;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const RECORD_FILE_NAME: &str = "share_link_response.json";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Serialize)]
pub struct ShareLinkRecord {
    pub question: String,
    pub response_time_seconds: f64,
    pub response_time_minutes: f64,
    pub response_ready: bool,
    pub readiness_signal: Option<ReadinessSignal>,
    pub response_content: Option<String>,
    pub verification: VerificationResult,
    /// Local time the run finished
    pub timestamp: String,
}

impl ShareLinkRecord {
    pub fn new(
        question: impl Into<String>,
        response_time: Duration,
        readiness_signal: Option<ReadinessSignal>,
        response_content: Option<String>,
        verification: VerificationResult,
    ) -> Self {
        let seconds = response_time.as_secs_f64();
        Self {
            question: question.into(),
            response_time_seconds: round2(seconds),
            response_time_minutes: round2(seconds / 60.0),
            response_ready: readiness_signal.is_some(),
            readiness_signal,
            response_content,
            verification,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Writes the record as `{dir}/share_link_response.json`.
    pub async fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(RECORD_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, json).await?;
        tracing::info!("Result record saved: {}", path.display());
        Ok(path)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{KNOWLEDGE_BASE_QUESTION, RuleBook};
    use serde_json::Value;

    #[tokio::test]
    async fn test_record_written_as_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let reply = "knowledge-base 檔案: hello.md";
        let record = ShareLinkRecord::new(
            KNOWLEDGE_BASE_QUESTION,
            Duration::from_millis(95_456),
            Some(ReadinessSignal::IndicatorCleared),
            Some(reply.to_string()),
            RuleBook::builtin().verify(KNOWLEDGE_BASE_QUESTION, Some(reply)),
        );

        let path = record.write_to_dir(&dir.path().join("shots")).await.unwrap();
        assert!(path.ends_with("shots/share_link_response.json"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("列出knowledge-base目錄下的檔案"));
        assert!(raw.contains("\n  \"question\""));

        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["response_time_seconds"], 95.46);
        assert_eq!(value["response_time_minutes"], 1.59);
        assert_eq!(value["response_ready"], true);
        assert_eq!(value["readiness_signal"], "IndicatorCleared");
        assert_eq!(value["verification"]["passed"], false);
        assert_eq!(value["timestamp"].as_str().unwrap().len(), 19);
    }

    #[test]
    fn test_absent_reply_serializes_as_null() {
        let record = ShareLinkRecord::new(
            "q",
            Duration::ZERO,
            None,
            None,
            RuleBook::new().verify("q", None),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["response_content"], Value::Null);
        assert_eq!(value["response_ready"], false);
        assert_eq!(value["verification"]["errors"][0], "未找到响应内容");
    }
}
