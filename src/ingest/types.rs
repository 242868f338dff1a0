//! Shared types for the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tasks::model::{Task, TaskSource};

/// Unified inbound item from any channel.
///
/// Channel adapters convert their native format (parsed mail, notification
/// event, confirmed OCR draft) into this struct; the coordinator treats all
/// of them identically from here on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingItem {
    /// Originating channel.
    pub account_type: TaskSource,
    /// Channel-native identifier, unique within the channel.
    pub source_message_id: String,
    /// Subject line (mail) or notification title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Sender identifier, when the channel has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// Raw text body.
    pub body: String,
    /// When the channel received the fragment. Doubles as the reference
    /// instant for relative date resolution.
    pub received_at: DateTime<Utc>,
}

impl IncomingItem {
    /// Title handed to the normalizer: the subject when present, otherwise
    /// the body (which the normalizer bounds to the title limit).
    pub fn derived_title(&self) -> &str {
        self.subject.as_deref().unwrap_or(&self.body)
    }
}

/// Outcome of ingesting one item.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// A new task was created and linked.
    Created(Task),
    /// The item's dedup key was already present; nothing was written.
    Skipped,
}

impl IngestOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Skipped => "skipped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(subject: Option<&str>) -> IncomingItem {
        IncomingItem {
            account_type: TaskSource::Sms,
            source_message_id: "sms-1".into(),
            subject: subject.map(String::from),
            sender: None,
            body: "본문 내용".into(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn derived_title_prefers_subject() {
        assert_eq!(item(Some("제목")).derived_title(), "제목");
        assert_eq!(item(None).derived_title(), "본문 내용");
    }

    #[test]
    fn item_serde_roundtrip() {
        let json = serde_json::to_string(&item(Some("제목"))).unwrap();
        let parsed: IncomingItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.account_type, TaskSource::Sms);
        assert_eq!(parsed.source_message_id, "sms-1");
    }

    #[test]
    fn item_serde_omits_absent_fields() {
        let json = serde_json::to_string(&item(None)).unwrap();
        assert!(!json.contains("\"subject\""));
        assert!(!json.contains("\"sender\""));
    }
}
