//! Task data model — normalized tasks, raw messages, and their enums.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Originating channel of a raw message (and the task derived from it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    Gmail,
    Naver,
    Sms,
    Kakao,
    Ocr,
    Other,
}

impl TaskSource {
    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gmail => "gmail",
            Self::Naver => "naver",
            Self::Sms => "sms",
            Self::Kakao => "kakao",
            Self::Ocr => "ocr",
            Self::Other => "other",
        }
    }

    /// Parse the persisted string form. Unknown values are rejected, not coerced.
    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "gmail" => Some(Self::Gmail),
            "naver" => Some(Self::Naver),
            "sms" => Some(Self::Sms),
            "kakao" => Some(Self::Kakao),
            "ocr" => Some(Self::Ocr),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Task lifecycle status.
///
/// Derived once from the relevance score at creation; the only transition
/// afterwards is into `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Review,
    Snoozed,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Review => "review",
            Self::Snoozed => "snoozed",
            Self::Completed => "completed",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "review" => Some(Self::Review),
            "snoozed" => Some(Self::Snoozed),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Coarse due-date classification used to group tasks for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueBucket {
    Today,
    Week,
    Month,
}

impl DueBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "today" => Some(Self::Today),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            _ => None,
        }
    }

    /// Classify a due instant relative to a reference instant.
    ///
    /// Uses the whole-day difference between the two *calendar dates* in the
    /// zone both values carry, so a due time earlier today still lands in
    /// `Today`. An item with no due instant at all belongs in `Month`; callers
    /// handle the absent case (see `TaskNormalizer`).
    pub fn classify(due: DateTime<FixedOffset>, reference: DateTime<FixedOffset>) -> Self {
        let days = (due.date_naive() - reference.date_naive()).num_days();
        if days <= 0 {
            Self::Today
        } else if days <= 7 {
            Self::Week
        } else {
            Self::Month
        }
    }
}

/// A normalized, actionable task derived from one raw message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique ID.
    pub id: Uuid,
    /// Short title, bounded at 80 chars.
    pub title: String,
    /// Longer description, bounded at 4000 chars.
    pub description: String,
    /// Absolute resolved deadline, absent when no temporal cue was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// Due-date bucket.
    pub due_bucket: DueBucket,
    /// Urgency/actionability score in [0, 1].
    pub score: f64,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Originating channel.
    pub source: TaskSource,
    /// When the task was created (the ingestion reference instant).
    pub created_at: DateTime<Utc>,
    /// When the task was last updated.
    pub updated_at: DateTime<Utc>,
}

/// An immutable record of one inbound fragment, persisted before normalization.
///
/// `(account_type, source_message_id)` uniquely identifies the source payload;
/// the store ignores re-inserts of the same pair, which makes mailbox
/// re-polling and notification replay idempotent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Unique ID.
    pub id: Uuid,
    /// Originating channel.
    pub account_type: TaskSource,
    /// Channel-native identifier (IMAP sequence id, notification key, OCR id).
    pub source_message_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub body: String,
    /// When the source channel received the fragment.
    pub received_at: DateTime<Utc>,
    /// When the store recorded it.
    pub ingested_at: DateTime<Utc>,
}

/// A task together with the raw messages that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskWithMessages {
    pub task: Task,
    pub messages: Vec<RawMessage>,
}
