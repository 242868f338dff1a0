//! Notification channel — converts captured device notifications into
//! ingestion items.
//!
//! The notification listener itself runs on the device; it forwards each
//! posted notification's package name, key, and text extras. Package names
//! classify the source; packages that match nothing are dropped without
//! touching the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ingest::types::IncomingItem;
use crate::tasks::model::TaskSource;

/// A captured device notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    /// Posting app's package name.
    pub package: String,
    /// OS-assigned notification key, stable across updates of the same
    /// notification — the dedup id for replays.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub big_text: Option<String>,
    /// When the notification was posted.
    pub posted_at: DateTime<Utc>,
}

/// Classify a package name into a task source.
///
/// SMS and KakaoTalk apps map to their own sources; mail apps are captured as
/// OTHER (their mailboxes are synced properly over IMAP, the notification is
/// just a fallback). Anything else is not captured.
pub fn classify_package(package: &str) -> Option<TaskSource> {
    let lower = package.to_lowercase();
    if lower.contains("sms") {
        Some(TaskSource::Sms)
    } else if lower.contains("kakao") {
        Some(TaskSource::Kakao)
    } else if lower.contains("mail") {
        Some(TaskSource::Other)
    } else {
        None
    }
}

/// Convert a notification into an ingestion item.
///
/// Title and text are both required; notifications without them carry nothing
/// worth normalizing. The body joins title, text, and big text.
pub fn to_incoming(event: &NotificationEvent) -> Option<IncomingItem> {
    let source = classify_package(&event.package)?;
    let title = event.title.as_deref()?;
    let text = event.text.as_deref()?;

    let body = [Some(title), Some(text), event.big_text.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

    Some(IncomingItem {
        account_type: source,
        source_message_id: format!("{}-{}", source.as_str(), event.key),
        subject: Some(title.to_string()),
        sender: None,
        body,
        received_at: event.posted_at,
    })
}
