//! Mail channel — converts raw RFC 822 payloads into ingestion items.
//!
//! The IMAP transport itself lives in an external collaborator; it hands the
//! core raw message payloads plus the account they came from. Two provider
//! profiles are supported: Gmail over XOAUTH2 and Naver over an app password.

use chrono::{DateTime, TimeZone, Utc};
use mail_parser::MessageParser;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ChannelError;
use crate::ingest::types::IncomingItem;
use crate::tasks::model::TaskSource;

/// Per-sync window: only the most recent messages are normalized into tasks,
/// to keep the footprint low on large inboxes.
pub const SYNC_BATCH_LIMIT: usize = 10;

/// Supported IMAP providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailProvider {
    /// Gmail — OAuth2 access token over XOAUTH2.
    Gmail,
    /// Naver — app password over plain login.
    Naver,
}

impl MailProvider {
    pub fn source(&self) -> TaskSource {
        match self {
            Self::Gmail => TaskSource::Gmail,
            Self::Naver => TaskSource::Naver,
        }
    }

    pub fn imap_host(&self) -> &'static str {
        match self {
            Self::Gmail => "imap.gmail.com",
            Self::Naver => "imap.naver.com",
        }
    }

    pub fn imap_port(&self) -> u16 {
        993
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "gmail" => Some(Self::Gmail),
            "naver" => Some(Self::Naver),
            _ => None,
        }
    }
}

/// Credentials the external IMAP transport authenticates with.
#[derive(Debug, Clone)]
pub enum MailAuth {
    /// Raw SASL XOAUTH2 initial response (transport applies base64).
    XOAuth2(String),
    /// LOGIN with username and app password.
    Login { username: String, password: String },
}

/// One configured mailbox.
#[derive(Debug, Clone)]
pub struct MailAccount {
    pub provider: MailProvider,
    pub username: String,
    /// Access token (Gmail) or app password (Naver).
    pub credential: SecretString,
}

impl MailAccount {
    /// Build the auth material for the transport collaborator.
    pub fn auth(&self) -> MailAuth {
        match self.provider {
            MailProvider::Gmail => MailAuth::XOAuth2(format!(
                "user={}\u{1}auth=Bearer {}\u{1}\u{1}",
                self.username,
                self.credential.expose_secret(),
            )),
            MailProvider::Naver => MailAuth::Login {
                username: self.username.clone(),
                password: self.credential.expose_secret().to_string(),
            },
        }
    }

    /// Configured accounts from environment variables. An account is enabled
    /// when both its user and credential variables are set.
    pub fn from_env() -> Vec<MailAccount> {
        let mut accounts = Vec::new();
        if let (Ok(username), Ok(token)) = (
            std::env::var("TASK_INBOX_GMAIL_USER"),
            std::env::var("TASK_INBOX_GMAIL_TOKEN"),
        ) {
            accounts.push(MailAccount {
                provider: MailProvider::Gmail,
                username,
                credential: SecretString::from(token),
            });
        }
        if let (Ok(username), Ok(password)) = (
            std::env::var("TASK_INBOX_NAVER_USER"),
            std::env::var("TASK_INBOX_NAVER_PASSWORD"),
        ) {
            accounts.push(MailAccount {
                provider: MailProvider::Naver,
                username,
                credential: SecretString::from(password),
            });
        }
        accounts
    }
}

/// The IMAP sequence window for one sync: the most recent `SYNC_BATCH_LIMIT`
/// messages of a mailbox holding `message_count` (1-based, inclusive).
pub fn sync_window(message_count: usize) -> std::ops::RangeInclusive<usize> {
    message_count.saturating_sub(SYNC_BATCH_LIMIT - 1).max(1)..=message_count
}

/// Convert one raw RFC 822 payload into an ingestion item.
///
/// `uid` is the channel-native message identifier; `fallback_received` is
/// used when the message carries no parseable Date header.
pub fn to_incoming(
    source: TaskSource,
    uid: &str,
    raw: &[u8],
    fallback_received: DateTime<Utc>,
) -> Result<IncomingItem, ChannelError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ChannelError::InvalidMessage(format!("unparseable mail payload ({uid})")))?;

    let subject = parsed.subject().map(|s| s.to_string());
    let sender = extract_sender(&parsed);
    let body = extract_text(&parsed);
    let received_at = parsed
        .date()
        .and_then(|d| Utc.timestamp_opt(d.to_timestamp(), 0).single())
        .unwrap_or(fallback_received);

    Ok(IncomingItem {
        account_type: source,
        source_message_id: format!("{}-{}", source.as_str(), uid),
        subject,
        sender,
        body,
        received_at,
    })
}

/// Extract the sender address from a parsed email.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
}

/// Extract readable text from a parsed email, falling back to stripped HTML.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Drop tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MAIL: &str = "From: Boss <boss@example.com>\r\n\
        To: me@example.com\r\n\
        Subject: =?utf-8?B?7ZqM7J2YIOyViOuCtA==?=\r\n\
        Date: Wed, 01 May 2024 09:00:00 +0900\r\n\
        Content-Type: text/plain; charset=utf-8\r\n\
        \r\n\
        내일 오후 2시까지 검토\r\n";

    #[test]
    fn parses_subject_sender_body_and_date() {
        let item = to_incoming(TaskSource::Gmail, "42", SAMPLE_MAIL.as_bytes(), Utc::now()).unwrap();
        assert_eq!(item.account_type, TaskSource::Gmail);
        assert_eq!(item.source_message_id, "gmail-42");
        assert_eq!(item.subject.as_deref(), Some("회의 안내"));
        assert_eq!(item.sender.as_deref(), Some("boss@example.com"));
        assert!(item.body.contains("검토"));
        // Date header wins over the fallback: 09:00 KST = 00:00 UTC.
        assert_eq!(
            item.received_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn html_only_mail_is_stripped_to_text() {
        let mail = "From: a@b.com\r\n\
            Subject: hi\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            \r\n\
            <p>Review <b>tomorrow</b></p>\r\n";
        let item = to_incoming(TaskSource::Naver, "7", mail.as_bytes(), Utc::now()).unwrap();
        assert_eq!(item.source_message_id, "naver-7");
        assert!(item.body.contains("Review"));
        assert!(item.body.contains("tomorrow"));
        assert!(!item.body.contains('<'));
    }

    #[test]
    fn unparseable_payload_is_a_channel_error() {
        let result = to_incoming(TaskSource::Gmail, "1", &[], Utc::now());
        assert!(result.is_err());
    }

    #[test]
    fn missing_date_uses_fallback() {
        let mail = "From: a@b.com\r\nSubject: hi\r\n\r\nbody\r\n";
        let fallback = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let item = to_incoming(TaskSource::Gmail, "9", mail.as_bytes(), fallback).unwrap();
        assert_eq!(item.received_at, fallback);
    }

    #[test]
    fn sync_window_covers_the_last_ten() {
        assert_eq!(sync_window(100), 91..=100);
        assert_eq!(sync_window(10), 1..=10);
        assert_eq!(sync_window(3), 1..=3);
        assert_eq!(sync_window(1), 1..=1);
    }

    #[test]
    fn gmail_auth_is_xoauth2() {
        let account = MailAccount {
            provider: MailProvider::Gmail,
            username: "me@gmail.com".into(),
            credential: SecretString::from("token123"),
        };
        match account.auth() {
            MailAuth::XOAuth2(sasl) => {
                assert_eq!(sasl, "user=me@gmail.com\u{1}auth=Bearer token123\u{1}\u{1}");
            }
            other => panic!("expected XOAuth2, got {other:?}"),
        }
    }

    #[test]
    fn naver_auth_is_login() {
        let account = MailAccount {
            provider: MailProvider::Naver,
            username: "me".into(),
            credential: SecretString::from("app-pass"),
        };
        match account.auth() {
            MailAuth::Login { username, password } => {
                assert_eq!(username, "me");
                assert_eq!(password, "app-pass");
            }
            other => panic!("expected Login, got {other:?}"),
        }
    }

    #[test]
    fn provider_profiles() {
        assert_eq!(MailProvider::Gmail.source(), TaskSource::Gmail);
        assert_eq!(MailProvider::Naver.source(), TaskSource::Naver);
        assert_eq!(MailProvider::Gmail.imap_host(), "imap.gmail.com");
        assert_eq!(MailProvider::Naver.imap_host(), "imap.naver.com");
        assert_eq!(MailProvider::parse_str("gmail"), Some(MailProvider::Gmail));
        assert_eq!(MailProvider::parse_str("outlook"), None);
    }

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
        assert_eq!(strip_html("No HTML here"), "No HTML here");
        assert_eq!(strip_html(""), "");
    }
}
