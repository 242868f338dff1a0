//! Configuration types.

use chrono::FixedOffset;

use crate::channels::mail::MailAccount;
use crate::error::ConfigError;
use crate::ingest::RetentionPolicy;
use crate::parse::resolver::kst;

/// Core configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// SQLite database path.
    pub db_path: String,
    /// Port for the HTTP/WS boundary.
    pub bind_port: u16,
    /// Fixed calendar zone for temporal resolution — never the ambient
    /// system zone, so behavior is identical across machines.
    pub zone: FixedOffset,
    /// Retention windows for the maintenance sweeps.
    pub retention: RetentionPolicy,
    /// Configured IMAP accounts (consumed by the external mail transport).
    pub mail_accounts: Vec<MailAccount>,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/task-inbox.db".to_string(),
            bind_port: 8080,
            zone: kst(),
            retention: RetentionPolicy::default(),
            mail_accounts: Vec::new(),
        }
    }
}

impl InboxConfig {
    /// Build config from environment variables, with defaults for anything
    /// unset. A malformed zone offset is an error, not a silent fallback —
    /// temporal resolution must be deterministic.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path =
            std::env::var("TASK_INBOX_DB_PATH").unwrap_or(defaults.db_path);

        let bind_port: u16 = std::env::var("TASK_INBOX_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.bind_port);

        let zone = match std::env::var("TASK_INBOX_ZONE_OFFSET_HOURS") {
            Ok(raw) => {
                let hours: i32 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "TASK_INBOX_ZONE_OFFSET_HOURS".into(),
                    message: format!("not an integer: {raw}"),
                })?;
                FixedOffset::east_opt(hours * 3600).ok_or_else(|| ConfigError::InvalidValue {
                    key: "TASK_INBOX_ZONE_OFFSET_HOURS".into(),
                    message: format!("offset out of range: {hours}"),
                })?
            }
            Err(_) => defaults.zone,
        };

        let message_retention_days: i64 = std::env::var("TASK_INBOX_MESSAGE_RETENTION_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.retention.message_retention_days);

        let completed_task_retention_days: i64 =
            std::env::var("TASK_INBOX_COMPLETED_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retention.completed_task_retention_days);

        Ok(Self {
            db_path,
            bind_port,
            zone,
            retention: RetentionPolicy {
                message_retention_days,
                completed_task_retention_days,
            },
            mail_accounts: MailAccount::from_env(),
        })
    }
}
