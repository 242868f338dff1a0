//! Channel adapters — convert channel-native payloads into ingestion items.
//!
//! Pure conversion, no I/O: the transports that fetch mail or capture
//! notifications live outside the core and feed these functions.

pub mod mail;
pub mod notify;

pub use mail::{MailAccount, MailAuth, MailProvider};
pub use notify::NotificationEvent;
