//! Persistence layer — libSQL-backed storage for messages, tasks, and linkage.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{IngestWrite, TaskStore};
