//! `TaskStore` trait — single async interface for all persistence.
//!
//! The handle is constructed by the process composition root and passed by
//! `Arc` into every ingestion and query call; there is no global instance.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::tasks::model::{DueBucket, RawMessage, Task, TaskSource, TaskStatus, TaskWithMessages};

/// Result of the three-table ingestion write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestWrite {
    /// Message, task, and linkage were all committed.
    Recorded { message_id: Uuid, task_id: Uuid },
    /// The `(account_type, source_message_id)` pair already existed; nothing
    /// was written.
    DuplicateSkipped,
}

/// Backend-agnostic task persistence.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Atomically insert a raw message, its derived task, and the linkage row.
    ///
    /// Insert-or-ignore on the message dedup key: a duplicate skips the whole
    /// unit. Either all three rows are committed or none are.
    async fn record_ingest(
        &self,
        message: &RawMessage,
        task: &Task,
    ) -> Result<IngestWrite, DatabaseError>;

    /// Get a task by ID.
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError>;

    /// Look up a raw message by its channel-native dedup key.
    async fn get_message_by_source(
        &self,
        account_type: TaskSource,
        source_message_id: &str,
    ) -> Result<Option<RawMessage>, DatabaseError>;

    /// Tasks in a bucket with their linked messages, due time ascending,
    /// absent due sorted last.
    async fn list_by_bucket(
        &self,
        bucket: DueBucket,
    ) -> Result<Vec<TaskWithMessages>, DatabaseError>;

    /// Tasks with a given status, same ordering as `list_by_bucket`.
    async fn list_by_status(
        &self,
        status: TaskStatus,
    ) -> Result<Vec<TaskWithMessages>, DatabaseError>;

    /// Open (non-completed) tasks, same ordering. Feeds the sync snapshot for
    /// live subscribers.
    async fn list_open(&self) -> Result<Vec<TaskWithMessages>, DatabaseError>;

    /// Mark a task completed. Only transitions non-terminal statuses and bumps
    /// `updated_at`. Unknown id or already-completed task: no mutation,
    /// returns `false`.
    async fn complete_task(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Raw messages linked to a task, oldest first.
    async fn linked_messages(&self, task_id: Uuid) -> Result<Vec<RawMessage>, DatabaseError>;

    /// Delete raw messages received before the cutoff. Returns the count.
    async fn prune_messages(&self, received_before: DateTime<Utc>)
        -> Result<usize, DatabaseError>;

    /// Delete tasks that are COMPLETED and stale (updated before the cutoff).
    /// Pending/review/snoozed tasks are never pruned by age. Returns the count.
    async fn prune_completed_tasks(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, DatabaseError>;
}
