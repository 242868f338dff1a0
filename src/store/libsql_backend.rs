//! libSQL backend — async `TaskStore` implementation.
//!
//! Supports local file and in-memory databases. Timestamps are stored as
//! RFC 3339 text, enums as their lowercase string forms; unknown persisted
//! enum values are a query error, never silently coerced.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::{IngestWrite, TaskStore};
use crate::tasks::model::{DueBucket, RawMessage, Task, TaskSource, TaskStatus, TaskWithMessages};

/// libSQL task store backend.
///
/// A single connection is reused for all operations; `libsql::Connection` is
/// `Send + Sync`. Writes that span multiple statements take `write_lock` for
/// the duration of their transaction so concurrent ingestion flows cannot
/// interleave partial units.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: Mutex::new(()),
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Load the raw messages linked to a task, oldest first.
    async fn load_linked_messages(&self, task_id: Uuid) -> Result<Vec<RawMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS_QUALIFIED} FROM messages m
                     JOIN task_messages tm ON tm.message_id = m.id
                     WHERE tm.task_id = ?1
                     ORDER BY m.received_at ASC"
                ),
                params![task_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("linked_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("linked_messages next: {e}")))?
        {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    /// Run a task query and attach linked messages to every row.
    async fn query_tasks_with_messages(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> Result<Vec<TaskWithMessages>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, args)
            .await
            .map_err(|e| DatabaseError::Query(format!("list tasks: {e}")))?;

        let mut tasks = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list tasks next: {e}")))?
        {
            tasks.push(row_to_task(&row)?);
        }

        let mut result = Vec::with_capacity(tasks.len());
        for task in tasks {
            let messages = self.load_linked_messages(task.id).await?;
            result.push(TaskWithMessages { task, messages });
        }
        Ok(result)
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC)
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::Query(format!("invalid uuid {s}: {e}")))
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn col_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Query(format!("row decode: {e}"))
}

fn row_to_message(row: &libsql::Row) -> Result<RawMessage, DatabaseError> {
    let id: String = row.get(0).map_err(col_err)?;
    let account_str: String = row.get(1).map_err(col_err)?;
    let received_str: String = row.get(6).map_err(col_err)?;
    let ingested_str: String = row.get(7).map_err(col_err)?;

    Ok(RawMessage {
        id: parse_uuid(&id)?,
        account_type: TaskSource::parse_str(&account_str)
            .ok_or_else(|| DatabaseError::Query(format!("unknown account type: {account_str}")))?,
        source_message_id: row.get(2).map_err(col_err)?,
        subject: row.get(3).ok(),
        sender: row.get(4).ok(),
        body: row.get(5).map_err(col_err)?,
        received_at: parse_datetime(&received_str),
        ingested_at: parse_datetime(&ingested_str),
    })
}

fn row_to_task(row: &libsql::Row) -> Result<Task, DatabaseError> {
    let id: String = row.get(0).map_err(col_err)?;
    let due_str: Option<String> = row.get(3).ok();
    let bucket_str: String = row.get(4).map_err(col_err)?;
    let status_str: String = row.get(6).map_err(col_err)?;
    let source_str: String = row.get(7).map_err(col_err)?;
    let created_str: String = row.get(8).map_err(col_err)?;
    let updated_str: String = row.get(9).map_err(col_err)?;

    Ok(Task {
        id: parse_uuid(&id)?,
        title: row.get(1).map_err(col_err)?,
        description: row.get(2).map_err(col_err)?,
        due_at: parse_optional_datetime(&due_str),
        due_bucket: DueBucket::parse_str(&bucket_str)
            .ok_or_else(|| DatabaseError::Query(format!("unknown due bucket: {bucket_str}")))?,
        score: row.get(5).map_err(col_err)?,
        status: TaskStatus::parse_str(&status_str)
            .ok_or_else(|| DatabaseError::Query(format!("unknown status: {status_str}")))?,
        source: TaskSource::parse_str(&source_str)
            .ok_or_else(|| DatabaseError::Query(format!("unknown source: {source_str}")))?,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const TASK_COLUMNS: &str =
    "id, title, description, due_at, due_bucket, score, status, source, created_at, updated_at";

const MESSAGE_COLUMNS_QUALIFIED: &str =
    "m.id, m.account_type, m.source_message_id, m.subject, m.sender, m.body, m.received_at, m.ingested_at";

const MESSAGE_COLUMNS: &str =
    "id, account_type, source_message_id, subject, sender, body, received_at, ingested_at";

/// Ordering shared by every task listing: due time ascending, absent due last.
const TASK_ORDER: &str = "ORDER BY due_at ASC NULLS LAST, created_at ASC";

#[async_trait]
impl TaskStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    async fn record_ingest(
        &self,
        message: &RawMessage,
        task: &Task,
    ) -> Result<IngestWrite, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_ingest begin: {e}")))?;

        let inserted = tx
            .execute(
                "INSERT OR IGNORE INTO messages (id, account_type, source_message_id, subject,
                    sender, body, received_at, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.id.to_string(),
                    message.account_type.as_str(),
                    message.source_message_id.clone(),
                    opt_text(message.subject.as_deref()),
                    opt_text(message.sender.as_deref()),
                    message.body.clone(),
                    message.received_at.to_rfc3339(),
                    message.ingested_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("record_ingest message: {e}")))?;

        if inserted == 0 {
            tx.rollback()
                .await
                .map_err(|e| DatabaseError::Query(format!("record_ingest rollback: {e}")))?;
            debug!(
                account_type = message.account_type.as_str(),
                source_message_id = %message.source_message_id,
                "Duplicate raw message, ingest skipped"
            );
            return Ok(IngestWrite::DuplicateSkipped);
        }

        tx.execute(
            "INSERT INTO tasks (id, title, description, due_at, due_bucket, score, status,
                source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id.to_string(),
                task.title.clone(),
                task.description.clone(),
                opt_text_owned(task.due_at.map(|d| d.to_rfc3339())),
                task.due_bucket.as_str(),
                task.score,
                task.status.as_str(),
                task.source.as_str(),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_ingest task: {e}")))?;

        tx.execute(
            "INSERT INTO task_messages (task_id, message_id) VALUES (?1, ?2)",
            params![task.id.to_string(), message.id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("record_ingest linkage: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("record_ingest commit: {e}")))?;

        debug!(
            task_id = %task.id,
            message_id = %message.id,
            source = task.source.as_str(),
            "Ingest recorded"
        );
        Ok(IngestWrite::Recorded {
            message_id: message.id,
            task_id: task.id,
        })
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_task: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_task(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_task: {e}"))),
        }
    }

    async fn get_message_by_source(
        &self,
        account_type: TaskSource,
        source_message_id: &str,
    ) -> Result<Option<RawMessage>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE account_type = ?1 AND source_message_id = ?2"
                ),
                params![account_type.as_str(), source_message_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_message_by_source: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_message(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_message_by_source: {e}"))),
        }
    }

    async fn list_by_bucket(
        &self,
        bucket: DueBucket,
    ) -> Result<Vec<TaskWithMessages>, DatabaseError> {
        self.query_tasks_with_messages(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE due_bucket = ?1 {TASK_ORDER}"),
            params![bucket.as_str()],
        )
        .await
    }

    async fn list_by_status(
        &self,
        status: TaskStatus,
    ) -> Result<Vec<TaskWithMessages>, DatabaseError> {
        self.query_tasks_with_messages(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status = ?1 {TASK_ORDER}"),
            params![status.as_str()],
        )
        .await
    }

    async fn list_open(&self) -> Result<Vec<TaskWithMessages>, DatabaseError> {
        self.query_tasks_with_messages(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE status != ?1 {TASK_ORDER}"),
            params![TaskStatus::Completed.as_str()],
        )
        .await
    }

    async fn complete_task(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE tasks SET status = ?1, updated_at = ?2
                 WHERE id = ?3 AND status != ?1",
                params![TaskStatus::Completed.as_str(), now, id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("complete_task: {e}")))?;

        if changed > 0 {
            debug!(task_id = %id, "Task completed");
        } else {
            debug!(task_id = %id, "Complete was a no-op (missing or terminal)");
        }
        Ok(changed > 0)
    }

    async fn linked_messages(&self, task_id: Uuid) -> Result<Vec<RawMessage>, DatabaseError> {
        self.load_linked_messages(task_id).await
    }

    async fn prune_messages(
        &self,
        received_before: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let deleted = self
            .conn()
            .execute(
                "DELETE FROM messages WHERE received_at < ?1",
                params![received_before.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_messages: {e}")))?;

        debug!(deleted, "Pruned raw messages");
        Ok(deleted as usize)
    }

    async fn prune_completed_tasks(
        &self,
        updated_before: DateTime<Utc>,
    ) -> Result<usize, DatabaseError> {
        let _guard = self.write_lock.lock().await;

        let deleted = self
            .conn()
            .execute(
                "DELETE FROM tasks WHERE updated_at < ?1 AND status = ?2",
                params![
                    updated_before.to_rfc3339(),
                    TaskStatus::Completed.as_str()
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_completed_tasks: {e}")))?;

        debug!(deleted, "Pruned completed tasks");
        Ok(deleted as usize)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
