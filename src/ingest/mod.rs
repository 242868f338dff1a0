//! Ingestion coordinator — dedup, persist, normalize, link, publish.
//!
//! One coordinator serves every channel; mail sync, notification capture, and
//! OCR confirmation all funnel through `ingest()`. The store provides the
//! atomic three-table write; the coordinator adds normalization in front and
//! feed publication behind.

pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::parse::normalizer::{NormalizeOverrides, TaskNormalizer};
use crate::parse::ocr::{OcrParser, TaskDraft};
use crate::store::traits::{IngestWrite, TaskStore};
use crate::tasks::feed::{TaskEvent, TaskFeed};
use crate::tasks::model::{RawMessage, TaskSource};

pub use types::{IncomingItem, IngestOutcome};

/// Retention windows applied by `run_retention`.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Raw messages older than this are deleted.
    pub message_retention_days: i64,
    /// Completed tasks stale for longer than this are deleted.
    pub completed_task_retention_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            message_retention_days: 30,
            completed_task_retention_days: 14,
        }
    }
}

/// Counts from one retention sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionReport {
    pub messages_deleted: usize,
    pub tasks_deleted: usize,
}

/// Per-item ingestion pipeline shared by all channels.
pub struct IngestCoordinator {
    store: Arc<dyn TaskStore>,
    feed: Arc<TaskFeed>,
    normalizer: TaskNormalizer,
    ocr: OcrParser,
}

impl IngestCoordinator {
    /// Build a coordinator resolving times in the given fixed zone.
    pub fn new(store: Arc<dyn TaskStore>, feed: Arc<TaskFeed>, zone: FixedOffset) -> Self {
        Self {
            store,
            feed,
            normalizer: TaskNormalizer::new(zone),
            ocr: OcrParser::new(zone),
        }
    }

    /// Ingest one raw item: dedup, persist the message, normalize, insert the
    /// task, link the two. A duplicate dedup key skips the whole item.
    pub async fn ingest(&self, item: IncomingItem) -> Result<IngestOutcome> {
        self.ingest_with(item, NormalizeOverrides::default()).await
    }

    /// Ingest with pre-computed normalization values (OCR confirm flow).
    async fn ingest_with(
        &self,
        item: IncomingItem,
        overrides: NormalizeOverrides,
    ) -> Result<IngestOutcome> {
        let task = self.normalizer.normalize_with(
            item.derived_title(),
            &item.body,
            item.account_type,
            item.received_at,
            overrides,
        );
        let message = RawMessage {
            id: Uuid::new_v4(),
            account_type: item.account_type,
            source_message_id: item.source_message_id,
            subject: item.subject,
            sender: item.sender,
            body: item.body,
            received_at: item.received_at,
            ingested_at: Utc::now(),
        };

        match self.store.record_ingest(&message, &task).await? {
            IngestWrite::Recorded { task_id, .. } => {
                info!(
                    task_id = %task_id,
                    source = task.source.as_str(),
                    bucket = task.due_bucket.as_str(),
                    status = task.status.as_str(),
                    score = task.score,
                    "Task created from ingest"
                );
                self.feed.publish(TaskEvent::TaskCreated { task: task.clone() });
                Ok(IngestOutcome::Created(task))
            }
            IngestWrite::DuplicateSkipped => {
                debug!(
                    source = message.account_type.as_str(),
                    source_message_id = %message.source_message_id,
                    "Item already ingested, skipped"
                );
                Ok(IngestOutcome::Skipped)
            }
        }
    }

    /// Parse OCR text into an editable draft. Pure preview — nothing persists.
    pub fn preview_ocr(&self, text: &str, now: DateTime<Utc>) -> TaskDraft {
        self.ocr.parse(text, now)
    }

    /// Ingest a confirmed (possibly user-edited) OCR draft.
    ///
    /// The draft's due/score/bucket are taken as-is so user edits in the
    /// review UI survive normalization; a synthetic source id makes each
    /// confirmation its own raw message.
    pub async fn ingest_ocr_draft(
        &self,
        draft: TaskDraft,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome> {
        let item = IncomingItem {
            account_type: TaskSource::Ocr,
            source_message_id: format!("ocr-{}", Uuid::new_v4()),
            subject: Some(draft.title.clone()),
            sender: None,
            body: draft.description.clone(),
            received_at: now,
        };
        self.ingest_with(
            item,
            NormalizeOverrides {
                resolved_due: draft.due_at,
                score: Some(draft.score),
                bucket: Some(draft.bucket),
            },
        )
        .await
    }

    /// Mark a task completed and publish the event. Missing or already
    /// completed tasks are a quiet no-op.
    pub async fn complete_task(&self, id: Uuid) -> Result<bool> {
        let completed = self.store.complete_task(id).await?;
        if completed {
            self.feed.publish(TaskEvent::TaskCompleted { id });
        }
        Ok(completed)
    }
}

/// Apply both retention sweeps. Invoked by external scheduling; the core
/// never runs this on a timer of its own.
pub async fn run_retention(
    store: &dyn TaskStore,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<RetentionReport> {
    let message_cutoff = now - Duration::days(policy.message_retention_days);
    let task_cutoff = now - Duration::days(policy.completed_task_retention_days);

    let messages_deleted = store.prune_messages(message_cutoff).await?;
    let tasks_deleted = store.prune_completed_tasks(task_cutoff).await?;

    info!(messages_deleted, tasks_deleted, "Retention sweep complete");
    Ok(RetentionReport {
        messages_deleted,
        tasks_deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::resolver::kst;
    use crate::store::LibSqlBackend;
    use crate::tasks::model::{DueBucket, TaskStatus};
    use chrono::TimeZone;

    async fn coordinator() -> (IngestCoordinator, Arc<dyn TaskStore>, Arc<TaskFeed>) {
        let store: Arc<dyn TaskStore> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let feed = TaskFeed::new();
        let coordinator = IngestCoordinator::new(Arc::clone(&store), Arc::clone(&feed), kst());
        (coordinator, store, feed)
    }

    fn korean_meeting_item() -> IncomingItem {
        IncomingItem {
            account_type: TaskSource::Gmail,
            source_message_id: "m1".into(),
            subject: Some("회의 일정".into()),
            sender: Some("boss@example.com".into()),
            body: "내일 오후 2시까지 검토 부탁드립니다".into(),
            received_at: kst()
                .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[tokio::test]
    async fn end_to_end_korean_meeting_email() {
        let (coordinator, store, _feed) = coordinator().await;

        let outcome = coordinator.ingest(korean_meeting_item()).await.unwrap();
        let task = match outcome {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => panic!("expected a created task"),
        };

        let expected_due = kst().with_ymd_and_hms(2024, 5, 2, 14, 0, 0).unwrap();
        assert_eq!(task.due_at.unwrap(), expected_due.with_timezone(&Utc));
        assert_eq!(task.due_bucket, DueBucket::Week);
        assert_eq!(task.score, 1.0);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.title, "회의 일정");

        // Message, task, and linkage all landed.
        let message = store
            .get_message_by_source(TaskSource::Gmail, "m1")
            .await
            .unwrap()
            .unwrap();
        let linked = store.linked_messages(task.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, message.id);
    }

    #[tokio::test]
    async fn end_to_end_no_cues() {
        let (coordinator, _store, _feed) = coordinator().await;

        let item = IncomingItem {
            account_type: TaskSource::Other,
            source_message_id: "x1".into(),
            subject: None,
            sender: None,
            body: "hello".into(),
            received_at: Utc::now(),
        };
        let outcome = coordinator.ingest(item).await.unwrap();
        let task = match outcome {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => panic!("expected a created task"),
        };

        assert!(task.due_at.is_none());
        assert_eq!(task.due_bucket, DueBucket::Month);
        assert_eq!(task.score, 0.0);
        assert_eq!(task.status, TaskStatus::Snoozed);
        assert_eq!(task.title, "hello");
    }

    #[tokio::test]
    async fn re_ingest_is_idempotent() {
        let (coordinator, store, _feed) = coordinator().await;

        let first = coordinator.ingest(korean_meeting_item()).await.unwrap();
        assert!(matches!(first, IngestOutcome::Created(_)));

        let second = coordinator.ingest(korean_meeting_item()).await.unwrap();
        assert!(matches!(second, IngestOutcome::Skipped));

        assert_eq!(store.list_by_status(TaskStatus::Pending).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn re_ingest_never_resurrects_a_completed_task() {
        let (coordinator, store, _feed) = coordinator().await;

        let task = match coordinator.ingest(korean_meeting_item()).await.unwrap() {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => unreachable!(),
        };
        assert!(coordinator.complete_task(task.id).await.unwrap());

        // Replaying the same source item is dropped outright.
        let replay = coordinator.ingest(korean_meeting_item()).await.unwrap();
        assert!(matches!(replay, IngestOutcome::Skipped));

        let reloaded = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, TaskStatus::Completed);
        assert!(store.list_open().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ingest_publishes_task_created_event() {
        let (coordinator, _store, feed) = coordinator().await;
        let mut rx = feed.subscribe();

        coordinator.ingest(korean_meeting_item()).await.unwrap();

        match rx.recv().await.unwrap() {
            TaskEvent::TaskCreated { task } => assert_eq!(task.title, "회의 일정"),
            other => panic!("expected TaskCreated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn complete_publishes_event_only_on_transition() {
        let (coordinator, _store, feed) = coordinator().await;
        let task = match coordinator.ingest(korean_meeting_item()).await.unwrap() {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => unreachable!(),
        };

        let mut rx = feed.subscribe();
        assert!(coordinator.complete_task(task.id).await.unwrap());
        assert!(!coordinator.complete_task(task.id).await.unwrap());

        match rx.recv().await.unwrap() {
            TaskEvent::TaskCompleted { id } => assert_eq!(id, task.id),
            other => panic!("expected TaskCompleted, got {other:?}"),
        }
        // The no-op second completion published nothing further.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn ocr_confirm_preserves_user_edited_values() {
        let (coordinator, _store, _feed) = coordinator().await;
        let now = kst()
            .with_ymd_and_hms(2024, 5, 1, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc);

        let mut draft = coordinator.preview_ocr("세미나 안내\n내일 오후 2시까지 신청", now);
        assert_eq!(draft.score, 1.0);

        // User lowers the score and edits the title before confirming.
        draft.score = 0.55;
        draft.title = "세미나 신청하기".into();

        let outcome = coordinator.ingest_ocr_draft(draft, now).await.unwrap();
        let task = match outcome {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => panic!("expected a created task"),
        };
        assert_eq!(task.source, TaskSource::Ocr);
        assert_eq!(task.title, "세미나 신청하기");
        assert_eq!(task.score, 0.55);
        // Status derives from the edited score, not the original heuristic.
        assert_eq!(task.status, TaskStatus::Review);
        assert_eq!(task.due_bucket, DueBucket::Week);
    }

    #[tokio::test]
    async fn retention_sweep_reports_counts() {
        let (coordinator, store, _feed) = coordinator().await;

        let mut item = korean_meeting_item();
        item.received_at = Utc::now() - Duration::days(90);
        let task = match coordinator.ingest(item).await.unwrap() {
            IngestOutcome::Created(task) => task,
            IngestOutcome::Skipped => unreachable!(),
        };
        coordinator.complete_task(task.id).await.unwrap();

        // Message is 90 days old; the completed task was just touched, so only
        // the message sweep fires.
        let report = run_retention(store.as_ref(), &RetentionPolicy::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(report.messages_deleted, 1);
        assert_eq!(report.tasks_deleted, 0);
    }
}
