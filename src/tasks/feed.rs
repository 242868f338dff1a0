//! Task feed — broadcast of committed task writes to live subscribers.
//!
//! Readers (UI, widgets) treat bucket/status queries as continuously-updated
//! views: a subscriber receives every event published after it subscribed,
//! and the WebSocket layer pairs this with a snapshot on connect.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::model::{Task, TaskWithMessages};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Events published for every committed write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// Full snapshot of open (non-completed) tasks, sent on connect and after
    /// a subscriber lags.
    TasksSync { tasks: Vec<TaskWithMessages> },
    /// A new task was created by an ingestion.
    TaskCreated { task: Task },
    /// A task was marked completed.
    TaskCompleted { id: Uuid },
}

/// Broadcast fan-out of task events.
pub struct TaskFeed {
    tx: broadcast::Sender<TaskEvent>,
}

impl TaskFeed {
    pub fn new() -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Arc::new(Self { tx })
    }

    /// Subscribe to events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream` of events.
    pub fn stream(&self) -> BroadcastStream<TaskEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Publish an event. Ok if no receivers are listening yet.
    pub fn publish(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }
}
