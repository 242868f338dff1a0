//! Task domain — data model and live event feed.

pub mod feed;
pub mod model;

pub use feed::{TaskEvent, TaskFeed};
pub use model::{DueBucket, RawMessage, Task, TaskSource, TaskStatus, TaskWithMessages};
