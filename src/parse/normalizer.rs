//! Task normalizer — turns raw title/body text into a complete task record.
//!
//! Orchestrates the cue rules, the temporal resolver, and the bucket
//! classifier. Behaves identically regardless of which channel produced the
//! text; stateless and reentrant.

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::parse::resolver::TimeResolver;
use crate::parse::rules::CueRules;
use crate::tasks::model::{DueBucket, Task, TaskSource, TaskStatus};

/// Maximum stored title length, in characters.
pub const MAX_TITLE_CHARS: usize = 80;
/// Maximum stored description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 4000;

/// Pre-computed values an upstream collaborator may supply (e.g. the OCR
/// review flow, where the user may have edited the provisional draft).
#[derive(Debug, Clone, Default)]
pub struct NormalizeOverrides {
    pub resolved_due: Option<DateTime<Utc>>,
    pub score: Option<f64>,
    pub bucket: Option<DueBucket>,
}

/// Shared normalization pipeline: score, resolve, bucket, derive status.
pub struct TaskNormalizer {
    zone: FixedOffset,
    rules: CueRules,
    resolver: TimeResolver,
}

impl TaskNormalizer {
    /// Build a normalizer resolving times in the given fixed zone.
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            zone,
            rules: CueRules::default_rules(),
            resolver: TimeResolver::new(zone),
        }
    }

    /// Normalize with no overrides.
    pub fn normalize(
        &self,
        title: &str,
        body: &str,
        source: TaskSource,
        reference: DateTime<Utc>,
    ) -> Task {
        self.normalize_with(title, body, source, reference, NormalizeOverrides::default())
    }

    /// Normalize `(title, body)` into a task relative to `reference`.
    ///
    /// Title and body are concatenated for scoring and resolution, so a cue in
    /// either contributes. Status is derived from the score here, once; it is
    /// never re-derived for an existing task.
    pub fn normalize_with(
        &self,
        title: &str,
        body: &str,
        source: TaskSource,
        reference: DateTime<Utc>,
        overrides: NormalizeOverrides,
    ) -> Task {
        let text = format!("{title}\n{body}");
        let local_reference = reference.with_timezone(&self.zone);

        let score = overrides
            .score
            .unwrap_or_else(|| self.rules.score(&text))
            .clamp(0.0, 1.0);
        let due_at = overrides.resolved_due.or_else(|| {
            self.resolver
                .resolve(&text, local_reference)
                .map(|resolved| resolved.with_timezone(&Utc))
        });
        let due_bucket = overrides.bucket.unwrap_or_else(|| {
            due_at
                .map(|due| DueBucket::classify(due.with_timezone(&self.zone), local_reference))
                .unwrap_or(DueBucket::Month)
        });

        Task {
            id: Uuid::new_v4(),
            title: truncate_chars(title, MAX_TITLE_CHARS),
            description: truncate_chars(body, MAX_DESCRIPTION_CHARS),
            due_at,
            due_bucket,
            score,
            status: status_for_score(score),
            source,
            created_at: reference,
            updated_at: Utc::now(),
        }
    }
}

/// Initial status from the relevance score.
pub fn status_for_score(score: f64) -> TaskStatus {
    if score >= 0.75 {
        TaskStatus::Pending
    } else if score >= 0.5 {
        TaskStatus::Review
    } else {
        TaskStatus::Snoozed
    }
}

/// Truncate to at most `max` characters, on a char boundary. Silent.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
