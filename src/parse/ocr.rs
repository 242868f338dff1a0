//! OCR draft parsing — converts OCR-extracted text into an editable task
//! candidate using the shared parsing heuristics.
//!
//! The draft is provisional: the user may edit the title/description in the
//! review UI before confirming, and the confirmed values are ingested with
//! the draft's score/due/bucket as overrides.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::parse::normalizer::truncate_chars;
use crate::parse::resolver::TimeResolver;
use crate::parse::rules::CueRules;
use crate::tasks::model::DueBucket;

/// Maximum draft title length, in characters.
const MAX_DRAFT_TITLE_CHARS: usize = 60;
/// Maximum draft description length, in characters.
const MAX_DRAFT_DESCRIPTION_CHARS: usize = 400;

/// Title used when the OCR text has no non-blank line.
const FALLBACK_TITLE: &str = "OCR task";

/// A provisional task candidate extracted from OCR text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub bucket: DueBucket,
    pub score: f64,
}

/// Parser turning OCR output into `TaskDraft`s.
pub struct OcrParser {
    zone: FixedOffset,
    resolver: TimeResolver,
    rules: CueRules,
}

impl OcrParser {
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            zone,
            resolver: TimeResolver::new(zone),
            rules: CueRules::default_rules(),
        }
    }

    /// Parse OCR text into a draft relative to `now`.
    ///
    /// Title is the first non-blank line; due/score/bucket come from the same
    /// heuristics the ingestion pipeline uses, so confirming an unedited draft
    /// produces the same task a direct ingest would.
    pub fn parse(&self, text: &str, now: DateTime<Utc>) -> TaskDraft {
        let title = text
            .lines()
            .find(|line| !line.trim().is_empty())
            .map(|line| truncate_chars(line.trim(), MAX_DRAFT_TITLE_CHARS))
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        let description = truncate_chars(text.trim(), MAX_DRAFT_DESCRIPTION_CHARS);

        let local_now = now.with_timezone(&self.zone);
        let due = self.resolver.resolve(text, local_now);
        let score = self.rules.score(text);
        let bucket = due
            .map(|d| DueBucket::classify(d, local_now))
            .unwrap_or(DueBucket::Month);

        TaskDraft {
            title,
            description,
            due_at: due.map(|d| d.with_timezone(&Utc)),
            bucket,
            score,
        }
    }
}
