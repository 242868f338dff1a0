//! Text parsing — temporal resolution, cue scoring, and task normalization.

pub mod normalizer;
pub mod ocr;
pub mod resolver;
pub mod rules;

pub use normalizer::{NormalizeOverrides, TaskNormalizer};
pub use ocr::{OcrParser, TaskDraft};
pub use resolver::TimeResolver;
pub use rules::CueRules;
