//! Converts a sanitized, stable conversation into deduplicated,
//! quality-scored learning rows (spec.md §4.9). Runs as the handler behind
//! the `extract_learning` job type.

mod embedding;
mod error;
mod extractor;
mod heuristics;
mod prompt;

pub use embedding::{cosine_similarity, EmbeddingFn, DEDUP_SIMILARITY_THRESHOLD};
pub use error::{ExtractorError, ExtractorResult};
pub use extractor::{ExtractionOutcome, LearningExtractor, EXTRACTOR_VERSION};
