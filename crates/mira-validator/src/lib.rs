//! Context-aware second-pass sanitizer. Consults a remote language model
//! through the `LlmOracle` trait and re-redacts a stored message in place,
//! idempotently (spec.md §4.3).

mod error;
mod prompt;
mod validator;

pub use error::{ValidatorError, ValidatorResult};
pub use validator::{AiValidator, ValidationOutcome, DETECTOR_VERSION};
