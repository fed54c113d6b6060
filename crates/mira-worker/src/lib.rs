//! Long-running executor of queued jobs: per-type handler registration,
//! bounded concurrency, graceful shutdown (spec.md §4.6).

mod error;
mod handler;
mod handlers;
#[cfg(feature = "http-oracle")]
mod oracle_http;
mod pool;

pub use error::{WorkerError, WorkerResult};
pub use handler::{next_daily_boundary, HandlerError, HandlerResult, JobHandler};
pub use handlers::{ExtractionHandler, PublishHandler, ValidationHandler};
#[cfg(feature = "http-oracle")]
pub use oracle_http::HttpOracle;
pub use pool::WorkerPool;
