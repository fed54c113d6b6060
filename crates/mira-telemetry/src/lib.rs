//! Telemetry core: allowlisted structured logging, explicit correlation
//! context, sliding-window latency percentiles, and a batched Store-backed
//! log writer with bounded retention (spec.md §4.8).
//!
//! Only placeholder-bearing, already-sanitized content is ever eligible to
//! reach a log line; callers pass metadata maps, never raw message
//! content, and the allowlist further restricts which keys survive per
//! event name.

mod allowlist;
mod context;
mod error;
mod http_redact;
mod metrics;
mod retention;
mod writer;

pub use allowlist::{validate, EventSchema, ValidationOutcome};
pub use context::{with_correlation, CorrelationContext};
pub use error::{TelemetryError, TelemetryResult};
pub use http_redact::{redact_headers_for_log, redact_url_for_log};
pub use metrics::{MetricRecorder, Percentiles};
pub use retention::prune_logs;
pub use writer::{LogEntry, LogWriter, LogWriterHandle};

use serde_json::Value;
use tracing::warn;

/// The public logging surface the rest of the workspace depends on.
/// Wraps a [`LogWriterHandle`] and a [`MetricRecorder`], routing every
/// call through [`allowlist::validate`] first.
#[derive(Clone)]
pub struct Logger {
    writer: LogWriterHandle,
    metrics: std::sync::Arc<MetricRecorder>,
}

impl Logger {
    pub fn new(writer: LogWriterHandle) -> Self {
        Self { writer, metrics: std::sync::Arc::new(MetricRecorder::new()) }
    }

    pub fn info(&self, ctx: &CorrelationContext, event_name: &str, metadata: serde_json::Map<String, Value>) {
        self.emit("info", ctx, event_name, metadata);
    }

    pub fn warn(&self, ctx: &CorrelationContext, event_name: &str, metadata: serde_json::Map<String, Value>) {
        self.emit("warn", ctx, event_name, metadata);
    }

    pub fn error(&self, ctx: &CorrelationContext, event_name: &str, metadata: serde_json::Map<String, Value>) {
        self.emit("error", ctx, event_name, metadata);
    }

    /// Records a duration sample for an operation's sliding-window
    /// percentile tracker (spec.md §4.8).
    pub fn record_duration(&self, operation: &str, duration_ms: f64) {
        self.metrics.record(operation, duration_ms);
    }

    pub fn percentiles(&self, operation: &str) -> Option<Percentiles> {
        self.metrics.percentiles(operation)
    }

    fn emit(&self, level: &str, ctx: &CorrelationContext, event_name: &str, metadata: serde_json::Map<String, Value>) {
        match validate(event_name, metadata) {
            ValidationOutcome::Accepted { metadata, dropped_keys } => {
                if !dropped_keys.is_empty() {
                    warn!(event_name, ?dropped_keys, "dropped metadata keys outside allowlist");
                }
                let metadata_json = serde_json::to_string(&Value::Object(metadata)).unwrap_or_else(|_| "{}".to_string());
                self.writer.enqueue(LogEntry {
                    level: level.to_string(),
                    event_name: event_name.to_string(),
                    metadata_json,
                    correlation_id: Some(ctx.correlation_id.clone()),
                    parent_span_id: ctx.parent_span_id.clone(),
                });
            }
            ValidationOutcome::MissingRequired { missing } => {
                warn!(event_name, ?missing, "log event missing required fields, dropped");
                let mut violation = serde_json::Map::new();
                violation.insert("event_name".to_string(), Value::String(event_name.to_string()));
                violation.insert(
                    "missing_fields".to_string(),
                    Value::Array(missing.into_iter().map(Value::String).collect()),
                );
                if let ValidationOutcome::Accepted { metadata, .. } = validate("log_schema_violation", violation) {
                    let metadata_json = serde_json::to_string(&Value::Object(metadata)).unwrap_or_else(|_| "{}".to_string());
                    self.writer.enqueue(LogEntry {
                        level: "warn".to_string(),
                        event_name: "log_schema_violation".to_string(),
                        metadata_json,
                        correlation_id: Some(ctx.correlation_id.clone()),
                        parent_span_id: ctx.parent_span_id.clone(),
                    });
                }
            }
            ValidationOutcome::UnknownEvent => {
                warn!(event_name, "log event name not in allowlist, dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mira_store::{logs, Store, StoreConfig};
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> serde_json::Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[tokio::test]
    async fn accepted_events_are_queued_and_flushed() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let (handle, writer) = LogWriter::spawn(store.clone());
        let logger = Logger::new(handle);
        let ctx = CorrelationContext::root();

        logger.info(
            &ctx,
            "job_completed",
            obj(&[("job_type", json!("extract_learning")), ("job_id", json!("j1"))]),
        );

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        writer.run(shutdown).await;

        let mut tx = store.begin().await.unwrap();
        let rows = logs::fetch_by_correlation(&mut tx, &ctx.correlation_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_name, "job_completed");
    }

    #[tokio::test]
    async fn missing_required_field_emits_schema_violation_instead() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let (handle, writer) = LogWriter::spawn(store.clone());
        let logger = Logger::new(handle);
        let ctx = CorrelationContext::root();

        logger.info(&ctx, "job_completed", obj(&[("job_type", json!("extract_learning"))]));

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        writer.run(shutdown).await;

        let mut tx = store.begin().await.unwrap();
        let rows = logs::fetch_by_correlation(&mut tx, &ctx.correlation_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_name, "log_schema_violation");
    }

    #[tokio::test]
    async fn percentiles_roundtrip_through_logger() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let (handle, _writer) = LogWriter::spawn(store);
        let logger = Logger::new(handle);
        logger.record_duration("hook_invocation", 42.0);
        assert!(logger.percentiles("hook_invocation").is_some());
    }
}
