//! Hook entry point logic, split out from `main.rs` so it can run against
//! an in-memory store in tests (spec.md §4.4).

use std::time::Duration;

use chrono::Utc;
use mira_sanitizer::sanitize;
use mira_store::{conversations, jobs, messages, sanitization_log, Store};
use mira_telemetry::{validate as validate_log, CorrelationContext, ValidationOutcome};
use mira_types::{DetectionStage, HookEvent, JobType, Role};

/// p95 bound; breached invocations still complete, they just emit a
/// telemetry event (spec.md §5).
pub const DEADLINE_P95: Duration = Duration::from_millis(100);
pub const DEADLINE_P99: Duration = Duration::from_millis(150);

/// Hard cap on accepted event payloads (spec.md §6).
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// One invocation's outcome, returned to `main` for the ack/diagnostic
/// decision. Errors are carried as strings rather than a rich error type:
/// nothing downstream inspects the variant, only the diagnostic text.
pub async fn handle_event(store: &Store, ctx: &CorrelationContext, raw: &[u8]) -> Result<(), String> {
    if raw.len() > MAX_EVENT_BYTES {
        return Err("event payload exceeds 1 MiB".to_string());
    }

    let event: HookEvent = serde_json::from_slice(raw).map_err(|e| format!("parse error: {e}"))?;
    let sanitized = sanitize(&event.text);

    let mut tx = store.begin().await.map_err(|e| format!("store unavailable: {e}"))?;

    let conversation_id = conversations::upsert_by_session_key(&mut tx, &event.session_key)
        .await
        .map_err(|e| format!("store error: {e}"))?;

    let (message_id, _sequence) = messages::insert(
        &mut tx,
        messages::NewMessage {
            conversation_id: &conversation_id,
            role: event.role,
            content: &sanitized.out,
            sanitization_version: mira_sanitizer::DETECTOR_VERSION,
        },
    )
    .await
    .map_err(|e| format!("store error: {e}"))?;

    sanitization_log::append(&mut tx, &message_id, DetectionStage::PreSanitization, &sanitized.detections)
        .await
        .map_err(|e| format!("store error: {e}"))?;

    let now = Utc::now().to_rfc3339();
    let validation_payload = serde_json::json!({ "message_id": message_id }).to_string();
    jobs::insert(
        &mut tx,
        jobs::NewJob {
            job_type: JobType::AiSanitizationValidation,
            payload_json: &validation_payload,
            priority: 5,
            scheduled_at: &now,
            idempotency_key: Some(&mira_queue::idempotency_key("validate", &[&message_id])),
            max_attempts: 3,
        },
    )
    .await
    .map_err(|e| format!("store error: {e}"))?;

    if event.role == Role::Assistant {
        let extraction_payload = serde_json::json!({
            "conversation_id": conversation_id,
            "last_message_id": message_id,
        })
        .to_string();
        jobs::insert(
            &mut tx,
            jobs::NewJob {
                job_type: JobType::ExtractLearning,
                payload_json: &extraction_payload,
                priority: 5,
                scheduled_at: &now,
                idempotency_key: Some(&mira_queue::idempotency_key("learn", &[&conversation_id, &message_id])),
                max_attempts: 3,
            },
        )
        .await
        .map_err(|e| format!("store error: {e}"))?;
    }

    tx.commit().await.map_err(|e| format!("store error: {e}"))?;

    log_invocation(store, ctx, "ok").await;
    Ok(())
}

/// Writes the `hook_invocation` telemetry row directly, inline, rather
/// than through the batched writer — this process exits immediately after,
/// so there is no background task left to flush it (spec.md §4.8).
pub async fn log_invocation(store: &Store, ctx: &CorrelationContext, outcome: &str) {
    log_event(store, ctx, "hook_invocation", outcome, None).await;
}

pub async fn log_latency_breach(store: &Store, ctx: &CorrelationContext, duration_ms: u64) {
    log_event(store, ctx, "hook_latency_breach", "breached", Some(duration_ms)).await;
}

async fn log_event(store: &Store, ctx: &CorrelationContext, event_name: &str, outcome: &str, duration_ms: Option<u64>) {
    let metadata = match event_name {
        "hook_invocation" => serde_json::json!({
            "correlation_id": ctx.correlation_id,
            "duration_ms": duration_ms.unwrap_or(0),
            "outcome": outcome,
        }),
        _ => serde_json::json!({
            "correlation_id": ctx.correlation_id,
            "duration_ms": duration_ms.unwrap_or(0),
            "deadline_ms": DEADLINE_P95.as_millis() as u64,
        }),
    };
    let Some(obj) = metadata.as_object().cloned() else { return };

    let ValidationOutcome::Accepted { metadata, .. } = validate_log(event_name, obj) else { return };
    let metadata_json = serde_json::to_string(&serde_json::Value::Object(metadata)).unwrap_or_else(|_| "{}".to_string());

    let Ok(mut tx) = store.begin().await else { return };
    let _ = mira_store::logs::append(
        &mut tx,
        mira_store::logs::NewLogRow {
            level: "info",
            event_name,
            metadata_json: &metadata_json,
            correlation_id: Some(&ctx.correlation_id),
            parent_span_id: ctx.parent_span_id.as_deref(),
        },
    )
    .await;
    let _ = tx.commit().await;
}

#[cfg(test)]
mod tests {
    use mira_store::StoreConfig;

    use super::*;

    async fn test_store() -> Store {
        Store::connect(&StoreConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn user_event_enqueues_only_validation_job() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let raw = br#"{"type":"message","session_key":"s1","role":"user","text":"hello there"}"#;

        handle_event(&store, &ctx, raw).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let conv_id = conversations::upsert_by_session_key(&mut tx, "s1").await.unwrap();
        assert_eq!(
            jobs::count_by_status(&mut tx, JobType::AiSanitizationValidation, mira_types::JobStatus::Queued)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            jobs::count_by_status(&mut tx, JobType::ExtractLearning, mira_types::JobStatus::Queued)
                .await
                .unwrap(),
            0
        );
        let messages = messages::fetch_by_conversation(&mut tx, &conv_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "hello there");
    }

    #[tokio::test]
    async fn assistant_event_enqueues_validation_and_extraction_jobs() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let raw = br#"{"type":"message","session_key":"s2","role":"assistant","text":"here is the fix"}"#;

        handle_event(&store, &ctx, raw).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            jobs::count_by_status(&mut tx, JobType::ExtractLearning, mira_types::JobStatus::Queued)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn sanitizes_text_before_persisting() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let raw = br#"{"type":"message","session_key":"s3","role":"user","text":"email me at jane@example.com"}"#;

        handle_event(&store, &ctx, raw).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let conv_id = conversations::upsert_by_session_key(&mut tx, "s3").await.unwrap();
        let messages = messages::fetch_by_conversation(&mut tx, &conv_id).await.unwrap();
        assert!(messages[0].content.contains("[REDACTED_EMAIL]"));
        assert!(!messages[0].content.contains("jane@example.com"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_handled_error_not_a_panic() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let result = handle_event(&store, &ctx, b"not json").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected_before_parsing() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let raw = vec![b'a'; MAX_EVENT_BYTES + 1];
        let result = handle_event(&store, &ctx, &raw).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn repeated_invocations_increment_sequence() {
        let store = test_store().await;
        let ctx = CorrelationContext::root();
        let raw1 = br#"{"type":"message","session_key":"s4","role":"user","text":"first message here"}"#;
        let raw2 = br#"{"type":"message","session_key":"s4","role":"assistant","text":"second message here"}"#;

        handle_event(&store, &ctx, raw1).await.unwrap();
        handle_event(&store, &ctx, raw2).await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let conv_id = conversations::upsert_by_session_key(&mut tx, "s4").await.unwrap();
        let messages = messages::fetch_by_conversation(&mut tx, &conv_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sequence, 1);
        assert_eq!(messages[1].sequence, 2);
    }
}
