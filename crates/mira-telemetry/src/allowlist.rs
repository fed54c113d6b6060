use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde_json::Value;

/// Per-`event_name` metadata schema: which keys are required, and which
/// additional keys are allowed through. Anything else is dropped
/// (spec.md §4.8).
pub struct EventSchema {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

impl EventSchema {
    fn is_allowed(&self, key: &str) -> bool {
        self.required.contains(&key) || self.optional.contains(&key)
    }
}

static SCHEMAS: Lazy<HashMap<&'static str, EventSchema>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(
        "hook_invocation",
        EventSchema { required: &["correlation_id", "duration_ms", "outcome"], optional: &["role", "event_type"] },
    );
    m.insert(
        "hook_latency_breach",
        EventSchema { required: &["correlation_id", "duration_ms", "deadline_ms"], optional: &[] },
    );
    m.insert(
        "sanitizer_pattern_retired",
        EventSchema { required: &["category"], optional: &["pattern_index"] },
    );
    m.insert(
        "sanitizer_error",
        EventSchema { required: &["correlation_id"], optional: &["message_id"] },
    );
    m.insert(
        "job_enqueued",
        EventSchema { required: &["job_type", "job_id"], optional: &["priority", "idempotency_key"] },
    );
    m.insert(
        "job_claimed",
        EventSchema { required: &["job_type", "job_id"], optional: &["attempts"] },
    );
    m.insert(
        "job_completed",
        EventSchema { required: &["job_type", "job_id"], optional: &[] },
    );
    m.insert(
        "job_failed",
        EventSchema { required: &["job_type", "job_id", "error"], optional: &["attempts", "dead_lettered"] },
    );
    m.insert(
        "budget_threshold_crossed",
        EventSchema { required: &["counter", "threshold"], optional: &["spend_cents", "limit_cents"] },
    );
    m.insert(
        "ai_validation_complete",
        EventSchema { required: &["message_id", "changed"], optional: &["rounds"] },
    );
    m.insert(
        "learning_extracted",
        EventSchema { required: &["conversation_id", "learning_id"], optional: &["category", "confidence"] },
    );
    m.insert(
        "learning_deduplicated",
        EventSchema { required: &["conversation_id"], optional: &["similarity"] },
    );
    m.insert(
        "log_schema_violation",
        EventSchema { required: &["event_name"], optional: &["missing_fields"] },
    );
    m
});

#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    /// Passed as-is, possibly with extra keys dropped.
    Accepted { metadata: serde_json::Map<String, Value>, dropped_keys: Vec<String> },
    /// A required field is missing; the caller must drop the log and emit
    /// `log_schema_violation` instead.
    MissingRequired { missing: Vec<String> },
    /// No schema registered for this event name; rejected rather than
    /// silently passed through, so a typo'd event name is visible.
    UnknownEvent,
}

pub fn validate(event_name: &str, metadata: serde_json::Map<String, Value>) -> ValidationOutcome {
    let Some(schema) = SCHEMAS.get(event_name) else {
        return ValidationOutcome::UnknownEvent;
    };

    let missing: Vec<String> = schema
        .required
        .iter()
        .filter(|k| !metadata.contains_key(**k))
        .map(|k| k.to_string())
        .collect();

    if !missing.is_empty() {
        return ValidationOutcome::MissingRequired { missing };
    }

    let mut accepted = serde_json::Map::new();
    let mut dropped_keys = Vec::new();
    for (key, value) in metadata {
        if schema.is_allowed(&key) {
            accepted.insert(key, value);
        } else {
            dropped_keys.push(key);
        }
    }

    ValidationOutcome::Accepted { metadata: accepted, dropped_keys }
}
