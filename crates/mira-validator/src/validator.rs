use std::time::Duration;

use mira_budget::CostGovernor;
use mira_store::{messages, sanitization_log, Store};
use mira_types::{Detection, DetectionStage, LlmOracle, OracleRequest};
use tracing::{info, warn};

use crate::error::{ValidatorError, ValidatorResult};
use crate::prompt::{build_prompt, parse_response};

pub const DETECTOR_VERSION: u32 = 1;
const DETECTOR_NAME: &str = "ai_validator";
const MIN_CONFIDENCE: f64 = 0.80;
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BACKOFFS: [Duration; 3] =
    [Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)];
/// "Re-sanitize until stable" bound (spec.md §4.3): enough rounds for a
/// model to converge without ever looping on adversarial input.
const MAX_CONVERGENCE_ROUNDS: usize = 3;

#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub message_id: String,
    pub rounds: usize,
    pub changed: bool,
    pub final_detections: Vec<Detection>,
}

pub struct AiValidator {
    store: Store,
    oracle: std::sync::Arc<dyn LlmOracle>,
    budget: CostGovernor,
    model: String,
}

impl AiValidator {
    pub fn new(store: Store, oracle: std::sync::Arc<dyn LlmOracle>, budget: CostGovernor, model: impl Into<String>) -> Self {
        Self { store, oracle, budget, model: model.into() }
    }

    /// Validates one message end to end (spec.md §4.3). Gated by the cost
    /// governor before every model call; a budget rejection propagates as
    /// `ValidatorError::Budget` so the caller (the worker's job handler)
    /// can translate it into the fixed `budget` job failure.
    pub async fn validate(&self, message_id: &str) -> ValidatorResult<ValidationOutcome> {
        let mut rounds = 0usize;
        let mut changed_overall = false;
        let mut last_detections = Vec::new();

        loop {
            rounds += 1;
            let current = self.fetch_content(message_id).await?;

            let idempotency_key = format!("validate-{message_id}-round{rounds}");
            let detections = self.call_model(message_id, &current, &idempotency_key).await?;

            if detections.is_empty() {
                if rounds == 1 {
                    self.mark_validated_no_change(message_id).await?;
                }
                last_detections = Vec::new();
                break;
            }

            let new_content = apply_detections(&current, &detections);
            self.apply_update(message_id, &new_content, &detections).await?;
            changed_overall = true;
            last_detections = detections;

            if rounds >= MAX_CONVERGENCE_ROUNDS {
                warn!(message_id, rounds, "ai validator hit convergence round bound");
                break;
            }
        }

        info!(message_id, rounds, changed = changed_overall, "ai validation complete");
        Ok(ValidationOutcome {
            message_id: message_id.to_string(),
            rounds,
            changed: changed_overall,
            final_detections: last_detections,
        })
    }

    async fn fetch_content(&self, message_id: &str) -> ValidatorResult<String> {
        let mut tx = self.store.begin().await?;
        let row = messages::fetch_by_id(&mut tx, message_id)
            .await?
            .ok_or_else(|| ValidatorError::MessageNotFound(message_id.to_string()))?;
        tx.commit().await?;
        Ok(row.content)
    }

    async fn call_model(
        &self,
        message_id: &str,
        content: &str,
        idempotency_key: &str,
    ) -> ValidatorResult<Vec<Detection>> {
        let _reservation = self
            .budget
            .reserve(
                "ai_sanitization_validation",
                estimate_input_tokens(content),
                estimate_output_tokens(),
                &self.model,
                idempotency_key,
            )
            .await?;

        let prompt = build_prompt(content);
        let request = OracleRequest::deterministic(prompt, 2048);

        let mut last_err = None;
        for (attempt, delay) in std::iter::once(Duration::ZERO).chain(RETRY_BACKOFFS).enumerate() {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }
            match tokio::time::timeout(CALL_TIMEOUT, self.oracle.complete(request.clone())).await {
                Ok(Ok(response)) => {
                    self.budget
                        .reconcile(
                            idempotency_key,
                            response.input_tokens as i64,
                            response.output_tokens as i64,
                            mira_types::ApiCallStatus::Success,
                        )
                        .await?;

                    let parsed = parse_response(&response.text)
                        .map_err(|e| ValidatorError::MalformedResponse(e.to_string()))?;

                    return Ok(parsed
                        .detections
                        .into_iter()
                        .filter(|d| d.confidence >= MIN_CONFIDENCE)
                        .map(|d| Detection {
                            category: d.category,
                            placeholder: String::new(),
                            confidence: d.confidence,
                            start: d.start,
                            end: d.end,
                            detector: DETECTOR_NAME.to_string(),
                            detector_version: DETECTOR_VERSION,
                        })
                        .collect());
                }
                Ok(Err(e)) => last_err = Some(e.into()),
                Err(_) => last_err = Some(mira_types::OracleError::Timeout(CALL_TIMEOUT).into()),
            }
            warn!(message_id, attempt, "ai validator model call failed, retrying");
        }

        let err = last_err.unwrap_or(ValidatorError::MalformedResponse("no attempts made".into()));
        let _ = self
            .budget
            .reconcile(idempotency_key, 0, 0, mira_types::ApiCallStatus::Error)
            .await;
        Err(err)
    }

    async fn apply_update(
        &self,
        message_id: &str,
        new_content: &str,
        detections: &[Detection],
    ) -> ValidatorResult<()> {
        let mut tx = self.store.begin().await?;
        messages::apply_ai_validation(&mut tx, message_id, new_content, detections).await?;
        sanitization_log::append(&mut tx, message_id, DetectionStage::AiValidation, detections).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn mark_validated_no_change(&self, message_id: &str) -> ValidatorResult<()> {
        let mut tx = self.store.begin().await?;
        let current = messages::fetch_by_id(&mut tx, message_id)
            .await?
            .ok_or_else(|| ValidatorError::MessageNotFound(message_id.to_string()))?;
        messages::apply_ai_validation(&mut tx, message_id, &current.content, &[]).await?;
        sanitization_log::append(&mut tx, message_id, DetectionStage::AiValidation, &[]).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Replaces matched spans in reverse order so earlier offsets stay valid
/// as later ones are rewritten (spec.md §4.3).
fn apply_detections(content: &str, detections: &[Detection]) -> String {
    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by_key(|d| std::cmp::Reverse(d.start));

    let mut out = content.to_string();
    for d in ordered {
        let placeholder = format!("[REDACTED_{}]", d.category.to_uppercase());
        if d.start <= d.end && d.end <= out.len() && out.is_char_boundary(d.start) && out.is_char_boundary(d.end) {
            out.replace_range(d.start..d.end, &placeholder);
        }
    }
    out
}

fn estimate_input_tokens(content: &str) -> i64 {
    (content.len() as i64 / 4).max(1)
}

fn estimate_output_tokens() -> i64 {
    256
}
