use async_trait::async_trait;
use chrono::Utc;
use mira_validator::{AiValidator, ValidatorError};
use serde::Deserialize;
use serde_json::json;

use crate::handler::{next_daily_boundary, HandlerError, HandlerResult, JobHandler};

#[derive(Deserialize)]
struct ValidationPayload {
    message_id: String,
}

/// Handler behind `ai_sanitization_validation` (spec.md §4.6, §4.3): a
/// thin adapter from the queue's JSON payload onto `AiValidator`.
pub struct ValidationHandler {
    validator: AiValidator,
}

impl ValidationHandler {
    pub fn new(validator: AiValidator) -> Self {
        Self { validator }
    }
}

#[async_trait]
impl JobHandler for ValidationHandler {
    async fn handle(&self, payload: serde_json::Value) -> HandlerResult {
        let payload: ValidationPayload =
            serde_json::from_value(payload).map_err(|e| HandlerError::Failed(format!("malformed payload: {e}")))?;

        match self.validator.validate(&payload.message_id).await {
            Ok(outcome) => Ok(json!({
                "message_id": outcome.message_id,
                "rounds": outcome.rounds,
                "changed": outcome.changed,
            })),
            Err(ValidatorError::Budget(_)) => {
                Err(HandlerError::BudgetExhausted { resume_at: next_daily_boundary(Utc::now()) })
            }
            Err(e) => Err(HandlerError::Failed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait as async_trait_attr;
    use mira_budget::{BudgetLimits, CostGovernor, PricingTable};
    use mira_store::{messages, Store, StoreConfig};
    use mira_types::{LlmOracle, OracleError, OracleRequest, OracleResponse, Role};
    use serde_json::json as json_macro;

    use super::*;

    struct FakeOracle;

    #[async_trait_attr]
    impl LlmOracle for FakeOracle {
        async fn complete(&self, _request: OracleRequest) -> Result<OracleResponse, OracleError> {
            Ok(OracleResponse { text: r#"{"detections":[]}"#.to_string(), input_tokens: 10, output_tokens: 5 })
        }
    }

    #[tokio::test]
    async fn wraps_the_validator_and_returns_its_outcome_as_json() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let conv_id = mira_store::conversations::upsert_by_session_key(&mut tx, "s1").await.unwrap();
        let (message_id, _) = messages::insert(
            &mut tx,
            messages::NewMessage { conversation_id: &conv_id, role: Role::User, content: "hello", sanitization_version: 1 },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let budget = CostGovernor::new(
            store.clone(),
            PricingTable::default_table(),
            BudgetLimits { daily_limit_cents: 10_000, monthly_limit_cents: 100_000, per_operation_limit_cents: 1_000 },
        );
        let validator = AiValidator::new(store, Arc::new(FakeOracle), budget, "gemini-3-pro");
        let handler = ValidationHandler::new(validator);

        let result = handler.handle(json_macro!({"message_id": message_id})).await.unwrap();
        assert_eq!(result["changed"], false);
    }

    #[tokio::test]
    async fn malformed_payload_fails_without_touching_the_store() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let budget = CostGovernor::new(
            store.clone(),
            PricingTable::default_table(),
            BudgetLimits { daily_limit_cents: 10_000, monthly_limit_cents: 100_000, per_operation_limit_cents: 1_000 },
        );
        let validator = AiValidator::new(store, Arc::new(FakeOracle), budget, "gemini-3-pro");
        let handler = ValidationHandler::new(validator);

        let result = handler.handle(json_macro!({"nope": true})).await;
        assert!(matches!(result, Err(HandlerError::Failed(_))));
    }
}
