use async_trait::async_trait;
use chrono::Utc;
use mira_extractor::{ExtractorError, LearningExtractor};
use serde::Deserialize;
use serde_json::json;

use crate::handler::{next_daily_boundary, HandlerError, HandlerResult, JobHandler};

#[derive(Deserialize)]
struct ExtractionPayload {
    conversation_id: String,
    last_message_id: String,
}

/// Handler behind `extract_learning` (spec.md §4.6, §4.9): a thin adapter
/// from the queue's JSON payload onto `LearningExtractor`.
pub struct ExtractionHandler {
    extractor: LearningExtractor,
}

impl ExtractionHandler {
    pub fn new(extractor: LearningExtractor) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl JobHandler for ExtractionHandler {
    async fn handle(&self, payload: serde_json::Value) -> HandlerResult {
        let payload: ExtractionPayload =
            serde_json::from_value(payload).map_err(|e| HandlerError::Failed(format!("malformed payload: {e}")))?;

        match self.extractor.extract(&payload.conversation_id, &payload.last_message_id).await {
            Ok(outcome) => Ok(json!({
                "accepted": outcome.accepted_ids,
                "rejected_low_confidence": outcome.rejected_low_confidence,
                "rejected_too_short": outcome.rejected_too_short,
                "rejected_bad_category": outcome.rejected_bad_category,
                "rejected_duplicate": outcome.rejected_duplicate,
            })),
            Err(ExtractorError::Budget(_)) => {
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
            Ok(OracleResponse { text: r#"{"learnings":[]}"#.to_string(), input_tokens: 10, output_tokens: 5 })
        }
    }

    #[tokio::test]
    async fn wraps_the_extractor_and_returns_its_outcome_as_json() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let conv_id = mira_store::conversations::upsert_by_session_key(&mut tx, "s1").await.unwrap();
        let (message_id, _) = messages::insert(
            &mut tx,
            messages::NewMessage {
                conversation_id: &conv_id,
                role: Role::Assistant,
                content: "too short",
                sanitization_version: 1,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let budget = CostGovernor::new(
            store.clone(),
            PricingTable::default_table(),
            BudgetLimits { daily_limit_cents: 10_000, monthly_limit_cents: 100_000, per_operation_limit_cents: 1_000 },
        );
        let embed: mira_extractor::EmbeddingFn = Arc::new(|_| vec![0.0; 4]);
        let extractor = LearningExtractor::new(store, Arc::new(FakeOracle), budget, embed, "gemini-3-pro");
        let handler = ExtractionHandler::new(extractor);

        let result = handler
            .handle(json_macro!({"conversation_id": conv_id, "last_message_id": message_id}))
            .await
            .unwrap();
        assert_eq!(result["accepted"].as_array().unwrap().len(), 0);
    }
}
