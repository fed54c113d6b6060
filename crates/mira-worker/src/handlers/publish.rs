use async_trait::async_trait;
use mira_store::{consent, conversations, learnings, messages, revocations, uploads, Store};
use mira_types::LearningCategory;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::handler::{HandlerError, HandlerResult, JobHandler};

#[derive(Deserialize)]
struct PublishPayload {
    learning_id: String,
}

/// Categories allowed to publish ahead of full stage-2 validation of their
/// source conversation (spec.md §4.7: "if stage-2 validation has not run,
/// the learning must additionally pass a whitelist-only static policy").
/// Limited to categories whose content is inherently about process rather
/// than about the conversation's specifics, so pre-validation leakage risk
/// is low even before the AI pass has looked at every message.
const PRE_VALIDATION_WHITELIST: [LearningCategory; 3] =
    [LearningCategory::BestPractice, LearningCategory::ToolUsage, LearningCategory::Pattern];

/// Handler behind `publish_learning` (spec.md §4.6): a thin adapter over
/// external publishing. The decentralized upload and ledger anchoring
/// themselves are out-of-core (spec.md §1); this handler only runs the
/// gating checks and records that the learning cleared them.
pub struct PublishHandler {
    store: Store,
}

impl PublishHandler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for PublishHandler {
    async fn handle(&self, payload: serde_json::Value) -> HandlerResult {
        let payload: PublishPayload =
            serde_json::from_value(payload).map_err(|e| HandlerError::Failed(format!("malformed payload: {e}")))?;

        let mut tx = self.store.begin().await.map_err(|e| HandlerError::Failed(e.to_string()))?;

        let learning = learnings::fetch_by_id(&mut tx, &payload.learning_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?
            .ok_or_else(|| HandlerError::Failed(format!("learning {} not found", payload.learning_id)))?;

        let has_consent = consent::fetch_active(&mut tx).await.map_err(|e| HandlerError::Failed(e.to_string()))?;
        if has_consent.is_none() {
            return Err(HandlerError::PolicyViolation("no active, non-withdrawn consent on file".to_string()));
        }

        conversations::fetch_by_id(&mut tx, &learning.source_conversation_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?
            .ok_or_else(|| HandlerError::Failed(format!("source conversation {} not found", learning.source_conversation_id)))?;

        let source_messages = messages::fetch_by_conversation(&mut tx, &learning.source_conversation_id)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;

        let fully_validated = source_messages.iter().all(|m| m.ai_validated);
        if !fully_validated {
            let category: LearningCategory = learning
                .category
                .parse()
                .map_err(|e: String| HandlerError::Failed(e))?;
            if !PRE_VALIDATION_WHITELIST.contains(&category) {
                return Err(HandlerError::PolicyViolation(format!(
                    "source conversation stage-2 validation incomplete and category {category} is not on the pre-validation whitelist"
                )));
            }
        }

        let content_address = content_address(&learning.content);
        let revoked = revocations::is_revoked(&mut tx, &content_address)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        if revoked {
            return Err(HandlerError::PolicyViolation("content address has an active revocation".to_string()));
        }

        let upload_id = uploads::insert(&mut tx, &learning.id, &content_address, None)
            .await
            .map_err(|e| HandlerError::Failed(e.to_string()))?;
        tx.commit().await.map_err(|e| HandlerError::Failed(e.to_string()))?;

        Ok(json!({ "upload_id": upload_id, "content_address": content_address }))
    }
}

fn content_address(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("sha256:{digest:x}")
}

#[cfg(test)]
mod tests {
    use mira_store::{conversations, messages, StoreConfig};
    use mira_types::Role;

    use super::*;

    async fn seed_learning(store: &Store, category: LearningCategory, all_validated: bool) -> String {
        let mut tx = store.begin().await.unwrap();
        let conv_id = conversations::upsert_by_session_key(&mut tx, "s1").await.unwrap();
        let (message_id, _) = messages::insert(
            &mut tx,
            messages::NewMessage { conversation_id: &conv_id, role: Role::Assistant, content: "fix", sanitization_version: 1 },
        )
        .await
        .unwrap();
        if all_validated {
            messages::apply_ai_validation(&mut tx, &message_id, "fix", &[]).await.unwrap();
        }
        let learning_id = learnings::insert(
            &mut tx,
            learnings::NewLearning {
                category,
                title: "t",
                content: "some durable advice",
                tags: &[],
                confidence: 0.9,
                embedding: None,
                source_conversation_id: &conv_id,
                sanitizer_version: 1,
                extractor_version: 1,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        learning_id
    }

    async fn grant_consent(store: &Store) {
        let mut tx = store.begin().await.unwrap();
        consent::record(&mut tx, "2026-01-01T00:00:00Z", "v1", "hash", true, false, consent::Attribution::Anonymous, true, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn publishes_when_consent_and_validation_are_both_present() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        grant_consent(&store).await;
        let learning_id = seed_learning(&store, LearningCategory::BugFix, true).await;

        let handler = PublishHandler::new(store);
        let result = handler.handle(json!({"learning_id": learning_id})).await.unwrap();
        assert!(result["content_address"].as_str().unwrap().starts_with("sha256:"));
    }

    #[tokio::test]
    async fn refuses_without_consent() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let learning_id = seed_learning(&store, LearningCategory::BugFix, true).await;

        let handler = PublishHandler::new(store);
        let result = handler.handle(json!({"learning_id": learning_id})).await;
        assert!(matches!(result, Err(HandlerError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn non_whitelisted_category_is_held_until_validation_completes() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        grant_consent(&store).await;
        let learning_id = seed_learning(&store, LearningCategory::BugFix, false).await;

        let handler = PublishHandler::new(store);
        let result = handler.handle(json!({"learning_id": learning_id})).await;
        assert!(matches!(result, Err(HandlerError::PolicyViolation(_))));
    }

    #[tokio::test]
    async fn whitelisted_category_may_publish_ahead_of_validation() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        grant_consent(&store).await;
        let learning_id = seed_learning(&store, LearningCategory::BestPractice, false).await;

        let handler = PublishHandler::new(store);
        let result = handler.handle(json!({"learning_id": learning_id})).await;
        assert!(result.is_ok());
    }
}
