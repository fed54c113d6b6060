use std::str::FromStr;
use std::time::Duration;

use mira_budget::CostGovernor;
use mira_queue::idempotency_key;
use mira_store::{conversations, learnings, messages, Store};
use mira_types::{LearningCategory, LlmOracle, OracleRequest};
use tracing::{info, warn};

use crate::embedding::{cosine_similarity, EmbeddingFn, DEDUP_SIMILARITY_THRESHOLD};
use crate::error::{ExtractorError, ExtractorResult};
use crate::heuristics::passes_prefilter;
use crate::prompt::{build_prompt, parse_response, RawLearning};

pub const EXTRACTOR_VERSION: u32 = 1;
const MIN_CONFIDENCE: f64 = 0.6;
const MIN_CONTENT_LEN: usize = 100;
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_BACKOFFS: [Duration; 3] =
    [Duration::from_secs(2), Duration::from_secs(4), Duration::from_secs(8)];
/// Candidates considered for the dedup scan; bounds the per-extraction
/// work even as the learnings table grows (spec.md §4.9).
const DEDUP_CANDIDATE_LIMIT: i64 = 500;

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub accepted_ids: Vec<String>,
    pub rejected_low_confidence: usize,
    pub rejected_too_short: usize,
    pub rejected_bad_category: usize,
    pub rejected_duplicate: usize,
}

pub struct LearningExtractor {
    store: Store,
    oracle: std::sync::Arc<dyn LlmOracle>,
    budget: CostGovernor,
    embed: EmbeddingFn,
    model: String,
}

impl LearningExtractor {
    pub fn new(
        store: Store,
        oracle: std::sync::Arc<dyn LlmOracle>,
        budget: CostGovernor,
        embed: EmbeddingFn,
        model: impl Into<String>,
    ) -> Self {
        Self { store, oracle, budget, embed, model: model.into() }
    }

    /// Extracts zero or more learnings from a sanitized, post-validation
    /// conversation (spec.md §4.9). Returns an empty, non-error outcome
    /// when the heuristic pre-filter rejects the conversation outright.
    pub async fn extract(&self, conversation_id: &str, last_message_id: &str) -> ExtractorResult<ExtractionOutcome> {
        let messages = self.fetch_messages(conversation_id).await?;

        if !passes_prefilter(&messages) {
            info!(conversation_id, "conversation rejected by extractor pre-filter");
            return Ok(ExtractionOutcome::default());
        }

        let transcript = render_transcript(&messages);
        let key = idempotency_key("learn", &[conversation_id, last_message_id]);
        let candidates = self.call_model(conversation_id, &transcript, &key).await?;

        let mut outcome = ExtractionOutcome::default();
        for candidate in candidates {
            self.process_candidate(conversation_id, candidate, &mut outcome).await?;
        }

        info!(
            conversation_id,
            accepted = outcome.accepted_ids.len(),
            "learning extraction complete"
        );
        Ok(outcome)
    }

    async fn fetch_messages(&self, conversation_id: &str) -> ExtractorResult<Vec<messages::MessageRow>> {
        let mut tx = self.store.begin().await?;
        conversations::fetch_by_id(&mut tx, conversation_id)
            .await?
            .ok_or_else(|| ExtractorError::ConversationNotFound(conversation_id.to_string()))?;
        let rows = messages::fetch_by_conversation(&mut tx, conversation_id).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn process_candidate(
        &self,
        conversation_id: &str,
        candidate: RawLearning,
        outcome: &mut ExtractionOutcome,
    ) -> ExtractorResult<()> {
        if candidate.confidence < MIN_CONFIDENCE {
            outcome.rejected_low_confidence += 1;
            return Ok(());
        }
        if candidate.content.len() < MIN_CONTENT_LEN {
            outcome.rejected_too_short += 1;
            return Ok(());
        }
        let Ok(category) = LearningCategory::from_str(&candidate.category) else {
            outcome.rejected_bad_category += 1;
            return Ok(());
        };

        let embedding = (self.embed)(&candidate.content);

        let mut tx = self.store.begin().await?;
        let existing = learnings::fetch_with_embeddings(&mut tx, DEDUP_CANDIDATE_LIMIT).await?;

        for row in &existing {
            let Some(raw) = &row.embedding else { continue };
            let Ok(other): Result<Vec<f32>, _> = serde_json::from_str(raw) else { continue };
            if cosine_similarity(&embedding, &other) >= DEDUP_SIMILARITY_THRESHOLD {
                outcome.rejected_duplicate += 1;
                tx.rollback().await?;
                return Ok(());
            }
        }

        let id = learnings::insert(
            &mut tx,
            learnings::NewLearning {
                category,
                title: &candidate.title,
                content: &candidate.content,
                tags: &candidate.tags,
                confidence: candidate.confidence,
                embedding: Some(&embedding),
                source_conversation_id: conversation_id,
                sanitizer_version: 1,
                extractor_version: EXTRACTOR_VERSION,
            },
        )
        .await?;
        tx.commit().await?;

        outcome.accepted_ids.push(id);
        Ok(())
    }

    async fn call_model(
        &self,
        conversation_id: &str,
        transcript: &str,
        idempotency_key: &str,
    ) -> ExtractorResult<Vec<RawLearning>> {
        let _reservation = self
            .budget
            .reserve(
                "extract_learning",
                estimate_input_tokens(transcript),
                estimate_output_tokens(),
                &self.model,
                idempotency_key,
            )
            .await?;

        let prompt = build_prompt(transcript);
        let request = OracleRequest::deterministic(prompt, 4096);

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
                        .map_err(|e| ExtractorError::MalformedResponse(e.to_string()))?;
                    return Ok(parsed.learnings);
                }
                Ok(Err(e)) => last_err = Some(e.into()),
                Err(_) => last_err = Some(mira_types::OracleError::Timeout(CALL_TIMEOUT).into()),
            }
            warn!(conversation_id, attempt, "extractor model call failed, retrying");
        }

        let err = last_err.unwrap_or(ExtractorError::MalformedResponse("no attempts made".into()));
        let _ = self
            .budget
            .reconcile(idempotency_key, 0, 0, mira_types::ApiCallStatus::Error)
            .await;
        Err(err)
    }
}

fn render_transcript(messages: &[messages::MessageRow]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn estimate_input_tokens(transcript: &str) -> i64 {
    (transcript.len() as i64 / 4).max(1)
}

fn estimate_output_tokens() -> i64 {
    512
}
