use chrono::Utc;
use mira_types::{Id, LearningCategory};
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct LearningRow {
    pub id: String,
    pub category: String,
    pub title: String,
    pub content: String,
    pub tags: String,
    pub confidence: f64,
    pub embedding: Option<String>,
    pub source_conversation_id: String,
    pub sanitizer_version: i64,
    pub extractor_version: i64,
    pub created_at: String,
}

pub struct NewLearning<'a> {
    pub category: LearningCategory,
    pub title: &'a str,
    pub content: &'a str,
    pub tags: &'a [String],
    pub confidence: f64,
    pub embedding: Option<&'a [f32]>,
    pub source_conversation_id: &'a str,
    pub sanitizer_version: u32,
    pub extractor_version: u32,
}

pub async fn insert(tx: &mut Tx<'_>, learning: NewLearning<'_>) -> StoreResult<String> {
    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();
    let tags_json = serde_json::to_string(learning.tags)?;
    let embedding_json = learning
        .embedding
        .map(serde_json::to_string)
        .transpose()?;

    sqlx::query(
        r#"
        INSERT INTO learnings (
            id, category, title, content, tags, confidence, embedding,
            source_conversation_id, sanitizer_version, extractor_version, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(learning.category.as_str())
    .bind(learning.title)
    .bind(learning.content)
    .bind(&tags_json)
    .bind(learning.confidence)
    .bind(&embedding_json)
    .bind(learning.source_conversation_id)
    .bind(learning.sanitizer_version as i64)
    .bind(learning.extractor_version as i64)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    Ok(id)
}

/// Candidates for the extractor's dedup check: every learning's embedding,
/// most recent first so a bounded scan still favors recent near-duplicates.
pub async fn fetch_with_embeddings(tx: &mut Tx<'_>, limit: i64) -> StoreResult<Vec<LearningRow>> {
    let rows = sqlx::query_as::<_, LearningRow>(
        "SELECT * FROM learnings WHERE embedding IS NOT NULL ORDER BY created_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}

pub async fn fetch_by_id(tx: &mut Tx<'_>, id: &str) -> StoreResult<Option<LearningRow>> {
    let row = sqlx::query_as::<_, LearningRow>("SELECT * FROM learnings WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx.tx)
        .await?;
    Ok(row)
}
