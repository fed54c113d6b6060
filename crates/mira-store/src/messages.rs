use chrono::Utc;
use mira_types::{Detection, Id, Role};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub sequence: i64,
    pub content: String,
    pub pre_sanitized: bool,
    pub ai_validated: bool,
    pub ai_detections: Option<String>,
    pub sanitization_version: i64,
    pub created_at: String,
}

pub struct NewMessage<'a> {
    pub conversation_id: &'a str,
    pub role: Role,
    pub content: &'a str,
    pub sanitization_version: u32,
}

/// Inserts a message, assigning `sequence = 1 + MAX(sequence)` for the
/// conversation inside the caller's transaction (spec.md §4.4). The
/// `pre_sanitized` flag is always set; there is no code path to insert an
/// unsanitized message.
pub async fn insert(tx: &mut Tx<'_>, msg: NewMessage<'_>) -> StoreResult<(String, i64)> {
    let next_sequence: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(sequence), 0) + 1 FROM messages WHERE conversation_id = ?",
    )
    .bind(msg.conversation_id)
    .fetch_one(&mut *tx.tx)
    .await?;

    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO messages (
            id, conversation_id, role, sequence, content,
            pre_sanitized, ai_validated, ai_detections, sanitization_version, created_at
        ) VALUES (?, ?, ?, ?, ?, 1, 0, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(msg.conversation_id)
    .bind(msg.role.as_str())
    .bind(next_sequence)
    .bind(msg.content)
    .bind(msg.sanitization_version as i64)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    Ok((id, next_sequence))
}

pub async fn fetch_by_id(tx: &mut Tx<'_>, message_id: &str) -> StoreResult<Option<MessageRow>> {
    let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
        .bind(message_id)
        .fetch_optional(&mut *tx.tx)
        .await?;
    Ok(row)
}

/// Applies the result of an AI-validation pass: the only mutation the
/// Store permits against an already-inserted message (spec.md §4.1, §4.3).
pub async fn apply_ai_validation(
    tx: &mut Tx<'_>,
    message_id: &str,
    new_content: &str,
    detections: &[Detection],
) -> StoreResult<()> {
    let detections_json = serde_json::to_string(detections)?;

    let result = sqlx::query(
        "UPDATE messages SET content = ?, ai_validated = 1, ai_detections = ? WHERE id = ?",
    )
    .bind(new_content)
    .bind(&detections_json)
    .bind(message_id)
    .execute(&mut *tx.tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("message {message_id}")));
    }
    Ok(())
}

pub async fn fetch_unvalidated(tx: &mut Tx<'_>, limit: i64) -> StoreResult<Vec<MessageRow>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE ai_validated = 0 ORDER BY created_at LIMIT ?",
    )
    .bind(limit)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}

pub async fn fetch_by_conversation(
    tx: &mut Tx<'_>,
    conversation_id: &str,
) -> StoreResult<Vec<MessageRow>> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE conversation_id = ? ORDER BY sequence",
    )
    .bind(conversation_id)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}
