use chrono::Utc;
use mira_types::Id;
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: String,
    pub session_key: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Inserts a conversation if `session_key` hasn't been seen, otherwise
/// returns the existing row's id and bumps `updated_at`.
pub async fn upsert_by_session_key(tx: &mut Tx<'_>, session_key: &str) -> StoreResult<String> {
    let existing: Option<(String,)> =
        sqlx::query_as("SELECT id FROM conversations WHERE session_key = ?")
            .bind(session_key)
            .fetch_optional(&mut *tx.tx)
            .await?;

    let now = Utc::now().to_rfc3339();

    if let Some((id,)) = existing {
        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&id)
            .execute(&mut *tx.tx)
            .await?;
        return Ok(id);
    }

    let id = Id::new().to_string();
    sqlx::query(
        "INSERT INTO conversations (id, session_key, created_at, updated_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(session_key)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    Ok(id)
}

pub async fn fetch_by_id(
    tx: &mut Tx<'_>,
    conversation_id: &str,
) -> StoreResult<Option<ConversationRow>> {
    let row = sqlx::query_as::<_, ConversationRow>("SELECT * FROM conversations WHERE id = ?")
        .bind(conversation_id)
        .fetch_optional(&mut *tx.tx)
        .await?;
    Ok(row)
}
