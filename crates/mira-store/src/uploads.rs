use chrono::Utc;
use mira_types::Id;
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub id: String,
    pub learning_id: String,
    pub content_address: String,
    pub anchor_tx: Option<String>,
    pub uploaded_at: String,
}

pub async fn insert(
    tx: &mut Tx<'_>,
    learning_id: &str,
    content_address: &str,
    anchor_tx: Option<&str>,
) -> StoreResult<String> {
    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO uploads (id, learning_id, content_address, anchor_tx, uploaded_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(learning_id)
    .bind(content_address)
    .bind(anchor_tx)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;
    Ok(id)
}

pub async fn fetch_by_learning(
    tx: &mut Tx<'_>,
    learning_id: &str,
) -> StoreResult<Vec<UploadRow>> {
    let rows = sqlx::query_as::<_, UploadRow>(
        "SELECT * FROM uploads WHERE learning_id = ? ORDER BY uploaded_at",
    )
    .bind(learning_id)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}
