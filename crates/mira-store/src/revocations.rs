use chrono::Utc;
use mira_types::Id;
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct RevocationRow {
    pub id: String,
    pub content_address: String,
    pub reason: String,
    pub revoked_at: String,
}

pub async fn insert(tx: &mut Tx<'_>, content_address: &str, reason: &str) -> StoreResult<String> {
    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query("INSERT INTO revocations (id, content_address, reason, revoked_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(content_address)
        .bind(reason)
        .bind(&now)
        .execute(&mut *tx.tx)
        .await?;
    Ok(id)
}

/// True when `content_address` has a matching revocation — publish paths
/// must exclude it.
pub async fn is_revoked(tx: &mut Tx<'_>, content_address: &str) -> StoreResult<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM revocations WHERE content_address = ? LIMIT 1")
            .bind(content_address)
            .fetch_optional(&mut *tx.tx)
            .await?;
    Ok(row.is_some())
}
