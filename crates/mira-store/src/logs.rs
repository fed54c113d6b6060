use chrono::Utc;
use mira_types::Id;
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct LogRow {
    pub id: String,
    pub level: String,
    pub event_name: String,
    pub metadata: String,
    pub correlation_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub created_at: String,
}

pub struct NewLogRow<'a> {
    pub level: &'a str,
    pub event_name: &'a str,
    pub metadata_json: &'a str,
    pub correlation_id: Option<&'a str>,
    pub parent_span_id: Option<&'a str>,
}

/// Appends one already-validated, already-redacted log row. Never called
/// directly by application code; the telemetry core's batched writer is
/// the sole caller.
pub async fn append(tx: &mut Tx<'_>, row: NewLogRow<'_>) -> StoreResult<String> {
    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO logs (id, level, event_name, metadata, correlation_id, parent_span_id, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(row.level)
    .bind(row.event_name)
    .bind(row.metadata_json)
    .bind(row.correlation_id)
    .bind(row.parent_span_id)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    Ok(id)
}

pub async fn fetch_by_correlation(
    tx: &mut Tx<'_>,
    correlation_id: &str,
) -> StoreResult<Vec<LogRow>> {
    let rows = sqlx::query_as::<_, LogRow>(
        "SELECT * FROM logs WHERE correlation_id = ? ORDER BY created_at",
    )
    .bind(correlation_id)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}

/// Deletes log rows older than `cutoff`, capped at `limit` deletions per
/// call so the retention pruner never holds a long transaction
/// (spec.md §5 cancellation/timeouts).
pub async fn prune_older_than(tx: &mut Tx<'_>, cutoff: &str, limit: i64) -> StoreResult<u64> {
    let result = sqlx::query(
        "DELETE FROM logs WHERE id IN (SELECT id FROM logs WHERE created_at < ? LIMIT ?)",
    )
    .bind(cutoff)
    .bind(limit)
    .execute(&mut *tx.tx)
    .await?;
    Ok(result.rows_affected())
}
