use chrono::Utc;
use mira_types::{ApiCallStatus, Id};
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct ApiCallRow {
    pub id: String,
    pub idempotency_key: String,
    pub operation: String,
    pub model: String,
    pub status: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub estimated_cost_cents: i64,
    pub cost_cents: Option<i64>,
    pub correlation_id: String,
    pub created_at: String,
}

pub async fn fetch_by_idempotency_key(
    tx: &mut Tx<'_>,
    idempotency_key: &str,
) -> StoreResult<Option<ApiCallRow>> {
    let row = sqlx::query_as::<_, ApiCallRow>("SELECT * FROM api_call WHERE idempotency_key = ?")
        .bind(idempotency_key)
        .fetch_optional(&mut *tx.tx)
        .await?;
    Ok(row)
}

/// Reserves a call slot. Returns the existing row without charging again
/// if `idempotency_key` was already used (spec.md §4.7).
pub async fn reserve(
    tx: &mut Tx<'_>,
    idempotency_key: &str,
    operation: &str,
    model: &str,
    estimated_input_tokens: i64,
    estimated_output_tokens: i64,
    estimated_cost_cents: i64,
    correlation_id: &str,
) -> StoreResult<ApiCallRow> {
    if let Some(existing) = fetch_by_idempotency_key(tx, idempotency_key).await? {
        return Ok(existing);
    }

    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO api_call (
            id, idempotency_key, operation, model, status,
            input_tokens, output_tokens, estimated_cost_cents, cost_cents,
            correlation_id, created_at
        ) VALUES (?, ?, ?, ?, 'reserved', ?, ?, ?, NULL, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(idempotency_key)
    .bind(operation)
    .bind(model)
    .bind(estimated_input_tokens)
    .bind(estimated_output_tokens)
    .bind(estimated_cost_cents)
    .bind(correlation_id)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    fetch_by_idempotency_key(tx, idempotency_key)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("api_call {idempotency_key}")))
}

pub async fn finalize(
    tx: &mut Tx<'_>,
    id: &str,
    status: ApiCallStatus,
    input_tokens: i64,
    output_tokens: i64,
    cost_cents: i64,
) -> StoreResult<()> {
    let result = sqlx::query(
        "UPDATE api_call SET status = ?, input_tokens = ?, output_tokens = ?, cost_cents = ? WHERE id = ?",
    )
    .bind(status.as_str())
    .bind(input_tokens)
    .bind(output_tokens)
    .bind(cost_cents)
    .bind(id)
    .execute(&mut *tx.tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("api_call {id}")));
    }
    Ok(())
}
