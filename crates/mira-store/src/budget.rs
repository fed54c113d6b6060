use chrono::Utc;
use mira_types::Id;
use sqlx::FromRow;

use crate::error::{StoreError, StoreResult};
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct BudgetLedgerRow {
    pub id: String,
    pub daily_limit_cents: i64,
    pub monthly_limit_cents: i64,
    pub per_operation_limit_cents: i64,
    pub current_daily_spend_cents: i64,
    pub current_monthly_spend_cents: i64,
    pub period_start: String,
    pub last_reset_at: String,
}

/// Creates the singleton ledger row if one doesn't already exist.
pub async fn ensure_singleton(
    tx: &mut Tx<'_>,
    daily_limit_cents: i64,
    monthly_limit_cents: i64,
    per_operation_limit_cents: i64,
) -> StoreResult<BudgetLedgerRow> {
    if let Some(row) = fetch_singleton(tx).await? {
        return Ok(row);
    }

    let id = Id::new().to_string();
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO budget_ledger (
            id, daily_limit_cents, monthly_limit_cents, per_operation_limit_cents,
            current_daily_spend_cents, current_monthly_spend_cents, period_start, last_reset_at
        ) VALUES (?, ?, ?, ?, 0, 0, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(daily_limit_cents)
    .bind(monthly_limit_cents)
    .bind(per_operation_limit_cents)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    fetch_singleton(tx)
        .await?
        .ok_or_else(|| StoreError::NotFound("budget_ledger".into()))
}

pub async fn fetch_singleton(tx: &mut Tx<'_>) -> StoreResult<Option<BudgetLedgerRow>> {
    let row = sqlx::query_as::<_, BudgetLedgerRow>(
        "SELECT * FROM budget_ledger ORDER BY rowid LIMIT 1",
    )
    .fetch_optional(&mut *tx.tx)
    .await?;
    Ok(row)
}

/// Adds (possibly negative, on reversal) cent amounts to both spend
/// counters in a single statement so the update is atomic with whatever
/// else the caller does inside the same transaction.
pub async fn adjust_spend(
    tx: &mut Tx<'_>,
    ledger_id: &str,
    daily_delta_cents: i64,
    monthly_delta_cents: i64,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE budget_ledger
        SET current_daily_spend_cents = current_daily_spend_cents + ?,
            current_monthly_spend_cents = current_monthly_spend_cents + ?
        WHERE id = ?
        "#,
    )
    .bind(daily_delta_cents)
    .bind(monthly_delta_cents)
    .bind(ledger_id)
    .execute(&mut *tx.tx)
    .await?;
    Ok(())
}

pub async fn reset_daily(tx: &mut Tx<'_>, ledger_id: &str, at: &str) -> StoreResult<()> {
    sqlx::query(
        "UPDATE budget_ledger SET current_daily_spend_cents = 0, last_reset_at = ? WHERE id = ?",
    )
    .bind(at)
    .bind(ledger_id)
    .execute(&mut *tx.tx)
    .await?;
    Ok(())
}

pub async fn reset_monthly(tx: &mut Tx<'_>, ledger_id: &str, period_start: &str) -> StoreResult<()> {
    sqlx::query(
        "UPDATE budget_ledger SET current_monthly_spend_cents = 0, period_start = ? WHERE id = ?",
    )
    .bind(period_start)
    .bind(ledger_id)
    .execute(&mut *tx.tx)
    .await?;
    Ok(())
}
