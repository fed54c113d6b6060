use chrono::{DateTime, Datelike, Utc};
use mira_store::{api_call, budget as budget_store, Store};
use mira_types::ApiCallStatus;
use tracing::warn;

use crate::error::{BudgetError, BudgetResult};
use crate::pricing::{cost_cents, PricingTable};

#[derive(Debug, Clone)]
pub struct Reservation {
    pub api_call_id: String,
    pub idempotency_key: String,
    pub estimated_cost_cents: i64,
    pub already_existed: bool,
}

#[derive(Debug, Clone)]
pub struct BudgetLimits {
    pub daily_limit_cents: i64,
    pub monthly_limit_cents: i64,
    pub per_operation_limit_cents: i64,
}

/// Integer-cent spend ledger around every LLM call. Every mutating
/// operation runs inside a single Store transaction so the spend counters
/// and the `ApiCall` row never drift apart (spec.md §4.7). Cheap to clone:
/// every clone reads and writes the same singleton ledger row in the store.
#[derive(Clone)]
pub struct CostGovernor {
    store: Store,
    pricing: PricingTable,
    limits: BudgetLimits,
}

impl CostGovernor {
    pub fn new(store: Store, pricing: PricingTable, limits: BudgetLimits) -> Self {
        Self { store, pricing, limits }
    }

    pub async fn reserve(
        &self,
        operation: &str,
        estimated_input_tokens: i64,
        estimated_output_tokens: i64,
        model: &str,
        idempotency_key: &str,
    ) -> BudgetResult<Reservation> {
        let rate = self
            .pricing
            .rate(model)
            .ok_or_else(|| BudgetError::UnknownModel(model.to_string()))?;

        let estimated_cost_cents = cost_cents(estimated_input_tokens, rate.input_cents_per_million)
            + cost_cents(estimated_output_tokens, rate.output_cents_per_million);

        if estimated_cost_cents > self.limits.per_operation_limit_cents {
            return Err(BudgetError::PerOperationLimitExceeded {
                estimated_cents: estimated_cost_cents,
                limit_cents: self.limits.per_operation_limit_cents,
            });
        }

        let mut tx = self.store.begin().await?;

        if let Some(existing) = api_call::fetch_by_idempotency_key(&mut tx, idempotency_key).await? {
            tx.commit().await?;
            return Ok(Reservation {
                api_call_id: existing.id,
                idempotency_key: idempotency_key.to_string(),
                estimated_cost_cents: existing.estimated_cost_cents,
                already_existed: true,
            });
        }

        let ledger = budget_store::ensure_singleton(
            &mut tx,
            self.limits.daily_limit_cents,
            self.limits.monthly_limit_cents,
            self.limits.per_operation_limit_cents,
        )
        .await?;

        let new_daily = ledger.current_daily_spend_cents + estimated_cost_cents;
        let new_monthly = ledger.current_monthly_spend_cents + estimated_cost_cents;

        if new_daily > self.limits.daily_limit_cents {
            tx.rollback().await?;
            return Err(BudgetError::DailyLimitExceeded {
                would_spend_cents: new_daily,
                limit_cents: self.limits.daily_limit_cents,
            });
        }
        if new_monthly > self.limits.monthly_limit_cents {
            tx.rollback().await?;
            return Err(BudgetError::MonthlyLimitExceeded {
                would_spend_cents: new_monthly,
                limit_cents: self.limits.monthly_limit_cents,
            });
        }

        budget_store::adjust_spend(&mut tx, &ledger.id, estimated_cost_cents, estimated_cost_cents)
            .await?;

        let row = api_call::reserve(
            &mut tx,
            idempotency_key,
            operation,
            model,
            estimated_input_tokens,
            estimated_output_tokens,
            estimated_cost_cents,
            idempotency_key,
        )
        .await?;

        tx.commit().await?;

        emit_threshold_warnings(
            "daily",
            ledger.current_daily_spend_cents,
            new_daily,
            self.limits.daily_limit_cents,
        );
        emit_threshold_warnings(
            "monthly",
            ledger.current_monthly_spend_cents,
            new_monthly,
            self.limits.monthly_limit_cents,
        );

        Ok(Reservation {
            api_call_id: row.id,
            idempotency_key: idempotency_key.to_string(),
            estimated_cost_cents,
            already_existed: false,
        })
    }

    pub async fn reconcile(
        &self,
        idempotency_key: &str,
        actual_input_tokens: i64,
        actual_output_tokens: i64,
        status: ApiCallStatus,
    ) -> BudgetResult<()> {
        let mut tx = self.store.begin().await?;

        let existing = api_call::fetch_by_idempotency_key(&mut tx, idempotency_key)
            .await?
            .ok_or(BudgetError::Store(mira_store::StoreError::NotFound(
                idempotency_key.to_string(),
            )))?;

        let rate = self
            .pricing
            .rate(&existing.model)
            .ok_or_else(|| BudgetError::UnknownModel(existing.model.clone()))?;

        let actual_cost_cents = cost_cents(actual_input_tokens, rate.input_cents_per_million)
            + cost_cents(actual_output_tokens, rate.output_cents_per_million);

        let delta = actual_cost_cents - existing.estimated_cost_cents;

        let ledger = budget_store::fetch_singleton(&mut tx)
            .await?
            .ok_or(BudgetError::Store(mira_store::StoreError::NotFound(
                "budget_ledger".into(),
            )))?;

        budget_store::adjust_spend(&mut tx, &ledger.id, delta, delta).await?;

        api_call::finalize(
            &mut tx,
            &existing.id,
            status,
            actual_input_tokens,
            actual_output_tokens,
            actual_cost_cents,
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Zeros the daily counter on a new day and the monthly counter on a
    /// new month, relative to `period_start`. Call at worker startup and
    /// on a timer.
    pub async fn reset_if_period_rolled(&self, now: DateTime<Utc>) -> BudgetResult<()> {
        let mut tx = self.store.begin().await?;
        let ledger = budget_store::ensure_singleton(
            &mut tx,
            self.limits.daily_limit_cents,
            self.limits.monthly_limit_cents,
            self.limits.per_operation_limit_cents,
        )
        .await?;

        let period_start: DateTime<Utc> = ledger.period_start.parse().unwrap_or(now);

        if now.date_naive() != period_start.date_naive() {
            budget_store::reset_daily(&mut tx, &ledger.id, &now.to_rfc3339()).await?;
        }
        if now.year() != period_start.year() || now.month() != period_start.month() {
            budget_store::reset_monthly(&mut tx, &ledger.id, &now.to_rfc3339()).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// Emits one warning per threshold (80/90/100%) crossed between
/// `prev_spend_cents` and `new_spend_cents`, so a single reservation that
/// jumps straight past 80% and 90% still logs both (spec.md §4.7).
fn emit_threshold_warnings(counter: &str, prev_spend_cents: i64, new_spend_cents: i64, limit_cents: i64) {
    if limit_cents <= 0 {
        return;
    }
    let prev_pct = (prev_spend_cents * 100) / limit_cents;
    let new_pct = (new_spend_cents * 100) / limit_cents;
    for threshold in [80, 90, 100] {
        if prev_pct < threshold && new_pct >= threshold {
            warn!(counter, threshold, spend_cents = new_spend_cents, limit_cents, "budget threshold crossed");
        }
    }
}
