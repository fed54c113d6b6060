use chrono::{Duration as ChronoDuration, Utc};
use mira_store::{logs, Store};
use tracing::info;

use crate::error::TelemetryResult;

const RETENTION_DAYS: i64 = 30;
const MAX_DELETIONS_PER_RUN: i64 = 10_000;

/// Deletes log rows older than 30 days, bounded at
/// [`MAX_DELETIONS_PER_RUN`] so one run never holds a long transaction
/// (spec.md §4.8). Intended to run once daily from the worker process.
pub async fn prune_logs(store: &Store) -> TelemetryResult<u64> {
    let cutoff = (Utc::now() - ChronoDuration::days(RETENTION_DAYS)).to_rfc3339();

    let mut tx = store.begin().await?;
    let deleted = logs::prune_older_than(&mut tx, &cutoff, MAX_DELETIONS_PER_RUN).await?;
    tx.commit().await?;

    if deleted > 0 {
        info!(deleted, cutoff = %cutoff, "pruned expired log rows");
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use mira_store::logs::NewLogRow;
    use mira_store::StoreConfig;

    use super::*;

    #[tokio::test]
    async fn prunes_nothing_when_all_logs_are_recent() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        logs::append(
            &mut tx,
            NewLogRow {
                level: "info",
                event_name: "hook_invocation",
                metadata_json: "{}",
                correlation_id: None,
                parent_span_id: None,
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let deleted = prune_logs(&store).await.unwrap();
        assert_eq!(deleted, 0);
    }
}
