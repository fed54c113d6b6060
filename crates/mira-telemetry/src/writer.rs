use std::time::Duration;

use mira_store::logs::{self, NewLogRow};
use mira_store::Store;
use tokio::sync::mpsc;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const FLUSH_INTERVAL: Duration = Duration::from_millis(100);
const CHANNEL_CAPACITY: usize = 1024;

/// One already-allowlisted log entry, queued for the batched writer.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: String,
    pub event_name: String,
    pub metadata_json: String,
    pub correlation_id: Option<String>,
    pub parent_span_id: Option<String>,
}

/// A cheap, cloneable handle that queues log entries for the batched
/// writer rather than touching the Store on the caller's own task
/// (spec.md §4.8: logging must never block the hot path it instruments).
#[derive(Clone)]
pub struct LogWriterHandle {
    tx: mpsc::Sender<LogEntry>,
}

impl LogWriterHandle {
    pub fn enqueue(&self, entry: LogEntry) {
        if let Err(err) = self.tx.try_send(entry) {
            warn!(%err, "log writer channel full, dropping entry");
        }
    }
}

/// Batches queued log entries and flushes them into `mira_store::logs`
/// every [`FLUSH_INTERVAL`], one transaction per flush. Runs until
/// `shutdown` is cancelled, then drains whatever remains queued.
pub struct LogWriter {
    store: Store,
    rx: mpsc::Receiver<LogEntry>,
}

impl LogWriter {
    pub fn spawn(store: Store) -> (LogWriterHandle, LogWriter) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (LogWriterHandle { tx }, LogWriter { store, rx })
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = interval(FLUSH_INTERVAL);
        let mut batch = Vec::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain_into(&mut batch);
                    self.flush(&batch).await;
                    batch.clear();
                }
                entry = self.rx.recv() => {
                    match entry {
                        Some(entry) => batch.push(entry),
                        None => break,
                    }
                }
                _ = shutdown.cancelled() => {
                    self.drain_into(&mut batch);
                    self.flush(&batch).await;
                    break;
                }
            }
        }

        self.drain_into(&mut batch);
        self.flush(&batch).await;
    }

    fn drain_into(&mut self, batch: &mut Vec<LogEntry>) {
        while let Ok(entry) = self.rx.try_recv() {
            batch.push(entry);
        }
    }

    async fn flush(&self, batch: &[LogEntry]) {
        if batch.is_empty() {
            return;
        }

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                warn!(%err, "failed to open transaction for log flush");
                return;
            }
        };

        for entry in batch {
            let row = NewLogRow {
                level: &entry.level,
                event_name: &entry.event_name,
                metadata_json: &entry.metadata_json,
                correlation_id: entry.correlation_id.as_deref(),
                parent_span_id: entry.parent_span_id.as_deref(),
            };
            if let Err(err) = logs::append(&mut tx, row).await {
                warn!(%err, "failed to append log row");
            }
        }

        if let Err(err) = tx.commit().await {
            warn!(%err, "failed to commit log flush");
        }
    }
}

#[cfg(test)]
mod tests {
    use mira_store::StoreConfig;

    use super::*;

    #[tokio::test]
    async fn queued_entries_are_flushed_to_the_store() {
        let store = Store::connect(&StoreConfig::in_memory()).await.unwrap();
        let (handle, writer) = LogWriter::spawn(store.clone());
        let shutdown = CancellationToken::new();

        handle.enqueue(LogEntry {
            level: "info".to_string(),
            event_name: "hook_invocation".to_string(),
            metadata_json: "{}".to_string(),
            correlation_id: Some("01ARZ3NDEKTSV4RRFFQ69G5FAV".to_string()),
            parent_span_id: None,
        });

        shutdown.cancel();
        writer.run(shutdown).await;

        let mut tx = store.begin().await.unwrap();
        let rows = logs::fetch_by_correlation(&mut tx, "01ARZ3NDEKTSV4RRFFQ69G5FAV").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_name, "hook_invocation");
    }
}
