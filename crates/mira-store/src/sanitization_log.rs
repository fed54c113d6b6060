use chrono::Utc;
use mira_types::{Detection, DetectionStage, Id};
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, FromRow)]
pub struct SanitizationLogRow {
    pub id: String,
    pub message_id: String,
    pub stage: String,
    pub detections: String,
    pub created_at: String,
}

/// Appends an immutable audit row. Never updated or deleted.
pub async fn append(
    tx: &mut Tx<'_>,
    message_id: &str,
    stage: DetectionStage,
    detections: &[Detection],
) -> StoreResult<String> {
    let id = Id::new().to_string();
    let detections_json = serde_json::to_string(detections)?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO sanitization_log (id, message_id, stage, detections, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(message_id)
    .bind(stage.as_str())
    .bind(&detections_json)
    .bind(&now)
    .execute(&mut *tx.tx)
    .await?;

    Ok(id)
}

pub async fn fetch_by_message(
    tx: &mut Tx<'_>,
    message_id: &str,
) -> StoreResult<Vec<SanitizationLogRow>> {
    let rows = sqlx::query_as::<_, SanitizationLogRow>(
        "SELECT * FROM sanitization_log WHERE message_id = ? ORDER BY created_at",
    )
    .bind(message_id)
    .fetch_all(&mut *tx.tx)
    .await?;
    Ok(rows)
}
