use mira_types::Id;
use sqlx::FromRow;

use crate::error::StoreResult;
use crate::store::Tx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    Anonymous,
    Pseudonymous,
    Attributed,
}

impl Attribution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Attribution::Anonymous => "anonymous",
            Attribution::Pseudonymous => "pseudonymous",
            Attribution::Attributed => "attributed",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ConsentRow {
    pub id: String,
    pub given_at: String,
    pub withdrawn_at: Option<String>,
    pub version: String,
    pub text_hash: String,
    pub share_enabled: bool,
    pub manual_approval_required: bool,
    pub attribution: String,
    pub age_confirmed: bool,
    pub retention_expires_at: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub async fn record(
    tx: &mut Tx<'_>,
    given_at: &str,
    version: &str,
    text_hash: &str,
    share_enabled: bool,
    manual_approval_required: bool,
    attribution: Attribution,
    age_confirmed: bool,
    retention_expires_at: Option<&str>,
) -> StoreResult<String> {
    let id = Id::new().to_string();
    sqlx::query(
        r#"
        INSERT INTO consent (
            id, given_at, withdrawn_at, version, text_hash, share_enabled,
            manual_approval_required, attribution, age_confirmed, retention_expires_at
        ) VALUES (?, ?, NULL, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(given_at)
    .bind(version)
    .bind(text_hash)
    .bind(share_enabled)
    .bind(manual_approval_required)
    .bind(attribution.as_str())
    .bind(age_confirmed)
    .bind(retention_expires_at)
    .execute(&mut *tx.tx)
    .await?;
    Ok(id)
}

pub async fn withdraw(tx: &mut Tx<'_>, id: &str, withdrawn_at: &str) -> StoreResult<()> {
    sqlx::query("UPDATE consent SET withdrawn_at = ? WHERE id = ?")
        .bind(withdrawn_at)
        .bind(id)
        .execute(&mut *tx.tx)
        .await?;
    Ok(())
}

/// Consent is active when it has never been withdrawn and sharing is on.
pub async fn fetch_active(tx: &mut Tx<'_>) -> StoreResult<Option<ConsentRow>> {
    let row = sqlx::query_as::<_, ConsentRow>(
        "SELECT * FROM consent WHERE withdrawn_at IS NULL AND share_enabled = 1 ORDER BY given_at DESC LIMIT 1",
    )
    .fetch_optional(&mut *tx.tx)
    .await?;
    Ok(row)
}
