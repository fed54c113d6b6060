use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

use crate::error::StoreResult;

/// Connection settings for the embedded store (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        Self {
            path: std::env::var("MIRA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("mira.db")),
            max_connections: std::env::var("MIRA_SQLITE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: PathBuf::from(":memory:"),
            max_connections: 1,
        }
    }
}

/// The embedded, single-writer relational store.
///
/// WAL mode plus `synchronous = NORMAL` match the durability/throughput
/// tradeoff the backend's own sqlite-backed stores use; a 64 MiB page
/// cache and in-memory temp store keep the hot path off disk.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let in_memory = config.path.as_os_str() == ":memory:";
        let existed = !in_memory && config.path.exists();

        let mut opts = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path.display()))?
                .create_if_missing(true)
        };

        opts = opts
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("temp_store", "MEMORY")
            .pragma("cache_size", "-65536");

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(opts)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        if !in_memory && !existed {
            Self::restrict_permissions(&config.path)?;
        }

        info!(path = %config.path.display(), "store connected");
        Ok(Self { pool })
    }

    #[cfg(unix)]
    fn restrict_permissions(path: &Path) -> StoreResult<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn restrict_permissions(_path: &Path) -> StoreResult<()> {
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> StoreResult<Tx<'_>> {
        Ok(Tx {
            tx: self.pool.begin().await?,
        })
    }
}

/// A single-writer transaction handle. All mutating per-entity operations
/// take one of these; commit or rollback is explicit.
pub struct Tx<'a> {
    pub(crate) tx: Transaction<'a, Sqlite>,
}

impl<'a> Tx<'a> {
    pub async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
