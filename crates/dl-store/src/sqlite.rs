//! SQLite-backed record store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use dl_protocol::{Detection, LogRecord, validate_all};

use crate::RecordStore;
use crate::error::{StorageError, StorageResult};

/// Row as stored in `driving_log`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct LogRow {
    id: i64,
    detections: String,
    strategy: String,
    reason: String,
    timestamp: NaiveDateTime,
}

impl TryFrom<LogRow> for LogRecord {
    type Error = StorageError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let detections: Vec<Detection> =
            serde_json::from_str(&row.detections).map_err(|e| StorageError::Corrupt {
                id: row.id,
                reason: format!("detections column is not valid JSON: {e}"),
            })?;
        Ok(LogRecord {
            id: row.id,
            detections,
            strategy: row.strategy,
            reason: row.reason,
            timestamp: row.timestamp.and_utc(),
        })
    }
}

/// Durable driving log in a SQLite database.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) the database at `database_url` and run migrations.
    ///
    /// In-memory URLs are pinned to a single long-lived connection so the
    /// database is not dropped between queries.
    pub async fn connect(database_url: &str, max_connections: u32) -> StorageResult<Self> {
        let in_memory = is_in_memory(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_options.connect_with(options).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Fresh private in-memory database (tests and development).
    pub async fn in_memory() -> StorageResult<Self> {
        Self::connect("sqlite::memory:", 1).await
    }

    /// Wrap an existing pool. Call [`migrate`](Self::migrate) before use.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> StorageResult<()> {
        tracing::info!("running database migrations");
        sqlx::raw_sql(include_str!("../migrations/001_driving_log.sql"))
            .execute(&self.pool)
            .await?;
        tracing::info!("migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(
        &self,
        detections: &[Detection],
        strategy: &str,
        reason: &str,
    ) -> StorageResult<i64> {
        validate_all(detections)?;
        let detections_json = serde_json::to_string(detections)?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO driving_log (detections, strategy, reason) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(&detections_json)
        .bind(strategy)
        .bind(reason)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(record_id = id, detection_count = detections.len(), "record inserted");
        Ok(id)
    }

    async fn fetch_latest(&self) -> StorageResult<Option<LogRecord>> {
        let row = sqlx::query_as::<_, LogRow>(
            "SELECT id, detections, strategy, reason, timestamp FROM driving_log ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        row.map(LogRecord::try_from).transpose()
    }

    async fn fetch_all(&self) -> StorageResult<Vec<LogRecord>> {
        let rows = sqlx::query_as::<_, LogRow>(
            "SELECT id, detections, strategy, reason, timestamp FROM driving_log ORDER BY id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LogRecord::try_from).collect()
    }

    fn backend_name(&self) -> &str {
        "sqlite"
    }
}
