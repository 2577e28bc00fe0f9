//! DriveLens record store — append-only persistence of pipeline runs.
//!
//! Two backends share the [`RecordStore`] trait:
//! - **SQLite** (`SqliteRecordStore`): durable storage via `sqlx` (production).
//! - **In-memory** (`MemoryRecordStore`): `RwLock<Vec>` (tests and development).
//!
//! Single-insert atomicity comes from the backend. Concurrent writers are
//! serialized by SQLite itself, not by this crate.

pub mod error;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use dl_protocol::{Detection, LogRecord};

pub use error::{StorageError, StorageResult};
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

/// Append-only log of completed pipeline runs.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a run and return its newly assigned id.
    ///
    /// The record is written in full or not at all.
    async fn insert(
        &self,
        detections: &[Detection],
        strategy: &str,
        reason: &str,
    ) -> StorageResult<i64>;

    /// The record with the highest id, or `None` when the log is empty.
    async fn fetch_latest(&self) -> StorageResult<Option<LogRecord>>;

    /// Every record, most recent (highest id) first.
    async fn fetch_all(&self) -> StorageResult<Vec<LogRecord>>;

    /// Backend name (for logging).
    fn backend_name(&self) -> &str;
}
