//! In-memory record store for tests and development.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use dl_protocol::{Detection, LogRecord, validate_all};

use crate::RecordStore;
use crate::error::StorageResult;

/// Volatile driving log. Same ordering and id rules as the SQLite backend.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<Vec<LogRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(
        &self,
        detections: &[Detection],
        strategy: &str,
        reason: &str,
    ) -> StorageResult<i64> {
        validate_all(detections)?;

        let mut records = self.records.write().await;
        let id = records.last().map_or(1, |r| r.id + 1);
        records.push(LogRecord {
            id,
            detections: detections.to_vec(),
            strategy: strategy.to_string(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        Ok(id)
    }

    async fn fetch_latest(&self) -> StorageResult<Option<LogRecord>> {
        Ok(self.records.read().await.last().cloned())
    }

    async fn fetch_all(&self) -> StorageResult<Vec<LogRecord>> {
        Ok(self.records.read().await.iter().rev().cloned().collect())
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
