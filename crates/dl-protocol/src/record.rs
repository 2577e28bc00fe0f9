use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::strategy::StrategyResult;

/// One persisted pipeline run in the append-only driving log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Store-assigned, strictly increasing identifier.
    pub id: i64,
    /// Detections exactly as they were inserted, in detector order.
    pub detections: Vec<Detection>,
    pub strategy: String,
    pub reason: String,
    /// Insertion time assigned by the store.
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn strategy_result(&self) -> StrategyResult {
        StrategyResult::new(&self.strategy, &self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_record_roundtrip() {
        let record = LogRecord {
            id: 7,
            detections: vec![Detection::new("pothole", 0.9, "left")],
            strategy: "avoid".into(),
            reason: "safety".into(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.strategy_result(), StrategyResult::new("avoid", "safety"));
    }
}
