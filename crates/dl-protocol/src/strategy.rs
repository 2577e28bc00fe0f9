use serde::{Deserialize, Serialize};

/// Strategy text used when a reply cannot be turned into a strategy.
pub const SENTINEL_STRATEGY: &str = "분석 실패";
/// Reason text used when a reply cannot be turned into a strategy.
pub const SENTINEL_REASON: &str = "GPT 응답 포맷이 올바르지 않습니다.";

/// Driving strategy recommendation and its justification.
///
/// Both fields are always non-empty; the sentinel fills in whatever the
/// model reply failed to provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub strategy: String,
    pub reason: String,
}

impl StrategyResult {
    pub fn new(strategy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            strategy: strategy.into(),
            reason: reason.into(),
        }
    }

    /// The fixed "analysis failed" result.
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_STRATEGY, SENTINEL_REASON)
    }

    pub fn is_sentinel(&self) -> bool {
        self.strategy == SENTINEL_STRATEGY && self.reason == SENTINEL_REASON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_fields() {
        let s = StrategyResult::sentinel();
        assert_eq!(s.strategy, "분석 실패");
        assert_eq!(s.reason, "GPT 응답 포맷이 올바르지 않습니다.");
        assert!(s.is_sentinel());
        assert!(!StrategyResult::new("avoid", "safety").is_sentinel());
    }
}
