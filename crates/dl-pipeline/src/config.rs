//! Pipeline configuration, loadable from TOML with environment fallbacks.

use serde::Deserialize;

use crate::inference::InferenceConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::parser::ScanMode;

/// Top-level configuration for the pipeline binary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    /// Persist runs whose inference call failed.
    #[serde(default)]
    pub record_failed_runs: bool,
    /// Driving log storage.
    #[serde(default)]
    pub store: StoreConfig,
    /// Vision-language model endpoint.
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Reply parsing.
    #[serde(default)]
    pub parser: ParserConfig,
}

/// Driving log storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// SQLite URL (e.g., "sqlite://driving_log.db"). None keeps the log in memory.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Pool size for file-backed databases.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    4
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParserConfig {
    #[serde(default)]
    pub scan: ScanMode,
}

impl PipelineConfig {
    /// Load config from a TOML file path, then fill unset secrets from the
    /// environment (`OPENAI_API_KEY`, `DATABASE_URL`).
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config.with_env_fallbacks(|key| std::env::var(key).ok()))
    }

    /// Fill `None` fields from `lookup` (normally `std::env::var`).
    pub fn with_env_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.inference.api_key.is_none() {
            self.inference.api_key = lookup("OPENAI_API_KEY");
        }
        if self.store.database_url.is_none() {
            self.store.database_url = lookup("DATABASE_URL");
        }
        self
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            scan: self.parser.scan,
            record_failed_runs: self.record_failed_runs,
        }
    }
}
