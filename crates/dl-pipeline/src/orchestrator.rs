//! Pipeline orchestration: detections → prompt → inference → parse → log.
//!
//! Every dependency is injected. Inference failures become data on the
//! returned [`PipelineRun`]; only storage and detector failures are errors.
//!
//! One run at a time: a run started while another is in flight is rejected
//! with [`PipelineError::Busy`] and leaves no trace in the store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::Instrument;
use uuid::Uuid;

use dl_protocol::{
    Detection, InferenceOutcome, LogRecord, SENTINEL_STRATEGY, StrategyResult, validate_all,
};
use dl_store::RecordStore;

use crate::detector::Detector;
use crate::error::{PipelineError, PipelineResult};
use crate::inference::{ImageSource, InferenceService};
use crate::parser::{ScanMode, parse_strategy};
use crate::prompt::build_prompt;

/// Behavior switches for the orchestrator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestratorConfig {
    /// How the JSON object is located in model replies.
    #[serde(default)]
    pub scan: ScanMode,
    /// Persist runs whose inference call failed. The stored reason names the
    /// failure, so such rows never look like a model-produced strategy.
    #[serde(default)]
    pub record_failed_runs: bool,
}

/// Input for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub image: ImageSource,
    /// Pre-computed detections. `None` asks the configured detector, or runs
    /// with no detections when there is none.
    pub detections: Option<Vec<Detection>>,
    /// Free-text operator addendum appended to the prompt.
    pub addendum: Option<String>,
}

impl RunRequest {
    pub fn new(image: ImageSource) -> Self {
        Self {
            image,
            detections: None,
            addendum: None,
        }
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = Some(detections);
        self
    }

    pub fn with_addendum(mut self, addendum: impl Into<String>) -> Self {
        self.addendum = Some(addendum.into());
        self
    }
}

/// Result of one completed pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    /// Correlation id carried on every log line of the run.
    pub run_id: Uuid,
    /// Store id, or `None` when a failed run was not persisted.
    pub record_id: Option<i64>,
    pub detections: Vec<Detection>,
    pub result: StrategyResult,
    /// Raw reply or tagged failure from the inference service.
    pub inference: InferenceOutcome,
}

/// Sequences the pipeline stages over injected collaborators.
pub struct Orchestrator {
    inference: Arc<dyn InferenceService>,
    store: Arc<dyn RecordStore>,
    detector: Option<Arc<dyn Detector>>,
    config: OrchestratorConfig,
    in_flight: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        store: Arc<dyn RecordStore>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            inference,
            store,
            detector: None,
            config,
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute one run end to end.
    pub async fn run(&self, request: RunRequest) -> PipelineResult<PipelineRun> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("pipeline run rejected: another run is in progress");
            return Err(PipelineError::Busy);
        };

        let run_id = Uuid::now_v7();
        let span = tracing::info_span!("pipeline_run", run_id = %run_id);
        self.run_stages(run_id, request).instrument(span).await
    }

    async fn run_stages(&self, run_id: Uuid, request: RunRequest) -> PipelineResult<PipelineRun> {
        let detections = self.resolve_detections(&request).await?;
        validate_all(&detections)?;

        let prompt = build_prompt(&detections, request.addendum.as_deref());
        tracing::debug!(
            detection_count = detections.len(),
            prompt_len = prompt.len(),
            model = self.inference.model_name(),
            "prompt built"
        );

        let inference = match self.inference.infer(&request.image, &prompt).await {
            Ok(text) => InferenceOutcome::Reply { text },
            Err(e) => {
                tracing::warn!(error = %e, kind = %e.kind(), "inference call failed");
                InferenceOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        };

        let (result, record_id) = match &inference {
            InferenceOutcome::Reply { text } => {
                let result = parse_strategy(text, self.config.scan);
                let id = self
                    .store
                    .insert(&detections, &result.strategy, &result.reason)
                    .await?;
                (result, Some(id))
            }
            InferenceOutcome::Failed { kind, message } => {
                let id = if self.config.record_failed_runs {
                    let reason = format!("inference failed ({kind}): {message}");
                    Some(
                        self.store
                            .insert(&detections, SENTINEL_STRATEGY, &reason)
                            .await?,
                    )
                } else {
                    tracing::info!(kind = %kind, "failed run not recorded");
                    None
                };
                (StrategyResult::sentinel(), id)
            }
        };

        tracing::info!(
            record_id = ?record_id,
            strategy = %result.strategy,
            sentinel = result.is_sentinel(),
            "pipeline run complete"
        );

        Ok(PipelineRun {
            run_id,
            record_id,
            detections,
            result,
            inference,
        })
    }

    async fn resolve_detections(&self, request: &RunRequest) -> PipelineResult<Vec<Detection>> {
        if let Some(detections) = &request.detections {
            return Ok(detections.clone());
        }
        match &self.detector {
            Some(detector) => {
                let detections = detector.detect(&request.image).await?;
                tracing::debug!(detector = detector.name(), count = detections.len(), "detector ran");
                Ok(detections)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Most recent log record, if any.
    pub async fn latest(&self) -> PipelineResult<Option<LogRecord>> {
        Ok(self.store.fetch_latest().await?)
    }

    /// Entire log, most recent first.
    pub async fn history(&self) -> PipelineResult<Vec<LogRecord>> {
        Ok(self.store.fetch_all().await?)
    }
}
