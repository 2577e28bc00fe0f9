//! Pipeline error types.

use std::path::PathBuf;

use thiserror::Error;

use dl_protocol::{DetectionError, InferenceFailureKind};
use dl_store::StorageError;

/// Failure of a call to the external inference service.
///
/// Never escapes the orchestrator: it is folded into an
/// [`InferenceOutcome::Failed`](dl_protocol::InferenceOutcome) instead.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("authentication rejected (HTTP {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("quota exceeded (HTTP 429): {0}")]
    Quota(String),

    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("failed to read image: {0}")]
    Image(#[from] std::io::Error),
}

impl InferenceError {
    pub fn kind(&self) -> InferenceFailureKind {
        match self {
            Self::Auth { .. } => InferenceFailureKind::Auth,
            Self::Quota(_) => InferenceFailureKind::Quota,
            Self::Timeout { .. } => InferenceFailureKind::Timeout,
            Self::Network(_) => InferenceFailureKind::Network,
            Self::Provider(_) => InferenceFailureKind::Provider,
            Self::Image(_) => InferenceFailureKind::Image,
        }
    }
}

/// Failure of the detector collaborator.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("cannot read detections from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed detection file: {0}")]
    Format(#[from] serde_json::Error),

    #[error("detector produced an invalid detection: {0}")]
    Invalid(#[from] DetectionError),

    #[error("no detection source for an in-memory image")]
    NoSource,
}

/// Hard failures of a pipeline run. Inference and parse failures are not
/// here: they become data on the returned run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("detector failure: {0}")]
    Detector(#[from] DetectorError),

    #[error("invalid detection: {0}")]
    InvalidDetection(#[from] DetectionError),

    #[error("a pipeline run is already in progress")]
    Busy,
}

/// Convenience alias for pipeline results.
pub type PipelineResult<T> = Result<T, PipelineError>;
