use serde::{Deserialize, Serialize};

/// Why a call to the inference service produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceFailureKind {
    /// Credentials rejected (HTTP 401/403).
    Auth,
    /// Rate limit or quota exhausted (HTTP 429).
    Quota,
    /// Connection could not be established or was dropped.
    Network,
    /// The request exceeded the configured timeout.
    Timeout,
    /// Provider-side error or an unusable response body.
    Provider,
    /// The image could not be read before the call.
    Image,
}

impl InferenceFailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Quota => "quota",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::Provider => "provider",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for InferenceFailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one inference call, tagged so a transport failure can never be
/// mistaken for model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InferenceOutcome {
    Reply { text: String },
    Failed { kind: InferenceFailureKind, message: String },
}

impl InferenceOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}
