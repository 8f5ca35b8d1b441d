// error.rs — Failure taxonomy for phase execution and the run orchestrator.
//
// Every phase failure is a PhaseError. Its FailureKind decides what the
// orchestrator does next:
//
//   Transient       → retried under the RetryPolicy
//   ConfigRequired  → run suspends until configuration is updated
//   Fatal           → run stops and records last_error
//
// Errors that arrive as bare strings (from external agents) go through
// `classify_message`, a substring heuristic kept for compatibility.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use bastion_artifacts::ArtifactError;
use bastion_audit::AuditError;
use bastion_config::ConfigError;
use bastion_guardrail::GuardrailError;
use bastion_policy::{Phase, ScopeError};

/// How the orchestrator should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    ConfigRequired,
    Fatal,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Transient)
    }
}

/// A failure of one phase execution.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// Repository or target URL outside the authorized scope.
    #[error("scope boundary violated: {0}")]
    ScopeBoundary(#[from] ScopeError),

    /// An avoid rule hard-blocked the phase.
    #[error("{reason}")]
    PolicyBlocked { phase: Phase, reason: String },

    /// Provider credentials are missing, invalid, or out of quota.
    #[error("LLM provider config required: {0}")]
    ProviderConfigRequired(String),

    /// Rate limit, timeout, or temporary outage at the provider.
    #[error("LLM provider temporarily unavailable: {0}")]
    ProviderTransient(String),

    /// The phase claimed success but its output does not validate.
    #[error("phase {phase} wrote invalid output at {path}")]
    InvalidPhaseOutput { phase: Phase, path: PathBuf },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("artifact error: {0}")]
    Artifacts(#[from] ArtifactError),

    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    #[error("guardrail error: {0}")]
    Guardrail(#[from] GuardrailError),

    /// A failure reported only as text.
    #[error("{0}")]
    Unclassified(String),
}

impl PhaseError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PhaseError::ProviderConfigRequired(_) => FailureKind::ConfigRequired,
            PhaseError::ProviderTransient(_) => FailureKind::Transient,
            PhaseError::Config(ConfigError::MissingEnvVar(_))
            | PhaseError::Config(ConfigError::IncompleteProvider { .. }) => {
                FailureKind::ConfigRequired
            }
            PhaseError::Unclassified(message) => classify_message(message),
            _ => FailureKind::Fatal,
        }
    }
}

const CONFIG_REQUIRED_MARKERS: &[&str] = &[
    "401",
    "invalid api key",
    "credits",
    "quota",
    "missing env var",
    "config_required",
];

const TRANSIENT_MARKERS: &[&str] = &["429", "timeout", "temporarily unavailable"];

/// Best-effort classification of an untyped failure message.
pub fn classify_message(message: &str) -> FailureKind {
    let lowered = message.to_lowercase();
    if CONFIG_REQUIRED_MARKERS.iter().any(|m| lowered.contains(m)) {
        FailureKind::ConfigRequired
    } else if TRANSIENT_MARKERS.iter().any(|m| lowered.contains(m)) {
        FailureKind::Transient
    } else {
        FailureKind::Fatal
    }
}

/// Orchestrator-level failures that end a run.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Pre-flight scope checks rejected the run.
    #[error("scope boundary violated: {0}")]
    Scope(#[from] ScopeError),

    /// A phase failed and the run stopped.
    #[error("phase {phase} failed: {source}")]
    PhaseFailed {
        phase: Phase,
        #[source]
        source: PhaseError,
    },

    /// Nobody updated the configuration while the run was waiting.
    #[error("phase {phase} waited {waited:?} for provider configuration without an update")]
    ConfigWaitTimedOut { phase: Phase, waited: Duration },

    /// Reading or writing the run directory failed.
    #[error("artifact error: {0}")]
    Artifacts(#[from] ArtifactError),

    /// The control inbox could not be read or written.
    #[error("control inbox error at {path}: {source}")]
    Inbox {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
