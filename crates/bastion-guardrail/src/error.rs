// error.rs — Error types for the guardrail boundary.

use thiserror::Error;

/// Errors from setting up a guardrail or recording a denial.
///
/// A denial whose evidence or audit record could not be written surfaces as
/// `Audit` or `Io`; the tool call must not run.
#[derive(Debug, Error)]
pub enum GuardrailError {
    /// The run configuration could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] bastion_config::ConfigError),

    /// The audit log could not be opened or written.
    #[error("audit error: {0}")]
    Audit(#[from] bastion_audit::AuditError),

    /// The evidence directory or an evidence file could not be written.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}
