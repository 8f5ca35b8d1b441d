// error.rs — Error types for the policy subsystem.
//
// Rule evaluation itself never fails; only the scope guards that run before
// a run starts can reject input.

use std::path::PathBuf;
use thiserror::Error;

/// The repository or target URL falls outside what the operator authorized.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// The repository path resolves outside the configured repos root.
    #[error("Repository must be inside {root}. Got: {repo}")]
    RepoOutsideRoot { repo: PathBuf, root: PathBuf },

    /// A path could not be resolved (missing directory, permissions).
    #[error("failed to resolve {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The target URL failed a safety check.
    #[error("unsafe target URL '{url}': {reason}")]
    UnsafeUrl { url: String, reason: String },
}
