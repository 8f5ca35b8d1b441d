// error.rs — Error types for configuration loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a Bastion configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file could not be written (scaffolding).
    #[error("failed to write config at {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The TOML did not parse into the expected shape.
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// A focus/avoid rule was declared with an empty value.
    #[error("{group} rule #{index} ({kind}): rule value must not be empty")]
    EmptyRuleValue {
        group: &'static str,
        index: usize,
        kind: String,
    },

    /// The selected provider needs settings that were not supplied.
    #[error("provider '{provider}' requires {field}")]
    IncompleteProvider {
        provider: String,
        field: &'static str,
    },

    /// The environment variable holding provider credentials is unset.
    #[error("Missing env var {0}")]
    MissingEnvVar(String),
}
