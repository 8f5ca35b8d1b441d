// models.rs — The documents stored in a run directory.
//
// Every type here is written to disk as JSON and has an exported JSON Schema
// (see `schema.rs`), so field names are part of the on-disk contract.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bastion_policy::Phase;

/// A pointer to a piece of evidence written during a phase.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct EvidenceRef {
    pub id: String,
    /// Run-relative path of the evidence file.
    pub path: String,
    #[serde(default)]
    pub note: Option<String>,
}

impl EvidenceRef {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The result document of one phase (`<phase>/output.json`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PhaseOutput {
    pub phase: Phase,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
    pub summary: String,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
}

impl PhaseOutput {
    pub fn new(phase: Phase, summary: impl Into<String>) -> Self {
        Self {
            phase,
            generated_at: Utc::now(),
            summary: summary.into(),
            evidence: Vec::new(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// One hashed file in the artifact index.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Run-relative path with `/` separators.
    pub path: String,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// `artifacts/index.json`: every indexed file, sorted and unique by path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ArtifactIndex {
    #[serde(default)]
    pub files: Vec<ArtifactEntry>,
}

impl ArtifactIndex {
    /// Look up the entry for a run-relative path.
    pub fn get(&self, path: &str) -> Option<&ArtifactEntry> {
        self.files
            .binary_search_by(|entry| entry.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.files[i])
    }
}

/// `artifacts/manifest.json`: the durable state of one run.
///
/// Transitions live in `manifest.rs`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ManifestState {
    pub workspace: String,
    pub run_id: String,
    pub url: String,
    pub repo_path: String,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub current_phase: Option<Phase>,
    /// Always in phase-sequence order, without duplicates.
    #[serde(default)]
    pub completed_phases: Vec<Phase>,
    #[serde(default)]
    pub waiting_for_config: bool,
    #[serde(default)]
    pub waiting_reason: Option<String>,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub canceled: bool,
    #[serde(default)]
    pub last_error: Option<String>,
}

/// Answer to a status query on a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RunStatus {
    pub current_phase: Option<Phase>,
    pub completed_phases: Vec<Phase>,
    pub waiting_for_config: bool,
    pub waiting_reason: Option<String>,
    pub paused: bool,
    pub canceled: bool,
    pub last_error: Option<String>,
    pub artifact_index_path: Option<String>,
}

impl RunStatus {
    pub fn from_manifest(manifest: &ManifestState, artifact_index_path: Option<PathBuf>) -> Self {
        Self {
            current_phase: manifest.current_phase,
            completed_phases: manifest.completed_phases.clone(),
            waiting_for_config: manifest.waiting_for_config,
            waiting_reason: manifest.waiting_reason.clone(),
            paused: manifest.paused,
            canceled: manifest.canceled,
            last_error: manifest.last_error.clone(),
            artifact_index_path: artifact_index_path.map(|p| p.display().to_string()),
        }
    }
}
