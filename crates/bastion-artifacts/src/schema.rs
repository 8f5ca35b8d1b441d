// schema.rs — Validation of stored documents and JSON Schema export.
//
// Validation never errors: a document that is missing, unreadable, or does
// not deserialize into its model is simply invalid.

use std::fs;
use std::path::{Path, PathBuf};

use schemars::{schema_for, Schema};
use serde::de::DeserializeOwned;

use crate::error::ArtifactError;
use crate::models::{ArtifactIndex, EvidenceRef, ManifestState, PhaseOutput, RunStatus};

fn read_model<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let json = fs::read_to_string(path).ok()?;
    serde_json::from_str(&json).ok()
}

/// Parse a phase output document, or `None` if it is not valid.
pub fn load_phase_output(path: &Path) -> Option<PhaseOutput> {
    read_model(path)
}

pub fn validate_phase_output(path: &Path) -> bool {
    load_phase_output(path).is_some()
}

pub fn validate_manifest(path: &Path) -> bool {
    read_model::<ManifestState>(path).is_some()
}

/// An index is valid if it parses and its entries are sorted and unique by
/// path.
pub fn validate_index(path: &Path) -> bool {
    read_model::<ArtifactIndex>(path)
        .is_some_and(|index| index.files.windows(2).all(|w| w[0].path < w[1].path))
}

/// The exported schemas, keyed by document name.
pub fn schemas() -> Vec<(&'static str, Schema)> {
    vec![
        ("EvidenceRef", schema_for!(EvidenceRef)),
        ("PhaseOutput", schema_for!(PhaseOutput)),
        ("ArtifactIndex", schema_for!(ArtifactIndex)),
        ("ManifestState", schema_for!(ManifestState)),
        ("RunStatus", schema_for!(RunStatus)),
    ]
}

/// Write one `<Name>.json` schema file per document into `target_dir`.
pub fn export_schemas(target_dir: &Path) -> Result<Vec<PathBuf>, ArtifactError> {
    fs::create_dir_all(target_dir).map_err(|source| ArtifactError::io(target_dir, source))?;
    let mut written = Vec::new();
    for (name, schema) in schemas() {
        let path = target_dir.join(format!("{}.json", name));
        let json = serde_json::to_string_pretty(&schema)?;
        fs::write(&path, json).map_err(|source| ArtifactError::io(&path, source))?;
        written.push(path);
    }
    Ok(written)
}
