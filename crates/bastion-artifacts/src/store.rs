// store.rs — ArtifactStore: the on-disk layout of one run.
//
//   <root>/<workspace>/<run_id>/
//     artifacts/index.json      — SHA-256 of every indexed file
//     artifacts/manifest.json   — ManifestState checkpoint
//     logs/                     — audit streams
//     <phase>/output.json       — PhaseOutput
//     <phase>/summary.md
//     <phase>/coverage.json
//     <phase>/evidence/
//
// The index and manifest are replaced atomically (temp file + rename) so a
// crash never leaves a half-written checkpoint behind. One process owns a
// run directory at a time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use bastion_audit::hash_file;
use bastion_policy::Phase;

use crate::error::ArtifactError;
use crate::models::{ArtifactEntry, ArtifactIndex, ManifestState, PhaseOutput};
use crate::schema::load_phase_output;

/// Files written by [`ArtifactStore::write_phase_artifacts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseArtifactPaths {
    pub output: PathBuf,
    pub summary: PathBuf,
    pub coverage: PathBuf,
}

impl PhaseArtifactPaths {
    pub fn to_vec(&self) -> Vec<PathBuf> {
        vec![
            self.output.clone(),
            self.summary.clone(),
            self.coverage.clone(),
        ]
    }
}

/// Handle on one run directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
    artifacts_dir: PathBuf,
    logs_dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) the run directory for `workspace/run_id`.
    pub fn open(
        workspace_root: impl AsRef<Path>,
        workspace: &str,
        run_id: &str,
    ) -> Result<Self, ArtifactError> {
        let base = workspace_root.as_ref().join(workspace).join(run_id);
        let artifacts_dir = base.join("artifacts");
        let logs_dir = base.join("logs");
        for dir in [&base, &artifacts_dir, &logs_dir] {
            fs::create_dir_all(dir).map_err(|source| ArtifactError::io(dir, source))?;
        }
        Ok(Self {
            base,
            artifacts_dir,
            logs_dir,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn index_path(&self) -> PathBuf {
        self.artifacts_dir.join("index.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.artifacts_dir.join("manifest.json")
    }

    /// The phase directory, with its `evidence/` subdirectory created.
    pub fn phase_dir(&self, phase: Phase) -> Result<PathBuf, ArtifactError> {
        let dir = self.base.join(phase.as_str());
        let evidence = dir.join("evidence");
        fs::create_dir_all(&evidence).map_err(|source| ArtifactError::io(&evidence, source))?;
        Ok(dir)
    }

    pub fn evidence_dir(&self, phase: Phase) -> Result<PathBuf, ArtifactError> {
        Ok(self.phase_dir(phase)?.join("evidence"))
    }

    /// Write `output.json`, `summary.md` and `coverage.json` for a phase,
    /// overwriting any previous copies.
    pub fn write_phase_artifacts(
        &self,
        output: &PhaseOutput,
    ) -> Result<PhaseArtifactPaths, ArtifactError> {
        let dir = self.phase_dir(output.phase)?;
        let paths = PhaseArtifactPaths {
            output: dir.join("output.json"),
            summary: dir.join("summary.md"),
            coverage: dir.join("coverage.json"),
        };

        write_file(&paths.output, serde_json::to_string_pretty(output)?)?;
        write_file(
            &paths.summary,
            format!("# {}\n\n{}\n", output.phase, output.summary),
        )?;
        let coverage = serde_json::json!({"phase": output.phase, "status": "stub"});
        write_file(&paths.coverage, serde_json::to_string_pretty(&coverage)?)?;

        Ok(paths)
    }

    /// Hash `paths` into the index, replacing entries for paths already
    /// present. Returns the index as written.
    pub fn append_index(&self, paths: &[PathBuf]) -> Result<ArtifactIndex, ArtifactError> {
        let mut entries: BTreeMap<String, String> = self
            .read_index()?
            .files
            .into_iter()
            .map(|entry| (entry.path, entry.sha256))
            .collect();

        for path in paths {
            let rel = self.relative_path(path)?;
            let sha256 = hash_file(path)?;
            entries.insert(rel, sha256);
        }

        let index = ArtifactIndex {
            files: entries
                .into_iter()
                .map(|(path, sha256)| ArtifactEntry { path, sha256 })
                .collect(),
        };
        write_atomic(&self.index_path(), &serde_json::to_string_pretty(&index)?)?;
        tracing::debug!(files = index.files.len(), "artifact index updated");
        Ok(index)
    }

    /// The current index; empty if none has been written.
    pub fn read_index(&self) -> Result<ArtifactIndex, ArtifactError> {
        let path = self.index_path();
        if !path.exists() {
            return Ok(ArtifactIndex::default());
        }
        let json = fs::read_to_string(&path).map_err(|source| ArtifactError::io(&path, source))?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn read_manifest(&self) -> Result<Option<ManifestState>, ArtifactError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|source| ArtifactError::io(&path, source))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    pub fn write_manifest(&self, manifest: &ManifestState) -> Result<(), ArtifactError> {
        write_atomic(
            &self.manifest_path(),
            &serde_json::to_string_pretty(manifest)?,
        )
    }

    /// True if the phase already produced a valid output for this run.
    ///
    /// Requires `<phase>/output.json` to parse as a PhaseOutput whose
    /// `phase` matches the directory. `force` always re-runs.
    pub fn should_skip_phase(&self, phase: Phase, force: bool) -> bool {
        if force {
            return false;
        }
        let path = self.base.join(phase.as_str()).join("output.json");
        load_phase_output(&path).is_some_and(|output| output.phase == phase)
    }

    /// Run-relative path with `/` separators.
    fn relative_path(&self, path: &Path) -> Result<String, ArtifactError> {
        let rel = path
            .strip_prefix(&self.base)
            .map_err(|_| ArtifactError::OutsideRun {
                path: path.to_path_buf(),
                base: self.base.clone(),
            })?;
        let parts: Vec<String> = rel
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Ok(parts.join("/"))
    }
}

/// A new random run identifier.
pub fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// The most recently modified run directory in a workspace, if any.
pub fn latest_run_id(
    workspace_root: impl AsRef<Path>,
    workspace: &str,
) -> Result<Option<String>, ArtifactError> {
    let dir = workspace_root.as_ref().join(workspace);
    if !dir.is_dir() {
        return Ok(None);
    }

    let mut latest: Option<(std::time::SystemTime, String)> = None;
    let entries = fs::read_dir(&dir).map_err(|source| ArtifactError::io(&dir, source))?;
    for entry in entries {
        let entry = entry.map_err(|source| ArtifactError::io(&dir, source))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|source| ArtifactError::io(&path, source))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if latest.as_ref().map_or(true, |(t, _)| modified > *t) {
            latest = Some((modified, name));
        }
    }
    Ok(latest.map(|(_, name)| name))
}

fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), ArtifactError> {
    fs::write(path, contents).map_err(|source| ArtifactError::io(path, source))
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<(), ArtifactError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));
    write_file(&tmp, contents)?;
    fs::rename(&tmp, path).map_err(|source| ArtifactError::io(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::create_manifest;
    use crate::models::EvidenceRef;
    use crate::schema::validate_index;
    use tempfile::tempdir;

    fn store(root: &Path) -> ArtifactStore {
        ArtifactStore::open(root, "acme", "run-1").unwrap()
    }

    #[test]
    fn open_creates_layout() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        assert!(s.base().ends_with("acme/run-1"));
        assert!(s.artifacts_dir().is_dir());
        assert!(s.logs_dir().is_dir());
    }

    #[test]
    fn phase_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let first = s.phase_dir(Phase::Recon).unwrap();
        let second = s.phase_dir(Phase::Recon).unwrap();
        assert_eq!(first, second);
        assert!(first.join("evidence").is_dir());
    }

    #[test]
    fn write_phase_artifacts_produces_three_files() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let output = PhaseOutput::new(Phase::Intake, "Scope captured")
            .with_evidence(EvidenceRef::new("ev-1", "intake/evidence/stub.txt"));

        let paths = s.write_phase_artifacts(&output).unwrap();
        let summary = fs::read_to_string(&paths.summary).unwrap();
        assert_eq!(summary, "# intake\n\nScope captured\n");

        let coverage: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&paths.coverage).unwrap()).unwrap();
        assert_eq!(coverage["phase"], "intake");
        assert_eq!(coverage["status"], "stub");

        let written: PhaseOutput =
            serde_json::from_str(&fs::read_to_string(&paths.output).unwrap()).unwrap();
        assert_eq!(written, output);
    }

    #[test]
    fn index_is_sorted_relative_and_deterministic() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let recon = s.write_phase_artifacts(&PhaseOutput::new(Phase::Recon, "r")).unwrap();
        let intake = s.write_phase_artifacts(&PhaseOutput::new(Phase::Intake, "i")).unwrap();

        s.append_index(&recon.to_vec()).unwrap();
        let index = s.append_index(&intake.to_vec()).unwrap();

        let paths: Vec<&str> = index.files.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "intake/coverage.json",
                "intake/output.json",
                "intake/summary.md",
                "recon/coverage.json",
                "recon/output.json",
                "recon/summary.md",
            ]
        );
        assert!(validate_index(&s.index_path()));

        let before = fs::read(s.index_path()).unwrap();
        s.append_index(&recon.to_vec()).unwrap();
        let after = fs::read(s.index_path()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn reindexing_replaces_changed_hash() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let evidence = s.evidence_dir(Phase::Vuln).unwrap().join("note.txt");
        fs::write(&evidence, "first").unwrap();
        let first = s.append_index(&[evidence.clone()]).unwrap();

        fs::write(&evidence, "second").unwrap();
        let second = s.append_index(&[evidence.clone()]).unwrap();

        assert_eq!(second.files.len(), 1);
        assert_ne!(first.files[0].sha256, second.files[0].sha256);
        assert_eq!(second.files[0].path, "vuln/evidence/note.txt");
    }

    #[test]
    fn indexing_outside_run_is_rejected() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        let stray = dir.path().join("stray.txt");
        fs::write(&stray, "x").unwrap();
        let err = s.append_index(&[stray]).unwrap_err();
        assert!(matches!(err, ArtifactError::OutsideRun { .. }));
    }

    #[test]
    fn manifest_round_trips_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        assert!(s.read_manifest().unwrap().is_none());

        let mut manifest = create_manifest("acme", "run-1", "https://staging.acme.test", "repos/acme");
        manifest.mark_phase_completed(Phase::Intake);
        s.write_manifest(&manifest).unwrap();

        assert_eq!(s.read_manifest().unwrap(), Some(manifest));
        assert!(!s.artifacts_dir().join(".manifest.json.tmp").exists());
    }

    #[test]
    fn skip_requires_valid_matching_output() {
        let dir = tempdir().unwrap();
        let s = store(dir.path());
        assert!(!s.should_skip_phase(Phase::Intake, false));

        let phase_dir = s.phase_dir(Phase::Intake).unwrap();
        fs::write(phase_dir.join("output.json"), r#"{"phase":"intake"}"#).unwrap();
        assert!(!s.should_skip_phase(Phase::Intake, false));

        fs::write(
            phase_dir.join("output.json"),
            r#"{"phase":"recon","summary":"misplaced"}"#,
        )
        .unwrap();
        assert!(!s.should_skip_phase(Phase::Intake, false));

        s.write_phase_artifacts(&PhaseOutput::new(Phase::Intake, "ok")).unwrap();
        assert!(s.should_skip_phase(Phase::Intake, false));
        assert!(!s.should_skip_phase(Phase::Intake, true));
    }

    #[test]
    fn latest_run_prefers_most_recent_directory() {
        let dir = tempdir().unwrap();
        assert!(latest_run_id(dir.path(), "acme").unwrap().is_none());

        ArtifactStore::open(dir.path(), "acme", "older").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        ArtifactStore::open(dir.path(), "acme", "newer").unwrap();

        assert_eq!(
            latest_run_id(dir.path(), "acme").unwrap().as_deref(),
            Some("newer")
        );
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(new_run_id(), new_run_id());
    }
}
