// context.rs — Where a guarded agent is running.
//
// A GuardrailContext names the run (workspace, run id, phase) and the
// assessment inputs (base URL, repo path). Log and evidence locations are
// derived from it using the standard run directory layout.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use bastion_policy::Phase;

/// Identity and inputs of the phase an agent is working in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailContext {
    pub phase: Phase,
    /// Base URL of the staging target.
    pub url: String,
    pub repo_path: String,
    pub workspace: String,
    pub run_id: String,
    /// Root that holds all workspaces (`runs` by default).
    pub workspace_root: PathBuf,
    pub config_path: PathBuf,
}

impl GuardrailContext {
    pub fn new(
        phase: Phase,
        url: impl Into<String>,
        repo_path: impl Into<String>,
        workspace: impl Into<String>,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            url: url.into(),
            repo_path: repo_path.into(),
            workspace: workspace.into(),
            run_id: run_id.into(),
            workspace_root: PathBuf::from("runs"),
            config_path: PathBuf::from(bastion_config::DEFAULT_CONFIG_FILE),
        }
    }

    pub fn with_workspace_root(mut self, root: impl AsRef<Path>) -> Self {
        self.workspace_root = root.as_ref().to_path_buf();
        self
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = path.as_ref().to_path_buf();
        self
    }

    pub fn run_dir(&self) -> PathBuf {
        self.workspace_root.join(&self.workspace).join(&self.run_id)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.run_dir().join("logs")
    }

    pub fn evidence_dir(&self) -> PathBuf {
        self.run_dir().join(self.phase.as_str()).join("evidence")
    }
}
