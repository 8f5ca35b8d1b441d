// mod.rs — Subcommand implementations and the context they share.

pub mod audit;
pub mod init;
pub mod plan;
pub mod run;
pub mod schemas;
pub mod signal;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::Context;

use bastion_artifacts::{latest_run_id, ArtifactStore};
use bastion_config::{load_config, BastionConfig};

/// Loaded configuration plus where it came from.
pub struct CliContext {
    pub config_path: PathBuf,
    pub config: BastionConfig,
}

impl CliContext {
    pub fn load(config_path: &Path) -> anyhow::Result<Self> {
        let config = load_config(Some(config_path))
            .with_context(|| format!("failed to load {}", config_path.display()))?;
        Ok(Self {
            config_path: config_path.to_path_buf(),
            config,
        })
    }

    pub fn workspace_root(&self) -> PathBuf {
        PathBuf::from(&self.config.run.workspace_root)
    }

    /// The given run id, or the latest run in `workspace`.
    pub fn resolve_run_id(&self, workspace: &str, run_id: Option<&str>) -> anyhow::Result<String> {
        if let Some(run_id) = run_id {
            return Ok(run_id.to_string());
        }
        latest_run_id(self.workspace_root(), workspace)?
            .ok_or_else(|| anyhow::anyhow!("No runs found for workspace '{}'.", workspace))
    }

    /// Open a run directory that must already exist.
    pub fn open_run(&self, workspace: &str, run_id: Option<&str>) -> anyhow::Result<ArtifactStore> {
        let run_id = self.resolve_run_id(workspace, run_id)?;
        let dir = self.workspace_root().join(workspace).join(&run_id);
        if !dir.is_dir() {
            anyhow::bail!("Run '{}' not found in workspace '{}'.", run_id, workspace);
        }
        Ok(ArtifactStore::open(self.workspace_root(), workspace, &run_id)?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Context whose runs live under `root/runs` and repos under `root/repos`.
    pub fn context(root: &Path) -> CliContext {
        let mut config = BastionConfig::default();
        config.run.workspace_root = root.join("runs").display().to_string();
        config.run.repos_root = root.join("repos").display().to_string();
        CliContext {
            config_path: root.join("bastion.toml"),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn run_id_falls_back_to_latest() {
        let dir = tempdir().unwrap();
        let ctx = testing::context(dir.path());

        let err = ctx.resolve_run_id("acme", None).unwrap_err();
        assert!(err.to_string().contains("No runs found for workspace 'acme'"));

        ArtifactStore::open(ctx.workspace_root(), "acme", "r1").unwrap();
        assert_eq!(ctx.resolve_run_id("acme", None).unwrap(), "r1");
        assert_eq!(ctx.resolve_run_id("acme", Some("r9")).unwrap(), "r9");
    }

    #[test]
    fn open_run_requires_existing_directory() {
        let dir = tempdir().unwrap();
        let ctx = testing::context(dir.path());
        assert!(ctx.open_run("acme", Some("missing")).is_err());
        assert!(!ctx.workspace_root().join("acme/missing").exists());
    }
}
