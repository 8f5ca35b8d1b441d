// run.rs — `bastion run`: host a run in the foreground.
//
// Before anything touches disk the run must be acknowledged, the repo must
// resolve inside `repos_root`, and the URL must pass the target URL checks.
// Reusing a run id resumes it; the URL then has to match the original
// target unless `--force-target-mismatch` is given.
//
// While the run is going, signals from `bastion signal` are picked up from
// the run's control inbox, and Ctrl-C cancels after the current phase.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;

use bastion_artifacts::{new_run_id, ArtifactStore};
use bastion_policy::{ensure_repo_in_repos_root, ensure_safe_target_url};
use bastion_workflow::{ControlSignal, RunOptions, RunOrchestrator, SafePhaseExecutor};

use super::CliContext;

const INBOX_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the authorized target repository (must be under repos_root).
    #[arg(long)]
    pub repo: String,
    /// Authorized staging URL for this run.
    #[arg(long)]
    pub url: String,
    /// Workspace name used under <workspace_root>/<workspace>/.
    #[arg(long, default_value = "default")]
    pub workspace: String,
    /// Reuse (resume) a specific run id instead of starting a new one.
    #[arg(long)]
    pub run_id: Option<String>,
    /// Explicit acknowledgement that testing the target is authorized.
    #[arg(long)]
    pub i_acknowledge: bool,
    /// Re-run phases even if schema-valid outputs already exist.
    #[arg(long)]
    pub force: bool,
    /// Allow resuming a run whose original URL differs from --url.
    #[arg(long)]
    pub force_target_mismatch: bool,
}

pub async fn execute(ctx: &CliContext, args: &RunArgs) -> anyhow::Result<()> {
    let options = prepare(ctx, args)?;
    let run_id = options.run_id.clone();

    let orchestrator = RunOrchestrator::new(options, Arc::new(SafePhaseExecutor::default()))?;
    let handle = orchestrator.handle();
    let follower = handle.follow_inbox(orchestrator.control_inbox(), INBOX_POLL_INTERVAL);
    println!(
        "Started run {} ({})",
        run_id,
        orchestrator.store().base().display()
    );

    let mut task = tokio::spawn(orchestrator.run());
    let result = loop {
        tokio::select! {
            result = &mut task => break result,
            interrupted = tokio::signal::ctrl_c() => {
                interrupted?;
                tracing::warn!("interrupt received, canceling after the current phase");
                handle.signal(ControlSignal::Cancel)?;
            }
        }
    };
    follower.abort();

    let status = result??;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

/// Validate the inputs and build the options for the run.
pub fn prepare(ctx: &CliContext, args: &RunArgs) -> anyhow::Result<RunOptions> {
    let config = &ctx.config;
    if !(args.i_acknowledge || config.safety.acknowledgement) {
        anyhow::bail!("Acknowledgement required. Pass --i-acknowledge.");
    }

    let repos_root = Path::new(&config.run.repos_root);
    let repo = ensure_repo_in_repos_root(Path::new(&args.repo), repos_root)?;
    let url = ensure_safe_target_url(&args.url)?.to_string();

    let run_id = args.run_id.clone().unwrap_or_else(new_run_id);
    let store = ArtifactStore::open(ctx.workspace_root(), &args.workspace, &run_id)?;
    if let Some(manifest) = store.read_manifest()? {
        if manifest.url != url && !args.force_target_mismatch {
            anyhow::bail!(
                "Run '{}' targeted {} but --url is {}. Use --force-target-mismatch to resume anyway.",
                run_id,
                manifest.url,
                url
            );
        }
    }

    let config_path = ctx
        .config_path
        .canonicalize()
        .unwrap_or_else(|_| ctx.config_path.clone());

    let mut options = RunOptions::new(
        ctx.workspace_root(),
        args.workspace.as_str(),
        run_id,
        url,
        repo.display().to_string(),
    )
    .with_force(args.force)
    .with_config_path(config_path)
    .with_repos_root(repos_root);
    if let Some(prefix) = virtual_repo_prefix(&repo, repos_root) {
        options = options.with_repo_virtual_prefix(prefix);
    }
    Ok(options)
}

/// `/`-rooted path of `repo` relative to the directory holding `repos_root`,
/// e.g. `/repos/app`.
fn virtual_repo_prefix(repo: &Path, repos_root: &Path) -> Option<String> {
    let root = repos_root.canonicalize().ok()?;
    let project = root.parent().unwrap_or(&root);
    let relative = repo.strip_prefix(project).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Some(format!("/{}", parts.join("/")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use bastion_artifacts::create_manifest;
    use bastion_policy::Phase;
    use std::fs;
    use tempfile::tempdir;

    fn args(repo: &Path) -> RunArgs {
        RunArgs {
            repo: repo.display().to_string(),
            url: "https://staging.example.com".into(),
            workspace: "acme".into(),
            run_id: Some("r1".into()),
            i_acknowledge: true,
            force: false,
            force_target_mismatch: false,
        }
    }

    fn setup() -> (tempfile::TempDir, CliContext, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let repo = dir.path().join("repos/app");
        fs::create_dir_all(&repo).unwrap();
        let ctx = testing::context(dir.path());
        (dir, ctx, repo)
    }

    #[test]
    fn acknowledgement_is_required() {
        let (_dir, mut ctx, repo) = setup();
        let mut unacknowledged = args(&repo);
        unacknowledged.i_acknowledge = false;
        let err = prepare(&ctx, &unacknowledged).unwrap_err();
        assert!(err.to_string().contains("--i-acknowledge"));

        ctx.config.safety.acknowledgement = true;
        assert!(prepare(&ctx, &unacknowledged).is_ok());
    }

    #[test]
    fn scope_is_checked_before_anything_is_written() {
        let (dir, ctx, _repo) = setup();
        let outside = dir.path().join("elsewhere");
        fs::create_dir_all(&outside).unwrap();
        assert!(prepare(&ctx, &args(&outside)).is_err());

        let repo = dir.path().join("repos/app");
        let mut bad_url = args(&repo);
        bad_url.url = "ftp://staging.example.com".into();
        assert!(prepare(&ctx, &bad_url).is_err());
        assert!(!ctx.workspace_root().exists());
    }

    #[test]
    fn new_run_gets_a_generated_id() {
        let (_dir, ctx, repo) = setup();
        let mut fresh = args(&repo);
        fresh.run_id = None;
        let options = prepare(&ctx, &fresh).unwrap();
        assert_eq!(options.run_id.len(), 36);
        assert!(options.repos_root.is_some());
        assert_eq!(options.repo_virtual_prefix.as_deref(), Some("/repos/app"));
        assert_eq!(options.url, "https://staging.example.com/");
    }

    #[test]
    fn resume_requires_matching_url() {
        let (_dir, ctx, repo) = setup();
        let store = ArtifactStore::open(ctx.workspace_root(), "acme", "r1").unwrap();
        store
            .write_manifest(&create_manifest(
                "acme",
                "r1",
                "https://other.example.com/",
                "repos/app",
            ))
            .unwrap();

        let err = prepare(&ctx, &args(&repo)).unwrap_err();
        assert!(err.to_string().contains("--force-target-mismatch"));

        let mut forced = args(&repo);
        forced.force_target_mismatch = true;
        assert!(prepare(&ctx, &forced).is_ok());
    }

    #[tokio::test]
    async fn runs_every_phase_to_completion() {
        let (_dir, ctx, repo) = setup();
        execute(&ctx, &args(&repo)).await.unwrap();

        let store = ArtifactStore::open(ctx.workspace_root(), "acme", "r1").unwrap();
        let manifest = store.read_manifest().unwrap().unwrap();
        assert_eq!(manifest.completed_phases, Phase::ALL.to_vec());
        assert!(store.base().join("report/output.json").exists());
    }
}
