// status.rs — `bastion status` and `bastion latest`.
//
// Status is read straight from the run's manifest and artifact index, so it
// works whether or not a process is currently hosting the run.

use serde_json::{json, Value};

use bastion_artifacts::{latest_run_id, RunStatus};

use super::CliContext;

pub fn execute(ctx: &CliContext, workspace: &str, run_id: Option<&str>) -> anyhow::Result<()> {
    let report = status_report(ctx, workspace, run_id)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn latest(ctx: &CliContext, workspace: &str) -> anyhow::Result<()> {
    match latest_run_id(ctx.workspace_root(), workspace)? {
        Some(run_id) => println!("{}", run_id),
        None => println!("No runs found for workspace '{}'.", workspace),
    }
    Ok(())
}

fn status_report(ctx: &CliContext, workspace: &str, run_id: Option<&str>) -> anyhow::Result<Value> {
    let store = ctx.open_run(workspace, run_id)?;
    let manifest = store
        .read_manifest()?
        .ok_or_else(|| anyhow::anyhow!("No manifest found in {}.", store.base().display()))?;
    let index = store.read_index()?;
    let status = RunStatus::from_manifest(&manifest, Some(store.index_path()));

    Ok(json!({
        "workspace": manifest.workspace,
        "run_id": manifest.run_id,
        "workflow_id": manifest.workflow_id,
        "url": manifest.url,
        "repo_path": manifest.repo_path,
        "current_phase": status.current_phase,
        "completed_phases": status.completed_phases,
        "waiting_for_config": status.waiting_for_config,
        "waiting_reason": status.waiting_reason,
        "paused": status.paused,
        "canceled": status.canceled,
        "last_error": status.last_error,
        "artifact_index_path": status.artifact_index_path,
        "artifact_count": index.files.len(),
        "artifacts": index.files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing;
    use bastion_artifacts::{create_manifest, ArtifactStore};
    use bastion_policy::Phase;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn reports_manifest_and_index() {
        let dir = tempdir().unwrap();
        let ctx = testing::context(dir.path());
        let store = ArtifactStore::open(ctx.workspace_root(), "acme", "r1").unwrap();

        let mut manifest = create_manifest("acme", "r1", "https://staging.example.com/", "repos/app")
            .with_workflow_id("bastion-acme-r1");
        manifest.mark_phase_completed(Phase::Intake);
        manifest.mark_waiting("LLM provider config required: quota");
        store.write_manifest(&manifest).unwrap();

        let file = store.phase_dir(Phase::Intake).unwrap().join("summary.md");
        fs::write(&file, "# intake\n").unwrap();
        store.append_index(&[file]).unwrap();

        let report = status_report(&ctx, "acme", None).unwrap();
        assert_eq!(report["run_id"], "r1");
        assert_eq!(report["workflow_id"], "bastion-acme-r1");
        assert_eq!(report["completed_phases"], json!(["intake"]));
        assert_eq!(report["waiting_for_config"], true);
        assert_eq!(report["artifact_count"], 1);
        assert_eq!(report["artifacts"][0], "intake/summary.md");
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = tempdir().unwrap();
        let ctx = testing::context(dir.path());
        ArtifactStore::open(ctx.workspace_root(), "acme", "r1").unwrap();
        let err = status_report(&ctx, "acme", Some("r1")).unwrap_err();
        assert!(err.to_string().contains("No manifest found"));
    }
}
