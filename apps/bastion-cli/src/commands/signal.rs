// signal.rs — `bastion signal`: queue a control signal for a run.
//
// The signal is appended to the run's control inbox. The process hosting
// the run applies it within a second; a run started later replays the
// inbox on startup.

use bastion_workflow::{ControlInbox, ControlSignal};

use super::CliContext;

pub fn execute(
    ctx: &CliContext,
    signal: ControlSignal,
    workspace: &str,
    run_id: Option<&str>,
) -> anyhow::Result<()> {
    let inbox = send(ctx, signal, workspace, run_id)?;
    println!("Sent {} ({})", signal, inbox.path().display());
    Ok(())
}

fn send(
    ctx: &CliContext,
    signal: ControlSignal,
    workspace: &str,
    run_id: Option<&str>,
) -> anyhow::Result<ControlInbox> {
    let store = ctx.open_run(workspace, run_id)?;
    if store.read_manifest()?.is_none() {
        anyhow::bail!("No manifest found in {}.", store.base().display());
    }
    let inbox = ControlInbox::new(store.artifacts_dir());
    inbox.send(signal)?;
    tracing::info!(%signal, run = %store.base().display(), "control signal queued");
    Ok(inbox)
}
