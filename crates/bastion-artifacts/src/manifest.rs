// manifest.rs — ManifestState transitions.
//
// The manifest is the run's checkpoint. Flags move as follows:
//
//   mark_waiting   → waiting_for_config = true, paused cleared
//   clear_waiting  → waiting_for_config = false, reason cleared
//   mark_paused    → paused = true/false
//   mark_canceled  → canceled = true, paused and waiting cleared
//   mark_phase_completed → phase recorded in sequence order, last_error cleared
//
// Every transition is idempotent. Callers persist the manifest after each one.

use bastion_policy::Phase;

use crate::models::ManifestState;

/// Fresh manifest for a new run.
pub fn create_manifest(
    workspace: impl Into<String>,
    run_id: impl Into<String>,
    url: impl Into<String>,
    repo_path: impl Into<String>,
) -> ManifestState {
    ManifestState {
        workspace: workspace.into(),
        run_id: run_id.into(),
        url: url.into(),
        repo_path: repo_path.into(),
        workflow_id: None,
        current_phase: None,
        completed_phases: Vec::new(),
        waiting_for_config: false,
        waiting_reason: None,
        paused: false,
        canceled: false,
        last_error: None,
    }
}

impl ManifestState {
    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn mark_phase_completed(&mut self, phase: Phase) {
        self.current_phase = Some(phase);
        if !self.completed_phases.contains(&phase) {
            self.completed_phases.push(phase);
            self.completed_phases.sort();
        }
        self.last_error = None;
    }

    pub fn mark_waiting(&mut self, reason: impl Into<String>) {
        self.waiting_for_config = true;
        self.waiting_reason = Some(reason.into());
        self.paused = false;
    }

    pub fn clear_waiting(&mut self) {
        self.waiting_for_config = false;
        self.waiting_reason = None;
    }

    pub fn mark_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn mark_canceled(&mut self) {
        self.canceled = true;
        self.paused = false;
        self.clear_waiting();
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }

    pub fn is_phase_completed(&self, phase: Phase) -> bool {
        self.completed_phases.contains(&phase)
    }
}
