// orchestrator.rs — RunOrchestrator: one assessment run, phase by phase.
//
// The run state machine:
//   Idle → Running(phase) → {Paused, WaitingForConfig, Running(next)}
//     → Completed | Canceled | Failed
//
// For each phase in Phase::ALL:
//   1. wait while paused (poll interval, woken early by signals)
//   2. stop if canceled
//   3. execute through the PhaseExecutor, retrying transient failures
//   4. completed/skipped → record, persist, next phase
//      config-required  → persist the wait, block until update_config or
//                         cancel (bounded), then re-attempt the same phase
//      anything else    → record last_error, persist, fail the run
//
// Cancellation is observed between phases and at suspension points only; a
// phase in flight always runs to completion. Every manifest mutation is
// written to disk before the lock is released, so another process can pick
// the run up from its manifest.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};

use bastion_artifacts::{create_manifest, ArtifactStore, ManifestState, RunStatus};
use bastion_config::DEFAULT_CONFIG_FILE;
use bastion_policy::{ensure_repo_in_repos_root, ensure_safe_target_url, Phase};

use crate::error::{FailureKind, PhaseError, WorkflowError};
use crate::executor::{PhaseExecutor, PhaseOutcome, PhaseRequest};
use crate::retry::RetryPolicy;
use crate::signals::{ControlInbox, ControlSignal};

/// Where a run is in its lifecycle.
///
/// Serializes as `{"state": "running", "phase": "recon"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Created, not started.
    Idle,
    Running { phase: Phase },
    /// Held before `phase` by a pause signal.
    Paused { phase: Phase },
    /// `phase` needs provider configuration before it can be re-attempted.
    WaitingForConfig { phase: Phase },
    Completed,
    Canceled,
    Failed { reason: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Canceled | RunState::Failed { .. }
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running { phase } => write!(f, "running({})", phase),
            RunState::Paused { phase } => write!(f, "paused({})", phase),
            RunState::WaitingForConfig { phase } => write!(f, "waiting_for_config({})", phase),
            RunState::Completed => write!(f, "completed"),
            RunState::Canceled => write!(f, "canceled"),
            RunState::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// Inputs and tuning for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub workspace_root: PathBuf,
    pub workspace: String,
    pub run_id: String,
    pub url: String,
    pub repo_path: String,
    /// Re-run phases even when a valid output already exists.
    pub force: bool,
    pub config_path: PathBuf,
    /// When set, `repo_path` must resolve inside this directory.
    pub repos_root: Option<PathBuf>,
    /// Virtual root that prerecon file tools are confined to.
    pub repo_virtual_prefix: Option<String>,
    pub pause_poll_interval: Duration,
    pub config_wait_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RunOptions {
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        workspace: impl Into<String>,
        run_id: impl Into<String>,
        url: impl Into<String>,
        repo_path: impl Into<String>,
    ) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            workspace: workspace.into(),
            run_id: run_id.into(),
            url: url.into(),
            repo_path: repo_path.into(),
            force: false,
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
            repos_root: None,
            repo_virtual_prefix: None,
            pause_poll_interval: Duration::from_secs(2),
            config_wait_timeout: Duration::from_secs(24 * 60 * 60),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = path.into();
        self
    }

    pub fn with_repos_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repos_root = Some(root.into());
        self
    }

    pub fn with_repo_virtual_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.repo_virtual_prefix = Some(prefix.into());
        self
    }

    pub fn with_pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = interval;
        self
    }

    pub fn with_config_wait_timeout(mut self, timeout: Duration) -> Self {
        self.config_wait_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn workflow_id(&self) -> String {
        format!("bastion-{}-{}", self.workspace, self.run_id)
    }
}

struct Inner {
    manifest: ManifestState,
    state: RunState,
}

/// State shared between the run loop and its handles.
struct Shared {
    store: ArtifactStore,
    inner: Mutex<Inner>,
    wake: Notify,
}

impl Shared {
    // A panic while holding the lock leaves the manifest in a consistent
    // state (every mutation is a single field update), so poisoning is
    // ignored.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `f` and persist the manifest under the same lock.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R, WorkflowError> {
        let mut inner = self.lock();
        let result = f(&mut inner);
        self.store.write_manifest(&inner.manifest)?;
        Ok(result)
    }

    fn set_state(&self, state: RunState) {
        self.lock().state = state;
    }

    /// `(paused, canceled, waiting_for_config)` right now.
    fn flags(&self) -> (bool, bool, bool) {
        let inner = self.lock();
        (
            inner.manifest.paused,
            inner.manifest.canceled,
            inner.manifest.waiting_for_config,
        )
    }

    fn status(&self) -> RunStatus {
        RunStatus::from_manifest(&self.lock().manifest, Some(self.store.index_path()))
    }
}

/// Cloneable control surface of a run: signals and status queries.
#[derive(Clone)]
pub struct RunHandle {
    shared: Arc<Shared>,
}

impl RunHandle {
    /// Apply a control signal, persist it, and wake the run loop.
    pub fn signal(&self, signal: ControlSignal) -> Result<(), WorkflowError> {
        self.shared
            .update(|inner| signal.apply(&mut inner.manifest))?;
        tracing::info!(%signal, "control signal applied");
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Snapshot of the run. Never mutates anything.
    pub fn status(&self) -> RunStatus {
        self.shared.status()
    }

    pub fn state(&self) -> RunState {
        self.shared.lock().state.clone()
    }

    /// Forward signals appended to `inbox` by other processes.
    ///
    /// The inbox is read from the start, so signals sent before this process
    /// started are applied too. The task ends once the run reaches a
    /// terminal state.
    pub fn follow_inbox(&self, inbox: ControlInbox, interval: Duration) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            let mut offset = 0;
            loop {
                match inbox.read_from(offset) {
                    Ok((messages, next)) => {
                        offset = next;
                        for message in messages {
                            if let Err(e) = handle.signal(message.signal) {
                                tracing::warn!(signal = %message.signal, error = %e, "failed to apply inbox signal");
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to read control inbox"),
                }
                if handle.state().is_terminal() {
                    break;
                }
                sleep(interval).await;
            }
        })
    }
}

enum ConfigWait {
    Updated,
    Canceled,
}

/// Drives one run through the fixed phase sequence.
pub struct RunOrchestrator {
    options: RunOptions,
    executor: Arc<dyn PhaseExecutor>,
    shared: Arc<Shared>,
}

impl RunOrchestrator {
    /// Open the run directory and load its manifest, creating one for a new
    /// run. Completed phases, pause and cancel flags of an existing run
    /// carry over.
    pub fn new(
        options: RunOptions,
        executor: Arc<dyn PhaseExecutor>,
    ) -> Result<Self, WorkflowError> {
        let store = ArtifactStore::open(&options.workspace_root, &options.workspace, &options.run_id)?;
        let manifest = match store.read_manifest()? {
            Some(existing) => {
                tracing::info!(
                    run_id = %options.run_id,
                    completed = existing.completed_phases.len(),
                    "loaded existing run manifest"
                );
                existing
            }
            None => create_manifest(
                options.workspace.as_str(),
                options.run_id.as_str(),
                options.url.as_str(),
                options.repo_path.as_str(),
            )
            .with_workflow_id(options.workflow_id()),
        };
        store.write_manifest(&manifest)?;

        Ok(Self {
            options,
            executor,
            shared: Arc::new(Shared {
                store,
                inner: Mutex::new(Inner {
                    manifest,
                    state: RunState::Idle,
                }),
                wake: Notify::new(),
            }),
        })
    }

    pub fn handle(&self) -> RunHandle {
        RunHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.shared.store
    }

    /// The cross-process signal inbox of this run.
    pub fn control_inbox(&self) -> ControlInbox {
        ControlInbox::new(self.shared.store.artifacts_dir())
    }

    /// Run every phase to completion, cancellation, or failure.
    ///
    /// A canceled run is not an error: the final status is returned with
    /// `canceled` set.
    pub async fn run(self) -> Result<RunStatus, WorkflowError> {
        if let Err(e) = self.preflight() {
            return Err(self.fail(e));
        }
        tracing::info!(
            workspace = %self.options.workspace,
            run_id = %self.options.run_id,
            url = %self.options.url,
            "run started"
        );

        for phase in Phase::ALL {
            if !self.wait_while_paused(phase).await {
                return Ok(self.finish_canceled());
            }

            loop {
                self.shared.set_state(RunState::Running { phase });

                match self.execute_with_retry(phase).await {
                    Ok(outcome) => {
                        self.record_outcome(&outcome)?;
                        break;
                    }
                    Err(error) if error.kind() == FailureKind::ConfigRequired => {
                        match self.wait_for_config(phase, error.to_string()).await? {
                            ConfigWait::Updated => continue,
                            ConfigWait::Canceled => return Ok(self.finish_canceled()),
                        }
                    }
                    Err(error) => {
                        return Err(self.fail(WorkflowError::PhaseFailed {
                            phase,
                            source: error,
                        }))
                    }
                }
            }
        }

        self.shared.set_state(RunState::Completed);
        tracing::info!(run_id = %self.options.run_id, "run completed");
        Ok(self.shared.status())
    }

    fn preflight(&self) -> Result<(), WorkflowError> {
        ensure_safe_target_url(&self.options.url)?;
        if let Some(root) = &self.options.repos_root {
            ensure_repo_in_repos_root(Path::new(&self.options.repo_path), root)?;
        }
        Ok(())
    }

    fn request(&self, phase: Phase) -> PhaseRequest {
        PhaseRequest {
            workspace_root: self.options.workspace_root.clone(),
            workspace: self.options.workspace.clone(),
            run_id: self.options.run_id.clone(),
            repo_path: self.options.repo_path.clone(),
            url: self.options.url.clone(),
            phase,
            force: self.options.force,
            effective_config_path: self.options.config_path.clone(),
            repo_virtual_prefix: self.options.repo_virtual_prefix.clone(),
        }
    }

    async fn execute_with_retry(&self, phase: Phase) -> Result<PhaseOutcome, PhaseError> {
        let request = self.request(phase);
        let retry = &self.options.retry;
        let mut attempt = 1;
        loop {
            match self.executor.execute(&request).await {
                Err(error) if error.kind().is_retryable() && retry.allows_another(attempt) => {
                    let delay = retry.delay_after(attempt);
                    tracing::warn!(%phase, attempt, ?delay, error = %error, "transient phase failure, retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn record_outcome(&self, outcome: &PhaseOutcome) -> Result<(), WorkflowError> {
        self.shared
            .update(|inner| inner.manifest.mark_phase_completed(outcome.phase))?;
        tracing::info!(phase = %outcome.phase, status = ?outcome.status, "phase finished");
        Ok(())
    }

    /// Returns false if the run was canceled.
    async fn wait_while_paused(&self, phase: Phase) -> bool {
        loop {
            let (paused, canceled, _) = self.shared.flags();
            if canceled {
                return false;
            }
            if !paused {
                return true;
            }
            if self.shared.lock().state != (RunState::Paused { phase }) {
                tracing::info!(%phase, "run paused");
                self.shared.set_state(RunState::Paused { phase });
            }
            tokio::select! {
                _ = self.shared.wake.notified() => {}
                _ = sleep(self.options.pause_poll_interval) => {}
            }
        }
    }

    async fn wait_for_config(
        &self,
        phase: Phase,
        reason: String,
    ) -> Result<ConfigWait, WorkflowError> {
        let canceled = self.shared.update(|inner| {
            if !inner.manifest.canceled {
                inner.manifest.mark_waiting(reason.as_str());
            }
            inner.manifest.canceled
        })?;
        if canceled {
            return Ok(ConfigWait::Canceled);
        }
        self.shared.set_state(RunState::WaitingForConfig { phase });
        tracing::warn!(%phase, %reason, "waiting for provider configuration");

        let deadline = Instant::now() + self.options.config_wait_timeout;
        loop {
            let (_, canceled, waiting) = self.shared.flags();
            if canceled {
                return Ok(ConfigWait::Canceled);
            }
            if !waiting {
                tracing::info!(%phase, "configuration updated, re-attempting phase");
                return Ok(ConfigWait::Updated);
            }
            tokio::select! {
                _ = self.shared.wake.notified() => {}
                _ = sleep_until(deadline) => {
                    return Err(self.fail(WorkflowError::ConfigWaitTimedOut {
                        phase,
                        waited: self.options.config_wait_timeout,
                    }));
                }
            }
        }
    }

    fn finish_canceled(&self) -> RunStatus {
        self.shared.set_state(RunState::Canceled);
        tracing::info!(run_id = %self.options.run_id, "run canceled");
        self.shared.status()
    }

    /// Record `error` as the run's last error and move to Failed.
    fn fail(&self, error: WorkflowError) -> WorkflowError {
        let message = match &error {
            WorkflowError::PhaseFailed { source, .. } => source.to_string(),
            other => other.to_string(),
        };
        if let Err(e) = self
            .shared
            .update(|inner| inner.manifest.record_error(message.as_str()))
        {
            tracing::error!(error = %e, "failed to persist run failure");
        }
        tracing::error!(error = %message, "run failed");
        self.shared.set_state(RunState::Failed { reason: message });
        error
    }
}
