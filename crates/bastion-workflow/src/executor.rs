// executor.rs — The execute-phase operation.
//
// The orchestrator calls a PhaseExecutor once per phase attempt. The default
// SafePhaseExecutor does, in order:
//
//   1. check the target URL is safe
//   2. load config, compile rules, evaluate them for the phase
//      (`rules_evaluated` tool log; `phase_blocked_by_rule` lifecycle log
//      and a fatal PolicyBlocked error on a hard block)
//   3. skip if the phase already has a valid output (unless forced)
//   4. resolve provider credentials if the agent needs them
//   5. run the PhaseAgent behind a Guardrail; in prerecon, file tools are
//      also confined to the repo's virtual prefix when one is given.
//      netdisc runs no agent unless network discovery is enabled
//   6. write output/summary/coverage plus evidence and index them
//   7. re-validate the output it just wrote
//
// The executor never touches the manifest; the orchestrator owns it.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use bastion_artifacts::{load_phase_output, ArtifactStore, EvidenceRef, PhaseOutput};
use bastion_audit::AuditLogger;
use bastion_config::{load_config_with_env, BastionConfig};
use bastion_guardrail::{Guardrail, GuardrailContext};
use bastion_policy::{compile_rules, ensure_safe_target_url, evaluate_rules, Phase, RuntimeTarget};

use crate::error::PhaseError;

/// Input to one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseRequest {
    pub workspace_root: PathBuf,
    pub workspace: String,
    pub run_id: String,
    pub repo_path: String,
    pub url: String,
    pub phase: Phase,
    pub force: bool,
    pub effective_config_path: PathBuf,
    /// Virtual root (e.g. `/repos/app`) that file tools must stay under.
    #[serde(default)]
    pub repo_virtual_prefix: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Skipped,
}

/// Successful result of one phase execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhaseOutcome {
    pub phase: Phase,
    pub status: PhaseStatus,
}

/// The execute-phase seam between the orchestrator and the work itself.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, request: &PhaseRequest) -> Result<PhaseOutcome, PhaseError>;
}

/// Everything an agent gets when it is invoked for a phase.
pub struct AgentInvocation<'a> {
    pub phase: Phase,
    pub selected_analyzers: &'a [String],
    pub config: &'a BastionConfig,
    /// Every tool call the agent makes must be checked here first.
    pub guardrail: &'a Guardrail,
    /// System prompt fragment describing the active rules.
    pub policy_prompt: String,
    pub evidence_dir: PathBuf,
}

/// What an agent reports back after a phase.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentReport {
    /// False when no model was invoked.
    pub executed: bool,
    pub summary: Option<String>,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    /// Extra evidence files (run-relative refs) the agent wrote.
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
}

/// The LLM-driven worker behind a phase.
#[async_trait]
pub trait PhaseAgent: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the agent needs provider credentials before it can run.
    fn requires_provider(&self) -> bool {
        true
    }

    async fn run(&self, invocation: AgentInvocation<'_>) -> Result<AgentReport, PhaseError>;
}

/// Agent that executes nothing. Phases still produce schema-valid stub
/// output, so a full run can be exercised without a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAgent;

#[async_trait]
impl PhaseAgent for NoopAgent {
    fn name(&self) -> &str {
        "noop"
    }

    fn requires_provider(&self) -> bool {
        false
    }

    async fn run(&self, invocation: AgentInvocation<'_>) -> Result<AgentReport, PhaseError> {
        Ok(AgentReport {
            executed: false,
            summary: None,
            data: BTreeMap::from([(
                "status".to_string(),
                json!(format!("{}-phase-agent initialized", invocation.phase)),
            )]),
            evidence: Vec::new(),
        })
    }
}

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Policy-gated, artifact-backed phase execution.
#[derive(Clone)]
pub struct SafePhaseExecutor {
    agent: Arc<dyn PhaseAgent>,
    env: EnvLookup,
}

impl Default for SafePhaseExecutor {
    fn default() -> Self {
        Self::new(Arc::new(NoopAgent))
    }
}

impl SafePhaseExecutor {
    pub fn new(agent: Arc<dyn PhaseAgent>) -> Self {
        Self {
            agent,
            env: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Replace the process environment lookup (config overrides, API keys).
    pub fn with_env(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.env = Arc::new(env);
        self
    }

    fn stub_summary(phase: Phase) -> String {
        format!("Stub {} phase completed in safe mode.", phase)
    }

    fn discovery_disabled_report() -> AgentReport {
        AgentReport {
            executed: false,
            summary: Some(
                "Network discovery is disabled; netdisc produced stub output only.".to_string(),
            ),
            ..AgentReport::default()
        }
    }
}

#[async_trait]
impl PhaseExecutor for SafePhaseExecutor {
    async fn execute(&self, request: &PhaseRequest) -> Result<PhaseOutcome, PhaseError> {
        let phase = request.phase;
        ensure_safe_target_url(&request.url)?;

        let config = load_config_with_env(Some(request.effective_config_path.as_path()), |name| {
            (self.env)(name)
        })?;
        let rules = compile_rules(&config.rules);
        let target = RuntimeTarget::from_inputs(phase.as_str(), &request.url, &request.repo_path, None);
        let decision = evaluate_rules(&target, &rules);

        let store = ArtifactStore::open(&request.workspace_root, &request.workspace, &request.run_id)?;
        let audit = AuditLogger::open(store.logs_dir())?;
        audit.log_tool_call(&json!({
            "event_type": "rules_evaluated",
            "phase": phase,
            "runtime_target": target,
            "applied_rules": decision.applied_rules,
            "selected_analyzers": decision.selected_analyzers,
            "blocked_reason": decision.blocked_reason,
        }))?;

        if let Some(reason) = decision.blocked_reason {
            audit.log_agent_event(&json!({
                "event_type": "phase_blocked_by_rule",
                "phase": phase,
                "reason": reason,
                "applied_rules": decision.applied_rules,
            }))?;
            tracing::warn!(%phase, %reason, "phase blocked by rule");
            return Err(PhaseError::PolicyBlocked { phase, reason });
        }

        if store.should_skip_phase(phase, request.force) {
            tracing::info!(%phase, "phase output already valid, skipping");
            return Ok(PhaseOutcome {
                phase,
                status: PhaseStatus::Skipped,
            });
        }

        let discovery_disabled =
            phase == Phase::Netdisc && !config.safety.network_discovery_enabled;

        if self.agent.requires_provider() && !discovery_disabled {
            config
                .provider
                .resolve_api_key(|name| (self.env)(name))
                .map_err(|e| PhaseError::ProviderConfigRequired(e.to_string()))?;
        }

        let context = GuardrailContext::new(
            phase,
            &request.url,
            &request.repo_path,
            &request.workspace,
            &request.run_id,
        )
        .with_workspace_root(&request.workspace_root)
        .with_config_path(&request.effective_config_path);
        let mut guardrail = Guardrail::new(context, rules)?;
        if let (Phase::Prerecon, Some(prefix)) = (phase, &request.repo_virtual_prefix) {
            guardrail = guardrail.with_repo_prefix(prefix.as_str());
        }
        let evidence_dir = store.evidence_dir(phase)?;

        let report = if discovery_disabled {
            tracing::info!(%phase, "network discovery disabled, agent not run");
            Self::discovery_disabled_report()
        } else {
            self.agent
                .run(AgentInvocation {
                    phase,
                    selected_analyzers: &decision.selected_analyzers,
                    config: &config,
                    guardrail: &guardrail,
                    policy_prompt: guardrail.policy_prompt(),
                    evidence_dir: evidence_dir.clone(),
                })
                .await?
        };

        let stub_path = evidence_dir.join("stub.txt");
        fs::write(&stub_path, "evidence").map_err(|source| {
            PhaseError::Artifacts(bastion_artifacts::ArtifactError::IoError {
                path: stub_path.clone(),
                source,
            })
        })?;

        let mut output = PhaseOutput::new(
            phase,
            report
                .summary
                .clone()
                .unwrap_or_else(|| Self::stub_summary(phase)),
        )
        .with_evidence(
            EvidenceRef::new(format!("{}-e1", phase), format!("{}/evidence/stub.txt", phase))
                .with_note("stub evidence"),
        )
        .with_data("safe_mode", json!(config.safety.safe_mode))
        .with_data(
            "network_discovery_enabled",
            json!(config.safety.network_discovery_enabled),
        )
        .with_data("selected_analyzers", json!(decision.selected_analyzers))
        .with_data(
            "agent_runtime",
            json!({
                "agent": self.agent.name(),
                "executed": report.executed,
                "data": report.data,
            }),
        );
        output.evidence.extend(report.evidence.iter().cloned());

        let paths = store.write_phase_artifacts(&output)?;
        let mut indexed = paths.to_vec();
        indexed.push(stub_path);
        indexed.extend(report.evidence.iter().map(|e| store.base().join(&e.path)));
        store.append_index(&indexed)?;

        if load_phase_output(&paths.output).map_or(true, |written| written.phase != phase) {
            return Err(PhaseError::InvalidPhaseOutput {
                phase,
                path: paths.output,
            });
        }

        tracing::info!(%phase, analyzers = ?decision.selected_analyzers, "phase completed");
        Ok(PhaseOutcome {
            phase,
            status: PhaseStatus::Completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bastion_audit::AuditStream;
    use bastion_guardrail::ToolCall;
    use std::path::Path;
    use tempfile::tempdir;

    fn request(root: &Path, config: &Path, phase: Phase) -> PhaseRequest {
        PhaseRequest {
            workspace_root: root.join("runs"),
            workspace: "acme".into(),
            run_id: "r1".into(),
            repo_path: "repos/acme".into(),
            url: "https://staging.example.com/api/users".into(),
            phase,
            force: false,
            effective_config_path: config.to_path_buf(),
            repo_virtual_prefix: None,
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("bastion.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn completes_then_skips() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let executor = SafePhaseExecutor::default().with_env(no_env);
        let req = request(dir.path(), &config, Phase::Recon);

        let first = executor.execute(&req).await.unwrap();
        assert_eq!(first.status, PhaseStatus::Completed);

        let second = executor.execute(&req).await.unwrap();
        assert_eq!(second.status, PhaseStatus::Skipped);

        let forced = PhaseRequest { force: true, ..req };
        let third = executor.execute(&forced).await.unwrap();
        assert_eq!(third.status, PhaseStatus::Completed);
    }

    #[tokio::test]
    async fn stub_output_records_analyzers_and_evidence() {
        let dir = tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "[[rules.focus]]\ntype = \"path\"\nvalue = \"/api/*\"\nphases = [\"recon\"]\n",
        );
        let executor = SafePhaseExecutor::default().with_env(no_env);
        let req = request(dir.path(), &config, Phase::Recon);
        executor.execute(&req).await.unwrap();

        let store = ArtifactStore::open(&req.workspace_root, "acme", "r1").unwrap();
        let output = load_phase_output(&store.base().join("recon/output.json")).unwrap();
        assert_eq!(output.summary, "Stub recon phase completed in safe mode.");
        assert_eq!(output.data["safe_mode"], json!(true));
        assert_eq!(output.data["selected_analyzers"][0], "attack_surface_mapper");
        assert_eq!(output.data["agent_runtime"]["executed"], json!(false));
        assert_eq!(output.evidence[0].path, "recon/evidence/stub.txt");

        let index = store.read_index().unwrap();
        assert!(index.get("recon/evidence/stub.txt").is_some());
        assert!(index.get("recon/output.json").is_some());

        let audit = AuditLogger::open(store.logs_dir()).unwrap();
        let tools = audit.read_stream(AuditStream::ToolCalls).unwrap();
        assert_eq!(tools[0]["event_type"], "rules_evaluated");
        assert_eq!(tools[0]["runtime_target"]["path"], "/api/users");
    }

    #[tokio::test]
    async fn hard_block_is_fatal_and_logged() {
        let dir = tempdir().unwrap();
        let config = write_config(
            dir.path(),
            "[[rules.avoid]]\ntype = \"host\"\nvalue = \"staging.example.com\"\nphases = [\"vuln\"]\n",
        );
        let executor = SafePhaseExecutor::default().with_env(no_env);
        let req = request(dir.path(), &config, Phase::Vuln);

        let err = executor.execute(&req).await.unwrap_err();
        assert!(matches!(err, PhaseError::PolicyBlocked { phase: Phase::Vuln, .. }));
        assert_eq!(err.kind(), crate::error::FailureKind::Fatal);
        let message = err.to_string();
        assert!(message.contains("host=staging.example.com"));
        assert!(message.contains("'staging.example.com'"));

        let store = ArtifactStore::open(&req.workspace_root, "acme", "r1").unwrap();
        assert!(!store.base().join("vuln/output.json").exists());
        let audit = AuditLogger::open(store.logs_dir()).unwrap();
        let events = audit.read_stream(AuditStream::AgentEvents).unwrap();
        assert_eq!(events[0]["event_type"], "phase_blocked_by_rule");
    }

    struct ProviderAgent;

    #[async_trait]
    impl PhaseAgent for ProviderAgent {
        fn name(&self) -> &str {
            "provider"
        }

        async fn run(&self, _: AgentInvocation<'_>) -> Result<AgentReport, PhaseError> {
            Ok(AgentReport {
                executed: true,
                summary: Some("agent ran".into()),
                ..AgentReport::default()
            })
        }
    }

    #[tokio::test]
    async fn missing_credentials_require_config() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let executor = SafePhaseExecutor::new(Arc::new(ProviderAgent)).with_env(no_env);
        let err = executor
            .execute(&request(dir.path(), &config, Phase::Intake))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::ConfigRequired);
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));

        let keyed = SafePhaseExecutor::new(Arc::new(ProviderAgent)).with_env(|name| {
            (name == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string())
        });
        let req = request(dir.path(), &config, Phase::Intake);
        keyed.execute(&req).await.unwrap();
        let store = ArtifactStore::open(&req.workspace_root, "acme", "r1").unwrap();
        let output = load_phase_output(&store.base().join("intake/output.json")).unwrap();
        assert_eq!(output.summary, "agent ran");
        assert_eq!(output.data["agent_runtime"]["executed"], json!(true));
    }

    #[tokio::test]
    async fn netdisc_runs_no_agent_unless_enabled() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        // No API key: the disabled netdisc phase never asks for one.
        let executor = SafePhaseExecutor::new(Arc::new(ProviderAgent)).with_env(no_env);
        let req = request(dir.path(), &config, Phase::Netdisc);
        executor.execute(&req).await.unwrap();

        let store = ArtifactStore::open(&req.workspace_root, "acme", "r1").unwrap();
        let output = load_phase_output(&store.base().join("netdisc/output.json")).unwrap();
        assert!(output.summary.starts_with("Network discovery is disabled"));
        assert_eq!(output.data["network_discovery_enabled"], json!(false));
        assert_eq!(output.data["agent_runtime"]["executed"], json!(false));

        let enabled = write_config(dir.path(), "[safety]\nnetwork_discovery_enabled = true\n");
        let keyed = SafePhaseExecutor::new(Arc::new(ProviderAgent))
            .with_env(|name| (name == "ANTHROPIC_API_KEY").then(|| "sk-test".to_string()));
        let forced = PhaseRequest {
            force: true,
            effective_config_path: enabled,
            ..req
        };
        keyed.execute(&forced).await.unwrap();
        let output = load_phase_output(&store.base().join("netdisc/output.json")).unwrap();
        assert_eq!(output.summary, "agent ran");
        assert_eq!(output.data["network_discovery_enabled"], json!(true));
    }

    /// Agent that tries to read a file outside the repo and reports the verdict.
    struct FileAgent;

    #[async_trait]
    impl PhaseAgent for FileAgent {
        fn name(&self) -> &str {
            "file"
        }

        fn requires_provider(&self) -> bool {
            false
        }

        async fn run(&self, invocation: AgentInvocation<'_>) -> Result<AgentReport, PhaseError> {
            let call = ToolCall::new("read-1", "read_file", json!({"file_path": "/etc/passwd"}));
            let verdict = invocation.guardrail.check(&call)?;
            Ok(AgentReport {
                executed: true,
                data: BTreeMap::from([("blocked".to_string(), json!(verdict.is_blocked()))]),
                ..AgentReport::default()
            })
        }
    }

    #[tokio::test]
    async fn prerecon_file_tools_stay_in_repo_prefix() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let executor = SafePhaseExecutor::new(Arc::new(FileAgent)).with_env(no_env);

        for (phase, blocked) in [(Phase::Prerecon, true), (Phase::Recon, false)] {
            let req = PhaseRequest {
                repo_virtual_prefix: Some("/repos/acme".into()),
                ..request(dir.path(), &config, phase)
            };
            executor.execute(&req).await.unwrap();
            let store = ArtifactStore::open(&req.workspace_root, "acme", "r1").unwrap();
            let output = load_phase_output(&store.phase_dir(phase).unwrap().join("output.json"))
                .unwrap();
            assert_eq!(
                output.data["agent_runtime"]["data"]["blocked"],
                json!(blocked),
                "{}",
                phase
            );
        }

        let store = ArtifactStore::open(dir.path().join("runs"), "acme", "r1").unwrap();
        assert!(store
            .base()
            .join("prerecon/evidence/agent-guardrail-read-1.json")
            .exists());
    }

    #[tokio::test]
    async fn unsafe_url_is_a_scope_error() {
        let dir = tempdir().unwrap();
        let config = write_config(dir.path(), "");
        let executor = SafePhaseExecutor::default().with_env(no_env);
        let mut req = request(dir.path(), &config, Phase::Intake);
        req.url = "file:///etc/passwd".into();
        let err = executor.execute(&req).await.unwrap_err();
        assert!(matches!(err, PhaseError::ScopeBoundary(_)));
    }
}
