// guardrail.rs — The per-tool-call authorization boundary.
//
// Every tool call an agent proposes goes through `Guardrail::check` before
// it executes:
//
//   1. optional filesystem prefix check (file tools stay inside the repo)
//   2. normalize arguments into a RuntimeTarget
//   3. evaluate_runtime_boundary against the compiled rules
//
// A denial writes `<phase>/evidence/agent-guardrail-<call_id>.json` and an
// `agent_tool_call_blocked` record in the tool-call audit log, then returns
// a Blocked verdict whose message is handed back to the agent in place of
// the tool result. If either record cannot be written, `check` returns the
// error instead; the call must not run in that case either. Allowed calls
// pass through unmodified.

use std::fs;
use std::path::PathBuf;

use serde_json::{json, Value};

use bastion_audit::{redact_value, AuditLogger};
use bastion_config::load_config;
use bastion_policy::{compile_rules, evaluate_runtime_boundary, CompiledRule};

use crate::boundary::{check_filesystem_boundary, NormalizedToolBoundary, ToolCall};
use crate::context::GuardrailContext;
use crate::error::GuardrailError;

/// Audit event type recorded for every denied tool call.
pub const BLOCKED_EVENT_TYPE: &str = "agent_tool_call_blocked";

/// Outcome of checking one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    /// The call may execute as proposed.
    Allowed,
    /// The call must not execute; `message` is returned to the agent.
    Blocked { message: String },
}

impl GuardrailVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, GuardrailVerdict::Blocked { .. })
    }
}

/// Policy boundary for one agent in one phase.
pub struct Guardrail {
    context: GuardrailContext,
    rules: Vec<CompiledRule>,
    audit: AuditLogger,
    allowed_repo_prefix: Option<String>,
}

impl Guardrail {
    /// Build a guardrail over already compiled rules.
    pub fn new(context: GuardrailContext, rules: Vec<CompiledRule>) -> Result<Self, GuardrailError> {
        let audit = AuditLogger::open(context.logs_dir())?;
        let evidence = context.evidence_dir();
        fs::create_dir_all(&evidence).map_err(|source| GuardrailError::Io {
            path: evidence.clone(),
            source,
        })?;
        Ok(Self {
            context,
            rules,
            audit,
            allowed_repo_prefix: None,
        })
    }

    /// Build a guardrail from the rules in the context's config file.
    pub fn from_config(context: GuardrailContext) -> Result<Self, GuardrailError> {
        let config = load_config(Some(context.config_path.as_path()))?;
        let rules = compile_rules(&config.rules);
        Self::new(context, rules)
    }

    /// Confine file tools to paths under `prefix` (a virtual repo root such
    /// as `/repo`).
    pub fn with_repo_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_repo_prefix = Some(prefix.into());
        self
    }

    pub fn context(&self) -> &GuardrailContext {
        &self.context
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    /// Decide whether `call` may run. Only `Ok(Allowed)` lets it execute.
    pub fn check(&self, call: &ToolCall) -> Result<GuardrailVerdict, GuardrailError> {
        let (boundary, target) = NormalizedToolBoundary::from_call(&self.context, call);

        let fs_violation = self
            .allowed_repo_prefix
            .as_deref()
            .and_then(|prefix| check_filesystem_boundary(prefix, call));
        let (reason, applied_rules) = match fs_violation {
            Some(reason) => (reason, Vec::new()),
            None => {
                let decision = evaluate_runtime_boundary(&target, &self.rules);
                match decision.blocked_reason {
                    Some(reason) => (reason, decision.applied_rules),
                    None => return Ok(GuardrailVerdict::Allowed),
                }
            }
        };

        tracing::warn!(
            phase = %self.context.phase,
            tool = %call.name,
            call_id = %call.id,
            reason = %reason,
            "tool call blocked"
        );
        let payload = json!({
            "event_type": BLOCKED_EVENT_TYPE,
            "workspace": self.context.workspace,
            "run_id": self.context.run_id,
            "phase": self.context.phase,
            "tool": boundary.tool,
            "tool_call": call,
            "boundary": boundary,
            "runtime_target": target,
            "reason": reason,
            "applied_rules": applied_rules,
        });
        self.record_denial(&call.id, &payload)?;

        Ok(GuardrailVerdict::Blocked {
            message: format!("Tool call blocked by policy: {}", reason),
        })
    }

    /// Rules summary injected into the agent's system prompt.
    pub fn policy_prompt(&self) -> String {
        let mut lines = vec![
            "Policy guardrails are active.".to_string(),
            format!("Phase: {}", self.context.phase),
            format!("Base URL: {}", self.context.url),
            format!("Repo path: {}", self.context.repo_path),
            "Rules:".to_string(),
        ];
        if self.rules.is_empty() {
            lines.push("- No explicit focus/avoid rules configured.".to_string());
        }
        for rule in &self.rules {
            let scope = if rule.phases.is_empty() {
                String::new()
            } else {
                format!(" phases=[{}]", rule.phases.join(", "))
            };
            let description = rule
                .description
                .as_deref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            lines.push(format!(
                "- {} {}={}{}{}",
                rule.action, rule.target_type, rule.target, scope, description
            ));
        }
        lines.push("Never plan or execute tool calls that cross an avoid boundary.".to_string());
        lines.join("\n")
    }

    pub fn evidence_path(&self, call_id: &str) -> PathBuf {
        self.context
            .evidence_dir()
            .join(format!("agent-guardrail-{}.json", sanitize_id(call_id)))
    }

    // Both records are attempted before either failure is reported.
    fn record_denial(&self, call_id: &str, payload: &Value) -> Result<(), GuardrailError> {
        let audited = self.audit.log_tool_call(payload);
        let path = self.evidence_path(call_id);
        let written = serde_json::to_string_pretty(&redact_value(payload))
            .map_err(std::io::Error::from)
            .and_then(|json| fs::write(&path, json));

        if let Err(e) = &audited {
            tracing::error!(error = %e, "failed to audit blocked tool call");
        }
        audited?;
        written.map_err(|source| {
            tracing::error!(path = %path.display(), error = %source, "failed to write guardrail evidence");
            GuardrailError::Io { path, source }
        })
    }
}

/// Keep call ids usable as a file name component.
fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
