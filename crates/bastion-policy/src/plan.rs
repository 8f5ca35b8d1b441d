// plan.rs — Dry-run preview of rule decisions across every phase.

use serde::{Deserialize, Serialize};

use crate::compiler::CompiledRule;
use crate::engine::{evaluate_rules, AppliedRule};
use crate::registry::Phase;
use crate::target::RuntimeTarget;

/// What a run would do in one phase under the current rules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhasePlan {
    pub phase: Phase,
    pub selected_analyzers: Vec<String>,
    pub applied_rules: Vec<AppliedRule>,
    pub blocked_reason: Option<String>,
}

/// Evaluate the rules for every phase in sequence order.
pub fn plan_phases(url: &str, repo_path: &str, rules: &[CompiledRule]) -> Vec<PhasePlan> {
    Phase::ALL
        .iter()
        .map(|phase| {
            let target = RuntimeTarget::from_inputs(phase.as_str(), url, repo_path, None);
            let decision = evaluate_rules(&target, rules);
            PhasePlan {
                phase: *phase,
                selected_analyzers: decision.selected_analyzers,
                applied_rules: decision.applied_rules,
                blocked_reason: decision.blocked_reason,
            }
        })
        .collect()
}
