// engine.rs — Policy evaluation engine.
//
// Two entry points share one matcher:
//
// evaluate_rules (per phase):
// 1. Look up the phase's analyzer table (empty for unknown phases)
// 2. Hard block: the first in-scope avoid rule on phase/host/subdomain/
//    repo_path that matches the target → no analyzers, blocked_reason set
// 3. Soft filter: drop analyzers an avoid rule excludes by name, by tag, or
//    through one of the analyzer's runtime surfaces
// 4. Score survivors with focus rules (+2 name/tag, +1 surface)
// 5. Order by (-score, name)
// 6. Dedupe applied rules, keeping first occurrence
//
// evaluate_runtime_boundary (per tool call):
// rules in order; the first matching avoid rule blocks, matching focus rules
// add +1 each. No analyzer selection.
//
// Scoring is cumulative: an analyzer matching two focus rules outranks one
// matching a single rule even if that rule is "stronger".

use std::collections::HashSet;

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use bastion_config::TargetType;

use crate::compiler::{CompiledRule, RuleAction};
use crate::registry::{analyzers_for, AnalyzerSpec};
use crate::target::RuntimeTarget;

/// Provenance record for a rule that influenced a decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AppliedRule {
    pub action: RuleAction,
    pub target_type: TargetType,
    pub target: String,
    pub description: Option<String>,
}

impl From<&CompiledRule> for AppliedRule {
    fn from(rule: &CompiledRule) -> Self {
        Self {
            action: rule.action,
            target_type: rule.target_type,
            target: rule.target.clone(),
            description: rule.description.clone(),
        }
    }
}

/// Phase-level plan: which analyzers run, in order, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleDecision {
    pub selected_analyzers: Vec<String>,
    pub applied_rules: Vec<AppliedRule>,
    pub blocked_reason: Option<String>,
}

impl RuleDecision {
    pub fn is_blocked(&self) -> bool {
        self.blocked_reason.is_some()
    }
}

/// Verdict for one concrete tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeBoundaryDecision {
    pub applied_rules: Vec<AppliedRule>,
    pub blocked_reason: Option<String>,
    pub focus_score: i32,
}

impl RuntimeBoundaryDecision {
    pub fn is_blocked(&self) -> bool {
        self.blocked_reason.is_some()
    }
}

/// Rule types broad enough to stop a whole phase.
const HARD_BLOCK_TYPES: &[TargetType] = &[
    TargetType::Phase,
    TargetType::Host,
    TargetType::Subdomain,
    TargetType::RepoPath,
];

const CASE_INSENSITIVE: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Select and order the analyzers for `target.phase`, or hard-block the phase.
pub fn evaluate_rules(target: &RuntimeTarget, rules: &[CompiledRule]) -> RuleDecision {
    let analyzers = analyzers_for(&target.phase);
    let in_scope: Vec<&CompiledRule> = rules
        .iter()
        .filter(|rule| rule.applies_to_phase(&target.phase))
        .collect();

    if let Some(rule) = in_scope.iter().find(|rule| {
        rule.action == RuleAction::Avoid
            && HARD_BLOCK_TYPES.contains(&rule.target_type)
            && rule_matches_target(rule, target)
    }) {
        return RuleDecision {
            selected_analyzers: Vec::new(),
            applied_rules: vec![AppliedRule::from(*rule)],
            blocked_reason: Some(format!(
                "Phase '{}' blocked by avoid rule {} on {} '{}'.",
                target.phase,
                rule.label(),
                rule.target_type,
                target_value(rule.target_type, target),
            )),
        };
    }

    let mut applied = Vec::new();
    let mut scored: Vec<(i32, &AnalyzerSpec)> = Vec::new();

    for analyzer in analyzers {
        if let Some(rule) = exclusion(analyzer, target, &in_scope) {
            applied.push(AppliedRule::from(rule));
            continue;
        }
        let (score, matched) = focus_score(analyzer, target, &in_scope);
        applied.extend(matched);
        scored.push((score, analyzer));
    }

    scored.sort_by(|(score_a, a), (score_b, b)| score_b.cmp(score_a).then(a.name.cmp(b.name)));

    RuleDecision {
        selected_analyzers: scored.iter().map(|(_, a)| a.name.to_string()).collect(),
        applied_rules: dedupe(applied),
        blocked_reason: None,
    }
}

/// Decide whether one concrete action (a tool call) may proceed.
pub fn evaluate_runtime_boundary(
    target: &RuntimeTarget,
    rules: &[CompiledRule],
) -> RuntimeBoundaryDecision {
    let mut applied = Vec::new();
    let mut focus_score = 0;

    for rule in rules {
        if !rule.applies_to_phase(&target.phase) || !rule_matches_target(rule, target) {
            continue;
        }
        applied.push(AppliedRule::from(rule));
        match rule.action {
            RuleAction::Avoid => {
                return RuntimeBoundaryDecision {
                    applied_rules: dedupe(applied),
                    blocked_reason: Some(format!(
                        "{} '{}' is blocked by avoid rule {} in phase '{}'.",
                        rule.target_type,
                        target_value(rule.target_type, target),
                        rule.label(),
                        target.phase,
                    )),
                    focus_score,
                };
            }
            RuleAction::Focus => focus_score += 1,
        }
    }

    RuntimeBoundaryDecision {
        applied_rules: dedupe(applied),
        blocked_reason: None,
        focus_score,
    }
}

/// Does `rule` match the runtime target? Analyzer and tag rules never do.
pub fn rule_matches_target(rule: &CompiledRule, target: &RuntimeTarget) -> bool {
    match rule.target_type {
        TargetType::Phase => rule.target == target.phase,
        TargetType::Host => glob_matches(&rule.target, &target.host, CASE_INSENSITIVE),
        TargetType::Subdomain => {
            !target.subdomain.is_empty()
                && glob_matches(&rule.target, &target.subdomain, CASE_INSENSITIVE)
        }
        TargetType::Path => glob_matches(&rule.target, &target.path, MatchOptions::new()),
        TargetType::RepoPath => glob_matches(&rule.target, &target.repo_path, MatchOptions::new()),
        TargetType::Method => target
            .method
            .as_deref()
            .is_some_and(|method| glob_matches(&rule.target, method, CASE_INSENSITIVE)),
        TargetType::Analyzer | TargetType::Tag => false,
    }
}

/// Does `rule` name this analyzer directly or through one of its tags?
fn matches_analyzer(rule: &CompiledRule, analyzer: &AnalyzerSpec) -> bool {
    match rule.target_type {
        TargetType::Analyzer => rule.target == analyzer.name,
        TargetType::Tag => analyzer.has_tag(&rule.target),
        _ => false,
    }
}

/// Does `rule` reach the analyzer through one of its declared surfaces?
fn matches_surface(rule: &CompiledRule, analyzer: &AnalyzerSpec, target: &RuntimeTarget) -> bool {
    analyzer.touches(rule.target_type) && rule_matches_target(rule, target)
}

/// The first avoid rule that excludes this analyzer, if any.
fn exclusion<'r>(
    analyzer: &AnalyzerSpec,
    target: &RuntimeTarget,
    rules: &[&'r CompiledRule],
) -> Option<&'r CompiledRule> {
    rules.iter().copied().find(|rule| {
        rule.action == RuleAction::Avoid
            && (matches_analyzer(rule, analyzer) || matches_surface(rule, analyzer, target))
    })
}

/// Focus score for one analyzer plus the rules that earned it.
fn focus_score(
    analyzer: &AnalyzerSpec,
    target: &RuntimeTarget,
    rules: &[&CompiledRule],
) -> (i32, Vec<AppliedRule>) {
    rules
        .iter()
        .filter(|rule| rule.action == RuleAction::Focus)
        .fold((0, Vec::new()), |(score, mut matched), rule| {
            let points = if matches_analyzer(rule, analyzer) {
                2
            } else if rule.target_type == TargetType::Phase && rule.target == target.phase {
                1
            } else if matches_surface(rule, analyzer, target) {
                1
            } else {
                0
            };
            if points > 0 {
                matched.push(AppliedRule::from(*rule));
            }
            (score + points, matched)
        })
}

/// The target field a rule of `target_type` is compared against.
fn target_value(target_type: TargetType, target: &RuntimeTarget) -> &str {
    match target_type {
        TargetType::Phase => &target.phase,
        TargetType::Host => &target.host,
        TargetType::Subdomain => &target.subdomain,
        TargetType::Path => &target.path,
        TargetType::RepoPath => &target.repo_path,
        TargetType::Method => target.method.as_deref().unwrap_or_default(),
        TargetType::Analyzer | TargetType::Tag => "",
    }
}

/// Invalid patterns never match.
fn glob_matches(pattern: &str, value: &str, options: MatchOptions) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches_with(value, options),
        Err(_) => false,
    }
}

fn dedupe(rules: Vec<AppliedRule>) -> Vec<AppliedRule> {
    let mut seen = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert(rule.clone()))
        .collect()
}
