// compiler.rs — Rule compiler.
//
// Flattens the `[rules]` config section into an ordered list of immutable
// CompiledRule records: every focus entry first, then every avoid entry,
// preserving declaration order within each group. Validation (non-empty
// values, known types) already happened when the config was loaded, so
// compilation cannot fail.

use std::fmt;

use serde::{Deserialize, Serialize};

use bastion_config::{RuleMatcherConfig, RulesConfig, TargetType};

/// Whether a rule prioritizes or restricts its target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Focus,
    Avoid,
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::Focus => write!(f, "focus"),
            RuleAction::Avoid => write!(f, "avoid"),
        }
    }
}

/// A normalized operator rule. Compared by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CompiledRule {
    pub action: RuleAction,
    pub target_type: TargetType,
    /// Match expression (exact name for phase/analyzer/tag, glob otherwise).
    pub target: String,
    /// Phases where the rule applies. Empty means all phases.
    pub phases: Vec<String>,
    pub description: Option<String>,
}

impl CompiledRule {
    pub fn new(action: RuleAction, target_type: TargetType, target: impl Into<String>) -> Self {
        Self {
            action,
            target_type,
            target: target.into(),
            phases: Vec::new(),
            description: None,
        }
    }

    pub fn focus(target_type: TargetType, target: impl Into<String>) -> Self {
        Self::new(RuleAction::Focus, target_type, target)
    }

    pub fn avoid(target_type: TargetType, target: impl Into<String>) -> Self {
        Self::new(RuleAction::Avoid, target_type, target)
    }

    pub fn in_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = phases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when the rule is in force for `phase`.
    pub fn applies_to_phase(&self, phase: &str) -> bool {
        self.phases.is_empty() || self.phases.iter().any(|p| p == phase)
    }

    /// Human-readable label: the description if present, else `type=value`.
    pub fn label(&self) -> String {
        match &self.description {
            Some(description) => format!("'{}'", description),
            None => format!("{}={}", self.target_type, self.target),
        }
    }
}

/// Compile the configured rule groups: focus first, then avoid.
pub fn compile_rules(rules: &RulesConfig) -> Vec<CompiledRule> {
    let mut compiled = Vec::with_capacity(rules.focus.len() + rules.avoid.len());
    compiled.extend(compile_group(RuleAction::Focus, &rules.focus));
    compiled.extend(compile_group(RuleAction::Avoid, &rules.avoid));
    compiled
}

fn compile_group<'a>(
    action: RuleAction,
    rules: &'a [RuleMatcherConfig],
) -> impl Iterator<Item = CompiledRule> + 'a {
    rules.iter().map(move |rule| CompiledRule {
        action,
        target_type: rule.kind,
        target: rule.value.clone(),
        phases: rule.phases.clone(),
        description: rule.description.clone(),
    })
}
