//! # bastion-policy
//!
//! Focus/avoid rule compilation and policy evaluation for Bastion.
//!
//! Operators steer an assessment with two kinds of rules: `focus` rules
//! prioritize analyzers and surfaces, `avoid` rules restrict them. This crate
//! turns configured rules into [`CompiledRule`] records and answers two
//! questions about them:
//!
//! - [`evaluate_rules`] — which analyzers should run for a phase, in what
//!   order, or is the whole phase hard-blocked?
//! - [`evaluate_runtime_boundary`] — is this one concrete tool call allowed?
//!
//! ## Key invariants
//!
//! - **Pure**: identical `(target, rules)` inputs always produce identical
//!   decisions, including analyzer order.
//! - **Never fails**: evaluation returns a decision value; no match is not an
//!   error, and an invalid glob simply never matches.
//! - **Narrow rules stay narrow**: `path` and `method` avoid rules can drop
//!   analyzers or block single tool calls, but never hard-block a phase.

pub mod compiler;
pub mod engine;
pub mod error;
pub mod plan;
pub mod registry;
pub mod scope;
pub mod target;

pub use bastion_config::TargetType;
pub use compiler::{compile_rules, CompiledRule, RuleAction};
pub use engine::{
    evaluate_rules, evaluate_runtime_boundary, rule_matches_target, AppliedRule, RuleDecision,
    RuntimeBoundaryDecision,
};
pub use error::ScopeError;
pub use plan::{plan_phases, PhasePlan};
pub use registry::{analyzers_for, AnalyzerSpec, Phase};
pub use scope::{ensure_repo_in_repos_root, ensure_safe_target_url};
pub use target::RuntimeTarget;
