// registry.rs — The fixed phase sequence and the static analyzer table.
//
// Both are compile-time constants: the phase order never changes at runtime
// and the analyzer table is a process-wide immutable lookup keyed by phase.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use bastion_config::TargetType;

/// One step of an assessment run, in execution order.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Intake,
    Prerecon,
    /// Network discovery.
    Netdisc,
    Recon,
    /// Safe vulnerability verification.
    Vuln,
    Report,
}

impl Phase {
    /// The fixed phase sequence.
    pub const ALL: [Phase; 6] = [
        Phase::Intake,
        Phase::Prerecon,
        Phase::Netdisc,
        Phase::Recon,
        Phase::Vuln,
        Phase::Report,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Intake => "intake",
            Phase::Prerecon => "prerecon",
            Phase::Netdisc => "netdisc",
            Phase::Recon => "recon",
            Phase::Vuln => "vuln",
            Phase::Report => "report",
        }
    }

    /// Position in [`Phase::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| format!("unknown phase '{}'", s))
    }
}

/// A static analyzer descriptor: what it is called, how it is tagged, and
/// which runtime surfaces it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerSpec {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub surfaces: &'static [TargetType],
}

impl AnalyzerSpec {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(&tag)
    }

    pub fn touches(&self, surface: TargetType) -> bool {
        self.surfaces.contains(&surface)
    }
}

const fn analyzer(
    name: &'static str,
    tags: &'static [&'static str],
    surfaces: &'static [TargetType],
) -> AnalyzerSpec {
    AnalyzerSpec {
        name,
        tags,
        surfaces,
    }
}

const INTAKE: &[AnalyzerSpec] = &[
    analyzer("scope_planner", &["planning", "scope"], &[TargetType::RepoPath, TargetType::Host]),
    analyzer("repo_inventory", &["filesystem", "planning"], &[TargetType::RepoPath]),
];

const PRERECON: &[AnalyzerSpec] = &[
    analyzer("repo_inventory", &["filesystem", "planning"], &[TargetType::RepoPath]),
    analyzer("baseline_metadata", &["metadata", "planning"], &[TargetType::Host]),
];

const NETDISC: &[AnalyzerSpec] = &[
    analyzer(
        "host_discovery",
        &["network", "discovery"],
        &[TargetType::Host, TargetType::Subdomain],
    ),
    analyzer("service_fingerprinter", &["network", "metadata"], &[TargetType::Host]),
];

const RECON: &[AnalyzerSpec] = &[
    analyzer(
        "attack_surface_mapper",
        &["network", "discovery"],
        &[
            TargetType::Host,
            TargetType::Subdomain,
            TargetType::Path,
            TargetType::Method,
        ],
    ),
    analyzer("auth_model_builder", &["auth", "modeling"], &[TargetType::RepoPath]),
    analyzer("data_flow_mapper", &["data-flow", "modeling"], &[TargetType::RepoPath]),
];

const VULN: &[AnalyzerSpec] = &[
    analyzer(
        "static_safe_checks",
        &["safe", "code"],
        &[TargetType::RepoPath, TargetType::Path],
    ),
    analyzer("dependency_review", &["dependencies", "safe"], &[TargetType::RepoPath]),
    analyzer(
        "config_review",
        &["configuration", "safe"],
        &[TargetType::Host, TargetType::Path],
    ),
];

const REPORT: &[AnalyzerSpec] = &[
    analyzer("finding_summarizer", &["reporting", "summary"], &[TargetType::RepoPath]),
    analyzer(
        "retest_planner",
        &["reporting", "planning"],
        &[TargetType::Host, TargetType::Path],
    ),
];

/// The analyzer table for a phase name. Unknown phases have no analyzers.
pub fn analyzers_for(phase: &str) -> &'static [AnalyzerSpec] {
    match phase.parse::<Phase>() {
        Ok(Phase::Intake) => INTAKE,
        Ok(Phase::Prerecon) => PRERECON,
        Ok(Phase::Netdisc) => NETDISC,
        Ok(Phase::Recon) => RECON,
        Ok(Phase::Vuln) => VULN,
        Ok(Phase::Report) => REPORT,
        Err(_) => &[],
    }
}
