// model.rs — Configuration data model.
//
// Mirrors the sections of bastion.toml:
//
//   [provider]   which LLM backend the agent runtime talks to
//   [safety]     acknowledgement + safe-mode switches
//   [run]        where run directories and target repos live
//   [rules]      operator focus/avoid rules
//
// Every section has defaults so a missing file or a partial file is valid.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which surface a focus/avoid rule is keyed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Phase,
    Host,
    Subdomain,
    Path,
    RepoPath,
    Method,
    Analyzer,
    Tag,
}

impl TargetType {
    /// The snake_case name used in config files and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Phase => "phase",
            TargetType::Host => "host",
            TargetType::Subdomain => "subdomain",
            TargetType::Path => "path",
            TargetType::RepoPath => "repo_path",
            TargetType::Method => "method",
            TargetType::Analyzer => "analyzer",
            TargetType::Tag => "tag",
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM provider family.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Anthropic,
    OpenaiCompatible,
    Router,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenaiCompatible => "openai_compatible",
            ProviderKind::Router => "router",
        }
    }

    /// Parse the value of `BASTION_PROVIDER`. Unknown names are ignored.
    pub fn from_env_value(value: &str) -> Option<Self> {
        match value {
            "anthropic" => Some(ProviderKind::Anthropic),
            "openai_compatible" => Some(ProviderKind::OpenaiCompatible),
            "router" => Some(ProviderKind::Router),
            _ => None,
        }
    }
}

/// `[provider]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Name of the environment variable that holds the API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            model: "claude-3-5-sonnet-latest".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            base_url: None,
        }
    }
}

impl ProviderConfig {
    /// Resolve the API key through `lookup` (normally `std::env::var`).
    ///
    /// A missing or blank variable is reported as [`ConfigError::MissingEnvVar`],
    /// which the workflow layer treats as "configuration required".
    pub fn resolve_api_key(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        match lookup(&self.api_key_env) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingEnvVar(self.api_key_env.clone())),
        }
    }
}

/// `[safety]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SafetyConfig {
    /// Operator confirmed they are authorized to assess the target.
    pub acknowledgement: bool,
    pub safe_mode: bool,
    /// When false, netdisc writes stub output without running an agent.
    pub network_discovery_enabled: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            acknowledgement: false,
            safe_mode: true,
            network_discovery_enabled: false,
        }
    }
}

/// `[run]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunConfig {
    /// Root directory holding `<workspace>/<run_id>/` trees.
    pub workspace_root: String,
    /// Repositories under assessment must live inside this directory.
    pub repos_root: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workspace_root: "runs".to_string(),
            repos_root: "repos".to_string(),
        }
    }
}

/// One `[[rules.focus]]` or `[[rules.avoid]]` entry.
///
/// `value` also accepts the user-facing aliases `url_path`, `target` and
/// `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleMatcherConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: TargetType,
    #[serde(alias = "url_path", alias = "target", alias = "pattern")]
    pub value: String,
    /// Phases where the rule applies. Empty means all phases.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<String>,
}

impl RuleMatcherConfig {
    pub fn new(kind: TargetType, value: impl Into<String>) -> Self {
        Self {
            description: None,
            kind,
            value: value.into(),
            phases: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = phases.into_iter().map(Into::into).collect();
        self
    }
}

/// `[rules]` section: two named groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    pub focus: Vec<RuleMatcherConfig>,
    pub avoid: Vec<RuleMatcherConfig>,
}

/// The complete configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BastionConfig {
    pub provider: ProviderConfig,
    pub safety: SafetyConfig,
    pub run: RunConfig,
    pub rules: RulesConfig,
}

impl BastionConfig {
    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.provider == ProviderKind::OpenaiCompatible
            && self
                .provider
                .base_url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
        {
            return Err(ConfigError::IncompleteProvider {
                provider: self.provider.provider.as_str().to_string(),
                field: "base_url",
            });
        }

        for (group, rules) in [("focus", &self.rules.focus), ("avoid", &self.rules.avoid)] {
            for (index, rule) in rules.iter().enumerate() {
                if rule.value.trim().is_empty() {
                    return Err(ConfigError::EmptyRuleValue {
                        group,
                        index,
                        kind: rule.kind.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
