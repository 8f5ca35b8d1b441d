// load.rs — Reading bastion.toml from disk.
//
// A missing file yields the default configuration. A present file must parse
// and validate; failures are reported as ConfigError before any run starts.
// Two environment variables can override provider settings:
//   BASTION_MODEL     replaces provider.model
//   BASTION_PROVIDER  replaces provider.provider (unknown values ignored)

use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::model::{BastionConfig, ProviderKind};

/// Config file name looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "bastion.toml";

const DEFAULT_CONFIG_TEMPLATE: &str = r#"[provider]
provider = "anthropic"
model = "claude-3-5-sonnet-latest"
api_key_env = "ANTHROPIC_API_KEY"

[safety]
acknowledgement = false
safe_mode = true
network_discovery_enabled = false

[run]
workspace_root = "runs"
repos_root = "repos"

# [[rules.focus]]
# description = "Prioritize the API surface"
# type = "path"
# value = "/api/*"
# phases = ["recon"]

# [[rules.avoid]]
# description = "Never touch the marketing site"
# type = "host"
# value = "www.example.com"
"#;

/// Parse and validate a TOML document.
pub fn parse_config(raw: &str) -> Result<BastionConfig, ConfigError> {
    let config: BastionConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path` (or `bastion.toml`), applying process env overrides.
pub fn load_config(path: Option<&Path>) -> Result<BastionConfig, ConfigError> {
    load_config_with_env(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] but with an injectable environment lookup.
pub fn load_config_with_env(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<BastionConfig, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let mut config = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        parse_config(&raw)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        BastionConfig::default()
    };

    apply_env_overrides(&mut config, lookup);
    config.validate()?;
    Ok(config)
}

/// Apply `BASTION_MODEL` / `BASTION_PROVIDER` overrides.
pub fn apply_env_overrides(config: &mut BastionConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(model) = lookup("BASTION_MODEL").filter(|m| !m.is_empty()) {
        config.provider.model = model;
    }
    if let Some(provider) = lookup("BASTION_PROVIDER")
        .as_deref()
        .and_then(ProviderKind::from_env_value)
    {
        config.provider.provider = provider;
    }
}

/// Write a starter config file. Refuses to overwrite an existing one.
pub fn scaffold_default_config(target: &Path) -> Result<bool, ConfigError> {
    if target.exists() {
        return Ok(false);
    }
    fs::write(target, DEFAULT_CONFIG_TEMPLATE).map_err(|source| ConfigError::WriteFailed {
        path: target.to_path_buf(),
        source,
    })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TargetType;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config_with_env(Some(dir.path().join("absent.toml").as_path()), no_env).unwrap();
        assert_eq!(config, BastionConfig::default());
    }

    #[test]
    fn rule_groups_parse_with_aliases() {
        let config = parse_config(
            r#"
[[rules.focus]]
description = "Prioritize beta admin panel"
type = "subdomain"
url_path = "beta-admin"

[[rules.avoid]]
type = "path"
url_path = "/logout"
phases = ["vuln"]
"#,
        )
        .unwrap();

        assert_eq!(config.rules.focus.len(), 1);
        assert_eq!(config.rules.focus[0].kind, TargetType::Subdomain);
        assert_eq!(config.rules.focus[0].value, "beta-admin");
        assert_eq!(
            config.rules.focus[0].description.as_deref(),
            Some("Prioritize beta admin panel")
        );
        assert_eq!(config.rules.avoid[0].value, "/logout");
        assert_eq!(config.rules.avoid[0].phases, vec!["vuln".to_string()]);
    }

    #[test]
    fn unknown_rule_type_is_a_parse_error() {
        let result = parse_config(
            r#"
[[rules.avoid]]
type = "port"
value = "22"
"#,
        );
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn empty_rule_value_fails_at_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bastion.toml");
        fs::write(&path, "[[rules.focus]]\ntype = \"host\"\nvalue = \"\"\n").unwrap();
        let result = load_config_with_env(Some(path.as_path()), no_env);
        assert!(matches!(result, Err(ConfigError::EmptyRuleValue { .. })));
    }

    #[test]
    fn env_overrides_model_and_provider() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bastion.toml");
        fs::write(&path, "[provider]\nbase_url = \"http://localhost:9000\"\n").unwrap();

        let config = load_config_with_env(Some(path.as_path()), |name| match name {
            "BASTION_MODEL" => Some("local-model".to_string()),
            "BASTION_PROVIDER" => Some("openai_compatible".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.provider.model, "local-model");
        assert_eq!(config.provider.provider, ProviderKind::OpenaiCompatible);
    }

    #[test]
    fn env_provider_override_is_validated() {
        let dir = tempdir().unwrap();
        let result = load_config_with_env(Some(dir.path().join("none.toml").as_path()), |name| {
            (name == "BASTION_PROVIDER").then(|| "openai_compatible".to_string())
        });
        assert!(matches!(result, Err(ConfigError::IncompleteProvider { .. })));
    }

    #[test]
    fn scaffold_writes_parseable_template_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bastion.toml");
        assert!(scaffold_default_config(&path).unwrap());
        assert!(!scaffold_default_config(&path).unwrap());

        let config = load_config_with_env(Some(path.as_path()), no_env).unwrap();
        assert!(config.safety.safe_mode);
        assert!(config.rules.focus.is_empty());
    }
}
