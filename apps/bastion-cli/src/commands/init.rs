// init.rs — `bastion init`: scaffold the config file and a scope template.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use bastion_config::scaffold_default_config;

const SCOPE_TEMPLATE_FILE: &str = "scope.template.json";

pub fn execute(config_path: &Path, force: bool) -> anyhow::Result<()> {
    let scope = scaffold(config_path, force)?;
    println!(
        "Initialized {} and {}",
        config_path.display(),
        scope.display()
    );
    Ok(())
}

/// Write both files; returns the scope template path.
fn scaffold(config_path: &Path, force: bool) -> anyhow::Result<PathBuf> {
    if config_path.exists() {
        if !force {
            anyhow::bail!(
                "{} already exists. Use --force to overwrite.",
                config_path.display()
            );
        }
        fs::remove_file(config_path)?;
    }
    scaffold_default_config(config_path)?;

    let scope = config_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SCOPE_TEMPLATE_FILE);
    if force || !scope.exists() {
        let template = json!({
            "authorized": true,
            "target": "https://staging.example.com",
            "out_of_scope": ["production"],
        });
        fs::write(&scope, serde_json::to_string_pretty(&template)?)?;
    }
    Ok(scope)
}
