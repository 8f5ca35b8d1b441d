//! # bastion-config
//!
//! Strongly typed configuration for Bastion assessment runs.
//!
//! Operators describe their provider, safety posture, run layout, and
//! focus/avoid rules in a `bastion.toml` file. Everything is validated at load
//! time: an empty rule value or an incomplete provider section is a
//! [`ConfigError`], never a runtime surprise in the middle of a phase.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use bastion_config::load_config;
//!
//! let config = load_config(Some(std::path::Path::new("bastion.toml"))).unwrap();
//! println!("{} focus rules", config.rules.focus.len());
//! ```

pub mod error;
pub mod load;
pub mod model;

pub use error::ConfigError;
pub use load::{
    apply_env_overrides, load_config, load_config_with_env, parse_config, scaffold_default_config,
    DEFAULT_CONFIG_FILE,
};
pub use model::{
    BastionConfig, ProviderConfig, ProviderKind, RuleMatcherConfig, RulesConfig, RunConfig,
    SafetyConfig, TargetType,
};
