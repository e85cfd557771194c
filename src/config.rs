//! Configuration types.
//!
//! The interactive configuration editor lives in the CLI layer; this module
//! only defines the typed settings the core consumes and a TOML loader for
//! the file that layer writes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Long-lived branch names plus the feature-branch prefix.
///
/// The reducer excludes the reserved names from branch tracking and uses the
/// prefix to guess the milestone's primary feature branch. Comparison is
/// exact: a project whose development branch is called `develop` is only
/// excluded if `dev` is configured as `develop`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BranchConfig {
    /// Long-lived production branch.
    pub master: String,

    /// Long-lived development branch.
    pub dev: String,

    /// Long-lived test branch.
    pub test: String,

    /// Prefix that marks a branch as a feature branch.
    pub feature_prefix: String,
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            master: "master".to_string(),
            dev: "dev".to_string(),
            test: "test".to_string(),
            feature_prefix: "feature/".to_string(),
        }
    }
}

impl BranchConfig {
    /// Whether `name` is one of the reserved long-lived branches.
    pub fn is_reserved(&self, name: &str) -> bool {
        name == self.master || name == self.dev || name == self.test
    }
}

/// Settings for the remote GitLab collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the GitLab instance (e.g. `https://gitlab.com`).
    pub base_url: String,

    /// Access token for authentication.
    pub token: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Root configuration, one per configuration root / database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub remote: RemoteConfig,

    #[serde(default)]
    pub branches: BranchConfig,
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    /// Load a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_branch_comparison_is_exact() {
        let branches = BranchConfig::default();
        assert!(branches.is_reserved("master"));
        assert!(branches.is_reserved("dev"));
        assert!(branches.is_reserved("test"));
        // `develop` only matches if configured as the dev branch name
        assert!(!branches.is_reserved("develop"));

        let custom = BranchConfig {
            dev: "develop".to_string(),
            ..BranchConfig::default()
        };
        assert!(custom.is_reserved("develop"));
        assert!(!custom.is_reserved("dev"));
    }

    #[test]
    fn test_load_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("milesync.toml");
        std::fs::write(
            &path,
            r#"
[remote]
base_url = "https://gitlab.example.com"
token = "glpat-test"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.branches, BranchConfig::default());
    }
}
