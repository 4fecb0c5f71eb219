//! core::config::schema
//!
//! Configuration schema types.
//!
//! The same schema is used for the global file and the repository file;
//! values in the repository file override the global ones key by key.
//!
//! # Example
//!
//! ```toml
//! core_remote = "core"
//! github_remote = "github"
//! default_branch = "main"
//! fetch_before_check = true
//! skip_corruption = false
//! large_blob_threshold_mb = 10
//!
//! [timeouts]
//! local_ms = 2000
//! reachability_ms = 5000
//! network_ms = 30000
//! scan_ms = 30000
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Largest accepted large-blob threshold (1 TiB).
pub const MAX_LARGE_BLOB_THRESHOLD_MB: u64 = 1024 * 1024;

/// One configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote name of the authoritative bare repository.
    pub core_remote: Option<String>,

    /// Remote name of the backup mirror.
    pub github_remote: Option<String>,

    /// Branch to classify for sync state.
    pub default_branch: Option<String>,

    /// Fetch remotes before comparing tips.
    pub fetch_before_check: Option<bool>,

    /// Skip the large-blob scan.
    pub skip_corruption: Option<bool>,

    /// Blob size at or above which a blob is reported.
    pub large_blob_threshold_mb: Option<u64>,

    /// Per-class subprocess deadlines.
    pub timeouts: Option<TimeoutsConfig>,
}

impl ConfigFile {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("core_remote", &self.core_remote),
            ("github_remote", &self.github_remote),
        ] {
            if let Some(remote) = value {
                if remote.trim().is_empty() {
                    return Err(ConfigError::InvalidValue(format!("{key} cannot be empty")));
                }
            }
        }

        if let (Some(core), Some(github)) = (&self.core_remote, &self.github_remote) {
            if core == github {
                return Err(ConfigError::InvalidValue(format!(
                    "core_remote and github_remote must differ (both '{core}')"
                )));
            }
        }

        if let Some(branch) = &self.default_branch {
            BranchName::new(branch.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default_branch: {}", e))
            })?;
        }

        if let Some(mb) = self.large_blob_threshold_mb {
            if !(1..=MAX_LARGE_BLOB_THRESHOLD_MB).contains(&mb) {
                return Err(ConfigError::InvalidValue(format!(
                    "large_blob_threshold_mb must be between 1 and {MAX_LARGE_BLOB_THRESHOLD_MB}"
                )));
            }
        }

        if let Some(timeouts) = &self.timeouts {
            timeouts.validate()?;
        }

        Ok(())
    }
}

/// Deadline overrides in milliseconds.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutsConfig {
    pub local_ms: Option<u64>,
    pub reachability_ms: Option<u64>,
    pub network_ms: Option<u64>,
    pub scan_ms: Option<u64>,
}

impl TimeoutsConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("local_ms", self.local_ms),
            ("reachability_ms", self.reachability_ms),
            ("network_ms", self.network_ms),
            ("scan_ms", self.scan_ms),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "timeouts.{key} must be greater than zero"
                )));
            }
        }
        Ok(())
    }

    /// Overlay `other` on top of `self`.
    pub(super) fn merged(&self, other: &TimeoutsConfig) -> TimeoutsConfig {
        TimeoutsConfig {
            local_ms: other.local_ms.or(self.local_ms),
            reachability_ms: other.reachability_ms.or(self.reachability_ms),
            network_ms: other.network_ms.or(self.network_ms),
            scan_ms: other.scan_ms.or(self.scan_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let toml = r#"
            core_remote = "origin"
            github_remote = "backup"
            default_branch = "trunk"
            fetch_before_check = false
            skip_corruption = true
            large_blob_threshold_mb = 50

            [timeouts]
            network_ms = 60000
        "#;
        let config: ConfigFile = toml::from_str(toml).unwrap();
        assert_eq!(config.core_remote.as_deref(), Some("origin"));
        assert_eq!(config.large_blob_threshold_mb, Some(50));
        assert_eq!(config.timeouts.as_ref().unwrap().network_ms, Some(60000));
        config.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_keys() {
        let result: Result<ConfigFile, _> = toml::from_str("remote = \"origin\"");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_same_remote_twice() {
        let config = ConfigFile {
            core_remote: Some("origin".into()),
            github_remote: Some("origin".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_branch_and_zero_values() {
        let bad_branch = ConfigFile {
            default_branch: Some("a..b".into()),
            ..Default::default()
        };
        assert!(bad_branch.validate().is_err());

        let zero_threshold = ConfigFile {
            large_blob_threshold_mb: Some(0),
            ..Default::default()
        };
        assert!(zero_threshold.validate().is_err());

        let huge_threshold = ConfigFile {
            large_blob_threshold_mb: Some(MAX_LARGE_BLOB_THRESHOLD_MB + 1),
            ..Default::default()
        };
        assert!(huge_threshold.validate().is_err());

        let largest_threshold = ConfigFile {
            large_blob_threshold_mb: Some(MAX_LARGE_BLOB_THRESHOLD_MB),
            ..Default::default()
        };
        assert!(largest_threshold.validate().is_ok());

        let zero_timeout = ConfigFile {
            timeouts: Some(TimeoutsConfig {
                scan_ms: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn timeouts_merge_prefers_overlay() {
        let base = TimeoutsConfig {
            local_ms: Some(1),
            network_ms: Some(2),
            ..Default::default()
        };
        let overlay = TimeoutsConfig {
            network_ms: Some(3),
            ..Default::default()
        };
        let merged = base.merged(&overlay);
        assert_eq!(merged.local_ms, Some(1));
        assert_eq!(merged.network_ms, Some(3));
        assert_eq!(merged.scan_ms, None);
    }
}
