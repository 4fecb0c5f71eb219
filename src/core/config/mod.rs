//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$TRISYNC_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/trisync/config.toml`
//! 3. `~/.trisync/config.toml`
//!
//! # Repo Config Location
//!
//! `<git-dir>/trisync/config.toml`, so linked worktrees read the file from
//! their own git directory.
//!
//! # Example
//!
//! ```no_run
//! use trisync::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! println!("core remote: {}", config.core_remote());
//! println!("github remote: {}", config.github_remote());
//! ```

pub mod schema;

pub use schema::{ConfigFile, TimeoutsConfig};

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::lock::STATE_DIR;

/// Default remote name of the authoritative bare repository.
pub const DEFAULT_CORE_REMOTE: &str = "core";

/// Default remote name of the backup mirror.
pub const DEFAULT_GITHUB_REMOTE: &str = "github";

/// Default large-blob threshold in MiB.
pub const DEFAULT_LARGE_BLOB_THRESHOLD_MB: u64 = 10;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo file, then global file, then defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: ConfigFile,
    pub repo: Option<ConfigFile>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads the repository file from it.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed
    /// or validated. Missing files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Config, ConfigError> {
        let (global, global_path) = match Self::global_candidates()
            .into_iter()
            .find(|p| p.exists())
        {
            Some(path) => (Self::read_file(&path)?, Some(path)),
            None => (ConfigFile::default(), None),
        };

        let (repo, repo_path_found) = match git_dir.map(Self::repo_config_path) {
            Some(path) if path.exists() => (Some(Self::read_file(&path)?), Some(path)),
            _ => (None, None),
        };

        let config = Config {
            global,
            repo,
            global_path,
            repo_path: repo_path_found,
        };
        config.validate()?;

        tracing::debug!(
            global = ?config.global_path,
            repo = ?config.repo_path,
            "loaded configuration"
        );
        Ok(config)
    }

    /// Global config locations in search order.
    fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("TRISYNC_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("trisync/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".trisync/config.toml"));
        }
        candidates
    }

    /// Repo config path inside a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join(STATE_DIR).join("config.toml")
    }

    fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.global.validate()?;
        if let Some(repo) = &self.repo {
            repo.validate()?;
        }
        if self.core_remote() == self.github_remote() {
            return Err(ConfigError::InvalidValue(format!(
                "core and github remotes resolve to the same name '{}'",
                self.core_remote()
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    fn pick<'a, T>(&'a self, get: impl Fn(&'a ConfigFile) -> Option<T>) -> Option<T> {
        self.repo.as_ref().and_then(&get).or_else(|| get(&self.global))
    }

    /// Remote name of the core repository. Defaults to `core`.
    pub fn core_remote(&self) -> &str {
        self.pick(|c| c.core_remote.as_deref())
            .unwrap_or(DEFAULT_CORE_REMOTE)
    }

    /// Remote name of the GitHub mirror. Defaults to `github`.
    pub fn github_remote(&self) -> &str {
        self.pick(|c| c.github_remote.as_deref())
            .unwrap_or(DEFAULT_GITHUB_REMOTE)
    }

    /// Configured default branch, if any.
    pub fn default_branch(&self) -> Option<&str> {
        self.pick(|c| c.default_branch.as_deref())
    }

    /// Defaults to `true`.
    pub fn fetch_before_check(&self) -> bool {
        self.pick(|c| c.fetch_before_check).unwrap_or(true)
    }

    /// Defaults to `false`.
    pub fn skip_corruption(&self) -> bool {
        self.pick(|c| c.skip_corruption).unwrap_or(false)
    }

    /// Large-blob threshold in bytes.
    pub fn large_blob_threshold_bytes(&self) -> u64 {
        self.pick(|c| c.large_blob_threshold_mb)
            .unwrap_or(DEFAULT_LARGE_BLOB_THRESHOLD_MB)
            .saturating_mul(1024 * 1024)
    }

    /// Timeout overrides, repo values layered over global values.
    pub fn timeouts(&self) -> TimeoutsConfig {
        let global = self.global.timeouts.clone().unwrap_or_default();
        match self.repo.as_ref().and_then(|r| r.timeouts.as_ref()) {
            Some(repo) => global.merged(repo),
            None => global,
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}
