//! engine::detect
//!
//! Classifier: probes the three copies in dependency order and assembles
//! a [`RepositoryState`].
//!
//! # Stages
//!
//! 1. Toolchain check (git 2.30 or newer)
//! 2. Existence: local repository, remote configuration and reachability
//! 3. Concurrently: fetch of present remotes, and local checks
//!    (working tree, large-blob scan)
//! 4. Default branch resolution and tip comparison
//! 5. Per-branch topology and sync
//!
//! A missing local repository stops detection after stage 2.
//!
//! # Degraded data
//!
//! A remote that fails to fetch, or is configured but unreachable, does not
//! abort detection. Its remote-tracking refs are still compared, and the
//! snapshot is marked with `data_is_fresh = false`.
//!
//! # Example
//!
//! ```ignore
//! use trisync::engine::detect::{detect, DetectOptions, Remotes};
//!
//! let state = detect(Path::new("."), &Remotes::default(), &DetectOptions::default()).await?;
//! println!("{}", state.existence.id());
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::state::{
    BranchState, BranchSyncState, BranchTips, CorruptionState, ExistenceState, LargeBinary,
    RemoteStatus, RepositoryState, SyncPair, SyncPairs, WorkingTreeState,
};
use crate::core::config::{DEFAULT_CORE_REMOTE, DEFAULT_GITHUB_REMOTE};
use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{GitError, GitProbe, GitVersion, ProbeTimeouts, RepoPresence};

/// Branch used when nothing else names one.
pub const FALLBACK_BRANCH: &str = "main";

/// Default large-blob threshold (10 MiB).
pub const DEFAULT_LARGE_BLOB_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Errors that make detection impossible.
#[derive(Debug, Error)]
pub enum DetectError {
    /// The local path holds a bare repository.
    #[error("repository at {path} is bare; a working tree is required")]
    BareRepository { path: PathBuf },

    /// The local repository exists but cannot be opened.
    #[error("cannot access repository at {path}: {message}")]
    Inaccessible { path: PathBuf, message: String },

    /// git is older than the supported minimum.
    #[error("git {found} is too old; {required} or newer is required")]
    GitTooOld {
        found: GitVersion,
        required: GitVersion,
    },

    /// A local git command failed.
    #[error("local git command failed: {0}")]
    Git(#[from] GitError),
}

/// A remote named explicitly by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSpec {
    pub name: String,
    /// URL to probe when the local repository is missing.
    pub url: Option<String>,
}

impl RemoteSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// The two remotes of a mirrored repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remotes {
    pub core: RemoteSpec,
    pub github: RemoteSpec,
}

impl Default for Remotes {
    fn default() -> Self {
        Self {
            core: RemoteSpec::named(DEFAULT_CORE_REMOTE),
            github: RemoteSpec::named(DEFAULT_GITHUB_REMOTE),
        }
    }
}

/// Detection knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectOptions {
    pub fetch_before_check: bool,
    pub skip_corruption: bool,
    /// Overrides default-branch resolution.
    pub default_branch: Option<BranchName>,
    /// Blob size in bytes at or above which a blob is reported.
    pub large_blob_threshold: u64,
    pub timeouts: ProbeTimeouts,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            fetch_before_check: true,
            skip_corruption: false,
            default_branch: None,
            large_blob_threshold: DEFAULT_LARGE_BLOB_THRESHOLD,
            timeouts: ProbeTimeouts::default(),
        }
    }
}

/// Outcome of the pre-comparison fetch.
#[derive(Debug, Default)]
struct FetchOutcome {
    failed: Vec<String>,
}

/// Repeatable detection over one probe.
#[derive(Debug)]
pub struct Detector {
    probe: GitProbe,
    remotes: Remotes,
    options: DetectOptions,
}

/// Run one detection pass.
pub async fn detect(
    repo_path: &Path,
    remotes: &Remotes,
    options: &DetectOptions,
) -> Result<RepositoryState, DetectError> {
    Detector::new(repo_path, remotes.clone(), options.clone())
        .detect()
        .await
}

impl Detector {
    pub fn new(repo_path: impl Into<PathBuf>, remotes: Remotes, options: DetectOptions) -> Self {
        Self {
            probe: GitProbe::new(repo_path, options.timeouts),
            remotes,
            options,
        }
    }

    pub fn probe(&self) -> &GitProbe {
        &self.probe
    }

    pub fn remotes(&self) -> &Remotes {
        &self.remotes
    }

    pub fn options(&self) -> &DetectOptions {
        &self.options
    }

    /// Produce a fresh snapshot. Nothing is cached between calls.
    pub async fn detect(&self) -> Result<RepositoryState, DetectError> {
        let path = self.probe.path().to_path_buf();
        tracing::debug!(path = %path.display(), "detection started");

        self.probe
            .ensure_supported_version()
            .await
            .map_err(|e| match e {
                GitError::VersionTooOld { found, required } => {
                    DetectError::GitTooOld { found, required }
                }
                other => DetectError::Git(other),
            })?;

        let (local_exists, path) = match self.probe.open_repository() {
            Ok(RepoPresence::WorkTree { work_dir, .. }) => (true, work_dir),
            Ok(RepoPresence::Missing) => (false, path),
            Ok(RepoPresence::Bare) => return Err(DetectError::BareRepository { path }),
            Err(e) => {
                return Err(DetectError::Inaccessible {
                    path,
                    message: e.to_string(),
                })
            }
        };

        let core = self.remote_status(&self.remotes.core, local_exists).await?;
        let github = self.remote_status(&self.remotes.github, local_exists).await?;
        let existence = ExistenceState::new(local_exists, core, github);
        tracing::info!(id = %existence.id(), "existence classified");

        if !local_exists {
            return Ok(RepositoryState::local_absent(path, existence));
        }

        let (fetch, local) = tokio::join!(self.fetch_remotes(&existence), self.local_checks());
        let (working_tree, corruption) = local?;
        let data_is_fresh = self.options.fetch_before_check && fetch.failed.is_empty();
        if !data_is_fresh {
            tracing::warn!(failed = ?fetch.failed, "remote data may be stale");
        }

        let default_branch = self.resolve_default_branch(&existence).await?;
        let sync = self
            .branch_sync(&default_branch, &existence, data_is_fresh)
            .await?;
        if let Some(sync) = &sync {
            tracing::info!(branch = %default_branch, id = %sync.id(), "sync classified");
        }

        let branches = self.branch_states(&existence, data_is_fresh).await?;

        Ok(RepositoryState {
            repo_path: path,
            existence,
            working_tree: Some(working_tree),
            corruption: Some(corruption),
            default_branch: Some(default_branch),
            sync,
            branches,
            data_is_fresh,
            stale_remotes: fetch.failed,
        })
    }

    // =========================================================================
    // Existence
    // =========================================================================

    async fn remote_status(
        &self,
        spec: &RemoteSpec,
        local_exists: bool,
    ) -> Result<RemoteStatus, DetectError> {
        let url = if local_exists {
            self.probe.remote_url(&spec.name).await?
        } else {
            spec.url.clone()
        };
        let configured = url.is_some();

        let reachable = match (&url, local_exists) {
            (None, _) => false,
            (Some(_), true) => self.probe.is_reachable(&spec.name).await,
            (Some(url), false) => self.probe.is_reachable(url).await,
        };
        tracing::debug!(remote = %spec.name, configured, reachable, "remote probed");

        Ok(RemoteStatus {
            name: spec.name.clone(),
            url,
            configured,
            reachable,
        })
    }

    // =========================================================================
    // Concurrent stage
    // =========================================================================

    /// Fetch every configured remote. Unreachable remotes count as failed
    /// without being fetched.
    async fn fetch_remotes(&self, existence: &ExistenceState) -> FetchOutcome {
        let mut outcome = FetchOutcome::default();
        if !self.options.fetch_before_check {
            return outcome;
        }

        for remote in [&existence.core, &existence.github] {
            if !remote.configured {
                continue;
            }
            if !remote.reachable {
                outcome.failed.push(remote.name.clone());
                continue;
            }
            if let Err(e) = self.probe.fetch(&remote.name).await {
                tracing::warn!(remote = %remote.name, error = %e, "fetch failed");
                outcome.failed.push(remote.name.clone());
            }
        }
        outcome
    }

    async fn local_checks(&self) -> Result<(WorkingTreeState, CorruptionState), DetectError> {
        let status = self.probe.status().await?;
        let detached = self.probe.is_detached_head().await?;
        let shallow = self.probe.is_shallow().await?;
        let working_tree = WorkingTreeState::new(status.staged, status.unstaged, detached, shallow);
        tracing::debug!(id = %working_tree.id(), "working tree classified");

        let threshold = self.options.large_blob_threshold;
        let corruption = if self.options.skip_corruption {
            CorruptionState::skipped(threshold)
        } else {
            match self.probe.scan_large_blobs(threshold).await {
                Ok(blobs) => CorruptionState::new(
                    blobs
                        .into_iter()
                        .map(|b| LargeBinary {
                            sha: b.oid,
                            size_bytes: b.size_bytes,
                        })
                        .collect(),
                    threshold,
                ),
                Err(e) if e.is_timeout() => {
                    tracing::warn!(error = %e, "large-blob scan timed out; skipping");
                    CorruptionState::skipped(threshold)
                }
                Err(e) => return Err(e.into()),
            }
        };
        tracing::debug!(id = %corruption.id(), "corruption classified");

        Ok((working_tree, corruption))
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Caller's choice, then `<core>/HEAD`, then the checked-out branch,
    /// then `main`.
    async fn resolve_default_branch(
        &self,
        existence: &ExistenceState,
    ) -> Result<BranchName, DetectError> {
        if let Some(branch) = &self.options.default_branch {
            return Ok(branch.clone());
        }
        if existence.core.configured {
            if let Some(branch) = self.probe.remote_default_branch(&existence.core.name).await? {
                return Ok(branch);
            }
        }
        if let Some(branch) = self.probe.current_branch().await? {
            return Ok(branch);
        }
        Ok(BranchName::new(FALLBACK_BRANCH).map_err(GitError::from)?)
    }

    async fn tips(
        &self,
        branch: &BranchName,
        existence: &ExistenceState,
    ) -> Result<BranchTips, DetectError> {
        let local = self.probe.resolve_tip(&RefName::for_branch(branch)).await?;
        let core = self.remote_tip(&existence.core, branch).await?;
        let github = self.remote_tip(&existence.github, branch).await?;
        Ok(BranchTips {
            local,
            core,
            github,
        })
    }

    async fn remote_tip(
        &self,
        remote: &RemoteStatus,
        branch: &BranchName,
    ) -> Result<Option<Oid>, DetectError> {
        if !remote.configured {
            return Ok(None);
        }
        let refname = RefName::for_remote_branch(&remote.name, branch);
        Ok(self.probe.resolve_tip(&refname).await?)
    }

    async fn pair(
        &self,
        first: Option<&Oid>,
        second: Option<&Oid>,
    ) -> Result<Option<SyncPair>, DetectError> {
        let (Some(first), Some(second)) = (first, second) else {
            return Ok(None);
        };
        if first == second {
            return Ok(Some(SyncPair::synced()));
        }
        let ahead = self.probe.commit_count(second, first).await?;
        let behind = self.probe.commit_count(first, second).await?;
        Ok(SyncPair::new(false, ahead, behind))
    }

    async fn branch_sync(
        &self,
        branch: &BranchName,
        existence: &ExistenceState,
        data_is_fresh: bool,
    ) -> Result<Option<BranchSyncState>, DetectError> {
        let tips = self.tips(branch, existence).await?;
        let pairs = SyncPairs {
            local_core: self.pair(tips.local.as_ref(), tips.core.as_ref()).await?,
            local_github: self.pair(tips.local.as_ref(), tips.github.as_ref()).await?,
            core_github: self.pair(tips.core.as_ref(), tips.github.as_ref()).await?,
        };
        Ok(BranchSyncState::new(branch.clone(), tips, pairs, data_is_fresh))
    }

    async fn branch_states(
        &self,
        existence: &ExistenceState,
        data_is_fresh: bool,
    ) -> Result<Vec<BranchState>, DetectError> {
        let local: BTreeSet<BranchName> =
            self.probe.list_local_branches().await?.into_iter().collect();
        let core = self.remote_branches(&existence.core).await?;
        let github = self.remote_branches(&existence.github).await?;

        let names: BTreeSet<&BranchName> = local.iter().chain(&core).chain(&github).collect();
        let mut states = Vec::with_capacity(names.len());
        for name in names {
            let (in_local, in_core, in_github) =
                (local.contains(name), core.contains(name), github.contains(name));
            let present = [in_local, in_core, in_github].iter().filter(|p| **p).count();
            let sync = if present >= 2 {
                self.branch_sync(name, existence, data_is_fresh).await?
            } else {
                None
            };
            if let Some(state) = BranchState::new(name.clone(), in_local, in_core, in_github, sync) {
                states.push(state);
            }
        }
        tracing::debug!(count = states.len(), "branches classified");
        Ok(states)
    }

    async fn remote_branches(
        &self,
        remote: &RemoteStatus,
    ) -> Result<BTreeSet<BranchName>, DetectError> {
        if !remote.configured {
            return Ok(BTreeSet::new());
        }
        Ok(self
            .probe
            .list_remote_branches(&remote.name)
            .await?
            .into_iter()
            .collect())
    }
}
