//! engine::state
//!
//! The result of one detection pass.
//!
//! # Architecture
//!
//! A [`RepositoryState`] is a read-only snapshot assembled by the
//! classifier. Each sub-state derives its scenario ID in its constructor
//! from the tables in [`super::tables`]; IDs are never assigned directly
//! and have no setters.
//!
//! When the local repository is absent, only the existence state is
//! populated and every other field is `None` or empty.
//!
//! # Fingerprints
//!
//! [`RepositoryState::fingerprint`] hashes the JSON encoding of the
//! snapshot. The snapshot carries no timestamps, so detecting an
//! unchanged repository twice yields the same fingerprint.

use std::path::PathBuf;

use serde::Serialize;

use super::tables::{
    self, BranchId, CorruptionId, ExistenceId, SyncId, SyncKey, SyncStatus, WorkingTreeId,
};
use crate::core::types::{BranchName, Fingerprint, Location, Oid};

// =============================================================================
// Existence
// =============================================================================

/// Resolved configuration and reachability of one remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteStatus {
    /// Remote name as configured in the local repository.
    pub name: String,
    /// URL from `git remote get-url`, or from the caller when local is absent.
    pub url: Option<String>,
    pub configured: bool,
    pub reachable: bool,
}

impl RemoteStatus {
    /// A remote exists when it is configured and answers `ls-remote`.
    pub fn exists(&self) -> bool {
        self.configured && self.reachable
    }
}

/// Which copies of the repository exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExistenceState {
    pub local_exists: bool,
    pub core_exists: bool,
    pub github_exists: bool,
    pub core: RemoteStatus,
    pub github: RemoteStatus,
    id: ExistenceId,
}

impl ExistenceState {
    pub fn new(local_exists: bool, core: RemoteStatus, github: RemoteStatus) -> Self {
        let core_exists = core.exists();
        let github_exists = github.exists();
        Self {
            local_exists,
            core_exists,
            github_exists,
            core,
            github,
            id: tables::classify_existence(local_exists, core_exists, github_exists),
        }
    }

    pub fn id(&self) -> ExistenceId {
        self.id
    }

    /// Status of the remote at `location`. `None` for [`Location::Local`].
    pub fn remote(&self, location: Location) -> Option<&RemoteStatus> {
        match location {
            Location::Local => None,
            Location::Core => Some(&self.core),
            Location::GitHub => Some(&self.github),
        }
    }
}

// =============================================================================
// Working tree
// =============================================================================

/// Cleanliness of the working tree, plus advisory flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkingTreeState {
    pub clean: bool,
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub detached_head: bool,
    pub shallow: bool,
    id: WorkingTreeId,
}

impl WorkingTreeState {
    pub fn new(
        staged: Vec<String>,
        unstaged: Vec<String>,
        detached_head: bool,
        shallow: bool,
    ) -> Self {
        let id = tables::classify_working_tree(!staged.is_empty(), !unstaged.is_empty());
        Self {
            clean: staged.is_empty() && unstaged.is_empty(),
            staged,
            unstaged,
            detached_head,
            shallow,
            id,
        }
    }

    pub fn id(&self) -> WorkingTreeId {
        self.id
    }
}

// =============================================================================
// Corruption
// =============================================================================

/// A blob at or above the size threshold. No path or commit attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeBinary {
    pub sha: Oid,
    pub size_bytes: u64,
}

impl LargeBinary {
    /// Size in MiB.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Large-blob findings.
///
/// Only local history is scanned; presence on the remotes is unknown and
/// looked up as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionState {
    pub has_corruption: bool,
    pub large_blobs: Vec<LargeBinary>,
    pub threshold_bytes: u64,
    /// True when the scan was skipped by request.
    pub skipped: bool,
    id: CorruptionId,
}

impl CorruptionState {
    pub fn new(mut large_blobs: Vec<LargeBinary>, threshold_bytes: u64) -> Self {
        large_blobs.sort_by(|a, b| a.sha.cmp(&b.sha));
        let has_corruption = !large_blobs.is_empty();
        Self {
            has_corruption,
            large_blobs,
            threshold_bytes,
            skipped: false,
            id: tables::classify_corruption(has_corruption, false, false),
        }
    }

    /// A state for a scan that was not run.
    pub fn skipped(threshold_bytes: u64) -> Self {
        Self {
            skipped: true,
            ..Self::new(Vec::new(), threshold_bytes)
        }
    }

    pub fn id(&self) -> CorruptionId {
        self.id
    }
}

// =============================================================================
// Branch sync
// =============================================================================

/// Relation between two tips, read as "first relative to second".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncPair {
    pub status: SyncStatus,
    /// Commits only the first tip has.
    pub ahead: usize,
    /// Commits only the second tip has.
    pub behind: usize,
}

impl SyncPair {
    /// `None` for the inconsistent case of different tips with no unique
    /// commits on either side.
    pub fn new(same_tip: bool, ahead: usize, behind: usize) -> Option<Self> {
        let status = SyncStatus::from_counts(same_tip, ahead, behind)?;
        Some(Self {
            status,
            ahead,
            behind,
        })
    }

    pub fn synced() -> Self {
        Self {
            status: SyncStatus::Synced,
            ahead: 0,
            behind: 0,
        }
    }
}

/// Tip of one branch in each location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BranchTips {
    pub local: Option<Oid>,
    pub core: Option<Oid>,
    pub github: Option<Oid>,
}

impl BranchTips {
    pub fn get(&self, location: Location) -> Option<&Oid> {
        match location {
            Location::Local => self.local.as_ref(),
            Location::Core => self.core.as_ref(),
            Location::GitHub => self.github.as_ref(),
        }
    }
}

/// The three pairwise relations. Absent when a side lacks the branch or
/// the comparison was inconsistent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncPairs {
    pub local_core: Option<SyncPair>,
    pub local_github: Option<SyncPair>,
    pub core_github: Option<SyncPair>,
}

/// Sync state of one branch across the three copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchSyncState {
    pub branch: BranchName,
    pub tips: BranchTips,
    pub pairs: SyncPairs,
    pub data_is_fresh: bool,
    id: SyncId,
}

impl BranchSyncState {
    /// Classify a branch from its tips and pairwise relations.
    ///
    /// Returns `None` when the local branch is missing or neither remote
    /// has it. A missing remote is projected onto local for the lookup.
    pub fn new(
        branch: BranchName,
        tips: BranchTips,
        pairs: SyncPairs,
        data_is_fresh: bool,
    ) -> Option<Self> {
        tips.local.as_ref()?;
        if tips.core.is_none() && tips.github.is_none() {
            return None;
        }

        let id = match Self::lookup_key(&tips, &pairs) {
            Some(key) => tables::classify_sync(key),
            None => SyncId::Unknown,
        };
        if id == SyncId::Unknown {
            tracing::warn!(branch = %branch, ?pairs, "sync classification is unknown");
        }

        Some(Self {
            branch,
            tips,
            pairs,
            data_is_fresh,
            id,
        })
    }

    fn lookup_key(tips: &BranchTips, pairs: &SyncPairs) -> Option<SyncKey> {
        match (&tips.core, &tips.github) {
            (Some(_), Some(_)) => Some((
                pairs.local_core?.status,
                pairs.local_github?.status,
                pairs.core_github?.status,
            )),
            (Some(_), None) => Some(tables::project_missing_github(pairs.local_core?.status)),
            (None, Some(_)) => Some(tables::project_missing_core(pairs.local_github?.status)),
            (None, None) => None,
        }
    }

    pub fn id(&self) -> SyncId {
        self.id
    }

    /// Relation of local to a remote, if that remote has the branch.
    pub fn local_vs(&self, location: Location) -> Option<SyncPair> {
        match location {
            Location::Local => Some(SyncPair::synced()),
            Location::Core => self.pairs.local_core,
            Location::GitHub => self.pairs.local_github,
        }
    }
}

// =============================================================================
// Branch topology
// =============================================================================

/// Presence of one branch across the three copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchState {
    pub name: BranchName,
    pub local: bool,
    pub core: bool,
    pub github: bool,
    pub sync: Option<BranchSyncState>,
    id: BranchId,
}

impl BranchState {
    /// `None` when the branch is present nowhere.
    pub fn new(
        name: BranchName,
        local: bool,
        core: bool,
        github: bool,
        sync: Option<BranchSyncState>,
    ) -> Option<Self> {
        let id = tables::classify_branch(local, core, github)?;
        Some(Self {
            name,
            local,
            core,
            github,
            sync,
            id,
        })
    }

    pub fn id(&self) -> BranchId {
        self.id
    }

    /// Number of copies holding the branch.
    pub fn location_count(&self) -> usize {
        [self.local, self.core, self.github]
            .iter()
            .filter(|present| **present)
            .count()
    }
}

// =============================================================================
// Repository
// =============================================================================

/// One detection pass over the three copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryState {
    pub repo_path: PathBuf,
    pub existence: ExistenceState,
    pub working_tree: Option<WorkingTreeState>,
    pub corruption: Option<CorruptionState>,
    /// The branch whose sync state is classified.
    pub default_branch: Option<BranchName>,
    pub sync: Option<BranchSyncState>,
    /// Sorted by name.
    pub branches: Vec<BranchState>,
    /// A fetch was requested and every participating fetch succeeded.
    pub data_is_fresh: bool,
    /// Remotes whose fetch failed or timed out.
    pub stale_remotes: Vec<String>,
}

impl RepositoryState {
    /// Snapshot of a path with no local repository.
    pub fn local_absent(repo_path: PathBuf, existence: ExistenceState) -> Self {
        Self {
            repo_path,
            existence,
            working_tree: None,
            corruption: None,
            default_branch: None,
            sync: None,
            branches: Vec::new(),
            data_is_fresh: false,
            stale_remotes: Vec::new(),
        }
    }

    /// SHA-256 over the JSON encoding.
    pub fn fingerprint(&self) -> Result<Fingerprint, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(Fingerprint::compute(&bytes))
    }

    /// True when the working tree is known and clean.
    pub fn is_clean(&self) -> bool {
        self.working_tree.as_ref().is_some_and(|wt| wt.clean)
    }

    /// Remote name configured for a location.
    pub fn remote_name(&self, location: Location) -> Option<&str> {
        self.existence.remote(location).map(|r| r.name.as_str())
    }

    /// Look up a branch by name.
    pub fn branch(&self, name: &BranchName) -> Option<&BranchState> {
        self.branches
            .binary_search_by(|b| b.name.cmp(name))
            .ok()
            .map(|i| &self.branches[i])
    }
}
