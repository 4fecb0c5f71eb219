//! engine::tables
//!
//! Classification tables mapping raw comparison tuples to scenario IDs.
//!
//! # Architecture
//!
//! Every classifier in the engine is a lookup into one of the `const`
//! tables below. The tables are plain data so they can be audited by tests
//! against an independent enumeration of what git history can produce.
//!
//! Total domains (existence, working tree, corruption, branch topology)
//! are stored in index order, where the index is the bit pattern of the
//! boolean key with `true` first. The sync table is partial: only tuples
//! realizable by three commits appear, and everything else is
//! [`SyncId::Unknown`].
//!
//! # Sync key
//!
//! A [`SyncKey`] is `(local↔core, local↔github, core↔github)`, each read as
//! "the first location relative to the second". `Ahead` means the first
//! has commits the second lacks and not the reverse.

use serde::{Deserialize, Serialize};

/// Relation between two branch tips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Synced,
    Ahead,
    Behind,
    Diverged,
}

impl SyncStatus {
    /// The same relation seen from the other side.
    pub fn inverse(self) -> Self {
        match self {
            SyncStatus::Ahead => SyncStatus::Behind,
            SyncStatus::Behind => SyncStatus::Ahead,
            other => other,
        }
    }

    /// Derive the relation from commit counts on each side.
    ///
    /// `ahead` counts commits only the first tip has; `behind` counts
    /// commits only the second has. Returns `None` for the inconsistent
    /// case of different tips with no unique commits on either side.
    pub fn from_counts(same_tip: bool, ahead: usize, behind: usize) -> Option<Self> {
        match (same_tip, ahead, behind) {
            (true, _, _) => Some(SyncStatus::Synced),
            (false, 0, 0) => None,
            (false, _, 0) => Some(SyncStatus::Ahead),
            (false, 0, _) => Some(SyncStatus::Behind),
            (false, _, _) => Some(SyncStatus::Diverged),
        }
    }

    fn letter(self) -> char {
        match self {
            SyncStatus::Synced => 's',
            SyncStatus::Ahead => 'a',
            SyncStatus::Behind => 'b',
            SyncStatus::Diverged => 'd',
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncStatus::Synced => "synced",
            SyncStatus::Ahead => "ahead",
            SyncStatus::Behind => "behind",
            SyncStatus::Diverged => "diverged",
        };
        f.write_str(label)
    }
}

/// `(local↔core, local↔github, core↔github)`.
pub type SyncKey = (SyncStatus, SyncStatus, SyncStatus);

/// Compact `sss`-style rendering of a key, used in logs.
pub fn render_key(key: SyncKey) -> String {
    [key.0, key.1, key.2].iter().map(|s| s.letter()).collect()
}

macro_rules! scenario_ids {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $desc:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Short human description of the scenario.
            pub fn describe(&self) -> &'static str {
                match self {
                    $($name::$variant => $desc),+
                }
            }

            /// The scenario code, e.g. `E1`.
            pub fn code(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.code())
            }
        }
    };
}

scenario_ids! {
    /// Which of the three copies exist.
    ExistenceId {
        E1 => "local, core and github all present",
        E2 => "local and core present, github missing",
        E3 => "local and github present, core missing",
        E4 => "local only",
        E5 => "local missing, both remotes present",
        E6 => "core only",
        E7 => "github only",
        E8 => "nothing present",
    }
}

scenario_ids! {
    /// Working tree cleanliness.
    WorkingTreeId {
        W1 => "clean",
        W2 => "staged changes only",
        W3 => "unstaged changes only",
        W4 => "staged and unstaged changes",
    }
}

scenario_ids! {
    /// Where large blobs were found.
    CorruptionId {
        C1 => "no large blobs",
        C2 => "large blobs in local history",
        C3 => "large blobs on core",
        C4 => "large blobs on github",
        C5 => "large blobs in local and core",
        C6 => "large blobs in local and github",
        C7 => "large blobs on core and github",
        C8 => "large blobs everywhere",
    }
}

scenario_ids! {
    /// Default-branch sync scenario.
    SyncId {
        S1 => "all synced",
        S2 => "local ahead of both remotes",
        S3 => "local ahead of one remote, equal to the other",
        S4 => "local behind, remotes agree",
        S5 => "core leads everything",
        S6 => "github leads everything",
        S7 => "only local and core diverged",
        S8 => "only local and github diverged",
        S9 => "only core and github diverged",
        S10 => "local diverged from both remotes",
        S11 => "core diverged from both",
        S12 => "github diverged from both",
        S13 => "all three mutually diverged",
        Unknown => "comparison is inconsistent; detection unreliable",
    }
}

scenario_ids! {
    /// Per-branch presence across the three copies.
    BranchId {
        B1 => "fully tracked",
        B2 => "on core only",
        B3 => "on github only",
        B4 => "local-only",
        B5 => "remote-only, not fetched locally",
        B6 => "core orphan",
        B7 => "github orphan",
    }
}

impl SyncId {
    /// Scenarios that need a manual merge.
    pub fn is_divergent(&self) -> bool {
        matches!(
            self,
            SyncId::S7
                | SyncId::S8
                | SyncId::S9
                | SyncId::S10
                | SyncId::S11
                | SyncId::S12
                | SyncId::S13
        )
    }
}

/// Index of a boolean triple with `true` sorting first.
fn triple_index(a: bool, b: bool, c: bool) -> usize {
    (usize::from(!a) << 2) | (usize::from(!b) << 1) | usize::from(!c)
}

/// `(local, core, github)` presence.
pub const EXISTENCE_TABLE: [((bool, bool, bool), ExistenceId); 8] = [
    ((true, true, true), ExistenceId::E1),
    ((true, true, false), ExistenceId::E2),
    ((true, false, true), ExistenceId::E3),
    ((true, false, false), ExistenceId::E4),
    ((false, true, true), ExistenceId::E5),
    ((false, true, false), ExistenceId::E6),
    ((false, false, true), ExistenceId::E7),
    ((false, false, false), ExistenceId::E8),
];

/// `(has_staged, has_unstaged)`.
pub const WORKING_TREE_TABLE: [((bool, bool), WorkingTreeId); 4] = [
    ((true, true), WorkingTreeId::W4),
    ((true, false), WorkingTreeId::W2),
    ((false, true), WorkingTreeId::W3),
    ((false, false), WorkingTreeId::W1),
];

/// `(local, core, github)` large-blob presence.
pub const CORRUPTION_TABLE: [((bool, bool, bool), CorruptionId); 8] = [
    ((true, true, true), CorruptionId::C8),
    ((true, true, false), CorruptionId::C5),
    ((true, false, true), CorruptionId::C6),
    ((true, false, false), CorruptionId::C2),
    ((false, true, true), CorruptionId::C7),
    ((false, true, false), CorruptionId::C3),
    ((false, false, true), CorruptionId::C4),
    ((false, false, false), CorruptionId::C1),
];

/// `(local, core, github)` branch presence. A branch seen nowhere has no ID.
pub const BRANCH_TABLE: [((bool, bool, bool), Option<BranchId>); 8] = [
    ((true, true, true), Some(BranchId::B1)),
    ((true, true, false), Some(BranchId::B2)),
    ((true, false, true), Some(BranchId::B3)),
    ((true, false, false), Some(BranchId::B4)),
    ((false, true, true), Some(BranchId::B5)),
    ((false, true, false), Some(BranchId::B6)),
    ((false, false, true), Some(BranchId::B7)),
    ((false, false, false), None),
];

use SyncStatus::{Ahead as A, Behind as B, Diverged as D, Synced as S};

/// Every sync key realizable by three commits, and its scenario.
pub const SYNC_TABLE: [(SyncKey, SyncId); 29] = [
    ((S, S, S), SyncId::S1),
    ((A, A, S), SyncId::S2),
    ((A, A, A), SyncId::S2),
    ((A, A, B), SyncId::S2),
    ((A, A, D), SyncId::S2),
    ((A, S, B), SyncId::S3),
    ((S, A, A), SyncId::S3),
    ((B, B, S), SyncId::S4),
    ((B, S, A), SyncId::S5),
    ((B, B, A), SyncId::S5),
    ((B, A, A), SyncId::S5),
    ((B, D, A), SyncId::S5),
    ((S, B, B), SyncId::S6),
    ((B, B, B), SyncId::S6),
    ((A, B, B), SyncId::S6),
    ((D, B, B), SyncId::S6),
    ((D, A, A), SyncId::S7),
    ((A, D, B), SyncId::S8),
    ((B, B, D), SyncId::S9),
    ((D, D, S), SyncId::S10),
    ((D, D, A), SyncId::S10),
    ((D, D, B), SyncId::S10),
    ((D, S, D), SyncId::S11),
    ((D, A, D), SyncId::S11),
    ((D, B, D), SyncId::S11),
    ((S, D, D), SyncId::S12),
    ((A, D, D), SyncId::S12),
    ((B, D, D), SyncId::S12),
    ((D, D, D), SyncId::S13),
];

pub fn classify_existence(local: bool, core: bool, github: bool) -> ExistenceId {
    EXISTENCE_TABLE[triple_index(local, core, github)].1
}

pub fn classify_working_tree(has_staged: bool, has_unstaged: bool) -> WorkingTreeId {
    let index = (usize::from(!has_staged) << 1) | usize::from(!has_unstaged);
    WORKING_TREE_TABLE[index].1
}

pub fn classify_corruption(local: bool, core: bool, github: bool) -> CorruptionId {
    CORRUPTION_TABLE[triple_index(local, core, github)].1
}

pub fn classify_branch(local: bool, core: bool, github: bool) -> Option<BranchId> {
    BRANCH_TABLE[triple_index(local, core, github)].1
}

/// Look up a sync key. Unlisted keys are [`SyncId::Unknown`].
pub fn classify_sync(key: SyncKey) -> SyncId {
    SYNC_TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, id)| *id)
        .unwrap_or(SyncId::Unknown)
}

/// Key used when github lacks the branch: github is taken to equal local.
pub fn project_missing_github(local_core: SyncStatus) -> SyncKey {
    (local_core, SyncStatus::Synced, local_core.inverse())
}

/// Key used when core lacks the branch: core is taken to equal local.
pub fn project_missing_core(local_github: SyncStatus) -> SyncKey {
    (SyncStatus::Synced, local_github, local_github)
}
