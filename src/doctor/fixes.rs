//! doctor::fixes
//!
//! Fix descriptors and their identifiers.

use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::engine::operation::Operation;
use crate::engine::tables::{BranchId, CorruptionId, ExistenceId, SyncId, WorkingTreeId};

/// Priority bands. Lower is more urgent.
pub mod priority {
    /// Stale remote data and unreliable classification.
    pub const STALE: u8 = 1;
    /// Missing or unreachable copies.
    pub const EXISTENCE: u8 = 2;
    /// Dirty tree, large blobs, detached HEAD, shallow clone.
    pub const LOCAL_HEALTH: u8 = 3;
    /// Default-branch sync.
    pub const SYNC: u8 = 4;
    /// Divergence needing a manual merge.
    pub const DIVERGENCE: u8 = 5;
    /// Per-branch topology gaps.
    pub const TOPOLOGY: u8 = 6;
}

/// The scenario a fix responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ScenarioId {
    /// Remote-tracking data could not be refreshed.
    Stale,
    Existence(ExistenceId),
    WorkingTree(WorkingTreeId),
    Corruption(CorruptionId),
    DetachedHead,
    Shallow,
    Sync(SyncId),
    Branch(BranchId),
}

impl ScenarioId {
    pub fn code(&self) -> &'static str {
        match self {
            ScenarioId::Stale => "STALE",
            ScenarioId::Existence(id) => id.code(),
            ScenarioId::WorkingTree(id) => id.code(),
            ScenarioId::Corruption(id) => id.code(),
            ScenarioId::DetachedHead => "DETACHED",
            ScenarioId::Shallow => "SHALLOW",
            ScenarioId::Sync(id) => id.code(),
            ScenarioId::Branch(id) => id.code(),
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl From<ScenarioId> for String {
    fn from(id: ScenarioId) -> Self {
        id.code().to_string()
    }
}

/// A string that is not a well-formed fix id.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid fix id '{0}': expected <scenario>:<action>[:<key>]")]
pub struct InvalidFixId(pub String);

/// Stable fix identifier: `<scenario>:<action>[:<key>]`.
///
/// # Example
///
/// ```
/// use trisync::doctor::FixId;
///
/// let id = FixId::with_key("B2", "push", "github:feature");
/// assert_eq!(id.as_str(), "B2:push:github:feature");
/// assert_eq!(id.scenario(), "B2");
/// assert_eq!(id.action(), "push");
/// assert_eq!(id.key(), Some("github:feature"));
///
/// let parsed: FixId = "S2:push:core".parse().unwrap();
/// assert_eq!(parsed.key(), Some("core"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FixId(String);

impl FixId {
    pub fn new(scenario: impl std::fmt::Display, action: &str) -> Self {
        Self(format!("{scenario}:{action}"))
    }

    pub fn with_key(scenario: impl std::fmt::Display, action: &str, key: &str) -> Self {
        Self(format!("{scenario}:{action}:{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn scenario(&self) -> &str {
        self.0.split(':').next().unwrap_or_default()
    }

    pub fn action(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }

    pub fn key(&self) -> Option<&str> {
        self.0.splitn(3, ':').nth(2)
    }
}

impl FromStr for FixId {
    type Err = InvalidFixId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let scenario = parts.next().unwrap_or_default();
        let action = parts.next().unwrap_or_default();
        let key_ok = parts.next().map_or(true, |k| !k.is_empty());
        if scenario.is_empty() || action.is_empty() || !key_ok {
            return Err(InvalidFixId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl std::fmt::Display for FixId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A suggested remediation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fix {
    pub id: FixId,
    pub scenario: ScenarioId,
    pub description: String,
    pub auto_fixable: bool,
    /// Why the fix cannot be applied automatically.
    pub blocked_by: Option<String>,
    pub priority: u8,
    pub operation: Option<Operation>,
}

impl Fix {
    /// A fix that may be applied automatically.
    pub fn automatic(
        id: FixId,
        scenario: ScenarioId,
        priority: u8,
        description: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            id,
            scenario,
            description: description.into(),
            auto_fixable: true,
            blocked_by: None,
            priority,
            operation: Some(operation),
        }
    }

    /// A fix that needs the user.
    pub fn manual(
        id: FixId,
        scenario: ScenarioId,
        priority: u8,
        description: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id,
            scenario,
            description: description.into(),
            auto_fixable: false,
            blocked_by: Some(reason.into()),
            priority,
            operation: None,
        }
    }

    /// Attach an operation the user may run explicitly.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = Some(operation);
        self
    }

    /// Withdraw auto-fixability. The first reason given is kept.
    pub fn blocked(mut self, reason: impl Into<String>) -> Self {
        self.auto_fixable = false;
        if self.blocked_by.is_none() {
            self.blocked_by = Some(reason.into());
        }
        self
    }
}
