//! engine::operation
//!
//! Typed remediation operations and their validation.
//!
//! # Architecture
//!
//! An [`Operation`] is pure data describing a git mutation. It cannot run
//! on its own. Execution requires a [`ValidatedOperation`], and the only
//! way to obtain one is [`ProposedOperation::validate`], which checks the
//! operation against a freshly detected [`RepositoryState`] and the live
//! repository.
//!
//! ```text
//! Proposed -> Validated -> Executed -> Succeeded
//!          \-> ValidationFailed     \-> Failed -> [Rollback]
//! ```
//!
//! # Invariants
//!
//! - Nothing is pushed with `--force`; pushes use explicit refspecs
//! - A branch only ever moves forward to a descendant of its current tip
//! - Ref moves use compare-and-swap against the tip seen during validation
//! - Only `Fetch` declares rollback safe (a no-op)
//!
//! # Example
//!
//! ```ignore
//! let op = Operation::Push { remote: "core".into(), branch };
//! let validated = op.propose().validate(&state, probe).await?;
//! validated.execute(probe).await?;
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::{RemoteStatus, RepositoryState};
use crate::core::types::{BranchName, Oid, RefName};
use crate::git::{GitError, GitProbe};

/// Reflog message for fast-forward ref moves.
const FAST_FORWARD_MESSAGE: &str = "trisync: fast-forward";

/// A remediating git operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Fetch a named remote.
    Fetch { remote: String },

    /// Push `refs/heads/<branch>` to the same ref on `remote`.
    Push { remote: String, branch: BranchName },

    /// Fast-forward a local branch to `target`.
    ResetToRef { branch: BranchName, target: RefName },

    /// Several operations, validated together up front.
    Composite {
        steps: Vec<Operation>,
        stop_on_error: bool,
    },
}

/// Lifecycle phases recorded by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationPhase {
    Proposed,
    Validated,
    ValidationFailed,
    Executed,
    Succeeded,
    Failed,
    RolledBack,
}

/// Why an operation may not run.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("local repository is missing")]
    LocalMissing,

    #[error("working tree is dirty ({staged} staged, {unstaged} unstaged)")]
    DirtyTree { staged: usize, unstaged: usize },

    #[error("remote '{remote}' is not configured")]
    RemoteNotConfigured { remote: String },

    #[error("remote '{remote}' is unreachable")]
    RemoteUnreachable { remote: String },

    #[error("ref {refname} does not exist")]
    MissingRef { refname: String },

    #[error("{refname} is already at {oid}")]
    AlreadyUpToDate { refname: String, oid: String },

    #[error("{refname} at {current} is not an ancestor of {target}; moving would discard commits")]
    NotFastForward {
        refname: String,
        current: String,
        target: String,
    },

    #[error("composite operation has no steps")]
    EmptyComposite,

    #[error("step {index} of composite: {source}")]
    CompositeStep {
        index: usize,
        source: Box<ValidationError>,
    },

    #[error("validation probe failed: {0}")]
    Git(#[from] GitError),
}

impl ValidationError {
    /// True when the operation has nothing to do.
    pub fn is_already_up_to_date(&self) -> bool {
        match self {
            ValidationError::AlreadyUpToDate { .. } => true,
            ValidationError::CompositeStep { source, .. } => source.is_already_up_to_date(),
            _ => false,
        }
    }
}

/// Failure while running a validated operation.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("git error: {0}")]
    Git(#[from] GitError),

    #[error("{refname} moved since validation: expected {expected}, found {actual}")]
    StateChanged {
        refname: String,
        expected: String,
        actual: String,
    },

    #[error("{} of {total} composite steps failed: {}", .messages.len(), .messages.join("; "))]
    Composite { total: usize, messages: Vec<String> },
}

/// Rollback was not possible.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error("rollback refused for {operation}: {reason}")]
    Refused { operation: String, reason: String },
}

impl Operation {
    /// Enter the lifecycle.
    pub fn propose(self) -> ProposedOperation {
        ProposedOperation { op: self }
    }

    /// One-line human description.
    pub fn describe(&self) -> String {
        match self {
            Operation::Fetch { remote } => format!("fetch {remote}"),
            Operation::Push { remote, branch } => {
                format!("push {branch} to {remote} (fast-forward only)")
            }
            Operation::ResetToRef { branch, target } => {
                format!("fast-forward {branch} to {target}")
            }
            Operation::Composite { steps, .. } => steps
                .iter()
                .map(Operation::describe)
                .collect::<Vec<_>>()
                .join(", then "),
        }
    }

    /// Whether the operation only reads or refreshes remote-tracking refs.
    pub fn is_read_only(&self) -> bool {
        match self {
            Operation::Fetch { .. } => true,
            Operation::Push { .. } | Operation::ResetToRef { .. } => false,
            Operation::Composite { steps, .. } => steps.iter().all(Operation::is_read_only),
        }
    }

    /// Whether a best-effort rollback may be attempted after failure.
    pub fn rollback_safe(&self) -> bool {
        matches!(self, Operation::Fetch { .. })
    }

    /// Undo after a failed execution.
    ///
    /// Fetch is a no-op. Everything else is refused: a push cannot be
    /// unpublished and a moved branch is restored by the user from the
    /// reflog.
    pub async fn rollback(&self, _probe: &GitProbe) -> Result<(), RollbackError> {
        let reason = match self {
            Operation::Fetch { .. } => return Ok(()),
            Operation::Push { remote, .. } => {
                format!("commits already sent to {remote} cannot be withdrawn safely")
            }
            Operation::ResetToRef { branch, .. } => {
                format!("restore the previous tip from `git reflog {branch}` if needed")
            }
            Operation::Composite { .. } => "rollback is disabled for composites".to_string(),
        };
        Err(RollbackError::Refused {
            operation: self.describe(),
            reason,
        })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Facts gathered during validation that execution relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Resolved {
    Fetch,
    Push,
    ResetToRef {
        refname: RefName,
        old: Oid,
        new: Oid,
        checked_out: bool,
    },
    Composite(Vec<Resolved>),
}

/// An operation that has not been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedOperation {
    op: Operation,
}

impl ProposedOperation {
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Check the operation against `state` and the live repository.
    pub async fn validate(
        self,
        state: &RepositoryState,
        probe: &GitProbe,
    ) -> Result<ValidatedOperation, ValidationError> {
        let resolved = validate_op(&self.op, state, probe).await;
        match resolved {
            Ok(resolved) => {
                tracing::debug!(op = %self.op, "validated");
                Ok(ValidatedOperation {
                    op: self.op,
                    resolved,
                })
            }
            Err(e) => {
                tracing::info!(op = %self.op, error = %e, "validation failed");
                Err(e)
            }
        }
    }
}

/// An operation cleared to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedOperation {
    op: Operation,
    resolved: Resolved,
}

impl ValidatedOperation {
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Run the operation.
    pub async fn execute(&self, probe: &GitProbe) -> Result<(), ExecuteError> {
        execute_op(&self.op, &self.resolved, probe).await
    }

    pub async fn rollback(&self, probe: &GitProbe) -> Result<(), RollbackError> {
        self.op.rollback(probe).await
    }
}

// =============================================================================
// Validation
// =============================================================================

fn remote_status<'a>(state: &'a RepositoryState, remote: &str) -> Option<&'a RemoteStatus> {
    [&state.existence.core, &state.existence.github]
        .into_iter()
        .find(|r| r.name == remote)
}

fn require_remote(state: &RepositoryState, remote: &str) -> Result<(), ValidationError> {
    match remote_status(state, remote) {
        Some(r) if r.exists() => Ok(()),
        Some(r) if r.configured => Err(ValidationError::RemoteUnreachable {
            remote: remote.to_string(),
        }),
        _ => Err(ValidationError::RemoteNotConfigured {
            remote: remote.to_string(),
        }),
    }
}

fn require_clean(state: &RepositoryState) -> Result<(), ValidationError> {
    let tree = state
        .working_tree
        .as_ref()
        .ok_or(ValidationError::LocalMissing)?;
    if tree.clean {
        Ok(())
    } else {
        Err(ValidationError::DirtyTree {
            staged: tree.staged.len(),
            unstaged: tree.unstaged.len(),
        })
    }
}

async fn require_tip(probe: &GitProbe, refname: &RefName) -> Result<Oid, ValidationError> {
    probe
        .resolve_tip(refname)
        .await?
        .ok_or_else(|| ValidationError::MissingRef {
            refname: refname.to_string(),
        })
}

async fn validate_op(
    op: &Operation,
    state: &RepositoryState,
    probe: &GitProbe,
) -> Result<Resolved, ValidationError> {
    if !state.existence.local_exists {
        return Err(ValidationError::LocalMissing);
    }

    match op {
        Operation::Fetch { remote } => {
            require_remote(state, remote)?;
            Ok(Resolved::Fetch)
        }

        Operation::Push { remote, branch } => {
            require_remote(state, remote)?;
            require_clean(state)?;
            let local_ref = RefName::for_branch(branch);
            let local = require_tip(probe, &local_ref).await?;

            let tracking_ref = RefName::for_remote_branch(remote, branch);
            if let Some(tracking) = probe.resolve_tip(&tracking_ref).await? {
                if tracking == local {
                    return Err(ValidationError::AlreadyUpToDate {
                        refname: tracking_ref.to_string(),
                        oid: local.to_string(),
                    });
                }
                if !probe.is_ancestor(&tracking, &local).await? {
                    return Err(ValidationError::NotFastForward {
                        refname: tracking_ref.to_string(),
                        current: tracking.to_string(),
                        target: local.to_string(),
                    });
                }
            }
            Ok(Resolved::Push)
        }

        Operation::ResetToRef { branch, target } => {
            require_clean(state)?;
            let new = require_tip(probe, target).await?;
            let refname = RefName::for_branch(branch);
            let old = require_tip(probe, &refname).await?;

            if old == new {
                return Err(ValidationError::AlreadyUpToDate {
                    refname: refname.to_string(),
                    oid: old.to_string(),
                });
            }
            if !probe.is_ancestor(&old, &new).await? {
                return Err(ValidationError::NotFastForward {
                    refname: refname.to_string(),
                    current: old.to_string(),
                    target: new.to_string(),
                });
            }

            let checked_out = probe.current_branch().await?.as_ref() == Some(branch);
            Ok(Resolved::ResetToRef {
                refname,
                old,
                new,
                checked_out,
            })
        }

        Operation::Composite { steps, .. } => {
            if steps.is_empty() {
                return Err(ValidationError::EmptyComposite);
            }
            let mut resolved = Vec::with_capacity(steps.len());
            for (index, step) in steps.iter().enumerate() {
                let step = Box::pin(validate_op(step, state, probe))
                    .await
                    .map_err(|source| ValidationError::CompositeStep {
                        index,
                        source: Box::new(source),
                    })?;
                resolved.push(step);
            }
            Ok(Resolved::Composite(resolved))
        }
    }
}

// =============================================================================
// Execution
// =============================================================================

async fn execute_op(
    op: &Operation,
    resolved: &Resolved,
    probe: &GitProbe,
) -> Result<(), ExecuteError> {
    match (op, resolved) {
        (Operation::Fetch { remote }, Resolved::Fetch) => Ok(probe.fetch(remote).await?),

        (Operation::Push { remote, branch }, Resolved::Push) => {
            Ok(probe.push(remote, branch).await?)
        }

        (
            Operation::ResetToRef { .. },
            Resolved::ResetToRef {
                refname,
                old,
                new,
                checked_out,
            },
        ) => {
            if *checked_out {
                let current = probe.resolve_tip(refname).await?;
                if current.as_ref() != Some(old) {
                    return Err(ExecuteError::StateChanged {
                        refname: refname.to_string(),
                        expected: old.to_string(),
                        actual: current.map(String::from).unwrap_or_default(),
                    });
                }
                probe.reset_keep(new).await?;
            } else {
                probe
                    .update_ref_cas(refname, new, old, FAST_FORWARD_MESSAGE)
                    .await?;
            }
            Ok(())
        }

        (
            Operation::Composite {
                steps,
                stop_on_error,
            },
            Resolved::Composite(resolved_steps),
        ) => {
            let mut messages = Vec::new();
            for (index, (step, resolved)) in steps.iter().zip(resolved_steps).enumerate() {
                if let Err(e) = Box::pin(execute_op(step, resolved, probe)).await {
                    tracing::warn!(index, step = %step, error = %e, "composite step failed");
                    messages.push(format!("{step}: {e}"));
                    if *stop_on_error {
                        break;
                    }
                }
            }
            if messages.is_empty() {
                Ok(())
            } else {
                Err(ExecuteError::Composite {
                    total: steps.len(),
                    messages,
                })
            }
        }

        // Resolved facts are built from the same operation in validate_op.
        _ => Err(ExecuteError::StateChanged {
            refname: op.describe(),
            expected: "validated operation".to_string(),
            actual: "mismatched validation record".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(name: &str) -> BranchName {
        BranchName::new(name).unwrap()
    }

    #[test]
    fn read_only_classification() {
        let fetch = Operation::Fetch {
            remote: "core".into(),
        };
        let push = Operation::Push {
            remote: "core".into(),
            branch: branch("main"),
        };
        assert!(fetch.is_read_only());
        assert!(!push.is_read_only());

        let fetches = Operation::Composite {
            steps: vec![fetch.clone(), fetch.clone()],
            stop_on_error: false,
        };
        assert!(fetches.is_read_only());

        let mixed = Operation::Composite {
            steps: vec![fetch, push],
            stop_on_error: true,
        };
        assert!(!mixed.is_read_only());
    }

    #[test]
    fn only_fetch_is_rollback_safe() {
        assert!(Operation::Fetch {
            remote: "github".into()
        }
        .rollback_safe());
        assert!(!Operation::ResetToRef {
            branch: branch("main"),
            target: RefName::for_remote_branch("core", &branch("main")),
        }
        .rollback_safe());
    }

    #[test]
    fn describe_composite() {
        let op = Operation::Composite {
            steps: vec![
                Operation::Fetch {
                    remote: "core".into(),
                },
                Operation::Fetch {
                    remote: "github".into(),
                },
            ],
            stop_on_error: false,
        };
        assert_eq!(op.describe(), "fetch core, then fetch github");
    }

    #[test]
    fn serializes_tagged() {
        let op = Operation::Push {
            remote: "core".into(),
            branch: branch("main"),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "push");
        assert_eq!(json["branch"], "main");
    }

    #[test]
    fn already_up_to_date_through_composite() {
        let err = ValidationError::CompositeStep {
            index: 1,
            source: Box::new(ValidationError::AlreadyUpToDate {
                refname: "refs/heads/main".into(),
                oid: "a".repeat(40),
            }),
        };
        assert!(err.is_already_up_to_date());
        assert!(!ValidationError::EmptyComposite.is_already_up_to_date());
    }

    #[tokio::test]
    async fn rollback_refusals() {
        let probe = GitProbe::new("/nonexistent", crate::git::ProbeTimeouts::default());
        let fetch = Operation::Fetch {
            remote: "core".into(),
        };
        assert!(fetch.rollback(&probe).await.is_ok());

        let push = Operation::Push {
            remote: "core".into(),
            branch: branch("main"),
        };
        assert!(matches!(
            push.rollback(&probe).await,
            Err(RollbackError::Refused { .. })
        ));
    }
}
