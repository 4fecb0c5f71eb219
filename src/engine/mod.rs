//! engine
//!
//! State classification and safe-operation engine.
//!
//! # Architecture
//!
//! ```text
//! detect -> RepositoryState -> suggest_fixes -> Operation
//!                                                  |
//!                         ProposedOperation::validate (fresh state)
//!                                                  |
//!                               ValidatedOperation::execute
//! ```
//!
//! - [`tables`] - Const lookup tables from raw tuples to scenario IDs
//! - [`state`] - The detection snapshot and its sub-states
//! - [`detect`] - Probing in dependency order and classification
//! - [`operation`] - Typed operations, validation and the phase model
//! - [`exec`] - Runs operations through validation and execution
//!
//! # Invariants
//!
//! - Scenario IDs are derived by constructors, never assigned
//! - Each detection is independent; nothing is cached across calls
//! - Only validated operations execute

pub mod detect;
pub mod exec;
pub mod operation;
pub mod state;
pub mod tables;

pub use detect::{detect, DetectError, DetectOptions, Detector, RemoteSpec, Remotes};
pub use exec::{ExecuteResult, Executor, OperationRecord};
pub use operation::{
    ExecuteError, Operation, OperationPhase, ProposedOperation, RollbackError,
    ValidatedOperation, ValidationError,
};
pub use state::{
    BranchState, BranchSyncState, BranchTips, CorruptionState, ExistenceState, LargeBinary,
    RemoteStatus, RepositoryState, SyncPair, SyncPairs, WorkingTreeState,
};
pub use tables::{
    BranchId, CorruptionId, ExistenceId, SyncId, SyncKey, SyncStatus, WorkingTreeId,
};
