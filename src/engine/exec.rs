//! engine::exec
//!
//! The single executor for remediation operations.
//!
//! # Executor Contract
//!
//! For each operation the executor:
//! 1. Validates it against the supplied (freshly detected) state
//! 2. Executes it only if validation passed
//! 3. On failure, attempts rollback only when the operation declares it safe
//! 4. Records every phase transition
//!
//! The caller is responsible for holding the repository lock.
//!
//! # Example
//!
//! ```ignore
//! let executor = Executor::new(detector.probe());
//! let record = executor.run(op, &fresh_state).await;
//! if record.succeeded() {
//!     println!("{}", record.operation);
//! }
//! ```

use super::operation::{
    ExecuteError, Operation, OperationPhase, RollbackError, ValidationError,
};
use super::state::RepositoryState;
use crate::git::GitProbe;

/// How a single operation ended.
#[derive(Debug)]
pub enum ExecuteResult {
    /// Validated and executed successfully.
    Succeeded,

    /// Rejected before anything ran.
    ValidationFailed(ValidationError),

    /// Execution failed.
    Failed {
        error: ExecuteError,
        /// `None` when rollback was not attempted.
        rollback: Option<Result<(), RollbackError>>,
    },
}

/// Lifecycle of one operation through the executor.
#[derive(Debug)]
pub struct OperationRecord {
    pub operation: Operation,
    pub phases: Vec<OperationPhase>,
    pub result: ExecuteResult,
}

impl OperationRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.result, ExecuteResult::Succeeded)
    }

    /// The last phase reached.
    pub fn final_phase(&self) -> OperationPhase {
        self.phases
            .last()
            .copied()
            .unwrap_or(OperationPhase::Proposed)
    }

    /// Human-readable error, if any.
    pub fn error_message(&self) -> Option<String> {
        match &self.result {
            ExecuteResult::Succeeded => None,
            ExecuteResult::ValidationFailed(e) => Some(format!("validation failed: {e}")),
            ExecuteResult::Failed { error, rollback } => {
                let mut message = format!("execution failed: {error}");
                if let Some(Err(e)) = rollback {
                    message.push_str(&format!(" ({e})"));
                }
                Some(message)
            }
        }
    }
}

/// Runs operations through validation and execution.
#[derive(Debug, Clone, Copy)]
pub struct Executor<'a> {
    probe: &'a GitProbe,
}

impl<'a> Executor<'a> {
    pub fn new(probe: &'a GitProbe) -> Self {
        Self { probe }
    }

    /// Validate `op` against `state` and run it if it passes.
    pub async fn run(&self, op: Operation, state: &RepositoryState) -> OperationRecord {
        let mut phases = vec![OperationPhase::Proposed];
        let described = op.describe();

        let validated = match op.clone().propose().validate(state, self.probe).await {
            Ok(validated) => validated,
            Err(e) => {
                phases.push(OperationPhase::ValidationFailed);
                return OperationRecord {
                    operation: op,
                    phases,
                    result: ExecuteResult::ValidationFailed(e),
                };
            }
        };
        phases.push(OperationPhase::Validated);

        tracing::info!(op = %described, "executing");
        let outcome = validated.execute(self.probe).await;
        phases.push(OperationPhase::Executed);

        let result = match outcome {
            Ok(()) => {
                phases.push(OperationPhase::Succeeded);
                tracing::info!(op = %described, "succeeded");
                ExecuteResult::Succeeded
            }
            Err(error) => {
                phases.push(OperationPhase::Failed);
                tracing::warn!(op = %described, error = %error, "failed");

                let rollback = if op.rollback_safe() {
                    let result = validated.rollback(self.probe).await;
                    if result.is_ok() {
                        phases.push(OperationPhase::RolledBack);
                    }
                    Some(result)
                } else {
                    None
                };
                ExecuteResult::Failed { error, rollback }
            }
        };

        OperationRecord {
            operation: op,
            phases,
            result,
        }
    }
}
