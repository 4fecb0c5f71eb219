//! doctor::autofix
//!
//! Applies auto-fixable fixes one at a time under the repository lock.
//!
//! # Flow
//!
//! 1. Select auto-fixable fixes from the caller's state, honouring
//!    `fix_id` and `skip_ids`
//! 2. Acquire the [`RepoLock`]
//! 3. For each selected fix, detect afresh and run its operation through
//!    the [`Executor`], which validates against that fresh state
//! 4. Detect once more and check that no applied fix is still suggested

use serde::Serialize;
use thiserror::Error;

use super::fixes::{Fix, FixId, ScenarioId};
use super::generators::suggest_fixes;
use crate::core::lock::{LockError, RepoLock};
use crate::engine::detect::{DetectError, Detector};
use crate::engine::exec::{ExecuteResult, Executor};
use crate::engine::operation::OperationPhase;
use crate::engine::state::RepositoryState;
use crate::git::GitError;

/// Errors that abort an auto-fix run.
#[derive(Debug, Error)]
pub enum AutoFixError {
    #[error("fix not found: {0}")]
    FixNotFound(String),

    #[error("fix {id} cannot be applied automatically: {reason}")]
    NotAutoFixable { id: String, reason: String },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error("detection failed: {0}")]
    Detect(#[from] DetectError),

    #[error("cannot locate the git directory: {0}")]
    Git(#[from] GitError),
}

/// Which fixes to apply.
#[derive(Debug, Clone, Default)]
pub struct AutoFixOptions {
    /// Apply only this fix.
    pub fix_id: Option<FixId>,
    pub skip_ids: Vec<FixId>,
    pub stop_on_error: bool,
}

/// A fix that did not apply.
#[derive(Debug, Clone, Serialize)]
pub struct FixFailure {
    pub fix_id: FixId,
    pub phase: OperationPhase,
    pub message: String,
}

/// Outcome of an auto-fix run.
#[derive(Debug, Serialize)]
pub struct AutoFixReport {
    pub applied: Vec<FixId>,
    /// Fixes whose validation found nothing left to do.
    pub skipped: Vec<FixId>,
    pub errors: Vec<FixFailure>,
    pub final_state: RepositoryState,
    /// No applied fix is suggested again for the final state.
    pub converged: bool,
}

/// The fixes [`auto_fix`] would attempt for `state`, in order.
pub fn select_fixes(
    state: &RepositoryState,
    options: &AutoFixOptions,
) -> Result<Vec<Fix>, AutoFixError> {
    let fixes = suggest_fixes(state);

    let selected: Vec<Fix> = match &options.fix_id {
        Some(id) => {
            let fix = fixes
                .into_iter()
                .find(|f| &f.id == id)
                .ok_or_else(|| AutoFixError::FixNotFound(id.to_string()))?;
            if !fix.auto_fixable || fix.operation.is_none() {
                return Err(AutoFixError::NotAutoFixable {
                    id: id.to_string(),
                    reason: fix
                        .blocked_by
                        .unwrap_or_else(|| "no operation".to_string()),
                });
            }
            vec![fix]
        }
        None => fixes
            .into_iter()
            .filter(|f| f.auto_fixable && f.operation.is_some())
            .collect(),
    };

    Ok(selected
        .into_iter()
        .filter(|f| !options.skip_ids.contains(&f.id))
        .collect())
}

/// True when no applied fix is suggested again.
///
/// A detector that never fetches always reports stale data, so the
/// re-fetch fix reappears by construction and is not counted.
fn has_converged(applied: &[FixId], remaining: &[Fix], fetches: bool) -> bool {
    !remaining
        .iter()
        .filter(|f| fetches || f.scenario != ScenarioId::Stale)
        .any(|f| applied.contains(&f.id))
}

/// Apply auto-fixable fixes suggested for `state`.
pub async fn auto_fix(
    detector: &Detector,
    state: &RepositoryState,
    options: &AutoFixOptions,
) -> Result<AutoFixReport, AutoFixError> {
    let selected = select_fixes(state, options)?;
    let mut applied = Vec::new();
    let mut skipped = Vec::new();
    let mut errors = Vec::new();

    if selected.is_empty() {
        tracing::debug!("no auto-fixable fixes selected");
        let final_state = detector.detect().await?;
        return Ok(AutoFixReport {
            applied,
            skipped,
            errors,
            final_state,
            converged: true,
        });
    }

    let git_dir = detector.probe().git_dir().await?;
    let lock = RepoLock::acquire(&git_dir)?;
    let executor = Executor::new(detector.probe());

    for fix in selected {
        let Some(op) = fix.operation else {
            continue;
        };
        let fresh = detector.detect().await?;
        tracing::info!(fix = %fix.id, "applying");
        let record = executor.run(op, &fresh).await;

        match &record.result {
            ExecuteResult::Succeeded => applied.push(fix.id),
            ExecuteResult::ValidationFailed(e) if e.is_already_up_to_date() => {
                tracing::debug!(fix = %fix.id, "nothing to do");
                skipped.push(fix.id);
            }
            _ => {
                let message = record.error_message().unwrap_or_default();
                tracing::warn!(fix = %fix.id, %message, "fix failed");
                errors.push(FixFailure {
                    fix_id: fix.id,
                    phase: record.final_phase(),
                    message,
                });
                if options.stop_on_error {
                    break;
                }
            }
        }
    }

    let final_state = detector.detect().await?;
    drop(lock);

    let converged = has_converged(
        &applied,
        &suggest_fixes(&final_state),
        detector.options().fetch_before_check,
    );
    tracing::info!(
        applied = applied.len(),
        errors = errors.len(),
        converged,
        "auto-fix finished"
    );

    Ok(AutoFixReport {
        applied,
        skipped,
        errors,
        final_state,
        converged,
    })
}
