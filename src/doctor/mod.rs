//! doctor
//!
//! Fix suggestion and application.
//!
//! # Architecture
//!
//! The doctor turns a [`RepositoryState`] into prioritized [`Fix`]es and
//! applies the auto-fixable ones. It shares the detector and executor with
//! the rest of the engine; there is no separate repair path.
//!
//! # Design Principles
//!
//! - Never guess repairs silently
//! - Anything that could discard commits is manual
//! - Each applied fix is validated against a fresh detection
//! - Fix IDs are stable so callers can select or skip them
//!
//! # Example
//!
//! ```ignore
//! use trisync::doctor::{auto_fix, suggest_fixes, AutoFixOptions};
//!
//! let state = detector.detect().await?;
//! for fix in suggest_fixes(&state) {
//!     println!("{} {}", fix.id, fix.description);
//! }
//!
//! let report = auto_fix(&detector, &state, &AutoFixOptions::default()).await?;
//! assert!(report.converged);
//! ```

mod autofix;
mod fixes;
mod generators;

pub use autofix::{
    auto_fix, select_fixes, AutoFixError, AutoFixOptions, AutoFixReport, FixFailure,
};
pub use fixes::{priority, Fix, FixId, InvalidFixId, ScenarioId};
pub use generators::suggest_fixes;

use serde::Serialize;

use crate::core::types::Fingerprint;
use crate::engine::state::RepositoryState;

/// A detected state together with its fingerprint and suggested fixes.
#[derive(Debug, Serialize)]
pub struct Diagnosis {
    pub fingerprint: Fingerprint,
    pub state: RepositoryState,
    pub fixes: Vec<Fix>,
}

impl Diagnosis {
    pub fn new(state: RepositoryState) -> Result<Self, serde_json::Error> {
        let fingerprint = state.fingerprint()?;
        let fixes = suggest_fixes(&state);
        Ok(Self {
            fingerprint,
            state,
            fixes,
        })
    }

    /// Fixes that `fix` would apply.
    pub fn auto_fixable(&self) -> impl Iterator<Item = &Fix> {
        self.fixes
            .iter()
            .filter(|f| f.auto_fixable && f.operation.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{ExistenceState, RemoteStatus};
    use std::path::PathBuf;

    #[test]
    fn diagnosis_of_absent_repository() {
        let remote = |name: &str| RemoteStatus {
            name: name.into(),
            url: None,
            configured: false,
            reachable: false,
        };
        let state = RepositoryState::local_absent(
            PathBuf::from("/gone"),
            ExistenceState::new(false, remote("core"), remote("github")),
        );
        let diagnosis = Diagnosis::new(state.clone()).unwrap();
        assert_eq!(diagnosis.fingerprint, state.fingerprint().unwrap());
        assert_eq!(diagnosis.fixes.len(), 1);
        assert_eq!(diagnosis.auto_fixable().count(), 0);

        let json = serde_json::to_value(&diagnosis).unwrap();
        assert_eq!(json["fixes"][0]["id"], "E8:clone");
    }
}
