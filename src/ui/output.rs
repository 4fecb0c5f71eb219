//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.

use std::fmt::Display;
use std::fmt::Write as _;

use crate::doctor::{AutoFixReport, Fix};
use crate::engine::state::{RemoteStatus, RepositoryState, SyncPair};
use crate::git::BlobLocation;

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a success message (respects quiet mode).
pub fn success(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

fn remote_line(remote: &RemoteStatus) -> String {
    let status = match (remote.configured, remote.reachable) {
        (false, _) => "not configured",
        (true, false) => "unreachable",
        (true, true) => "ok",
    };
    match &remote.url {
        Some(url) => format!("{} ({url}): {status}", remote.name),
        None => format!("{}: {status}", remote.name),
    }
}

fn pair_cell(pair: Option<SyncPair>) -> String {
    match pair {
        Some(p) if p.ahead == 0 && p.behind == 0 => p.status.to_string(),
        Some(p) => format!("{} (+{}/-{})", p.status, p.ahead, p.behind),
        None => "-".to_string(),
    }
}

/// Human-readable summary of a detected state.
pub fn format_state(state: &RepositoryState) -> String {
    let mut out = String::new();
    let existence = &state.existence;
    let _ = writeln!(out, "Repository: {}", state.repo_path.display());
    let _ = writeln!(out, "Existence:  {} - {}", existence.id(), existence.id().describe());
    let _ = writeln!(out, "  {}", remote_line(&existence.core));
    let _ = writeln!(out, "  {}", remote_line(&existence.github));

    if !existence.local_exists {
        return out;
    }

    if let Some(wt) = &state.working_tree {
        let _ = write!(out, "Working tree: {} - {}", wt.id(), wt.id().describe());
        if wt.detached_head {
            out.push_str(" [detached HEAD]");
        }
        if wt.shallow {
            out.push_str(" [shallow]");
        }
        out.push('\n');
    }

    if let Some(corruption) = &state.corruption {
        if corruption.skipped {
            let _ = writeln!(out, "Large blobs: not scanned");
        } else {
            let _ = writeln!(
                out,
                "Large blobs: {} - {} found",
                corruption.id(),
                corruption.large_blobs.len()
            );
            for blob in &corruption.large_blobs {
                let _ = writeln!(out, "  {} {:.1} MiB", blob.sha.short(12), blob.size_mb());
            }
        }
    }

    match (&state.sync, &state.default_branch) {
        (Some(sync), _) => {
            let _ = writeln!(
                out,
                "Sync '{}': {} - {}",
                sync.branch,
                sync.id(),
                sync.id().describe()
            );
            let _ = writeln!(out, "  local/core:   {}", pair_cell(sync.pairs.local_core));
            let _ = writeln!(out, "  local/github: {}", pair_cell(sync.pairs.local_github));
            let _ = writeln!(out, "  core/github:  {}", pair_cell(sync.pairs.core_github));
        }
        (None, Some(branch)) => {
            let _ = writeln!(out, "Sync '{branch}': not comparable");
        }
        (None, None) => {}
    }

    let untracked: Vec<_> = state.branches.iter().filter(|b| b.location_count() < 3).collect();
    if !untracked.is_empty() {
        let _ = writeln!(out, "Branches:");
        for branch in untracked {
            let _ = writeln!(out, "  {} {} - {}", branch.id(), branch.name, branch.id().describe());
        }
    }

    if !state.data_is_fresh {
        if state.stale_remotes.is_empty() {
            let _ = writeln!(out, "Remote data: not refreshed");
        } else {
            let _ = writeln!(out, "Remote data: stale ({})", state.stale_remotes.join(", "));
        }
    }
    out
}

/// Fix list, one block per fix.
pub fn format_fixes(fixes: &[Fix]) -> String {
    if fixes.is_empty() {
        return "No fixes suggested.".to_string();
    }

    let mut out = String::from("Suggested fixes:\n");
    for fix in fixes {
        let mode = if fix.auto_fixable { "auto" } else { "manual" };
        let _ = writeln!(out, "  [{}] {} ({mode})", fix.priority, fix.id);
        let _ = writeln!(out, "      {}", fix.description);
        if let Some(reason) = &fix.blocked_by {
            let _ = writeln!(out, "      blocked: {reason}");
        }
    }
    if fixes.iter().any(|f| f.auto_fixable) {
        out.push_str("\nRun 'trisync fix' to apply the auto fixes, or 'trisync fix --fix <fix-id>' for one.");
    }
    out
}

/// Summary of an auto-fix run.
pub fn format_report(report: &AutoFixReport) -> String {
    let mut out = String::new();
    for id in &report.applied {
        let _ = writeln!(out, "applied  {id}");
    }
    for id in &report.skipped {
        let _ = writeln!(out, "skipped  {id} (nothing to do)");
    }
    for failure in &report.errors {
        let _ = writeln!(out, "failed   {}: {}", failure.fix_id, failure.message);
    }
    if report.applied.is_empty() && report.errors.is_empty() && report.skipped.is_empty() {
        out.push_str("No fixes applied.\n");
    }
    let status = if report.converged { "converged" } else { "not converged" };
    let _ = write!(out, "Result: {status}");
    if let Some(sync) = &report.final_state.sync {
        let _ = write!(out, ", sync {}", sync.id());
    }
    out
}

/// Paths and commits holding a blob.
pub fn format_blob_location(location: &BlobLocation) -> String {
    let mut out = format!("Blob {}\n", location.oid);
    if location.paths.is_empty() && location.commits.is_empty() {
        out.push_str("  not found in any reachable commit");
        return out;
    }
    out.push_str("  paths:\n");
    for path in &location.paths {
        let _ = writeln!(out, "    {path}");
    }
    out.push_str("  commits:\n");
    for commit in &location.commits {
        let _ = writeln!(out, "    {}", commit.short(12));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doctor::suggest_fixes;
    use crate::engine::state::ExistenceState;
    use std::path::PathBuf;

    fn remote(name: &str, configured: bool) -> RemoteStatus {
        RemoteStatus {
            name: name.into(),
            url: configured.then(|| format!("/srv/{name}.git")),
            configured,
            reachable: configured,
        }
    }

    mod verbosity {
        use super::*;

        #[test]
        fn from_flags() {
            assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
            assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
            assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        }
    }

    mod formatting {
        use super::*;

        #[test]
        fn absent_state() {
            let state = RepositoryState::local_absent(
                PathBuf::from("/gone"),
                ExistenceState::new(false, remote("core", true), remote("github", false)),
            );
            let text = format_state(&state);
            assert!(text.contains("E6"));
            assert!(text.contains("core (/srv/core.git): ok"));
            assert!(text.contains("github: not configured"));
            assert!(!text.contains("Working tree"));

            let fixes = format_fixes(&suggest_fixes(&state));
            assert!(fixes.contains("E6:clone (manual)"));
            assert!(!fixes.contains("trisync fix"));
        }

        #[test]
        fn no_fixes() {
            assert_eq!(format_fixes(&[]), "No fixes suggested.");
        }

        #[test]
        fn pair_cells() {
            assert_eq!(pair_cell(None), "-");
            assert_eq!(pair_cell(SyncPair::new(true, 0, 0)), "synced");
            assert_eq!(pair_cell(SyncPair::new(false, 3, 0)), "ahead (+3/-0)");
        }
    }
}
