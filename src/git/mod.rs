//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **only doorway** to Git. Every read and write of the
//! repository flows through [`GitProbe`], which shells out to the `git`
//! binary with a fixed environment, a per-class deadline, and a
//! repository-scoped mutex. `git2` is used only to inspect what lives at a
//! path (missing, bare, or with a work tree).
//!
//! # Invariants
//!
//! - No two git processes run for the same probe at once
//! - Every invocation has a deadline
//! - Ref updates use compare-and-swap semantics
//! - Nothing pushes with `--force`
//! - Results are strong types (Oid, BranchName)

mod parse;
mod probe;

pub use parse::{BlobInfo, GitVersion, StatusEntries, MIN_GIT_VERSION};
pub use probe::{BlobLocation, GitError, GitProbe, OpClass, ProbeTimeouts, RepoPresence};
