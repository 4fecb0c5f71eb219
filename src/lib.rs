//! trisync - classify and safely reconcile a repository mirrored in three places
//!
//! A repository lives as a local working copy, a `core` remote and a
//! `github` mirror. trisync inspects all three, classifies the situation
//! into a fixed set of scenario IDs, and suggests typed fixes. Only fixes
//! that cannot discard commits are applied automatically.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to doctor)
//! - [`doctor`] - Fix suggestion and auto-fix
//! - [`engine`] - Detection, classification tables and the operation model
//! - [`git`] - Single interface for all git subprocesses
//! - [`core`] - Domain types, configuration and the repository lock
//! - [`ui`] - User-facing output
//!
//! # Correctness Invariants
//!
//! trisync maintains the following invariants:
//!
//! 1. Operations execute only after validation against a fresh detection
//! 2. No automatic fix can discard a commit
//! 3. Every git subprocess is serialized per repository and has a deadline
//! 4. Scenario IDs are derived from lookup tables, never assigned
//!
//! # Example
//!
//! ```ignore
//! use trisync::doctor::suggest_fixes;
//! use trisync::engine::{detect, DetectOptions, Remotes};
//!
//! let state = detect(path, &Remotes::default(), &DetectOptions::default()).await?;
//! for fix in suggest_fixes(&state) {
//!     println!("{} {}", fix.id, fix.description);
//! }
//! ```

pub mod cli;
pub mod core;
pub mod doctor;
pub mod engine;
pub mod git;
pub mod ui;
