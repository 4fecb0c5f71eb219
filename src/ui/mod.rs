//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing and text formatting of states,
//!   fixes and reports
//!
//! # Design
//!
//! All human-readable output goes through this module. Diagnostics meant
//! for developers go through `tracing` instead.

pub mod output;
