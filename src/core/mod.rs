//! core
//!
//! Core domain types, configuration and locking.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RefName, Location, Fingerprint
//! - [`config`] - Configuration schema and loading
//! - [`lock`] - Exclusive repository lock for fix execution

pub mod config;
pub mod lock;
pub mod types;
