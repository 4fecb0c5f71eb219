//! cli
//!
//! Command-line interface layer for trisync.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Merge configuration with flags
//! - Delegate to command handlers
//! - Does NOT perform repository mutations directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and hands a
//! [`crate::engine::Detector`] to the doctor. All repository changes flow
//! through the engine's validated operations.

pub mod args;
pub mod commands;

pub use args::Cli;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::ui::output::Verbosity;

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub cwd: Option<PathBuf>,
    pub debug: bool,
    pub quiet: bool,
}

impl Context {
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.quiet, self.debug)
    }

    /// The repository path: `--cwd` if given, else the process directory.
    pub fn repo_path(&self) -> Result<PathBuf> {
        match &self.cwd {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("cannot determine the current directory"),
        }
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        cwd: cli.cwd.clone(),
        debug: cli.debug,
        quiet: cli.quiet,
    };
    commands::dispatch(cli.command, &ctx)
}
