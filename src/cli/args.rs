//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// trisync - keep a local repository, its core remote and its GitHub mirror in step
#[derive(Parser, Debug)]
#[command(name = "trisync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if trisync was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Flags shared by commands that run detection. Unset flags fall back to
/// configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct DetectArgs {
    /// Compare against existing remote-tracking refs without fetching
    #[arg(long)]
    pub no_fetch: bool,

    /// Skip the large-blob scan
    #[arg(long)]
    pub skip_corruption: bool,

    /// Name of the core remote
    #[arg(long = "core", value_name = "NAME")]
    pub core: Option<String>,

    /// Name of the GitHub remote
    #[arg(long = "github", value_name = "NAME")]
    pub github: Option<String>,

    /// Branch whose sync state is classified
    #[arg(long, value_name = "NAME")]
    pub branch: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify the repository and suggest fixes
    #[command(
        name = "status",
        long_about = "Classify the repository and suggest fixes.\n\n\
            Fetches both remotes, then reports which copies exist, whether the \
            working tree is clean, whether large blobs are in history, how the \
            default branch compares across the three copies, and which branches \
            are missing somewhere. Each finding comes with a fix ID.",
        after_help = "\
EXAMPLES:
    # Full check
    trisync status

    # Offline check against the last fetched state
    trisync status --no-fetch

    # Machine-readable output
    trisync status --json"
    )]
    Status {
        /// Output the state and fixes as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        detect: DetectArgs,
    },

    /// Apply auto-fixable fixes
    #[command(
        name = "fix",
        long_about = "Apply auto-fixable fixes.\n\n\
            Only fetches, fast-forward pushes and fast-forwards of the local branch \
            are applied. Each fix is validated against a fresh detection right \
            before it runs. Anything that could discard commits is left to you.",
        after_help = "\
EXAMPLES:
    # Preview what would be applied
    trisync fix --dry-run

    # Apply one fix
    trisync fix --fix S2:push:github

    # Apply everything except one fix
    trisync fix --skip S5:push:github"
    )]
    Fix {
        /// Apply only this fix
        #[arg(long = "fix", value_name = "FIX_ID")]
        fix_id: Option<String>,

        /// Skip a fix (repeatable)
        #[arg(long = "skip", value_name = "FIX_ID")]
        skip: Vec<String>,

        /// Show what would be applied without changing anything
        #[arg(long)]
        dry_run: bool,

        /// Stop at the first failed fix
        #[arg(long)]
        stop_on_error: bool,

        #[command(flatten)]
        detect: DetectArgs,
    },

    /// Find the paths and commits that hold a blob
    #[command(name = "locate")]
    Locate {
        /// Blob object ID (full hex)
        sha: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
