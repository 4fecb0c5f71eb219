//! cli::commands
//!
//! Command handlers.
//!
//! Each handler builds what it needs from the merged configuration, runs
//! the async engine on a tokio runtime and prints through
//! [`crate::ui::output`].

mod fix;
mod locate;
mod status;

use std::time::Duration;

use anyhow::{bail, Context as _, Result};

use super::args::{Command, DetectArgs};
use super::Context;
use crate::core::config::schema::TimeoutsConfig;
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::engine::{DetectOptions, Detector, RemoteSpec, Remotes};
use crate::git::{GitProbe, ProbeTimeouts, RepoPresence};

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Status { json, detect } => status::status(ctx, json, &detect),
        Command::Fix {
            fix_id,
            skip,
            dry_run,
            stop_on_error,
            detect,
        } => fix::fix(ctx, fix_id.as_deref(), &skip, dry_run, stop_on_error, &detect),
        Command::Locate { sha, json } => locate::locate(ctx, &sha, json),
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to start the async runtime")
}

/// Load configuration, reading the repo file from the discovered git dir.
fn load_config(ctx: &Context) -> Result<Config> {
    let repo = ctx.repo_path()?;
    let git_dir = match GitProbe::new(&repo, ProbeTimeouts::default()).open_repository() {
        Ok(RepoPresence::WorkTree { git_dir, .. }) => Some(git_dir),
        _ => None,
    };
    Config::load(git_dir.as_deref()).context("failed to load configuration")
}

/// Probe deadlines with configured overrides applied.
fn probe_timeouts(overrides: &TimeoutsConfig) -> ProbeTimeouts {
    let defaults = ProbeTimeouts::default();
    let pick = |ms: Option<u64>, default: Duration| ms.map_or(default, Duration::from_millis);
    ProbeTimeouts {
        local: pick(overrides.local_ms, defaults.local),
        reachability: pick(overrides.reachability_ms, defaults.reachability),
        network: pick(overrides.network_ms, defaults.network),
        scan: pick(overrides.scan_ms, defaults.scan),
    }
}

/// Build a detector from configuration, with flags taking precedence.
fn detector(ctx: &Context, args: &DetectArgs) -> Result<Detector> {
    let repo = ctx.repo_path()?;
    let config = load_config(ctx)?;

    let core = args.core.as_deref().unwrap_or(config.core_remote());
    let github = args.github.as_deref().unwrap_or(config.github_remote());
    if core.is_empty() || github.is_empty() {
        bail!("remote names must not be empty");
    }
    if core == github {
        bail!("core and github remotes must differ (both are '{core}')");
    }

    let default_branch = args
        .branch
        .as_deref()
        .or(config.default_branch())
        .map(|name| BranchName::new(name))
        .transpose()
        .context("invalid default branch")?;

    let options = DetectOptions {
        fetch_before_check: !args.no_fetch && config.fetch_before_check(),
        skip_corruption: args.skip_corruption || config.skip_corruption(),
        default_branch,
        large_blob_threshold: config.large_blob_threshold_bytes(),
        timeouts: probe_timeouts(&config.timeouts()),
    };
    let remotes = Remotes {
        core: RemoteSpec::named(core),
        github: RemoteSpec::named(github),
    };
    tracing::debug!(?remotes, ?options, "detector configured");
    Ok(Detector::new(repo, remotes, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx(dir: &TempDir) -> Context {
        Context {
            cwd: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn timeouts_fall_back_to_defaults() {
        let overrides = TimeoutsConfig {
            network_ms: Some(1500),
            ..Default::default()
        };
        let timeouts = probe_timeouts(&overrides);
        assert_eq!(timeouts.network, Duration::from_millis(1500));
        assert_eq!(timeouts.local, ProbeTimeouts::default().local);
    }

    #[test]
    fn flags_override_config() {
        let dir = TempDir::new().unwrap();
        let args = DetectArgs {
            no_fetch: true,
            core: Some("origin".into()),
            branch: Some("trunk".into()),
            ..Default::default()
        };
        let detector = detector(&ctx(&dir), &args).unwrap();
        assert_eq!(detector.remotes().core.name, "origin");
        assert_eq!(detector.remotes().github.name, "github");
        assert!(!detector.options().fetch_before_check);
        assert_eq!(
            detector.options().default_branch.as_ref().map(|b| b.as_str()),
            Some("trunk")
        );
    }

    #[test]
    fn identical_remotes_are_rejected() {
        let dir = TempDir::new().unwrap();
        let args = DetectArgs {
            core: Some("same".into()),
            github: Some("same".into()),
            ..Default::default()
        };
        assert!(detector(&ctx(&dir), &args).is_err());
    }

    #[test]
    fn invalid_branch_is_rejected() {
        let dir = TempDir::new().unwrap();
        let args = DetectArgs {
            branch: Some("bad..name".into()),
            ..Default::default()
        };
        assert!(detector(&ctx(&dir), &args).is_err());
    }
}
