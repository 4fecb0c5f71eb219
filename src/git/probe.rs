//! git::probe
//!
//! Serialized, timeout-bounded access to the `git` binary.
//!
//! # Architecture
//!
//! [`GitProbe`] is the single doorway to one repository on disk. Every
//! subprocess it spawns is queued behind a per-probe `tokio::sync::Mutex`,
//! so two git processes never run against the same repository at once.
//! Pipelines (the large-blob scan, blob location) hold the lock across all
//! of their stages and run the stages one after another.
//!
//! # Environment
//!
//! Each invocation runs with a fixed environment so that output is
//! parseable and nothing blocks on a prompt:
//!
//! - `GIT_TERMINAL_PROMPT=0`, `GCM_INTERACTIVE=never`
//! - `LC_ALL=C`, `LANG=C`
//! - `GIT_OPTIONAL_LOCKS=0`
//! - `GIT_SSH_COMMAND="ssh -o BatchMode=yes"` unless the caller set one
//!
//! # Deadlines
//!
//! Every call belongs to an [`OpClass`] with its own deadline. An expired
//! deadline drops the child, which kills it, and yields
//! [`GitError::Timeout`].
//!
//! # Example
//!
//! ```ignore
//! use trisync::git::{GitProbe, ProbeTimeouts};
//!
//! let probe = GitProbe::new("/path/to/repo", ProbeTimeouts::default());
//! probe.ensure_supported_version().await?;
//! let tip = probe.resolve_tip(&RefName::for_branch(&main)).await?;
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;

use super::parse::{self, BlobInfo, GitVersion, StatusEntries, MIN_GIT_VERSION};
use crate::core::types::{BranchName, Oid, RefName, TypeError};

/// Errors from git invocations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The git binary could not be started.
    #[error("failed to run `git {command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    /// git exited with a non-zero status.
    #[error("`git {command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The deadline for this operation class expired.
    #[error("`git {command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The installed git is older than required.
    #[error("git {found} is too old; {required} or newer is required")]
    VersionTooOld {
        found: GitVersion,
        required: GitVersion,
    },

    /// Compare-and-swap precondition failed.
    #[error("CAS failed for {refname}: expected {expected}")]
    CasFailed { refname: String, expected: String },

    /// Output could not be parsed.
    #[error("unexpected git output: {message}")]
    Parse { message: String },

    /// Invalid value in git output.
    #[error(transparent)]
    InvalidValue(#[from] TypeError),

    /// libgit2 error while opening the repository.
    #[error("repository access error: {message}")]
    AccessError { message: String },
}

impl GitError {
    /// True if the error came from an expired deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::Timeout { .. })
    }
}

/// Classes of git operations, each with its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpClass {
    /// Local ref and file reads and local ref writes.
    Local,
    /// `ls-remote` reachability probes.
    Reachability,
    /// `fetch` and `push`.
    Network,
    /// Whole-history scans.
    Scan,
}

/// Deadlines per [`OpClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimeouts {
    pub local: Duration,
    pub reachability: Duration,
    pub network: Duration,
    pub scan: Duration,
}

impl Default for ProbeTimeouts {
    fn default() -> Self {
        Self {
            local: Duration::from_secs(2),
            reachability: Duration::from_secs(5),
            network: Duration::from_secs(30),
            scan: Duration::from_secs(30),
        }
    }
}

impl ProbeTimeouts {
    /// Deadline for an operation class.
    pub fn for_class(&self, class: OpClass) -> Duration {
        match class {
            OpClass::Local => self.local,
            OpClass::Reachability => self.reachability,
            OpClass::Network => self.network,
            OpClass::Scan => self.scan,
        }
    }
}

/// What lives at the probe's path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoPresence {
    /// No repository at the path (or the path does not exist).
    Missing,
    /// A bare repository.
    Bare,
    /// A repository with a working tree.
    WorkTree { git_dir: PathBuf, work_dir: PathBuf },
}

/// Where a blob appears in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlobLocation {
    pub oid: Oid,
    pub paths: Vec<String>,
    pub commits: Vec<Oid>,
}

/// Captured output of one git process.
#[derive(Debug)]
struct GitOutput {
    code: Option<i32>,
    stdout: Vec<u8>,
    stderr: String,
}

impl GitOutput {
    fn success(&self) -> bool {
        self.code == Some(0)
    }

    fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Timeout-bounded, serialized git runner for one repository path.
#[derive(Debug)]
pub struct GitProbe {
    path: PathBuf,
    timeouts: ProbeTimeouts,
    gate: Mutex<()>,
}

impl GitProbe {
    /// Create a probe for `path`. The path does not need to exist yet.
    pub fn new(path: impl Into<PathBuf>, timeouts: ProbeTimeouts) -> Self {
        Self {
            path: path.into(),
            timeouts,
            gate: Mutex::new(()),
        }
    }

    /// The repository path this probe is bound to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn timeouts(&self) -> &ProbeTimeouts {
        &self.timeouts
    }

    // =========================================================================
    // Process plumbing
    // =========================================================================

    fn command(&self, args: &[&str]) -> Command {
        let dir = if self.path.is_dir() {
            self.path.clone()
        } else {
            std::env::temp_dir()
        };

        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GCM_INTERACTIVE", "never")
            .env("LC_ALL", "C")
            .env("LANG", "C")
            .env("GIT_OPTIONAL_LOCKS", "0");
        if std::env::var_os("GIT_SSH_COMMAND").is_none() {
            cmd.env("GIT_SSH_COMMAND", "ssh -o BatchMode=yes");
        }
        cmd
    }

    /// Run one git process. The caller must hold the gate.
    async fn run_unlocked(
        &self,
        class: OpClass,
        args: &[&str],
        input: Option<Vec<u8>>,
    ) -> Result<GitOutput, GitError> {
        let rendered = args.join(" ");
        let timeout = self.timeouts.for_class(class);
        let mut cmd = self.command(args);
        cmd.stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|source| GitError::Spawn {
            command: rendered.clone(),
            source,
        })?;
        let stdin = child.stdin.take();

        let io = async move {
            let feed = async move {
                if let (Some(mut pipe), Some(bytes)) = (stdin, input) {
                    pipe.write_all(&bytes).await?;
                }
                Ok::<(), std::io::Error>(())
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output?;
            match fed {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(output),
            }
        };

        let output = match tokio::time::timeout(timeout, io).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(GitError::Spawn {
                    command: rendered,
                    source,
                })
            }
            Err(_) => {
                tracing::warn!(command = %rendered, ?class, ?timeout, "git timed out");
                return Err(GitError::Timeout {
                    command: rendered,
                    timeout,
                });
            }
        };

        let result = GitOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        };
        tracing::debug!(
            command = %rendered,
            ?class,
            elapsed_ms = started.elapsed().as_millis() as u64,
            code = ?result.code,
            "git"
        );
        Ok(result)
    }

    async fn run(&self, class: OpClass, args: &[&str]) -> Result<GitOutput, GitError> {
        let _guard = self.gate.lock().await;
        self.run_unlocked(class, args, None).await
    }

    fn check(args: &[&str], output: GitOutput) -> Result<GitOutput, GitError> {
        if output.success() {
            Ok(output)
        } else {
            Err(GitError::CommandFailed {
                command: args.join(" "),
                code: output.code,
                stderr: output.stderr,
            })
        }
    }

    async fn run_checked(&self, class: OpClass, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(class, args).await?;
        Ok(Self::check(args, output)?.stdout())
    }

    // =========================================================================
    // Repository and toolchain
    // =========================================================================

    /// Find the repository containing the probe path.
    ///
    /// Parent directories are searched, so the path may be any directory
    /// inside a work tree. A missing path or a directory outside any
    /// repository is reported as [`RepoPresence::Missing`].
    pub fn open_repository(&self) -> Result<RepoPresence, GitError> {
        if !self.path.exists() {
            return Ok(RepoPresence::Missing);
        }
        match git2::Repository::discover(&self.path) {
            Ok(repo) if repo.is_bare() => Ok(RepoPresence::Bare),
            Ok(repo) => Ok(RepoPresence::WorkTree {
                git_dir: repo.path().to_path_buf(),
                work_dir: repo
                    .workdir()
                    .map(|dir| dir.components().collect::<PathBuf>())
                    .unwrap_or_else(|| self.path.clone()),
            }),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(RepoPresence::Missing),
            Err(e) => Err(GitError::AccessError {
                message: e.message().to_string(),
            }),
        }
    }

    /// Installed git version.
    pub async fn version(&self) -> Result<GitVersion, GitError> {
        let out = self.run_checked(OpClass::Local, &["version"]).await?;
        parse::parse_version(&out).ok_or_else(|| GitError::Parse {
            message: format!("cannot parse version from '{}'", out.trim()),
        })
    }

    /// Fail with [`GitError::VersionTooOld`] below the minimum version.
    pub async fn ensure_supported_version(&self) -> Result<GitVersion, GitError> {
        let found = self.version().await?;
        if found < MIN_GIT_VERSION {
            return Err(GitError::VersionTooOld {
                found,
                required: MIN_GIT_VERSION,
            });
        }
        Ok(found)
    }

    /// Absolute path of the git directory.
    pub async fn git_dir(&self) -> Result<PathBuf, GitError> {
        let out = self
            .run_checked(OpClass::Local, &["rev-parse", "--absolute-git-dir"])
            .await?;
        Ok(PathBuf::from(out.trim()))
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// URL configured for a remote, or `None` if no such remote exists.
    pub async fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        let args = ["remote", "get-url", name];
        let output = self.run(OpClass::Local, &args).await?;
        if output.success() {
            let url = output.stdout().trim().to_string();
            return Ok((!url.is_empty()).then_some(url));
        }
        if output.code == Some(2) || output.stderr.contains("No such remote") {
            return Ok(None);
        }
        Self::check(&args, output).map(|_| None)
    }

    /// Whether a remote name or URL answers `ls-remote` within the
    /// reachability deadline.
    pub async fn is_reachable(&self, target: &str) -> bool {
        match self.run(OpClass::Reachability, &["ls-remote", "--heads", target]).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                tracing::debug!(target, stderr = %output.stderr, "remote unreachable");
                false
            }
            Err(e) => {
                tracing::debug!(target, error = %e, "remote unreachable");
                false
            }
        }
    }

    /// Fetch a named remote.
    pub async fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run_checked(OpClass::Network, &["fetch", "--prune", "--quiet", remote])
            .await
            .map(|_| ())
    }

    /// Push `refs/heads/<branch>` to the same ref on `remote`.
    ///
    /// Never forces; a non-fast-forward is rejected by git.
    pub async fn push(&self, remote: &str, branch: &BranchName) -> Result<(), GitError> {
        let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch.as_str());
        self.run_checked(OpClass::Network, &["push", "--porcelain", remote, &refspec])
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Refs and ancestry
    // =========================================================================

    /// Resolve a ref to a commit, or `None` if it does not exist.
    pub async fn resolve_tip(&self, refname: &RefName) -> Result<Option<Oid>, GitError> {
        let spec = format!("{}^{{commit}}", refname.as_str());
        let args = ["rev-parse", "--verify", "--quiet", spec.as_str()];
        let output = self.run(OpClass::Local, &args).await?;
        if output.success() {
            return Ok(Some(Oid::new(output.stdout().trim())?));
        }
        if output.code == Some(1) {
            return Ok(None);
        }
        Self::check(&args, output).map(|_| None)
    }

    /// Count commits reachable from `tip` but not from `base`.
    pub async fn commit_count(&self, base: &Oid, tip: &Oid) -> Result<usize, GitError> {
        let range = format!("{}..{}", base.as_str(), tip.as_str());
        let out = self
            .run_checked(OpClass::Local, &["rev-list", "--count", &range])
            .await?;
        out.trim().parse().map_err(|_| GitError::Parse {
            message: format!("rev-list --count returned '{}'", out.trim()),
        })
    }

    /// Check if `ancestor` is an ancestor of `descendant`.
    ///
    /// A commit is its own ancestor.
    pub async fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, GitError> {
        if ancestor == descendant {
            return Ok(true);
        }
        let args = [
            "merge-base",
            "--is-ancestor",
            ancestor.as_str(),
            descendant.as_str(),
        ];
        let output = self.run(OpClass::Local, &args).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Self::check(&args, output).map(|_| false),
        }
    }

    /// Local branch names, sorted.
    pub async fn list_local_branches(&self) -> Result<Vec<BranchName>, GitError> {
        self.list_branches_under("refs/heads/").await
    }

    /// Remote-tracking branch names for `remote`, sorted, without `HEAD`.
    pub async fn list_remote_branches(&self, remote: &str) -> Result<Vec<BranchName>, GitError> {
        self.list_branches_under(&format!("refs/remotes/{remote}/"))
            .await
    }

    async fn list_branches_under(&self, prefix: &str) -> Result<Vec<BranchName>, GitError> {
        let out = self
            .run_checked(
                OpClass::Local,
                &["for-each-ref", "--format=%(refname)", prefix],
            )
            .await?;
        Ok(parse::parse_branch_refs(&out, prefix))
    }

    /// Branch HEAD points at, or `None` when detached.
    pub async fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let output = self.run(OpClass::Local, &args).await?;
        match output.code {
            Some(0) => Ok(Some(BranchName::new(output.stdout().trim())?)),
            Some(1) => Ok(None),
            _ => Self::check(&args, output).map(|_| None),
        }
    }

    /// Branch named by `refs/remotes/<remote>/HEAD`, if set.
    pub async fn remote_default_branch(
        &self,
        remote: &str,
    ) -> Result<Option<BranchName>, GitError> {
        let head = format!("refs/remotes/{remote}/HEAD");
        let output = self
            .run(OpClass::Local, &["symbolic-ref", "--quiet", &head])
            .await?;
        if !output.success() {
            return Ok(None);
        }
        let target = output.stdout();
        let prefix = format!("refs/remotes/{remote}/");
        Ok(target
            .trim()
            .strip_prefix(&prefix)
            .and_then(|name| BranchName::new(name).ok()))
    }

    /// Compare-and-swap update of `refname` from `expected_old` to `new`.
    pub async fn update_ref_cas(
        &self,
        refname: &RefName,
        new: &Oid,
        expected_old: &Oid,
        message: &str,
    ) -> Result<(), GitError> {
        let args = [
            "update-ref",
            "-m",
            message,
            refname.as_str(),
            new.as_str(),
            expected_old.as_str(),
        ];
        let output = self.run(OpClass::Local, &args).await?;
        if output.success() {
            return Ok(());
        }
        if output.stderr.contains("but expected") || output.stderr.contains("cannot lock ref") {
            return Err(GitError::CasFailed {
                refname: refname.to_string(),
                expected: expected_old.to_string(),
            });
        }
        Self::check(&args, output).map(|_| ())
    }

    /// `git reset --keep <target>` on the checked-out branch.
    ///
    /// Aborts without touching the tree if local changes would be lost.
    pub async fn reset_keep(&self, target: &Oid) -> Result<(), GitError> {
        self.run_checked(OpClass::Local, &["reset", "--keep", "--quiet", target.as_str()])
            .await
            .map(|_| ())
    }

    // =========================================================================
    // Working tree
    // =========================================================================

    /// Staged and unstaged tracked paths. Untracked files are not listed.
    pub async fn status(&self) -> Result<StatusEntries, GitError> {
        let args = ["status", "--porcelain=v1", "-z", "--untracked-files=no"];
        let output = self.run(OpClass::Local, &args).await?;
        let output = Self::check(&args, output)?;
        Ok(parse::parse_status_z(&output.stdout))
    }

    /// True when HEAD does not point at a branch.
    pub async fn is_detached_head(&self) -> Result<bool, GitError> {
        let args = ["symbolic-ref", "--quiet", "HEAD"];
        let output = self.run(OpClass::Local, &args).await?;
        match output.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Self::check(&args, output).map(|_| false),
        }
    }

    pub async fn is_shallow(&self) -> Result<bool, GitError> {
        let out = self
            .run_checked(OpClass::Local, &["rev-parse", "--is-shallow-repository"])
            .await?;
        Ok(out.trim() == "true")
    }

    // =========================================================================
    // History scans
    // =========================================================================

    /// Blobs at or above `threshold` bytes anywhere in history.
    ///
    /// Runs `rev-list --objects --all` and then `cat-file --batch-check`
    /// under one hold of the gate. Only ids and sizes are reported.
    pub async fn scan_large_blobs(&self, threshold: u64) -> Result<Vec<BlobInfo>, GitError> {
        let _guard = self.gate.lock().await;

        let list_args = ["rev-list", "--objects", "--all"];
        let listing = self.run_unlocked(OpClass::Scan, &list_args, None).await?;
        let listing = Self::check(&list_args, listing)?.stdout();

        let ids = parse::parse_object_ids(&listing);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut input = ids.join("\n");
        input.push('\n');

        let check_args = [
            "cat-file",
            "--batch-check=%(objecttype) %(objectname) %(objectsize)",
        ];
        let sizes = self
            .run_unlocked(OpClass::Scan, &check_args, Some(input.into_bytes()))
            .await?;
        let sizes = Self::check(&check_args, sizes)?.stdout();

        let blobs = parse::parse_batch_check(&sizes, threshold);
        tracing::debug!(objects = ids.len(), large = blobs.len(), "blob scan complete");
        Ok(blobs)
    }

    /// Paths and commits that reference a blob.
    ///
    /// This is a separate, user-invoked lookup; classification never runs it.
    pub async fn locate_blob(&self, oid: &Oid) -> Result<BlobLocation, GitError> {
        let _guard = self.gate.lock().await;

        let list_args = ["rev-list", "--objects", "--all"];
        let listing = self.run_unlocked(OpClass::Scan, &list_args, None).await?;
        let listing = Self::check(&list_args, listing)?.stdout();
        let paths = parse::parse_paths_for_object(&listing, oid);

        let find = format!("--find-object={}", oid.as_str());
        let log_args = ["log", "--all", "--format=%H", find.as_str()];
        let log = self.run_unlocked(OpClass::Scan, &log_args, None).await?;
        let commits = parse::parse_oid_lines(&Self::check(&log_args, log)?.stdout());

        Ok(BlobLocation {
            oid: oid.clone(),
            paths,
            commits,
        })
    }
}
