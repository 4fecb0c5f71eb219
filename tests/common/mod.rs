//! Shared fixtures for integration tests.
//!
//! A [`Mirror`] is a temp directory holding two bare remotes (`core.git`,
//! `github.git`) and a `local` working copy with both configured as
//! remotes, all three at the same initial commit on `main`.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use trisync::engine::{DetectOptions, Detector, Remotes};

/// Run git in `dir` and return trimmed stdout. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "commit.gpgsign=false", "-c", "core.hooksPath=/dev/null"])
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "Test User")
        .env("GIT_AUTHOR_EMAIL", "test@example.com")
        .env("GIT_COMMITTER_NAME", "Test User")
        .env("GIT_COMMITTER_EMAIL", "test@example.com")
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Write `content` to `file` in `dir` and commit it. Returns the new HEAD.
pub fn commit(dir: &Path, file: &str, content: &str) -> String {
    std::fs::write(dir.join(file), content).expect("failed to write file");
    git(dir, &["add", file]);
    git(dir, &["commit", "-q", "-m", &format!("update {file}")]);
    git(dir, &["rev-parse", "HEAD"])
}

/// A fresh repository with one commit on `main` and no remotes.
pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).expect("failed to create repo dir");
    git(dir, &["init", "-q", "-b", "main"]);
    commit(dir, "README.md", "# mirror\n");
}

/// Local copy plus two bare remotes.
pub struct Mirror {
    root: TempDir,
}

impl Mirror {
    /// Both remotes configured and in sync with local.
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp dir");
        let local = root.path().join("local");
        init_repo(&local);

        for name in ["core", "github"] {
            let bare = root.path().join(format!("{name}.git"));
            git(root.path(), &["init", "-q", "--bare", "-b", "main", bare.to_str().unwrap()]);
            git(&local, &["remote", "add", name, bare.to_str().unwrap()]);
            git(&local, &["push", "-q", name, "main"]);
        }
        git(&local, &["fetch", "-q", "--all"]);

        Self { root }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn local(&self) -> PathBuf {
        self.root.path().join("local")
    }

    pub fn remote_dir(&self, name: &str) -> PathBuf {
        self.root.path().join(format!("{name}.git"))
    }

    /// Commit in the local copy.
    pub fn commit_local(&self, file: &str, content: &str) -> String {
        commit(&self.local(), file, content)
    }

    /// Create commits directly on remote `name` through a scratch clone,
    /// optionally pushing the same history to `also`.
    pub fn commit_remote(&self, name: &str, files: &[&str], also: Option<&str>) {
        let scratch = self.root.path().join(format!("scratch-{name}"));
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch).expect("failed to clear scratch clone");
        }
        let source = self.remote_dir(name);
        git(
            self.root.path(),
            &["clone", "-q", source.to_str().unwrap(), scratch.to_str().unwrap()],
        );
        git(&scratch, &["checkout", "-q", "main"]);
        for file in files {
            commit(&scratch, file, &format!("{name} {file}\n"));
        }
        git(&scratch, &["push", "-q", "origin", "main"]);
        if let Some(other) = also {
            let target = self.remote_dir(other);
            git(&scratch, &["push", "-q", target.to_str().unwrap(), "main"]);
        }
    }

    /// Detector with default remotes and options.
    pub fn detector(&self) -> Detector {
        Detector::new(self.local(), Remotes::default(), DetectOptions::default())
    }

    /// Detector that compares existing tracking refs without fetching.
    pub fn offline_detector(&self) -> Detector {
        let options = DetectOptions {
            fetch_before_check: false,
            ..Default::default()
        };
        Detector::new(self.local(), Remotes::default(), options)
    }
}
