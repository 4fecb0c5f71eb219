//! git::parse
//!
//! Parsers for locale-stable git plumbing output.
//!
//! Every parser here is pure so that output formats can be tested without
//! spawning git.

use crate::core::types::{BranchName, Oid};

/// A git version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Oldest git release the probe relies on.
pub const MIN_GIT_VERSION: GitVersion = GitVersion::new(2, 30, 0);

/// Parse `git version` output.
///
/// Accepts vendor suffixes such as `2.39.2.windows.1` or
/// `2.37.1 (Apple Git-137.1)`.
pub fn parse_version(output: &str) -> Option<GitVersion> {
    let raw = output.trim().strip_prefix("git version ")?;
    let raw = raw.split_whitespace().next()?;
    let mut parts = raw
        .split('.')
        .map(|p| p.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next()??;
    let patch = parts.next().flatten().unwrap_or(0);
    Some(GitVersion::new(major, minor, patch))
}

/// Staged and unstaged paths from `git status --porcelain=v1 -z`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusEntries {
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
}

/// Parse NUL-separated porcelain v1 status.
///
/// Untracked (`??`) and ignored (`!!`) entries are skipped. Rename and copy
/// entries carry a second NUL-terminated field holding the source path,
/// which is consumed and dropped.
pub fn parse_status_z(output: &[u8]) -> StatusEntries {
    let mut entries = StatusEntries::default();
    let mut fields = output.split(|b| *b == 0).filter(|f| !f.is_empty());

    while let Some(field) = fields.next() {
        if field.len() < 4 {
            continue;
        }
        let x = field[0] as char;
        let y = field[1] as char;
        let path = String::from_utf8_lossy(&field[3..]).into_owned();

        if matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C') {
            fields.next();
        }
        if (x, y) == ('?', '?') || (x, y) == ('!', '!') {
            continue;
        }
        if x != ' ' {
            entries.staged.push(path.clone());
        }
        if y != ' ' {
            entries.unstaged.push(path);
        }
    }

    entries
}

/// A blob reported by `cat-file --batch-check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub oid: Oid,
    pub size_bytes: u64,
}

/// Object ids from `rev-list --objects --all`, deduplicated in order.
pub fn parse_object_ids(output: &str) -> Vec<&str> {
    let mut seen = std::collections::HashSet::new();
    output
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Blobs at or above `threshold` from
/// `cat-file --batch-check='%(objecttype) %(objectname) %(objectsize)'`.
///
/// Lines for other object types and `missing` lines are skipped.
pub fn parse_batch_check(output: &str, threshold: u64) -> Vec<BlobInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let kind = parts.next()?;
            let oid = parts.next()?;
            let size = parts.next()?.parse::<u64>().ok()?;
            if kind != "blob" || size < threshold {
                return None;
            }
            Some(BlobInfo {
                oid: Oid::new(oid).ok()?,
                size_bytes: size,
            })
        })
        .collect()
}

/// Paths recorded for `sha` in `rev-list --objects --all` output.
pub fn parse_paths_for_object(output: &str, sha: &Oid) -> Vec<String> {
    let mut paths: Vec<String> = output
        .lines()
        .filter_map(|line| {
            let (id, path) = line.split_once(' ')?;
            (id.eq_ignore_ascii_case(sha.as_str()) && !path.is_empty()).then(|| path.to_string())
        })
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

/// Branch names from `for-each-ref --format=%(refname) <prefix>`.
///
/// The symbolic `HEAD` entry and names that fail validation are skipped.
/// Output is sorted.
pub fn parse_branch_refs(output: &str, prefix: &str) -> Vec<BranchName> {
    let mut names: Vec<BranchName> = output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(prefix))
        .filter(|name| *name != "HEAD")
        .filter_map(|name| match BranchName::new(name) {
            Ok(branch) => Some(branch),
            Err(e) => {
                tracing::debug!(name, error = %e, "skipping unparseable ref");
                None
            }
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Commit ids, one per line.
pub fn parse_oid_lines(output: &str) -> Vec<Oid> {
    output
        .lines()
        .filter_map(|line| Oid::new(line.trim()).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA_A: &str = "1111111111111111111111111111111111111111";
    const SHA_B: &str = "2222222222222222222222222222222222222222";

    mod version {
        use super::*;

        #[test]
        fn plain() {
            assert_eq!(
                parse_version("git version 2.39.2\n"),
                Some(GitVersion::new(2, 39, 2))
            );
        }

        #[test]
        fn vendor_suffixes() {
            assert_eq!(
                parse_version("git version 2.37.1 (Apple Git-137.1)"),
                Some(GitVersion::new(2, 37, 1))
            );
            assert_eq!(
                parse_version("git version 2.45.0.windows.1"),
                Some(GitVersion::new(2, 45, 0))
            );
        }

        #[test]
        fn ordering_against_minimum() {
            assert!(GitVersion::new(2, 29, 9) < MIN_GIT_VERSION);
            assert!(GitVersion::new(2, 30, 0) >= MIN_GIT_VERSION);
            assert!(GitVersion::new(3, 0, 0) > MIN_GIT_VERSION);
        }

        #[test]
        fn garbage() {
            assert_eq!(parse_version("hello"), None);
            assert_eq!(parse_version("git version x.y"), None);
        }
    }

    mod status {
        use super::*;

        #[test]
        fn empty_is_clean() {
            assert_eq!(parse_status_z(b""), StatusEntries::default());
        }

        #[test]
        fn staged_unstaged_and_both() {
            let out = b"M  staged.txt\0 M unstaged.txt\0MM both.txt\0A  added.txt\0";
            let entries = parse_status_z(out);
            assert_eq!(entries.staged, vec!["staged.txt", "both.txt", "added.txt"]);
            assert_eq!(entries.unstaged, vec!["unstaged.txt", "both.txt"]);
        }

        #[test]
        fn untracked_and_ignored_skipped() {
            let entries = parse_status_z(b"?? new.txt\0!! build/\0");
            assert!(entries.staged.is_empty());
            assert!(entries.unstaged.is_empty());
        }

        #[test]
        fn rename_consumes_source_path() {
            let entries = parse_status_z(b"R  new name.txt\0old name.txt\0 M other.txt\0");
            assert_eq!(entries.staged, vec!["new name.txt"]);
            assert_eq!(entries.unstaged, vec!["other.txt"]);
        }
    }

    mod objects {
        use super::*;

        #[test]
        fn object_ids_dedup() {
            let out = format!("{SHA_A}\n{SHA_B} path/file\n{SHA_A}\n");
            assert_eq!(parse_object_ids(&out), vec![SHA_A, SHA_B]);
        }

        #[test]
        fn batch_check_threshold_and_kinds() {
            let out = format!(
                "blob {SHA_A} 15728640\nblob {SHA_B} 12\ncommit {SHA_A} 99999999\n{SHA_B} missing\n"
            );
            let blobs = parse_batch_check(&out, 10 * 1024 * 1024);
            assert_eq!(blobs.len(), 1);
            assert_eq!(blobs[0].oid.as_str(), SHA_A);
            assert_eq!(blobs[0].size_bytes, 15728640);
        }

        #[test]
        fn batch_check_threshold_is_inclusive() {
            let out = format!("blob {SHA_A} 100\n");
            assert_eq!(parse_batch_check(&out, 100).len(), 1);
            assert_eq!(parse_batch_check(&out, 101).len(), 0);
        }

        #[test]
        fn paths_for_object() {
            let out = format!("{SHA_A}\n{SHA_B} assets/big.bin\n{SHA_B} copy/big bin.dat\n");
            let sha = Oid::new(SHA_B).unwrap();
            assert_eq!(
                parse_paths_for_object(&out, &sha),
                vec!["assets/big.bin", "copy/big bin.dat"]
            );
        }
    }

    mod refs {
        use super::*;

        #[test]
        fn strips_prefix_and_skips_head() {
            let out = "refs/remotes/core/HEAD\nrefs/remotes/core/main\nrefs/remotes/core/feature/x\n";
            let names = parse_branch_refs(out, "refs/remotes/core/");
            let names: Vec<&str> = names.iter().map(|b| b.as_str()).collect();
            assert_eq!(names, vec!["feature/x", "main"]);
        }

        #[test]
        fn ignores_other_prefixes() {
            let out = "refs/heads/main\nrefs/tags/v1\n";
            assert_eq!(parse_branch_refs(out, "refs/heads/").len(), 1);
        }

        #[test]
        fn oid_lines() {
            let out = format!("{SHA_A}\n\nnot-an-oid\n{SHA_B}\n");
            assert_eq!(parse_oid_lines(&out).len(), 2);
        }
    }
}
