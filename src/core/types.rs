//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`RefName`] - Validated Git reference name
//! - [`Location`] - One of the three mirrored copies of a repository
//! - [`Fingerprint`] - Stable hash of a detection snapshot
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so a probe result that fails to parse is
//! rejected at the boundary instead of flowing into classification.
//!
//! # Examples
//!
//! ```
//! use trisync::core::types::{BranchName, Oid, RefName};
//!
//! let branch = BranchName::new("feature/my-branch").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let tracking = RefName::for_remote_branch("core", &branch);
//! assert_eq!(tracking.as_str(), "refs/remotes/core/feature/my-branch");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(Oid::new("not-a-sha").is_err());
//! # let _ = oid;
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),
}

/// Characters git forbids anywhere in a ref component.
const INVALID_REF_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];

/// Shared refname checks (see `git check-ref-format`).
///
/// Returns a description of the first violation found.
fn refname_violation(name: &str) -> Option<String> {
    if name.is_empty() {
        return Some("cannot be empty".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return Some("cannot start or end with '/'".into());
    }
    if name.ends_with('.') {
        return Some("cannot end with '.'".into());
    }
    for pattern in ["..", "@{", "//"] {
        if name.contains(pattern) {
            return Some(format!("cannot contain '{pattern}'"));
        }
    }
    if let Some(c) = name.chars().find(|c| INVALID_REF_CHARS.contains(c)) {
        return Some(format!("cannot contain '{c}'"));
    }
    if name.chars().any(|c| c.is_ascii_control()) {
        return Some("cannot contain control characters".into());
    }
    for component in name.split('/') {
        if component.starts_with('.') {
            return Some("path component cannot start with '.'".into());
        }
        if component.ends_with(".lock") {
            return Some("path component cannot end with '.lock'".into());
        }
    }
    None
}

/// A validated Git branch name.
///
/// Branch names follow Git's refname rules, plus the branch-specific
/// restrictions that a name cannot start with `-` or be exactly `@`.
///
/// # Example
///
/// ```
/// use trisync::core::types::BranchName;
///
/// let name = BranchName::new("release/2.0").unwrap();
/// assert_eq!(name.as_str(), "release/2.0");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-x").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name == "@" {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot be '@' (reserved)".into(),
            ));
        }
        if name.starts_with('-') {
            return Err(TypeError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }
        if let Some(problem) = refname_violation(&name) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name {problem}"
            )));
        }
        Ok(Self(name))
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use trisync::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex string.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    ///
    /// Returns the first `len` characters, or the full OID if shorter.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git reference name.
///
/// # Example
///
/// ```
/// use trisync::core::types::{BranchName, RefName};
///
/// let branch = BranchName::new("main").unwrap();
/// assert_eq!(RefName::for_branch(&branch).as_str(), "refs/heads/main");
/// assert_eq!(
///     RefName::for_remote_branch("github", &branch).as_str(),
///     "refs/remotes/github/main"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RefName(String);

impl RefName {
    /// Create a new validated ref name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRefName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if let Some(problem) = refname_violation(&name) {
            return Err(TypeError::InvalidRefName(format!("ref name {problem}")));
        }
        Ok(Self(name))
    }

    /// Ref name for a local branch (`refs/heads/<branch>`).
    pub fn for_branch(branch: &BranchName) -> Self {
        Self(format!("refs/heads/{}", branch.as_str()))
    }

    /// Ref name for a remote-tracking branch (`refs/remotes/<remote>/<branch>`).
    pub fn for_remote_branch(remote: &str, branch: &BranchName) -> Self {
        Self(format!("refs/remotes/{}/{}", remote, branch.as_str()))
    }

    /// Strip a prefix from the ref name and return the remainder.
    pub fn strip_prefix(&self, prefix: &str) -> Option<&str> {
        self.0.strip_prefix(prefix)
    }

    /// Get the ref name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RefName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RefName> for String {
    fn from(name: RefName) -> Self {
        name.0
    }
}

impl std::fmt::Display for RefName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the three copies of a mirrored repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// The local working copy.
    Local,
    /// The authoritative bare repository.
    Core,
    /// The backup mirror.
    #[serde(rename = "github")]
    GitHub,
}

impl Location {
    /// All locations in canonical order.
    pub const ALL: [Location; 3] = [Location::Local, Location::Core, Location::GitHub];

    /// Lowercase label used in fix IDs and output.
    pub fn label(&self) -> &'static str {
        match self {
            Location::Local => "local",
            Location::Core => "core",
            Location::GitHub => "github",
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable SHA-256 fingerprint of serialized state.
///
/// Two detection snapshots of an unchanged repository have equal
/// fingerprints.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over raw bytes.
    pub fn compute(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_common_names() {
            for name in ["main", "feature/x", "user@topic", "release-1.2", "a_b"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_invalid_names() {
            for name in [
                "", "@", "-x", ".hidden", "a/.b", "x.lock", "a/b.lock/c", "a..b", "a@{b",
                "a//b", "a/", "a.", "a b", "a~b", "a^b", "a:b", "a\\b", "a?b", "a*b", "a[b",
                "a\x07b",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be invalid");
            }
        }

        #[test]
        fn serde_roundtrip() {
            let branch = BranchName::new("feature/x").unwrap();
            let json = serde_json::to_string(&branch).unwrap();
            assert_eq!(json, "\"feature/x\"");
            let parsed: BranchName = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, branch);
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<BranchName, _> = serde_json::from_str("\"a..b\"");
            assert!(result.is_err());
        }
    }

    mod oid {
        use super::*;

        #[test]
        fn normalizes_case() {
            let oid = Oid::new("ABCDEF0123456789ABCDEF0123456789ABCDEF01").unwrap();
            assert_eq!(oid.as_str(), "abcdef0123456789abcdef0123456789abcdef01");
        }

        #[test]
        fn accepts_sha256_length() {
            assert!(Oid::new("a".repeat(64)).is_ok());
        }

        #[test]
        fn rejects_bad_length_and_chars() {
            assert!(Oid::new("abc").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn short_is_bounded() {
            let oid = Oid::new("a".repeat(40)).unwrap();
            assert_eq!(oid.short(7), "aaaaaaa");
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod ref_name {
        use super::*;

        #[test]
        fn constructors() {
            let b = BranchName::new("topic").unwrap();
            assert_eq!(RefName::for_branch(&b).as_str(), "refs/heads/topic");
            assert_eq!(
                RefName::for_remote_branch("core", &b).as_str(),
                "refs/remotes/core/topic"
            );
        }

        #[test]
        fn strip_prefix() {
            let r = RefName::new("refs/remotes/core/feature/x").unwrap();
            assert_eq!(r.strip_prefix("refs/remotes/core/"), Some("feature/x"));
            assert_eq!(r.strip_prefix("refs/heads/"), None);
        }

        #[test]
        fn rejects_invalid() {
            assert!(RefName::new("refs/heads/a..b").is_err());
            assert!(RefName::new("/refs/heads/a").is_err());
        }
    }

    mod location {
        use super::*;

        #[test]
        fn labels_and_serde() {
            assert_eq!(Location::GitHub.to_string(), "github");
            assert_eq!(
                serde_json::to_string(&Location::GitHub).unwrap(),
                "\"github\""
            );
            assert_eq!(Location::ALL.len(), 3);
        }
    }

    mod fingerprint {
        use super::*;

        #[test]
        fn deterministic() {
            assert_eq!(Fingerprint::compute(b"abc"), Fingerprint::compute(b"abc"));
            assert_ne!(Fingerprint::compute(b"abc"), Fingerprint::compute(b"abd"));
        }

        #[test]
        fn hex_encoded_sha256() {
            let fp = Fingerprint::compute(b"");
            assert_eq!(fp.as_str().len(), 64);
            assert_eq!(fp.short().len(), 12);
        }
    }
}
