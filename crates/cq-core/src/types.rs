//! Core type definitions for the SCM layer

use serde::{Deserialize, Serialize};

use crate::error::ScmError;

/// A revision in the shared linear revision space
///
/// Centralized checkouts use it directly; distributed checkouts translate it
/// to a local commit id through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(u64);

impl Revision {
    pub fn new(number: u64) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Revision {
    fn from(number: u64) -> Self {
        Self(number)
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Revision {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        strip_r_from_svn_revision(s.trim())
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ScmError::InvalidRevision(s.to_string()))
    }
}

/// Strip the leading `r` from revision arguments like `r1234`
///
/// Anything that is not `r` followed by digits (bare numbers, `BASE`,
/// ranges) is returned unchanged, so applying this twice is harmless.
pub fn strip_r_from_svn_revision(revision: &str) -> &str {
    match revision.strip_prefix('r') {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits,
        _ => revision,
    }
}

/// Kind of change reported for a path in the working copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Deleted,
    /// Includes renames, copies and replacements
    Modified,
    Conflicted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Deleted => write!(f, "deleted"),
            Self::Modified => write!(f, "modified"),
            Self::Conflicted => write!(f, "conflicted"),
        }
    }
}

/// One (change kind, path) pair extracted from a status listing
///
/// `path` is always relative to the checkout root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusEntry {
    pub kind: ChangeKind,
    pub path: String,
}

impl StatusEntry {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// A diff as produced by the backend, binary hunks included
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Patch {
    /// Raw diff bytes, never transcoded
    pub data: Vec<u8>,
    /// Display name of the reviewer, recorded when the patch is applied
    pub reviewer: Option<String>,
}

impl Patch {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            reviewer: None,
        }
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Lossy text view for logging and display
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Which version-control tool drives a checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Centralized, linearly revisioned
    Svn,
    /// Distributed, bridged to the linear revision space with `git svn`
    Git,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Svn => write!(f, "svn"),
            Self::Git => write!(f, "git"),
        }
    }
}
