//! Commit metadata, ref names and working sets shared by both formats.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{CoreError, InvalidId};
use super::hash::{ContentHash, ContentHasher};

/// Author, timestamp and message of a commit. Copied verbatim by migration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitMeta {
    pub name: String,
    pub email: String,
    pub timestamp_ms: u64,
    pub description: String,
}

impl CommitMeta {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        timestamp_ms: u64,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp_ms,
            description: description.into(),
        }
    }

    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_str(&self.name);
        hasher.write_str(&self.email);
        hasher.write_u64(self.timestamp_ms);
        hasher.write_str(&self.description);
    }
}

/// Content address of a commit object: its root, ordered parents and
/// metadata.
pub fn commit_address(
    root: &ContentHash,
    parents: &[ContentHash],
    meta: &CommitMeta,
) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.write_str("commit");
    hasher.write_hash(root);
    hasher.write_u64(parents.len() as u64);
    for parent in parents {
        hasher.write_hash(parent);
    }
    meta.hash_into(&mut hasher);
    hasher.finish()
}

/// Named reference into a store.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RefName {
    Branch(String),
    Internal(String),
    WorkingSet(String),
}

impl RefName {
    pub fn branch(name: impl Into<String>) -> Self {
        RefName::Branch(name.into())
    }

    pub fn internal(name: impl Into<String>) -> Self {
        RefName::Internal(name.into())
    }

    /// Working set ref for the branch `name`.
    pub fn working_set(name: impl Into<String>) -> Self {
        RefName::WorkingSet(name.into())
    }

    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let invalid = |reason: &str| InvalidId::RefName {
            raw: raw.to_string(),
            reason: reason.to_string(),
        };
        let (ctor, rest): (fn(String) -> RefName, &str) =
            if let Some(rest) = raw.strip_prefix("refs/heads/") {
                (RefName::Branch, rest)
            } else if let Some(rest) = raw.strip_prefix("refs/internal/") {
                (RefName::Internal, rest)
            } else if let Some(rest) = raw.strip_prefix("refs/workspaces/") {
                (RefName::WorkingSet, rest)
            } else {
                return Err(invalid("unknown ref namespace").into());
            };
        if rest.is_empty() {
            return Err(invalid("empty ref name").into());
        }
        Ok(ctor(rest.to_string()))
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefName::Branch(name) => write!(f, "refs/heads/{name}"),
            RefName::Internal(name) => write!(f, "refs/internal/{name}"),
            RefName::WorkingSet(name) => write!(f, "refs/workspaces/{name}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingSetMeta {
    pub name: String,
    pub email: String,
    pub timestamp_ms: u64,
    pub description: String,
}

/// Uncommitted state of a branch: working and staged roots.
#[derive(Clone, Debug)]
pub struct WorkingSet<R> {
    pub working: R,
    pub staged: R,
    pub meta: Option<WorkingSetMeta>,
}
