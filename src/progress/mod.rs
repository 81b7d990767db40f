//! Progress ledger: which legacy commits are already migrated, and to what.
//!
//! An entry exists only for commits whose output was flushed and validated,
//! so the ledger alone decides whether a commit must be (re)migrated.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ProgressConfig;
use crate::core::ContentHash;
use crate::error::{Effect, Transience};

mod memory;
mod sqlite;

pub use memory::MemoryProgress;
pub use sqlite::SqliteProgress;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path is a symlink: {path:?}")]
    Symlink { path: PathBuf },
    #[error("ledger schema version mismatch: expected {expected}, got {got}")]
    SchemaVersionMismatch { expected: u32, got: String },
    #[error("no migrated commit recorded for {0}")]
    Missing(ContentHash),
    #[error("commit {legacy} already recorded as {existing}, refusing {new}")]
    Conflict {
        legacy: ContentHash,
        existing: ContentHash,
        new: ContentHash,
    },
    #[error("ledger row decode failed: {0}")]
    Decode(String),
    #[error("progress ledger lock poisoned")]
    Poisoned,
}

impl ProgressError {
    pub fn transience(&self) -> Transience {
        match self {
            ProgressError::Sqlite(_) | ProgressError::Io { .. } | ProgressError::Poisoned => {
                Transience::Unknown
            }
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            ProgressError::Sqlite(_) | ProgressError::Io { .. } | ProgressError::Poisoned => {
                Effect::Unknown
            }
            _ => Effect::None,
        }
    }
}

/// Mapping from legacy commit hash to migrated commit hash.
pub trait Progress: Send + Sync {
    fn has(&self, legacy: &ContentHash) -> Result<bool, ProgressError>;

    /// Migrated hash for `legacy`; `ProgressError::Missing` when absent.
    fn get(&self, legacy: &ContentHash) -> Result<ContentHash, ProgressError>;

    /// Records `legacy -> migrated`. Re-recording the same pair is a no-op;
    /// a different target for a recorded commit is a `Conflict`.
    fn put(&self, legacy: ContentHash, migrated: ContentHash) -> Result<(), ProgressError>;

    /// Narrates migration progress.
    fn log(&self, message: fmt::Arguments<'_>) {
        tracing::info!(target: "migrate::progress", "{message}");
    }
}

/// Opens the ledger `config` names: SQLite at `path`, or an in-memory ledger
/// when no path is set.
pub fn open_ledger(config: &ProgressConfig) -> Result<Box<dyn Progress>, ProgressError> {
    match &config.path {
        Some(path) => {
            tracing::debug!(path = %path.display(), "opening sqlite progress ledger");
            Ok(Box::new(SqliteProgress::open(path)?))
        }
        None => {
            tracing::debug!("no ledger path configured; progress will not survive restart");
            Ok(Box::new(MemoryProgress::new()))
        }
    }
}
