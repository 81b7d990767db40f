//! Commit-by-commit migration from the legacy storage format.
//!
//! Module hierarchy, leaves first:
//! - cancel, group: cancellation tokens and scoped task groups
//! - translate, pipeline: per-map tuple translation and the three-stage rebuild
//! - schema, table, root: schema rules, table and root reconciliation, validation
//! - commit: the [`Migrator`] that drives a commit through all of the above

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::core::{ContentHash, RefName};
use crate::error::{Effect, ErrorKind, Transience};

mod cancel;
mod commit;
mod group;
mod pipeline;
mod root;
mod schema;
mod table;
mod translate;

pub use cancel::CancelToken;
pub use commit::{CommitOutcome, Migrator};
pub use group::{Task, TaskGroup};
pub use pipeline::{DEFAULT_CHANNEL_CAPACITY, Pipeline, migrate_index};
pub use root::{Baseline, migrate_root, reusable_baseline};
pub use schema::{
    SchemaRule, ValidationMode, default_rules, patch_legacy_schema, validate_root_value,
    validate_schema,
};
pub use table::migrate_table;
pub use translate::{TupleEdit, TupleTranslator};

/// Data the destination format cannot represent.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum Unsupported {
    #[error("table `{table}` has unresolved merge conflicts")]
    Conflicts { table: String },

    #[error("table `{table}` violates schema rule `{rule}`: {reason}")]
    Schema {
        table: String,
        rule: &'static str,
        reason: String,
    },

    #[error("table `{table}` is missing index `{index}` in the {side}")]
    MissingIndex {
        table: String,
        index: String,
        side: IndexSide,
    },
}

/// Which of the three index sets an index went missing from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSide {
    LegacyBaseline,
    Legacy,
    MigratedBaseline,
}

impl fmt::Display for IndexSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexSide::LegacyBaseline => "legacy parent",
            IndexSide::Legacy => "legacy table",
            IndexSide::MigratedBaseline => "migrated parent",
        })
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MigrateError {
    #[error("commit {commit} submitted before its parent {parent} was migrated")]
    Ordering {
        commit: ContentHash,
        parent: ContentHash,
    },

    #[error(transparent)]
    Unsupported(#[from] Unsupported),

    #[error("migrated table `{table}` does not match its source: {reason}")]
    Integrity { table: String, reason: String },

    #[error("pipeline protocol violation: {0}")]
    PipelineProtocol(String),

    #[error("migration cancelled")]
    Cancelled,

    #[error("failed to spawn `{name}` thread")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl MigrateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MigrateError::Ordering { .. } => ErrorKind::Ordering,
            MigrateError::Unsupported(_) => ErrorKind::UnsupportedData,
            MigrateError::Integrity { .. } => ErrorKind::Integrity,
            MigrateError::PipelineProtocol(_) => ErrorKind::Protocol,
            MigrateError::Cancelled => ErrorKind::Cancelled,
            MigrateError::Spawn { .. } => ErrorKind::Storage,
        }
    }

    pub fn transience(&self) -> Transience {
        match self {
            MigrateError::Cancelled | MigrateError::Spawn { .. } => Transience::Retryable,
            _ => Transience::Permanent,
        }
    }

    /// Integrity failures are detected after the migrated commit was
    /// flushed; everything else fails before the ledger is touched.
    pub fn effect(&self) -> Effect {
        match self {
            MigrateError::Integrity { .. } => Effect::Some,
            MigrateError::Cancelled => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

pub const DEFAULT_SYSTEM_TABLE_PREFIX: &str = "dolt_";
pub const DEFAULT_FLUSH_REF: &str = "migration-flush";
pub const DEFAULT_CREATION_REF: &str = "create";

/// Knobs for a migration run.
#[derive(Clone, Debug)]
pub struct MigrateOptions {
    pub pipeline: Pipeline,
    /// Tables whose name starts with this get their legacy schema patched.
    pub system_table_prefix: String,
    pub schema_rules: Vec<Arc<dyn SchemaRule>>,
    pub validation: ValidationMode,
    /// Internal ref moved after every migrated commit to force a flush.
    pub flush_ref: RefName,
    /// Internal ref the migrated init commit is written under.
    pub creation_ref: RefName,
}

impl Default for MigrateOptions {
    fn default() -> Self {
        Self {
            pipeline: Pipeline::default(),
            system_table_prefix: DEFAULT_SYSTEM_TABLE_PREFIX.to_string(),
            schema_rules: default_rules(),
            validation: ValidationMode::default(),
            flush_ref: RefName::internal(DEFAULT_FLUSH_REF),
            creation_ref: RefName::internal(DEFAULT_CREATION_REF),
        }
    }
}

impl From<&Config> for MigrateOptions {
    fn from(config: &Config) -> Self {
        Self {
            pipeline: Pipeline::new(config.pipeline.channel_capacity),
            system_table_prefix: config.system_table_prefix.clone(),
            schema_rules: default_rules(),
            validation: config.validation,
            flush_ref: RefName::internal(config.refs.flush.clone()),
            creation_ref: RefName::internal(config.refs.creation.clone()),
        }
    }
}
