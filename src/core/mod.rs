//! Core domain types shared by the legacy and destination formats.
//!
//! Module hierarchy follows type dependency order:
//! - hash: ContentHash, ContentHasher
//! - schema: Schema, Column, IndexDef, TupleLayout, foreign keys
//! - tuple: Value, LegacyTuple, NewTuple
//! - meta: CommitMeta, RefName, WorkingSet

pub mod error;
pub mod hash;
pub mod meta;
pub mod schema;
pub mod tuple;

pub use error::{CoreError, InvalidId, TupleError};
pub use hash::{ContentHash, ContentHasher};
pub use meta::{CommitMeta, RefName, WorkingSet, WorkingSetMeta, commit_address};
pub use schema::{
    Column, ColumnDefault, ColumnKind, Constraint, DEFAULT_VARCHAR_LEN, FieldDesc, ForeignKey,
    ForeignKeyCollection, IndexDef, Schema, SqlType, TupleLayout,
};
pub use tuple::{LegacyTuple, NewTuple, TupleBuilder, Value};
