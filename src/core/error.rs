//! Core capability errors (identifiers, tuple encoding and translation).
//!
//! These are pure input failures: retrying without changing the data never
//! helps.

use thiserror::Error;

use crate::error::{Effect, Transience};

use super::schema::ColumnKind;

/// Invalid identifier.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("content hash `{raw}` is invalid: {reason}")]
    ContentHash { raw: String, reason: String },
    #[error("ref name `{raw}` is invalid: {reason}")]
    RefName { raw: String, reason: String },
}

/// Tuple encode/decode/translation failure.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum TupleError {
    #[error("column {tag} expects {expected:?} but legacy value is {found}")]
    KindMismatch {
        tag: u64,
        expected: ColumnKind,
        found: &'static str,
    },
    #[error("key column {tag} is null")]
    NullKey { tag: u64 },
    #[error("tuple decode failed at byte {offset}: {reason}")]
    Decode { offset: usize, reason: String },
}

/// Canonical error enum for core capability.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    Tuple(#[from] TupleError),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
