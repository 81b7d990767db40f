//! Storage errors shared by the legacy read side and the destination write
//! side.

use thiserror::Error;

use crate::core::{ContentHash, RefName};
use crate::error::{Effect, Transience};

#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum StoreError {
    #[error("commit {0} not found")]
    CommitNotFound(ContentHash),

    #[error("root value {0} not found")]
    RootNotFound(ContentHash),

    #[error("ref {0} not found")]
    RefNotFound(RefName),

    #[error("working set {0} not found")]
    WorkingSetNotFound(RefName),

    #[error("commit {commit} has no parent at index {index}")]
    NoParent { commit: ContentHash, index: usize },

    #[error("{0} store lock poisoned")]
    Poisoned(&'static str),
}

impl StoreError {
    pub fn transience(&self) -> Transience {
        match self {
            StoreError::Poisoned(_) => Transience::Unknown,
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            StoreError::Poisoned(_) => Effect::Unknown,
            _ => Effect::None,
        }
    }
}
