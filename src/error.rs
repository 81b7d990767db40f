use thiserror::Error;

use crate::config::ConfigError;
use crate::core::CoreError;
use crate::migrate::MigrateError;
use crate::progress::ProgressError;
use crate::store::StoreError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no side effects occurred.
    None,
    /// Side effects definitely occurred (locally or remotely).
    Some,
    /// We don't know if side effects occurred.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Coarse classification used by drivers to decide how to react.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// A commit was submitted before its parent was migrated: driver bug.
    Ordering,
    /// The commit's data cannot be represented in the destination format.
    UnsupportedData,
    /// Migrated output does not match its source.
    Integrity,
    /// Pipeline stages broke their message contract.
    Protocol,
    Storage,
    Config,
    Cancelled,
}

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Migrate(#[from] MigrateError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Core(e) => e.transience(),
            Error::Store(e) => e.transience(),
            Error::Migrate(e) => e.transience(),
            Error::Progress(e) => e.transience(),
            Error::Config(_) => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Core(e) => e.effect(),
            Error::Store(e) => e.effect(),
            Error::Migrate(e) => e.effect(),
            Error::Progress(e) => e.effect(),
            Error::Config(_) => Effect::None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // Tuples that cannot be translated are data the new format rejects.
            Error::Core(_) => ErrorKind::UnsupportedData,
            Error::Store(_) | Error::Progress(_) => ErrorKind::Storage,
            Error::Migrate(e) => e.kind(),
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
