#![forbid(unsafe_code)]

pub mod config;
pub mod core;
pub mod error;
pub mod legacy;
pub mod migrate;
pub mod progress;
pub mod store;
pub mod telemetry;

pub use error::{Effect, Error, ErrorKind, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the types a driver needs at crate root for convenience
pub use crate::core::{CommitMeta, ContentHash, RefName, WorkingSet};
pub use crate::migrate::{CancelToken, CommitOutcome, MigrateOptions, Migrator};
pub use crate::progress::{MemoryProgress, Progress, SqliteProgress, open_ledger};
