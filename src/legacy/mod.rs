//! Legacy storage format: tagged-tuple maps, tables, roots and commits.
//!
//! The migrator only reads from this side.

pub mod map;
pub mod store;
pub mod table;

pub use map::{ChangeKind, LegacyMap, LegacyMapEditor, RowDiff};
pub use store::{LegacyCommit, LegacyStore, MemoryLegacyStore};
pub use table::{LegacyRoot, LegacyTable};
