//! Destination storage format: encoded-tuple maps, tables, root values and
//! commits, plus the `DestStore` the migrator writes into.

pub mod commit;
pub mod dest;
pub mod error;
pub mod map;
pub mod table;

pub use commit::Commit;
pub use dest::{DestStore, MemoryDestStore};
pub use error::StoreError;
pub use map::{MapEditor, TupleMap};
pub use table::{IndexSet, RootValue, Table};
