//! Storage backends for the paper graph
//!
//! The engine talks to storage only through the `RelationshipStore` trait.
//! `SqliteStore` is the persistent implementation; `MemoryStore` is a
//! concurrent in-memory implementation used in tests and for scratch runs.

mod memory;
mod sqlite;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, DEFAULT_TIMEOUT};
pub use traits::{OpenStore, PaperScope, RelationshipStore, ScoredPaper, StorageError, StorageResult};
