//! Batch graph construction
//!
//! Identifier resolution, the chunked insert-if-absent merge, and the
//! builder that runs them over a selection of papers.

mod builder;
mod merge;
mod resolve;

pub use builder::{BuildError, BuildReport, BuildScope, GraphBuilder};
pub use merge::{bulk_merge, MergeError, MergeReport, DEFAULT_CHUNK_SIZE};
pub use resolve::{IdentifierResolver, ResolvedIds};
