//! Papergraph: relationship-graph engine for research papers
//!
//! Turns each paper's raw citation list and ranked similarity candidates
//! into a directed, typed edge set, persists it idempotently, and answers
//! "related papers" queries from a neighbor cache with an embedding-ranking
//! fallback.
//!
//! # Core Concepts
//!
//! - **Papers**: identity records carrying external ids, raw citations,
//!   similarity candidates, an optional embedding and a neighbor cache
//! - **Edges**: `CITES` and `SIMILAR` relationships, at most one per
//!   (source, target, type)
//! - **Stores**: backends implementing [`RelationshipStore`], with an atomic
//!   insert-if-absent primitive
//!
//! # Example
//!
//! ```
//! use papergraph::{BuildScope, GraphBuilder, MemoryStore, Paper, RelationshipStore};
//!
//! let store = MemoryStore::new();
//! store.save_paper(&Paper::new(1, "a").with_similarity_candidates([2])).unwrap();
//! store.save_paper(&Paper::new(2, "b")).unwrap();
//!
//! let report = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
//! assert_eq!(report.inserted(), 1);
//! ```

pub mod build;
pub mod config;
mod graph;
pub mod similarity;
pub mod storage;

pub use build::{
    bulk_merge, BuildError, BuildReport, BuildScope, GraphBuilder, IdentifierResolver,
    MergeError, MergeReport,
};
pub use config::{Config, ConfigError};
pub use graph::{
    dedup_edges, normalize_edges, parse_citation_list, parse_id_list, similarity_strength,
    CitationRecord, Edge, EdgeKey, ExternalId, InvalidEdge, Paper, PaperId, PaperSummary,
    RawCitation, RelationshipType,
};
pub use similarity::{
    backfill_neighbor_cache, BackfillOptions, BackfillReport, NeighborSource, Related,
    RelatedPaper, SimilarityResolver,
};
pub use storage::{
    MemoryStore, OpenStore, RelationshipStore, SqliteStore, StorageError, StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
