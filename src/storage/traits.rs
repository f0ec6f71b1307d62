//! Storage trait definitions

use crate::graph::{Edge, ExternalId, Paper, PaperId, PaperSummary};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Store timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Paper not found: {0}")]
    PaperNotFound(PaperId),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Whether re-running the same (idempotent) operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Timeout(_))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                StorageError::Timeout(err.to_string())
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Which papers a graph build reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperScope {
    /// Exactly one paper, whatever its inputs
    Single(PaperId),
    /// Every paper with a citation list or a similarity-candidate list
    WithGraphInputs,
}

/// A paper ranked against a query embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPaper {
    pub paper: PaperSummary,
    pub score: f32,
}

/// Trait for relationship store backends
///
/// Implementations must be thread-safe (Send + Sync): several builders and
/// resolvers may run against the same store at once. Edge insertion must be
/// an atomic, store-enforced insert-if-absent, never a read followed by a
/// write.
pub trait RelationshipStore: Send + Sync {
    // === Paper Operations ===

    /// Insert or replace a paper record
    fn save_paper(&self, paper: &Paper) -> StorageResult<()>;

    /// Load a paper by internal id
    fn load_paper(&self, id: PaperId) -> StorageResult<Option<Paper>>;

    /// Load the papers a graph build should process, ordered by id
    fn load_papers(&self, scope: PaperScope) -> StorageResult<Vec<Paper>>;

    /// Map external ids to internal ids in one lookup; unknown ids are absent
    fn resolve_external_ids(
        &self,
        ids: &[ExternalId],
    ) -> StorageResult<HashMap<ExternalId, PaperId>>;

    /// Display records for the given ids, in no particular order; unknown ids are absent
    fn paper_summaries(&self, ids: &[PaperId]) -> StorageResult<Vec<PaperSummary>>;

    // === Edge Operations ===

    /// Insert every edge whose (source, target, type) is not yet stored, as
    /// one write. Existing edges are left untouched. Returns the number of
    /// edges actually inserted.
    fn insert_edges_if_absent(&self, batch: &[Edge]) -> StorageResult<usize>;

    /// Edges originating from a paper
    fn edges_from(&self, id: PaperId) -> StorageResult<Vec<Edge>>;

    /// Total number of stored edges
    fn edge_count(&self) -> StorageResult<usize>;

    // === Embedding & Neighbor Cache Operations ===

    /// The paper's embedding, if it has one
    fn embedding(&self, id: PaperId) -> StorageResult<Option<Vec<f32>>>;

    /// Papers with an embedding ranked by cosine similarity to `query`,
    /// excluding `exclude`, best first, at most `limit`
    fn rank_by_similarity(
        &self,
        query: &[f32],
        exclude: PaperId,
        limit: usize,
    ) -> StorageResult<Vec<ScoredPaper>>;

    /// Cached neighbor ids; `None` when never populated
    fn cached_neighbors(&self, id: PaperId) -> StorageResult<Option<Vec<PaperId>>>;

    /// Replace the cached neighbor ids (last write wins)
    fn write_cached_neighbors(&self, id: PaperId, neighbors: &[PaperId]) -> StorageResult<()>;

    /// Papers with an embedding but no cached neighbors, ordered by id
    fn papers_missing_neighbor_cache(&self, limit: usize) -> StorageResult<Vec<PaperId>>;

    /// Number of papers with an embedding
    fn embedded_paper_count(&self) -> StorageResult<usize>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: RelationshipStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>, timeout: Duration) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
