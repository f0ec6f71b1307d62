//! Store wrapper with injectable write failures

use super::memory::MemoryStore;
use super::traits::{PaperScope, RelationshipStore, ScoredPaper, StorageError, StorageResult};
use crate::graph::{Edge, ExternalId, Paper, PaperId, PaperSummary};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Delegates to a `MemoryStore`, failing chosen writes with a retryable timeout
#[derive(Debug, Default)]
pub(crate) struct FlakyStore {
    pub inner: MemoryStore,
    edge_writes_before_failure: Option<usize>,
    edge_writes: AtomicUsize,
    fail_cache_writes: bool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` edge batches through, then fail every later one
    pub fn fail_edge_writes_after(mut self, n: usize) -> Self {
        self.edge_writes_before_failure = Some(n);
        self
    }

    pub fn fail_cache_writes(mut self) -> Self {
        self.fail_cache_writes = true;
        self
    }

    fn busy(what: &str) -> StorageError {
        StorageError::Timeout(format!("injected failure during {}", what))
    }
}

impl RelationshipStore for FlakyStore {
    fn save_paper(&self, paper: &Paper) -> StorageResult<()> {
        self.inner.save_paper(paper)
    }

    fn load_paper(&self, id: PaperId) -> StorageResult<Option<Paper>> {
        self.inner.load_paper(id)
    }

    fn load_papers(&self, scope: PaperScope) -> StorageResult<Vec<Paper>> {
        self.inner.load_papers(scope)
    }

    fn resolve_external_ids(
        &self,
        ids: &[ExternalId],
    ) -> StorageResult<HashMap<ExternalId, PaperId>> {
        self.inner.resolve_external_ids(ids)
    }

    fn paper_summaries(&self, ids: &[PaperId]) -> StorageResult<Vec<PaperSummary>> {
        self.inner.paper_summaries(ids)
    }

    fn insert_edges_if_absent(&self, batch: &[Edge]) -> StorageResult<usize> {
        let seen = self.edge_writes.fetch_add(1, Ordering::SeqCst);
        match self.edge_writes_before_failure {
            Some(limit) if seen >= limit => Err(Self::busy("edge insert")),
            _ => self.inner.insert_edges_if_absent(batch),
        }
    }

    fn edges_from(&self, id: PaperId) -> StorageResult<Vec<Edge>> {
        self.inner.edges_from(id)
    }

    fn edge_count(&self) -> StorageResult<usize> {
        self.inner.edge_count()
    }

    fn embedding(&self, id: PaperId) -> StorageResult<Option<Vec<f32>>> {
        self.inner.embedding(id)
    }

    fn rank_by_similarity(
        &self,
        query: &[f32],
        exclude: PaperId,
        limit: usize,
    ) -> StorageResult<Vec<ScoredPaper>> {
        self.inner.rank_by_similarity(query, exclude, limit)
    }

    fn cached_neighbors(&self, id: PaperId) -> StorageResult<Option<Vec<PaperId>>> {
        self.inner.cached_neighbors(id)
    }

    fn write_cached_neighbors(&self, id: PaperId, neighbors: &[PaperId]) -> StorageResult<()> {
        if self.fail_cache_writes {
            return Err(Self::busy("neighbor cache write"));
        }
        self.inner.write_cached_neighbors(id, neighbors)
    }

    fn papers_missing_neighbor_cache(&self, limit: usize) -> StorageResult<Vec<PaperId>> {
        self.inner.papers_missing_neighbor_cache(limit)
    }

    fn embedded_paper_count(&self) -> StorageResult<usize> {
        self.inner.embedded_paper_count()
    }
}
