//! In-memory relationship store
//!
//! Honors the same contract as `SqliteStore` without a database: edge
//! insertion goes through the map's atomic entry API, so concurrent
//! callers racing on one triple see exactly one insert. A batch holding an
//! invalid edge is refused as a whole, and external ids stay unique across
//! papers. Counts batch writes so callers can observe how an edge set was
//! chunked.

use super::traits::{PaperScope, RelationshipStore, ScoredPaper, StorageError, StorageResult};
use crate::graph::{Edge, EdgeKey, ExternalId, Paper, PaperId, PaperSummary};
use crate::similarity::rank_by_cosine;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Concurrent in-memory store keyed by internal paper id
#[derive(Debug, Default)]
pub struct MemoryStore {
    papers: DashMap<PaperId, Paper>,
    edges: DashMap<EdgeKey, Edge>,
    batch_writes: AtomicUsize,
    /// Serializes paper writes so the external-id uniqueness check holds
    paper_writes: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert_edges_if_absent` calls that reached the store
    pub fn batch_writes(&self) -> usize {
        self.batch_writes.load(Ordering::Relaxed)
    }

    /// Stored edge for a triple, if any
    pub fn edge(&self, key: &EdgeKey) -> Option<Edge> {
        self.edges.get(key).map(|e| e.clone())
    }

    fn sorted_papers(&self) -> Vec<Paper> {
        let mut papers: Vec<Paper> = self.papers.iter().map(|r| r.value().clone()).collect();
        papers.sort_by_key(|p| p.id);
        papers
    }
}

impl RelationshipStore for MemoryStore {
    fn save_paper(&self, paper: &Paper) -> StorageResult<()> {
        let _guard = self.paper_writes.lock().unwrap();
        let wanted = paper.external_ids();
        if let Some(owner) = self.papers.iter().find(|other| {
            other.id != paper.id && other.external_ids().iter().any(|id| wanted.contains(id))
        }) {
            return Err(StorageError::InvalidData(format!(
                "external id of paper {} already belongs to paper {}",
                paper.id,
                owner.id
            )));
        }
        self.papers.insert(paper.id, paper.clone());
        Ok(())
    }

    fn load_paper(&self, id: PaperId) -> StorageResult<Option<Paper>> {
        Ok(self.papers.get(&id).map(|r| r.clone()))
    }

    fn load_papers(&self, scope: PaperScope) -> StorageResult<Vec<Paper>> {
        Ok(match scope {
            PaperScope::Single(id) => self.papers.get(&id).map(|r| r.clone()).into_iter().collect(),
            PaperScope::WithGraphInputs => self
                .sorted_papers()
                .into_iter()
                .filter(Paper::has_graph_inputs)
                .collect(),
        })
    }

    fn resolve_external_ids(
        &self,
        ids: &[ExternalId],
    ) -> StorageResult<HashMap<ExternalId, PaperId>> {
        let wanted: std::collections::HashSet<&ExternalId> = ids.iter().collect();
        let mut resolved = HashMap::new();
        for paper in self.papers.iter() {
            for external in paper.external_ids() {
                if wanted.contains(&external) {
                    resolved.insert(external, paper.id);
                }
            }
        }
        Ok(resolved)
    }

    fn paper_summaries(&self, ids: &[PaperId]) -> StorageResult<Vec<PaperSummary>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.papers.get(id).map(|p| PaperSummary::from(p.value())))
            .collect())
    }

    fn insert_edges_if_absent(&self, batch: &[Edge]) -> StorageResult<usize> {
        self.batch_writes.fetch_add(1, Ordering::Relaxed);
        // refuse the whole batch before any edge lands, as a rolled-back
        // transaction would
        if let Some(reason) = batch.iter().find_map(|edge| edge.validate().err()) {
            return Err(StorageError::InvalidData(reason.to_string()));
        }

        let mut inserted = 0;
        for edge in batch {
            if let Entry::Vacant(slot) = self.edges.entry(edge.key()) {
                slot.insert(edge.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn edges_from(&self, id: PaperId) -> StorageResult<Vec<Edge>> {
        let mut edges: Vec<Edge> = self
            .edges
            .iter()
            .filter(|e| e.key().source == id)
            .map(|e| e.value().clone())
            .collect();
        edges.sort_by_key(|e| e.key());
        Ok(edges)
    }

    fn edge_count(&self) -> StorageResult<usize> {
        Ok(self.edges.len())
    }

    fn embedding(&self, id: PaperId) -> StorageResult<Option<Vec<f32>>> {
        Ok(self.papers.get(&id).and_then(|p| p.embedding.clone()))
    }

    fn rank_by_similarity(
        &self,
        query: &[f32],
        exclude: PaperId,
        limit: usize,
    ) -> StorageResult<Vec<ScoredPaper>> {
        let papers = self.sorted_papers();
        let candidates = papers.iter().filter_map(|p| {
            p.embedding
                .as_deref()
                .map(|embedding| (PaperSummary::from(p), embedding))
        });
        Ok(rank_by_cosine(query, candidates, exclude, limit))
    }

    fn cached_neighbors(&self, id: PaperId) -> StorageResult<Option<Vec<PaperId>>> {
        Ok(self.papers.get(&id).and_then(|p| p.cached_neighbor_ids.clone()))
    }

    fn write_cached_neighbors(&self, id: PaperId, neighbors: &[PaperId]) -> StorageResult<()> {
        match self.papers.get_mut(&id) {
            Some(mut paper) => {
                paper.cached_neighbor_ids = Some(neighbors.to_vec());
                Ok(())
            }
            None => Err(StorageError::PaperNotFound(id)),
        }
    }

    fn papers_missing_neighbor_cache(&self, limit: usize) -> StorageResult<Vec<PaperId>> {
        Ok(self
            .sorted_papers()
            .into_iter()
            .filter(|p| p.embedding.is_some() && p.cached_neighbor_ids.is_none())
            .map(|p| p.id)
            .take(limit)
            .collect())
    }

    fn embedded_paper_count(&self) -> StorageResult<usize> {
        Ok(self.papers.iter().filter(|p| p.embedding.is_some()).count())
    }
}
