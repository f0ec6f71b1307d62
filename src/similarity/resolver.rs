//! Cache-first "related papers" lookup
//!
//! A paper's cached neighbor list is served as-is, in cached order. Without
//! a usable cache the neighbors are ranked by embedding similarity and the
//! ranking is written back so the next lookup is a cache hit. The write-back
//! is best-effort: a failure there is logged and the computed answer is
//! still returned.

use crate::graph::{PaperId, PaperSummary};
use crate::storage::{RelationshipStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Where a neighbor record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborSource {
    Cache,
    Fallback,
}

impl fmt::Display for NeighborSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeighborSource::Cache => write!(f, "cache"),
            NeighborSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// One neighbor of the queried paper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedPaper {
    pub id: PaperId,
    pub arxiv_id: Option<String>,
    pub title: String,
    /// Cosine score, known only for freshly computed neighbors
    pub score: Option<f32>,
    pub source: NeighborSource,
}

impl RelatedPaper {
    fn cached(summary: PaperSummary) -> Self {
        Self {
            id: summary.id,
            arxiv_id: summary.arxiv_id,
            title: summary.title,
            score: None,
            source: NeighborSource::Cache,
        }
    }

    fn computed(summary: PaperSummary, score: f32) -> Self {
        Self {
            id: summary.id,
            arxiv_id: summary.arxiv_id,
            title: summary.title,
            score: Some(score),
            source: NeighborSource::Fallback,
        }
    }
}

/// Result of a related-papers lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Related {
    /// Served from the paper's cached neighbor list
    Cached(Vec<RelatedPaper>),
    /// Ranked on demand; `cache_written` tells whether the write-back landed
    Computed {
        papers: Vec<RelatedPaper>,
        cache_written: bool,
    },
    /// No cache and the paper has no embedding to rank against
    NoEmbedding,
}

impl Related {
    pub fn papers(&self) -> &[RelatedPaper] {
        match self {
            Related::Cached(papers) | Related::Computed { papers, .. } => papers,
            Related::NoEmbedding => &[],
        }
    }

    pub fn into_papers(self) -> Vec<RelatedPaper> {
        match self {
            Related::Cached(papers) | Related::Computed { papers, .. } => papers,
            Related::NoEmbedding => Vec::new(),
        }
    }

    pub fn is_no_embedding(&self) -> bool {
        matches!(self, Related::NoEmbedding)
    }
}

/// Read-through neighbor cache over a relationship store
pub struct SimilarityResolver<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: RelationshipStore + ?Sized> SimilarityResolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Up to `k` papers related to `paper_id`.
    ///
    /// Store failures on the read path are returned; only the cache
    /// write-back is allowed to fail silently.
    pub fn resolve(&self, paper_id: PaperId, k: usize) -> StorageResult<Related> {
        if let Some(cached) = self.store.cached_neighbors(paper_id)? {
            if !cached.is_empty() {
                let papers = self.hydrate(&cached[..cached.len().min(k)])?;
                tracing::debug!(paper = %paper_id, served = papers.len(), "neighbor cache hit");
                return Ok(Related::Cached(papers));
            }
        }

        let Some(embedding) = self.store.embedding(paper_id)? else {
            tracing::debug!(paper = %paper_id, "no embedding yet");
            return Ok(Related::NoEmbedding);
        };

        let ranked = self.store.rank_by_similarity(&embedding, paper_id, k)?;
        let papers: Vec<RelatedPaper> = ranked
            .into_iter()
            .map(|scored| RelatedPaper::computed(scored.paper, scored.score))
            .collect();

        let cache_written = !papers.is_empty() && self.write_back(paper_id, &papers);
        tracing::debug!(
            paper = %paper_id,
            computed = papers.len(),
            cache_written,
            "neighbor cache miss"
        );
        Ok(Related::Computed {
            papers,
            cache_written,
        })
    }

    /// Display records for `ids`, in the given order, skipping ids that no
    /// longer resolve to a paper.
    fn hydrate(&self, ids: &[PaperId]) -> StorageResult<Vec<RelatedPaper>> {
        let mut by_id: HashMap<PaperId, PaperSummary> = self
            .store
            .paper_summaries(ids)?
            .into_iter()
            .map(|summary| (summary.id, summary))
            .collect();

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(RelatedPaper::cached)
            .collect())
    }

    fn write_back(&self, paper_id: PaperId, papers: &[RelatedPaper]) -> bool {
        let ids: Vec<PaperId> = papers.iter().map(|p| p.id).collect();
        match self.store.write_cached_neighbors(paper_id, &ids) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(paper = %paper_id, error = %e, "neighbor cache write-back failed");
                false
            }
        }
    }
}
