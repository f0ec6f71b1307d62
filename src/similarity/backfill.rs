//! Offline neighbor-cache backfill
//!
//! Fills `cached_neighbor_ids` for papers that already have an embedding but
//! were never looked up, so the first on-demand lookup is a cache hit.
//!
//! A paper whose ranking comes back empty gets an empty cached list. The
//! resolver treats that as no cache and ranks again on demand, while later
//! backfill runs move past it instead of selecting it again.

use crate::graph::PaperId;
use crate::storage::{RelationshipStore, StorageResult};

/// Knobs for one backfill run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillOptions {
    /// Papers to process at most
    pub limit: usize,
    /// Neighbors cached per paper
    pub k: usize,
    /// Skip the run while fewer papers than this have an embedding
    pub min_corpus_size: Option<usize>,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            limit: 200,
            k: 10,
            min_corpus_size: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Papers selected for backfill
    pub candidates: usize,
    pub backfilled: usize,
    /// Papers whose ranking came back empty; marked with an empty list
    pub skipped_empty: usize,
    pub failed: usize,
    /// Set when `min_corpus_size` held the run back
    pub gated: bool,
}

/// Compute and cache top-k neighbors for papers missing a cache entry.
///
/// Selecting candidates and counting the corpus are the only failures that
/// abort the run; a failure on one paper is logged and counted.
pub fn backfill_neighbor_cache<S: RelationshipStore + ?Sized>(
    store: &S,
    options: BackfillOptions,
) -> StorageResult<BackfillReport> {
    if let Some(min) = options.min_corpus_size {
        let embedded = store.embedded_paper_count()?;
        if embedded < min {
            tracing::info!(embedded, min, "corpus too small, skipping neighbor backfill");
            return Ok(BackfillReport {
                gated: true,
                ..BackfillReport::default()
            });
        }
    }

    if options.k == 0 {
        return Ok(BackfillReport::default());
    }

    let ids = store.papers_missing_neighbor_cache(options.limit)?;
    let mut report = BackfillReport {
        candidates: ids.len(),
        ..BackfillReport::default()
    };

    for id in ids {
        match backfill_one(store, id, options.k) {
            Ok(0) => report.skipped_empty += 1,
            Ok(_) => report.backfilled += 1,
            Err(e) => {
                tracing::warn!(paper = %id, error = %e, "neighbor backfill failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        candidates = report.candidates,
        backfilled = report.backfilled,
        skipped_empty = report.skipped_empty,
        failed = report.failed,
        "neighbor backfill complete"
    );
    Ok(report)
}

fn backfill_one<S: RelationshipStore + ?Sized>(
    store: &S,
    id: PaperId,
    k: usize,
) -> StorageResult<usize> {
    let neighbors: Vec<PaperId> = match store.embedding(id)? {
        Some(embedding) => store
            .rank_by_similarity(&embedding, id, k)?
            .into_iter()
            .map(|scored| scored.paper.id)
            .collect(),
        None => Vec::new(),
    };
    if neighbors.is_empty() {
        store.write_cached_neighbors(id, &[])?;
        return Ok(0);
    }
    store.write_cached_neighbors(id, &neighbors)?;
    tracing::debug!(paper = %id, neighbors = neighbors.len(), "backfilled neighbor cache");
    Ok(neighbors.len())
}
