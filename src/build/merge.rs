//! Chunked, idempotent persistence of candidate edge sets

use crate::graph::Edge;
use crate::storage::{RelationshipStore, StorageError};
use thiserror::Error;

/// Edges per store write unless configured otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Outcome of a bulk merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Edges handed to the merge
    pub submitted: usize,
    /// Edges refused locally (self-loops, out-of-range strength)
    pub rejected: usize,
    /// Edges the store did not already have
    pub inserted: usize,
    /// Batches committed
    pub batches: usize,
}

/// A batch failed; everything in `committed` is durable
#[derive(Debug, Error)]
#[error(
    "bulk merge stopped after {} committed batches ({} edges inserted): {source}",
    .committed.batches,
    .committed.inserted
)]
pub struct MergeError {
    pub committed: MergeReport,
    #[source]
    pub source: StorageError,
}

impl MergeError {
    /// Re-running the same merge is always safe; this says whether it is likely to help.
    pub fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// Insert every edge not yet in the store, `chunk_size` edges per write.
///
/// Each batch is its own store transaction. A failing batch stops the merge
/// without undoing the batches before it; calling again with the same edges
/// completes the remainder, since already-stored triples are skipped.
pub fn bulk_merge<S: RelationshipStore + ?Sized>(
    store: &S,
    edges: &[Edge],
    chunk_size: usize,
) -> Result<MergeReport, MergeError> {
    let mut report = MergeReport {
        submitted: edges.len(),
        ..MergeReport::default()
    };

    let valid: Vec<Edge> = edges
        .iter()
        .filter(|edge| match edge.validate() {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(
                    source = %edge.source,
                    target = %edge.target,
                    relationship = %edge.relationship,
                    %reason,
                    "rejecting edge before merge"
                );
                false
            }
        })
        .cloned()
        .collect();
    report.rejected = edges.len() - valid.len();

    for chunk in valid.chunks(chunk_size.max(1)) {
        match store.insert_edges_if_absent(chunk) {
            Ok(inserted) => {
                report.inserted += inserted;
                report.batches += 1;
                tracing::debug!(
                    batch = report.batches,
                    size = chunk.len(),
                    inserted,
                    "merged edge batch"
                );
            }
            Err(source) => {
                return Err(MergeError {
                    committed: report,
                    source,
                })
            }
        }
    }

    Ok(report)
}
