//! Edge normalization: raw citation and similarity lists to canonical edges
//!
//! Pure functions, no I/O. Citation lookup is supplied by the caller so the
//! same code runs against a bulk-resolved id map or a test fixture.

use super::edge::{Edge, EdgeKey};
use super::paper::{PaperId, RawCitation};
use std::collections::HashSet;

/// Number of rank positions before similarity strength reaches zero
const SIMILARITY_DECAY_STEPS: usize = 10;

/// Strength of a similarity edge at `rank` (0-based): `max(0, 1 - 0.1 * rank)`.
pub fn similarity_strength(rank: usize) -> f32 {
    SIMILARITY_DECAY_STEPS.saturating_sub(rank) as f32 / SIMILARITY_DECAY_STEPS as f32
}

/// Derive the edge set for one paper.
///
/// Citations that `resolve` cannot map are dropped. Similarity candidates are
/// taken in the order given; they are never re-sorted. Self references never
/// produce an edge. When the same `(source, target, type)` appears twice the
/// first occurrence wins, so the lowest-rank similarity strength is kept.
pub fn normalize_edges<F>(
    source: PaperId,
    citations: &[RawCitation],
    similarity_candidates: &[PaperId],
    resolve: F,
) -> Vec<Edge>
where
    F: Fn(&RawCitation) -> Option<PaperId>,
{
    let mut seen: HashSet<EdgeKey> = HashSet::new();
    let mut edges = Vec::with_capacity(citations.len() + similarity_candidates.len());

    let citation_edges = citations
        .iter()
        .filter_map(|citation| resolve(citation))
        .map(|target| Edge::cites(source, target));

    let similarity_edges = similarity_candidates
        .iter()
        .enumerate()
        .map(|(rank, &target)| Edge::similar(source, target, similarity_strength(rank)));

    for edge in citation_edges.chain(similarity_edges) {
        if edge.is_self_loop() {
            continue;
        }
        if seen.insert(edge.key()) {
            edges.push(edge);
        }
    }

    edges
}

/// Concatenate per-paper edge sets, dropping repeated keys (first wins).
pub fn dedup_edges(edges: impl IntoIterator<Item = Edge>) -> Vec<Edge> {
    let mut seen: HashSet<EdgeKey> = HashSet::new();
    edges
        .into_iter()
        .filter(|edge| seen.insert(edge.key()))
        .collect()
}
