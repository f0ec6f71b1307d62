//! Cosine ranking shared by the store backends

use crate::graph::{PaperId, PaperSummary};
use crate::storage::ScoredPaper;
use std::cmp::Ordering;

/// Cosine similarity between two vectors.
///
/// Embeddings are expected L2-normalized, but the full formula is used so
/// that un-normalized input still ranks correctly. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank candidates against `query`: best score first, ties by ascending id.
///
/// `exclude` (the query paper) never appears in the output, nor does any
/// candidate whose embedding dimension differs from the query's.
pub fn rank_by_cosine<'a, I>(
    query: &[f32],
    candidates: I,
    exclude: PaperId,
    limit: usize,
) -> Vec<ScoredPaper>
where
    I: IntoIterator<Item = (PaperSummary, &'a [f32])>,
{
    if limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<ScoredPaper> = candidates
        .into_iter()
        .filter(|(paper, embedding)| paper.id != exclude && embedding.len() == query.len())
        .map(|(paper, embedding)| ScoredPaper {
            score: cosine_similarity(query, embedding),
            paper,
        })
        .filter(|scored| !scored.score.is_nan())
        .collect();

    scored.sort_by(compare_scored);
    scored.truncate(limit);
    scored
}

fn compare_scored(a: &ScoredPaper, b: &ScoredPaper) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.paper.id.cmp(&b.paper.id))
}
