//! Embedding similarity: cosine ranking, the cache-first resolver and the
//! neighbor-cache backfill job

mod backfill;
mod rank;
mod resolver;

pub use backfill::{backfill_neighbor_cache, BackfillOptions, BackfillReport};
pub use rank::{cosine_similarity, rank_by_cosine};
pub use resolver::{NeighborSource, Related, RelatedPaper, SimilarityResolver};
