//! Core paper graph data structures

mod edge;
mod normalize;
mod paper;


pub use edge::{Edge, EdgeKey, InvalidEdge, RelationshipType};
pub use normalize::{dedup_edges, normalize_edges, similarity_strength};
pub use paper::{
    parse_citation_list, parse_id_list, CitationRecord, ExternalId, Paper, PaperId, PaperSummary,
    RawCitation,
};
