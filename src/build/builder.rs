//! Graph builder: one pass from stored papers to persisted edges
//!
//! A build selects papers, resolves every citation they carry in a single
//! bulk lookup, normalizes each paper's edges, aggregates them across the
//! whole selection and hands the result to one bulk merge. Nothing is kept
//! between invocations, so a failed run can simply be started again.

use super::merge::{bulk_merge, MergeError, MergeReport, DEFAULT_CHUNK_SIZE};
use super::resolve::IdentifierResolver;
use crate::graph::{dedup_edges, normalize_edges, PaperId};
use crate::storage::{PaperScope, RelationshipStore, StorageError};
use thiserror::Error;

/// Which papers to rebuild edges for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildScope {
    /// Exactly one paper, after its citations or candidates changed
    Paper(PaperId),
    /// Every paper with a citation list or similarity-candidate list
    Corpus,
}

impl From<BuildScope> for PaperScope {
    fn from(scope: BuildScope) -> Self {
        match scope {
            BuildScope::Paper(id) => PaperScope::Single(id),
            BuildScope::Corpus => PaperScope::WithGraphInputs,
        }
    }
}

/// Counts from one build pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Papers processed
    pub papers: usize,
    /// Citations that matched no known paper
    pub citations_unresolved: usize,
    /// Edges handed to the merge after cross-paper dedup
    pub candidate_edges: usize,
    pub merge: MergeReport,
}

impl BuildReport {
    /// Edges that did not exist before this pass
    pub fn inserted(&self) -> usize {
        self.merge.inserted
    }
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to load papers: {0}")]
    Load(#[source] StorageError),

    #[error("failed to resolve citations: {0}")]
    Resolve(#[source] StorageError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl BuildError {
    /// Whether re-running the whole build may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            BuildError::Load(e) | BuildError::Resolve(e) => e.is_retryable(),
            BuildError::Merge(e) => e.is_retryable(),
        }
    }
}

/// Derives and persists the relationship graph for a store
pub struct GraphBuilder<'a, S: ?Sized> {
    store: &'a S,
    chunk_size: usize,
}

impl<'a, S: RelationshipStore + ?Sized> GraphBuilder<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Run one build pass.
    ///
    /// An empty selection (no papers with graph inputs, or an unknown id in
    /// single-paper mode) is a successful pass that merges nothing.
    pub fn build(&self, scope: BuildScope) -> Result<BuildReport, BuildError> {
        let papers = self
            .store
            .load_papers(scope.into())
            .map_err(BuildError::Load)?;

        let citations = papers
            .iter()
            .filter_map(|paper| paper.raw_citations.as_deref())
            .flatten();
        let resolved = IdentifierResolver::new(self.store)
            .resolve_citations(citations)
            .map_err(BuildError::Resolve)?;

        let mut report = BuildReport {
            papers: papers.len(),
            ..BuildReport::default()
        };

        let mut per_paper = Vec::new();
        for paper in &papers {
            let citations = paper.raw_citations.as_deref().unwrap_or_default();
            let candidates = paper.similarity_candidates.as_deref().unwrap_or_default();

            let unresolved = citations
                .iter()
                .filter(|citation| resolved.lookup(citation).is_none())
                .count();
            if unresolved > 0 {
                tracing::debug!(paper = %paper.id, unresolved, "dropping unresolved citations");
            }
            report.citations_unresolved += unresolved;

            let edges = normalize_edges(paper.id, citations, candidates, |c| resolved.lookup(c));
            tracing::debug!(paper = %paper.id, edges = edges.len(), "normalized paper edges");
            per_paper.extend(edges);
        }

        let edges = dedup_edges(per_paper);
        report.candidate_edges = edges.len();
        report.merge = bulk_merge(self.store, &edges, self.chunk_size)?;

        tracing::info!(
            scope = ?scope,
            papers = report.papers,
            unresolved = report.citations_unresolved,
            candidates = report.candidate_edges,
            inserted = report.merge.inserted,
            batches = report.merge.batches,
            "graph build complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CitationRecord, Edge, Paper, RawCitation, RelationshipType};
    use crate::storage::testing::FlakyStore;
    use crate::storage::MemoryStore;

    fn id(n: i64) -> PaperId {
        PaperId::new(n)
    }

    fn arxiv(s: &str) -> RawCitation {
        RawCitation::ExternalId(s.to_string())
    }

    /// Three papers citing each other by arXiv id, plus similarity lists
    fn small_corpus(store: &impl RelationshipStore) {
        store
            .save_paper(
                &Paper::new(1, "Attention")
                    .with_arxiv_id("1706.03762")
                    .with_citations(vec![arxiv("1512.03385"), arxiv("0000.00000")])
                    .with_similarity_candidates([2, 1, 3]),
            )
            .unwrap();
        store
            .save_paper(
                &Paper::new(2, "ResNet")
                    .with_arxiv_id("1512.03385")
                    .with_citations(vec![RawCitation::Record(CitationRecord {
                        ss_paper_id: Some("ss-3".into()),
                        ..Default::default()
                    })]),
            )
            .unwrap();
        store
            .save_paper(&Paper::new(3, "Dropout").with_ss_id("ss-3"))
            .unwrap();
    }

    #[test]
    fn corpus_build_derives_citation_and_similarity_edges() {
        let store = MemoryStore::new();
        small_corpus(&store);

        let report = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();

        // paper 3 has no graph inputs
        assert_eq!(report.papers, 2);
        assert_eq!(report.citations_unresolved, 1);
        // 1 CITES 2, 1 SIMILAR 2, 1 SIMILAR 3, 2 CITES 3
        assert_eq!(report.inserted(), 4);

        let from_one = store.edges_from(id(1)).unwrap();
        let similar_three = from_one
            .iter()
            .find(|e| e.target == id(3) && e.relationship == RelationshipType::Similar)
            .unwrap();
        // the self entry at rank 1 still consumes its rank
        assert_eq!(similar_three.strength, 0.8);
        assert!(store
            .edges_from(id(2))
            .unwrap()
            .contains(&Edge::cites(id(2), id(3))));
    }

    #[test]
    fn second_build_inserts_nothing() {
        let store = MemoryStore::new();
        small_corpus(&store);
        let builder = GraphBuilder::new(&store);

        let first = builder.build(BuildScope::Corpus).unwrap();
        let second = builder.build(BuildScope::Corpus).unwrap();

        assert!(first.inserted() > 0);
        assert_eq!(second.inserted(), 0);
        assert_eq!(second.candidate_edges, first.candidate_edges);
        assert_eq!(store.edge_count().unwrap(), first.inserted());
    }

    #[test]
    fn empty_corpus_is_not_an_error() {
        let store = MemoryStore::new();
        let report = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
        assert_eq!(report, BuildReport::default());
        assert_eq!(store.batch_writes(), 0);
    }

    #[test]
    fn single_paper_mode_touches_only_that_paper() {
        let store = MemoryStore::new();
        small_corpus(&store);

        let report = GraphBuilder::new(&store)
            .build(BuildScope::Paper(id(2)))
            .unwrap();

        assert_eq!(report.papers, 1);
        assert_eq!(report.inserted(), 1);
        assert!(store.edges_from(id(1)).unwrap().is_empty());
    }

    #[test]
    fn unknown_single_paper_builds_nothing() {
        let store = MemoryStore::new();
        let report = GraphBuilder::new(&store)
            .build(BuildScope::Paper(id(42)))
            .unwrap();
        assert_eq!(report.papers, 0);
    }

    #[test]
    fn corpus_edges_go_through_one_chunked_merge() {
        let store = MemoryStore::new();
        for n in 1..=20 {
            store
                .save_paper(&Paper::new(n, format!("p{}", n)).with_similarity_candidates(1..=20))
                .unwrap();
        }

        // 20 papers x 19 non-self candidates
        let report = GraphBuilder::new(&store)
            .with_chunk_size(100)
            .build(BuildScope::Corpus)
            .unwrap();
        assert_eq!(report.candidate_edges, 380);
        assert_eq!(report.merge.batches, 4);
        assert_eq!(store.batch_writes(), 4);
    }

    #[test]
    fn store_failure_reports_committed_progress() {
        let flaky = FlakyStore::new().fail_edge_writes_after(1);
        for n in 1..=3 {
            flaky
                .save_paper(&Paper::new(n, "p").with_similarity_candidates(1..=3))
                .unwrap();
        }

        let err = GraphBuilder::new(&flaky)
            .with_chunk_size(2)
            .build(BuildScope::Corpus)
            .unwrap_err();
        assert!(err.is_retryable());
        match err {
            BuildError::Merge(merge) => assert_eq!(merge.committed.inserted, 2),
            other => panic!("unexpected error: {}", other),
        }

        let rerun = GraphBuilder::new(&flaky.inner)
            .build(BuildScope::Corpus)
            .unwrap();
        assert_eq!(rerun.inserted(), 4);
    }
}
