//! End-to-end graph builds against a SQLite database file

mod common;

use common::{citing_chain, random_corpus, TempDb};
use papergraph::{
    bulk_merge, similarity_strength, BuildScope, Edge, GraphBuilder, Paper, PaperId,
    RawCitation, RelationshipStore, RelationshipType,
};
use std::collections::{HashMap, HashSet};

fn id(n: i64) -> PaperId {
    PaperId::new(n)
}

#[test]
fn chain_corpus_builds_once() {
    let db = TempDb::new();
    let store = db.open();
    for paper in citing_chain(50) {
        store.save_paper(&paper).unwrap();
    }

    let builder = GraphBuilder::new(&store);
    let first = builder.build(BuildScope::Corpus).unwrap();
    assert_eq!(first.papers, 49);
    assert_eq!(first.inserted(), 49);

    let second = builder.build(BuildScope::Corpus).unwrap();
    assert_eq!(second.inserted(), 0);
    assert_eq!(store.edge_count().unwrap(), 49);

    assert_eq!(
        store.edges_from(id(7)).unwrap(),
        vec![Edge::cites(id(7), id(6))]
    );
}

#[test]
fn build_survives_reopening_the_database() {
    let db = TempDb::new();
    {
        let store = db.open();
        for paper in citing_chain(10) {
            store.save_paper(&paper).unwrap();
        }
        GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
    }

    let store = db.open();
    let rerun = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
    assert_eq!(rerun.inserted(), 0);
    assert_eq!(store.edge_count().unwrap(), 9);
}

/// Independently derive the expected stored edges for a corpus
fn expected_edges(papers: &[Paper]) -> HashMap<(i64, i64, RelationshipType), f32> {
    let by_arxiv: HashMap<String, i64> = papers
        .iter()
        .filter_map(|p| p.arxiv_id.clone().map(|a| (a, p.id.get())))
        .collect();
    let by_ss: HashMap<String, i64> = papers
        .iter()
        .filter_map(|p| p.ss_id.clone().map(|s| (s, p.id.get())))
        .collect();

    let mut expected = HashMap::new();
    for paper in papers {
        let source = paper.id.get();
        for citation in paper.raw_citations.iter().flatten() {
            let target = match citation {
                RawCitation::ExternalId(a) => by_arxiv.get(a).copied(),
                RawCitation::Record(r) => r
                    .arxiv_id
                    .as_ref()
                    .and_then(|a| by_arxiv.get(a).copied())
                    .or_else(|| r.ss_paper_id.as_ref().and_then(|s| by_ss.get(s).copied())),
            };
            if let Some(target) = target.filter(|&t| t != source) {
                expected
                    .entry((source, target, RelationshipType::Cites))
                    .or_insert(1.0);
            }
        }
        for (rank, target) in paper.similarity_candidates.iter().flatten().enumerate() {
            if target.get() != source {
                expected
                    .entry((source, target.get(), RelationshipType::Similar))
                    .or_insert(similarity_strength(rank));
            }
        }
    }
    expected
}

#[test]
fn random_corpora_match_independent_derivation() {
    for seed in [1_u64, 7, 42, 2024] {
        let db = TempDb::new();
        let store = db.open();
        let corpus = random_corpus(seed, 120);
        corpus.save_into(&store);

        let report = GraphBuilder::new(&store)
            .with_chunk_size(64)
            .build(BuildScope::Corpus)
            .unwrap();

        let expected = expected_edges(&corpus.papers);
        assert_eq!(report.citations_unresolved, corpus.dangling_citations, "seed {}", seed);
        assert_eq!(report.inserted(), expected.len(), "seed {}", seed);
        assert_eq!(store.edge_count().unwrap(), expected.len(), "seed {}", seed);

        let mut stored = HashSet::new();
        for paper in &corpus.papers {
            let edges = store.edges_from(paper.id).unwrap();
            let mut last_similar: Option<f32> = None;
            for edge in edges {
                assert!(!edge.is_self_loop(), "seed {}: self-loop on {}", seed, edge.source);
                let key = (edge.source.get(), edge.target.get(), edge.relationship);
                assert_eq!(expected.get(&key), Some(&edge.strength), "seed {}: {:?}", seed, key);
                // edges_from lists SIMILAR edges by descending strength
                if edge.relationship == RelationshipType::Similar {
                    assert!(last_similar.map_or(true, |s| s >= edge.strength));
                    last_similar = Some(edge.strength);
                }
                stored.insert(key);
            }
        }
        assert_eq!(stored.len(), expected.len());

        let rerun = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
        assert_eq!(rerun.inserted(), 0, "seed {}", seed);
    }
}

#[test]
fn dangling_citation_does_not_block_the_rest() {
    let db = TempDb::new();
    let store = db.open();
    store
        .save_paper(
            &Paper::new(1, "citing")
                .with_citations(vec![
                    RawCitation::ExternalId("2401.00002".into()),
                    RawCitation::ExternalId("does-not-exist".into()),
                    RawCitation::ExternalId("2401.00003".into()),
                ])
                .with_similarity_candidates([3, 2]),
        )
        .unwrap();
    store
        .save_paper(&Paper::new(2, "b").with_arxiv_id("2401.00002"))
        .unwrap();
    store
        .save_paper(&Paper::new(3, "c").with_arxiv_id("2401.00003"))
        .unwrap();

    let report = GraphBuilder::new(&store).build(BuildScope::Paper(id(1))).unwrap();
    assert_eq!(report.citations_unresolved, 1);
    assert_eq!(report.inserted(), 4);

    let edges = store.edges_from(id(1)).unwrap();
    assert!(edges.contains(&Edge::cites(id(1), id(2))));
    assert!(edges.contains(&Edge::cites(id(1), id(3))));
    assert!(edges.contains(&Edge::similar(id(1), id(3), 1.0)));
    assert!(edges.contains(&Edge::similar(id(1), id(2), 0.9)));
}

#[test]
fn single_paper_rebuild_adds_new_edges_and_keeps_old_ones() {
    let db = TempDb::new();
    let store = db.open();
    for n in 1..=4 {
        store.save_paper(&Paper::new(n, format!("p{}", n))).unwrap();
    }
    store
        .save_paper(&Paper::new(1, "p1").with_similarity_candidates([2, 3]))
        .unwrap();
    GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();

    // fresh candidates: 4 is new, 2 moved down a rank
    store
        .save_paper(&Paper::new(1, "p1").with_similarity_candidates([4, 2]))
        .unwrap();
    let report = GraphBuilder::new(&store).build(BuildScope::Paper(id(1))).unwrap();
    assert_eq!(report.inserted(), 1);

    let edges = store.edges_from(id(1)).unwrap();
    assert_eq!(edges.len(), 3);
    // first write wins: paper 2 keeps its earlier rank-0 strength
    assert!(edges.contains(&Edge::similar(id(1), id(2), 1.0)));
    assert!(edges.contains(&Edge::similar(id(1), id(4), 1.0)));
}

#[test]
fn twelve_hundred_edges_commit_in_three_batches() {
    let db = TempDb::new();
    let store = db.open();
    let edges: Vec<Edge> = (0..1_200_i64)
        .map(|i| Edge::similar(id(i / 40 + 1), id(10_000 + i), 0.5))
        .collect();

    let report = bulk_merge(&store, &edges, 500).unwrap();
    assert_eq!(report.batches, 3);
    assert_eq!(report.inserted, 1_200);

    let again = bulk_merge(&store, &edges, 500).unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(store.edge_count().unwrap(), 1_200);
}

#[test]
fn damaged_row_does_not_abort_corpus_build() {
    let db = TempDb::new();
    let store = db.open();
    store
        .save_paper(&Paper::new(1, "a").with_similarity_candidates([2]))
        .unwrap();
    store.save_paper(&Paper::new(2, "b")).unwrap();
    store
        .save_paper(&Paper::new(3, "c").with_similarity_candidates([1]))
        .unwrap();

    let raw = rusqlite::Connection::open(&db.path).unwrap();
    raw.execute(
        "UPDATE papers SET similarity_candidates_json = 'not json' WHERE id = 3",
        [],
    )
    .unwrap();

    let report = GraphBuilder::new(&store).build(BuildScope::Corpus).unwrap();
    assert_eq!(report.papers, 2);
    assert_eq!(report.inserted(), 1);
    assert_eq!(
        store.edges_from(id(1)).unwrap(),
        vec![Edge::similar(id(1), id(2), 1.0)]
    );
    assert!(store.edges_from(id(3)).unwrap().is_empty());
}
