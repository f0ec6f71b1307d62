//! Synthetic paper corpora
//!
//! Random corpora are generated from a seeded `StdRng` so a failing case can
//! be replayed exactly.

use papergraph::{CitationRecord, Paper, RawCitation, RelationshipStore};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// arXiv id assigned to synthetic paper `n`
pub fn arxiv_id(n: i64) -> String {
    format!("2401.{:05}", n)
}

/// Papers 1..=n where each paper cites its predecessor by arXiv id
pub fn citing_chain(n: i64) -> Vec<Paper> {
    (1..=n)
        .map(|i| {
            let paper = Paper::new(i, format!("paper {}", i)).with_arxiv_id(arxiv_id(i));
            if i > 1 {
                paper.with_citations(vec![RawCitation::ExternalId(arxiv_id(i - 1))])
            } else {
                paper
            }
        })
        .collect()
}

/// A seeded random corpus and the counts needed to check a build against it
pub struct RandomCorpus {
    pub papers: Vec<Paper>,
    /// Citations pointing outside the corpus
    pub dangling_citations: usize,
}

impl RandomCorpus {
    pub fn save_into(&self, store: &impl RelationshipStore) {
        for paper in &self.papers {
            store.save_paper(paper).expect("save paper");
        }
    }
}

/// `size` papers with random citations (some dangling, some structured,
/// some self-referencing) and random similarity-candidate lists, possibly
/// containing the paper itself and repeated ids.
pub fn random_corpus(seed: u64, size: i64) -> RandomCorpus {
    let mut rng = StdRng::seed_from_u64(seed);
    let ids: Vec<i64> = (1..=size).collect();
    let mut dangling_citations = 0;

    let papers = ids
        .iter()
        .map(|&i| {
            let mut paper = Paper::new(i, format!("paper {}", i))
                .with_arxiv_id(arxiv_id(i))
                .with_ss_id(format!("ss-{}", i));

            if rng.gen_bool(0.8) {
                let citations = (0..rng.gen_range(0..8))
                    .map(|_| {
                        if rng.gen_bool(0.15) {
                            dangling_citations += 1;
                            RawCitation::ExternalId(format!("9999.{:05}", rng.gen_range(0..100_000)))
                        } else {
                            let target = rng.gen_range(1..=size);
                            if rng.gen_bool(0.5) {
                                RawCitation::ExternalId(arxiv_id(target))
                            } else {
                                RawCitation::Record(CitationRecord {
                                    title: Some(format!("paper {}", target)),
                                    ss_paper_id: Some(format!("ss-{}", target)),
                                    ..Default::default()
                                })
                            }
                        }
                    })
                    .collect();
                paper = paper.with_citations(citations);
            }

            if rng.gen_bool(0.7) {
                let len = rng.gen_range(0..15);
                let candidates: Vec<i64> = (0..len)
                    .map(|_| *ids.choose(&mut rng).unwrap_or(&i))
                    .collect();
                paper = paper.with_similarity_candidates(candidates);
            }

            paper
        })
        .collect();

    RandomCorpus {
        papers,
        dangling_citations,
    }
}
