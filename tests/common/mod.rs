//! Shared helpers for papergraph integration tests
//!
//! Stores are opened on a fresh temporary database file so each test sees
//! the real SQLite schema and transaction behavior.

pub mod corpus;

pub use corpus::{random_corpus, citing_chain, RandomCorpus};

use papergraph::{OpenStore, SqliteStore};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A temporary database directory; dropped with the test
pub struct TempDb {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("papergraph.db");
        Self { dir, path }
    }

    /// Open a new handle on the database file
    pub fn open(&self) -> SqliteStore {
        SqliteStore::open(&self.path, Duration::from_secs(10)).expect("open sqlite store")
    }
}
