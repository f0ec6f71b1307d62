//! SQLite storage backend for the paper graph

use super::traits::{OpenStore, PaperScope, RelationshipStore, ScoredPaper, StorageError, StorageResult};
use crate::graph::{
    parse_citation_list, parse_id_list, Edge, ExternalId, Paper, PaperId, PaperSummary,
    RelationshipType,
};
use crate::similarity::rank_by_cosine;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Busy timeout used when the caller does not supply one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on bound parameters per `IN (...)` lookup
const LOOKUP_CHUNK: usize = 500;

const PAPER_COLUMNS: &str = "id, arxiv_id, ss_id, title, raw_citations_json, \
     similarity_candidates_json, embedding, cached_neighbor_ids_json";

/// SQLite-backed relationship store
///
/// Papers and relationships live in one database file. Thread-safe via an
/// internal mutex on the connection; separate `SqliteStore` handles (or
/// processes) on the same file are serialized by SQLite itself, waiting up
/// to the configured busy timeout before failing with a retryable error.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

/// Raw column values of one `papers` row
type PaperRow = (
    i64,
    Option<String>,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    Option<Vec<u8>>,
    Option<String>,
);

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Papers table: identity, ingestion outputs, embedding and neighbor cache
            CREATE TABLE IF NOT EXISTS papers (
                id INTEGER PRIMARY KEY,
                arxiv_id TEXT UNIQUE,
                ss_id TEXT UNIQUE,
                title TEXT NOT NULL DEFAULT '',
                raw_citations_json TEXT,
                similarity_candidates_json TEXT,
                embedding BLOB,
                cached_neighbor_ids_json TEXT
            );

            -- Relationships table: at most one row per (source, target, type)
            CREATE TABLE IF NOT EXISTS relationships (
                source_paper_id INTEGER NOT NULL,
                target_paper_id INTEGER NOT NULL,
                relationship_type TEXT NOT NULL CHECK (relationship_type IN ('CITES', 'SIMILAR')),
                strength REAL NOT NULL CHECK (strength >= 0.0 AND strength <= 1.0),
                created_at TEXT NOT NULL,
                PRIMARY KEY (source_paper_id, target_paper_id, relationship_type),
                CHECK (source_paper_id <> target_paper_id)
            );

            CREATE INDEX IF NOT EXISTS idx_relationships_target
                ON relationships(target_paper_id, relationship_type);

            -- WAL lets resolvers read while a builder writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection, timeout: Duration) -> StorageResult<Self> {
        conn.busy_timeout(timeout)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_paper(row: PaperRow) -> Paper {
        let (id, arxiv_id, ss_id, title, citations, candidates, embedding, cached) = row;
        let id = PaperId::new(id);
        Paper {
            id,
            arxiv_id,
            ss_id,
            title,
            raw_citations: citations
                .map(|json| parse_citation_list(&json_column(id, "raw_citations_json", &json))),
            similarity_candidates: candidates
                .map(|json| parse_id_list(&json_column(id, "similarity_candidates_json", &json))),
            embedding: embedding.and_then(|bytes| embedding_column(id, &bytes)),
            cached_neighbor_ids: cached
                .map(|json| parse_id_list(&json_column(id, "cached_neighbor_ids_json", &json))),
        }
    }

    fn read_paper_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PaperRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    /// Look up `(column value -> id)` for one external id column.
    fn lookup_column(
        conn: &Connection,
        column: &str,
        values: &[&str],
    ) -> StorageResult<Vec<(String, i64)>> {
        let mut found = Vec::new();
        for chunk in values.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT {col}, id FROM papers WHERE {col} IN ({})",
                placeholders,
                col = column
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                found.push(row?);
            }
        }
        Ok(found)
    }
}

/// Encode an embedding as little-endian `f32` bytes.
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> StorageResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(StorageError::InvalidData(format!(
            "embedding blob of {} bytes is not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Parse a stored JSON column; unreadable text counts as an empty value
/// so one damaged row cannot fail a whole corpus read.
fn json_column(id: PaperId, column: &str, json: &str) -> serde_json::Value {
    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::warn!(paper = %id, column, error = %e, "ignoring unparseable column");
        serde_json::Value::Null
    })
}

/// Decode a stored embedding, treating a damaged blob as missing
fn embedding_column(id: PaperId, bytes: &[u8]) -> Option<Vec<f32>> {
    decode_embedding(bytes)
        .map_err(|e| tracing::warn!(paper = %id, error = %e, "ignoring undecodable embedding"))
        .ok()
}

fn ids_to_json(ids: &[PaperId]) -> StorageResult<String> {
    Ok(serde_json::to_string(ids)?)
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>, timeout: Duration) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::from_connection(conn, timeout)
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, DEFAULT_TIMEOUT)
    }
}

impl RelationshipStore for SqliteStore {
    // === Paper Operations ===

    fn save_paper(&self, paper: &Paper) -> StorageResult<()> {
        let citations = paper
            .raw_citations
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let candidates = paper
            .similarity_candidates
            .as_deref()
            .map(ids_to_json)
            .transpose()?;
        let cached = paper
            .cached_neighbor_ids
            .as_deref()
            .map(ids_to_json)
            .transpose()?;
        let embedding = paper.embedding.as_deref().map(encode_embedding);

        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO papers (id, arxiv_id, ss_id, title, raw_citations_json,
                                similarity_candidates_json, embedding, cached_neighbor_ids_json)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                arxiv_id = excluded.arxiv_id,
                ss_id = excluded.ss_id,
                title = excluded.title,
                raw_citations_json = excluded.raw_citations_json,
                similarity_candidates_json = excluded.similarity_candidates_json,
                embedding = excluded.embedding,
                cached_neighbor_ids_json = excluded.cached_neighbor_ids_json
            "#,
            params![
                paper.id.get(),
                paper.arxiv_id,
                paper.ss_id,
                paper.title,
                citations,
                candidates,
                embedding,
                cached,
            ],
        )?;
        Ok(())
    }

    fn load_paper(&self, id: PaperId) -> StorageResult<Option<Paper>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM papers WHERE id = ?1", PAPER_COLUMNS),
                params![id.get()],
                Self::read_paper_row,
            )
            .optional()?;
        Ok(row.map(Self::row_to_paper))
    }

    fn load_papers(&self, scope: PaperScope) -> StorageResult<Vec<Paper>> {
        let conn = self.conn.lock().unwrap();
        let rows: Vec<PaperRow> = match scope {
            PaperScope::Single(id) => {
                let mut stmt =
                    conn.prepare(&format!("SELECT {} FROM papers WHERE id = ?1", PAPER_COLUMNS))?;
                let rows = stmt.query_map(params![id.get()], Self::read_paper_row)?;
                rows.collect::<Result<_, _>>()?
            }
            PaperScope::WithGraphInputs => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM papers
                     WHERE raw_citations_json IS NOT NULL OR similarity_candidates_json IS NOT NULL
                     ORDER BY id",
                    PAPER_COLUMNS
                ))?;
                let rows = stmt.query_map([], Self::read_paper_row)?;
                rows.collect::<Result<_, _>>()?
            }
        };
        Ok(rows.into_iter().map(Self::row_to_paper).collect())
    }

    fn resolve_external_ids(
        &self,
        ids: &[ExternalId],
    ) -> StorageResult<HashMap<ExternalId, PaperId>> {
        let mut arxiv = Vec::new();
        let mut semantic_scholar = Vec::new();
        for id in ids {
            match id {
                ExternalId::Arxiv(s) => arxiv.push(s.as_str()),
                ExternalId::SemanticScholar(s) => semantic_scholar.push(s.as_str()),
            }
        }

        let conn = self.conn.lock().unwrap();
        let mut resolved = HashMap::with_capacity(ids.len());
        for (value, id) in Self::lookup_column(&conn, "arxiv_id", &arxiv)? {
            resolved.insert(ExternalId::Arxiv(value), PaperId::new(id));
        }
        for (value, id) in Self::lookup_column(&conn, "ss_id", &semantic_scholar)? {
            resolved.insert(ExternalId::SemanticScholar(value), PaperId::new(id));
        }
        Ok(resolved)
    }

    fn paper_summaries(&self, ids: &[PaperId]) -> StorageResult<Vec<PaperSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut summaries = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT id, arxiv_id, title FROM papers WHERE id IN ({})",
                placeholders
            ))?;
            let rows = stmt.query_map(params_from_iter(chunk.iter().map(|id| id.get())), |row| {
                Ok(PaperSummary {
                    id: PaperId::new(row.get(0)?),
                    arxiv_id: row.get(1)?,
                    title: row.get(2)?,
                })
            })?;
            for row in rows {
                summaries.push(row?);
            }
        }
        Ok(summaries)
    }

    // === Edge Operations ===

    fn insert_edges_if_absent(&self, batch: &[Edge]) -> StorageResult<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().to_rfc3339();
        let mut conn = self.conn.lock().unwrap();
        // IMMEDIATE takes the write lock up front so concurrent writers wait
        // on the busy timeout instead of failing a lock upgrade mid-batch.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                r#"
                INSERT INTO relationships (source_paper_id, target_paper_id, relationship_type,
                                           strength, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(source_paper_id, target_paper_id, relationship_type) DO NOTHING
                "#,
            )?;
            for edge in batch {
                inserted += stmt.execute(params![
                    edge.source.get(),
                    edge.target.get(),
                    edge.relationship.as_str(),
                    edge.strength as f64,
                    created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn edges_from(&self, id: PaperId) -> StorageResult<Vec<Edge>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source_paper_id, target_paper_id, relationship_type, strength
             FROM relationships WHERE source_paper_id = ?1
             ORDER BY relationship_type, strength DESC, target_paper_id",
        )?;
        let rows = stmt.query_map(params![id.get()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;

        let mut edges = Vec::new();
        for row in rows {
            let (source, target, relationship, strength) = row?;
            let relationship: RelationshipType =
                relationship.parse().map_err(StorageError::InvalidData)?;
            edges.push(Edge::new(
                PaperId::new(source),
                PaperId::new(target),
                relationship,
                strength as f32,
            ));
        }
        Ok(edges)
    }

    fn edge_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM relationships", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // === Embedding & Neighbor Cache Operations ===

    fn embedding(&self, id: PaperId) -> StorageResult<Option<Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let blob: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT embedding FROM papers WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.flatten().and_then(|bytes| embedding_column(id, &bytes)))
    }

    fn rank_by_similarity(
        &self,
        query: &[f32],
        exclude: PaperId,
        limit: usize,
    ) -> StorageResult<Vec<ScoredPaper>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, arxiv_id, title, embedding FROM papers
             WHERE embedding IS NOT NULL AND id <> ?1",
        )?;
        let rows = stmt.query_map(params![exclude.get()], |row| {
            Ok((
                PaperSummary {
                    id: PaperId::new(row.get(0)?),
                    arxiv_id: row.get(1)?,
                    title: row.get(2)?,
                },
                row.get::<_, Vec<u8>>(3)?,
            ))
        })?;

        let mut candidates = Vec::new();
        for row in rows {
            let (summary, bytes) = row?;
            if let Some(embedding) = embedding_column(summary.id, &bytes) {
                candidates.push((summary, embedding));
            }
        }

        Ok(rank_by_cosine(
            query,
            candidates.iter().map(|(s, e)| (s.clone(), e.as_slice())),
            exclude,
            limit,
        ))
    }

    fn cached_neighbors(&self, id: PaperId) -> StorageResult<Option<Vec<PaperId>>> {
        let conn = self.conn.lock().unwrap();
        let json: Option<Option<String>> = conn
            .query_row(
                "SELECT cached_neighbor_ids_json FROM papers WHERE id = ?1",
                params![id.get()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json
            .flatten()
            .map(|json| parse_id_list(&json_column(id, "cached_neighbor_ids_json", &json))))
    }

    fn write_cached_neighbors(&self, id: PaperId, neighbors: &[PaperId]) -> StorageResult<()> {
        let json = ids_to_json(neighbors)?;
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE papers SET cached_neighbor_ids_json = ?2 WHERE id = ?1",
            params![id.get(), json],
        )?;
        if updated == 0 {
            return Err(StorageError::PaperNotFound(id));
        }
        Ok(())
    }

    fn papers_missing_neighbor_cache(&self, limit: usize) -> StorageResult<Vec<PaperId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM papers
             WHERE embedding IS NOT NULL AND cached_neighbor_ids_json IS NULL
             ORDER BY id LIMIT ?1",
        )?;
        let ids = stmt
            .query_map(params![limit as i64], |row| row.get::<_, i64>(0))?
            .map(|r| r.map(PaperId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn embedded_paper_count(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM papers WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
