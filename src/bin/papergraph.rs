//! Papergraph CLI: build the paper relationship graph and query related papers.
//!
//! Usage:
//!   papergraph import <file> [--db path]
//!   papergraph build [--paper id] [--chunk-size n]
//!   papergraph related <id> [-k n]
//!   papergraph backfill [--limit n] [-k n] [--min-corpus n]

use clap::{Parser, Subcommand};
use papergraph::{
    backfill_neighbor_cache, BackfillOptions, BuildScope, Config, GraphBuilder, OpenStore, Paper,
    PaperId, Related, RelationshipStore, SimilarityResolver, SqliteStore,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Parser)]
#[command(
    name = "papergraph",
    version,
    about = "Citation and similarity graph for research papers"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Path to YAML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// More log output (repeatable)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Import papers from a JSON array of paper records
    Import {
        /// JSON file to read
        file: PathBuf,
    },
    /// Derive citation and similarity edges
    Build {
        /// Rebuild only this paper's edges
        #[arg(long)]
        paper: Option<i64>,
        /// Edges per store write
        #[arg(long)]
        chunk_size: Option<usize>,
    },
    /// List papers related to a paper
    Related {
        /// Internal paper id
        id: i64,
        /// Number of neighbors
        #[arg(short)]
        k: Option<usize>,
    },
    /// Fill the neighbor cache for embedded papers that lack one
    Backfill {
        /// Papers to process at most
        #[arg(long)]
        limit: Option<usize>,
        /// Neighbors cached per paper
        #[arg(short)]
        k: Option<usize>,
        /// Skip while fewer papers than this have an embedding
        #[arg(long)]
        min_corpus: Option<usize>,
    },
}

fn init_logging(config: &Config, verbose: u8, quiet: bool) {
    let level = if quiet {
        tracing::Level::ERROR
    } else {
        match verbose {
            0 => tracing::Level::from_str(&config.log.level).unwrap_or(tracing::Level::INFO),
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(config: &Config) -> Result<SqliteStore, String> {
    let path = config.store.resolved_path();
    SqliteStore::open(&path, config.store.timeout())
        .map_err(|e| format!("Failed to open database {}: {}", path.display(), e))
}

fn cmd_import(store: &SqliteStore, file: &Path) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    let papers: Vec<Paper> = match serde_json::from_str(&text) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: '{}' is not a JSON array of papers: {}", file.display(), e);
            return 1;
        }
    };

    for paper in &papers {
        if let Err(e) = store.save_paper(paper) {
            eprintln!("Error: failed to save paper {}: {}", paper.id, e);
            return 1;
        }
    }
    println!("Imported {} papers", papers.len());
    0
}

fn cmd_build(store: &SqliteStore, scope: BuildScope, chunk_size: usize) -> i32 {
    match GraphBuilder::new(store).with_chunk_size(chunk_size).build(scope) {
        Ok(report) => {
            println!(
                "Processed {} papers: {} candidate edges, {} inserted in {} batches ({} unresolved citations, {} rejected)",
                report.papers,
                report.candidate_edges,
                report.merge.inserted,
                report.merge.batches,
                report.citations_unresolved,
                report.merge.rejected,
            );
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_retryable() {
                eprintln!("The store was busy; re-running the build is safe.");
            }
            1
        }
    }
}

fn cmd_related(store: &SqliteStore, id: PaperId, k: usize) -> i32 {
    let related = match SimilarityResolver::new(store).resolve(id, k) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Related::NoEmbedding = related {
        println!("No embedding yet for paper {}", id);
        return 0;
    }
    if related.papers().is_empty() {
        println!("No related papers found for paper {}", id);
        return 0;
    }

    println!("{:>8}  {:<12}  {:>6}  {:<8}  TITLE", "ID", "ARXIV", "SCORE", "SOURCE");
    for paper in related.papers() {
        let score = paper
            .score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>8}  {:<12}  {:>6}  {:<8}  {}",
            paper.id,
            paper.arxiv_id.as_deref().unwrap_or("-"),
            score,
            paper.source,
            paper.title
        );
    }
    if let Related::Computed {
        cache_written: false,
        ..
    } = related
    {
        eprintln!("Warning: neighbor cache was not updated");
    }
    0
}

fn cmd_backfill(store: &SqliteStore, options: BackfillOptions) -> i32 {
    match backfill_neighbor_cache(store, options) {
        Ok(report) if report.gated => {
            println!(
                "Corpus has fewer than {} embedded papers; nothing to do",
                options.min_corpus_size.unwrap_or_default()
            );
            0
        }
        Ok(report) => {
            println!(
                "Backfilled {} of {} papers ({} with no neighbors, {} failed)",
                report.backfilled, report.candidates, report.skipped_empty, report.failed
            );
            if report.failed > 0 {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(db) = cli.db {
        config.store.path = Some(db);
    }
    init_logging(&config, cli.verbose, cli.quiet);

    let store = match open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Import { file } => cmd_import(&store, &file),
        Commands::Build { paper, chunk_size } => {
            let scope = paper
                .map(|id| BuildScope::Paper(PaperId::new(id)))
                .unwrap_or(BuildScope::Corpus);
            cmd_build(&store, scope, chunk_size.unwrap_or(config.build.chunk_size))
        }
        Commands::Related { id, k } => {
            cmd_related(&store, PaperId::new(id), k.unwrap_or(config.similarity.k))
        }
        Commands::Backfill {
            limit,
            k,
            min_corpus,
        } => cmd_backfill(
            &store,
            BackfillOptions {
                limit: limit.unwrap_or(config.similarity.backfill_limit),
                k: k.unwrap_or(config.similarity.k),
                min_corpus_size: min_corpus.or(config.similarity.min_corpus_size),
            },
        ),
    };
    std::process::exit(code);
}
