//! Stage one: bulk-load raw CSV files into DuckDB tables, one bounded batch
//! at a time.

pub mod chunks;

pub use chunks::CsvChunks;

use crate::config::IngestConfig;
use crate::duck::{self, WriteMode};
use anyhow::{anyhow, Context, Result};
use duckdb::Connection;
use glob::glob;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// One source file and the table it is loaded into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub table: String,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        SourceFile {
            path: path.into(),
            table: table.into(),
        }
    }

    /// Map a file onto a table named after its stem (`sales.csv` → `sales`).
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let table = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("cannot derive a table name from {}", path.display()))?
            .to_string();
        Ok(SourceFile { path, table })
    }
}

/// Every `*.csv` directly inside `dir`, sorted by path.
pub fn discover_sources(dir: &Path) -> Result<Vec<SourceFile>> {
    if !dir.is_dir() {
        return Err(anyhow!("source directory {} does not exist", dir.display()));
    }
    let pattern = format!("{}/*.csv", dir.display());
    let mut paths: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    paths.into_iter().map(SourceFile::from_path).collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub table: String,
    pub rows: u64,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub files: Vec<FileStats>,
    pub elapsed: Duration,
}

impl IngestReport {
    pub fn total_rows(&self) -> u64 {
        self.files.iter().map(|f| f.rows).sum()
    }

    pub fn elapsed_minutes(&self) -> f64 {
        self.elapsed.as_secs_f64() / 60.0
    }
}

/// Load one CSV into `source.table`: the first batch replaces the table,
/// later batches append. With `atomic_per_file` all writes share one
/// transaction, otherwise a failure part way leaves the batches already
/// written in place.
#[tracing::instrument(level = "info", skip_all, fields(table = %source.table))]
pub fn ingest_file(conn: &Connection, source: &SourceFile, config: &IngestConfig) -> Result<FileStats> {
    info!(
        "Starting ingestion for {} in chunks of {}",
        source.path.display(),
        config.chunk_size
    );

    let load = || load_chunks(conn, source, config.chunk_size);
    let stats = if config.atomic_per_file {
        duck::in_transaction(conn, load)?
    } else {
        load()?
    };

    info!(rows = stats.rows, chunks = stats.chunks, "Completed ingestion for {}", source.path.display());
    Ok(stats)
}

fn load_chunks(conn: &Connection, source: &SourceFile, chunk_size: usize) -> Result<FileStats> {
    let chunks = CsvChunks::open(&source.path, chunk_size)?;
    let schema = chunks.schema();

    let mut stats = FileStats {
        table: source.table.clone(),
        rows: 0,
        chunks: 0,
    };

    for batch in chunks {
        let batch = batch?;
        let mode = if stats.chunks == 0 {
            WriteMode::Replace
        } else {
            WriteMode::Append
        };
        let rows = duck::write_batch(conn, &source.table, batch, mode)?;
        stats.chunks += 1;
        stats.rows += rows as u64;
        info!(rows, total = stats.rows, "Loaded chunk {} for {}", stats.chunks, source.path.display());
    }

    if stats.chunks == 0 {
        warn!("{} has a header but no rows", source.path.display());
        duck::create_or_replace_table(conn, &source.table, &schema)?;
    }

    Ok(stats)
}

/// Ingest every source in order. The first failure aborts the run; files
/// loaded before it stay in the database.
pub fn load_raw_data(
    conn: &Connection,
    sources: &[SourceFile],
    config: &IngestConfig,
) -> Result<IngestReport> {
    let start = Instant::now();
    let mut files = Vec::with_capacity(sources.len());

    for source in sources {
        let stats = ingest_file(conn, source, config).with_context(|| {
            format!("ingesting {} into `{}`", source.path.display(), source.table)
        })?;
        files.push(stats);
    }

    let report = IngestReport {
        files,
        elapsed: start.elapsed(),
    };
    info!("Ingestion Complete Successfully");
    info!(
        files = report.files.len(),
        rows = report.total_rows(),
        "Total ingestion time: {:.2} minutes",
        report.elapsed_minutes()
    );
    Ok(report)
}
