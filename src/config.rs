//! Compiled-in settings for both batch jobs.

/// Directory scanned for `*.csv` sources by the ingest binary.
pub const DATA_DIR: &str = "data";
/// DuckDB file shared by both jobs.
pub const DB_PATH: &str = "inventory.duckdb";
pub const INGEST_LOG: &str = "logs/data_ingestion.log";
pub const SUMMARY_LOG: &str = "logs/get_vendor_summary.log";

pub const DEFAULT_CHUNK_SIZE: usize = 100_000;
pub const SUMMARY_TABLE: &str = "VendorSalesSummary";
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    /// Rows per batch read from a source file.
    pub chunk_size: usize,
    /// Wrap all batch writes of one file in a single transaction.
    pub atomic_per_file: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            atomic_per_file: false,
        }
    }
}

impl IngestConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_atomic_per_file(mut self, atomic: bool) -> Self {
        self.atomic_per_file = atomic;
        self
    }
}

/// What a null in a text column of the summary becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextNullFill {
    /// Empty string.
    #[default]
    Empty,
    /// The literal `"0"`, matching a blanket zero-fill over every column.
    Zero,
}

impl TextNullFill {
    pub fn value(self) -> &'static str {
        match self {
            TextNullFill::Empty => "",
            TextNullFill::Zero => "0",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryConfig {
    pub output_table: String,
    pub text_nulls: TextNullFill,
    /// Rows of the raw summary echoed into the log before cleaning.
    pub preview_rows: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        SummaryConfig {
            output_table: SUMMARY_TABLE.to_string(),
            text_nulls: TextNullFill::default(),
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }
}

impl SummaryConfig {
    pub fn with_output_table(mut self, table: impl Into<String>) -> Self {
        self.output_table = table.into();
        self
    }

    pub fn with_text_nulls(mut self, fill: TextNullFill) -> Self {
        self.text_nulls = fill;
        self
    }

    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }
}
