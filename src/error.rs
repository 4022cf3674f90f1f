use arrow::datatypes::DataType;
use std::path::PathBuf;
use thiserror::Error;

/// Input and data errors raised by the pipeline itself. Storage and I/O
/// failures travel as plain `anyhow` errors with context attached.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("source file {0} is empty (no header row)")]
    EmptySource(PathBuf),

    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error("required table `{0}` does not exist")]
    MissingTable(String),

    #[error("table `{table}` is missing required column `{column}`")]
    MissingColumn { table: String, column: String },

    #[error("column `{column}` has unsupported type {data_type} for null fill")]
    UnsupportedType { column: String, data_type: DataType },
}
