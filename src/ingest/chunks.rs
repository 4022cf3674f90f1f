use crate::error::EtlError;
use anyhow::{Context, Result};
use arrow::csv::reader::{Format, Reader};
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::Seek;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Collapse an inferred CSV type onto the four column kinds we store:
/// BIGINT, DOUBLE, BOOLEAN and text. Dates, timestamps and all-empty
/// columns stay text.
pub fn normalize_type(dt: &DataType) -> DataType {
    match dt {
        DataType::Int64 | DataType::Float64 | DataType::Boolean => dt.clone(),
        _ => DataType::Utf8,
    }
}

pub fn normalize_schema(inferred: &ArrowSchema) -> ArrowSchema {
    let fields: Vec<Field> = inferred
        .fields()
        .iter()
        .map(|f| Field::new(f.name(), normalize_type(f.data_type()), true))
        .collect();
    ArrowSchema::new(fields)
}

/// A CSV file read as a sequence of record batches of at most `chunk_size`
/// rows. The schema is inferred once from the first `chunk_size` data rows
/// and applied to every later batch unchanged.
pub struct CsvChunks {
    path: PathBuf,
    schema: SchemaRef,
    reader: Reader<File>,
}

impl CsvChunks {
    pub fn open(path: &Path, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EtlError::InvalidChunkSize.into());
        }

        let mut file =
            File::open(path).with_context(|| format!("opening {}", path.display()))?;

        let format = Format::default().with_header(true);
        let (inferred, sampled) = format
            .infer_schema(&mut file, Some(chunk_size))
            .with_context(|| format!("inferring schema of {}", path.display()))?;
        if inferred.fields().is_empty() {
            return Err(EtlError::EmptySource(path.to_path_buf()).into());
        }
        debug!(path = %path.display(), sampled, "inferred schema: {:?}", inferred);

        file.rewind()
            .with_context(|| format!("rewinding {}", path.display()))?;

        let schema = Arc::new(normalize_schema(&inferred));
        let reader = ReaderBuilder::new(schema.clone())
            .with_header(true)
            .with_batch_size(chunk_size)
            .build(file)
            .with_context(|| format!("creating CSV reader for {}", path.display()))?;

        Ok(CsvChunks {
            path: path.to_path_buf(),
            schema,
            reader,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl Iterator for CsvChunks {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = &self.path;
        self.reader
            .next()
            .map(|res| res.with_context(|| format!("CSV parse error in {}", path.display())))
    }
}
