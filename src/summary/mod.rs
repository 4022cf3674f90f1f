//! Stage two: aggregate the base tables into `VendorSalesSummary`.

pub mod clean;
pub mod query;

pub use query::{check_base_tables, VENDOR_SUMMARY_SQL};

use crate::config::SummaryConfig;
use crate::duck;
use anyhow::{Context, Result};
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use duckdb::Connection;
use std::time::{Duration, Instant};
use tracing::info;

/// Result set of the summary query, kept as Arrow batches in query order.
#[derive(Debug, Clone)]
pub struct SummaryFrame {
    pub schema: SchemaRef,
    pub batches: Vec<RecordBatch>,
}

impl SummaryFrame {
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    /// The first `n` rows, sliced across batch boundaries.
    pub fn head(&self, n: usize) -> Vec<RecordBatch> {
        let mut out = Vec::new();
        let mut remaining = n;
        for batch in &self.batches {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(batch.num_rows());
            out.push(batch.slice(0, take));
            remaining -= take;
        }
        out
    }

    pub fn preview(&self, n: usize) -> Result<String> {
        Ok(pretty_format_batches(&self.head(n))?.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct SummaryReport {
    pub table: String,
    pub rows: u64,
    pub elapsed: Duration,
}

/// Run the aggregation query and collect its batches.
pub fn create_vendor_summary(conn: &Connection) -> Result<SummaryFrame> {
    let mut stmt = conn
        .prepare(VENDOR_SUMMARY_SQL)
        .context("preparing vendor summary query")?;
    let result = stmt
        .query_arrow([])
        .context("running vendor summary query")?;
    let schema = result.get_schema();
    let batches: Vec<RecordBatch> = result.collect();
    Ok(SummaryFrame { schema, batches })
}

/// Coerce Volume, fill nulls, trim text and append the derived metrics.
pub fn clean_data(frame: SummaryFrame, config: &SummaryConfig) -> Result<SummaryFrame> {
    // an empty result still has to yield the cleaned column set
    let input = if frame.batches.is_empty() {
        vec![RecordBatch::new_empty(frame.schema.clone())]
    } else {
        frame.batches
    };

    let cleaned = input
        .iter()
        .map(|b| clean::clean_batch(b, config.text_nulls))
        .collect::<Result<Vec<_>>>()?;
    let schema = cleaned[0].schema();
    let batches = cleaned.into_iter().filter(|b| b.num_rows() > 0).collect();
    Ok(SummaryFrame { schema, batches })
}

/// Replace `table` with the frame's rows. Not atomic with the query that
/// produced them.
pub fn write_summary(conn: &Connection, table: &str, frame: &SummaryFrame) -> Result<u64> {
    duck::create_or_replace_table(conn, table, &frame.schema)?;
    let mut rows = 0u64;
    for batch in &frame.batches {
        rows += duck::append_batch(conn, table, batch.clone())? as u64;
    }
    Ok(rows)
}

/// Build and persist the vendor sales summary end to end.
pub fn build_vendor_summary(conn: &Connection, config: &SummaryConfig) -> Result<SummaryReport> {
    let start = Instant::now();
    check_base_tables(conn)?;

    info!("Creating Vendor Summary Table.....");
    let summary = create_vendor_summary(conn)?;
    info!(rows = summary.num_rows(), "Created Vendor Summary Table");
    if config.preview_rows > 0 {
        info!("\n{}", summary.preview(config.preview_rows)?);
    }

    info!("Cleaning Data......");
    let cleaned = clean_data(summary, config)?;
    info!("Cleaned Data");

    info!("Ingesting Data into DB......");
    let rows = write_summary(conn, &config.output_table, &cleaned)
        .with_context(|| format!("writing `{}`", config.output_table))?;
    let report = SummaryReport {
        table: config.output_table.clone(),
        rows,
        elapsed: start.elapsed(),
    };
    info!(table = %report.table, rows, elapsed = ?report.elapsed, "Ingested Data into DB");
    Ok(report)
}
