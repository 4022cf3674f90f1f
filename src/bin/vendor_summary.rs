use anyhow::Result;
use inventory_etl::config::{self, SummaryConfig};
use inventory_etl::telemetry::{run_logged, LogSink};
use inventory_etl::{duck, summary};
use std::path::Path;

fn main() -> Result<()> {
    let sink = LogSink::new(config::SUMMARY_LOG);
    run_logged(&sink, || {
        let conn = duck::open_disk_db(Path::new(config::DB_PATH))?;
        summary::build_vendor_summary(&conn, &SummaryConfig::default())?;
        Ok(())
    })
}
