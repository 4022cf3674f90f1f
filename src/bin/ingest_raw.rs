use anyhow::Result;
use inventory_etl::config::{self, IngestConfig};
use inventory_etl::telemetry::{run_logged, LogSink};
use inventory_etl::{duck, ingest};
use std::path::Path;

fn main() -> Result<()> {
    let sink = LogSink::new(config::INGEST_LOG);
    run_logged(&sink, || {
        let conn = duck::open_disk_db(Path::new(config::DB_PATH))?;
        let sources = ingest::discover_sources(Path::new(config::DATA_DIR))?;
        ingest::load_raw_data(&conn, &sources, &IngestConfig::default())?;
        Ok(())
    })
}
