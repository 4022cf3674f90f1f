pub mod config;
pub mod duck;
pub mod error;
pub mod ingest;
pub mod summary;
pub mod telemetry;

pub use error::EtlError;
