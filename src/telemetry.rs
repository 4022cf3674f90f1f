use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

/// Where a job's log lines go and how verbose they are.
#[derive(Debug, Clone)]
pub struct LogSink {
    pub path: PathBuf,
    pub level: LevelFilter,
}

impl LogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LogSink {
            path: path.into(),
            level: LevelFilter::DEBUG,
        }
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    fn open(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening log file {}", self.path.display()))
    }

    /// Plain-text subscriber appending to the sink's file.
    pub fn subscriber(&self) -> Result<impl tracing::Subscriber + Send + Sync + 'static> {
        let file = self.open()?;
        let subscriber = fmt::Subscriber::builder()
            .with_env_filter(EnvFilter::new(self.level.to_string()))
            .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
            .with_target(false)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .finish();
        Ok(subscriber)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Run `job` with `sink` as the active subscriber for the current thread.
/// A failing job has its error chain logged before it is returned.
pub fn run_logged<T>(sink: &LogSink, job: impl FnOnce() -> Result<T>) -> Result<T> {
    let subscriber = sink.subscriber()?;
    tracing::subscriber::with_default(subscriber, || {
        let res = job();
        if let Err(e) = &res {
            error!("{:#}", e);
        }
        res
    })
}
