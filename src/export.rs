// src/export.rs
//! Append-only CSV store of discovered listings.

use crate::types::JobListing;
use chrono::Local;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};
use thiserror::Error;

pub const DEFAULT_EXPORT_PATH: &str = "job_listings.csv";
pub const HEADER: [&str; 4] = ["Job Title", "Job URL", "Location", "Date Scraped"];
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One append lock per store path for the whole process.
static STORE_LOCKS: LazyLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = LazyLock::new(Default::default);

/// Paths are keyed as given, so `./a.csv` and `a.csv` get separate locks.
fn store_lock(path: &Path) -> Arc<Mutex<()>> {
    let mut locks = STORE_LOCKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to flush {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportSummary {
    NothingToSave,
    Appended { rows: usize },
}

/// Every exporter on the same path shares one lock, so sessions running side
/// by side never interleave rows. `export` blocks on file I/O; async callers
/// run it on the blocking pool.
#[derive(Debug, Clone)]
pub struct ResultsExporter {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl Default for ResultsExporter {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_PATH)
    }
}

impl ResultsExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            lock: store_lock(&path),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row per listing, writing the header first if the store is new.
    pub fn export(&self, listings: &[JobListing], location: &str) -> Result<ExportSummary, ExportError> {
        if listings.is_empty() {
            app_log!(info, "No listings to save to {}", self.path.display());
            return Ok(ExportSummary::NothingToSave);
        }

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let needs_header = std::fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| ExportError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        let write_err = |source| ExportError::Write {
            path: self.path.clone(),
            source,
        };
        if needs_header {
            writer.write_record(HEADER).map_err(write_err)?;
        }
        for listing in listings {
            let scraped = listing.discovered_at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string();
            writer
                .write_record([listing.title.as_str(), listing.link.as_str(), location, scraped.as_str()])
                .map_err(write_err)?;
        }
        writer.flush().map_err(|source| ExportError::Flush {
            path: self.path.clone(),
            source,
        })?;

        app_log!(info, "Appended {} listing(s) to {}", listings.len(), self.path.display());
        Ok(ExportSummary::Appended { rows: listings.len() })
    }
}
