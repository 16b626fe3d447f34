// src/config/options.rs
use std::path::PathBuf;
use std::time::Duration;

use super::consts::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppOptions {
    pub scrape: ScrapeOptions,
    pub export: ExportOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            scrape: ScrapeOptions::default(),
            export: ExportOptions::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Directory page listing the dated events.
    pub directory_url: String,
    pub workers: usize,
    /// Deterministic serial mode: one worker, submission order.
    pub single_thread: bool,
    /// Minimum spacing between request dispatches (shared across workers).
    pub min_request_interval: Duration,
    pub timeout: Duration,
    /// Restrict discovery to the scheduled release days (10/14/15/25,
    /// end of month, day before).
    pub target_dates_only: bool,
    /// Resume from a cached scan instead of re-fetching the directory page.
    pub session: Option<String>,
    /// Cache fresh scans for later resume.
    pub use_cache: bool,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            directory_url: s!(),
            workers: WORKERS,
            single_thread: false,
            min_request_interval: Duration::from_millis(REQUEST_PAUSE_MS),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            target_dates_only: false,
            session: None,
            use_cache: true,
        }
    }
}

impl ScrapeOptions {
    /// Worker count the pool should actually use.
    pub fn effective_workers(&self) -> usize {
        if self.single_thread { 1 } else { self.workers.max(1) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    /// Filename prefix; the timestamp and `.xlsx` are appended.
    pub prefix: String,
    /// Existing workbook whose first row dictates column order.
    pub template: Option<PathBuf>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            prefix: s!(EXPORT_PREFIX),
            template: None,
        }
    }
}
