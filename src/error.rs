// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Error kinds for the scrape pipeline.
///
/// Per-item errors (`NotFound`, `Parse`, most `Network`) are recorded and
/// surfaced in the run summary; they never abort a run. Only a failure to
/// fetch the directory page itself, or to write the export file, is fatal.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Connection failure or timeout. Retryable by the caller.
    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    /// HTTP 404 or otherwise removed page. Expected for delisted cards;
    /// logged as a skip, never retried.
    #[error("page not found: {url}")]
    NotFound { url: String },

    /// Page fetched but the expected structure is absent.
    #[error("unrecognized page structure at {url}: {reason}")]
    Parse { url: String, reason: String },

    /// Export or cache write failure. Fatal to the run.
    #[error("i/o error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScrapeError {
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network { url: url.into(), reason: reason.into() }
    }

    pub fn not_found(url: impl Into<String>) -> Self {
        Self::NotFound { url: url.into() }
    }

    pub fn parse(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse { url: url.into(), reason: reason.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
