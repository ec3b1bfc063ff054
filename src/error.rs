//! Error types for the snapshot engine

use std::path::PathBuf;

use thiserror::Error;

use crate::scan::ScanInventory;

/// Failure kinds surfaced by a scan
///
/// Everything here is fatal to the scan that produced it; benign conditions
/// (an entry vanishing mid-walk) are logged and skipped instead.
#[derive(Debug, Error)]
pub enum ScanError {
    /// File or directory could not be read or stat'ed
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External checksum tool missing, exited abnormally, or produced
    /// unusable output
    #[error("checksum tool {tool} failed on {path}: {reason}")]
    Tool {
        tool: PathBuf,
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The per-project ignore file exists but could not be parsed
    #[error("failed to parse ignore file {path}")]
    IgnoreFile {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },
}

/// A scan that aborted partway through.
///
/// Carries whatever records had been gathered before the failure so callers
/// can report precisely; the partial inventory is diagnostic only and must
/// not be treated as an authoritative snapshot.
#[derive(Debug, Error)]
#[error("scan aborted")]
pub struct ScanAborted {
    pub partial: ScanInventory,
    #[source]
    pub error: ScanError,
}

impl ScanAborted {
    pub fn new(error: ScanError, partial: ScanInventory) -> Self {
        Self { partial, error }
    }
}
