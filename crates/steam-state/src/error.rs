//! Error surface for state persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while persisting state records.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The parent directory could not be created.
    #[error("failed to prepare state directory '{path}': {source}")]
    Directory {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading the record failed for a reason other than absence.
    #[error("failed to read '{path}': {source}")]
    Read {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The record on disk is not valid JSON for the expected type.
    #[error("failed to parse '{path}': {source}")]
    Parse {
        /// File holding the malformed record.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising the record failed.
    #[error("failed to serialise record for '{path}': {source}")]
    Serialise {
        /// Destination file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing the record failed.
    #[error("failed to write '{path}': {source}")]
    Write {
        /// Destination file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing the record failed.
    #[error("failed to remove '{path}': {source}")]
    Remove {
        /// File that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
