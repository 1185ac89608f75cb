//! Verification cache for copyverify.
//!
//! This module remembers, per project, which files have already been
//! content-verified so later runs can skip them without re-hashing.
//!
//! # Architecture
//!
//! * [`entry`]: The [`VerificationRecord`] model and its row encoding.
//! * [`store`]: CSV persistence, project file naming, storage location.
//! * [`database`]: The [`VerificationCache`] table with persist-on-write.
//!
//! # Cache Invalidation
//!
//! A record is trusted while the source file's fingerprint matches:
//! * File size
//! * Modification time, truncated to whole seconds
//!
//! If either changes, the file is re-verified. A content change that
//! preserves both is not noticed; that is the price of skipping the hash.
//! Only successful verifications are ever recorded.

pub mod database;
pub mod entry;
pub mod store;

use std::path::PathBuf;

pub use database::VerificationCache;
pub use entry::{RowError, VerificationRecord, CACHE_COLUMNS};
pub use store::{default_storage_dir, list_stores, store_file_name, CacheStore};

/// Errors raised by the cache and its store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing the store file failed.
    #[error("Cache I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Encoding a row failed.
    #[error("Cache encoding error for {path}: {source}")]
    Csv {
        /// Path being written
        path: PathBuf,
        /// The underlying CSV error
        #[source]
        source: csv::Error,
    },

    /// The project name cannot name a store.
    #[error("Invalid project name: '{0}'")]
    InvalidProjectName(String),

    /// No platform data directory could be determined.
    #[error("Failed to determine project directories")]
    NoProjectDirs,
}
