//! Scanner module for source tree enumeration and content hashing.
//!
//! This module provides functionality for:
//! - Sorted, single-threaded directory walking using walkdir
//! - Content hashing with BLAKE3
//! - Relative path rendering for cache keys (exact, `/`-separated)
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Source tree traversal producing [`SourceFileEntry`] values
//! - [`hasher`]: BLAKE3 file hashing (streaming or memory-mapped)
//! - [`path_utils`]: Root stripping and cache key rendering
//!
//! # Example
//!
//! ```no_run
//! use copyverify::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/data/source"));
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.relative_path, file.fingerprint.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hasher;
pub mod path_utils;
pub mod walker;

use std::fs::Metadata;
use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

// Re-export main types
pub use hasher::{hash_to_hex, hex_to_hash, ContentHasher, Hash, Hasher};
pub use walker::Walker;

/// Cheap proxy for "file unchanged": size plus whole-second modification time.
///
/// Two fingerprints are equal only when both fields match exactly. Equality
/// is coarser than content equality: a file rewritten with the same size
/// within the same second compares equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileFingerprint {
    /// File size in bytes
    pub size: u64,
    /// Last modification time, truncated to whole seconds
    pub modified_at: DateTime<Utc>,
}

impl FileFingerprint {
    /// Create a fingerprint, truncating `modified` to second resolution.
    #[must_use]
    pub fn new(size: u64, modified: SystemTime) -> Self {
        let modified_at: DateTime<Utc> = modified.into();
        Self::from_datetime(size, modified_at)
    }

    /// Create a fingerprint from an already-converted timestamp.
    #[must_use]
    pub fn from_datetime(size: u64, modified_at: DateTime<Utc>) -> Self {
        Self {
            size,
            modified_at: modified_at.trunc_subsecs(0),
        }
    }

    /// Build a fingerprint from filesystem metadata.
    ///
    /// Platforms that cannot report a modification time fall back to the
    /// Unix epoch, which still yields a stable fingerprint across runs.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        Self::new(metadata.len(), modified)
    }
}

/// A regular file discovered under the source root.
///
/// Produced by the [`Walker`]; lives for a single enumeration pass.
#[derive(Debug, Clone)]
pub struct SourceFileEntry {
    /// Path relative to the source root, `/`-separated, for messages
    pub relative_path: String,
    /// Exact cache key; `None` when the path is not valid UTF-8
    pub cache_key: Option<String>,
    /// Relative path as reported by the filesystem, used to build the
    /// destination path
    pub relative: PathBuf,
    /// Absolute path to the source file
    pub absolute_path: PathBuf,
    /// Size and truncated modification time
    pub fingerprint: FileFingerprint,
}

/// Errors that can occur during source tree enumeration.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// The path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(path) | Self::NotFound(path) | Self::NotADirectory(path) => path,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur during file hashing.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
