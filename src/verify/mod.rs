//! Incremental verification of a destination tree against its source.
//!
//! The [`Verifier`] walks the source root and, for every file, either
//! trusts the cache (fingerprint unchanged) or compares the BLAKE3 digest
//! of the source file with its destination counterpart. Successful
//! comparisons are written to the [`VerificationCache`](crate::cache::VerificationCache)
//! immediately; failures are collected into a [`RunOutcome`].

pub mod orchestrator;

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::scanner::ScanError;

pub use orchestrator::{FileStatus, Verifier, VerifierConfig};

/// Category of a per-file verification failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VerificationErrorKind {
    /// The destination counterpart does not exist.
    MissingDestination,
    /// Source and destination digests differ.
    HashMismatch,
    /// The source or destination could not be read.
    ReadFailure,
}

/// A per-file verification failure. Reported, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationError {
    /// Path of the file relative to the source root
    pub relative_path: String,
    /// Failure category
    pub kind: VerificationErrorKind,
    /// Report line for this failure
    pub message: String,
}

impl VerificationError {
    /// The destination file is absent.
    #[must_use]
    pub fn missing_destination(relative_path: &str) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            kind: VerificationErrorKind::MissingDestination,
            message: format!("Missing file: {relative_path}"),
        }
    }

    /// Source and destination content differ.
    #[must_use]
    pub fn hash_mismatch(relative_path: &str, destination: &Path) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            kind: VerificationErrorKind::HashMismatch,
            message: format!("Hash mismatch: {}", destination.display()),
        }
    }

    /// One side of the comparison could not be read.
    #[must_use]
    pub fn read_failure(relative_path: &str, cause: &dyn fmt::Display) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            kind: VerificationErrorKind::ReadFailure,
            message: format!("Read failure: {cause}"),
        }
    }
}

impl fmt::Display for VerificationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Counters for one verification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyStats {
    /// Entries produced by the walker (including unreadable ones)
    pub files_seen: usize,
    /// Files trusted from the cache without hashing
    pub skipped: usize,
    /// Files whose digests matched
    pub verified: usize,
    /// Files that produced a [`VerificationError`]
    pub failed: usize,
    /// Bytes read while hashing, source and destination, for every
    /// pair whose digests were computed
    pub bytes_hashed: u64,
    /// The pass stopped early on a shutdown request
    pub interrupted: bool,
}

/// Terminal value of one verification pass.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    /// Failures in discovery order
    pub errors: Vec<VerificationError>,
    /// Pass counters
    pub stats: VerifyStats,
}

impl RunOutcome {
    /// A pass succeeds when it produced no per-file errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether the pass was cut short.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.stats.interrupted
    }
}

/// Errors that stop a verification pass before it starts.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The source root is missing or not a directory.
    #[error("Source root unavailable: {0}")]
    SourceRoot(#[from] ScanError),
}
