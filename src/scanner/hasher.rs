//! BLAKE3 file hasher with streaming and memory-mapped support.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing BLAKE3 digests
//! of whole file contents, and the [`ContentHasher`] trait the verification
//! pass is written against.
//!
//! One algorithm is used everywhere: source hashing, destination hashing
//! and the digests stored in the verification cache are all BLAKE3.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use super::HashError;

/// A 32-byte BLAKE3 digest.
pub type Hash = [u8; 32];

/// Files at or above this size are hashed through a memory map.
pub const MMAP_THRESHOLD: u64 = 16 * 1024 * 1024;

/// Computes a digest of a file's full byte content.
///
/// Implementations must be deterministic: the same bytes always produce
/// the same digest.
pub trait ContentHasher: Send + Sync {
    /// Hash the full content of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    fn digest(&self, path: &Path) -> Result<Hash, HashError>;
}

/// BLAKE3 file hasher.
#[derive(Debug, Clone)]
pub struct Hasher {
    mmap_threshold: u64,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default memory-map threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            mmap_threshold: MMAP_THRESHOLD,
        }
    }

    /// Override the size at which files are memory-mapped instead of streamed.
    #[must_use]
    pub fn with_mmap_threshold(mut self, threshold: u64) -> Self {
        self.mmap_threshold = threshold;
        self
    }

    /// Hash the entire content of a file.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read.
    pub fn full_hash(&self, path: &Path) -> Result<Hash, HashError> {
        let file = File::open(path).map_err(|e| map_io_error(path, e))?;
        let len = file.metadata().map_err(|e| map_io_error(path, e))?.len();

        let mut hasher = blake3::Hasher::new();
        if len >= self.mmap_threshold {
            log::trace!("Hashing {} via mmap ({} bytes)", path.display(), len);
            hasher
                .update_mmap(path)
                .map_err(|e| map_io_error(path, e))?;
        } else {
            hasher
                .update_reader(file)
                .map_err(|e| map_io_error(path, e))?;
        }

        Ok(*hasher.finalize().as_bytes())
    }
}

impl ContentHasher for Hasher {
    fn digest(&self, path: &Path) -> Result<Hash, HashError> {
        self.full_hash(path)
    }
}

fn map_io_error(path: &Path, error: std::io::Error) -> HashError {
    match error.kind() {
        ErrorKind::NotFound => HashError::NotFound(path.to_path_buf()),
        ErrorKind::PermissionDenied => HashError::PermissionDenied(path.to_path_buf()),
        _ => HashError::Io {
            path: path.to_path_buf(),
            source: error,
        },
    }
}

/// Render a digest as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    blake3::Hash::from(*hash).to_hex().to_string()
}

/// Parse a lowercase or uppercase hex digest. Returns `None` if malformed.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    blake3::Hash::from_hex(hex.trim()).ok().map(|h| *h.as_bytes())
}
