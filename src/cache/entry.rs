//! Verification record definitions and their row encoding.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scanner::{hash_to_hex, hex_to_hash, FileFingerprint, Hash};

/// Column names of the durable store, in order.
pub const CACHE_COLUMNS: [&str; 4] = ["RelativePath", "Size", "LastWriteTime", "Hash"];

/// Timestamp layout of the `LastWriteTime` column (UTC, second precision).
pub const LAST_WRITE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A file that has been content-verified at least once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    /// Cache key: path relative to the source root
    pub relative_path: String,
    /// Fingerprint of the source file when it was verified
    pub fingerprint: FileFingerprint,
    /// BLAKE3 digest of the verified content
    pub digest: Hash,
}

impl VerificationRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(relative_path: impl Into<String>, fingerprint: FileFingerprint, digest: Hash) -> Self {
        Self {
            relative_path: relative_path.into(),
            fingerprint,
            digest,
        }
    }
}

/// One row of the durable store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheRow {
    #[serde(rename = "RelativePath")]
    pub relative_path: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "LastWriteTime")]
    pub last_write_time: String,
    #[serde(rename = "Hash")]
    pub hash: String,
}

/// Why a stored row could not be turned back into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    /// The relative path column was empty.
    #[error("empty relative path")]
    EmptyPath,

    /// The timestamp column did not match [`LAST_WRITE_TIME_FORMAT`].
    #[error("invalid LastWriteTime '{0}'")]
    InvalidTimestamp(String),

    /// The hash column was not a 64-character hex digest.
    #[error("invalid hash '{0}'")]
    InvalidHash(String),
}

impl From<&VerificationRecord> for CacheRow {
    fn from(record: &VerificationRecord) -> Self {
        Self {
            relative_path: record.relative_path.clone(),
            size: record.fingerprint.size,
            last_write_time: record
                .fingerprint
                .modified_at
                .format(LAST_WRITE_TIME_FORMAT)
                .to_string(),
            hash: hash_to_hex(&record.digest),
        }
    }
}

impl TryFrom<CacheRow> for VerificationRecord {
    type Error = RowError;

    fn try_from(row: CacheRow) -> Result<Self, Self::Error> {
        if row.relative_path.is_empty() {
            return Err(RowError::EmptyPath);
        }

        let modified_at: DateTime<Utc> =
            NaiveDateTime::parse_from_str(row.last_write_time.trim(), LAST_WRITE_TIME_FORMAT)
                .map_err(|_| RowError::InvalidTimestamp(row.last_write_time.clone()))?
                .and_utc();

        let digest = hex_to_hash(&row.hash).ok_or_else(|| RowError::InvalidHash(row.hash.clone()))?;

        Ok(Self {
            relative_path: row.relative_path,
            fingerprint: FileFingerprint::from_datetime(row.size, modified_at),
            digest,
        })
    }
}
