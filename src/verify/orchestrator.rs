//! Per-file skip-or-verify decisions.
//!
//! For each source file, in walk order:
//!
//! 1. Cached record with an identical fingerprint: skip (no destination
//!    access, no hashing).
//! 2. Destination missing: `MissingDestination`.
//! 3. Digests differ: `HashMismatch`; unreadable side: `ReadFailure`.
//! 4. Digests match: upsert the record, persisted before moving on.
//!
//! A failing file never keeps a cache record, so it is always re-attempted
//! on the next run whatever its fingerprint. Files without an exact UTF-8
//! key are verified every time and never cached.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::{VerificationCache, VerificationRecord};
use crate::output::VerificationLog;
use crate::progress::ProgressCallback;
use crate::scanner::path_utils::{
    destination_path, display_key, normalize_path_str, relative_key, strip_root,
};
use crate::scanner::{ContentHasher, Hash, HashError, ScanError, SourceFileEntry, Walker};

use super::{RunOutcome, VerificationError, VerifyError};

/// Phase name reported to [`ProgressCallback`].
pub const VERIFY_PHASE: &str = "verify";

/// Tuning for a verification pass.
#[derive(Clone, Default)]
pub struct VerifierConfig {
    /// Hash the source and destination of a file concurrently.
    pub parallel_hashing: bool,
    /// Checked before each file; set by the Ctrl+C handler.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Receives per-file progress.
    pub progress: Option<Arc<dyn ProgressCallback>>,
}

impl VerifierConfig {
    /// Enable or disable concurrent hashing of each source/destination pair.
    #[must_use]
    pub fn with_parallel_hashing(mut self, enabled: bool) -> Self {
        self.parallel_hashing = enabled;
        self
    }

    /// Set the shutdown flag.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl std::fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("parallel_hashing", &self.parallel_hashing)
            .field("shutdown_flag", &self.shutdown_flag)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Result of checking a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Fingerprint matched the cached record; nothing was read.
    Skipped,
    /// Source and destination digests matched; the cache was updated.
    Verified,
    /// The file failed verification.
    Failed(VerificationError),
}

/// Runs a verification pass over one source/destination pair.
///
/// The verifier borrows the cache mutably for its whole lifetime; it is
/// the only writer.
pub struct Verifier<'a, H: ContentHasher + ?Sized> {
    hasher: &'a H,
    cache: &'a mut VerificationCache,
    log: Option<&'a mut VerificationLog>,
    config: VerifierConfig,
    bytes_hashed: u64,
}

impl<'a, H: ContentHasher + ?Sized> Verifier<'a, H> {
    /// Create a verifier writing outcomes into `cache`.
    pub fn new(hasher: &'a H, cache: &'a mut VerificationCache) -> Self {
        Self {
            hasher,
            cache,
            log: None,
            config: VerifierConfig::default(),
            bytes_hashed: 0,
        }
    }

    /// Replace the pass configuration.
    #[must_use]
    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Append every failure to `log` as soon as it is found.
    #[must_use]
    pub fn with_log(mut self, log: &'a mut VerificationLog) -> Self {
        self.log = Some(log);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.config
            .shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Verify every file under `source_root` against `destination_root`.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::SourceRoot`] if the source root is missing or
    /// not a directory. Per-file problems never fail the pass; they are
    /// collected in [`RunOutcome::errors`].
    pub fn run(
        &mut self,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<RunOutcome, VerifyError> {
        let mut walker = Walker::new(source_root);
        if let Some(flag) = &self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        walker.ensure_root()?;

        log::info!(
            "Verifying {} against {}",
            source_root.display(),
            destination_root.display()
        );
        if let Some(progress) = &self.config.progress {
            progress.on_phase_start(VERIFY_PHASE, 0);
        }

        self.bytes_hashed = 0;
        let mut outcome = RunOutcome::default();
        let mut composed_names: HashMap<String, String> = HashMap::new();
        for item in walker.walk() {
            if self.is_shutdown_requested() {
                outcome.stats.interrupted = true;
                break;
            }
            outcome.stats.files_seen += 1;

            let status = match item {
                Ok(entry) => {
                    if let Some(progress) = &self.config.progress {
                        progress.on_progress(outcome.stats.files_seen, &entry.relative_path);
                    }
                    warn_on_normalization_clash(&mut composed_names, &entry.relative_path);
                    self.check_file(&entry, destination_root)
                }
                Err(e) => {
                    let (key, error) = enumeration_failure(source_root, &e);
                    self.fail(key.as_deref(), error)
                }
            };

            match status {
                FileStatus::Skipped => outcome.stats.skipped += 1,
                FileStatus::Verified => outcome.stats.verified += 1,
                FileStatus::Failed(err) => {
                    outcome.stats.failed += 1;
                    outcome.errors.push(err);
                }
            }
        }

        // The walker stops silently on shutdown, so look again
        if self.is_shutdown_requested() {
            outcome.stats.interrupted = true;
        }
        outcome.stats.bytes_hashed = self.bytes_hashed;

        if let Some(progress) = &self.config.progress {
            progress.on_phase_end(VERIFY_PHASE);
        }

        log::info!(
            "Verification pass finished: {} seen, {} skipped, {} verified, {} failed",
            outcome.stats.files_seen,
            outcome.stats.skipped,
            outcome.stats.verified,
            outcome.stats.failed
        );

        Ok(outcome)
    }

    /// Decide and, if needed, perform verification of a single file.
    pub fn check_file(&mut self, entry: &SourceFileEntry, destination_root: &Path) -> FileStatus {
        let relative_path = entry.relative_path.as_str();
        let key = entry.cache_key.as_deref();

        if let Some(record) = key.and_then(|k| self.cache.lookup(k)) {
            if record.fingerprint == entry.fingerprint {
                log::trace!("Skipping {} (fingerprint unchanged)", relative_path);
                return FileStatus::Skipped;
            }
            log::debug!("Fingerprint changed for {}, re-verifying", relative_path);
        }

        let destination = destination_path(destination_root, &entry.relative);
        let destination_size = match std::fs::metadata(&destination) {
            Ok(metadata) => metadata.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return self.fail(key, VerificationError::missing_destination(relative_path));
            }
            Err(e) => {
                let cause = format!("{}: {}", destination.display(), e);
                return self.fail(key, VerificationError::read_failure(relative_path, &cause));
            }
        };

        let (source_digest, destination_digest) = self.hash_pair(&entry.absolute_path, &destination);
        let source_digest = match source_digest {
            Ok(hash) => hash,
            Err(e) => return self.fail(key, VerificationError::read_failure(relative_path, &e)),
        };
        let destination_digest = match destination_digest {
            Ok(hash) => hash,
            Err(e) => return self.fail(key, VerificationError::read_failure(relative_path, &e)),
        };

        let pair_bytes = entry.fingerprint.size + destination_size;
        self.bytes_hashed += pair_bytes;
        if let Some(progress) = &self.config.progress {
            progress.on_item_completed(pair_bytes);
        }

        if source_digest != destination_digest {
            return self.fail(key, VerificationError::hash_mismatch(relative_path, &destination));
        }

        match key {
            Some(key) => {
                let record = VerificationRecord::new(key, entry.fingerprint, source_digest);
                if let Err(e) = self.cache.upsert(record) {
                    log::warn!("Failed to record verification of {}: {}", relative_path, e);
                }
            }
            None => log::debug!("{} is not valid UTF-8, not caching", relative_path),
        }
        log::debug!("Verified {}", relative_path);
        FileStatus::Verified
    }

    fn hash_pair(
        &self,
        source: &Path,
        destination: &Path,
    ) -> (Result<Hash, HashError>, Result<Hash, HashError>) {
        let hasher = self.hasher;
        if self.config.parallel_hashing {
            rayon::join(|| hasher.digest(source), || hasher.digest(destination))
        } else {
            (hasher.digest(source), hasher.digest(destination))
        }
    }

    /// Record a failure: drop any stale cache record under `key` and log it.
    fn fail(&mut self, key: Option<&str>, error: VerificationError) -> FileStatus {
        log::warn!("{}", error.message);

        if let Some(key) = key {
            match self.cache.remove(key) {
                Ok(Some(_)) => log::debug!("Dropped cached record for {}", key),
                Ok(None) => {}
                Err(e) => log::warn!("Failed to drop cached record for {}: {}", key, e),
            }
        }

        if let Some(log) = self.log.as_deref_mut() {
            if let Err(e) = log.append(&error) {
                log::warn!("Failed to write verification log: {}", e);
            }
        }

        FileStatus::Failed(error)
    }
}

/// Turn an enumeration error into a failure plus the cache key it clears.
fn enumeration_failure(
    source_root: &Path,
    error: &ScanError,
) -> (Option<String>, VerificationError) {
    match strip_root(source_root, error.path()) {
        Some(rel) => (
            relative_key(&rel),
            VerificationError::read_failure(&display_key(&rel), error),
        ),
        None => (
            None,
            VerificationError::read_failure(&error.path().display().to_string(), error),
        ),
    }
}

/// Warn when two names in one pass differ only in Unicode normalization.
///
/// Both are verified separately, but a destination on a normalizing
/// filesystem (APFS, NTFS) can hold only one of them.
fn warn_on_normalization_clash(seen: &mut HashMap<String, String>, relative_path: &str) {
    let composed = normalize_path_str(relative_path);
    match seen.get(&composed) {
        Some(other) if other != relative_path => log::warn!(
            "{} and {} differ only in Unicode normalization",
            other,
            relative_path
        ),
        Some(_) => {}
        None => {
            seen.insert(composed, relative_path.to_string());
        }
    }
}
