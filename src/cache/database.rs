//! The verification cache: an in-memory table flushed to disk on every write.

use std::collections::HashMap;
use std::path::Path;

use super::entry::VerificationRecord;
use super::store::CacheStore;
use super::CacheError;

/// Mapping from relative path to the last successful verification.
///
/// Holds at most one record per relative path. With a backing store every
/// mutation rewrites the whole store before returning; without one (no
/// project) the cache stays empty and never touches the disk.
#[derive(Debug)]
pub struct VerificationCache {
    records: HashMap<String, VerificationRecord>,
    store: Option<CacheStore>,
}

impl VerificationCache {
    /// A permanently-empty, non-persisting cache.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            records: HashMap::new(),
            store: None,
        }
    }

    /// Load the cache backed by `store`.
    ///
    /// A missing store yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store exists but cannot be read.
    pub fn load(store: CacheStore) -> Result<Self, CacheError> {
        let mut records = HashMap::new();
        for record in store.read()? {
            // Later rows win, so a hand-edited duplicate collapses to one record
            records.insert(record.relative_path.clone(), record);
        }
        log::debug!(
            "Loaded {} verification records from {}",
            records.len(),
            store.path().display()
        );
        Ok(Self {
            records,
            store: Some(store),
        })
    }

    /// Load the cache for a named project under `storage_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] for a blank project name or an unreadable store.
    pub fn open_project(storage_dir: &Path, project: &str) -> Result<Self, CacheError> {
        Self::load(CacheStore::for_project(storage_dir, project)?)
    }

    /// Look up the record for a relative path.
    #[must_use]
    pub fn lookup(&self, relative_path: &str) -> Option<&VerificationRecord> {
        self.records.get(relative_path)
    }

    /// Replace any record for the same path, then persist.
    ///
    /// On a disabled cache this is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if persisting fails. The in-memory record is
    /// kept either way; the next successful persist writes it out.
    pub fn upsert(&mut self, record: VerificationRecord) -> Result<(), CacheError> {
        if self.store.is_none() {
            return Ok(());
        }
        self.records.remove(&record.relative_path);
        self.records.insert(record.relative_path.clone(), record);
        self.persist()
    }

    /// Drop the record for a path, persisting if one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if persisting fails.
    pub fn remove(&mut self, relative_path: &str) -> Result<Option<VerificationRecord>, CacheError> {
        let removed = self.records.remove(relative_path);
        if removed.is_some() {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Remove every record and persist the empty table.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if persisting fails.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        self.records.clear();
        self.persist()
    }

    /// Write the whole table to the backing store.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the store cannot be written.
    pub fn persist(&self) -> Result<(), CacheError> {
        match &self.store {
            Some(store) => store.write(self.records()),
            None => Ok(()),
        }
    }

    /// All records, sorted by relative path.
    #[must_use]
    pub fn records(&self) -> Vec<&VerificationRecord> {
        let mut records: Vec<_> = self.records.values().collect();
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether writes reach durable storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    /// Path of the backing store, if any.
    #[must_use]
    pub fn store_path(&self) -> Option<&Path> {
        self.store.as_ref().map(CacheStore::path)
    }
}
