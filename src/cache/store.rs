//! CSV-backed durable store for verification records.
//!
//! One file per project, one row per record, columns
//! `RelativePath,Size,LastWriteTime,Hash`. Writes go to a sibling
//! temporary file that is renamed over the store, so a reader never sees
//! a half-written table.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use directories::ProjectDirs;

use super::entry::{CacheRow, VerificationRecord, CACHE_COLUMNS};
use super::CacheError;

/// File extension of project stores.
pub const STORE_EXTENSION: &str = "csv";

/// Handle to a project's store file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStore {
    path: PathBuf,
}

impl CacheStore {
    /// Use an explicit store file.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Locate the store for `project` under `storage_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidProjectName`] for a blank name.
    pub fn for_project(storage_dir: &Path, project: &str) -> Result<Self, CacheError> {
        if project.trim().is_empty() {
            return Err(CacheError::InvalidProjectName(project.to_string()));
        }
        Ok(Self::new(storage_dir.join(store_file_name(project))))
    }

    /// Path of the store file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store file exists yet.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read every valid record from the store.
    ///
    /// A missing file yields no records. Malformed rows are skipped with a
    /// warning; a file whose header is not the expected column set is
    /// treated as empty.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file exists but cannot be opened.
    pub fn read(&self) -> Result<Vec<VerificationRecord>, CacheError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

        match reader.headers() {
            Ok(headers) if headers.is_empty() => return Ok(Vec::new()),
            Ok(headers) if headers.iter().eq(CACHE_COLUMNS.iter().copied()) => {}
            Ok(headers) => {
                log::warn!(
                    "Ignoring cache {}: unexpected columns {:?}",
                    self.path.display(),
                    headers
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                log::warn!("Ignoring unreadable cache {}: {}", self.path.display(), e);
                return Ok(Vec::new());
            }
        }

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for (index, row) in reader.deserialize::<CacheRow>().enumerate() {
            let line = index + 2;
            match row {
                Ok(row) => match VerificationRecord::try_from(row) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        log::warn!("Skipping cache row {} in {}: {}", line, self.path.display(), e);
                        skipped += 1;
                    }
                },
                Err(e) => {
                    log::warn!("Skipping cache row {} in {}: {}", line, self.path.display(), e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            log::warn!(
                "Loaded {} records from {} ({} malformed rows skipped)",
                records.len(),
                self.path.display(),
                skipped
            );
        }

        Ok(records)
    }

    /// Replace the store contents with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the temporary file cannot be written or
    /// renamed into place.
    pub fn write<'a, I>(&self, records: I) -> Result<(), CacheError>
    where
        I: IntoIterator<Item = &'a VerificationRecord>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| CacheError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let tmp_path = self.temp_path();
        let file = File::create(&tmp_path).map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        let csv_err = |e: csv::Error| CacheError::Csv {
            path: tmp_path.clone(),
            source: e,
        };
        writer.write_record(CACHE_COLUMNS).map_err(csv_err)?;
        for record in records {
            writer.serialize(CacheRow::from(record)).map_err(csv_err)?;
        }

        let file = writer.into_inner().map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            source: e.into_error(),
        })?;
        file.sync_all().map_err(|e| CacheError::Io {
            path: tmp_path.clone(),
            source: e,
        })?;
        drop(file);

        fs::rename(&tmp_path, &self.path).map_err(|e| CacheError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Delete the store file. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the file exists but cannot be removed.
    pub fn delete(&self) -> Result<bool, CacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Derive the store file name for a project.
///
/// Names made only of ASCII letters, digits, `-`, `_` and `.` are used as
/// is. Anything else is sanitized and suffixed with a short digest of the
/// original name, so distinct projects never share a file.
#[must_use]
pub fn store_file_name(project: &str) -> String {
    let sanitized: String = project
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let sanitized = sanitized.trim_matches('.');

    if sanitized == project && !sanitized.is_empty() {
        format!("{sanitized}.{STORE_EXTENSION}")
    } else {
        let digest = blake3::hash(project.as_bytes()).to_hex();
        let stem = if sanitized.is_empty() { "project" } else { sanitized };
        format!("{stem}-{}.{STORE_EXTENSION}", &digest.as_str()[..8])
    }
}

/// Default directory holding project stores.
///
/// # Errors
///
/// Returns [`CacheError::NoProjectDirs`] when the platform reports no home
/// directory.
pub fn default_storage_dir() -> Result<PathBuf, CacheError> {
    let dirs = ProjectDirs::from("com", "copyverify", "copyverify").ok_or(CacheError::NoProjectDirs)?;
    Ok(dirs.data_dir().join("projects"))
}

/// List the store files present in `storage_dir`, sorted by name.
///
/// # Errors
///
/// Returns [`CacheError::Io`] if the directory exists but cannot be read.
pub fn list_stores(storage_dir: &Path) -> Result<Vec<PathBuf>, CacheError> {
    let read_dir = match fs::read_dir(storage_dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CacheError::Io {
                path: storage_dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut stores: Vec<PathBuf> = read_dir
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == STORE_EXTENSION))
        .collect();
    stores.sort();
    Ok(stores)
}
