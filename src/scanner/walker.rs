//! Source tree walker built on walkdir.
//!
//! # Overview
//!
//! [`Walker`] enumerates every regular file under a source root, at any
//! depth, as a lazy iterator of [`SourceFileEntry`] values. Children are
//! sorted by file name, so the order is stable within a pass.
//!
//! - Directories are descended but never yielded
//! - Symbolic links are not followed; a link whose target is a regular
//!   file passes through as that file
//! - Unreadable entries are yielded as [`ScanError`] values rather than
//!   stopping the walk
//! - A shared shutdown flag ends the iteration between entries
//!
//! # Example
//!
//! ```no_run
//! use copyverify::scanner::Walker;
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/data/source"));
//! walker.ensure_root().expect("source root must exist");
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use walkdir::WalkDir;

use super::path_utils::{display_key, relative_key, strip_root};
use super::{FileFingerprint, ScanError, SourceFileEntry};

/// Directory walker for source file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given source root.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, iteration ends before the next entry.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The root this walker enumerates.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check that the root exists and is a directory.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`] if the root is missing and
    /// [`ScanError::NotADirectory`] if it is a file.
    pub fn ensure_root(&self) -> Result<(), ScanError> {
        match std::fs::metadata(&self.root) {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(ScanError::NotADirectory(self.root.clone())),
            Err(e) => Err(self.handle_io_error(&self.root, e)),
        }
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the source tree, yielding one entry per regular file.
    ///
    /// The iterator is lazy and cannot be restarted; call `walk` again for
    /// a fresh pass.
    pub fn walk(&self) -> impl Iterator<Item = Result<SourceFileEntry, ScanError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .take_while(move |_| {
                let stop = self.is_shutdown_requested();
                if stop {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                }
                !stop
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    // The root itself is never a candidate
                    if entry.depth() == 0 {
                        return None;
                    }

                    let file_type = entry.file_type();
                    if file_type.is_dir() {
                        return None;
                    }

                    let metadata = if file_type.is_symlink() {
                        std::fs::metadata(entry.path())
                    } else {
                        std::fs::symlink_metadata(entry.path())
                    };

                    let metadata = match metadata {
                        Ok(m) => m,
                        Err(e) => return Some(Err(self.handle_io_error(entry.path(), e))),
                    };

                    if !metadata.is_file() {
                        log::trace!("Skipping non-regular file: {}", entry.path().display());
                        return None;
                    }

                    Some(self.process_file_entry(entry.into_path(), &metadata))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), Path::to_path_buf);
                    Some(Err(self.handle_walkdir_error(path, e)))
                }
            })
    }

    /// Build a [`SourceFileEntry`] for a regular file.
    fn process_file_entry(
        &self,
        path: PathBuf,
        metadata: &Metadata,
    ) -> Result<SourceFileEntry, ScanError> {
        let relative = strip_root(&self.root, &path).ok_or_else(|| ScanError::Io {
            path: path.clone(),
            source: std::io::Error::other("entry is not under the source root"),
        })?;

        Ok(SourceFileEntry {
            relative_path: display_key(&relative),
            cache_key: relative_key(&relative),
            relative,
            absolute_path: path,
            fingerprint: FileFingerprint::from_metadata(metadata),
        })
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Handle walkdir errors.
    fn handle_walkdir_error(&self, path: PathBuf, error: walkdir::Error) -> ScanError {
        if error.loop_ancestor().is_some() {
            log::warn!("Filesystem loop detected at {}", path.display());
        }
        match error.into_io_error() {
            Some(io_error) => self.handle_io_error(&path, io_error),
            None => ScanError::Io {
                path,
                source: std::io::Error::other("directory walk failed"),
            },
        }
    }
}
