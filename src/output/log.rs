//! Append-only verification log.
//!
//! Each failure is written and flushed the moment it is found, so the log
//! survives a crash or Ctrl+C mid-run. Lines look like:
//!
//! ```text
//! 2024-06-01T08:00:00Z Missing file: b.txt
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};

use crate::verify::VerificationError;

/// Timestamped, line-oriented log file opened in append mode.
#[derive(Debug)]
pub struct VerificationLog {
    path: PathBuf,
    file: File,
}

impl VerificationLog {
    /// Open (or create) the log at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory or file cannot be created.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a verification failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn append(&mut self, error: &VerificationError) -> io::Result<()> {
        self.note(&error.message)
    }

    /// Append a free-form line.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn note(&mut self, message: &str) -> io::Result<()> {
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        writeln!(self.file, "{stamp} {message}")?;
        self.file.flush()
    }
}
