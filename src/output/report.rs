//! Final verification report.
//!
//! The first line is a fixed marker; on failure each error message follows
//! on its own line, in discovery order:
//!
//! ```text
//! Verification failed
//! Missing file: b.txt
//! Hash mismatch: /dst/sub/c.txt
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::verify::VerificationError;

/// First line of a clean report.
pub const SUCCESS_MARKER: &str = "Verification succeeded";

/// First line of a report with at least one error.
pub const FAILURE_MARKER: &str = "Verification failed";

/// Report for one completed verification pass.
#[derive(Debug, Clone)]
pub struct Report<'a> {
    errors: &'a [VerificationError],
}

impl<'a> Report<'a> {
    /// Build a report from the pass errors.
    #[must_use]
    pub fn new(errors: &'a [VerificationError]) -> Self {
        Self { errors }
    }

    /// Whether the report records success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Report text without a trailing newline.
    #[must_use]
    pub fn body(&self) -> String {
        if self.is_success() {
            return SUCCESS_MARKER.to_string();
        }
        let mut lines = Vec::with_capacity(self.errors.len() + 1);
        lines.push(FAILURE_MARKER);
        lines.extend(self.errors.iter().map(|e| e.message.as_str()));
        lines.join("\n")
    }

    /// Write the report, newline-terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writeln!(writer, "{}", self.body())?;
        writer.flush()
    }

    /// Write the report to `path`, replacing any previous report.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// file cannot be written.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::File::create(path)?;
        self.write_to(io::BufWriter::new(file))?;
        log::info!("Report written to {}", path.display());
        Ok(())
    }
}
