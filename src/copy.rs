//! External copy step.
//!
//! The bulk copy itself is delegated to a platform tool (robocopy on
//! Windows, rsync elsewhere). This module expands the configured argument
//! template, runs the program to completion and classifies its exit
//! status against a fatal threshold.
//!
//! Placeholders recognized in `args`:
//!
//! | Placeholder     | Value                                   |
//! |-----------------|-----------------------------------------|
//! | `{source}`      | Source root                             |
//! | `{destination}` | Destination root                        |
//! | `{retries}`     | `retries` option                        |
//! | `{wait}`        | `retry_wait_secs` option                |
//! | `{log}`         | Copy log path                           |
//!
//! When the template contains `{retries}` the program is trusted to retry
//! on its own and is run once. Otherwise a fatal status is retried up to
//! `retries` times, sleeping `retry_wait_secs` in between.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the external copy program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CopyOptions {
    /// Program to run (looked up on `PATH`)
    pub program: String,
    /// Argument template
    pub args: Vec<String>,
    /// Exit codes at or above this are failures
    pub fatal_threshold: i32,
    /// Retry count (passed to the program or used by the outer loop)
    pub retries: u32,
    /// Seconds between retries
    pub retry_wait_secs: u64,
    /// The program writes its own log via `{log}`; do not capture output
    pub self_logging: bool,
}

impl Default for CopyOptions {
    #[cfg(windows)]
    fn default() -> Self {
        Self {
            program: "robocopy".to_string(),
            args: [
                "{source}",
                "{destination}",
                "/E",
                "/COPY:DAT",
                "/DCOPY:T",
                "/R:{retries}",
                "/W:{wait}",
                "/NP",
                "/TEE",
                "/LOG+:{log}",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            // robocopy reports copied/extra files with codes below 8
            fatal_threshold: 8,
            retries: 3,
            retry_wait_secs: 5,
            self_logging: true,
        }
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self {
            program: "rsync".to_string(),
            args: vec![
                "-a".to_string(),
                "{source}/".to_string(),
                "{destination}/".to_string(),
            ],
            fatal_threshold: 1,
            retries: 3,
            retry_wait_secs: 5,
            self_logging: false,
        }
    }
}

impl CopyOptions {
    /// Whether an exit code means the copy failed.
    #[must_use]
    pub fn is_fatal(&self, code: i32) -> bool {
        code >= self.fatal_threshold
    }

    /// Whether the program handles retries itself.
    #[must_use]
    pub fn delegates_retries(&self) -> bool {
        self.args.iter().any(|a| a.contains("{retries}"))
    }

    /// Total number of runs the outer loop may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        if self.delegates_retries() {
            1
        } else {
            self.retries.saturating_add(1)
        }
    }

    /// Expand the argument template.
    #[must_use]
    pub fn expand_args(&self, source: &Path, destination: &Path, log_path: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let destination = destination.to_string_lossy();
        let log_path = log_path.to_string_lossy();
        let retries = self.retries.to_string();
        let wait = self.retry_wait_secs.to_string();

        self.args
            .iter()
            .map(|arg| {
                arg.replace("{source}", &source)
                    .replace("{destination}", &destination)
                    .replace("{retries}", &retries)
                    .replace("{wait}", &wait)
                    .replace("{log}", &log_path)
            })
            .collect()
    }
}

/// Successful copy result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyStatus {
    /// Exit code of the final run
    pub code: i32,
    /// Number of runs made
    pub attempts: u32,
}

/// Errors from the copy step. All of them stop the run before verification.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// The program could not be started.
    #[error("Failed to start copy program '{program}': {source}")]
    Spawn {
        /// Program name
        program: String,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The program was killed by a signal.
    #[error("Copy program '{program}' terminated without an exit code")]
    Terminated {
        /// Program name
        program: String,
    },

    /// The program reported a fatal status on every attempt.
    #[error("Copy failed with status {code} (fatal at {threshold} or above) after {attempts} attempt(s)")]
    FatalStatus {
        /// Last exit code
        code: i32,
        /// Configured fatal threshold
        threshold: i32,
        /// Number of runs made
        attempts: u32,
    },

    /// The copy log could not be opened or written.
    #[error("Copy log error for {path}: {source}")]
    Log {
        /// Log path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// Performs the bulk copy before verification.
pub trait CopyCollaborator {
    /// Copy `source` into `destination`, writing tool output to `log_path`.
    ///
    /// # Errors
    ///
    /// Returns [`CopyError`] if the copy could not be run or failed.
    fn copy(&self, source: &Path, destination: &Path, log_path: &Path)
        -> Result<CopyStatus, CopyError>;
}

/// Runs the configured external program.
#[derive(Debug, Clone, Default)]
pub struct ExternalCopy {
    options: CopyOptions,
}

impl ExternalCopy {
    /// Create a collaborator for the given options.
    #[must_use]
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    #[must_use]
    pub fn options(&self) -> &CopyOptions {
        &self.options
    }

    fn open_log(path: &Path) -> Result<File, CopyError> {
        let log_err = |source| CopyError::Log {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(log_err)?;
            }
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(log_err)
    }

    fn run_once(&self, args: &[String], log_path: &Path, attempt: u32) -> Result<i32, CopyError> {
        let program = &self.options.program;
        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null());

        if !self.options.self_logging {
            let mut log = Self::open_log(log_path)?;
            let log_err = |source| CopyError::Log {
                path: log_path.to_path_buf(),
                source,
            };
            writeln!(log, "== attempt {attempt}: {program} {}", args.join(" ")).map_err(log_err)?;
            let stderr = log.try_clone().map_err(log_err)?;
            command.stdout(Stdio::from(log)).stderr(Stdio::from(stderr));
        }

        log::debug!("Running {} {}", program, args.join(" "));
        let status = command.status().map_err(|source| CopyError::Spawn {
            program: program.clone(),
            source,
        })?;

        status.code().ok_or_else(|| CopyError::Terminated {
            program: program.clone(),
        })
    }
}

impl CopyCollaborator for ExternalCopy {
    fn copy(
        &self,
        source: &Path,
        destination: &Path,
        log_path: &Path,
    ) -> Result<CopyStatus, CopyError> {
        let args = self.options.expand_args(source, destination, log_path);
        let max_attempts = self.options.max_attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = self.run_once(&args, log_path, attempt)?;

            if !self.options.is_fatal(code) {
                log::info!(
                    "Copy finished with status {} after {} attempt(s)",
                    code,
                    attempt
                );
                return Ok(CopyStatus {
                    code,
                    attempts: attempt,
                });
            }

            if attempt >= max_attempts {
                return Err(CopyError::FatalStatus {
                    code,
                    threshold: self.options.fatal_threshold,
                    attempts: attempt,
                });
            }

            log::warn!(
                "Copy attempt {} failed with status {}, retrying in {}s",
                attempt,
                code,
                self.options.retry_wait_secs
            );
            thread::sleep(Duration::from_secs(self.options.retry_wait_secs));
        }
    }
}
