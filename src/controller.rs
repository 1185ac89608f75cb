//! Run sequencing: decide whether to copy, then verify and report.
//!
//! ```text
//! destination missing ──────────────► create, copy, verify
//! destination exists ─► resolver ─┬─► Resume:     copy, verify
//!                                 ├─► VerifyOnly: verify
//!                                 └─► Abort:      stop
//! ```

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::cache::VerificationCache;
use crate::copy::{CopyCollaborator, CopyError, CopyStatus};
use crate::output::{Report, VerificationLog};
use crate::scanner::{ContentHasher, ScanError, Walker};
use crate::verify::{RunOutcome, Verifier, VerifierConfig, VerifyError};

/// What to do when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Run the copy again, then verify
    Resume,
    /// Skip the copy and verify what is there
    VerifyOnly,
    /// Stop without copying or verifying
    Abort,
}

/// Chooses a [`ConflictDecision`] for an existing destination.
pub trait ConflictResolver {
    /// Decide what to do with `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the decision could not be obtained (for example
    /// the prompt could not be written).
    fn resolve_conflict(&mut self, destination: &Path) -> io::Result<ConflictDecision>;
}

/// Always returns the same decision. Backs `--on-existing`.
#[derive(Debug, Clone, Copy)]
pub struct FixedResolver(pub ConflictDecision);

impl ConflictResolver for FixedResolver {
    fn resolve_conflict(&mut self, destination: &Path) -> io::Result<ConflictDecision> {
        log::debug!(
            "Destination {} exists, using preset decision {:?}",
            destination.display(),
            self.0
        );
        Ok(self.0)
    }
}

/// Asks on a terminal-like reader/writer pair.
///
/// Accepts `r`/`resume`, `v`/`verify`, `a`/`abort` (case-insensitive).
/// Unrecognized answers re-prompt; end of input aborts.
pub struct PromptResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptResolver<R, W> {
    /// Create a resolver over `input` and `output`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl PromptResolver<io::StdinLock<'static>, io::Stderr> {
    /// Resolver reading stdin and prompting on stderr.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> ConflictResolver for PromptResolver<R, W> {
    fn resolve_conflict(&mut self, destination: &Path) -> io::Result<ConflictDecision> {
        loop {
            write!(
                self.output,
                "Destination {} already exists. [R]esume copy, [V]erify only, or [A]bort? ",
                destination.display()
            )?;
            self.output.flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                writeln!(self.output)?;
                return Ok(ConflictDecision::Abort);
            }

            match line.trim().to_lowercase().as_str() {
                "r" | "resume" => return Ok(ConflictDecision::Resume),
                "v" | "verify" | "verify-only" => return Ok(ConflictDecision::VerifyOnly),
                "a" | "abort" => return Ok(ConflictDecision::Abort),
                other => writeln!(self.output, "Unrecognized answer '{other}'")?,
            }
        }
    }
}

/// Steps chosen for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPlan {
    /// Destination absent: create it, copy, verify
    CreateThenCopy,
    /// Destination present, resume: copy, verify
    CopyThenVerify,
    /// Destination present: verify only
    VerifyOnly,
    /// Destination present: stop
    Abort,
}

impl RunPlan {
    /// Whether the copy step runs.
    #[must_use]
    pub fn copies(self) -> bool {
        matches!(self, Self::CreateThenCopy | Self::CopyThenVerify)
    }
}

/// Choose the plan for `destination`, consulting `resolver` only if it exists.
///
/// # Errors
///
/// Returns an error if the existence check or the resolver fails.
pub fn plan_run(destination: &Path, resolver: &mut dyn ConflictResolver) -> io::Result<RunPlan> {
    if !destination.try_exists()? {
        return Ok(RunPlan::CreateThenCopy);
    }
    Ok(match resolver.resolve_conflict(destination)? {
        ConflictDecision::Resume => RunPlan::CopyThenVerify,
        ConflictDecision::VerifyOnly => RunPlan::VerifyOnly,
        ConflictDecision::Abort => RunPlan::Abort,
    })
}

/// Inputs for one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Source root (must exist)
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// Where to write the report; skipped when `None`
    pub report_path: Option<PathBuf>,
    /// Directory for the copy and verification logs
    pub log_dir: PathBuf,
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum RunResult {
    /// Verification ran (possibly interrupted).
    Completed {
        /// Verification outcome
        outcome: RunOutcome,
        /// Plan that was followed
        plan: RunPlan,
        /// Copy status when the copy step ran
        copy_status: Option<CopyStatus>,
        /// Report location, if one was written
        report_path: Option<PathBuf>,
    },
    /// The user aborted at the conflict prompt.
    Aborted,
}

/// Fatal run errors. No report is written for any of them.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The source root is missing or not a directory.
    #[error("Source unavailable: {0}")]
    Precondition(#[from] ScanError),

    /// The conflict decision could not be made.
    #[error("Failed to resolve destination conflict: {0}")]
    Prompt(#[source] io::Error),

    /// The destination could not be created.
    #[error("Failed to create destination {path}: {source}")]
    CreateDestination {
        /// Destination root
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The copy step failed.
    #[error(transparent)]
    Copy(#[from] CopyError),

    /// The verification log could not be opened.
    #[error("Failed to open verification log {path}: {source}")]
    Log {
        /// Log path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The report could not be written.
    #[error("Failed to write report {path}: {source}")]
    Report {
        /// Report path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl From<VerifyError> for RunError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::SourceRoot(e) => Self::Precondition(e),
        }
    }
}

/// Drives one run from conflict check to report.
pub struct RunController<'a, H: ContentHasher + ?Sized> {
    hasher: &'a H,
    copier: &'a dyn CopyCollaborator,
    resolver: &'a mut dyn ConflictResolver,
    config: VerifierConfig,
}

impl<'a, H: ContentHasher + ?Sized> RunController<'a, H> {
    /// Create a controller.
    pub fn new(
        hasher: &'a H,
        copier: &'a dyn CopyCollaborator,
        resolver: &'a mut dyn ConflictResolver,
    ) -> Self {
        Self {
            hasher,
            copier,
            resolver,
            config: VerifierConfig::default(),
        }
    }

    /// Replace the verifier configuration.
    #[must_use]
    pub fn with_config(mut self, config: VerifierConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute the run.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] for a missing source, a failed copy or an
    /// unwritable log/report. Per-file verification errors are not errors
    /// here; they are in the returned outcome.
    pub fn execute(
        &mut self,
        request: &RunRequest,
        cache: &mut VerificationCache,
    ) -> Result<RunResult, RunError> {
        Walker::new(&request.source).ensure_root()?;

        let plan = plan_run(&request.destination, self.resolver).map_err(RunError::Prompt)?;
        log::info!("Run plan: {:?}", plan);
        if plan == RunPlan::Abort {
            return Ok(RunResult::Aborted);
        }

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let copy_status = if plan.copies() {
            if plan == RunPlan::CreateThenCopy {
                fs::create_dir_all(&request.destination).map_err(|source| {
                    RunError::CreateDestination {
                        path: request.destination.clone(),
                        source,
                    }
                })?;
            }
            let copy_log = request.log_dir.join(format!("copy-{stamp}.log"));
            Some(
                self.copier
                    .copy(&request.source, &request.destination, &copy_log)?,
            )
        } else {
            None
        };

        let log_path = request.log_dir.join(format!("verify-{stamp}.log"));
        let mut log = VerificationLog::open(&log_path).map_err(|source| RunError::Log {
            path: log_path.clone(),
            source,
        })?;

        let outcome = Verifier::new(self.hasher, cache)
            .with_config(self.config.clone())
            .with_log(&mut log)
            .run(&request.source, &request.destination)?;

        let report_path = match &request.report_path {
            Some(path) if !outcome.was_interrupted() => {
                Report::new(&outcome.errors)
                    .save(path)
                    .map_err(|source| RunError::Report {
                        path: path.clone(),
                        source,
                    })?;
                Some(path.clone())
            }
            _ => None,
        };

        Ok(RunResult::Completed {
            outcome,
            plan,
            copy_status,
            report_path,
        })
    }
}
