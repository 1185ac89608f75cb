//! Command-line interface definitions for copyverify.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, error format, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Copy a tree, then verify it, remembering verified files under project "photos"
//! copyverify run /mnt/card /backup/card --project photos --report report.txt
//!
//! # Re-verify only; unchanged files are skipped
//! copyverify verify /mnt/card /backup/card --project photos
//!
//! # Inspect the remembered files
//! copyverify cache show photos
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::controller::ConflictDecision;

/// Copy directory trees and verify the result by content hash.
///
/// Files already verified in an earlier run of the same project are
/// skipped while their size and modification time are unchanged.
#[derive(Debug, Parser)]
#[command(name = "copyverify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Copy SOURCE to DEST, then verify
    Run(RunArgs),
    /// Verify DEST against SOURCE without copying
    Verify(VerifyArgs),
    /// Inspect or edit project caches
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Inspect configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

/// Options shared by `run` and `verify`.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Source directory
    #[arg(value_name = "SOURCE")]
    pub source: PathBuf,

    /// Destination directory
    #[arg(value_name = "DEST")]
    pub destination: PathBuf,

    /// Project name; verified files are remembered across runs
    ///
    /// Without a project every file is verified on every run.
    #[arg(short, long, value_name = "NAME")]
    pub project: Option<String>,

    /// Write the verification report to this file
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Hash source and destination of each file concurrently
    #[arg(long)]
    pub parallel_hashing: bool,

    /// Directory holding project caches
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Directory for copy and verification logs
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Arguments for the run subcommand.
#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub verify: VerifyArgs,

    /// What to do when DEST already exists
    #[arg(long, value_enum, default_value = "prompt")]
    pub on_existing: OnExisting,

    /// Copy retries (overrides config)
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Seconds between copy retries (overrides config)
    #[arg(long, value_name = "SECS")]
    pub retry_wait: Option<u64>,
}

/// Policy for an existing destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnExisting {
    /// Ask interactively
    Prompt,
    /// Copy again, then verify
    Resume,
    /// Verify without copying
    VerifyOnly,
    /// Stop
    Abort,
}

impl OnExisting {
    /// The preset decision, or `None` to prompt.
    #[must_use]
    pub fn decision(self) -> Option<ConflictDecision> {
        match self {
            Self::Prompt => None,
            Self::Resume => Some(ConflictDecision::Resume),
            Self::VerifyOnly => Some(ConflictDecision::VerifyOnly),
            Self::Abort => Some(ConflictDecision::Abort),
        }
    }
}

/// Cache maintenance commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// List project cache files
    List(CacheDirArg),
    /// Print the records of a project
    Show(ProjectArg),
    /// Delete every record of a project
    Clear(ProjectArg),
    /// Drop one file from a project so it is verified again
    Forget(ForgetArgs),
}

/// Cache directory override.
#[derive(Debug, Args)]
pub struct CacheDirArg {
    /// Directory holding project caches
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// A project name.
#[derive(Debug, Args)]
pub struct ProjectArg {
    /// Project name
    #[arg(value_name = "PROJECT")]
    pub project: String,

    #[command(flatten)]
    pub dir: CacheDirArg,
}

/// Arguments for `cache forget`.
#[derive(Debug, Args)]
pub struct ForgetArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Path relative to the source root, `/`-separated
    #[arg(value_name = "RELATIVE_PATH")]
    pub relative_path: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,
    /// Print the default config file location
    Path,
}
