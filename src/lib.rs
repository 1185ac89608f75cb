//! copyverify - Incremental Copy Verification
//!
//! Copies a directory tree with a platform copy tool, then confirms by
//! BLAKE3 content hash that every source file arrived intact. Verified
//! files are remembered per project, so re-running skips files whose size
//! and modification time have not changed.

pub mod cache;
pub mod cli;
pub mod config;
pub mod controller;
pub mod copy;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use chrono::Utc;
use yansi::Paint;

use crate::cache::entry::LAST_WRITE_TIME_FORMAT;
use crate::cache::{list_stores, CacheStore, VerificationCache};
use crate::cli::{CacheCommand, Cli, Commands, ConfigCommand, RunArgs, VerifyArgs};
use crate::config::Config;
use crate::controller::{
    ConflictResolver, FixedResolver, PromptResolver, RunController, RunRequest, RunResult,
};
use crate::copy::ExternalCopy;
use crate::error::ExitCode;
use crate::output::{Report, VerificationLog};
use crate::progress::Progress;
use crate::scanner::{hash_to_hex, Hasher, Walker};
use crate::verify::{RunOutcome, Verifier, VerifierConfig};

/// Run the application for parsed CLI arguments.
///
/// # Errors
///
/// Returns an error for fatal conditions: bad configuration, a missing
/// source root, a failed copy, or an unwritable cache/log/report. Per-file
/// verification failures are reported through the exit code instead.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run(args) => {
            apply_overrides(&mut config, &args.verify);
            handle_run(args, &config, cli.quiet)
        }
        Commands::Verify(args) => {
            apply_overrides(&mut config, &args);
            handle_verify(&args, &config, cli.quiet)
        }
        Commands::Cache(command) => handle_cache(command, &config),
        Commands::Config(command) => handle_config(&command, &config),
    }
}

/// CLI flags win over every config layer.
fn apply_overrides(config: &mut Config, args: &VerifyArgs) {
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.log_dir {
        config.log_dir = Some(dir.clone());
    }
    if args.parallel_hashing {
        config.parallel_hashing = true;
    }
}

fn open_cache(config: &Config, project: Option<&str>) -> Result<VerificationCache> {
    match project {
        Some(project) => {
            let storage_dir = config.storage_dir()?;
            let cache = VerificationCache::open_project(&storage_dir, project)
                .with_context(|| format!("Failed to open cache for project '{project}'"))?;
            log::info!(
                "Project '{}': {} verified files remembered",
                project,
                cache.len()
            );
            Ok(cache)
        }
        None => {
            log::debug!("No project given, verifying every file");
            Ok(VerificationCache::disabled())
        }
    }
}

fn verifier_config(config: &Config, quiet: bool) -> Result<VerifierConfig> {
    let handler = signal::install_handler()?;
    Ok(VerifierConfig::default()
        .with_parallel_hashing(config.parallel_hashing)
        .with_shutdown_flag(handler.get_flag())
        .with_progress(Arc::new(Progress::new(quiet))))
}

fn handle_run(args: RunArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    let mut copy_options = config.copy.clone();
    if let Some(retries) = args.retries {
        copy_options.retries = retries;
    }
    if let Some(wait) = args.retry_wait {
        copy_options.retry_wait_secs = wait;
    }

    let mut cache = open_cache(config, args.verify.project.as_deref())?;
    let request = RunRequest {
        source: args.verify.source.clone(),
        destination: args.verify.destination.clone(),
        report_path: args.verify.report.clone(),
        log_dir: config.log_dir()?,
    };

    let hasher = Hasher::new();
    let copier = ExternalCopy::new(copy_options);
    let mut resolver: Box<dyn ConflictResolver> = match args.on_existing.decision() {
        Some(decision) => Box::new(FixedResolver(decision)),
        None => Box::new(PromptResolver::stdio()),
    };

    let result = RunController::new(&hasher, &copier, resolver.as_mut())
        .with_config(verifier_config(config, quiet)?)
        .execute(&request, &mut cache)?;

    match result {
        RunResult::Aborted => {
            if !quiet {
                println!("{}", "Aborted; nothing was copied or verified.".yellow());
            }
            Ok(ExitCode::Aborted)
        }
        RunResult::Completed {
            outcome,
            copy_status,
            ..
        } => {
            if let Some(status) = copy_status {
                log::info!(
                    "Copy status {} after {} attempt(s)",
                    status.code,
                    status.attempts
                );
            }
            Ok(finish(&outcome, quiet))
        }
    }
}

fn handle_verify(args: &VerifyArgs, config: &Config, quiet: bool) -> Result<ExitCode> {
    Walker::new(&args.source).ensure_root()?;
    let mut cache = open_cache(config, args.project.as_deref())?;

    let log_path = config
        .log_dir()?
        .join(format!("verify-{}.log", Utc::now().format("%Y%m%d-%H%M%S")));
    let mut log = VerificationLog::open(&log_path)
        .with_context(|| format!("Failed to open verification log {}", log_path.display()))?;

    let hasher = Hasher::new();
    let outcome = Verifier::new(&hasher, &mut cache)
        .with_config(verifier_config(config, quiet)?)
        .with_log(&mut log)
        .run(&args.source, &args.destination)?;

    if let Some(path) = &args.report {
        if !outcome.was_interrupted() {
            Report::new(&outcome.errors)
                .save(path)
                .with_context(|| format!("Failed to write report {}", path.display()))?;
        }
    }

    Ok(finish(&outcome, quiet))
}

/// Print the report and summary, and map the outcome to an exit code.
fn finish(outcome: &RunOutcome, quiet: bool) -> ExitCode {
    let stats = &outcome.stats;

    if !quiet {
        if outcome.was_interrupted() {
            println!("{}", "Verification interrupted".yellow().bold());
        } else if outcome.is_success() {
            println!("{}", output::SUCCESS_MARKER.green().bold());
        } else {
            println!("{}", output::FAILURE_MARKER.red().bold());
        }
        for error in &outcome.errors {
            println!("{}", error.message);
        }
        println!(
            "{} verified, {} skipped, {} failed ({} hashed)",
            stats.verified,
            stats.skipped,
            stats.failed,
            ByteSize::b(stats.bytes_hashed)
        );
    }

    if outcome.was_interrupted() {
        ExitCode::Interrupted
    } else if outcome.is_success() {
        ExitCode::Success
    } else {
        ExitCode::VerificationFailed
    }
}

fn cache_dir(config: &Config, override_dir: Option<&Path>) -> Result<PathBuf> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Ok(config.storage_dir()?),
    }
}

fn handle_cache(command: CacheCommand, config: &Config) -> Result<ExitCode> {
    match command {
        CacheCommand::List(arg) => {
            let dir = cache_dir(config, arg.cache_dir.as_deref())?;
            let stores = list_stores(&dir)?;
            if stores.is_empty() {
                println!("No project caches in {}", dir.display());
            }
            for path in stores {
                let cache = VerificationCache::load(CacheStore::new(&path))?;
                println!("{}\t{} records", path.display(), cache.len());
            }
        }
        CacheCommand::Show(arg) => {
            let dir = cache_dir(config, arg.dir.cache_dir.as_deref())?;
            let cache = VerificationCache::open_project(&dir, &arg.project)?;
            for record in cache.records() {
                println!(
                    "{}\t{}\t{}\t{}",
                    record.relative_path,
                    record.fingerprint.size,
                    record.fingerprint.modified_at.format(LAST_WRITE_TIME_FORMAT),
                    hash_to_hex(&record.digest)
                );
            }
        }
        CacheCommand::Clear(arg) => {
            let dir = cache_dir(config, arg.dir.cache_dir.as_deref())?;
            let store = CacheStore::for_project(&dir, &arg.project)?;
            if store.delete()? {
                println!("Cleared cache for '{}'", arg.project);
            } else {
                println!("No cache for '{}'", arg.project);
            }
        }
        CacheCommand::Forget(args) => {
            let dir = cache_dir(config, args.project.dir.cache_dir.as_deref())?;
            let mut cache = VerificationCache::open_project(&dir, &args.project.project)?;
            match cache.remove(&args.relative_path)? {
                Some(_) => println!("Forgot {}", args.relative_path),
                None => println!("{} was not cached", args.relative_path),
            }
        }
    }
    Ok(ExitCode::Success)
}

fn handle_config(command: &ConfigCommand, config: &Config) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => print!("{}", config.to_toml()?),
        ConfigCommand::Path => match Config::default_config_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No configuration directory for this platform"),
        },
    }
    Ok(ExitCode::Success)
}
