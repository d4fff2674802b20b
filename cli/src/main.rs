//! Stager - command-line interface for the staging engine.
//!
//! Reads a JSON job description, stages the listed files and publishes the
//! result atomically. Hook output from the job-level after-hook goes to
//! stdout/stderr; logs go to stderr and follow `RUST_LOG`.

use clap::Parser;
use stager_engine::{Job, ProgressCallback, RunOptions, SourceEntry};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const EXIT_OK: i32 = 0;
const EXIT_ARG_ERROR: i32 = 1;
const EXIT_CMD_ERROR: i32 = 2;

/// Stager - stage files into a directory and publish it atomically
#[derive(Parser, Debug)]
#[command(name = "stager")]
#[command(version)]
#[command(about = "Stage files into a directory and publish it atomically")]
struct Args {
    /// Job description (JSON)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory to create the scratch directory in (default: next to the destination)
    #[arg(long, value_name = "DIR", env = "STAGER_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Report each staged file on stderr
    #[arg(short, long)]
    verbose: bool,
}

/// CLI implementation of ProgressCallback for `--verbose`
struct CliProgress {
    start_time: Instant,
}

impl CliProgress {
    fn new() -> Self {
        CliProgress {
            start_time: Instant::now(),
        }
    }

    fn entry_name(entry: &SourceEntry) -> String {
        entry
            .source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(unknown)".to_string())
    }
}

impl ProgressCallback for CliProgress {
    fn on_job_started(&self, job: &Job, staging_root: &Path) {
        eprintln!("Staging {} file(s)", job.sources.len());
        eprintln!("  Destination: {}", job.destination_dir.display());
        eprintln!("  Scratch: {}", staging_root.display());
    }

    fn on_entry_started(&self, index: usize, entry: &SourceEntry) {
        eprintln!("[{:3}] Staging: {}", index, Self::entry_name(entry));
    }

    fn on_entry_staged(&self, index: usize, entry: &SourceEntry) {
        let checksum = entry
            .checksum
            .map(|algorithm| format!(" (+{})", algorithm))
            .unwrap_or_default();
        eprintln!(
            "[{:3}] Staged: {}{}",
            index,
            entry.destination_path.display(),
            checksum
        );
    }

    fn on_job_published(&self, job: &Job) {
        eprintln!(
            "Published {} in {:.2?}",
            job.destination_dir.display(),
            self.start_time.elapsed()
        );
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = run_cli(&args, &mut io::stdout(), &mut io::stderr());
    std::process::exit(exit_code);
}

/// Filter used when `RUST_LOG` is unset. `--verbose` shows the engine's
/// debug events, including captured hook output.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "warn,stager_engine=debug"
    } else {
        "warn"
    }
}

/// Install the stderr log subscriber; `RUST_LOG` overrides the default filter.
fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args, out: &mut dyn Write, err: &mut dyn Write) -> i32 {
    let Some(config) = args.config.as_ref() else {
        let _ = writeln!(err, "Error: config file is missing (use --config <FILE>)");
        return EXIT_ARG_ERROR;
    };

    let content = match fs::read_to_string(config) {
        Ok(content) => content,
        Err(e) => {
            let _ = writeln!(err, "Error: failed to read {}: {}", config.display(), e);
            return EXIT_CMD_ERROR;
        }
    };

    let mut job: Job = match serde_json::from_str(&content) {
        Ok(job) => job,
        Err(e) => {
            let _ = writeln!(err, "Error: invalid job description {}: {}", config.display(), e);
            if e.is_syntax() {
                if let Some(line) = content.lines().nth(e.line().saturating_sub(1)) {
                    let _ = writeln!(err, "  {}", line.trim());
                }
            }
            return EXIT_CMD_ERROR;
        }
    };

    let options = RunOptions {
        scratch_parent: args.scratch_dir.clone(),
    };
    let progress = CliProgress::new();
    let progress: Option<&dyn ProgressCallback> = if args.verbose {
        Some(&progress)
    } else {
        None
    };

    match job.run_with(&options, Some(out), Some(&mut *err), progress) {
        Ok(()) => EXIT_OK,
        Err(e) => {
            debug!(os_error = ?e.raw_os_error(), "job failed");
            let _ = writeln!(err, "Error: {}", e);
            EXIT_CMD_ERROR
        }
    }
}
