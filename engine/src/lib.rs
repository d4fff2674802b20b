//! # Stager Engine - Atomic File Staging Library
//!
//! Stages a declared set of files into a destination directory so that the
//! directory either appears fully populated or not at all.
//!
//! ## Overview
//!
//! A `Job` lists `SourceEntry` items. Running the job:
//! - creates a scratch directory next to the destination
//! - copies each entry into `<scratch>/root`, running its before/after hooks
//!   and writing an optional checksum sidecar
//! - runs the job-level after-hook
//! - renames `<scratch>/root` to the destination in one step
//!
//! Any failure stops the run and the scratch directory is discarded.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use stager_engine::{ChecksumAlgorithm, Job, SourceEntry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut binary = SourceEntry::new("target/release/app", "bin/app");
//! binary.checksum = Some(ChecksumAlgorithm::Sha256);
//! binary.after_hooks = vec!["chmod".into(), "755".into(), "${target}".into()];
//!
//! let mut job = Job::new("/srv/release-42", vec![binary]);
//! job.run(Some(&mut std::io::stdout()), Some(&mut std::io::stderr()))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Job description structures (Job, SourceEntry, RunOptions)
//! - **error**: Error types and handling
//! - **fs_ops**: Copying, containment checks and publication
//! - **source**: Staging of a single entry
//! - **job**: Job orchestration (validate, run)
//! - **command**: Hook execution with placeholder substitution
//! - **progress**: Progress callback trait
//! - **checksums**: Digests and sidecar files

pub mod checksums;
pub mod command;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod progress;
pub mod source;

// Re-export main types and functions
pub use checksums::{digest, digest_hex, ChecksumAlgorithm};
pub use command::{execute, Substitutions, TARGET_PLACEHOLDER};
pub use error::{CommandFailure, EngineError, Result};
pub use model::{Job, RunOptions, SourceEntry};
pub use progress::ProgressCallback;
