//! Core data model for staging jobs.
//!
//! This module defines the structures decoded from a job description:
//! - Job: the set of files to stage and where to publish them
//! - SourceEntry: a single file with its hooks and checksum policy
//! - RunOptions: knobs that are not part of the description itself

use crate::checksums::{deserialize_optional_algorithm, ChecksumAlgorithm};
use serde::Deserialize;
use std::path::PathBuf;

/// A staging job.
///
/// Entries are staged in declaration order into a scratch directory, the
/// job-level after-hook runs, and the staged tree is renamed to
/// `destination_dir`. A job is run once and not reused.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    /// Files to stage, in execution order
    #[serde(rename = "srcs", default)]
    pub sources: Vec<SourceEntry>,

    /// Final location of the staged tree
    #[serde(rename = "dst")]
    pub destination_dir: PathBuf,

    /// Command run once after every entry is staged, before publication
    #[serde(rename = "after_cmd", default)]
    pub after_hooks: Vec<String>,
}

/// One file within a job.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceEntry {
    /// Existing regular file to copy
    #[serde(rename = "path")]
    pub source_path: PathBuf,

    /// Relative path under the output root; empty means the source's file
    /// name. Replaced by the resolved staging path once normalized.
    #[serde(rename = "dst_path", default)]
    pub destination_path: PathBuf,

    /// Algorithm for the sidecar checksum file, if any
    #[serde(
        rename = "checksum",
        default,
        deserialize_with = "deserialize_optional_algorithm"
    )]
    pub checksum: Option<ChecksumAlgorithm>,

    /// Command run before the copy
    #[serde(rename = "before_cmd", default)]
    pub before_hooks: Vec<String>,

    /// Command run after the copy, before the checksum
    #[serde(rename = "after_cmd", default)]
    pub after_hooks: Vec<String>,
}

/// Options for a single run that do not come from the job description.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Directory the scratch directory is created in.
    ///
    /// Defaults to the parent of the job's destination so the final rename
    /// stays on one filesystem.
    pub scratch_parent: Option<PathBuf>,
}
