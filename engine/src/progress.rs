//! Progress reporting trait.
//!
//! `ProgressCallback` lets a front end follow a staging run without the
//! engine knowing how progress is displayed.

use crate::model::{Job, SourceEntry};
use std::path::Path;

/// Trait for receiving progress updates from a staging run.
///
/// All methods are called synchronously on the thread running the job.
/// Failures are not reported here; they come back as the run's error.
pub trait ProgressCallback {
    /// Called once the scratch directory exists, before any entry is staged.
    fn on_job_started(&self, job: &Job, staging_root: &Path);

    /// Called before an entry is normalized and copied.
    fn on_entry_started(&self, index: usize, entry: &SourceEntry);

    /// Called after an entry is copied, hooked and checksummed.
    ///
    /// `entry.destination_path` is the resolved path inside the staging root.
    fn on_entry_staged(&self, index: usize, entry: &SourceEntry);

    /// Called after the staged tree has been renamed into place.
    fn on_job_published(&self, job: &Job);
}
