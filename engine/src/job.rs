//! Job orchestration module.
//!
//! A run stages every entry into `<scratch>/root`, runs the job-level
//! after-hook, then renames `root` to the destination directory. The scratch
//! directory is removed on every exit path, so a failed run leaves nothing
//! behind and the destination is only ever replaced by a complete tree.

use crate::command::{self, Substitutions};
use crate::error::{EngineError, Result};
use crate::fs_ops;
use crate::model::{Job, RunOptions, SourceEntry};
use crate::progress::ProgressCallback;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

/// Name of the staging directory inside the scratch directory.
const STAGING_ROOT: &str = "root";

/// Prefix of scratch directory names.
const SCRATCH_PREFIX: &str = ".stager-";

impl Job {
    /// Create a job publishing `sources` to `destination_dir`.
    pub fn new(destination_dir: impl Into<PathBuf>, sources: Vec<SourceEntry>) -> Self {
        Job {
            sources,
            destination_dir: destination_dir.into(),
            after_hooks: Vec::new(),
        }
    }

    /// Check the job before any filesystem work.
    ///
    /// # Errors
    /// Returns `NoSources` if the job has no entries.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(EngineError::NoSources);
        }
        Ok(())
    }

    /// Run the job with default options and no progress reporting.
    ///
    /// `stdout` and `stderr` receive the output of the job-level after-hook;
    /// `None` discards it.
    pub fn run(
        &mut self,
        stdout: Option<&mut dyn Write>,
        stderr: Option<&mut dyn Write>,
    ) -> Result<()> {
        self.run_with(&RunOptions::default(), stdout, stderr, None)
    }

    /// Stage every entry, run the after-hook and publish the result.
    ///
    /// Processing stops at the first failure. Until the final rename nothing
    /// outside the scratch directory is modified.
    pub fn run_with(
        &mut self,
        options: &RunOptions,
        stdout: Option<&mut dyn Write>,
        stderr: Option<&mut dyn Write>,
        progress: Option<&dyn ProgressCallback>,
    ) -> Result<()> {
        self.validate()?;

        let run_id = Uuid::new_v4();
        let span = info_span!(
            "stage_job",
            %run_id,
            destination = %self.destination_dir.display()
        );
        let _guard = span.enter();

        let scratch_parent = options
            .scratch_parent
            .clone()
            .unwrap_or_else(|| default_scratch_parent(&self.destination_dir));
        // Removed recursively when dropped, including on early return.
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&scratch_parent)
            .map_err(|e| EngineError::io(&scratch_parent, e))?;
        let staging_root = scratch.path().join(STAGING_ROOT);
        fs::create_dir(&staging_root).map_err(|e| EngineError::io(&staging_root, e))?;

        info!(
            scratch = %scratch.path().display(),
            entries = self.sources.len(),
            "staging job"
        );
        if let Some(callback) = progress {
            callback.on_job_started(self, &staging_root);
        }

        for (index, entry) in self.sources.iter_mut().enumerate() {
            if let Some(callback) = progress {
                callback.on_entry_started(index, entry);
            }
            entry.copy_into(&staging_root)?;
            debug!(index, staged = %entry.destination_path.display(), "entry staged");
            if let Some(callback) = progress {
                callback.on_entry_staged(index, entry);
            }
        }

        if command::is_runnable(&self.after_hooks) {
            command::execute(&Substitutions::new(), &self.after_hooks, stdout, stderr)?;
        }

        fs_ops::publish_dir(&staging_root, &self.destination_dir)?;
        info!("published");
        if let Some(callback) = progress {
            callback.on_job_published(self);
        }

        if let Err(e) = scratch.close() {
            warn!(error = %e, "failed to remove scratch directory");
        }
        Ok(())
    }
}

/// Parent directory of `destination`, or the current directory for a bare name.
fn default_scratch_parent(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksums::{self, ChecksumAlgorithm};
    use std::sync::Mutex;

    struct Fixture {
        _temp_dir: tempfile::TempDir,
        inputs: PathBuf,
        scratch: PathBuf,
        destination: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let inputs = temp_dir.path().join("inputs");
            let scratch = temp_dir.path().join("scratch");
            fs::create_dir(&inputs).expect("Failed to create inputs dir");
            fs::create_dir(&scratch).expect("Failed to create scratch dir");
            let destination = temp_dir.path().join("release");
            Fixture {
                _temp_dir: temp_dir,
                inputs,
                scratch,
                destination,
            }
        }

        fn input(&self, name: &str, content: &str) -> PathBuf {
            let path = self.inputs.join(name);
            fs::write(&path, content).expect("Failed to write input");
            path
        }

        fn options(&self) -> RunOptions {
            RunOptions {
                scratch_parent: Some(self.scratch.clone()),
            }
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(&self.scratch)
                .expect("Failed to read scratch dir")
                .next()
                .is_none()
        }
    }

    fn tokens(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("Failed to read dir")
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_validate_requires_sources() {
        let job = Job::new("out", Vec::new());
        assert!(matches!(job.validate(), Err(EngineError::NoSources)));

        let job = Job::new("out", vec![SourceEntry::default()]);
        job.validate().expect("one entry is enough");
    }

    #[test]
    fn test_run_without_sources_has_no_side_effects() {
        let fixture = Fixture::new();
        let mut job = Job::new(&fixture.destination, Vec::new());

        let result = job.run_with(&fixture.options(), None, None, None);

        assert!(matches!(result, Err(EngineError::NoSources)));
        assert!(!fixture.destination.exists());
        assert!(fixture.scratch_is_empty());
    }

    #[test]
    fn test_run_publishes_all_entries_with_sidecars() {
        let fixture = Fixture::new();
        let names = ["one.txt", "two.txt", "three.txt"];
        let sources = names
            .iter()
            .map(|name| {
                let mut entry = SourceEntry::new(fixture.input(name, name), "");
                entry.checksum = Some(ChecksumAlgorithm::Sha256);
                entry
            })
            .collect();
        let mut job = Job::new(&fixture.destination, sources);

        job.run_with(&fixture.options(), None, None, None)
            .expect("Job should succeed");

        let mut expected: Vec<String> = names
            .iter()
            .flat_map(|name| [name.to_string(), format!("{}.sha256", name)])
            .collect();
        expected.sort();
        assert_eq!(file_names(&fixture.destination), expected);

        for name in names {
            let staged = fixture.destination.join(name);
            let sidecar = fs::read_to_string(fixture.destination.join(format!("{}.sha256", name)))
                .expect("read sidecar");
            let recomputed =
                checksums::digest_hex(&staged, ChecksumAlgorithm::Sha256).expect("digest");
            assert_eq!(sidecar, recomputed);
        }
        assert!(fixture.scratch_is_empty(), "scratch directory must be removed");
    }

    #[test]
    fn test_run_with_default_scratch_location() {
        let fixture = Fixture::new();
        let source = fixture.input("app.conf", "key = 1");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "etc/app.conf")]);

        job.run(None, None).expect("Job should succeed");

        let staged = fixture.destination.join("etc").join("app.conf");
        assert_eq!(fs::read_to_string(staged).expect("read staged"), "key = 1");
        let parent = fixture.destination.parent().expect("destination parent");
        assert_eq!(file_names(parent), vec!["inputs", "release", "scratch"]);
    }

    #[test]
    fn test_failed_entry_leaves_destination_absent() {
        let fixture = Fixture::new();
        let good = fixture.input("good.txt", "good");
        let sources = vec![
            SourceEntry::new(&good, ""),
            SourceEntry::new(fixture.inputs.join("missing.txt"), ""),
        ];
        let mut job = Job::new(&fixture.destination, sources);

        let err = job
            .run_with(&fixture.options(), None, None, None)
            .expect_err("missing source must fail the job");

        assert!(matches!(err.inner(), EngineError::SourceNotFound { .. }));
        assert!(err.to_string().contains("missing.txt"));
        assert!(!fixture.destination.exists());
        assert!(fixture.scratch_is_empty());
    }

    #[test]
    fn test_failed_entry_keeps_previous_destination() {
        let fixture = Fixture::new();
        fs::create_dir(&fixture.destination).expect("Failed to create destination");
        fs::write(fixture.destination.join("old.txt"), "old").expect("Failed to write old file");
        let sources = vec![SourceEntry::new(&fixture.inputs, "dir")];
        let mut job = Job::new(&fixture.destination, sources);

        let err = job
            .run_with(&fixture.options(), None, None, None)
            .expect_err("directory source must fail the job");

        assert!(matches!(err.inner(), EngineError::SourceIsDirectory { .. }));
        assert_eq!(file_names(&fixture.destination), vec!["old.txt"]);
        assert!(fixture.scratch_is_empty());
    }

    #[test]
    fn test_escaping_destination_rejected() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "../../a.txt")]);

        let err = job
            .run_with(&fixture.options(), None, None, None)
            .expect_err("escape must fail the job");

        assert!(matches!(err.inner(), EngineError::DestinationEscapesRoot { .. }));
        assert!(!fixture.destination.exists());
        assert!(fixture.scratch_is_empty());
    }

    #[test]
    fn test_dot_segments_do_not_leave_directories() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut entry = SourceEntry::new(&source, "sub/./../a.txt");
        entry.checksum = Some(ChecksumAlgorithm::Md5);
        let mut job = Job::new(&fixture.destination, vec![entry]);

        job.run_with(&fixture.options(), None, None, None)
            .expect("Job should succeed");

        assert_eq!(file_names(&fixture.destination), vec!["a.txt", "a.txt.md5"]);
        let staged = &job.sources[0].destination_path;
        assert_eq!(staged.file_name().and_then(|n| n.to_str()), Some("a.txt"));
        assert!(!staged.components().any(|c| c.as_os_str() == "sub" || c.as_os_str() == ".."));
        assert!(fixture.scratch_is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_after_hook_writes_to_sinks() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "")]);
        job.after_hooks = tokens(&["sh", "-c", "echo staged; echo note >&2"]);

        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();
        job.run_with(&fixture.options(), Some(&mut out), Some(&mut err), None)
            .expect("Job should succeed");

        assert_eq!(String::from_utf8_lossy(&out), "staged\n");
        assert_eq!(String::from_utf8_lossy(&err), "note\n");
        assert!(fixture.destination.join("a.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_after_hook_placeholder_is_not_substituted() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "")]);
        job.after_hooks = tokens(&["echo", "${target}"]);

        let mut out: Vec<u8> = Vec::new();
        job.run_with(&fixture.options(), Some(&mut out), None, None)
            .expect("Job should succeed");

        assert_eq!(String::from_utf8_lossy(&out), "${target}\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_after_hook_blocks_publication() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "")]);
        job.after_hooks = tokens(&["sh", "-c", "exit 4"]);

        let err = job
            .run_with(&fixture.options(), None, None, None)
            .expect_err("after-hook failure must fail the job");

        assert!(matches!(err, EngineError::CommandExecution { .. }));
        assert!(!fixture.destination.exists());
        assert!(fixture.scratch_is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_single_token_after_hook_does_not_run() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "")]);
        job.after_hooks = tokens(&["false"]);

        job.run_with(&fixture.options(), None, None, None)
            .expect("bare program name is not a hook");
        assert!(fixture.destination.join("a.txt").exists());
    }

    #[test]
    fn test_missing_scratch_parent_fails_before_staging() {
        let fixture = Fixture::new();
        let source = fixture.input("a.txt", "a");
        let mut job = Job::new(&fixture.destination, vec![SourceEntry::new(&source, "")]);
        let options = RunOptions {
            scratch_parent: Some(fixture.scratch.join("missing")),
        };

        let err = job
            .run_with(&options, None, None, None)
            .expect_err("scratch parent must exist");

        assert!(matches!(err, EngineError::Io { .. }));
        assert!(!fixture.destination.exists());
    }

    // Records callback invocations in order
    struct RecordingProgress {
        calls: Mutex<Vec<String>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn on_job_started(&self, job: &Job, staging_root: &Path) {
            assert!(staging_root.is_dir());
            self.calls
                .lock()
                .unwrap()
                .push(format!("job_started({})", job.sources.len()));
        }

        fn on_entry_started(&self, index: usize, _entry: &SourceEntry) {
            self.calls.lock().unwrap().push(format!("entry_started({})", index));
        }

        fn on_entry_staged(&self, index: usize, entry: &SourceEntry) {
            assert!(entry.destination_path.is_file());
            self.calls.lock().unwrap().push(format!("entry_staged({})", index));
        }

        fn on_job_published(&self, job: &Job) {
            assert!(job.destination_dir.is_dir());
            self.calls.lock().unwrap().push("job_published".to_string());
        }
    }

    #[test]
    fn test_run_invokes_callbacks_in_order() {
        let fixture = Fixture::new();
        let sources = vec![
            SourceEntry::new(fixture.input("a.txt", "a"), ""),
            SourceEntry::new(fixture.input("b.txt", "b"), ""),
        ];
        let mut job = Job::new(&fixture.destination, sources);
        let progress = RecordingProgress {
            calls: Mutex::new(Vec::new()),
        };

        job.run_with(&fixture.options(), None, None, Some(&progress))
            .expect("Job should succeed");

        let calls = progress.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "job_started(2)",
                "entry_started(0)",
                "entry_staged(0)",
                "entry_started(1)",
                "entry_staged(1)",
                "job_published",
            ]
        );
    }
}
