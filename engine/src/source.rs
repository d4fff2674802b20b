//! Staging of a single source entry.
//!
//! `SourceEntry::copy_into` performs, in order: normalize, validate,
//! before-hook, copy, after-hook, checksum. The first failing step aborts
//! the entry and the error is tagged with the entry's source path.

use crate::checksums;
use crate::command::{self, Substitutions};
use crate::error::{EngineError, Result};
use crate::fs_ops;
use crate::model::SourceEntry;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

impl SourceEntry {
    /// Create an entry copying `source_path` to `destination_path` under the output root.
    pub fn new(source_path: impl Into<PathBuf>, destination_path: impl Into<PathBuf>) -> Self {
        SourceEntry {
            source_path: source_path.into(),
            destination_path: destination_path.into(),
            ..Default::default()
        }
    }

    /// Stage this entry into `output_root`.
    ///
    /// On success `destination_path` holds the staged file's path with any
    /// `.` and `..` segments resolved. A failure
    /// may leave a partial file under `output_root`; the caller owns cleanup.
    pub fn copy_into(&mut self, output_root: &Path) -> Result<()> {
        self.stage(output_root)
            .map_err(|e| e.for_entry(&self.source_path))
    }

    fn stage(&mut self, output_root: &Path) -> Result<()> {
        self.normalize(output_root)?;
        self.check_configuration(output_root)?;
        // Dot segments are resolved here so the copy never creates the
        // directories they pass through.
        self.destination_path = fs_ops::normalize_lexically(&self.destination_path)?;

        if command::is_runnable(&self.before_hooks) {
            self.run_hook(&self.before_hooks, &self.source_path)?;
        }

        let bytes = fs_ops::copy_file(&self.source_path, &self.destination_path)?;
        debug!(
            source = %self.source_path.display(),
            destination = %self.destination_path.display(),
            bytes,
            "copied"
        );

        if command::is_runnable(&self.after_hooks) {
            self.run_hook(&self.after_hooks, &self.destination_path)?;
        }

        if let Some(algorithm) = self.checksum {
            let sidecar = checksums::write_sidecar(&self.destination_path, algorithm)?;
            debug!(sidecar = %sidecar.display(), %algorithm, "wrote checksum");
        }

        Ok(())
    }

    /// Resolve `destination_path` against `output_root`.
    ///
    /// An empty destination becomes the source's file name. The resolved
    /// path replaces the relative one, so this runs once per entry: a second
    /// call sees an absolute path and fails with `InvalidDestination`.
    pub fn normalize(&mut self, output_root: &Path) -> Result<()> {
        if self.destination_path.has_root() || self.destination_path.is_absolute() {
            return Err(EngineError::InvalidDestination {
                path: self.destination_path.clone(),
            });
        }

        let relative = if self.destination_path.as_os_str().is_empty() {
            match self.source_path.file_name() {
                Some(name) => PathBuf::from(name),
                None => {
                    return Err(EngineError::InvalidDestination {
                        path: self.source_path.clone(),
                    })
                }
            }
        } else {
            self.destination_path.clone()
        };

        self.destination_path = output_root.join(relative);
        Ok(())
    }

    /// Check that the entry can be staged into `output_root`.
    ///
    /// - the source exists and is not a directory
    /// - the output root is an existing directory
    /// - the resolved destination lies strictly inside the output root
    pub fn check_configuration(&self, output_root: &Path) -> Result<()> {
        let source_meta = fs::metadata(&self.source_path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                EngineError::SourceNotFound {
                    path: self.source_path.clone(),
                }
            } else {
                EngineError::io(&self.source_path, e)
            }
        })?;
        if source_meta.is_dir() {
            return Err(EngineError::SourceIsDirectory {
                path: self.source_path.clone(),
            });
        }

        match fs::metadata(output_root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(EngineError::OutputRootInvalid {
                    path: output_root.to_path_buf(),
                    reason: "not a directory".to_string(),
                })
            }
            Err(e) => {
                return Err(EngineError::OutputRootInvalid {
                    path: output_root.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }

        if !fs_ops::is_within_root(output_root, &self.destination_path)? {
            return Err(EngineError::DestinationEscapesRoot {
                path: self.destination_path.clone(),
                root: output_root.to_path_buf(),
            });
        }

        Ok(())
    }

    /// Run a hook with `${target}` bound to `target`.
    ///
    /// Entry hooks are not attached to the caller's streams; their output
    /// is captured and logged.
    fn run_hook(&self, hook: &[String], target: &Path) -> Result<()> {
        let substitutions: Substitutions =
            command::target_substitution(target.to_string_lossy().into_owned());
        let mut out: Vec<u8> = Vec::new();
        let mut err: Vec<u8> = Vec::new();

        let result = command::execute(&substitutions, hook, Some(&mut out), Some(&mut err));

        debug!(
            target = %target.display(),
            stdout = %String::from_utf8_lossy(&out),
            stderr = %String::from_utf8_lossy(&err),
            "hook finished"
        );
        result
    }
}
