//! Error types for the staging engine.
//!
//! Every failure in the pipeline is terminal for the run, so there is a
//! single `EngineError` enum. Per-entry failures are wrapped in
//! `EngineError::Entry` on the way up so the top-level message names the
//! source file that caused them.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

/// Result alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that abort a staging run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The job has no source entries
    #[error("Job has no source entries")]
    NoSources,

    /// Destination path of an entry is absolute
    #[error("Destination path must be relative: {}", .path.display())]
    InvalidDestination { path: PathBuf },

    /// Resolved destination lies outside the output root
    #[error("Destination {} is outside of root {}", .path.display(), .root.display())]
    DestinationEscapesRoot { path: PathBuf, root: PathBuf },

    /// Source file does not exist
    #[error("Source file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// Source path is a directory; only regular files are staged
    #[error("Source is a directory: {}", .path.display())]
    SourceIsDirectory { path: PathBuf },

    /// Output root is missing or not a directory
    #[error("Invalid output root {}: {reason}", .path.display())]
    OutputRootInvalid { path: PathBuf, reason: String },

    /// Filesystem operation failed
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Checksum algorithm name is not one of sha256, sha1, md5
    #[error("Unsupported checksum algorithm: {name:?}")]
    UnsupportedAlgorithm { name: String },

    /// Checksum of a staged file could not be computed
    #[error("Failed to checksum {}: {source}", .path.display())]
    Checksum {
        path: PathBuf,
        #[source]
        source: Box<EngineError>,
    },

    /// Hook command has no tokens
    #[error("Command is empty")]
    InvalidCommand,

    /// Hook command could not be run or exited unsuccessfully
    #[error("Command {argv:?} failed: {source}")]
    CommandExecution {
        argv: Vec<String>,
        #[source]
        source: CommandFailure,
    },

    /// Scratch root and destination are on different filesystems
    #[error(
        "Cannot atomically rename {} to {}: paths are on different filesystems",
        .from.display(),
        .to.display()
    )]
    CrossVolumeRename { from: PathBuf, to: PathBuf },

    /// Publication rename failed
    #[error("Failed to publish {} to {}: {source}", .from.display(), .to.display())]
    Publish {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A source entry failed; carries the entry's source path
    #[error("{}: {source}", .source_path.display())]
    Entry {
        source_path: PathBuf,
        #[source]
        source: Box<EngineError>,
    },
}

/// Why a hook process did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum CommandFailure {
    /// Process could not be started (missing executable, permissions)
    #[error("spawn failed: {0}")]
    Spawn(#[from] io::Error),

    /// Process ran but exited non-zero or was killed by a signal
    #[error("exited with {0}")]
    Status(ExitStatus),
}

impl EngineError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap this error with the source path of the entry that produced it.
    pub fn for_entry(self, source_path: impl Into<PathBuf>) -> Self {
        Self::Entry {
            source_path: source_path.into(),
            source: Box::new(self),
        }
    }

    /// The underlying error with any `Entry` context stripped.
    pub fn inner(&self) -> &EngineError {
        match self {
            Self::Entry { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Io { source, .. } | Self::Publish { source, .. } => source.raw_os_error(),
            Self::CommandExecution {
                source: CommandFailure::Spawn(source),
                ..
            } => source.raw_os_error(),
            Self::Checksum { source, .. } | Self::Entry { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
