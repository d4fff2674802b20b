//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Copying a file into the staging tree with mtime preservation
//! - Creating parent directories
//! - Path containment checks
//! - Publishing a staged tree with a single rename

use crate::error::{EngineError, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Copy a file from source to destination, preserving its modification time.
///
/// The destination is created or truncated and synced before returning.
/// A failure part way through can leave a partial destination file behind.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::io(src, e))?;
    let src_mtime = src_file
        .metadata()
        .map_err(|e| EngineError::io(src, e))?
        .modified()
        .ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::io(dst, e))?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::io(dst, e)
        } else {
            EngineError::io(src, e)
        }
    })?;
    dst_file.sync_all().map_err(|e| EngineError::io(dst, e))?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime))
            .map_err(|e| EngineError::io(dst, e))?;
    }

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::io(
            parent,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))
        }
        Err(e) => Err(EngineError::io(parent, e)),
    }
}

/// Make `path` absolute and resolve `.` and `..` segments without touching
/// the filesystem.
///
/// `..` at the filesystem root stays at the root. An empty path is the
/// current directory.
pub fn normalize_lexically(path: &Path) -> Result<PathBuf> {
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    let absolute = std::path::absolute(path).map_err(|e| EngineError::io(path, e))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Check whether `path` lies strictly inside `root`.
///
/// Both paths are made absolute and normalized, then compared segment by
/// segment, so `/data/out-evil` is not inside `/data/out` and `root` itself
/// is not inside `root`.
pub fn is_within_root(root: &Path, path: &Path) -> Result<bool> {
    let root = normalize_lexically(root)?;
    let path = normalize_lexically(path)?;
    Ok(path.components().count() > root.components().count() && path.starts_with(&root))
}

/// Rename a staged directory into its final location.
///
/// This is the only step that makes staged content visible at
/// `destination`. There is no copy fallback: a rename across filesystems
/// fails with `CrossVolumeRename`.
pub fn publish_dir(staged: &Path, destination: &Path) -> Result<()> {
    fs::rename(staged, destination).map_err(|e| publish_error(staged, destination, e))
}

fn publish_error(staged: &Path, destination: &Path, e: io::Error) -> EngineError {
    if e.kind() == io::ErrorKind::CrossesDevices {
        EngineError::CrossVolumeRename {
            from: staged.to_path_buf(),
            to: destination.to_path_buf(),
        }
    } else {
        EngineError::Publish {
            from: staged.to_path_buf(),
            to: destination.to_path_buf(),
            source: e,
        }
    }
}
