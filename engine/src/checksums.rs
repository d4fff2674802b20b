//! Checksum computation and sidecar files.
//!
//! This module provides:
//! - The closed set of supported algorithms (SHA-256, SHA-1, MD5)
//! - File digests, as raw bytes or lowercase hex
//! - Sidecar files (`<file>.<algorithm>`) holding the hex digest
//!
//! Every digest call builds its own hasher through `create_hasher`; no hash
//! state is shared between calls.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Deserializer};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Supported checksum algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256 (cryptographic, 256-bit)
    Sha256,
    /// SHA-1 (160-bit, kept for compatibility)
    Sha1,
    /// MD5 (deprecated, but included for compatibility)
    Md5,
}

impl ChecksumAlgorithm {
    /// Lowercase name, also used as the sidecar file extension.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "sha1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            _ => Err(EngineError::UnsupportedAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Decode the `checksum` field of a job description.
///
/// Absent, `null` and `""` all mean "no checksum"; any other unknown name is
/// rejected while decoding rather than when the entry is staged.
pub fn deserialize_optional_algorithm<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<ChecksumAlgorithm>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Trait for computing checksums
pub trait ChecksumHasher {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize and return the digest bytes
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// MD5 hasher (backed by md5 crate)
struct Md5Hasher {
    context: md5::Context,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        self.context.consume(data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.context.compute().0.to_vec()
    }
}

/// Any RustCrypto `Digest` implementation (SHA-1, SHA-256)
struct DigestHasher<D> {
    hasher: D,
}

impl<D: sha2::Digest> ChecksumHasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) {
        sha2::Digest::update(&mut self.hasher, data);
    }

    fn finalize(self: Box<Self>) -> Vec<u8> {
        sha2::Digest::finalize(self.hasher).to_vec()
    }
}

/// Create a new hasher for the given algorithm
pub fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Sha256 => Box::new(DigestHasher {
            hasher: sha2::Sha256::default(),
        }),
        ChecksumAlgorithm::Sha1 => Box::new(DigestHasher {
            hasher: sha1::Sha1::default(),
        }),
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher {
            context: md5::Context::new(),
        }),
    }
}

/// Compute the digest of a file's full contents.
///
/// # Errors
/// Returns `EngineError::Io` if the file cannot be read.
pub fn digest(path: &Path, algorithm: ChecksumAlgorithm) -> Result<Vec<u8>> {
    let content = fs::read(path).map_err(|e| EngineError::io(path, e))?;
    let mut hasher = create_hasher(algorithm);
    hasher.update(&content);
    Ok(hasher.finalize())
}

/// Compute the digest of a file and render it as lowercase hex.
pub fn digest_hex(path: &Path, algorithm: ChecksumAlgorithm) -> Result<String> {
    let bytes = digest(path, algorithm)?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Parse an algorithm name and digest the file as hex.
///
/// Empty or unknown names fail with `UnsupportedAlgorithm` before the file
/// is touched.
pub fn digest_hex_named(path: &Path, algorithm: &str) -> Result<String> {
    digest_hex(path, algorithm.parse()?)
}

/// Path of the sidecar file for `path`: the file name with `.<algorithm>` appended.
pub fn sidecar_path(path: &Path, algorithm: ChecksumAlgorithm) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(algorithm.name());
    PathBuf::from(name)
}

/// Write the hex digest of `path` to its sidecar file.
///
/// The sidecar holds the bare hex string with no trailing newline.
/// Returns the sidecar path.
pub fn write_sidecar(path: &Path, algorithm: ChecksumAlgorithm) -> Result<PathBuf> {
    let hex = digest_hex(path, algorithm).map_err(|e| EngineError::Checksum {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;
    let sidecar = sidecar_path(path, algorithm);
    fs::write(&sidecar, hex.as_bytes()).map_err(|e| EngineError::io(&sidecar, e))?;
    Ok(sidecar)
}
