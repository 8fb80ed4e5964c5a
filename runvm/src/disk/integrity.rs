//! Golden image integrity verification.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use sha1::{Digest, Sha1};

use crate::errors::{RunvmError, RunvmResult};

/// Read buffer size for hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the hex SHA-1 of a file, streaming it in chunks.
pub fn sha1_file(path: &Path) -> RunvmResult<String> {
    let mut file = File::open(path).map_err(|e| {
        RunvmError::Storage(format!("failed to open {}: {e}", path.display()))
    })?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| {
            RunvmError::Storage(format!("failed to read {}: {e}", path.display()))
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Fail with [`RunvmError::Integrity`] unless the file hashes to `expected_sha1`.
pub fn verify_golden_image(path: &Path, expected_sha1: &str) -> RunvmResult<()> {
    let expected = expected_sha1.trim().to_ascii_lowercase();
    let actual = sha1_file(path)?;

    if actual != expected {
        return Err(RunvmError::Integrity {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    tracing::debug!(path = %path.display(), sha1 = %actual, "Golden image verified");
    Ok(())
}

/// Runs the golden image check at most once per process.
///
/// Only a successful verification is remembered; a failure is re-checked on
/// the next call.
#[derive(Debug, Default)]
pub struct GoldenImageGate {
    verified: OnceLock<()>,
}

impl GoldenImageGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Verify `path` against `expected_sha1`, or skip when no digest is configured.
    pub fn ensure(&self, path: &Path, expected_sha1: Option<&str>) -> RunvmResult<()> {
        if self.verified.get().is_some() {
            return Ok(());
        }

        match expected_sha1 {
            Some(expected) => {
                verify_golden_image(path, expected)?;
                tracing::info!(path = %path.display(), "Golden image integrity check passed");
            }
            None => {
                tracing::warn!(
                    path = %path.display(),
                    "No Sha1Sum configured, skipping golden image verification"
                );
            }
        }

        let _ = self.verified.set(());
        Ok(())
    }

    pub fn is_verified(&self) -> bool {
        self.verified.get().is_some()
    }
}
