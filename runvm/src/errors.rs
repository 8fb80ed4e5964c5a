//! Error taxonomy for the VM provisioning and lifecycle core.
//!
//! Every external-process or daemon call either succeeds or fails the whole
//! operation; variants identify which stage failed so a caller can decide
//! whether to `kill` a half-provisioned instance.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type RunvmResult<T> = Result<T, RunvmError>;

#[derive(Debug, Error)]
pub enum RunvmError {
    /// Missing or malformed configuration file.
    #[error("config: {0}")]
    Config(String),

    /// A required external binary is not on the search path.
    #[error("{tool} is not installed on your PATH")]
    ToolNotFound { tool: String },

    /// A staging artifact could not be written into the instance directory.
    #[error("could not write {artifact} to {}: {source}", path.display())]
    ArtifactWrite {
        artifact: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The disk image tool failed to create the delta disk.
    #[error("delta disk: {0}")]
    DiskCreate(String),

    /// The ISO mastering tool failed to build the seed image.
    #[error("seed image: {0}")]
    SeedBuild(String),

    /// The network-info helper failed or produced malformed output.
    #[error("network resolution: {0}")]
    NetworkResolution(String),

    /// The virtualization daemon could not be reached.
    #[error("hypervisor connection: {0}")]
    Connection(String),

    /// The daemon rejected the domain description.
    #[error("define domain: {0}")]
    Define(String),

    /// The domain was defined but failed to start.
    #[error("start domain: {0}")]
    Start(String),

    /// The golden image content hash did not match the configured digest.
    #[error("golden image {} failed integrity check: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// No domain with the given name is defined.
    #[error("no virtual machine named '{0}'")]
    NotFound(String),

    /// Domain description serialization failed.
    #[error("marshal domain description: {0}")]
    Marshal(String),

    /// The backend does not implement this operation.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A lifecycle transition on an existing domain failed.
    #[error("{op} '{id}': {message}")]
    Lifecycle {
        op: &'static str,
        id: String,
        message: String,
    },

    /// A bind-mount source could not be inspected.
    #[error("invalid mount: {0}")]
    InvalidMount(String),

    /// Filesystem operation outside artifact staging.
    #[error("storage: {0}")]
    Storage(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl RunvmError {
    /// Short name of the stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            RunvmError::Config(_) => "config",
            RunvmError::ToolNotFound { .. } => "tool-lookup",
            RunvmError::ArtifactWrite { .. } => "seed-write",
            RunvmError::DiskCreate(_) => "delta-disk",
            RunvmError::SeedBuild(_) => "seed-image",
            RunvmError::NetworkResolution(_) => "network",
            RunvmError::Connection(_) => "connect",
            RunvmError::Define(_) => "define",
            RunvmError::Start(_) => "start",
            RunvmError::Integrity { .. } => "integrity",
            RunvmError::NotFound(_) => "lookup",
            RunvmError::Marshal(_) => "marshal",
            RunvmError::Unsupported(_) => "unsupported",
            RunvmError::Lifecycle { op, .. } => op,
            RunvmError::InvalidMount(_) => "mount",
            RunvmError::Storage(_) => "storage",
            RunvmError::Internal(_) => "internal",
        }
    }

    /// True when the error means the domain does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunvmError::NotFound(_))
    }
}
