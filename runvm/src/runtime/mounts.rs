//! Filesystem passthrough plan for extra bind mounts.
//!
//! 9p shares are directory-granular, so several container mounts may be
//! served by one host directory. [`MountPlan`] decides the shares once; the
//! seed builder renders the guest mount commands and the domain synthesizer
//! the `<filesystem>` entries from the same plan, so every tag the guest
//! mounts is one the domain defines.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::errors::{RunvmError, RunvmResult};

/// Number of SHA-1 bytes kept in a label (30 hex chars).
const LABEL_BYTES: usize = 15;

/// Derive the 9p tag for a guest destination path.
///
/// `/` is replaced by `_`, the result is hashed with SHA-1 and the first
/// 15 bytes are hex-encoded.
pub fn mount_label(destination: &str) -> String {
    let flattened = destination.replace('/', "_");
    let digest = Sha1::digest(flattened.as_bytes());
    hex::encode(&digest[..LABEL_BYTES])
}

/// How one container destination is served from a share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestMount {
    /// The share itself is mounted at the destination.
    Directory { destination: String },
    /// A single file of the share is bind-mounted onto the destination.
    File {
        file_name: String,
        destination: String,
    },
}

impl GuestMount {
    pub fn destination(&self) -> &str {
        match self {
            GuestMount::Directory { destination } | GuestMount::File { destination, .. } => {
                destination
            }
        }
    }
}

/// A host directory exported to the guest under one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Share {
    pub source_dir: PathBuf,
    pub tag: String,
    /// Directory mount first, if any, then file mounts.
    pub mounts: Vec<GuestMount>,
}

impl Share {
    /// Destination the share is mounted on directly, if it backs a directory mount.
    pub fn directory_destination(&self) -> Option<&str> {
        self.mounts.iter().find_map(|m| match m {
            GuestMount::Directory { destination } => Some(destination.as_str()),
            GuestMount::File { .. } => None,
        })
    }
}

/// Every extra share of one VM, in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountPlan {
    shares: Vec<Share>,
}

impl MountPlan {
    /// Plan the shares for `mounts` (host source -> container destination).
    ///
    /// Sources are inspected on the host; an unreadable source is
    /// `InvalidMount`. A destination claimed by an earlier source is skipped.
    /// Directory sources become shares tagged by their destination. A file
    /// source joins the share of its parent directory, or creates one tagged
    /// by the file's destination.
    pub fn resolve(mounts: &BTreeMap<PathBuf, String>) -> RunvmResult<Self> {
        let mut claimed = BTreeSet::new();
        let mut directories = Vec::new();
        let mut files = Vec::new();

        for (source, destination) in mounts {
            if !claimed.insert(destination.as_str()) {
                tracing::warn!(
                    source = %source.display(),
                    destination = %destination,
                    "Destination already mounted, skipping"
                );
                continue;
            }

            let metadata = std::fs::metadata(source)
                .map_err(|e| RunvmError::InvalidMount(format!("{}: {e}", source.display())))?;
            if metadata.is_dir() {
                directories.push((absolute(source)?, destination));
            } else {
                files.push((absolute(source)?, destination));
            }
        }

        let mut shares: Vec<Share> = directories
            .into_iter()
            .map(|(source_dir, destination)| Share {
                source_dir,
                tag: mount_label(destination),
                mounts: vec![GuestMount::Directory {
                    destination: destination.clone(),
                }],
            })
            .collect();

        for (source, destination) in files {
            let (parent, file_name) = split_file(&source)?;
            let mount = GuestMount::File {
                file_name,
                destination: destination.clone(),
            };

            match shares.iter_mut().find(|s| s.source_dir == parent) {
                Some(share) => {
                    tracing::debug!(
                        source = %source.display(),
                        tag = %share.tag,
                        "File mount served by an existing share"
                    );
                    share.mounts.push(mount);
                }
                None => shares.push(Share {
                    source_dir: parent,
                    tag: mount_label(destination),
                    mounts: vec![mount],
                }),
            }
        }

        Ok(Self { shares })
    }

    pub fn shares(&self) -> &[Share] {
        &self.shares
    }

    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

fn absolute(path: &Path) -> RunvmResult<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| RunvmError::InvalidMount(format!("{}: {e}", path.display())))
}

fn split_file(source: &Path) -> RunvmResult<(PathBuf, String)> {
    match (source.parent(), source.file_name()) {
        (Some(parent), Some(name)) => {
            Ok((parent.to_path_buf(), name.to_string_lossy().into_owned()))
        }
        _ => Err(RunvmError::InvalidMount(format!(
            "{} has no parent directory",
            source.display()
        ))),
    }
}
