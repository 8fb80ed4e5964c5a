//! Qcow2 delta disk creation.
//!
//! Each VM gets a qcow2 overlay backed by the shared golden image.
//! Reads come from the golden image (shared), writes go to the delta (per-VM).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::{filenames, tools};
use crate::runtime::delta_disk_path;
use crate::util::ToolRunner;

/// Backing file format for qcow2 overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackingFormat {
    /// Raw disk image
    Raw,
}

impl BackingFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackingFormat::Raw => "raw",
        }
    }
}

/// Format of the golden image as referenced by every delta disk.
pub const GOLDEN_FORMAT: BackingFormat = BackingFormat::Raw;

/// Create `{instance_dir}/disk.img` backed by `golden_image`.
///
/// Equivalent to:
/// `qemu-img create -f qcow2 -F raw -b <golden> disk.img` run inside `instance_dir`.
/// The golden image is only referenced as a backing file, never opened for write.
pub fn create_delta_disk(
    runner: &dyn ToolRunner,
    instance_dir: &Path,
    golden_image: &Path,
) -> RunvmResult<PathBuf> {
    let qemu_img = runner.locate(tools::QEMU_IMG)?;

    if !golden_image.is_absolute() {
        return Err(RunvmError::DiskCreate(format!(
            "golden image path must be absolute: {}",
            golden_image.display()
        )));
    }
    if !golden_image.is_file() {
        return Err(RunvmError::DiskCreate(format!(
            "golden image {} does not exist",
            golden_image.display()
        )));
    }

    tracing::info!(
        "Creating delta disk in {} (backing: {}, format: {})",
        instance_dir.display(),
        golden_image.display(),
        GOLDEN_FORMAT.as_str()
    );

    let args: Vec<OsString> = vec![
        "create".into(),
        "-f".into(),
        "qcow2".into(),
        "-F".into(),
        GOLDEN_FORMAT.as_str().into(),
        "-b".into(),
        golden_image.as_os_str().to_owned(),
        filenames::DELTA_DISK.into(),
    ];

    let output = runner
        .run(&qemu_img, &args, Some(instance_dir))
        .map_err(|e| match e {
            RunvmError::ToolNotFound { .. } => e,
            other => RunvmError::DiskCreate(format!("failed to run qemu-img: {other}")),
        })?;

    if !output.success {
        return Err(RunvmError::DiskCreate(format!(
            "qemu-img failed in {}: {}",
            instance_dir.display(),
            output.failure_message()
        )));
    }

    let path = delta_disk_path(instance_dir);
    tracing::info!("Created delta disk: {}", path.display());
    Ok(path)
}
