//! Cloud-init seed image.
//!
//! The seed is an ISO9660 `cidata` volume attached as the guest's CD-ROM. It
//! carries the NoCloud documents plus the files the guest copies into the
//! container root on first boot:
//!
//! - `user-data` / `meta-data` - cloud-init documents
//! - `systemd-data` - one-shot unit running the launcher
//! - `execute.sh` - workload launcher
//! - `resolv.conf` / `hosts` - copied into the container's /etc

mod cloud_config;
mod script;
mod unit;

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::{filenames, tools};
use crate::runtime::{MountPlan, VirtualMachineParams, seed_image_path};
use crate::util::ToolRunner;

pub use cloud_config::{MetaData, UserData, extra_mount_commands, guest_path};
pub use script::{LauncherScript, render_command, shell_escape, shell_quote};
pub use unit::UnitFile;

/// Volume id NoCloud looks for.
pub const SEED_VOLUME_ID: &str = "cidata";

/// Mode for staged artifacts.
const ARTIFACT_MODE: u32 = 0o700;

/// Rendered seed contents, in the order they are packed into the ISO.
#[derive(Debug, Clone)]
pub struct SeedArtifacts {
    files: Vec<(&'static str, Vec<u8>)>,
}

impl SeedArtifacts {
    /// Render every document for `params`.
    pub fn render(params: &VirtualMachineParams, mounts: &MountPlan) -> RunvmResult<Self> {
        let files = vec![
            (
                filenames::USER_DATA,
                UserData::for_params(params, mounts).render()?.into_bytes(),
            ),
            (
                filenames::META_DATA,
                MetaData::for_params(params).render()?.into_bytes(),
            ),
            (
                filenames::SYSTEMD_UNIT,
                UnitFile::workload().render().into_bytes(),
            ),
            (
                filenames::LAUNCHER,
                LauncherScript::for_params(params).render().into_bytes(),
            ),
            (filenames::RESOLV_CONF, params.resolv_conf.clone()),
            (filenames::HOSTS, params.hosts.clone()),
        ];
        Ok(Self { files })
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files.iter().map(|(name, _)| *name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, content)| content.as_slice())
    }

    /// Write every artifact into `dir`.
    pub fn write_to(&self, dir: &Path) -> RunvmResult<()> {
        for (name, content) in &self.files {
            write_artifact(dir, name, content)?;
        }
        Ok(())
    }
}

fn write_artifact(dir: &Path, artifact: &'static str, content: &[u8]) -> RunvmResult<()> {
    let path = dir.join(artifact);
    let result = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(ARTIFACT_MODE)
        .open(&path)
        .and_then(|mut file| file.write_all(content));

    result.map_err(|source| RunvmError::ArtifactWrite {
        artifact,
        path: path.clone(),
        source,
    })?;

    tracing::debug!(artifact, path = %path.display(), bytes = content.len(), "Wrote seed artifact");
    Ok(())
}

/// Build `{disk_dir}/seed.img` for `params`.
///
/// Fails with `ToolNotFound` before anything is written if genisoimage is
/// missing. Artifacts stay in the instance directory after a failure.
pub fn build_seed_image(
    runner: &dyn ToolRunner,
    params: &VirtualMachineParams,
    mounts: &MountPlan,
) -> RunvmResult<PathBuf> {
    let genisoimage = runner.locate(tools::GENISOIMAGE)?;
    let dir = params.disk_dir.as_path();
    if dir.as_os_str().is_empty() {
        return Err(RunvmError::Internal(format!(
            "instance directory not set for {}",
            params.id
        )));
    }

    let artifacts = SeedArtifacts::render(params, mounts)?;
    artifacts.write_to(dir)?;

    let mut args: Vec<OsString> = vec![
        "-output".into(),
        filenames::SEED_IMAGE.into(),
        "-volid".into(),
        SEED_VOLUME_ID.into(),
        "-joliet".into(),
        "-rock".into(),
    ];
    args.extend(artifacts.names().map(OsString::from));

    tracing::info!(id = %params.id, dir = %dir.display(), "Building seed image");
    let output = runner.run(&genisoimage, &args, Some(dir)).map_err(|e| match e {
        RunvmError::ToolNotFound { .. } => e,
        other => RunvmError::SeedBuild(format!("failed to run genisoimage: {other}")),
    })?;

    if !output.success {
        return Err(RunvmError::SeedBuild(format!(
            "genisoimage failed in {}: {}",
            dir.display(),
            output.failure_message()
        )));
    }

    let path = seed_image_path(dir);
    tracing::info!("Created seed image: {}", path.display());
    Ok(path)
}
