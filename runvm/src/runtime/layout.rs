use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::filenames;
use std::path::{Path, PathBuf};

/// Delta disk path inside an instance directory: {dir}/disk.img
pub fn delta_disk_path(instance_dir: &Path) -> PathBuf {
    instance_dir.join(filenames::DELTA_DISK)
}

/// Seed image path inside an instance directory: {dir}/seed.img
pub fn seed_image_path(instance_dir: &Path) -> PathBuf {
    instance_dir.join(filenames::SEED_IMAGE)
}

// ============================================================================
// RUNTIME LAYOUT (run directory)
// ============================================================================

/// Root of all per-instance directories (default: /var/run/docker-qemu).
#[derive(Clone, Debug)]
pub struct RuntimeLayout {
    run_dir: PathBuf,
}

impl RuntimeLayout {
    pub fn new(run_dir: PathBuf) -> Self {
        Self { run_dir }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Layout for a single instance. The id doubles as the directory name.
    pub fn instance(&self, id: &str) -> InstanceLayout {
        InstanceLayout::new(self.run_dir.join(id))
    }
}

// ============================================================================
// INSTANCE LAYOUT (per-VM directory)
// ============================================================================

/// Filesystem layout for a single VM instance.
///
/// The directory is owned exclusively by one VM's lifecycle.
///
/// ```text
/// /var/run/docker-qemu/{id}/
/// ├── disk.img          # qcow2 delta over the golden image
/// ├── seed.img          # cidata ISO
/// ├── user-data
/// ├── meta-data
/// ├── systemd-data      # one-shot unit installed in the guest
/// ├── execute.sh        # workload launcher
/// ├── resolv.conf
/// ├── hosts
/// ├── domain.xml        # last definition handed to the daemon
/// ├── serial.sock       # serial console (port 0)
/// ├── arbritary.sock    # virtio control channel (port 1)
/// └── app.sock          # virtio workload stdout (port 2)
/// ```
#[derive(Clone, Debug)]
pub struct InstanceLayout {
    dir: PathBuf,
}

impl InstanceLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        &self.dir
    }

    // ========================================================================
    // DISKS
    // ========================================================================

    pub fn delta_disk_path(&self) -> PathBuf {
        delta_disk_path(&self.dir)
    }

    pub fn seed_image_path(&self) -> PathBuf {
        seed_image_path(&self.dir)
    }

    // ========================================================================
    // SEED ARTIFACTS
    // ========================================================================

    pub fn user_data_path(&self) -> PathBuf {
        self.dir.join(filenames::USER_DATA)
    }

    pub fn meta_data_path(&self) -> PathBuf {
        self.dir.join(filenames::META_DATA)
    }

    pub fn unit_path(&self) -> PathBuf {
        self.dir.join(filenames::SYSTEMD_UNIT)
    }

    pub fn launcher_path(&self) -> PathBuf {
        self.dir.join(filenames::LAUNCHER)
    }

    pub fn resolv_conf_path(&self) -> PathBuf {
        self.dir.join(filenames::RESOLV_CONF)
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.dir.join(filenames::HOSTS)
    }

    pub fn domain_xml_path(&self) -> PathBuf {
        self.dir.join(filenames::DOMAIN_XML)
    }

    // ========================================================================
    // CONSOLE SOCKETS
    // ========================================================================

    pub fn serial_socket_path(&self) -> PathBuf {
        self.dir.join(filenames::SERIAL_SOCK)
    }

    /// Virtio channel reserved for host-side control.
    pub fn control_socket_path(&self) -> PathBuf {
        self.dir.join(filenames::CONTROL_SOCK)
    }

    /// Virtio channel carrying workload stdout.
    pub fn app_socket_path(&self) -> PathBuf {
        self.dir.join(filenames::APP_SOCK)
    }

    // ========================================================================
    // PREPARATION AND CLEANUP
    // ========================================================================

    /// Create the instance directory (mode 0700).
    pub fn prepare(&self) -> RunvmResult<()> {
        use std::os::unix::fs::DirBuilderExt;

        std::fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(&self.dir)
            .map_err(|e| {
                RunvmError::Storage(format!(
                    "could not create directory {}: {e}",
                    self.dir.display()
                ))
            })
    }

    /// Remove the instance directory and everything in it.
    pub fn remove(&self) -> RunvmResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir).map_err(|e| {
                RunvmError::Storage(format!(
                    "failed to remove {}: {e}",
                    self.dir.display()
                ))
            })?;
        }
        Ok(())
    }
}
