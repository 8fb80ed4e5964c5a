//! Constants for the runvm runtime
//!
//! Centralized location for hardcoded paths, file names and VM defaults.

pub mod envs {
    /// Overrides the configuration search path with a single file.
    pub const RUNVM_CONFIG: &str = "RUNVM_CONFIG";

    /// Overrides the directory searched for helper scripts.
    pub const RUNVM_HELPER_DIR: &str = "RUNVM_HELPER_DIR";
}

/// Configuration file search locations
pub mod config_paths {
    /// Relative to the directory containing the runtime executable
    pub const EXEC_RELATIVE: &str = "hypervisor/config.json";

    /// System-wide fallback
    pub const SYSTEM: &str = "/etc/runvm/config.json";
}

/// Virtual machine resource defaults, applied when the config leaves a field zero
pub mod vm_defaults {
    pub const BACKEND: &str = "KVM";

    pub const NUM_CPUS: u32 = 1;

    pub const MAX_CPUS: u32 = 2;

    /// Memory in MiB
    pub const MEMORY_MIB: u32 = 256;

    /// Memory ceiling in MiB
    pub const MAX_MEMORY_MIB: u32 = 256;

    /// Shared read-only golden disk image
    pub const GOLDEN_IMAGE: &str = "/var/lib/libvirt/images/disk.img.orig";

    pub const CONNECT_URI: &str = "qemu:///system";

    /// Root of all per-instance directories
    pub const RUN_DIR: &str = "/var/run/docker-qemu";
}

/// External tools and helpers
pub mod tools {
    pub const QEMU_IMG: &str = "qemu-img";
    pub const GENISOIMAGE: &str = "genisoimage";
    pub const VIRSH: &str = "virsh";
    pub const NETINFO: &str = "netinfo.sh";
}

/// File names inside an instance directory
pub mod filenames {
    pub const DELTA_DISK: &str = "disk.img";
    pub const SEED_IMAGE: &str = "seed.img";
    pub const USER_DATA: &str = "user-data";
    pub const META_DATA: &str = "meta-data";
    pub const SYSTEMD_UNIT: &str = "systemd-data";
    pub const LAUNCHER: &str = "execute.sh";
    pub const RESOLV_CONF: &str = "resolv.conf";
    pub const HOSTS: &str = "hosts";
    pub const DOMAIN_XML: &str = "domain.xml";
    pub const SERIAL_SOCK: &str = "serial.sock";
    pub const CONTROL_SOCK: &str = "arbritary.sock";
    pub const APP_SOCK: &str = "app.sock";
}

/// Guest-side paths and tags
pub mod guest {
    /// Filesystem passthrough tag of the container rootfs
    pub const ROOTFS_TAG: &str = "share_dir";

    /// Where the guest mounts the container rootfs
    pub const ROOT_MOUNT: &str = "/mnt";

    /// Guest directory holding shares that only serve file mounts
    pub const SHARE_STAGING: &str = "/run/runvm";

    /// Where the guest mounts the seed CD-ROM
    pub const CDROM_MOUNT: &str = "/cdrom";

    /// Virtio console the launcher writes workload output to
    pub const APP_CONSOLE_DEVICE: &str = "/dev/hvc1";

    /// Name of the one-shot unit installed in the guest
    pub const UNIT_NAME: &str = "myscript";

    /// Guest network interface configured from meta-data
    pub const NET_INTERFACE: &str = "ens4";
}

/// Console bridge tuning
pub mod console {
    use std::time::Duration;

    /// Bound on the initial console dial
    pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

    /// Line channel capacity between the reader task and the writer
    pub const LINE_CHANNEL_CAPACITY: usize = 128;
}
