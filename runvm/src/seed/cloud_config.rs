//! NoCloud user-data and meta-data documents.

use std::path::Path;

use serde::Serialize;

use super::script::shell_escape;
use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::{filenames, guest};
use crate::runtime::{GuestMount, MountPlan, VirtualMachineParams};

const CLOUD_CONFIG_HEADER: &str = "#cloud-config\n";

/// Seconds to let the 9p root share settle before touching it.
const ROOT_SETTLE_SECS: u32 = 2;

/// `#cloud-config` user-data.
#[derive(Debug, Serialize)]
pub struct UserData {
    pub hostname: String,
    pub runcmd: Vec<String>,
}

/// NoCloud meta-data.
#[derive(Debug, Serialize)]
pub struct MetaData {
    #[serde(rename = "instance-id")]
    pub instance_id: String,
    #[serde(rename = "local-hostname")]
    pub local_hostname: String,
    #[serde(rename = "network-interfaces")]
    pub network_interfaces: String,
}

/// Path of a container destination under the guest's root mount.
pub fn guest_path(destination: &str) -> String {
    if destination.starts_with('/') {
        format!("{}{}", guest::ROOT_MOUNT, destination)
    } else {
        format!("{}/{}", guest::ROOT_MOUNT, destination)
    }
}

fn mount_9p(tag: &str, target: &str) -> String {
    format!("mount -t 9p -o trans=virtio {} {}", tag, shell_escape(target))
}

/// Guest commands mounting every planned share, then the file binds.
///
/// A share backing a directory mount is mounted on that destination; a
/// share serving only files is mounted under a staging directory.
pub fn extra_mount_commands(mounts: &MountPlan) -> Vec<String> {
    let mut commands = Vec::new();
    let mut binds = Vec::new();

    for share in mounts.shares() {
        let mount_point = match share.directory_destination() {
            Some(destination) => guest_path(destination),
            None => format!("{}/{}", guest::SHARE_STAGING, share.tag),
        };
        commands.push(format!("mkdir -p {}", shell_escape(&mount_point)));
        commands.push(mount_9p(&share.tag, &mount_point));

        for mount in &share.mounts {
            if let GuestMount::File {
                file_name,
                destination,
            } = mount
            {
                binds.push((format!("{mount_point}/{file_name}"), guest_path(destination)));
            }
        }
    }

    for (source, target) in binds {
        if let Some(parent) = Path::new(&target).parent() {
            commands.push(format!("mkdir -p {}", shell_escape(&parent.to_string_lossy())));
        }
        commands.push(format!("touch {}", shell_escape(&target)));
        commands.push(format!(
            "mount --bind {} {}",
            shell_escape(&source),
            shell_escape(&target)
        ));
    }
    commands
}

impl UserData {
    pub fn for_params(params: &VirtualMachineParams, mounts: &MountPlan) -> Self {
        let root = guest::ROOT_MOUNT;
        let cdrom = guest::CDROM_MOUNT;
        let unit = guest::UNIT_NAME;

        let mut runcmd = vec![
            mount_9p(guest::ROOTFS_TAG, root),
            format!("sleep {ROOT_SETTLE_SECS}"),
        ];
        runcmd.extend(extra_mount_commands(mounts));
        runcmd.extend([
            format!("mkdir -p {cdrom}"),
            format!("mount /dev/cdrom {cdrom}"),
            format!("cp -p {cdrom}/{} {root}/.", filenames::LAUNCHER),
            format!("cp -p {cdrom}/{} {root}/etc/.", filenames::RESOLV_CONF),
            format!("cp -p {cdrom}/{} {root}/etc/.", filenames::HOSTS),
            format!(
                "cp -p {cdrom}/{} /etc/systemd/system/{unit}.service",
                filenames::SYSTEMD_UNIT
            ),
            format!("mount --bind /dev {root}/dev"),
            format!("mount --bind /proc {root}/proc"),
            format!("systemctl enable {unit}"),
            format!("systemctl start {unit}"),
        ]);

        Self {
            hostname: params.id.clone(),
            runcmd,
        }
    }

    pub fn render(&self) -> RunvmResult<String> {
        render_yaml(self, Some(CLOUD_CONFIG_HEADER), filenames::USER_DATA)
    }
}

impl MetaData {
    pub fn for_params(params: &VirtualMachineParams) -> Self {
        let iface = guest::NET_INTERFACE;
        let net = &params.net_info;
        let network_interfaces = format!(
            "auto {iface}\niface {iface} inet static\naddress {}\nnetmask {}\ngateway {}\n",
            net.ip_addr, net.net_mask, net.gateway
        );

        Self {
            instance_id: params.id.clone(),
            local_hostname: params.id.clone(),
            network_interfaces,
        }
    }

    pub fn render(&self) -> RunvmResult<String> {
        render_yaml(self, None, filenames::META_DATA)
    }
}

fn render_yaml<T: Serialize>(
    doc: &T,
    header: Option<&str>,
    artifact: &str,
) -> RunvmResult<String> {
    let body = serde_yaml::to_string(doc)
        .map_err(|e| RunvmError::SeedBuild(format!("failed to render {artifact}: {e}")))?;
    Ok(match header {
        Some(header) => format!("{header}{body}"),
        None => body,
    })
}
