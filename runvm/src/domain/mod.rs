//! Libvirt domain description synthesis.
//!
//! [`Domain::for_params`] builds a typed description from the provisioning
//! request, its mount plan and the resolved configuration;
//! [`Domain::to_xml`] serializes it. Building has no side effects.

mod devices;
pub mod xml;


pub use devices::{
    BackingStore, ConsoleDevice, ConsoleTarget, Controller, DiskDevice, DomainDisk, Filesystem,
    Graphics, Interface, ToElement,
};
use xml::Element;

use crate::config::ResolvedConfig;
use crate::disk::GOLDEN_FORMAT;
use crate::errors::RunvmResult;
use crate::runtime::constants::guest;
use crate::runtime::{InstanceLayout, MountPlan, VirtualMachineParams};

/// Host device a macvtap NIC binds to when the network helper names no bridge.
pub const DEFAULT_NIC_SOURCE: &str = "eth0";

pub const CPU_MODE: &str = "host-passthrough";

/// Lifecycle action for poweroff, reboot and crash.
const ON_EVENT: &str = "destroy";

/// A KVM domain description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub memory_mib: u32,
    pub vcpus: u32,
    pub disks: Vec<DomainDisk>,
    pub controllers: Vec<Controller>,
    pub interfaces: Vec<Interface>,
    pub filesystems: Vec<Filesystem>,
    pub consoles: Vec<ConsoleDevice>,
    pub graphics: Graphics,
}

impl Domain {
    pub fn for_params(
        params: &VirtualMachineParams,
        mounts: &MountPlan,
        config: &ResolvedConfig,
    ) -> Self {
        let layout = InstanceLayout::new(params.disk_dir.clone());

        let disks = vec![
            DomainDisk {
                device: DiskDevice::Disk,
                driver_type: "qcow2",
                file: layout.delta_disk_path(),
                backing_store: Some(BackingStore {
                    index: 1,
                    format: GOLDEN_FORMAT.as_str(),
                    file: config.golden_image.clone(),
                }),
                target_dev: "sda",
                read_only: false,
            },
            DomainDisk {
                device: DiskDevice::Cdrom,
                driver_type: "raw",
                file: layout.seed_image_path(),
                backing_store: None,
                target_dev: "sdb",
                read_only: true,
            },
        ];

        let interfaces = if params.net_info.mac_addr.is_empty() {
            Vec::new()
        } else {
            vec![Interface {
                mac: params.net_info.mac_addr.clone(),
                source_dev: params
                    .net_info
                    .bridge
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NIC_SOURCE.to_string()),
                mode: "passthrough",
            }]
        };

        let consoles = vec![
            ConsoleDevice {
                socket: layout.serial_socket_path(),
                target: ConsoleTarget::Serial,
                port: 0,
            },
            ConsoleDevice {
                socket: layout.control_socket_path(),
                target: ConsoleTarget::Virtio,
                port: 1,
            },
            ConsoleDevice {
                socket: layout.app_socket_path(),
                target: ConsoleTarget::Virtio,
                port: 2,
            },
        ];

        Self {
            name: params.id.clone(),
            memory_mib: config.memory_mib,
            vcpus: config.num_cpus,
            disks,
            controllers: vec![Controller {
                kind: "scsi",
                model: "virtio-scsi",
            }],
            interfaces,
            filesystems: filesystems(params, mounts),
            consoles,
            graphics: Graphics::default(),
        }
    }

    pub fn to_element(&self) -> Element {
        let devices = Element::new("devices")
            .children(self.filesystems.iter().map(ToElement::to_element))
            .children(self.disks.iter().map(ToElement::to_element))
            .children(self.consoles.iter().map(ToElement::to_element))
            .children(self.interfaces.iter().map(ToElement::to_element))
            .children(self.controllers.iter().map(ToElement::to_element))
            .child(self.graphics.to_element());

        Element::new("domain")
            .attr("type", "kvm")
            .child(Element::new("name").text(&self.name))
            .child(Element::new("memory").attr("unit", "MiB").text(self.memory_mib))
            .child(Element::new("vcpu").attr("current", self.vcpus).text(self.vcpus))
            .child(
                Element::new("os")
                    .attr("supported", "yes")
                    .child(Element::new("type").text("hvm")),
            )
            .child(Element::new("features").child(Element::new("acpi")))
            .child(Element::new("cpu").attr("mode", CPU_MODE))
            .child(Element::new("seclabel").attr("type", "none"))
            .child(Element::new("on_poweroff").text(ON_EVENT))
            .child(Element::new("on_reboot").text(ON_EVENT))
            .child(Element::new("on_crash").text(ON_EVENT))
            .child(devices)
    }

    pub fn to_xml(&self) -> RunvmResult<String> {
        self.to_element().to_xml()
    }
}

/// Build the domain XML for one VM.
pub fn build_domain_xml(
    params: &VirtualMachineParams,
    mounts: &MountPlan,
    config: &ResolvedConfig,
) -> RunvmResult<String> {
    let xml = Domain::for_params(params, mounts, config).to_xml()?;
    tracing::debug!(id = %params.id, bytes = xml.len(), "Synthesized domain XML");
    Ok(xml)
}

/// Passthrough entries: the rootfs, then one per planned share.
fn filesystems(params: &VirtualMachineParams, mounts: &MountPlan) -> Vec<Filesystem> {
    std::iter::once(Filesystem {
        source_dir: params.rootfs.clone(),
        target_tag: guest::ROOTFS_TAG.to_string(),
    })
    .chain(mounts.shares().iter().map(|share| Filesystem {
        source_dir: share.source_dir.clone(),
        target_tag: share.tag.clone(),
    }))
    .collect()
}
