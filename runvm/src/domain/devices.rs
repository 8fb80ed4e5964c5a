//! Typed device entries of a domain description.

use std::path::PathBuf;

use super::xml::Element;

/// Types that render as a single domain XML element.
pub trait ToElement {
    fn to_element(&self) -> Element;
}

/// Backing file of a copy-on-write disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingStore {
    pub index: u32,
    pub format: &'static str,
    pub file: PathBuf,
}

impl ToElement for BackingStore {
    fn to_element(&self) -> Element {
        Element::new("backingStore")
            .attr("type", "file")
            .attr("index", self.index)
            .child(Element::new("format").attr("type", self.format))
            .child(Element::new("source").attr("file", self.file.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskDevice {
    Disk,
    Cdrom,
}

impl DiskDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiskDevice::Disk => "disk",
            DiskDevice::Cdrom => "cdrom",
        }
    }
}

/// File-backed disk attached on the SCSI bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainDisk {
    pub device: DiskDevice,
    pub driver_type: &'static str,
    pub file: PathBuf,
    pub backing_store: Option<BackingStore>,
    pub target_dev: &'static str,
    pub read_only: bool,
}

impl ToElement for DomainDisk {
    fn to_element(&self) -> Element {
        let mut disk = Element::new("disk")
            .attr("type", "file")
            .attr("device", self.device.as_str())
            .child(
                Element::new("driver")
                    .attr("name", "qemu")
                    .attr("type", self.driver_type),
            )
            .child(Element::new("source").attr("file", self.file.display()));

        if let Some(backing) = &self.backing_store {
            disk.push(backing.to_element());
        }
        disk.push(
            Element::new("target")
                .attr("dev", self.target_dev)
                .attr("bus", "scsi"),
        );
        if self.read_only {
            disk.push(Element::new("readonly"));
        }
        disk
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Controller {
    pub kind: &'static str,
    pub model: &'static str,
}

impl ToElement for Controller {
    fn to_element(&self) -> Element {
        Element::new("controller")
            .attr("type", self.kind)
            .attr("model", self.model)
    }
}

/// macvtap NIC bound to a host device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub mac: String,
    pub source_dev: String,
    pub mode: &'static str,
}

impl ToElement for Interface {
    fn to_element(&self) -> Element {
        Element::new("interface")
            .attr("type", "direct")
            .child(Element::new("mac").attr("address", &self.mac))
            .child(
                Element::new("source")
                    .attr("dev", &self.source_dev)
                    .attr("mode", self.mode),
            )
            .child(Element::new("model").attr("type", "virtio"))
    }
}

/// 9p filesystem passthrough of a host directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filesystem {
    pub source_dir: PathBuf,
    pub target_tag: String,
}

impl ToElement for Filesystem {
    fn to_element(&self) -> Element {
        Element::new("filesystem")
            .attr("type", "mount")
            .attr("accessmode", "passthrough")
            .child(Element::new("source").attr("dir", self.source_dir.display()))
            .child(Element::new("target").attr("dir", &self.target_tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTarget {
    Serial,
    Virtio,
}

impl ConsoleTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleTarget::Serial => "serial",
            ConsoleTarget::Virtio => "virtio",
        }
    }
}

/// Console exposed host-side as a bound unix socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleDevice {
    pub socket: PathBuf,
    pub target: ConsoleTarget,
    pub port: u32,
}

impl ToElement for ConsoleDevice {
    fn to_element(&self) -> Element {
        Element::new("console")
            .attr("type", "unix")
            .child(
                Element::new("source")
                    .attr("mode", "bind")
                    .attr("path", self.socket.display()),
            )
            .child(
                Element::new("target")
                    .attr("type", self.target.as_str())
                    .attr("port", self.port),
            )
    }
}

/// VNC display with a daemon-assigned port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graphics {
    pub port: i32,
}

impl Default for Graphics {
    fn default() -> Self {
        Self { port: -1 }
    }
}

impl ToElement for Graphics {
    fn to_element(&self) -> Element {
        Element::new("graphics")
            .attr("type", "vnc")
            .attr("port", self.port)
    }
}
