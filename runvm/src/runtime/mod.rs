//! Runtime paths, constants and request types.

pub mod constants;
pub mod layout;
pub mod mounts;
pub mod params;

pub use layout::{InstanceLayout, RuntimeLayout, delta_disk_path, seed_image_path};
pub use mounts::{GuestMount, MountPlan, Share, mount_label};
pub use params::{ContainerRequest, MountSpec, VirtualMachineParams};
