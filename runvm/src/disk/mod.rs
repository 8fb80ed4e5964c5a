//! Disk image operations.
//!
//! - `create_delta_disk` - per-VM qcow2 overlay over the golden image
//! - `verify_golden_image` / `GoldenImageGate` - golden image SHA-1 check

mod delta;
mod integrity;

pub use delta::{BackingFormat, GOLDEN_FORMAT, create_delta_disk};
pub use integrity::{GoldenImageGate, sha1_file, verify_golden_image};
