//! Hypervisor backend factory using the inventory pattern for compile-time registration.
//!
//! Backends register themselves with `inventory::submit!`; selection walks the
//! collected registrations.

use std::sync::Arc;

use crate::config::ResolvedConfig;
use crate::errors::{RunvmError, RunvmResult};
use crate::hypervisor::{Hypervisor, HypervisorKind};
use crate::util::ToolRunner;

/// Type alias for backend factory functions.
pub type HypervisorFactoryFn =
    fn(&ResolvedConfig, Arc<dyn ToolRunner>) -> RunvmResult<Arc<dyn Hypervisor>>;

/// Registration entry submitted by backend implementations via inventory.
pub struct HypervisorRegistration {
    pub kind: HypervisorKind,
    pub factory: HypervisorFactoryFn,
}

inventory::collect!(HypervisorRegistration);

/// Create the backend named by `config.backend`.
///
/// Unknown names fall back to KVM with a warning.
pub fn create_hypervisor(
    config: &ResolvedConfig,
    runner: Arc<dyn ToolRunner>,
) -> RunvmResult<Arc<dyn Hypervisor>> {
    let kind = HypervisorKind::from_config_name(&config.backend);

    for registration in inventory::iter::<HypervisorRegistration> {
        if registration.kind == kind {
            tracing::debug!(backend = %kind, uri = %config.uri, "Creating hypervisor backend");
            return (registration.factory)(config, runner);
        }
    }

    Err(RunvmError::Config(format!(
        "Hypervisor backend {} is not registered. Available backends: {:?}",
        kind,
        available_backends()
    )))
}

pub fn is_registered(kind: HypervisorKind) -> bool {
    inventory::iter::<HypervisorRegistration>().any(|r| r.kind == kind)
}

pub fn available_backends() -> Vec<HypervisorKind> {
    inventory::iter::<HypervisorRegistration>()
        .map(|r| r.kind)
        .collect()
}
