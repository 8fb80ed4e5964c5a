//! Hypervisor abstraction.
//!
//! A [`Hypervisor`] owns access to the virtualization daemon and hands out
//! [`VirtualMachine`] handles. Handles are not cached: the daemon is the
//! source of truth and every call looks the domain up again by id.

pub mod kvm;
pub mod registry;

use std::fmt;
use std::str::FromStr;

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::VirtualMachineParams;

pub use registry::{available_backends, create_hypervisor, is_registered};

/// Available hypervisor backends.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum HypervisorKind {
    Kvm,
}

impl HypervisorKind {
    /// Parse a configured backend name, falling back to KVM for unknown names.
    pub fn from_config_name(name: &str) -> Self {
        match name.parse() {
            Ok(kind) => kind,
            Err(_) => {
                tracing::warn!(backend = %name, "Unknown hypervisor backend, using KVM");
                HypervisorKind::Kvm
            }
        }
    }
}

impl FromStr for HypervisorKind {
    type Err = RunvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "kvm" => Ok(HypervisorKind::Kvm),
            _ => Err(RunvmError::Config(format!(
                "Unknown hypervisor backend: '{}'. Supported: KVM",
                s
            ))),
        }
    }
}

impl fmt::Display for HypervisorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HypervisorKind::Kvm => write!(f, "KVM"),
        }
    }
}

/// Domain state as reported by the daemon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmState {
    Running,
    Paused,
    ShutOff,
    Other(String),
}

impl VmState {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "running" => VmState::Running,
            "paused" => VmState::Paused,
            "shut off" | "shutoff" => VmState::ShutOff,
            other => VmState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmState::Running => write!(f, "running"),
            VmState::Paused => write!(f, "paused"),
            VmState::ShutOff => write!(f, "shut off"),
            VmState::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Connection to a virtualization daemon.
pub trait Hypervisor: Send + Sync {
    fn kind(&self) -> HypervisorKind;

    /// Check that the daemon is reachable. Fails with `Connection`.
    fn connect(&self) -> RunvmResult<()>;

    /// Define a domain from `domain_xml`, then start it.
    ///
    /// A start failure leaves the domain defined; cleanup is the caller's
    /// decision.
    fn define_and_start(
        &self,
        params: &VirtualMachineParams,
        domain_xml: &str,
    ) -> RunvmResult<Box<dyn VirtualMachine>>;

    /// Find a defined domain by id. Fails with `NotFound`.
    fn lookup(&self, id: &str) -> RunvmResult<Box<dyn VirtualMachine>>;
}

/// Handle to one defined domain.
pub trait VirtualMachine: Send + Sync {
    fn id(&self) -> &str;

    fn state(&self) -> RunvmResult<VmState>;

    fn start(&self) -> RunvmResult<()>;

    fn suspend(&self) -> RunvmResult<()>;

    fn resume(&self) -> RunvmResult<()>;

    /// Force the domain off.
    fn stop(&self) -> RunvmResult<()>;

    /// Ask the guest to power off.
    fn shutdown(&self) -> RunvmResult<()> {
        Err(RunvmError::Unsupported(format!(
            "graceful shutdown of '{}'",
            self.id()
        )))
    }

    /// Undefine the domain and delete its instance directory.
    fn remove(&self) -> RunvmResult<()>;

    /// Stop (when active), then remove. A stop failure aborts before removal.
    fn kill(&self) -> RunvmResult<()> {
        match self.state()? {
            VmState::ShutOff => {
                tracing::debug!(id = %self.id(), "Domain already off, skipping stop");
            }
            _ => self.stop()?,
        }
        self.remove()
    }
}
