//! KVM backend driving libvirt through `virsh`.
//!
//! Every operation opens its own [`VirshConnection`] and drops it before
//! returning; nothing is held across calls.

mod connection;
mod domain;

use std::sync::Arc;

pub use connection::{VirshConnection, is_unknown_domain};
pub use domain::KvmDomain;

use crate::config::ResolvedConfig;
use crate::errors::{RunvmError, RunvmResult};
use crate::hypervisor::registry::HypervisorRegistration;
use crate::hypervisor::{Hypervisor, HypervisorKind, VirtualMachine};
use crate::runtime::{InstanceLayout, RuntimeLayout, VirtualMachineParams};
use crate::util::ToolRunner;

inventory::submit! {
    HypervisorRegistration {
        kind: HypervisorKind::Kvm,
        factory: |config, runner| {
            Ok(Arc::new(KvmHypervisor::new(config, runner)))
        }
    }
}

pub struct KvmHypervisor {
    uri: String,
    layout: RuntimeLayout,
    runner: Arc<dyn ToolRunner>,
}

impl KvmHypervisor {
    pub fn new(config: &ResolvedConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            uri: config.uri.clone(),
            layout: RuntimeLayout::new(config.run_dir.clone()),
            runner,
        }
    }

    fn open(&self) -> RunvmResult<VirshConnection<'_>> {
        VirshConnection::open(self.runner.as_ref(), &self.uri)
    }

    fn handle(&self, id: &str, instance: InstanceLayout) -> Box<dyn VirtualMachine> {
        Box::new(KvmDomain::new(
            id.to_string(),
            self.uri.clone(),
            instance,
            Arc::clone(&self.runner),
        ))
    }
}

impl Hypervisor for KvmHypervisor {
    fn kind(&self) -> HypervisorKind {
        HypervisorKind::Kvm
    }

    fn connect(&self) -> RunvmResult<()> {
        let conn = self.open()?;
        let output = conn.run(&["uri"])?;
        if !output.success {
            return Err(RunvmError::Connection(format!(
                "cannot reach {}: {}",
                conn.uri(),
                output.failure_message()
            )));
        }
        tracing::debug!(uri = %output.stdout.trim(), "Hypervisor reachable");
        Ok(())
    }

    fn define_and_start(
        &self,
        params: &VirtualMachineParams,
        domain_xml: &str,
    ) -> RunvmResult<Box<dyn VirtualMachine>> {
        self.connect()?;

        let instance = InstanceLayout::new(params.disk_dir.clone());
        let xml_path = instance.domain_xml_path();
        std::fs::write(&xml_path, domain_xml).map_err(|source| RunvmError::ArtifactWrite {
            artifact: "domain.xml",
            path: xml_path.clone(),
            source,
        })?;

        let xml_arg = xml_path.to_string_lossy();
        {
            let conn = self.open()?;
            let output = conn.run(&["define", &xml_arg])?;
            if !output.success {
                return Err(RunvmError::Define(output.failure_message()));
            }
        }
        tracing::info!(id = %params.id, "Domain defined");

        let vm = self.handle(&params.id, instance);
        if let Err(e) = vm.start() {
            tracing::warn!(id = %params.id, "Domain defined but failed to start");
            return Err(match e {
                RunvmError::Start(_) => e,
                other => RunvmError::Start(other.to_string()),
            });
        }
        Ok(vm)
    }

    fn lookup(&self, id: &str) -> RunvmResult<Box<dyn VirtualMachine>> {
        let vm = self.handle(id, self.layout.instance(id));
        // domstate fails with NotFound for undefined names
        let state = vm.state()?;
        tracing::debug!(id, %state, "Found domain");
        Ok(vm)
    }
}
