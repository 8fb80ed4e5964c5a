//! End-to-end VM provisioning and the locate-and-control path.
//!
//! Provisioning order: network info, instance directory, golden image check,
//! delta disk, mount plan, seed image, domain XML, define and start. Every step must
//! succeed; nothing is rolled back on failure, so callers should `kill` an id
//! whose provisioning failed part-way.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::task::JoinHandle;

use crate::config::ResolvedConfig;
use crate::console;
use crate::disk::{GoldenImageGate, create_delta_disk};
use crate::domain::build_domain_xml;
use crate::errors::{RunvmError, RunvmResult};
use crate::hypervisor::{Hypervisor, VirtualMachine, VmState};
use crate::net::NetworkResolver;
use crate::runtime::constants::console as console_defaults;
use crate::runtime::{ContainerRequest, MountPlan, RuntimeLayout, VirtualMachineParams};
use crate::seed::build_seed_image;
use crate::util::ToolRunner;

/// Exit status reported once the workload console closes.
const WORKLOAD_EXIT_STATUS: i32 = 0;

/// Drives VMs for container requests.
///
/// Cheap to clone; clones share the hypervisor, tool runner and golden
/// image gate.
#[derive(Clone)]
pub struct VmOrchestrator {
    config: ResolvedConfig,
    layout: RuntimeLayout,
    hypervisor: Arc<dyn Hypervisor>,
    runner: Arc<dyn ToolRunner>,
    resolver: Arc<NetworkResolver>,
    golden_gate: Arc<GoldenImageGate>,
    dial_timeout: Duration,
}

impl VmOrchestrator {
    pub fn new(
        config: ResolvedConfig,
        hypervisor: Arc<dyn Hypervisor>,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            layout: RuntimeLayout::new(config.run_dir.clone()),
            resolver: Arc::new(NetworkResolver::new(Arc::clone(&runner))),
            golden_gate: Arc::new(GoldenImageGate::new()),
            dial_timeout: console_defaults::DIAL_TIMEOUT,
            config,
            hypervisor,
            runner,
        }
    }

    /// Replace the network resolver (e.g. to use an explicit helper path).
    pub fn with_resolver(mut self, resolver: NetworkResolver) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn with_dial_timeout(mut self, timeout: Duration) -> Self {
        self.dial_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn layout(&self) -> &RuntimeLayout {
        &self.layout
    }

    /// Build every artifact for `request` and boot its VM. Blocking.
    pub fn provision(&self, request: ContainerRequest) -> RunvmResult<Box<dyn VirtualMachine>> {
        validate_id(&request.id)?;
        let mut params = VirtualMachineParams::from_request(request);
        let id = params.id.clone();

        tracing::info!(id = %id, "Provisioning virtual machine");

        params.net_info = self.resolver.resolve(&params.network_ns_path)?;

        let instance = self.layout.instance(&id);
        instance.prepare()?;
        params.disk_dir = instance.root().to_path_buf();
        tracing::debug!(id = %id, dir = %instance.root().display(), "Instance directory ready");

        self.golden_gate
            .ensure(&self.config.golden_image, self.config.sha1_sum.as_deref())?;

        create_delta_disk(
            self.runner.as_ref(),
            instance.root(),
            &self.config.golden_image,
        )?;
        let mounts = MountPlan::resolve(&params.mounts)?;
        build_seed_image(self.runner.as_ref(), &params, &mounts)?;

        let domain_xml = build_domain_xml(&params, &mounts, &self.config)?;
        let vm = self.hypervisor.define_and_start(&params, &domain_xml)?;

        tracing::info!(
            id = %id,
            ip = %params.net_info.ip_addr,
            cpus = self.config.num_cpus,
            memory_mib = self.config.memory_mib,
            "Virtual machine running"
        );
        Ok(vm)
    }

    /// Provision the VM and, unless detached, copy its workload output to
    /// `stdout` until the guest closes the app console.
    pub async fn run<W>(&self, request: ContainerRequest, stdout: &mut W) -> RunvmResult<i32>
    where
        W: AsyncWrite + Unpin,
    {
        let id = request.id.clone();
        let detach = request.detach;

        let this = self.clone();
        let vm = tokio::task::spawn_blocking(move || this.provision(request))
            .await
            .map_err(|e| RunvmError::Internal(format!("provisioning task failed: {e}")))??;

        if detach {
            tracing::info!(id = %vm.id(), "Detached, not attaching console");
            return Ok(WORKLOAD_EXIT_STATUS);
        }

        let socket = self.layout.instance(&id).app_socket_path();
        if let Some(stream) = console::dial_console(&socket, self.dial_timeout).await {
            let (lines, reader) =
                console::spawn_console_reader(stream, console_defaults::LINE_CHANNEL_CAPACITY);
            let count = console::drain_lines(lines, stdout).await?;
            if let Err(e) = reader.await {
                tracing::warn!(id = %id, error = %e, "Console reader task failed");
            }
            tracing::info!(id = %id, lines = count, "Workload console closed");
        }

        Ok(WORKLOAD_EXIT_STATUS)
    }

    pub fn lookup(&self, id: &str) -> RunvmResult<Box<dyn VirtualMachine>> {
        self.hypervisor.lookup(id)
    }

    /// Force the VM off and remove it with its instance directory.
    pub fn kill(&self, id: &str) -> RunvmResult<()> {
        let vm = self.lookup(id)?;
        vm.kill()?;
        tracing::info!(id, "Virtual machine removed");
        Ok(())
    }

    pub fn pause(&self, id: &str) -> RunvmResult<()> {
        self.lookup(id)?.suspend()
    }

    pub fn resume(&self, id: &str) -> RunvmResult<()> {
        self.lookup(id)?.resume()
    }

    pub fn state(&self, id: &str) -> RunvmResult<VmState> {
        self.lookup(id)?.state()
    }

    /// Tear down `id` once `trigger` completes.
    ///
    /// The CLI passes [`interrupted`]. The task lives until the trigger
    /// fires; abort it to disarm.
    pub fn spawn_interrupt_teardown<F>(&self, id: String, trigger: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let this = self.clone();
        tokio::spawn(async move {
            trigger.await;

            tracing::info!(id = %id, "Interrupt received, killing virtual machine");
            let target = id.clone();
            match tokio::task::spawn_blocking(move || this.kill(&target)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(id = %id, stage = e.stage(), "Teardown failed: {e}"),
                Err(e) => tracing::error!(id = %id, "Teardown task failed: {e}"),
            }
        })
    }
}

/// Resolves on the first SIGINT.
///
/// If the signal handler cannot be installed this never resolves, leaving
/// teardown disarmed.
pub async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for interrupt, teardown disabled");
        std::future::pending::<()>().await;
    }
}

/// The id names the domain and the instance directory.
fn validate_id(id: &str) -> RunvmResult<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RunvmError::Config(format!("invalid container id {id:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id() {
        assert!(validate_id("c1").is_ok());
        assert!(validate_id("3f2a-b_c.d").is_ok());
        for bad in ["", ".", "..", "a/b", "a b", "../etc"] {
            assert!(validate_id(bad).is_err(), "{bad:?}");
        }
    }
}
