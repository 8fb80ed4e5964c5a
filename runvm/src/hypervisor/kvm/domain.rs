//! Handle to one libvirt domain.

use std::sync::Arc;

use super::connection::VirshConnection;
use crate::errors::{RunvmError, RunvmResult};
use crate::hypervisor::{VirtualMachine, VmState};
use crate::runtime::InstanceLayout;
use crate::util::ToolRunner;

pub struct KvmDomain {
    id: String,
    uri: String,
    instance: InstanceLayout,
    runner: Arc<dyn ToolRunner>,
}

impl KvmDomain {
    pub(super) fn new(
        id: String,
        uri: String,
        instance: InstanceLayout,
        runner: Arc<dyn ToolRunner>,
    ) -> Self {
        Self {
            id,
            uri,
            instance,
            runner,
        }
    }

    /// Open a connection, run one lifecycle command and close it again.
    fn lifecycle(&self, op: &'static str, command: &str) -> RunvmResult<()> {
        let conn = VirshConnection::open(self.runner.as_ref(), &self.uri)?;
        conn.domain_command(&[command, &self.id], &self.id, |message| {
            RunvmError::Lifecycle {
                op,
                id: self.id.clone(),
                message,
            }
        })?;
        tracing::info!(id = %self.id, op, "Domain transition complete");
        Ok(())
    }
}

impl VirtualMachine for KvmDomain {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> RunvmResult<VmState> {
        let conn = VirshConnection::open(self.runner.as_ref(), &self.uri)?;
        let output = conn.domain_command(&["domstate", &self.id], &self.id, |message| {
            RunvmError::Lifecycle {
                op: "state",
                id: self.id.clone(),
                message,
            }
        })?;
        Ok(VmState::parse(&output.stdout))
    }

    fn start(&self) -> RunvmResult<()> {
        let conn = VirshConnection::open(self.runner.as_ref(), &self.uri)?;
        conn.domain_command(&["start", &self.id], &self.id, RunvmError::Start)?;
        tracing::info!(id = %self.id, "Domain started");
        Ok(())
    }

    fn suspend(&self) -> RunvmResult<()> {
        self.lifecycle("suspend", "suspend")
    }

    fn resume(&self) -> RunvmResult<()> {
        self.lifecycle("resume", "resume")
    }

    fn stop(&self) -> RunvmResult<()> {
        self.lifecycle("stop", "destroy")
    }

    fn shutdown(&self) -> RunvmResult<()> {
        self.lifecycle("shutdown", "shutdown")
    }

    fn remove(&self) -> RunvmResult<()> {
        self.lifecycle("remove", "undefine")?;
        if let Err(e) = self.instance.remove() {
            tracing::warn!(id = %self.id, error = %e, "Failed to remove instance directory");
        }
        Ok(())
    }
}
