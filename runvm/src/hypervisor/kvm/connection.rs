//! Per-operation libvirt connection through `virsh -c <uri>`.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::tools;
use crate::util::{ToolOutput, ToolRunner};

/// Substrings virsh prints when a domain name is not defined.
const UNKNOWN_DOMAIN_MARKERS: [&str; 2] = ["failed to get domain", "domain not found"];

/// One libvirt connection, opened for a single operation and closed on drop.
pub struct VirshConnection<'a> {
    runner: &'a dyn ToolRunner,
    virsh: PathBuf,
    uri: &'a str,
}

impl<'a> VirshConnection<'a> {
    pub fn open(runner: &'a dyn ToolRunner, uri: &'a str) -> RunvmResult<Self> {
        let virsh = runner.locate(tools::VIRSH)?;
        tracing::trace!(uri, "Opened libvirt connection");
        Ok(Self { runner, virsh, uri })
    }

    pub fn uri(&self) -> &str {
        self.uri
    }

    /// Run `virsh -c <uri> <args>`; spawn failures become `Connection`.
    pub fn run(&self, args: &[&str]) -> RunvmResult<ToolOutput> {
        let mut argv: Vec<OsString> = vec!["-c".into(), self.uri.into()];
        argv.extend(args.iter().map(OsString::from));

        tracing::debug!(uri = self.uri, args = ?args, "virsh");
        self.runner
            .run(&self.virsh, &argv, None)
            .map_err(|e| RunvmError::Connection(format!("failed to run virsh: {e}")))
    }

    /// Run a domain command, mapping failure through `on_error`.
    ///
    /// Unknown-domain failures are always reported as `NotFound`.
    pub fn domain_command(
        &self,
        args: &[&str],
        id: &str,
        on_error: impl FnOnce(String) -> RunvmError,
    ) -> RunvmResult<ToolOutput> {
        let output = self.run(args)?;
        if output.success {
            return Ok(output);
        }
        let message = output.failure_message();
        if is_unknown_domain(&message) {
            return Err(RunvmError::NotFound(id.to_string()));
        }
        Err(on_error(message))
    }
}

impl Drop for VirshConnection<'_> {
    fn drop(&mut self) {
        tracing::trace!(uri = self.uri, "Closed libvirt connection");
    }
}

pub fn is_unknown_domain(message: &str) -> bool {
    let message = message.to_lowercase();
    UNKNOWN_DOMAIN_MARKERS.iter().any(|m| message.contains(m))
}
