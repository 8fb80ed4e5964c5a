//! Network addressing for a VM, resolved from the container's network namespace.
//!
//! A helper script (`netinfo.sh`) shipped beside the runtime binary is run with
//! the namespace path and prints `ip,mac,netmask,gateway[,bridge]`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::{RunvmError, RunvmResult};
use crate::runtime::constants::tools;
use crate::util::{self, ToolRunner};

/// Addressing data for one VM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetInfo {
    pub ip_addr: String,
    pub mac_addr: String,
    pub net_mask: String,
    pub gateway: String,
    pub bridge: Option<String>,
}

impl NetInfo {
    /// Parse helper output: four or five comma-separated fields.
    pub fn parse(output: &str) -> RunvmResult<Self> {
        let fields: Vec<&str> = output.trim().split(',').map(str::trim).collect();

        let (ip, mac, mask, gateway, bridge) = match fields.as_slice() {
            [ip, mac, mask, gw] => (*ip, *mac, *mask, *gw, None),
            [ip, mac, mask, gw, bridge] => (*ip, *mac, *mask, *gw, Some(*bridge)),
            _ => {
                return Err(RunvmError::NetworkResolution(format!(
                    "expected 4 or 5 fields from {}, got {}: {:?}",
                    tools::NETINFO,
                    fields.len(),
                    output.trim()
                )));
            }
        };

        if ip.is_empty() || mac.is_empty() {
            return Err(RunvmError::NetworkResolution(format!(
                "missing ip or mac in {:?}",
                output.trim()
            )));
        }

        Ok(Self {
            ip_addr: ip.to_string(),
            mac_addr: mac.to_string(),
            net_mask: mask.to_string(),
            gateway: gateway.to_string(),
            bridge: bridge.filter(|b| !b.is_empty()).map(str::to_string),
        })
    }
}

/// Runs the network-info helper.
pub struct NetworkResolver {
    runner: Arc<dyn ToolRunner>,
    helper: Option<PathBuf>,
}

impl NetworkResolver {
    /// Use the helper found next to the runtime binary.
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            helper: None,
        }
    }

    /// Use an explicit helper path.
    pub fn with_helper(runner: Arc<dyn ToolRunner>, helper: PathBuf) -> Self {
        Self {
            runner,
            helper: Some(helper),
        }
    }

    /// Resolve the addressing of a network namespace. Blocking, no retry.
    pub fn resolve(&self, network_ns_path: &str) -> RunvmResult<NetInfo> {
        let helper = match &self.helper {
            Some(path) => path.clone(),
            None => util::find_helper(tools::NETINFO)?,
        };

        tracing::debug!(
            helper = %helper.display(),
            netns = %network_ns_path,
            "Resolving network info"
        );

        let output = self
            .runner
            .run(&helper, &[OsString::from(network_ns_path)], None)
            .map_err(|e| match e {
                RunvmError::ToolNotFound { .. } => e,
                other => RunvmError::NetworkResolution(other.to_string()),
            })?;

        if !output.success {
            return Err(RunvmError::NetworkResolution(format!(
                "{} failed: {}",
                helper.display(),
                output.failure_message()
            )));
        }

        let info = NetInfo::parse(&output.stdout)?;
        tracing::info!(
            ip = %info.ip_addr,
            mac = %info.mac_addr,
            bridge = ?info.bridge,
            "Resolved network info"
        );
        Ok(info)
    }
}
