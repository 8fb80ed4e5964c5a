//! Provisioning request types.
//!
//! [`ContainerRequest`] is what the container engine hands over;
//! [`VirtualMachineParams`] is the orchestrator's working copy for one
//! provisioning call. `disk_dir` and `net_info` are filled in while the call
//! runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::net::NetInfo;

/// A bind mount requested by the container configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    /// Host path (file or directory)
    pub source: PathBuf,
    /// Absolute path inside the container
    pub destination: String,
}

/// Parameters supplied by the container engine for one workload.
#[derive(Debug, Clone, Default)]
pub struct ContainerRequest {
    /// Container id; becomes the domain name and the instance directory name
    pub id: String,
    pub rootfs: PathBuf,
    pub network_ns_path: String,
    pub args: Vec<String>,
    /// Process environment as `KEY=VALUE` strings
    pub env: Vec<String>,
    pub cwd: String,
    pub detach: bool,
    pub mounts: Vec<MountSpec>,
    /// Contents for the guest's /etc/resolv.conf
    pub resolv_conf: Vec<u8>,
    /// Contents for the guest's /etc/hosts
    pub hosts: Vec<u8>,
    pub pid: Option<u32>,
}

/// Complete provisioning request for a single VM.
#[derive(Debug, Clone, Default)]
pub struct VirtualMachineParams {
    pub id: String,
    pub net_info: NetInfo,
    pub detach: bool,
    pub args: Vec<String>,
    /// Value of `PATH` from the workload environment, if any
    pub path: Option<String>,
    pub env: BTreeMap<String, String>,
    pub rootfs: PathBuf,
    /// Instance directory, set once it has been created
    pub disk_dir: PathBuf,
    pub network_ns_path: String,
    /// Host source -> guest destination
    pub mounts: BTreeMap<PathBuf, String>,
    pub resolv_conf: Vec<u8>,
    pub hosts: Vec<u8>,
    pub cwd: String,
    pub pid: Option<u32>,
}

impl VirtualMachineParams {
    pub fn from_request(request: ContainerRequest) -> Self {
        let env = parse_env(&request.env);
        let path = env.get("PATH").cloned();
        let mounts = request
            .mounts
            .into_iter()
            .map(|m| (m.source, m.destination))
            .collect();

        Self {
            id: request.id,
            net_info: NetInfo::default(),
            detach: request.detach,
            args: request.args,
            path,
            env,
            rootfs: request.rootfs,
            disk_dir: PathBuf::new(),
            network_ns_path: request.network_ns_path,
            mounts,
            resolv_conf: request.resolv_conf,
            hosts: request.hosts,
            cwd: request.cwd,
            pid: request.pid,
        }
    }
}

/// Parse `KEY=VALUE` entries into a map.
///
/// Splits on the first `=` so values may contain `=`; both sides are trimmed.
pub fn parse_env(entries: &[String]) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for entry in entries {
        match entry.split_once('=') {
            Some((name, value)) => {
                env.insert(name.trim().to_string(), value.trim().to_string());
            }
            None => {
                tracing::debug!(entry = %entry, "Ignoring environment entry without '='");
            }
        }
    }
    env
}

/// Extract the `PATH` value from an environment list.
pub fn search_path(entries: &[String]) -> Option<String> {
    parse_env(entries).remove("PATH")
}
