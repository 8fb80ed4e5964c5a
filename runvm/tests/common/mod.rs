//! Shared fakes for integration tests.
//!
//! - `FakeToolRunner` scripts qemu-img, genisoimage, virsh and the network
//!   helper, and creates the files the real tools would produce.
//! - `MemoryHypervisor` keeps domains in memory with the same state machine
//!   as a libvirt domain.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use runvm::hypervisor::{Hypervisor, HypervisorKind, VirtualMachine, VmState};
use runvm::{RunvmError, RunvmResult, ToolOutput, ToolRunner, VirtualMachineParams};

pub const NETINFO_OUTPUT: &str = "10.0.0.5,aa:bb:cc:dd:ee:ff,255.255.255.0,10.0.0.1,br0";

// ============================================================================
// TOOL RUNNER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

#[derive(Default)]
pub struct FakeToolRunner {
    missing: HashSet<String>,
    failures: HashMap<String, String>,
    netinfo: Option<String>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeToolRunner {
    pub fn new() -> Self {
        Self {
            netinfo: Some(NETINFO_OUTPUT.to_string()),
            ..Default::default()
        }
    }

    /// Report `tool` as absent from the search path.
    pub fn missing(mut self, tool: &str) -> Self {
        self.missing.insert(tool.to_string());
        self
    }

    /// Make `tool` exit non-zero with `stderr`.
    pub fn failing(mut self, tool: &str, stderr: &str) -> Self {
        self.failures.insert(tool.to_string(), stderr.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tools_run(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.tool).collect()
    }

    fn produce(&self, tool: &str, args: &[String], cwd: Option<&Path>) -> String {
        let output_name = match tool {
            "qemu-img" => args.last().cloned(),
            "genisoimage" => args
                .iter()
                .position(|a| a == "-output")
                .and_then(|i| args.get(i + 1).cloned()),
            _ => None,
        };
        if let (Some(name), Some(dir)) = (output_name, cwd) {
            std::fs::write(dir.join(name), tool.as_bytes()).unwrap();
        }

        match tool {
            "netinfo.sh" => self.netinfo.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

impl ToolRunner for FakeToolRunner {
    fn locate(&self, tool: &str) -> RunvmResult<PathBuf> {
        if self.missing.contains(tool) {
            return Err(RunvmError::ToolNotFound {
                tool: tool.to_string(),
            });
        }
        Ok(PathBuf::from("/usr/bin").join(tool))
    }

    fn run(
        &self,
        program: &Path,
        args: &[OsString],
        cwd: Option<&Path>,
    ) -> RunvmResult<ToolOutput> {
        let tool = program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        self.calls.lock().unwrap().push(Invocation {
            tool: tool.clone(),
            args: args.clone(),
            cwd: cwd.map(Path::to_path_buf),
        });

        if let Some(stderr) = self.failures.get(&tool) {
            return Ok(ToolOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: stderr.clone(),
            });
        }

        Ok(ToolOutput {
            success: true,
            code: Some(0),
            stdout: self.produce(&tool, &args, cwd),
            stderr: String::new(),
        })
    }
}

// ============================================================================
// HYPERVISOR
// ============================================================================

#[derive(Debug, Clone)]
pub struct DomainRecord {
    pub xml: String,
    pub state: VmState,
    pub instance_dir: PathBuf,
}

type Domains = Arc<Mutex<HashMap<String, DomainRecord>>>;

#[derive(Default, Clone)]
pub struct MemoryHypervisor {
    domains: Domains,
    fail_start: bool,
}

impl MemoryHypervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define succeeds but start fails, leaving the domain defined.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Default::default()
        }
    }

    pub fn domain(&self, id: &str) -> Option<DomainRecord> {
        self.domains.lock().unwrap().get(id).cloned()
    }

    pub fn domain_count(&self) -> usize {
        self.domains.lock().unwrap().len()
    }

    fn handle(&self, id: &str) -> Box<dyn VirtualMachine> {
        Box::new(MemoryVm {
            id: id.to_string(),
            domains: Arc::clone(&self.domains),
        })
    }
}

impl Hypervisor for MemoryHypervisor {
    fn kind(&self) -> HypervisorKind {
        HypervisorKind::Kvm
    }

    fn connect(&self) -> RunvmResult<()> {
        Ok(())
    }

    fn define_and_start(
        &self,
        params: &VirtualMachineParams,
        domain_xml: &str,
    ) -> RunvmResult<Box<dyn VirtualMachine>> {
        {
            let mut domains = self.domains.lock().unwrap();
            if domains.contains_key(&params.id) {
                return Err(RunvmError::Define(format!(
                    "domain '{}' already exists",
                    params.id
                )));
            }
            domains.insert(
                params.id.clone(),
                DomainRecord {
                    xml: domain_xml.to_string(),
                    state: VmState::ShutOff,
                    instance_dir: params.disk_dir.clone(),
                },
            );
        }

        if self.fail_start {
            return Err(RunvmError::Start(format!(
                "failed to start domain '{}'",
                params.id
            )));
        }

        let vm = self.handle(&params.id);
        vm.start()?;
        Ok(vm)
    }

    fn lookup(&self, id: &str) -> RunvmResult<Box<dyn VirtualMachine>> {
        if !self.domains.lock().unwrap().contains_key(id) {
            return Err(RunvmError::NotFound(id.to_string()));
        }
        Ok(self.handle(id))
    }
}

pub struct MemoryVm {
    id: String,
    domains: Domains,
}

impl MemoryVm {
    fn transition(&self, op: &'static str, from: &[VmState], to: VmState) -> RunvmResult<()> {
        let mut domains = self.domains.lock().unwrap();
        let record = domains
            .get_mut(&self.id)
            .ok_or_else(|| RunvmError::NotFound(self.id.clone()))?;
        if !from.contains(&record.state) {
            return Err(RunvmError::Lifecycle {
                op,
                id: self.id.clone(),
                message: format!("invalid in state {}", record.state),
            });
        }
        record.state = to;
        Ok(())
    }
}

impl VirtualMachine for MemoryVm {
    fn id(&self) -> &str {
        &self.id
    }

    fn state(&self) -> RunvmResult<VmState> {
        self.domains
            .lock()
            .unwrap()
            .get(&self.id)
            .map(|r| r.state.clone())
            .ok_or_else(|| RunvmError::NotFound(self.id.clone()))
    }

    fn start(&self) -> RunvmResult<()> {
        self.transition("start", &[VmState::ShutOff], VmState::Running)
    }

    fn suspend(&self) -> RunvmResult<()> {
        self.transition("suspend", &[VmState::Running], VmState::Paused)
    }

    fn resume(&self) -> RunvmResult<()> {
        self.transition("resume", &[VmState::Paused], VmState::Running)
    }

    fn stop(&self) -> RunvmResult<()> {
        self.transition(
            "stop",
            &[VmState::Running, VmState::Paused],
            VmState::ShutOff,
        )
    }

    fn remove(&self) -> RunvmResult<()> {
        let record = {
            let mut domains = self.domains.lock().unwrap();
            match domains.get(&self.id) {
                None => return Err(RunvmError::NotFound(self.id.clone())),
                Some(r) if r.state != VmState::ShutOff => {
                    return Err(RunvmError::Lifecycle {
                        op: "remove",
                        id: self.id.clone(),
                        message: "domain is still active".into(),
                    });
                }
                Some(_) => domains.remove(&self.id),
            }
        };
        if let Some(record) = record {
            let _ = std::fs::remove_dir_all(&record.instance_dir);
        }
        Ok(())
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Golden image with known content; returns its path and SHA-1.
pub fn golden_image(dir: &Path) -> (PathBuf, String) {
    let path = dir.join("golden.img");
    std::fs::write(&path, b"golden image contents").unwrap();
    let sha1 = runvm::disk::sha1_file(&path).unwrap();
    (path, sha1)
}
