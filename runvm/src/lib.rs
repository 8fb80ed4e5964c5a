//! runvm - run container workloads inside KVM virtual machines.
//!
//! Instead of namespaces and cgroups, each container gets its own libvirt
//! domain booted from a copy-on-write overlay of a shared golden image. The
//! container rootfs and bind mounts are shared into the guest over 9p and a
//! cloud-init seed image starts the workload on boot.
//!
//! The entry point is [`VmOrchestrator`]:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use runvm::{ConfigLoader, ContainerRequest, HostToolRunner, VmOrchestrator, create_hypervisor};
//!
//! # async fn example() -> runvm::RunvmResult<()> {
//! let config = ConfigLoader::new().load_resolved()?;
//! let runner = Arc::new(HostToolRunner::new());
//! let hypervisor = create_hypervisor(&config, runner.clone())?;
//! let orchestrator = VmOrchestrator::new(config, hypervisor, runner);
//!
//! let request = ContainerRequest {
//!     id: "c1".into(),
//!     rootfs: "/var/lib/containers/c1/rootfs".into(),
//!     network_ns_path: "/var/run/netns/c1".into(),
//!     args: vec!["echo".into(), "hello world".into()],
//!     ..Default::default()
//! };
//! let status = orchestrator.run(request, &mut tokio::io::stdout()).await?;
//! # let _ = status;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod console;
pub mod disk;
pub mod domain;
pub mod errors;
pub mod hypervisor;
pub mod net;
pub mod orchestrator;
pub mod runtime;
pub mod seed;
pub mod util;

pub use config::{ConfigLoader, Configuration, ResolvedConfig};
pub use errors::{RunvmError, RunvmResult};
pub use hypervisor::{Hypervisor, HypervisorKind, VirtualMachine, VmState, create_hypervisor};
pub use net::{NetInfo, NetworkResolver};
pub use orchestrator::VmOrchestrator;
pub use runtime::{ContainerRequest, MountSpec, VirtualMachineParams};
pub use util::{HostToolRunner, ToolOutput, ToolRunner};
