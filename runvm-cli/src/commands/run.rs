use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use runvm::{ContainerRequest, MountSpec};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Container id; names the VM and its instance directory
    pub id: String,

    /// Container root filesystem, shared into the guest
    #[arg(long, value_name = "DIR")]
    pub rootfs: PathBuf,

    /// Network namespace whose address the VM takes over
    #[arg(long = "netns", value_name = "PATH")]
    pub network_ns_path: String,

    /// Set environment variables (KEY=VALUE)
    #[arg(short = 'e', long = "env")]
    pub env: Vec<String>,

    /// Working directory inside the container
    #[arg(short = 'w', long = "workdir", default_value = "/")]
    pub cwd: String,

    /// Bind mount a host path (HOST:CONTAINER)
    #[arg(short = 'v', long = "volume", value_parser = parse_volume)]
    pub volumes: Vec<MountSpec>,

    /// File copied to the guest's /etc/resolv.conf
    #[arg(long, value_name = "FILE")]
    pub resolv_conf: Option<PathBuf>,

    /// File copied to the guest's /etc/hosts
    #[arg(long, value_name = "FILE")]
    pub hosts: Option<PathBuf>,

    /// Return once the VM is running instead of streaming its output
    #[arg(short = 'd', long)]
    pub detach: bool,

    /// Command and arguments to run
    #[arg(trailing_var_arg = true, required = true)]
    pub command: Vec<String>,
}

pub async fn execute(args: RunArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<i32> {
    let orchestrator = global.create_orchestrator()?;

    let request = ContainerRequest {
        id: args.id.clone(),
        rootfs: args.rootfs,
        network_ns_path: args.network_ns_path,
        args: args.command,
        env: args.env,
        cwd: args.cwd,
        detach: args.detach,
        mounts: args.volumes,
        resolv_conf: read_optional(args.resolv_conf.as_deref())?,
        hosts: read_optional(args.hosts.as_deref())?,
        pid: Some(std::process::id()),
    };

    let teardown =
        orchestrator.spawn_interrupt_teardown(args.id.clone(), runvm::orchestrator::interrupted());
    let result = orchestrator.run(request, &mut tokio::io::stdout()).await;
    teardown.abort();

    let status = result.with_context(|| format!("Failed to run '{}'", args.id))?;
    if args.detach {
        println!("{}", args.id);
    }
    Ok(status)
}

fn read_optional(path: Option<&std::path::Path>) -> anyhow::Result<Vec<u8>> {
    match path {
        Some(path) => {
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => Ok(Vec::new()),
    }
}

fn parse_volume(s: &str) -> Result<MountSpec, String> {
    let (source, destination) = s
        .split_once(':')
        .ok_or_else(|| format!("invalid volume '{s}', expected HOST:CONTAINER"))?;
    if source.is_empty() {
        return Err(format!("invalid volume '{s}': empty host path"));
    }
    if !destination.starts_with('/') {
        return Err(format!(
            "invalid volume '{s}': container path must be absolute"
        ));
    }
    Ok(MountSpec {
        source: PathBuf::from(source),
        destination: destination.to_string(),
    })
}
