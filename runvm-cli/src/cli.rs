use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use runvm::{ConfigLoader, HostToolRunner, ResolvedConfig, VmOrchestrator, create_hypervisor};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::commands;

/// File name prefix of the rolling log written with `--log-dir`.
const LOG_FILE_NAME: &str = "runvm.log";

#[derive(Parser, Debug)]
#[command(name = "runvm", version, about = "Run container workloads inside KVM virtual machines")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalFlags,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Provision a VM for a container and stream its output
    Run(commands::run::RunArgs),
    /// Force a VM off and remove it
    Kill(commands::kill::KillArgs),
    /// Suspend a running VM
    Pause(commands::pause::PauseArgs),
    /// Resume a suspended VM
    Resume(commands::resume::ResumeArgs),
    /// Show the state of a VM
    State(commands::state::StateArgs),
    /// Check the golden image against its configured SHA-1
    VerifyImage(commands::verify_image::VerifyImageArgs),
}

#[derive(Args, Debug)]
pub struct GlobalFlags {
    /// Configuration file; replaces the default search path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, global = true, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl GlobalFlags {
    /// Install the tracing subscriber. The returned guard must live until exit.
    pub fn init_tracing(&self) -> Option<WorkerGuard> {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match &self.log_dir {
            Some(dir) => {
                let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
                let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                runvm::util::register_to_tracing(non_blocking, filter);
                Some(guard)
            }
            None => {
                runvm::util::register_stderr_tracing(filter);
                None
            }
        }
    }

    pub fn load_config(&self) -> anyhow::Result<ResolvedConfig> {
        let loader = match &self.config {
            Some(path) => ConfigLoader::with_candidates(vec![path.clone()]),
            None => ConfigLoader::new(),
        };
        loader
            .load_resolved()
            .context("Failed to load runtime configuration")
    }

    pub fn create_orchestrator(&self) -> anyhow::Result<VmOrchestrator> {
        let config = self.load_config()?;
        let runner = Arc::new(HostToolRunner::new());
        let hypervisor = create_hypervisor(&config, runner.clone())
            .context("Failed to create hypervisor backend")?;
        Ok(VmOrchestrator::new(config, hypervisor, runner))
    }
}
