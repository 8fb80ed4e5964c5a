use clap::Args;

#[derive(Args, Debug)]
pub struct KillArgs {
    /// Container id(s) of the VM(s) to force off and remove
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: KillArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let orchestrator = global.create_orchestrator()?;
    super::for_each_target(args.targets, "kill", move |id| orchestrator.kill(id)).await
}
