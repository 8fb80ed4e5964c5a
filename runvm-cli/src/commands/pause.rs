use clap::Args;

#[derive(Args, Debug)]
pub struct PauseArgs {
    /// Container id(s) of the VM(s) to pause
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: PauseArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let orchestrator = global.create_orchestrator()?;
    super::for_each_target(args.targets, "pause", move |id| orchestrator.pause(id)).await
}
