use clap::Args;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Container id(s) of the VM(s) to resume
    #[arg(required = true, num_args = 1..)]
    pub targets: Vec<String>,
}

pub async fn execute(args: ResumeArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let orchestrator = global.create_orchestrator()?;
    super::for_each_target(args.targets, "resume", move |id| orchestrator.resume(id)).await
}
