use clap::Args;

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Container id of the VM
    pub id: String,

    /// Print a JSON object instead of the bare state
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StateArgs, global: &crate::cli::GlobalFlags) -> anyhow::Result<()> {
    let orchestrator = global.create_orchestrator()?;
    let id = args.id.clone();
    let state = super::blocking(move || orchestrator.state(&id)).await?;

    if args.json {
        let doc = serde_json::json!({ "id": args.id, "state": state.to_string() });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("{}", state);
    }
    Ok(())
}
