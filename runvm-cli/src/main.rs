//! `runvm` - run container workloads inside KVM virtual machines.

mod cli;
mod commands;

use clap::Parser;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let _log_guard = cli.global.init_tracing();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, &cli.global).await,
        Commands::Kill(args) => commands::kill::execute(args, &cli.global).await.map(|_| 0),
        Commands::Pause(args) => commands::pause::execute(args, &cli.global).await.map(|_| 0),
        Commands::Resume(args) => commands::resume::execute(args, &cli.global).await.map(|_| 0),
        Commands::State(args) => commands::state::execute(args, &cli.global).await.map(|_| 0),
        Commands::VerifyImage(args) => {
            commands::verify_image::execute(args, &cli.global).await.map(|_| 0)
        }
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
