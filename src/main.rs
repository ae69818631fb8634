mod analyzers;
mod cli;
mod core;
mod fixers;
mod logging;
mod utils;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match &cli.command {
        Commands::Check(args) => {
            cli::commands::check::execute(args).await?;
        }
        Commands::Detect(args) => {
            cli::commands::detect::execute(args).await?;
        }
    }

    Ok(())
}
