use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::commands::load_config;
use crate::cli::output::OutputFormatter;
use crate::core::pipeline::Engine;

#[derive(Args, Debug)]
pub struct DetectArgs {
    /// File or directory to detect the Biome version for
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Configuration file (defaults to the nearest .editguard.yml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,
}

pub async fn execute(args: &DetectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref(), &args.path)?;
    let engine = Engine::new(&config);
    let resolved = engine.biome_version(&args.path, &config).await;
    OutputFormatter::new(&args.format).display_version(&resolved)
}
