use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::cli::commands::load_config;
use crate::cli::output::OutputFormatter;
use crate::cli::progress::ValidationProgress;
use crate::core::config::Config;
use crate::core::pipeline::Engine;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// File to validate
    pub file: PathBuf,

    /// Apply available fixes after validation
    #[arg(long)]
    pub fix: bool,

    /// Also apply fixes the tool marks as unsafe
    #[arg(long = "unsafe")]
    pub unsafe_fixes: bool,

    /// Skip re-validation after fixing
    #[arg(long)]
    pub no_verify: bool,

    /// Output format
    #[arg(long, default_value = "table", value_parser = ["table", "json"])]
    pub format: String,

    /// Configuration file (defaults to the nearest .editguard.yml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Per-analyzer timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

impl CheckArgs {
    /// Flags win over file settings, but only when given.
    pub fn apply_overrides(&self, config: &mut Config) {
        if self.fix {
            config.autofix = true;
        }
        if self.unsafe_fixes {
            config.unsafe_fixes = true;
        }
        if self.no_verify {
            config.verify = false;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeout_ms = timeout_ms;
        }
    }
}

pub async fn execute(args: &CheckArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref(), &args.file)?;
    args.apply_overrides(&mut config);

    let formatter = OutputFormatter::new(&args.format);
    let progress = ValidationProgress::new(!formatter.is_json());
    progress.stage(&format!("Validating {}", args.file.display()));

    let engine = Engine::new(&config);
    let result = engine.validate_and_fix(&args.file, &config).await;
    progress.finish();

    formatter.display(&result)
}
