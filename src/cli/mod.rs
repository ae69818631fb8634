pub mod commands;
pub mod output;
pub mod progress;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "editguard",
    version,
    about = "Validate a source file with Biome and TypeScript, and apply fixes safely"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one file, optionally fixing and re-checking it
    Check(commands::check::CheckArgs),
    /// Show which Biome variant would be used and how it was detected
    Detect(commands::detect::DetectArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_is_counted_globally() {
        let cli = Cli::parse_from(["editguard", "-vv", "detect"]);
        assert_eq!(cli.verbose, 2);
        let cli = Cli::parse_from(["editguard", "check", "a.ts", "-v"]);
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_check_requires_a_file() {
        assert!(Cli::try_parse_from(["editguard", "check"]).is_err());
    }
}
