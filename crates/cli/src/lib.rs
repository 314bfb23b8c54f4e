/// Commands.
pub mod commands;

use std::path::PathBuf;

use clap::Parser;
use commands::{Command, Commands, Context};

const CONFIG_DIR: &str = "treefarm";

/// Command-line interface of the farm state core.
#[derive(Debug, Parser)]
#[command(name = "treefarm", version, about)]
pub struct Cli {
    /// Path to the config file.
    #[arg(long = "config", short)]
    config_path: Option<PathBuf>,
    /// Commands.
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn find_config(&self) -> eyre::Result<PathBuf> {
        use etcetera::{choose_base_strategy, BaseStrategy};

        match self.config_path.as_ref() {
            Some(path) => Ok(path.clone()),
            None => {
                let strategy = choose_base_strategy()?;
                Ok(strategy.config_dir().join(CONFIG_DIR).join("config.toml"))
            }
        }
    }

    /// Execute command.
    pub fn execute(&self) -> eyre::Result<()> {
        let config_path = self.find_config()?;
        self.command.execute(&Context::new(&config_path))
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_power() {
        let cli = Cli::try_parse_from(["treefarm", "power", "--ether", "5", "20000"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn parse_slot() {
        let cli = Cli::try_parse_from([
            "treefarm",
            "slot",
            "--cache-key",
            "parent",
            "0x00000000000000000000000000000000000000f1",
        ]);
        assert!(cli.is_ok());
        let cli = Cli::try_parse_from(["treefarm", "slot", "parent", "0xf1"]);
        assert!(cli.is_err());
    }
}
