use std::path::Path;

use enum_dispatch::enum_dispatch;
use treefarm_node::FarmConfig;

use bucket::Bucket;
use init_config::InitConfig;
use power::Power;
use show_config::ShowConfig;
use slot::Slot;

mod bucket;
mod init_config;
mod power;
mod show_config;
mod slot;

/// Commands.
#[enum_dispatch]
#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// Initialize config file.
    InitConfig(InitConfig),
    /// Print the resolved configuration.
    Config(ShowConfig),
    /// Print the storage slot of a farm or tree field.
    Slot(Slot),
    /// Compute the community power of a set of children balances.
    Power(Power),
    /// Compute the range index of a balance.
    Bucket(Bucket),
}

#[enum_dispatch(Commands)]
pub(crate) trait Command {
    fn execute(&self, ctx: &Context<'_>) -> eyre::Result<()>;
}

/// Execution context.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    config_path: &'a Path,
}

impl<'a> Context<'a> {
    pub(crate) fn new(config_path: &'a Path) -> Self {
        Self { config_path }
    }

    /// Path to the config file.
    pub fn config_path(&self) -> &Path {
        self.config_path
    }

    /// Load the configuration without validating it.
    pub fn raw_config(&self) -> eyre::Result<FarmConfig> {
        Ok(FarmConfig::figment(self.config_path).extract()?)
    }

    /// Load and validate the configuration.
    pub fn config(&self) -> eyre::Result<FarmConfig> {
        Ok(FarmConfig::load(self.config_path)?)
    }
}
