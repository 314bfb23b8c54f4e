use std::fs;

use treefarm_node::FarmConfig;

use super::{Command, Context};

/// Initialize config.
#[derive(Debug, clap::Args)]
pub struct InitConfig {
    /// Replace if the config file already exists.
    #[arg(long, short)]
    force: bool,
}

impl Command for InitConfig {
    fn execute(&self, ctx: &Context<'_>) -> eyre::Result<()> {
        let config_path = ctx.config_path();
        if config_path.try_exists()? && !self.force {
            eyre::bail!("Config file already exists. Use `--force` to overwrite it.");
        }

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&FarmConfig::default())?;
        fs::write(config_path, content)?;
        tracing::info!(path = %config_path.display(), "config written");
        Ok(())
    }
}
