use super::{Command, Context};

/// Print the resolved configuration.
#[derive(Debug, clap::Args)]
pub struct ShowConfig {
    /// Skip validation.
    #[arg(long)]
    no_validate: bool,
}

impl Command for ShowConfig {
    fn execute(&self, ctx: &Context<'_>) -> eyre::Result<()> {
        let config = if self.no_validate {
            ctx.raw_config()?
        } else {
            ctx.config()?
        };
        println!("# {}", ctx.config_path().display());
        print!("{}", toml::to_string_pretty(&config)?);
        Ok(())
    }
}
