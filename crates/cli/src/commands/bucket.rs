use treefarm_model::farm::{range_index, MAX_RANGE_COUNT};
use treefarm_utils::U256;

use super::{Command, Context};

/// Range index of a balance.
#[derive(Debug, clap::Args)]
pub struct Bucket {
    /// Balance, in wei.
    balance: U256,
    /// Width of a range, in wei.
    #[arg(long)]
    interval: U256,
    /// Number of ranges of the pool.
    #[arg(long)]
    range_count: u64,
}

impl Command for Bucket {
    fn execute(&self, _ctx: &Context<'_>) -> eyre::Result<()> {
        if self.interval.is_zero() {
            eyre::bail!("range interval must be positive");
        }
        if !(1..=MAX_RANGE_COUNT).contains(&self.range_count) {
            eyre::bail!("range count must be in 1..={MAX_RANGE_COUNT}");
        }
        println!(
            "{}",
            range_index(&self.balance, &self.interval, self.range_count)
        );
        Ok(())
    }
}
