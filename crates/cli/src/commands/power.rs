use treefarm_model::community_power;
use treefarm_utils::U256;

use super::{Command, Context};

const ETHER: u64 = 1_000_000_000_000_000_000;

/// Community power of a set of children balances.
#[derive(Debug, clap::Args)]
pub struct Power {
    /// Balances of the direct children, in wei.
    #[arg(required = true)]
    amounts: Vec<U256>,
    /// Read the balances as whole tokens.
    #[arg(long)]
    ether: bool,
}

impl Power {
    fn holds(&self) -> impl Iterator<Item = U256> + '_ {
        let unit = if self.ether {
            U256::from(ETHER)
        } else {
            U256::from(1u64)
        };
        self.amounts.iter().map(move |amount| amount.saturating_mul(unit))
    }
}

impl Command for Power {
    fn execute(&self, _ctx: &Context<'_>) -> eyre::Result<()> {
        println!("{}", community_power(self.holds()));
        Ok(())
    }
}
