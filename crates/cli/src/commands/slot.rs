use treefarm_node::FarmConfig;
use treefarm_utils::{
    slot::{
        cache_key, children_hold_amount_slot, children_slot, community_acc_reward_per_share_slot,
        depth_slot, holder_distribution_slot, parent_slot, pool_info_slot, reward_per_share_slot,
        user_info_slot, version_slot,
    },
    Address, B256,
};

use super::{Command, Context};

/// Storage slot of a field.
#[derive(Debug, clap::Args)]
pub struct Slot {
    /// Also print the key of the slot in the local cache database.
    #[arg(long)]
    cache_key: bool,
    #[command(subcommand)]
    field: Field,
}

#[derive(Debug, clap::Subcommand)]
enum Field {
    /// Parent of an account in the tree contract.
    Parent { account: Address },
    /// Depth of an account in the tree contract.
    Depth { account: Address },
    /// Version of the node of an account in the tree contract.
    Version { account: Address },
    /// Raw children list of an account in the tree contract.
    Children { account: Address },
    /// Raw range list of a pool in the farm contract.
    HolderDistribution { pool: Address },
    /// Raw reward per share list of a pool in the farm contract.
    RewardPerShare { pool: Address, reward_token: Address },
    /// Raw children holds of an account in the farm contract.
    ChildrenHoldAmount { pool: Address, account: Address },
    /// Base slot of the record of a pool.
    PoolInfo { pool: Address },
    /// Base slot of the record of a user of a pool.
    UserInfo { pool: Address, account: Address },
    /// Community accumulated reward per share of a pool.
    CommunityAccRewardPerShare { pool: Address, reward_token: Address },
}

impl Field {
    fn slot(&self) -> B256 {
        match self {
            Self::Parent { account } => parent_slot(account),
            Self::Depth { account } => depth_slot(account),
            Self::Version { account } => version_slot(account),
            Self::Children { account } => children_slot(account),
            Self::HolderDistribution { pool } => holder_distribution_slot(pool),
            Self::RewardPerShare { pool, reward_token } => reward_per_share_slot(pool, reward_token),
            Self::ChildrenHoldAmount { pool, account } => children_hold_amount_slot(pool, account),
            Self::PoolInfo { pool } => pool_info_slot(pool),
            Self::UserInfo { pool, account } => user_info_slot(pool, account),
            Self::CommunityAccRewardPerShare { pool, reward_token } => {
                community_acc_reward_per_share_slot(pool, reward_token)
            }
        }
    }

    fn contract(&self, config: &FarmConfig) -> Address {
        match self {
            Self::Parent { .. } | Self::Depth { .. } | Self::Version { .. } | Self::Children { .. } => {
                config.address_tree_contract
            }
            _ => config.farm_contract,
        }
    }
}

impl Command for Slot {
    fn execute(&self, ctx: &Context<'_>) -> eyre::Result<()> {
        let slot = self.field.slot();
        println!("slot: {slot}");
        if self.cache_key {
            let contract = self.field.contract(&ctx.config()?);
            println!("contract: {contract}");
            println!("cache key: 0x{}", hex::encode(cache_key(&contract, &slot)));
        }
        Ok(())
    }
}
