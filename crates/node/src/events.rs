use treefarm_model::Log;
use treefarm_utils::{
    codec::read_be,
    primitives::WORD_LENGTH,
    slot::event_topic,
    Address, B256, U256,
};

use crate::Error;

/// Signature of the token transfer event.
pub const TRANSFER_SIGNATURE: &str = "Transfer(address,address,uint256)";

/// Signature of the farm reward distribution event.
pub const DISTRIBUTE_REWARDS_SIGNATURE: &str = "DistributeRewards(address,address,uint256,uint256)";

/// Topics of the events consumed by the block handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTopics {
    /// `Transfer(address,address,uint256)`.
    pub transfer: B256,
    /// `DistributeRewards(address,address,uint256,uint256)`.
    pub distribute_rewards: B256,
}

impl Default for EventTopics {
    fn default() -> Self {
        Self {
            transfer: event_topic(TRANSFER_SIGNATURE),
            distribute_rewards: event_topic(DISTRIBUTE_REWARDS_SIGNATURE),
        }
    }
}

/// A pool token transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Amount.
    pub amount: U256,
}

impl Transfer {
    /// Decode from a `Transfer` log.
    pub fn decode(log: &Log) -> crate::Result<Self> {
        match (log.topics.as_slice(), log.data.len()) {
            ([_, from, to, ..], WORD_LENGTH) => Ok(Self {
                from: from.to_address(),
                to: to.to_address(),
                amount: read_be(&log.data),
            }),
            _ => Err(Error::MalformedLog("Transfer")),
        }
    }
}

/// A reward distribution of the farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributeRewards {
    /// Pool.
    pub pool: Address,
    /// Reward token.
    pub reward_token: Address,
    /// Holder part.
    pub holder_reward: U256,
    /// Community part.
    pub community_reward: U256,
}

impl DistributeRewards {
    /// Decode from a `DistributeRewards` log.
    pub fn decode(log: &Log) -> crate::Result<Self> {
        let [_, pool, reward_token, ..] = log.topics.as_slice() else {
            return Err(Error::MalformedLog("DistributeRewards"));
        };
        if log.data.len() < 2 * WORD_LENGTH {
            return Err(Error::MalformedLog("DistributeRewards"));
        }
        let (holder, rest) = log.data.split_at(WORD_LENGTH);
        Ok(Self {
            pool: pool.to_address(),
            reward_token: reward_token.to_address(),
            holder_reward: read_be(holder),
            community_reward: read_be(&rest[..WORD_LENGTH]),
        })
    }
}
