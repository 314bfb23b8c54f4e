//! Typed views over the farm contract storage.
//!
//! Views only carry coordinates. Every read and write goes through the
//! [`StateDb`] passed to the accessor.

use treefarm_utils::{
    slot::{
        array_element_slot, children_hold_amount_slot, community_acc_reward_per_share_slot,
        mapping_slot, member_slot, pool_info_slot, user_info_slot, FARM_POOLS_SLOT,
    },
    Address, HoldAmount, Packed, B256, U256,
};

use crate::state::{StateDb, StateDbExt};

/// Maximum number of ranges of a pool.
///
/// The empty range counter is a 24-bit field.
pub const MAX_RANGE_COUNT: u64 = 1 << 24;

const POOL_RANGE_COUNT_OFFSET: u64 = 1;
const POOL_RANGE_INTERVAL_OFFSET: u64 = 2;
const POOL_HOLDER_TOTAL_POWER_OFFSET: u64 = 3;
const POOL_COMMUNITY_TOTAL_POWER_OFFSET: u64 = 4;
const POOL_REWARD_TOKENS_OFFSET: u64 = 5;
const POOL_REWARD_START_RANGE_INDEX_OFFSET: u64 = 8;

const USER_COMMUNITY_POWER_OFFSET: u64 = 0;
const USER_HOLDER_REWARD_INFO_OFFSET: u64 = 1;
const USER_COMMUNITY_REWARD_INFO_OFFSET: u64 = 2;

/// Index of the range holding `amount` in a layout of `range_count` ranges
/// of width `range_interval`, clamped to the last range.
pub fn range_index(amount: &U256, range_interval: &U256, range_count: u64) -> u64 {
    let last = range_count.saturating_sub(1);
    match amount.checked_div(*range_interval) {
        Some(index) => index.saturating_to::<u64>().min(last),
        None => last,
    }
}

fn read_address_array<S: StateDb>(state: &S, contract: &Address, array: &B256) -> Vec<Address> {
    let len = state.get_u256(contract, array).saturating_to::<u64>();
    (0..len)
        .map(|index| state.get_address(contract, &array_element_slot(array, index)))
        .collect()
}

/// The farm contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FarmContract {
    address: Address,
}

impl FarmContract {
    /// Create a view of the farm contract deployed at `address`.
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Address of the farm contract.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Registered pool tokens, in registration order.
    pub fn pools<S: StateDb>(&self, state: &S) -> Vec<Address> {
        read_address_array(state, &self.address, &B256::from_u64(FARM_POOLS_SLOT))
    }

    /// Load the record of `pool`.
    pub fn pool_info<S: StateDb>(&self, state: &S, pool: &Address) -> PoolInfo {
        let base = pool_info_slot(pool);
        let word = |offset| state.get_u256(&self.address, &member_slot(&base, offset));
        PoolInfo {
            farm: self.address,
            pool: *pool,
            range_count: word(POOL_RANGE_COUNT_OFFSET).saturating_to(),
            range_interval: word(POOL_RANGE_INTERVAL_OFFSET),
            reward_start_range_index: word(POOL_REWARD_START_RANGE_INDEX_OFFSET).saturating_to(),
            reward_tokens: read_address_array(
                state,
                &self.address,
                &member_slot(&base, POOL_REWARD_TOKENS_OFFSET),
            ),
            base,
        }
    }

    /// View of the record of `account` in `pool`.
    pub fn user_info(&self, pool: &Address, account: &Address) -> UserInfo {
        UserInfo {
            farm: self.address,
            pool: *pool,
            account: *account,
            base: user_info_slot(pool, account),
        }
    }

    /// Community accumulated reward per power unit of `pool` for `reward_token`.
    pub fn community_acc_reward_per_share<S: StateDb>(
        &self,
        state: &S,
        pool: &Address,
        reward_token: &Address,
    ) -> U256 {
        state.get_u256(
            &self.address,
            &community_acc_reward_per_share_slot(pool, reward_token),
        )
    }

    /// Set the community accumulated reward per power unit.
    pub fn set_community_acc_reward_per_share<S: StateDb>(
        &self,
        state: &mut S,
        pool: &Address,
        reward_token: &Address,
        value: U256,
    ) {
        state.set_u256(
            &self.address,
            &community_acc_reward_per_share_slot(pool, reward_token),
            value,
        );
    }
}

/// Pool record.
///
/// The configuration fields are loaded once. The aggregate powers are read
/// and written through the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolInfo {
    farm: Address,
    pool: Address,
    base: B256,
    range_count: u64,
    range_interval: U256,
    reward_start_range_index: u64,
    reward_tokens: Vec<Address>,
}

impl PoolInfo {
    /// Pool address.
    pub fn pool(&self) -> &Address {
        &self.pool
    }

    /// Number of ranges.
    pub fn range_count(&self) -> u64 {
        self.range_count
    }

    /// Balance width of one range.
    pub fn range_interval(&self) -> &U256 {
        &self.range_interval
    }

    /// First range index credited with holder rewards.
    pub fn reward_start_range_index(&self) -> u64 {
        self.reward_start_range_index
    }

    /// Reward tokens.
    pub fn reward_tokens(&self) -> &[Address] {
        &self.reward_tokens
    }

    /// Returns whether the pool has a usable range layout.
    pub fn is_configured(&self) -> bool {
        (1..=MAX_RANGE_COUNT).contains(&self.range_count) && !self.range_interval.is_zero()
    }

    /// Range index of `amount`, clamped to the last range.
    pub fn range_index(&self, amount: &U256) -> u64 {
        range_index(amount, &self.range_interval, self.range_count)
    }

    /// Aggregate holder power.
    pub fn holder_total_power<S: StateDb>(&self, state: &S) -> U256 {
        state.get_u256(&self.farm, &self.member(POOL_HOLDER_TOTAL_POWER_OFFSET))
    }

    /// Set the aggregate holder power.
    pub fn set_holder_total_power<S: StateDb>(&self, state: &mut S, value: U256) {
        state.set_u256(
            &self.farm,
            &self.member(POOL_HOLDER_TOTAL_POWER_OFFSET),
            value,
        );
    }

    /// Aggregate community power.
    pub fn community_total_power<S: StateDb>(&self, state: &S) -> U256 {
        state.get_u256(&self.farm, &self.member(POOL_COMMUNITY_TOTAL_POWER_OFFSET))
    }

    /// Set the aggregate community power.
    pub fn set_community_total_power<S: StateDb>(&self, state: &mut S, value: U256) {
        state.set_u256(
            &self.farm,
            &self.member(POOL_COMMUNITY_TOTAL_POWER_OFFSET),
            value,
        );
    }

    fn member(&self, offset: u64) -> B256 {
        member_slot(&self.base, offset)
    }
}

/// Accrued reward and the accumulator value it was last settled at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardInfo {
    /// Accrued reward.
    pub reward: U256,
    /// Accumulator value at the last settlement.
    pub reward_debt: U256,
}

/// Record of one account in one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    farm: Address,
    pool: Address,
    account: Address,
    base: B256,
}

impl UserInfo {
    /// Community power this account contributes.
    pub fn community_power<S: StateDb>(&self, state: &S) -> U256 {
        state.get_u256(
            &self.farm,
            &member_slot(&self.base, USER_COMMUNITY_POWER_OFFSET),
        )
    }

    /// Set the community power.
    pub fn set_community_power<S: StateDb>(&self, state: &mut S, value: U256) {
        state.set_u256(
            &self.farm,
            &member_slot(&self.base, USER_COMMUNITY_POWER_OFFSET),
            value,
        );
    }

    /// Tracked balances of the direct children, index-aligned with the children list.
    pub fn children_hold_amount<S: StateDb>(&self, state: &S) -> Packed<HoldAmount> {
        Packed::from_raw(state.get_raw_state(&self.farm, &self.children_hold_amount_slot()))
    }

    /// Persist the tracked balances of the direct children.
    pub fn set_children_hold_amount<S: StateDb>(&self, state: &mut S, holds: &Packed<HoldAmount>) {
        state.set_raw_state(
            &self.farm,
            &self.children_hold_amount_slot(),
            holds.as_bytes().to_vec(),
        );
    }

    /// Holder reward of `reward_token`.
    pub fn holder_reward_info<S: StateDb>(&self, state: &S, reward_token: &Address) -> RewardInfo {
        self.reward_info(state, USER_HOLDER_REWARD_INFO_OFFSET, reward_token)
    }

    /// Set the holder reward of `reward_token`.
    pub fn set_holder_reward_info<S: StateDb>(
        &self,
        state: &mut S,
        reward_token: &Address,
        info: &RewardInfo,
    ) {
        self.set_reward_info(state, USER_HOLDER_REWARD_INFO_OFFSET, reward_token, info)
    }

    /// Community reward of `reward_token`.
    pub fn community_reward_info<S: StateDb>(
        &self,
        state: &S,
        reward_token: &Address,
    ) -> RewardInfo {
        self.reward_info(state, USER_COMMUNITY_REWARD_INFO_OFFSET, reward_token)
    }

    /// Set the community reward of `reward_token`.
    pub fn set_community_reward_info<S: StateDb>(
        &self,
        state: &mut S,
        reward_token: &Address,
        info: &RewardInfo,
    ) {
        self.set_reward_info(state, USER_COMMUNITY_REWARD_INFO_OFFSET, reward_token, info)
    }

    fn children_hold_amount_slot(&self) -> B256 {
        children_hold_amount_slot(&self.pool, &self.account)
    }

    fn reward_info_slot(&self, offset: u64, reward_token: &Address) -> B256 {
        mapping_slot(&reward_token.into_word(), &member_slot(&self.base, offset))
    }

    fn reward_info<S: StateDb>(&self, state: &S, offset: u64, reward_token: &Address) -> RewardInfo {
        let slot = self.reward_info_slot(offset, reward_token);
        RewardInfo {
            reward: state.get_u256(&self.farm, &slot),
            reward_debt: state.get_u256(&self.farm, &member_slot(&slot, 1)),
        }
    }

    fn set_reward_info<S: StateDb>(
        &self,
        state: &mut S,
        offset: u64,
        reward_token: &Address,
        info: &RewardInfo,
    ) {
        let slot = self.reward_info_slot(offset, reward_token);
        state.set_u256(&self.farm, &slot, info.reward);
        state.set_u256(&self.farm, &member_slot(&slot, 1), info.reward_debt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::MemoryState;

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn reads_pool_registry_and_record() {
        let farm = FarmContract::new(address(0xfa));
        let pool = address(1);
        let reward = address(2);
        let mut state = MemoryState::default();
        state.register_pool(&farm, &pool, 10, U256::from(100u64), 3, &[reward]);

        assert_eq!(farm.pools(&state), vec![pool]);
        let info = farm.pool_info(&state, &pool);
        assert_eq!(info.range_count(), 10);
        assert_eq!(info.range_interval(), &U256::from(100u64));
        assert_eq!(info.reward_start_range_index(), 3);
        assert_eq!(info.reward_tokens(), &[reward]);
        assert!(info.is_configured());
    }

    #[test]
    fn range_index_is_clamped() {
        let farm = FarmContract::new(address(0xfa));
        let pool = address(1);
        let mut state = MemoryState::default();
        state.register_pool(&farm, &pool, 10, U256::from(100u64), 0, &[]);
        let info = farm.pool_info(&state, &pool);
        assert_eq!(info.range_index(&U256::ZERO), 0);
        assert_eq!(info.range_index(&U256::from(250u64)), 2);
        assert_eq!(info.range_index(&U256::from(999u64)), 9);
        assert_eq!(info.range_index(&U256::MAX), 9);
    }

    #[test]
    fn unconfigured_pools() {
        let farm = FarmContract::new(address(0xfa));
        let state = MemoryState::default();
        assert!(!farm.pool_info(&state, &address(1)).is_configured());
    }

    #[test]
    fn reward_info_fields_are_adjacent() {
        let farm = FarmContract::new(address(0xfa));
        let user = farm.user_info(&address(1), &address(3));
        let token = address(2);
        let mut state = MemoryState::default();
        let info = RewardInfo {
            reward: U256::from(5u64),
            reward_debt: U256::from(7u64),
        };
        user.set_holder_reward_info(&mut state, &token, &info);
        assert_eq!(user.holder_reward_info(&state, &token), info);
        assert_eq!(user.community_reward_info(&state, &token), RewardInfo::default());

        let base = user_info_slot(&address(1), &address(3));
        let slot = mapping_slot(&token.into_word(), &member_slot(&base, 1));
        assert_eq!(state.get_u256(farm.address(), &slot), U256::from(5u64));
        assert_eq!(
            state.get_u256(farm.address(), &member_slot(&slot, 1)),
            U256::from(7u64)
        );
    }
}
