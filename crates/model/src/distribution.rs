//! Range-bucketed holder reward ledger of one pool.

use std::collections::HashMap;

use treefarm_utils::{
    slot::{holder_distribution_slot, reward_per_share_slot},
    Address, Packed, RangeInfo, RewardPerShare, B256, U256,
};

use crate::{
    achievement::Achievement,
    farm::{FarmContract, PoolInfo, RewardInfo},
    state::{BalanceSource, StateDb, StateDbExt},
    tree::AddressTree,
    Error,
};

/// Collaborators of a distribution update.
#[derive(Debug)]
pub struct Ledger<'a, S, T, B> {
    /// Ledger state.
    pub state: &'a mut S,
    /// Address tree.
    pub tree: &'a mut T,
    /// Token balances.
    pub balances: &'a B,
}

impl<'a, S, T, B> Ledger<'a, S, T, B> {
    /// Bundle the collaborators.
    pub fn new(state: &'a mut S, tree: &'a mut T, balances: &'a B) -> Self {
        Self {
            state,
            tree,
            balances,
        }
    }
}

#[derive(Debug, Clone)]
struct RewardPerShares {
    token: Address,
    slot: B256,
    values: Packed<RewardPerShare>,
}

/// Holder distribution of one pool for the duration of one block.
///
/// The range and reward-per-share buffers are loaded on creation, mutated in
/// memory and written back by [`storage`](PoolDistribution::storage).
#[derive(Debug, Clone)]
pub struct PoolDistribution {
    farm: FarmContract,
    info: PoolInfo,
    range_count: usize,
    ranges_slot: B256,
    ranges: Packed<RangeInfo>,
    reward_per_shares: Vec<RewardPerShares>,
    is_fork_0815: bool,
    balances: HashMap<Address, U256>,
}

impl PoolDistribution {
    /// Load the distribution of the pool described by `info`.
    pub fn load<S: StateDb>(
        state: &S,
        farm: FarmContract,
        info: PoolInfo,
        is_fork_0815: bool,
    ) -> crate::Result<Self> {
        let range_count = usize::try_from(info.range_count()).map_err(|_| Error::Overflow)?;
        let ranges_slot = holder_distribution_slot(info.pool());
        let mut ranges = Packed::from_raw(state.get_raw_state(farm.address(), &ranges_slot));
        ranges.ensure_len(range_count);

        // One buffer per distinct token, a repeated token shares the slot.
        let mut reward_per_shares: Vec<RewardPerShares> = Vec::new();
        for token in info.reward_tokens() {
            if reward_per_shares.iter().any(|rps| rps.token == *token) {
                continue;
            }
            let slot = reward_per_share_slot(info.pool(), token);
            let mut values = Packed::from_raw(state.get_raw_state(farm.address(), &slot));
            values.ensure_len(range_count);
            reward_per_shares.push(RewardPerShares {
                token: *token,
                slot,
                values,
            });
        }

        Ok(Self {
            farm,
            info,
            range_count,
            ranges_slot,
            ranges,
            reward_per_shares,
            is_fork_0815,
            balances: HashMap::default(),
        })
    }

    /// Pool address.
    pub fn pool(&self) -> &Address {
        self.info.pool()
    }

    /// Pool record.
    pub fn info(&self) -> &PoolInfo {
        &self.info
    }

    /// Range at `index`.
    pub fn range(&self, index: usize) -> RangeInfo {
        self.ranges.get(index)
    }

    /// All ranges.
    pub fn ranges(&self) -> impl Iterator<Item = RangeInfo> + '_ {
        self.ranges.iter().take(self.range_count)
    }

    /// Reward per share of `reward_token` at range `index`.
    ///
    /// Returns `None` if `reward_token` is not a reward token of the pool.
    pub fn reward_per_share(&self, reward_token: &Address, index: usize) -> Option<U256> {
        self.reward_per_shares
            .iter()
            .find(|rps| rps.token == *reward_token)
            .map(|rps| rps.values.get(index).0)
    }

    /// Recompute the empty range counters and the aggregate holder power.
    ///
    /// Returns the holder total power, which is also written to the pool record.
    pub fn sort<S: StateDb>(&mut self, state: &mut S) -> crate::Result<U256> {
        let mut empty_total = 0u32;
        let mut total_power = U256::ZERO;
        for index in 1..self.range_count {
            let mut range = self.ranges.get(index);
            range.empty_range_count = empty_total;
            self.ranges.set(index, &range)?;
            if range.total_count > 0 {
                let rank = Self::rank(index, &range);
                total_power = rank
                    .checked_mul(U256::from(range.total_count))
                    .and_then(|power| total_power.checked_add(power))
                    .ok_or(Error::Overflow)?;
            } else {
                empty_total = empty_total.checked_add(1).ok_or(Error::Overflow)?;
            }
        }
        self.info.set_holder_total_power(state, total_power);
        Ok(total_power)
    }

    fn rank(index: usize, range: &RangeInfo) -> U256 {
        U256::from(index).saturating_sub(U256::from(range.empty_range_count))
    }

    /// Move `account` between ranges after its balance changed from `origin`
    /// to `current`, settle its holder rewards and propagate the change to its
    /// ancestors.
    pub fn update_account_balance<S, T, B>(
        &mut self,
        ledger: &mut Ledger<'_, S, T, B>,
        account: &Address,
        origin: &U256,
        current: &U256,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
    {
        self.balances.insert(*account, *current);

        let origin_index = self.range_index(origin)?;
        let current_index = self.range_index(current)?;

        if origin_index != current_index {
            let mut origin_range = self.ranges.get(origin_index);
            origin_range.total_count = origin_range.total_count.saturating_sub(1);
            self.ranges.set(origin_index, &origin_range)?;

            let mut current_range = self.ranges.get(current_index);
            current_range.total_count = current_range
                .total_count
                .checked_add(1)
                .ok_or(Error::Overflow)?;
            self.ranges.set(current_index, &current_range)?;

            let user = self.farm.user_info(self.info.pool(), account);
            for rps in &self.reward_per_shares {
                let info = user.holder_reward_info(&*ledger.state, &rps.token);
                let reward = self.settle(&info, &rps.values.get(origin_index).0)?;
                user.set_holder_reward_info(
                    ledger.state,
                    &rps.token,
                    &RewardInfo {
                        reward,
                        reward_debt: rps.values.get(current_index).0,
                    },
                );
            }
        } else {
            let mut range = self.ranges.get(origin_index);
            if range.total_count == 0 {
                range.total_count = 1;
                self.ranges.set(origin_index, &range)?;
            }
        }

        self.update_achievement(ledger, account, origin, current)
    }

    /// Settle the pending holder reward accrued at `per_share`.
    fn settle(&self, info: &RewardInfo, per_share: &U256) -> crate::Result<U256> {
        let accrued = info
            .reward
            .checked_add(*per_share)
            .ok_or(Error::Overflow)?;
        match accrued.checked_sub(info.reward_debt) {
            Some(reward) => Ok(reward),
            None if self.is_fork_0815 => Ok(U256::ZERO),
            // Negative results used to be stored as their magnitude.
            None => Ok(info.reward_debt - accrued),
        }
    }

    fn range_index(&self, amount: &U256) -> crate::Result<usize> {
        usize::try_from(self.info.range_index(amount)).map_err(|_| Error::Overflow)
    }

    /// Propagate the balance change of `account` to its ancestors.
    pub fn update_achievement<S, T, B>(
        &self,
        ledger: &mut Ledger<'_, S, T, B>,
        account: &Address,
        origin: &U256,
        current: &U256,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
    {
        Achievement::new(&self.farm, &self.info).update(
            ledger.state,
            ledger.tree,
            account,
            origin,
            current,
        )
    }

    /// Credit a distribution of `reward_token`.
    ///
    /// The holder part is shared by rank among the ranges from the reward
    /// start index on and the community part is added to the community
    /// accumulator. Integer division remainders are dropped.
    pub fn update_reward_per_shares<S: StateDb>(
        &mut self,
        state: &mut S,
        reward_token: &Address,
        holder_reward: &U256,
        community_reward: &U256,
    ) -> crate::Result<()> {
        let holder_total_power = self.sort(state)?;

        let Some(rps) = self
            .reward_per_shares
            .iter_mut()
            .find(|rps| rps.token == *reward_token)
        else {
            tracing::warn!(pool = %self.info.pool(), %reward_token, "not a reward token of the pool, skipped");
            return Ok(());
        };

        if !holder_total_power.is_zero() {
            let power_per_share = *holder_reward / holder_total_power;
            let start = usize::try_from(self.info.reward_start_range_index()).unwrap_or(usize::MAX);
            for index in start..self.range_count {
                let rank = Self::rank(index, &self.ranges.get(index));
                let value = power_per_share
                    .checked_mul(rank)
                    .and_then(|append| rps.values.get(index).0.checked_add(append))
                    .ok_or(Error::Overflow)?;
                rps.values.set(index, &RewardPerShare(value))?;
            }
        }

        let community_total_power = self.info.community_total_power(&*state);
        if !community_total_power.is_zero() {
            let pool = self.info.pool();
            let acc = self
                .farm
                .community_acc_reward_per_share(&*state, pool, reward_token)
                .checked_add(*community_reward / community_total_power)
                .ok_or(Error::Overflow)?;
            self.farm
                .set_community_acc_reward_per_share(state, pool, reward_token, acc);
        }

        tracing::debug!(
            pool = %self.info.pool(),
            %reward_token,
            %holder_reward,
            %community_reward,
            "reward per share updated"
        );
        Ok(())
    }

    /// Balance of `account` as of the block `block_hash`.
    ///
    /// After the 0815 fork a balance tracked in this block is returned without
    /// querying.
    pub fn balance_of<B: BalanceSource>(
        &mut self,
        balances: &B,
        block_hash: &B256,
        account: &Address,
    ) -> crate::Result<U256> {
        if self.is_fork_0815 {
            if let Some(balance) = self.balances.get(account) {
                return Ok(*balance);
            }
        }
        let balance = balances
            .balance_of(self.info.pool(), account, block_hash)
            .map_err(Error::BalanceQuery)?;
        self.balances.insert(*account, balance);
        Ok(balance)
    }

    /// Apply a pool token transfer of `amount` from `from` to `to`.
    ///
    /// Null, burn and contract endpoints are not tracked.
    pub fn put_transfer_event_log<S, T, B>(
        &mut self,
        ledger: &mut Ledger<'_, S, T, B>,
        block_hash: &B256,
        from: &Address,
        to: &Address,
        amount: &U256,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        if from == to {
            return Ok(());
        }

        if Self::is_tracked(&*ledger.state, from) {
            let origin = self.balance_of(ledger.balances, block_hash, from)?;
            let current = match origin.checked_sub(*amount) {
                Some(current) => current,
                None => {
                    tracing::warn!(account = %from, %origin, %amount, "transfer exceeds tracked balance");
                    U256::ZERO
                }
            };
            self.update_account_balance(ledger, from, &origin, &current)?;
        }

        if Self::is_tracked(&*ledger.state, to) {
            let origin = self.balance_of(ledger.balances, block_hash, to)?;
            let current = origin.checked_add(*amount).ok_or(Error::Overflow)?;
            self.update_account_balance(ledger, to, &origin, &current)?;
        }

        Ok(())
    }

    fn is_tracked<S: StateDb>(state: &S, account: &Address) -> bool {
        !account.is_sentinel() && !state.is_contract(account)
    }

    /// Sort and write the buffers back to the ledger.
    pub fn storage<S: StateDb>(&mut self, state: &mut S) -> crate::Result<()> {
        self.sort(state)?;
        state.set_raw_state(
            self.farm.address(),
            &self.ranges_slot,
            self.ranges.as_bytes().to_vec(),
        );
        for rps in &self.reward_per_shares {
            state.set_raw_state(self.farm.address(), &rps.slot, rps.values.as_bytes().to_vec());
        }
        Ok(())
    }
}
