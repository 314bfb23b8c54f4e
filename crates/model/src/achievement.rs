//! Community power propagation along the address tree.

use treefarm_utils::{Address, HoldAmount, U256};

use crate::{
    farm::{FarmContract, PoolInfo, RewardInfo},
    state::StateDb,
    tree::AddressTree,
    Error,
};

/// Maximum number of entries of an ancestor walk, including the starting account.
pub const TREE_HEIGHT_MAX_LIMIT: usize = 200;

/// Balance in whole tokens below which a child scores ten points per token.
pub const BONUS_THRESHOLD: u64 = 10_000;

/// Flat bonus added to the whole-token balance of children at or above the threshold.
pub const BONUS: u64 = 90_000;

const ETHER: u128 = 1_000_000_000_000_000_000;

/// Community power derived from the balances of the direct children.
///
/// Each child scores ten points per whole token below [`BONUS_THRESHOLD`] and
/// its whole-token balance plus [`BONUS`] at or above it. The largest score is
/// replaced by the integer cube root of its whole-token balance.
pub fn community_power(holds: impl IntoIterator<Item = U256>) -> u64 {
    let ether = U256::from(ETHER);
    let mut total = 0u64;
    let mut max_power = 0u64;
    let mut max_whole = 0u64;
    for amount in holds {
        let whole = (amount / ether).saturating_to::<u64>();
        let power = if whole < BONUS_THRESHOLD {
            (amount.saturating_mul(U256::from(10u64)) / ether).saturating_to::<u64>()
        } else {
            whole.saturating_add(BONUS)
        };
        if power > max_power {
            max_power = power;
            max_whole = whole;
        }
        total = total.saturating_add(power);
    }
    total.saturating_sub(max_power).saturating_add(integer_cbrt(max_whole))
}

/// Floor of the cube root of `n`.
pub fn integer_cbrt(n: u64) -> u64 {
    // Largest `x` with `x^3 <= u64::MAX`.
    const MAX_ROOT: u64 = 2_642_245;
    let (mut lo, mut hi) = (0u64, MAX_ROOT);
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if mid * mid * mid <= n {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}

/// Propagates balance changes of one pool to the ancestors of an account.
#[derive(Debug, Clone, Copy)]
pub struct Achievement<'a> {
    farm: &'a FarmContract,
    info: &'a PoolInfo,
}

impl<'a> Achievement<'a> {
    /// Create a propagator for the pool described by `info`.
    pub fn new(farm: &'a FarmContract, info: &'a PoolInfo) -> Self {
        Self { farm, info }
    }

    /// Ancestor chain of `from`, starting with `from` itself.
    ///
    /// The walk stops at the null or burn address and never yields more than
    /// [`TREE_HEIGHT_MAX_LIMIT`] entries.
    pub fn ancestors<S, T>(
        state: &S,
        tree: &mut T,
        from: &Address,
    ) -> crate::Result<([Address; TREE_HEIGHT_MAX_LIMIT], usize)>
    where
        S: StateDb,
        T: AddressTree<S>,
    {
        let mut chain = [Address::ZERO; TREE_HEIGHT_MAX_LIMIT];
        let mut len = 0;
        let mut node = *from;
        while len < TREE_HEIGHT_MAX_LIMIT && !node.is_sentinel() {
            chain[len] = node;
            node = tree.parent_of(state, &node)?;
            len += 1;
        }
        Ok((chain, len))
    }

    /// Apply the balance change of `from` from `origin` to `current` to every
    /// ancestor of `from`.
    pub fn update<S, T>(
        &self,
        state: &mut S,
        tree: &mut T,
        from: &Address,
        origin: &U256,
        current: &U256,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
    {
        let (chain, len) = Self::ancestors(&*state, tree, from)?;
        tracing::trace!(%from, ancestors = len, "walking ancestors");

        for pair in chain[..len].windows(2) {
            let (child, parent) = (&pair[0], &pair[1]);
            self.update_parent(state, tree, child, parent, origin, current)?;
        }
        Ok(())
    }

    fn update_parent<S, T>(
        &self,
        state: &mut S,
        tree: &mut T,
        child: &Address,
        parent: &Address,
        origin: &U256,
        current: &U256,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
    {
        let pool = self.info.pool();
        let user = self.farm.user_info(pool, parent);
        let children = tree.children_of(&*state, parent)?;

        let mut holds = user.children_hold_amount(&*state);
        holds.ensure_len(children.len());
        if let Some(index) = children.iter().position(|c| c == child) {
            let hold = holds
                .get(index)
                .0
                .checked_add(*current)
                .ok_or(Error::Overflow)?
                .saturating_sub(*origin);
            holds.set(index, &HoldAmount(hold))?;
        }

        let power = user.community_power(&*state);
        for token in self.info.reward_tokens() {
            let acc = self.farm.community_acc_reward_per_share(&*state, pool, token);
            let info = user.community_reward_info(&*state, token);
            let pending = power
                .checked_mul(acc.saturating_sub(info.reward_debt))
                .ok_or(Error::Overflow)?;
            let reward = info.reward.checked_add(pending).ok_or(Error::Overflow)?;
            user.set_community_reward_info(
                state,
                token,
                &RewardInfo {
                    reward,
                    reward_debt: acc,
                },
            );
        }

        let next_power = U256::from(community_power(holds.iter().map(|h| h.0)));
        let total = self
            .info
            .community_total_power(&*state)
            .checked_add(next_power)
            .ok_or(Error::Overflow)?
            .saturating_sub(power);
        self.info.set_community_total_power(state, total);
        user.set_children_hold_amount(state, &holds);
        user.set_community_power(state, next_power);
        Ok(())
    }
}
