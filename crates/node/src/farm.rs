use std::collections::HashMap;

use treefarm_model::{
    AddressTree, BalanceSource, FarmContract, Header, Ledger, Log, PoolDistribution, PoolInfo,
    Receipt, StateDb, StateDbExt, Transaction,
};
use treefarm_utils::{Address, U256};

use crate::{
    config::FarmConfig,
    events::{DistributeRewards, EventTopics, Transfer},
    Error,
};

/// Per-block handler of the farm.
#[derive(Debug, Clone)]
pub struct Farm {
    config: FarmConfig,
    contract: FarmContract,
    topics: EventTopics,
}

impl Farm {
    /// Create a handler from a validated configuration.
    pub fn new(config: FarmConfig) -> crate::Result<Self> {
        config.validate()?;
        Ok(Self {
            contract: FarmContract::new(config.farm_contract),
            config,
            topics: EventTopics::default(),
        })
    }

    /// Configuration.
    pub fn config(&self) -> &FarmConfig {
        &self.config
    }

    /// Farm contract view.
    pub fn contract(&self) -> &FarmContract {
        &self.contract
    }

    /// Apply the effects of a finalized block to the farm ledger.
    ///
    /// Either every effect of the block is applied or, on error, the ledger is
    /// rolled back to its state before the call and the error is returned.
    pub fn finalize_block<S, T, B>(
        &self,
        state: &mut S,
        tree: &mut T,
        balances: &B,
        header: &Header,
        transactions: &[Transaction],
        receipts: &[Receipt],
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        let span = tracing::debug_span!("finalize_block", number = header.number, hash = %header.hash);
        let _enter = span.enter();

        if tree.is_mirrored() != self.config.tree.is_mirrored() {
            return Err(Error::TreeModeMismatch {
                configured: self.config.tree.is_mirrored(),
            });
        }

        let snapshot = state.snapshot();
        let mut ledger = Ledger::new(state, tree, balances);
        match self.process(&mut ledger, header, transactions, receipts) {
            Ok(touched) => {
                tracing::debug!(pools = touched, "block finalized");
                Ok(())
            }
            Err(err) => {
                ledger.state.revert_to_snapshot(snapshot);
                tracing::warn!(%err, "farm rolled back");
                Err(err)
            }
        }
    }

    fn process<S, T, B>(
        &self,
        ledger: &mut Ledger<'_, S, T, B>,
        header: &Header,
        transactions: &[Transaction],
        receipts: &[Receipt],
    ) -> crate::Result<usize>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        let mut pools = Pools::load(
            &*ledger.state,
            &self.contract,
            self.config.is_fork_0815(header.number),
        );
        let authoritative = !ledger.tree.is_mirrored();

        for receipt in receipts.iter().filter(|receipt| receipt.success) {
            let tx = transactions
                .get(receipt.tx_index)
                .ok_or(Error::MissingTransaction(receipt.tx_index))?;

            if authoritative {
                self.handle_relation_transfer(ledger, &mut pools, header, tx)?;
            }

            let is_import = authoritative && ledger.tree.is_import_transaction(tx);
            for log in &receipt.logs {
                self.handle_log(ledger, &mut pools, header, is_import, log)?;
            }
        }

        pools.storage(ledger.state)
    }

    /// Create the relation `sender -> to` for a plain value transfer into an
    /// account outside of the tree.
    fn handle_relation_transfer<S, T, B>(
        &self,
        ledger: &mut Ledger<'_, S, T, B>,
        pools: &mut Pools,
        header: &Header,
        tx: &Transaction,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        let Some(child) = tx.to else {
            return Ok(());
        };
        let parent = tx.sender;
        if child.is_sentinel() || !ledger.tree.depth_of(&*ledger.state, &child)?.is_zero() {
            return Ok(());
        }
        if ledger.state.is_contract(&parent)
            || ledger.state.is_contract(&child)
            || tx.value < self.config.make_relation_value()
        {
            return Ok(());
        }
        if ledger.tree.depth_of(&*ledger.state, &parent)?.is_zero() {
            return Ok(());
        }

        ledger
            .tree
            .make_relation(ledger.state, header, &parent, &child)?;
        ledger.tree.append_child(ledger.state, &parent, &child)?;
        tracing::debug!(%parent, %child, "relation created by transfer");
        pools.seed_achievement(ledger, header, &child)
    }

    fn handle_log<S, T, B>(
        &self,
        ledger: &mut Ledger<'_, S, T, B>,
        pools: &mut Pools,
        header: &Header,
        is_import: bool,
        log: &Log,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        if log.is_event(&self.topics.transfer) {
            let Some(distribution) = pools.distribution(&*ledger.state, &log.address)? else {
                return Ok(());
            };
            let Transfer { from, to, amount } = Transfer::decode(log)?;
            return distribution.put_transfer_event_log(
                ledger,
                &header.parent_hash,
                &from,
                &to,
                &amount,
            )
            .map_err(Into::into);
        }

        let added = if is_import {
            ledger.tree.is_address_added_log(log)
        } else {
            None
        };
        if let Some((parent, child)) = added {
            ledger.tree.append_child(ledger.state, &parent, &child)?;
            tracing::debug!(%parent, %child, "relation imported");
            pools.seed_achievement(ledger, header, &child)?;
        } else if log.address == *self.contract.address()
            && log.is_event(&self.topics.distribute_rewards)
        {
            let event = DistributeRewards::decode(log)?;
            let Some(distribution) = pools.distribution(&*ledger.state, &event.pool)? else {
                tracing::warn!(pool = %event.pool, "rewards distributed to an unregistered pool, skipped");
                return Ok(());
            };
            distribution.update_reward_per_shares(
                ledger.state,
                &event.reward_token,
                &event.holder_reward,
                &event.community_reward,
            )?;
        }
        Ok(())
    }
}

/// Registered pools and the distributions touched in the current block.
#[derive(Debug)]
struct Pools {
    contract: FarmContract,
    is_fork_0815: bool,
    infos: Vec<PoolInfo>,
    positions: HashMap<Address, usize>,
    distributions: Vec<Option<PoolDistribution>>,
}

impl Pools {
    fn load<S: StateDb>(state: &S, contract: &FarmContract, is_fork_0815: bool) -> Self {
        let mut infos = Vec::new();
        let mut positions = HashMap::new();
        for pool in contract.pools(state) {
            if positions.contains_key(&pool) {
                continue;
            }
            let info = contract.pool_info(state, &pool);
            if !info.is_configured() {
                tracing::warn!(%pool, range_count = info.range_count(), "pool is not configured, skipped");
                continue;
            }
            positions.insert(pool, infos.len());
            infos.push(info);
        }
        let distributions = infos.iter().map(|_| None).collect();
        Self {
            contract: *contract,
            is_fork_0815,
            infos,
            positions,
            distributions,
        }
    }

    /// Distribution of `pool`, loaded on first use.
    ///
    /// Returns `None` if `pool` is not a configured pool.
    fn distribution<S: StateDb>(
        &mut self,
        state: &S,
        pool: &Address,
    ) -> crate::Result<Option<&mut PoolDistribution>> {
        match self.positions.get(pool) {
            Some(index) => self.load_distribution(state, *index).map(Some),
            None => Ok(None),
        }
    }

    fn load_distribution<S: StateDb>(
        &mut self,
        state: &S,
        index: usize,
    ) -> crate::Result<&mut PoolDistribution> {
        let distribution = match self.distributions[index].take() {
            Some(distribution) => distribution,
            None => PoolDistribution::load(
                state,
                self.contract,
                self.infos[index].clone(),
                self.is_fork_0815,
            )?,
        };
        Ok(self.distributions[index].insert(distribution))
    }

    /// Propagate the parent-block balance of a newly related `child` in every
    /// pool to its ancestors.
    fn seed_achievement<S, T, B>(
        &mut self,
        ledger: &mut Ledger<'_, S, T, B>,
        header: &Header,
        child: &Address,
    ) -> crate::Result<()>
    where
        S: StateDb,
        T: AddressTree<S>,
        B: BalanceSource,
    {
        for index in 0..self.infos.len() {
            let distribution = self.load_distribution(&*ledger.state, index)?;
            let balance = distribution.balance_of(ledger.balances, &header.parent_hash, child)?;
            if !balance.is_zero() {
                distribution.update_achievement(ledger, child, &U256::ZERO, &balance)?;
            }
        }
        Ok(())
    }

    /// Write every touched distribution back, returns the number of them.
    fn storage<S: StateDb>(&mut self, state: &mut S) -> crate::Result<usize> {
        let mut touched = 0;
        for distribution in self.distributions.iter_mut().flatten() {
            distribution.storage(state)?;
            touched += 1;
        }
        Ok(touched)
    }
}
