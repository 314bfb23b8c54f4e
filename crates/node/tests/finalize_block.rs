use treefarm_model::{
    test::{setup_fmt_tracing, MemoryCache, MemoryState, MockRemote, RecordingCaller, StaticBalances},
    tree::authoritative::{ADDRESS_ADDED_SIGNATURE, IMPORT_RELATION_SIGNATURE},
    AddressTree, AuthoritativeTree, Header, Log, MirroredTree, PoolDistribution, Receipt,
    StateDb, Transaction,
};
use treefarm_node::{
    events::{EventTopics, DISTRIBUTE_REWARDS_SIGNATURE},
    Error, Farm, FarmConfig, TreeMode,
};
use treefarm_utils::{
    slot::{event_topic, parent_slot, selector},
    Address, B256, U256,
};

const FARM: Address = Address([0xfa; 20]);
const TREE: Address = Address([0xee; 20]);
const POOL: Address = Address([0x01; 20]);
const REWARD: Address = Address([0x02; 20]);

fn account(byte: u8) -> Address {
    Address([byte; 20])
}

fn tokens(whole: u64) -> U256 {
    U256::from(whole) * U256::from(1_000_000_000_000_000_000u64)
}

fn config(tree: TreeMode) -> FarmConfig {
    FarmConfig {
        farm_contract: FARM,
        address_tree_contract: TREE,
        tree,
        ..Default::default()
    }
}

fn header() -> Header {
    Header::builder()
        .number(1)
        .hash(B256::from_u64(1))
        .parent_hash(B256::from_u64(0xb0))
        .coinbase(account(0xcb))
        .build()
}

fn transfer_log(pool: &Address, from: &Address, to: &Address, amount: U256) -> Log {
    Log::builder()
        .address(*pool)
        .topics(vec![
            EventTopics::default().transfer,
            from.into_word(),
            to.into_word(),
        ])
        .data(B256::from(amount).as_bytes().to_vec())
        .build()
}

fn distribute_rewards_log(pool: &Address, holder: U256, community: U256) -> Log {
    let mut data = B256::from(holder).as_bytes().to_vec();
    data.extend_from_slice(B256::from(community).as_bytes());
    Log::builder()
        .address(FARM)
        .topics(vec![
            event_topic(DISTRIBUTE_REWARDS_SIGNATURE),
            pool.into_word(),
            REWARD.into_word(),
        ])
        .data(data)
        .build()
}

fn value_transfer(from: &Address, to: &Address, value: U256) -> Transaction {
    Transaction::builder()
        .sender(*from)
        .to(*to)
        .value(value)
        .build()
}

fn call(from: &Address, to: &Address) -> Transaction {
    Transaction::builder().sender(*from).to(*to).build()
}

struct Fixture {
    farm: Farm,
    state: MemoryState,
    tree: AuthoritativeTree<RecordingCaller>,
    balances: StaticBalances,
}

impl Fixture {
    fn new() -> treefarm_node::Result<Self> {
        let farm = Farm::new(config(TreeMode::Authoritative))?;
        let mut state = MemoryState::default();
        state.register_pool(farm.contract(), &POOL, 10, tokens(100), 0, &[REWARD]);
        state.set_code_size(&POOL, 1);
        state.set_code_size(&TREE, 1);
        state.set_code_size(&FARM, 1);
        Ok(Self {
            farm,
            state,
            tree: AuthoritativeTree::new(TREE, RecordingCaller::default()),
            balances: StaticBalances::default(),
        })
    }

    fn finalize(
        &mut self,
        transactions: &[Transaction],
        receipts: &[Receipt],
    ) -> treefarm_node::Result<()> {
        self.farm.finalize_block(
            &mut self.state,
            &mut self.tree,
            &self.balances,
            &header(),
            transactions,
            receipts,
        )
    }

    fn distribution(&self) -> treefarm_node::Result<PoolDistribution> {
        let contract = *self.farm.contract();
        let info = contract.pool_info(&self.state, &POOL);
        Ok(PoolDistribution::load(&self.state, contract, info, false)?)
    }

    fn power(&self, account: &Address) -> U256 {
        self.farm
            .contract()
            .user_info(&POOL, account)
            .community_power(&self.state)
    }
}

#[test]
fn value_transfer_creates_relation() -> treefarm_node::Result<()> {
    let _tracing = setup_fmt_tracing("debug");
    let mut fx = Fixture::new()?;
    let (root, child) = (account(0x10), account(0x11));
    fx.state.set_depth(&TREE, &root, 1);
    fx.balances.set(&POOL, &child, tokens(27));

    let txs = [value_transfer(&root, &child, tokens(4))];
    fx.finalize(&txs, &[Receipt::builder().tx_index(0).build()])?;

    assert_eq!(fx.tree.caller().calls().len(), 1);
    assert_eq!(fx.tree.parent_of(&fx.state, &child)?, root);
    assert_eq!(fx.tree.depth_of(&fx.state, &child)?, U256::from(2u64));
    assert_eq!(fx.tree.children_of(&fx.state, &root)?, vec![child]);
    // The existing balance of the child is credited to the new parent.
    assert_eq!(fx.power(&root), U256::from(3u64));
    Ok(())
}

#[test]
fn relation_requires_the_minimum_value() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (root, child) = (account(0x10), account(0x11));
    fx.state.set_depth(&TREE, &root, 1);

    let below = tokens(4) - U256::from(1u64);
    let txs = [value_transfer(&root, &child, below)];
    fx.finalize(&txs, &[Receipt::builder().tx_index(0).build()])?;

    assert!(fx.tree.caller().calls().is_empty());
    assert_eq!(fx.tree.depth_of(&fx.state, &child)?, U256::ZERO);
    Ok(())
}

#[test]
fn relation_requires_a_parent_in_the_tree() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (outsider, child) = (account(0x10), account(0x11));

    let txs = [value_transfer(&outsider, &child, tokens(10))];
    fx.finalize(&txs, &[Receipt::builder().tx_index(0).build()])?;

    assert!(fx.tree.caller().calls().is_empty());
    assert!(fx.tree.children_of(&fx.state, &outsider)?.is_empty());
    Ok(())
}

#[test]
fn contracts_and_related_accounts_are_not_related() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (root, contract, member) = (account(0x10), account(0x11), account(0x12));
    fx.state.set_depth(&TREE, &root, 1);
    fx.state.set_code_size(&contract, 10);
    fx.state.set_depth(&TREE, &member, 5);

    let txs = [
        value_transfer(&root, &contract, tokens(10)),
        value_transfer(&root, &member, tokens(10)),
    ];
    let receipts = [
        Receipt::builder().tx_index(0).build(),
        Receipt::builder().tx_index(1).build(),
    ];
    fx.finalize(&txs, &receipts)?;

    assert!(fx.tree.caller().calls().is_empty());
    Ok(())
}

#[test]
fn failed_receipts_are_ignored() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (root, child) = (account(0x10), account(0x11));
    fx.state.set_depth(&TREE, &root, 1);

    let txs = [value_transfer(&root, &child, tokens(10))];
    let receipts = [Receipt::builder()
        .success(false)
        .tx_index(0)
        .logs(vec![transfer_log(&POOL, &root, &child, tokens(500))])
        .build()];
    let words = fx.state.word_count();
    fx.finalize(&txs, &receipts)?;

    assert!(fx.tree.caller().calls().is_empty());
    assert_eq!(fx.state.word_count(), words);
    Ok(())
}

#[test]
fn pool_transfers_move_holders() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (a, b, user) = (account(0x10), account(0x11), account(0x12));
    fx.balances.set(&POOL, &a, tokens(300));

    let txs = [call(&user, &POOL)];
    let receipts = [Receipt::builder()
        .tx_index(0)
        .logs(vec![transfer_log(&POOL, &a, &b, tokens(250))])
        .build()];
    fx.finalize(&txs, &receipts)?;

    let dist = fx.distribution()?;
    // `a` drops to 50, `b` rises to 250.
    assert_eq!(dist.range(0).total_count, 0);
    assert_eq!(dist.range(2).total_count, 1);
    assert_eq!(dist.range(3).total_count, 0);
    assert_eq!(dist.info().holder_total_power(&fx.state), U256::from(1u64));
    Ok(())
}

#[test]
fn transfers_of_other_tokens_are_ignored() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let unconfigured = account(0x03);
    fx.state
        .register_pool(fx.farm.contract(), &unconfigured, 0, tokens(100), 0, &[REWARD]);
    let (a, b) = (account(0x10), account(0x11));

    let txs = [call(&a, &account(0x04))];
    let receipts = [Receipt::builder()
        .tx_index(0)
        .logs(vec![
            transfer_log(&account(0x04), &a, &b, tokens(1)),
            transfer_log(&unconfigured, &a, &b, tokens(1)),
        ])
        .build()];
    fx.finalize(&txs, &receipts)?;

    assert_eq!(fx.balances.queries(), 0);
    Ok(())
}

#[test]
fn distributed_rewards_are_shared_by_rank() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (holder, user) = (account(0x10), account(0x12));

    let txs = [call(&user, &FARM)];
    let receipts = [Receipt::builder()
        .tx_index(0)
        .logs(vec![
            transfer_log(&POOL, &Address::ZERO, &holder, tokens(250)),
            distribute_rewards_log(&POOL, U256::from(1_000u64), U256::from(500u64)),
        ])
        .build()];
    fx.finalize(&txs, &receipts)?;

    let dist = fx.distribution()?;
    assert_eq!(dist.info().holder_total_power(&fx.state), U256::from(1u64));
    assert_eq!(dist.reward_per_share(&REWARD, 0), Some(U256::ZERO));
    assert_eq!(dist.reward_per_share(&REWARD, 2), Some(U256::from(1_000u64)));
    // Range 3 ranks second once the empty range 1 is skipped.
    assert_eq!(dist.reward_per_share(&REWARD, 3), Some(U256::from(2_000u64)));
    // No community power yet.
    assert_eq!(
        fx.farm
            .contract()
            .community_acc_reward_per_share(&fx.state, &POOL, &REWARD),
        U256::ZERO
    );
    Ok(())
}

#[test]
fn rewards_for_unregistered_pools_are_skipped() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let txs = [call(&account(0x12), &FARM)];
    let receipts = [Receipt::builder()
        .tx_index(0)
        .logs(vec![distribute_rewards_log(
            &account(0x09),
            U256::from(1_000u64),
            U256::ZERO,
        )])
        .build()];
    fx.finalize(&txs, &receipts)?;
    assert_eq!(fx.distribution()?.reward_per_share(&REWARD, 2), Some(U256::ZERO));
    Ok(())
}

#[test]
fn imported_relations_are_appended() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (admin, root, child) = (account(0x0a), account(0x10), account(0x11));
    fx.state.set_depth(&TREE, &root, 1);
    // Written by the import call itself.
    fx.state.set_state(&TREE, &parent_slot(&child), root.into_word());
    fx.state.set_depth(&TREE, &child, 2);
    fx.balances.set(&POOL, &child, tokens(8));

    let txs = [Transaction::builder()
        .sender(admin)
        .to(TREE)
        .input(selector(IMPORT_RELATION_SIGNATURE).to_vec())
        .build()];
    let added = Log::builder()
        .address(TREE)
        .topics(vec![
            event_topic(ADDRESS_ADDED_SIGNATURE),
            root.into_word(),
            child.into_word(),
        ])
        .build();
    fx.finalize(&txs, &[Receipt::builder().tx_index(0).logs(vec![added]).build()])?;

    assert_eq!(fx.tree.children_of(&fx.state, &root)?, vec![child]);
    assert_eq!(fx.power(&root), U256::from(2u64));
    Ok(())
}

#[test]
fn relation_logs_outside_imports_are_ignored() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (root, child) = (account(0x10), account(0x11));
    let added = Log::builder()
        .address(TREE)
        .topics(vec![
            event_topic(ADDRESS_ADDED_SIGNATURE),
            root.into_word(),
            child.into_word(),
        ])
        .build();
    let txs = [call(&account(0x0a), &TREE)];
    fx.finalize(&txs, &[Receipt::builder().tx_index(0).logs(vec![added]).build()])?;

    assert!(fx.tree.children_of(&fx.state, &root)?.is_empty());
    Ok(())
}

#[test]
fn errors_roll_back_the_whole_block() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    fx.balances = StaticBalances::failing();
    let (root, child) = (account(0x10), account(0x11));
    fx.state.set_depth(&TREE, &root, 1);
    let words = fx.state.word_count();

    let txs = [value_transfer(&root, &child, tokens(4))];
    let err = fx
        .finalize(&txs, &[Receipt::builder().tx_index(0).build()])
        .expect_err("balance query fails");

    assert!(matches!(
        err,
        Error::Model(treefarm_model::Error::BalanceQuery(_))
    ));
    assert_eq!(fx.tree.caller().calls().len(), 1);
    assert_eq!(fx.tree.parent_of(&fx.state, &child)?, Address::ZERO);
    assert!(fx.tree.children_of(&fx.state, &root)?.is_empty());
    assert_eq!(fx.state.word_count(), words);
    Ok(())
}

#[test]
fn malformed_logs_roll_back() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let (a, b) = (account(0x10), account(0x11));
    let mut truncated = transfer_log(&POOL, &a, &b, tokens(1));
    truncated.data.truncate(16);

    let txs = [call(&a, &POOL)];
    let receipts = [Receipt::builder()
        .tx_index(0)
        .logs(vec![transfer_log(&POOL, &Address::ZERO, &a, tokens(500)), truncated])
        .build()];
    let err = fx.finalize(&txs, &receipts).expect_err("malformed log");

    assert!(matches!(err, Error::MalformedLog("Transfer")));
    assert_eq!(fx.distribution()?.range(5).total_count, 0);
    Ok(())
}

#[test]
fn receipts_must_reference_transactions() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let err = fx
        .finalize(&[], &[Receipt::builder().tx_index(5).build()])
        .expect_err("no transaction at index 5");
    assert!(matches!(err, Error::MissingTransaction(5)));
    Ok(())
}

#[test]
fn mirrored_tree_never_writes_relations() -> treefarm_node::Result<()> {
    let farm = Farm::new(config(TreeMode::Mirrored { tree_version: 1 }))?;
    let mut state = MemoryState::default();
    state.register_pool(farm.contract(), &POOL, 10, tokens(100), 0, &[REWARD]);
    state.set_code_size(&POOL, 1);
    let mut tree = MirroredTree::new(TREE, MockRemote::default(), MemoryCache::default(), 1)?;
    let balances = StaticBalances::default();

    let (root, child) = (account(0x10), account(0x11));
    let txs = [
        value_transfer(&root, &child, tokens(10)),
        Transaction::builder()
            .sender(root)
            .to(TREE)
            .input(selector(IMPORT_RELATION_SIGNATURE).to_vec())
            .build(),
    ];
    let added = Log::builder()
        .address(TREE)
        .topics(vec![
            event_topic(ADDRESS_ADDED_SIGNATURE),
            root.into_word(),
            child.into_word(),
        ])
        .build();
    let receipts = [
        Receipt::builder()
            .tx_index(0)
            .logs(vec![transfer_log(&POOL, &Address::ZERO, &child, tokens(250))])
            .build(),
        Receipt::builder().tx_index(1).logs(vec![added]).build(),
    ];
    farm.finalize_block(&mut state, &mut tree, &balances, &header(), &txs, &receipts)?;

    let contract = *farm.contract();
    let info = contract.pool_info(&state, &POOL);
    let dist = PoolDistribution::load(&state, contract, info, false)?;
    assert_eq!(dist.range(2).total_count, 1);
    assert!(state.get_raw_state(&TREE, &treefarm_utils::slot::children_slot(&root)).is_empty());
    Ok(())
}

#[test]
fn tree_mode_must_match_the_config() -> treefarm_node::Result<()> {
    let mut fx = Fixture::new()?;
    let mut tree = MirroredTree::new(TREE, MockRemote::default(), MemoryCache::default(), 1)?;
    let err = fx
        .farm
        .finalize_block(&mut fx.state, &mut tree, &fx.balances, &header(), &[], &[])
        .expect_err("mirrored tree with an authoritative config");
    assert!(matches!(
        err,
        Error::TreeModeMismatch { configured: false }
    ));
    Ok(())
}
