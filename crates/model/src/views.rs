//! Read-only calls into the farm and tree contracts answered from the packed
//! ledger instead of contract code.
//!
//! Results are ABI-encoded: scalars as 32-byte words, lists as a dynamic
//! array (offset word, length word, one word per element).

use treefarm_utils::{
    codec::read_be,
    primitives::{ADDRESS_LENGTH, WORD_LENGTH},
    slot::{
        children_hold_amount_slot, children_slot, holder_distribution_slot, reward_per_share_slot,
    },
    Address, HoldAmount, Packed, RangeInfo, Record, RewardPerShare, B256, U256,
};

use crate::{
    state::StateDb,
    tree::{CacheDb, MirroredTree, RemoteState},
};

/// `holderRangeInfoOf(address,uint64)`.
pub const HOLDER_RANGE_INFO_OF: [u8; 4] = [0x0e, 0x60, 0x3a, 0x1c];

/// `holderRangeAccRewardPerShare(address,address,uint64)`.
pub const HOLDER_RANGE_ACC_REWARD_PER_SHARE: [u8; 4] = [0x24, 0xfc, 0x55, 0xd9];

/// `childrenHoldAmount(address,address)`.
pub const CHILDREN_HOLD_AMOUNT: [u8; 4] = [0xe8, 0xb2, 0x3a, 0xd8];

/// `childrenOf(address)`.
pub const CHILDREN_OF: [u8; 4] = [0x42, 0xc4, 0xc0, 0xd0];

/// `depthOf(address)`.
pub const DEPTH_OF: [u8; 4] = [0x7c, 0x31, 0x65, 0xb1];

/// `parentOf(address)`.
pub const PARENT_OF: [u8; 4] = [0xee, 0x08, 0x38, 0x8e];

/// `versionOf(address)`.
pub const VERSION_OF: [u8; 4] = [0x0d, 0xb3, 0xff, 0x45];

const SELECTOR_LENGTH: usize = 4;

/// A view call into the farm contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmCall {
    /// Occupancy of a range of a pool.
    HolderRangeInfoOf {
        /// Pool.
        pool: Address,
        /// Requested range, clamped to the last stored range.
        range_index: u64,
    },
    /// Reward per share of a range of a pool.
    HolderRangeAccRewardPerShare {
        /// Pool.
        pool: Address,
        /// Reward token.
        reward_token: Address,
        /// Requested range, clamped to the last stored range.
        range_index: u64,
    },
    /// Tracked balances of the direct children of an account.
    ChildrenHoldAmount {
        /// Pool.
        pool: Address,
        /// Parent.
        parent: Address,
    },
}

impl FarmCall {
    /// Decode from call data.
    ///
    /// Returns `None` for unknown selectors and unexpected input lengths.
    pub fn decode(input: &[u8]) -> Option<Self> {
        let (selector, args) = split_selector(input)?;
        match (selector, args.len() / WORD_LENGTH, args.len() % WORD_LENGTH) {
            (HOLDER_RANGE_INFO_OF, 2, 0) => Some(Self::HolderRangeInfoOf {
                pool: arg_address(args, 0),
                range_index: arg_u64(args, 1),
            }),
            (HOLDER_RANGE_ACC_REWARD_PER_SHARE, 3, 0) => Some(Self::HolderRangeAccRewardPerShare {
                pool: arg_address(args, 0),
                reward_token: arg_address(args, 1),
                range_index: arg_u64(args, 2),
            }),
            (CHILDREN_HOLD_AMOUNT, 2, 0) => Some(Self::ChildrenHoldAmount {
                pool: arg_address(args, 0),
                parent: arg_address(args, 1),
            }),
            _ => None,
        }
    }
}

/// A view call into the address tree contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeCall {
    /// Depth of an account.
    DepthOf(Address),
    /// Parent of an account.
    ParentOf(Address),
    /// Node version of an account.
    VersionOf(Address),
    /// Children of an account.
    ChildrenOf(Address),
}

impl TreeCall {
    /// Decode from call data.
    ///
    /// Returns `None` for unknown selectors and unexpected input lengths.
    pub fn decode(input: &[u8]) -> Option<Self> {
        let (selector, args) = split_selector(input)?;
        if args.len() != WORD_LENGTH {
            return None;
        }
        let account = arg_address(args, 0);
        match selector {
            DEPTH_OF => Some(Self::DepthOf(account)),
            PARENT_OF => Some(Self::ParentOf(account)),
            VERSION_OF => Some(Self::VersionOf(account)),
            CHILDREN_OF => Some(Self::ChildrenOf(account)),
            _ => None,
        }
    }
}

fn split_selector(input: &[u8]) -> Option<([u8; SELECTOR_LENGTH], &[u8])> {
    if input.len() < SELECTOR_LENGTH {
        return None;
    }
    let (selector, args) = input.split_at(SELECTOR_LENGTH);
    Some((selector.try_into().ok()?, args))
}

fn arg(args: &[u8], index: usize) -> &[u8] {
    &args[index * WORD_LENGTH..(index + 1) * WORD_LENGTH]
}

fn arg_address(args: &[u8], index: usize) -> Address {
    B256::left_padded(arg(args, index)).to_address()
}

/// Only the low 64 bits of the argument are used.
fn arg_u64(args: &[u8], index: usize) -> u64 {
    read_be(arg(args, index)).as_limbs()[0]
}

/// ABI encoding of a dynamic array of words.
fn encode_array(words: impl ExactSizeIterator<Item = B256>) -> Vec<u8> {
    let mut out = Vec::with_capacity((words.len() + 2) * WORD_LENGTH);
    out.extend_from_slice(B256::from_u64(WORD_LENGTH as u64).as_bytes());
    out.extend_from_slice(B256::from(U256::from(words.len())).as_bytes());
    for word in words {
        out.extend_from_slice(word.as_bytes());
    }
    out
}

/// Index of the stored record answering a request for `index`, or `None`
/// if the buffer holds no whole record.
fn clamped<R: Record>(buffer: &Packed<R>, index: u64) -> Option<usize> {
    let last = buffer.len().checked_sub(1)?;
    Some(usize::try_from(index).map_or(last, |index| index.min(last)))
}

/// Views of the farm and tree contracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Views {
    farm: Address,
    tree: Address,
}

impl Views {
    /// Views of the farm contract at `farm` and the tree contract at `tree`.
    pub fn new(farm: Address, tree: Address) -> Self {
        Self { farm, tree }
    }

    /// Answer a call to `to` with an authoritative tree.
    ///
    /// Returns `None` if the call is not served by a view and must be
    /// executed by the contract.
    pub fn call<S: StateDb>(&self, state: &S, to: &Address, input: &[u8]) -> Option<Vec<u8>> {
        if *to == self.farm {
            return FarmCall::decode(input).map(|call| self.farm_call(state, &call));
        }
        if *to == self.tree {
            if let Some(TreeCall::ChildrenOf(parent)) = TreeCall::decode(input) {
                return Some(self.children_of(state, &parent));
            }
        }
        None
    }

    /// Answer a call to `to` with a mirrored tree.
    ///
    /// Tree reads are served from the local cache only and never reach the
    /// remote source.
    pub fn call_mirrored<S, R, D>(
        &self,
        state: &S,
        tree: &mut MirroredTree<R, D>,
        to: &Address,
        input: &[u8],
    ) -> crate::Result<Option<Vec<u8>>>
    where
        S: StateDb,
        R: RemoteState,
        D: CacheDb,
    {
        if *to == self.farm {
            return Ok(FarmCall::decode(input).map(|call| self.farm_call(state, &call)));
        }
        if *to != self.tree {
            return Ok(None);
        }
        let Some(call) = TreeCall::decode(input) else {
            return Ok(None);
        };
        let result = match call {
            TreeCall::DepthOf(account) => {
                let depth = tree.cached_node(&account)?.map(|node| node.depth);
                B256::from(depth.unwrap_or_default()).as_bytes().to_vec()
            }
            TreeCall::ParentOf(account) => {
                let parent = tree.cached_node(&account)?.map(|node| node.parent);
                parent.unwrap_or_default().into_word().as_bytes().to_vec()
            }
            TreeCall::VersionOf(account) => {
                let version = tree.cached_node(&account)?.map(|node| node.version);
                B256::from_u64(version.unwrap_or_default()).as_bytes().to_vec()
            }
            TreeCall::ChildrenOf(parent) => {
                let children = tree.cached_children(&parent)?;
                encode_array(children.into_iter().map(Address::into_word))
            }
        };
        Ok(Some(result))
    }

    /// Answer a farm contract call.
    pub fn farm_call<S: StateDb>(&self, state: &S, call: &FarmCall) -> Vec<u8> {
        match call {
            FarmCall::HolderRangeInfoOf { pool, range_index } => {
                self.holder_range_info_of(state, pool, *range_index)
            }
            FarmCall::HolderRangeAccRewardPerShare {
                pool,
                reward_token,
                range_index,
            } => self.holder_range_acc_reward_per_share(state, pool, reward_token, *range_index),
            FarmCall::ChildrenHoldAmount { pool, parent } => {
                self.children_hold_amount(state, pool, parent)
            }
        }
    }

    /// Total count and empty range count of a range of `pool`, as two words.
    ///
    /// Both are zero if the pool has no stored ranges.
    pub fn holder_range_info_of<S: StateDb>(
        &self,
        state: &S,
        pool: &Address,
        range_index: u64,
    ) -> Vec<u8> {
        let ranges: Packed<RangeInfo> =
            Packed::from_raw(state.get_raw_state(&self.farm, &holder_distribution_slot(pool)));
        let range = clamped(&ranges, range_index)
            .map(|index| ranges.get(index))
            .unwrap_or_default();
        let mut out = Vec::with_capacity(2 * WORD_LENGTH);
        out.extend_from_slice(B256::from_u64(range.total_count.into()).as_bytes());
        out.extend_from_slice(B256::from_u64(range.empty_range_count.into()).as_bytes());
        out
    }

    /// Reward per share of `reward_token` at a range of `pool`, as one word.
    ///
    /// Zero if the buffer is empty.
    pub fn holder_range_acc_reward_per_share<S: StateDb>(
        &self,
        state: &S,
        pool: &Address,
        reward_token: &Address,
        range_index: u64,
    ) -> Vec<u8> {
        let values: Packed<RewardPerShare> = Packed::from_raw(
            state.get_raw_state(&self.farm, &reward_per_share_slot(pool, reward_token)),
        );
        let value = clamped(&values, range_index)
            .map(|index| values.get(index).0)
            .unwrap_or_default();
        B256::from(value).as_bytes().to_vec()
    }

    /// Tracked balances of the direct children of `parent` in `pool`.
    pub fn children_hold_amount<S: StateDb>(
        &self,
        state: &S,
        pool: &Address,
        parent: &Address,
    ) -> Vec<u8> {
        let holds: Packed<HoldAmount> = Packed::from_raw(
            state.get_raw_state(&self.farm, &children_hold_amount_slot(pool, parent)),
        );
        let holds: Vec<B256> = holds.iter().map(|hold| B256::from(hold.0)).collect();
        encode_array(holds.into_iter())
    }

    /// Children of `parent` in the local tree contract.
    pub fn children_of<S: StateDb>(&self, state: &S, parent: &Address) -> Vec<u8> {
        let raw = state.get_raw_state(&self.tree, &children_slot(parent));
        encode_array(
            raw.chunks_exact(ADDRESS_LENGTH)
                .map(|child| Address::from_slice_lossy(child).into_word()),
        )
    }
}
