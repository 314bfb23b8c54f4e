//! Deterministic storage coordinates.
//!
//! Every coordinate reproduces the storage layout produced by the contract
//! compiler for the farm and address-tree system contracts, so that values
//! written by contract code and values written by the node land in the same
//! place.

use ruint::aliases::U256;
use sha3::{Digest, Keccak256};

use crate::primitives::{Address, B256};

/// Tag of the raw children list of an address-tree node.
pub const RAW_CHILDREN_TAG: &[u8] = b"__RAW_CHILDREN";

/// Tag of the packed range buffer of a pool.
pub const HOLDER_DISTRIBUTION_TAG: &[u8] = b"__HolderDistribution";

/// Tag of the packed reward-per-share buffer of a pool and reward token.
pub const REWARD_PER_SHARE_TAG: &[u8] = b"__RewardPerShare";

/// Tag of the packed children-hold-amount buffer of a pool member.
pub const CHILDREN_HOLD_AMOUNT_TAG: &[u8] = b"__ChildrenHoldAmount";

/// Declared slot of `parentOf` in the address-tree contract.
pub const TREE_PARENT_OF_SLOT: u64 = 4;

/// Declared slot of `depthOf` in the address-tree contract.
pub const TREE_DEPTH_OF_SLOT: u64 = 5;

/// Declared slot of `versionOf` in the address-tree contract.
pub const TREE_VERSION_OF_SLOT: u64 = 6;

/// Declared slot of the pool list in the farm contract.
pub const FARM_POOLS_SLOT: u64 = 2;

/// Declared slot of `poolOf` in the farm contract.
pub const FARM_POOL_OF_SLOT: u64 = 3;

/// Declared slot of the community accumulated reward per share in the farm contract.
pub const FARM_COMMUNITY_ACC_REWARD_PER_SHARE_SLOT: u64 = 4;

/// Declared slot of `userInfo` in the farm contract.
pub const FARM_USER_INFO_SLOT: u64 = 5;

/// Storage namespace prefix of the local cache database.
pub const CACHE_STORAGE_PREFIX: u8 = 0x73;

/// Keccak-256 over the concatenation of `parts`.
pub fn keccak256_concat(parts: &[&[u8]]) -> B256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    B256(hasher.finalize().into())
}

/// Keccak-256 of `data`.
pub fn keccak256(data: impl AsRef<[u8]>) -> B256 {
    keccak256_concat(&[data.as_ref()])
}

/// Hash of the 32-byte left-padded `subject` followed by the 32-byte left-padded `tag`.
pub fn slot(subject: &[u8], tag: &[u8]) -> B256 {
    let subject = B256::left_padded(subject);
    let tag = B256::left_padded(tag);
    keccak256_concat(&[subject.as_bytes(), tag.as_bytes()])
}

/// Slot of the value keyed by `key` in the mapping declared at `base`.
pub fn mapping_slot(key: &B256, base: &B256) -> B256 {
    keccak256_concat(&[key.as_bytes(), base.as_bytes()])
}

/// Slot of the struct member at `offset` from `base`.
pub fn member_slot(base: &B256, offset: u64) -> B256 {
    B256::from(base.to_u256().wrapping_add(U256::from(offset)))
}

/// Slot of the element at `index` of the dynamic array declared at `array`.
pub fn array_element_slot(array: &B256, index: u64) -> B256 {
    member_slot(&keccak256(array.as_bytes()), index)
}

/// Slot of the raw children list of `account`.
pub fn children_slot(account: &Address) -> B256 {
    slot(account.as_bytes(), RAW_CHILDREN_TAG)
}

/// Slot of the parent of `account`.
pub fn parent_slot(account: &Address) -> B256 {
    mapping_slot(&account.into_word(), &B256::from_u64(TREE_PARENT_OF_SLOT))
}

/// Slot of the depth of `account`.
pub fn depth_slot(account: &Address) -> B256 {
    mapping_slot(&account.into_word(), &B256::from_u64(TREE_DEPTH_OF_SLOT))
}

/// Slot of the confirmed version of `account`.
pub fn version_slot(account: &Address) -> B256 {
    mapping_slot(&account.into_word(), &B256::from_u64(TREE_VERSION_OF_SLOT))
}

/// Slot of the packed range buffer of `pool`.
pub fn holder_distribution_slot(pool: &Address) -> B256 {
    slot(HOLDER_DISTRIBUTION_TAG, pool.as_bytes())
}

/// Slot of the packed reward-per-share buffer of `pool` for `reward_token`.
///
/// Unlike the other tagged slots, the inputs are hashed without padding.
pub fn reward_per_share_slot(pool: &Address, reward_token: &Address) -> B256 {
    keccak256_concat(&[
        REWARD_PER_SHARE_TAG,
        pool.as_bytes(),
        reward_token.as_bytes(),
    ])
}

/// Slot of the packed children-hold-amount buffer of `account` in `pool`.
pub fn children_hold_amount_slot(pool: &Address, account: &Address) -> B256 {
    let tag = B256::left_padded(CHILDREN_HOLD_AMOUNT_TAG);
    keccak256_concat(&[
        tag.as_bytes(),
        pool.into_word().as_bytes(),
        account.into_word().as_bytes(),
    ])
}

/// Slot of the pool record of `pool` in the farm contract.
pub fn pool_info_slot(pool: &Address) -> B256 {
    mapping_slot(&pool.into_word(), &B256::from_u64(FARM_POOL_OF_SLOT))
}

/// Slot of the user record of `account` in `pool`.
pub fn user_info_slot(pool: &Address, account: &Address) -> B256 {
    let by_pool = mapping_slot(&pool.into_word(), &B256::from_u64(FARM_USER_INFO_SLOT));
    mapping_slot(&account.into_word(), &by_pool)
}

/// Slot of the community accumulated reward per share of `pool` for `reward_token`.
pub fn community_acc_reward_per_share_slot(pool: &Address, reward_token: &Address) -> B256 {
    let by_pool = mapping_slot(
        &pool.into_word(),
        &B256::from_u64(FARM_COMMUNITY_ACC_REWARD_PER_SHARE_SLOT),
    );
    mapping_slot(&reward_token.into_word(), &by_pool)
}

/// Key of `slot` of `contract` in the local cache database.
///
/// The key is `prefix ‖ keccak(contract as a word) ‖ slot`.
pub fn cache_key(contract: &Address, slot: &B256) -> Vec<u8> {
    let account_hash = keccak256(contract.into_word().as_bytes());
    let mut key = Vec::with_capacity(1 + 2 * crate::primitives::WORD_LENGTH);
    key.push(CACHE_STORAGE_PREFIX);
    key.extend_from_slice(account_hash.as_bytes());
    key.extend_from_slice(slot.as_bytes());
    key
}

/// The 4-byte selector of a function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0; 4];
    out.copy_from_slice(&hash.0[..4]);
    out
}

/// The topic of an event signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}
