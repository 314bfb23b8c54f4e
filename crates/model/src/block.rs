use treefarm_utils::{Address, B256, U256};
use typed_builder::TypedBuilder;

/// Finalized block header fields used by the farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct Header {
    /// Block number.
    pub number: u64,
    /// Block hash.
    #[builder(default)]
    pub hash: B256,
    /// Hash of the parent block.
    #[builder(default)]
    pub parent_hash: B256,
    /// Block producer.
    #[builder(default)]
    pub coinbase: Address,
}

/// An executed transaction with its recovered sender.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Transaction {
    /// Recovered sender.
    pub sender: Address,
    /// Recipient, `None` for contract creation.
    #[builder(default, setter(strip_option))]
    pub to: Option<Address>,
    /// Transferred native value.
    #[builder(default)]
    pub value: U256,
    /// Call data.
    #[builder(default)]
    pub input: Vec<u8>,
}

/// An event log.
#[derive(Debug, Clone, Default, PartialEq, Eq, TypedBuilder)]
pub struct Log {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics, the first one is the event signature.
    #[builder(default)]
    pub topics: Vec<B256>,
    /// Non-indexed data.
    #[builder(default)]
    pub data: Vec<u8>,
}

impl Log {
    /// Returns whether the first topic equals `topic`.
    pub fn is_event(&self, topic: &B256) -> bool {
        self.topics.first() == Some(topic)
    }
}

/// Receipt of an executed transaction.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct Receipt {
    /// Whether the transaction succeeded.
    #[builder(default = true)]
    pub success: bool,
    /// Index of the transaction in the block.
    pub tx_index: usize,
    /// Emitted logs.
    #[builder(default)]
    pub logs: Vec<Log>,
}
