use treefarm_utils::{
    primitives::ADDRESS_LENGTH,
    slot::{children_slot, depth_slot, event_topic, parent_slot, selector},
    Address, U256,
};

use crate::{
    block::{Header, Log, Transaction},
    error::BoxError,
    state::{StateDb, StateDbExt},
    Error,
};

use super::AddressTree;

/// Signature of the relation-recording function of the tree contract.
pub const MAKE_RELATION_SIGNATURE: &str = "makeRelation(address,address)";

/// Signature of the batch import function of the tree contract.
pub const IMPORT_RELATION_SIGNATURE: &str = "importRelation(address[],address[])";

/// Signature of the relation-added event of the tree contract.
pub const ADDRESS_ADDED_SIGNATURE: &str = "AddressAdded(address,address)";

/// Gas limit of internal system calls.
pub const SYSTEM_CALL_GAS: u64 = u64::MAX / 2;

/// An internal, fee-free message call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallMsg {
    /// Caller.
    pub from: Address,
    /// Callee.
    pub to: Address,
    /// Native value.
    pub value: U256,
    /// Gas limit.
    pub gas: u64,
    /// Call data.
    pub data: Vec<u8>,
}

/// Executes internal calls against the ledger.
pub trait SystemCaller<S> {
    /// Apply `msg` to `state` in the context of `header` and return the emitted logs.
    fn call(&mut self, state: &mut S, header: &Header, msg: CallMsg) -> Result<Vec<Log>, BoxError>;
}

/// Tree stored in the local ledger.
#[derive(Debug)]
pub struct AuthoritativeTree<C> {
    contract: Address,
    caller: C,
}

impl<C> AuthoritativeTree<C> {
    /// Create a tree backed by the contract at `contract`.
    pub fn new(contract: Address, caller: C) -> Self {
        Self { contract, caller }
    }

    /// Address of the tree contract.
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Get the system caller.
    pub fn caller(&self) -> &C {
        &self.caller
    }
}

/// ABI-encode a `makeRelation(parent, child)` call.
pub fn encode_make_relation(parent: &Address, child: &Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&selector(MAKE_RELATION_SIGNATURE));
    data.extend_from_slice(parent.into_word().as_bytes());
    data.extend_from_slice(child.into_word().as_bytes());
    data
}

impl<S, C> AddressTree<S> for AuthoritativeTree<C>
where
    S: StateDb,
    C: SystemCaller<S>,
{
    fn parent_of(&mut self, state: &S, account: &Address) -> crate::Result<Address> {
        Ok(state.get_address(&self.contract, &parent_slot(account)))
    }

    fn depth_of(&mut self, state: &S, account: &Address) -> crate::Result<U256> {
        Ok(state.get_u256(&self.contract, &depth_slot(account)))
    }

    fn children_of(&mut self, state: &S, parent: &Address) -> crate::Result<Vec<Address>> {
        let raw = state.get_raw_state(&self.contract, &children_slot(parent));
        Ok(raw
            .chunks_exact(ADDRESS_LENGTH)
            .map(Address::from_slice_lossy)
            .collect())
    }

    fn append_child(
        &mut self,
        state: &mut S,
        parent: &Address,
        child: &Address,
    ) -> crate::Result<()> {
        let slot = children_slot(parent);
        let mut raw = state.get_raw_state(&self.contract, &slot);
        raw.extend_from_slice(child.as_bytes());
        state.set_raw_state(&self.contract, &slot, raw);
        Ok(())
    }

    fn make_relation(
        &mut self,
        state: &mut S,
        header: &Header,
        parent: &Address,
        child: &Address,
    ) -> crate::Result<()> {
        let msg = CallMsg {
            from: header.coinbase,
            to: self.contract,
            value: U256::ZERO,
            gas: SYSTEM_CALL_GAS,
            data: encode_make_relation(parent, child),
        };
        let logs = self
            .caller
            .call(state, header, msg)
            .map_err(Error::RelationCall)?;
        tracing::debug!(%parent, %child, logs = logs.len(), "relation recorded");
        Ok(())
    }

    fn is_import_transaction(&self, tx: &Transaction) -> bool {
        tx.to == Some(self.contract)
            && tx.input.starts_with(&selector(IMPORT_RELATION_SIGNATURE))
    }

    fn is_address_added_log(&self, log: &Log) -> Option<(Address, Address)> {
        if log.address != self.contract || !log.is_event(&event_topic(ADDRESS_ADDED_SIGNATURE)) {
            return None;
        }
        match log.topics.as_slice() {
            [_, parent, child, ..] => Some((parent.to_address(), child.to_address())),
            _ => None,
        }
    }

    fn is_mirrored(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use treefarm_utils::B256;

    use super::*;
    use crate::test::{MemoryState, RecordingCaller};

    fn address(byte: u8) -> Address {
        Address([byte; 20])
    }

    #[test]
    fn reads_and_appends_in_place() -> crate::Result<()> {
        let contract = address(0xaa);
        let mut state = MemoryState::default();
        let mut tree = AuthoritativeTree::new(contract, RecordingCaller::default());
        let (root, a, b) = (address(1), address(2), address(3));
        state.relate(&contract, &root, &a, 1);

        assert_eq!(tree.parent_of(&state, &a)?, root);
        assert_eq!(tree.depth_of(&state, &a)?, U256::from(1u64));
        assert_eq!(tree.depth_of(&state, &b)?, U256::ZERO);

        tree.append_child(&mut state, &root, &b)?;
        assert_eq!(tree.children_of(&state, &root)?, vec![a, b]);
        Ok(())
    }

    #[test]
    fn make_relation_calls_from_coinbase() -> crate::Result<()> {
        let contract = address(0xaa);
        let mut state = MemoryState::default();
        let mut tree = AuthoritativeTree::new(contract, RecordingCaller::default());
        let header = Header::builder().number(7).coinbase(address(0xcb)).build();
        tree.make_relation(&mut state, &header, &address(1), &address(2))?;

        let calls = tree.caller().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from, address(0xcb));
        assert_eq!(calls[0].to, contract);
        assert_eq!(calls[0].value, U256::ZERO);
        assert_eq!(calls[0].data.len(), 68);
        assert_eq!(&calls[0].data[..4], &selector(MAKE_RELATION_SIGNATURE));
        assert_eq!(&calls[0].data[48..68], address(2).as_bytes());
        Ok(())
    }

    #[test]
    fn failed_relation_call() {
        let contract = address(0xaa);
        let mut state = MemoryState::default();
        let mut tree = AuthoritativeTree::new(contract, RecordingCaller::failing("reverted"));
        let header = Header::builder().number(7).build();
        let err = tree
            .make_relation(&mut state, &header, &address(1), &address(2))
            .unwrap_err();
        assert!(matches!(err, Error::RelationCall(_)));
    }

    #[test]
    fn import_detection() {
        let contract = address(0xaa);
        let tree = AuthoritativeTree::new(contract, RecordingCaller::default());
        let mut input = selector(IMPORT_RELATION_SIGNATURE).to_vec();
        input.extend_from_slice(&[0; 64]);
        let import = Transaction::builder()
            .sender(address(1))
            .to(contract)
            .input(input.clone())
            .build();
        assert!(AddressTree::<MemoryState>::is_import_transaction(&tree, &import));

        let elsewhere = Transaction::builder()
            .sender(address(1))
            .to(address(0xbb))
            .input(input)
            .build();
        assert!(!AddressTree::<MemoryState>::is_import_transaction(&tree, &elsewhere));

        let log = Log::builder()
            .address(contract)
            .topics(vec![
                event_topic(ADDRESS_ADDED_SIGNATURE),
                address(1).into_word(),
                address(2).into_word(),
            ])
            .build();
        assert_eq!(
            AddressTree::<MemoryState>::is_address_added_log(&tree, &log),
            Some((address(1), address(2)))
        );
        let truncated = Log::builder()
            .address(contract)
            .topics(vec![event_topic(ADDRESS_ADDED_SIGNATURE), B256::ZERO])
            .build();
        assert_eq!(
            AddressTree::<MemoryState>::is_address_added_log(&tree, &truncated),
            None
        );
    }
}
