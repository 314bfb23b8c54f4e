use treefarm_utils::{Address, B256, U256};

/// Ledger account storage with snapshot and rollback.
pub trait StateDb {
    /// Read the word at `slot` of `contract`.
    fn get_state(&self, contract: &Address, slot: &B256) -> B256;

    /// Write the word at `slot` of `contract`.
    fn set_state(&mut self, contract: &Address, slot: &B256, value: B256);

    /// Read the raw byte value at `slot` of `contract`. Empty if never written.
    fn get_raw_state(&self, contract: &Address, slot: &B256) -> Vec<u8>;

    /// Write a raw byte value at `slot` of `contract`.
    fn set_raw_state(&mut self, contract: &Address, slot: &B256, value: Vec<u8>);

    /// Size of the code deployed at `account`.
    fn code_size(&self, account: &Address) -> usize;

    /// Take a snapshot and return its id.
    fn snapshot(&mut self) -> usize;

    /// Discard every mutation made after the snapshot `id` was taken.
    fn revert_to_snapshot(&mut self, id: usize);
}

/// Extension trait for [`StateDb`].
pub trait StateDbExt: StateDb {
    /// Read the word at `slot` as an integer.
    fn get_u256(&self, contract: &Address, slot: &B256) -> U256 {
        self.get_state(contract, slot).to_u256()
    }

    /// Write an integer word at `slot`.
    fn set_u256(&mut self, contract: &Address, slot: &B256, value: U256) {
        self.set_state(contract, slot, B256::from(value));
    }

    /// Read the word at `slot` as an address.
    fn get_address(&self, contract: &Address, slot: &B256) -> Address {
        self.get_state(contract, slot).to_address()
    }

    /// Returns whether `account` has code deployed.
    fn is_contract(&self, account: &Address) -> bool {
        self.code_size(account) > 0
    }
}

impl<S: StateDb + ?Sized> StateDbExt for S {}

/// Token balances of the ledger as of a given block.
pub trait BalanceSource {
    /// Balance of `account` in `token` as of the block `block_hash`.
    fn balance_of(
        &self,
        token: &Address,
        account: &Address,
        block_hash: &B256,
    ) -> Result<U256, crate::error::BoxError>;
}
