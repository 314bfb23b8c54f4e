use treefarm_utils::{Address, U256};

use crate::{
    block::{Header, Log, Transaction},
    state::StateDb,
};

/// Authoritative tree.
pub mod authoritative;

/// Mirrored tree.
pub mod mirrored;

pub use self::{
    authoritative::{AuthoritativeTree, CallMsg, SystemCaller},
    mirrored::{
        CacheDb, CachedNode, MirroredTree, RemoteError, RemoteState, WriteBatch,
        DEFAULT_REMOTE_TIMEOUT,
    },
};

/// Address relationship tree.
///
/// Tree reads take the ledger so that the authoritative implementation can
/// read contract storage directly. Mirrored implementations ignore it.
pub trait AddressTree<S: StateDb> {
    /// Parent of `account`, the null address if it has none.
    fn parent_of(&mut self, state: &S, account: &Address) -> crate::Result<Address>;

    /// Depth of `account`, zero if it is not in the tree.
    fn depth_of(&mut self, state: &S, account: &Address) -> crate::Result<U256>;

    /// Ordered direct children of `parent`.
    fn children_of(&mut self, state: &S, parent: &Address) -> crate::Result<Vec<Address>>;

    /// Append `child` to the children list of `parent`.
    ///
    /// # Panics
    /// Panics when the tree is read-only.
    fn append_child(&mut self, state: &mut S, parent: &Address, child: &Address)
        -> crate::Result<()>;

    /// Record the relation through the tree contract.
    ///
    /// # Panics
    /// Panics when the tree is read-only.
    fn make_relation(
        &mut self,
        state: &mut S,
        header: &Header,
        parent: &Address,
        child: &Address,
    ) -> crate::Result<()>;

    /// Returns whether `tx` imports relations into the tree.
    ///
    /// # Panics
    /// Panics when the tree is read-only.
    fn is_import_transaction(&self, tx: &Transaction) -> bool;

    /// Decode a relation-added log into `(parent, child)`.
    ///
    /// # Panics
    /// Panics when the tree is read-only.
    fn is_address_added_log(&self, log: &Log) -> Option<(Address, Address)>;

    /// Returns whether the tree mirrors a remote source.
    fn is_mirrored(&self) -> bool;
}
