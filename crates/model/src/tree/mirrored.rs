use std::{collections::HashMap, time::Duration};

use treefarm_utils::{
    primitives::ADDRESS_LENGTH,
    slot::{cache_key, children_slot, depth_slot, parent_slot, version_slot},
    Address, B256, U256,
};

use crate::{
    block::{Header, Log, Transaction},
    error::BoxError,
    state::StateDb,
    Error,
};

use super::AddressTree;

/// Remote read errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The caller-supplied deadline was exceeded.
    #[error("deadline exceeded")]
    Timeout,
    /// Transport failure.
    #[error("transport: {0}")]
    Transport(String),
}

/// Default deadline of a single remote read.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read access to the storage of the source chain at its current head.
///
/// A read not answered within `timeout` must fail with [`RemoteError::Timeout`].
pub trait RemoteState {
    /// Read the word at `slot` of `contract`.
    fn storage_at(
        &self,
        contract: &Address,
        slot: &B256,
        timeout: Duration,
    ) -> Result<B256, RemoteError>;

    /// Read the raw byte value at `slot` of `contract`.
    fn raw_storage_at(
        &self,
        contract: &Address,
        slot: &B256,
        timeout: Duration,
    ) -> Result<Vec<u8>, RemoteError>;
}

/// Key-value writes committed atomically.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBatch {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl WriteBatch {
    /// Queue a write.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.push((key, value));
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no write is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for WriteBatch {
    type Item = (Vec<u8>, Vec<u8>);

    type IntoIter = std::vec::IntoIter<(Vec<u8>, Vec<u8>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Local key-value cache database.
pub trait CacheDb {
    /// Get the value of `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, BoxError>;

    /// Put a single value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), BoxError>;

    /// Commit all writes of `batch` or none of them.
    fn write_batch(&self, batch: WriteBatch) -> Result<(), BoxError>;
}

/// A node confirmed in the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedNode {
    /// Parent, never null.
    pub parent: Address,
    /// Depth.
    pub depth: U256,
    /// Source version the node was confirmed at.
    pub version: u64,
}

/// Tree mirrored from a remote source chain.
///
/// A node is cached the first time it is referenced, provided it is connected
/// and was confirmed at a version below the local tree version. Cached nodes
/// are never rewritten.
#[derive(Debug)]
pub struct MirroredTree<R, D> {
    contract: Address,
    remote: R,
    cache: D,
    tree_version: u64,
    remote_timeout: Duration,
    nodes: HashMap<Address, CachedNode>,
}

impl<R, D> MirroredTree<R, D>
where
    R: RemoteState,
    D: CacheDb,
{
    /// Create a mirrored tree of the remote contract at `contract`.
    pub fn new(contract: Address, remote: R, cache: D, tree_version: u64) -> crate::Result<Self> {
        if tree_version == 0 {
            return Err(Error::InvalidTreeVersion(tree_version));
        }
        Ok(Self {
            contract,
            remote,
            cache,
            tree_version,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            nodes: HashMap::default(),
        })
    }

    /// Set the deadline of a single remote read.
    pub fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Local tree version.
    pub fn tree_version(&self) -> u64 {
        self.tree_version
    }

    /// Deadline of a single remote read.
    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    /// Get the cache database.
    pub fn cache(&self) -> &D {
        &self.cache
    }

    /// Get the remote source.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Get the confirmed node of `account`, if any.
    pub fn cached_node(&mut self, account: &Address) -> crate::Result<Option<CachedNode>> {
        if let Some(node) = self.nodes.get(account) {
            return Ok(Some(*node));
        }
        let parent = match self.cache_word(&parent_slot(account))? {
            Some(word) if !word.to_address().is_zero() => word.to_address(),
            _ => return Ok(None),
        };
        let depth = self
            .cache_word(&depth_slot(account))?
            .unwrap_or_default()
            .to_u256();
        let version = self
            .cache_word(&version_slot(account))?
            .unwrap_or_default()
            .to_u256()
            .saturating_to();
        let node = CachedNode {
            parent,
            depth,
            version,
        };
        self.nodes.insert(*account, node);
        Ok(Some(node))
    }

    /// Children list of `parent` last written to the cache.
    pub fn cached_children(&self, parent: &Address) -> crate::Result<Vec<Address>> {
        let raw = self
            .cache
            .get(&cache_key(&self.contract, &children_slot(parent)))
            .map_err(Error::CacheRead)?
            .unwrap_or_default();
        Ok(raw
            .chunks_exact(ADDRESS_LENGTH)
            .map(Address::from_slice_lossy)
            .collect())
    }

    /// Cache the node of `account` if it is not cached yet and the remote
    /// source has a connected node for it below the local version.
    pub fn try_cache_account_node(&mut self, account: &Address) -> crate::Result<()> {
        if self.cached_node(account)?.is_some() {
            return Ok(());
        }

        let (version, parent, depth) = match self.fetch_node(account) {
            Ok(words) => words,
            Err(RemoteError::Timeout) => {
                tracing::warn!(%account, "remote read timed out, node left uncached");
                return Ok(());
            }
            Err(err) => return Err(Error::RemoteFetch(err)),
        };

        let remote_version = version.to_u256();
        let connected = !depth.is_zero() && !parent.to_address().is_zero();
        let confirmed = if !connected {
            None
        } else if remote_version.is_zero() {
            Some(self.tree_version.saturating_sub(1))
        } else if remote_version < U256::from(self.tree_version) {
            Some(remote_version.saturating_to::<u64>())
        } else {
            None
        };
        let Some(confirmed) = confirmed else {
            tracing::trace!(%account, %remote_version, "remote node not cacheable");
            return Ok(());
        };

        let mut batch = WriteBatch::default();
        batch.put(
            self.key(&version_slot(account)),
            B256::from_u64(confirmed).as_bytes().to_vec(),
        );
        batch.put(self.key(&parent_slot(account)), parent.as_bytes().to_vec());
        batch.put(self.key(&depth_slot(account)), depth.as_bytes().to_vec());
        self.cache
            .write_batch(batch)
            .map_err(Error::BatchCommit)?;

        let node = CachedNode {
            parent: parent.to_address(),
            depth: depth.to_u256(),
            version: confirmed,
        };
        tracing::debug!(%account, parent = %node.parent, version = confirmed, "cached remote node");
        self.nodes.insert(*account, node);
        Ok(())
    }

    fn fetch_node(&self, account: &Address) -> Result<(B256, B256, B256), RemoteError> {
        let read = |slot| self.remote.storage_at(&self.contract, &slot, self.remote_timeout);
        let version = read(version_slot(account))?;
        let parent = read(parent_slot(account))?;
        let depth = read(depth_slot(account))?;
        Ok((version, parent, depth))
    }

    fn key(&self, slot: &B256) -> Vec<u8> {
        cache_key(&self.contract, slot)
    }

    fn cache_word(&self, slot: &B256) -> crate::Result<Option<B256>> {
        let value = self.cache.get(&self.key(slot)).map_err(Error::CacheRead)?;
        Ok(value.map(|bytes| B256::left_padded(&bytes)))
    }
}

impl<S, R, D> AddressTree<S> for MirroredTree<R, D>
where
    S: StateDb,
    R: RemoteState,
    D: CacheDb,
{
    fn parent_of(&mut self, _state: &S, account: &Address) -> crate::Result<Address> {
        self.try_cache_account_node(account)?;
        Ok(self
            .cached_node(account)?
            .map(|node| node.parent)
            .unwrap_or_default())
    }

    fn depth_of(&mut self, _state: &S, account: &Address) -> crate::Result<U256> {
        self.try_cache_account_node(account)?;
        Ok(self
            .cached_node(account)?
            .map(|node| node.depth)
            .unwrap_or_default())
    }

    fn children_of(&mut self, _state: &S, parent: &Address) -> crate::Result<Vec<Address>> {
        let raw = self
            .remote
            .raw_storage_at(&self.contract, &children_slot(parent), self.remote_timeout)
            .map_err(Error::RemoteFetch)?;

        let mut children = Vec::with_capacity(raw.len() / ADDRESS_LENGTH);
        for child in raw.chunks_exact(ADDRESS_LENGTH).map(Address::from_slice_lossy) {
            self.try_cache_account_node(&child)?;
            let backlink = self.cached_node(&child)?.map(|node| node.parent);
            if backlink != Some(*parent) {
                break;
            }
            children.push(child);
        }

        let packed = children
            .iter()
            .flat_map(|child| child.as_bytes().iter().copied())
            .collect::<Vec<_>>();
        self.cache
            .put(&self.key(&children_slot(parent)), &packed)
            .map_err(Error::CacheWrite)?;
        Ok(children)
    }

    fn append_child(
        &mut self,
        _state: &mut S,
        _parent: &Address,
        _child: &Address,
    ) -> crate::Result<()> {
        panic!("{}", Error::ReadOnlyMode)
    }

    fn make_relation(
        &mut self,
        _state: &mut S,
        _header: &Header,
        _parent: &Address,
        _child: &Address,
    ) -> crate::Result<()> {
        panic!("{}", Error::ReadOnlyMode)
    }

    fn is_import_transaction(&self, _tx: &Transaction) -> bool {
        panic!("{}", Error::ReadOnlyMode)
    }

    fn is_address_added_log(&self, _log: &Log) -> Option<(Address, Address)> {
        panic!("{}", Error::ReadOnlyMode)
    }

    fn is_mirrored(&self) -> bool {
        true
    }
}
