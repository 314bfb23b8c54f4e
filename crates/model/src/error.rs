use treefarm_utils::CodecError;

/// Boxed error returned by external collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote read failed.
    #[error("remote fetch: {0}")]
    RemoteFetch(#[source] crate::tree::RemoteError),
    /// Cache write failed.
    #[error("cache write: {0}")]
    CacheWrite(#[source] BoxError),
    /// Cache read failed.
    #[error("cache read: {0}")]
    CacheRead(#[source] BoxError),
    /// Atomic batch commit failed.
    #[error("batch commit: {0}")]
    BatchCommit(#[source] BoxError),
    /// Authoritative-only operation invoked on a mirrored tree.
    #[error("address tree is read-only in mirrored mode")]
    ReadOnlyMode,
    /// The internal relation call failed.
    #[error("relation call failed: {0}")]
    RelationCall(#[source] BoxError),
    /// External balance query failed.
    #[error("balance query: {0}")]
    BalanceQuery(#[source] BoxError),
    /// Packed record does not fit its field.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Overflow.
    #[error("overflow")]
    Overflow,
    /// The mirrored tree version must be positive.
    #[error("invalid tree version: {0}")]
    InvalidTreeVersion(u64),
}
