use crate::config::ConfigError;

/// Node Error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Model Error.
    #[error("model: {0}")]
    Model(#[from] treefarm_model::Error),
    /// A receipt refers to a transaction missing from the block.
    #[error("missing transaction at index {0}")]
    MissingTransaction(usize),
    /// A log of a known event could not be decoded.
    #[error("malformed {0} log")]
    MalformedLog(&'static str),
    /// The tree does not run in the configured mode.
    #[error("tree mode mismatch, configured mirrored={configured}")]
    TreeModeMismatch {
        /// Whether the configuration asks for a mirrored tree.
        configured: bool,
    },
    /// Config Error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}
