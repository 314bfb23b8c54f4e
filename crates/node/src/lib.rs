#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Per-block entry point of the farm state core.

/// Configuration.
pub mod config;

/// Farm events.
pub mod events;

/// Block handler.
pub mod farm;

/// Error type.
pub mod error;

pub use config::{ConfigError, FarmConfig, TreeMode};
pub use error::Error;
pub use farm::Farm;

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;
