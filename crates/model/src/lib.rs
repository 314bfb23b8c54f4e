#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Reward distribution ledger and address tree of the farm.

/// Ledger access.
pub mod state;

/// Block data consumed by the farm.
pub mod block;

/// Farm contract views.
pub mod farm;

/// Address tree.
pub mod tree;

/// Holder distribution.
pub mod distribution;

/// Community power.
pub mod achievement;

/// Contract views over the packed ledger.
pub mod views;

/// Error type.
pub mod error;


pub use achievement::{community_power, Achievement};
pub use block::{Header, Log, Receipt, Transaction};
pub use distribution::{Ledger, PoolDistribution};
pub use error::Error;
pub use farm::{FarmContract, PoolInfo, RewardInfo, UserInfo};
pub use state::{BalanceSource, StateDb, StateDbExt};
pub use tree::{AddressTree, AuthoritativeTree, MirroredTree};
pub use views::{FarmCall, TreeCall, Views};

/// Alias for result.
pub type Result<T> = std::result::Result<T, Error>;
