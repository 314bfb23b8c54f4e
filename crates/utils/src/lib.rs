#![deny(missing_docs)]
#![deny(unreachable_pub)]

//! Primitives, storage addressing and packed codecs shared by the farm crates.

/// Address and word types.
pub mod primitives;

/// Storage slot addressing.
pub mod slot;

/// Packed fixed-width record codecs.
pub mod codec;

pub use codec::{CodecError, HoldAmount, Packed, RangeInfo, Record, RewardPerShare};
pub use primitives::{Address, ParseError, B256};
pub use ruint::aliases::U256;
