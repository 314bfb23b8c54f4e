use std::{fmt, str::FromStr};

use ruint::aliases::U256;

/// Length of an account address in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a storage word in bytes.
pub const WORD_LENGTH: usize = 32;

/// A 20-byte account address.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// The null address.
    pub const ZERO: Self = Self([0; ADDRESS_LENGTH]);

    /// The conventional burn address `0x...dead`.
    pub const BURN: Self = {
        let mut bytes = [0; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - 2] = 0xde;
        bytes[ADDRESS_LENGTH - 1] = 0xad;
        Self(bytes)
    };

    /// Create from the trailing bytes of `bytes`, left-padding short input with zeros.
    pub fn from_slice_lossy(bytes: &[u8]) -> Self {
        let mut out = [0; ADDRESS_LENGTH];
        if bytes.len() >= ADDRESS_LENGTH {
            out.copy_from_slice(&bytes[bytes.len() - ADDRESS_LENGTH..]);
        } else {
            out[ADDRESS_LENGTH - bytes.len()..].copy_from_slice(bytes);
        }
        Self(out)
    }

    /// Returns whether this is the null address.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Returns whether this is the null or the burn address.
    pub fn is_sentinel(&self) -> bool {
        self.is_zero() || *self == Self::BURN
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert into a left-padded storage word.
    pub fn into_word(self) -> B256 {
        B256::left_padded(&self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        if bytes.len() != ADDRESS_LENGTH {
            return Err(ParseError::InvalidLength {
                expected: ADDRESS_LENGTH,
                found: bytes.len(),
            });
        }
        Ok(Self::from_slice_lossy(&bytes))
    }
}

impl From<[u8; ADDRESS_LENGTH]> for Address {
    fn from(value: [u8; ADDRESS_LENGTH]) -> Self {
        Self(value)
    }
}

/// A 32-byte storage word or hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct B256(pub [u8; WORD_LENGTH]);

impl B256 {
    /// The zero word.
    pub const ZERO: Self = Self([0; WORD_LENGTH]);

    /// Create a word by left-padding `bytes` with zeros.
    ///
    /// Input longer than a word keeps its trailing 32 bytes.
    pub fn left_padded(bytes: &[u8]) -> Self {
        let mut out = [0; WORD_LENGTH];
        if bytes.len() >= WORD_LENGTH {
            out.copy_from_slice(&bytes[bytes.len() - WORD_LENGTH..]);
        } else {
            out[WORD_LENGTH - bytes.len()..].copy_from_slice(bytes);
        }
        Self(out)
    }

    /// Create from a small integer.
    pub fn from_u64(value: u64) -> Self {
        Self::from(U256::from(value))
    }

    /// Returns whether the word is all zeros.
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Interpret the trailing 20 bytes as an address.
    pub fn to_address(&self) -> Address {
        Address::from_slice_lossy(&self.0)
    }

    /// Interpret as a big-endian unsigned integer.
    pub fn to_u256(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<U256> for B256 {
    fn from(value: U256) -> Self {
        Self(value.to_be_bytes::<WORD_LENGTH>())
    }
}

impl From<B256> for U256 {
    fn from(value: B256) -> Self {
        value.to_u256()
    }
}

impl From<[u8; WORD_LENGTH]> for B256 {
    fn from(value: [u8; WORD_LENGTH]) -> Self {
        Self(value)
    }
}

impl fmt::Debug for B256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for B256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for B256 {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = decode_hex(s)?;
        if bytes.len() > WORD_LENGTH {
            return Err(ParseError::InvalidLength {
                expected: WORD_LENGTH,
                found: bytes.len(),
            });
        }
        Ok(Self::left_padded(&bytes))
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>, ParseError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() % 2 == 1 {
        Ok(hex::decode(format!("0{s}"))?)
    } else {
        Ok(hex::decode(s)?)
    }
}

/// Errors when parsing primitives from strings.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// Invalid length.
    #[error("invalid length, expected={expected}, found={found}")]
    InvalidLength {
        /// Expected length.
        expected: usize,
        /// Found length.
        found: usize,
    },
}

#[cfg(feature = "serde")]
mod serde_impls {
    use serde::{de::Error, Deserialize, Deserializer, Serialize, Serializer};

    use super::{Address, B256};

    impl Serialize for Address {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        }
    }

    impl Serialize for B256 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for B256 {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(D::Error::custom)
        }
    }
}
