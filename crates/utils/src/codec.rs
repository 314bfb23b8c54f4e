//! Fixed-width big-endian records packed into a single raw storage value.

use std::{fmt, marker::PhantomData};

use ruint::aliases::U256;

/// Max value of a 24-bit field.
pub const U24_MAX: u32 = (1 << 24) - 1;

/// Codec errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not fit in its field.
    #[error("value does not fit in a {0}-byte field")]
    Overflow(usize),
}

/// Read a big-endian unsigned integer of at most 32 bytes.
pub fn read_be(bytes: &[u8]) -> U256 {
    debug_assert!(bytes.len() <= 32);
    U256::try_from_be_slice(bytes).unwrap_or_default()
}

/// Write `value` into `out` as a big-endian integer of exactly `out.len()` bytes.
pub fn write_be(value: &U256, out: &mut [u8]) -> Result<(), CodecError> {
    let width = out.len();
    let full = value.to_be_bytes::<32>();
    let (high, low) = full.split_at(32 - width);
    if high.iter().any(|b| *b != 0) {
        return Err(CodecError::Overflow(width));
    }
    out.copy_from_slice(low);
    Ok(())
}

/// A fixed-width record.
pub trait Record: Sized + Default {
    /// Width of one record in bytes.
    const STRIDE: usize;

    /// Decode from exactly [`STRIDE`](Record::STRIDE) bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// Encode into exactly [`STRIDE`](Record::STRIDE) bytes.
    fn encode(&self, out: &mut [u8]) -> Result<(), CodecError>;
}

/// Occupancy of one balance range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RangeInfo {
    /// Number of holders whose balance maps to this range.
    pub total_count: u32,
    /// Number of empty ranges below this one, as of the last sort. Stored as 24 bits.
    pub empty_range_count: u32,
}

impl Record for RangeInfo {
    const STRIDE: usize = 7;

    fn decode(bytes: &[u8]) -> Self {
        let mut count = [0; 4];
        count.copy_from_slice(&bytes[0..4]);
        let mut empty = [0; 4];
        empty[1..].copy_from_slice(&bytes[4..7]);
        Self {
            total_count: u32::from_be_bytes(count),
            empty_range_count: u32::from_be_bytes(empty),
        }
    }

    fn encode(&self, out: &mut [u8]) -> Result<(), CodecError> {
        if self.empty_range_count > U24_MAX {
            return Err(CodecError::Overflow(3));
        }
        out[0..4].copy_from_slice(&self.total_count.to_be_bytes());
        out[4..7].copy_from_slice(&self.empty_range_count.to_be_bytes()[1..]);
        Ok(())
    }
}

/// Accumulated reward per share of one range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewardPerShare(pub U256);

impl Record for RewardPerShare {
    const STRIDE: usize = 24;

    fn decode(bytes: &[u8]) -> Self {
        Self(read_be(bytes))
    }

    fn encode(&self, out: &mut [u8]) -> Result<(), CodecError> {
        write_be(&self.0, out)
    }
}

/// Tracked balance of one child.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HoldAmount(pub U256);

impl Record for HoldAmount {
    const STRIDE: usize = 16;

    fn decode(bytes: &[u8]) -> Self {
        Self(read_be(bytes))
    }

    fn encode(&self, out: &mut [u8]) -> Result<(), CodecError> {
        write_be(&self.0, out)
    }
}

/// A contiguous buffer of records indexed by position.
///
/// Positions past the end of the buffer read as the zero record.
#[derive(Clone, PartialEq, Eq)]
pub struct Packed<R> {
    raw: Vec<u8>,
    marker: PhantomData<R>,
}

impl<R: Record> Packed<R> {
    /// Wrap a raw buffer.
    pub fn from_raw(raw: Vec<u8>) -> Self {
        Self {
            raw,
            marker: PhantomData,
        }
    }

    /// Create a zero-filled buffer of `len` records.
    pub fn zeroed(len: usize) -> Self {
        Self::from_raw(vec![0; len * R::STRIDE])
    }

    /// Number of whole records in the buffer.
    pub fn len(&self) -> usize {
        self.raw.len() / R::STRIDE
    }

    /// Returns whether the buffer holds no whole record.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-extend the buffer to hold at least `len` records. Never truncates.
    pub fn ensure_len(&mut self, len: usize) {
        let required = len * R::STRIDE;
        if self.raw.len() < required {
            self.raw.resize(required, 0);
        }
    }

    /// Get the record at `index`.
    pub fn get(&self, index: usize) -> R {
        let start = index * R::STRIDE;
        match self.raw.get(start..start + R::STRIDE) {
            Some(bytes) => R::decode(bytes),
            None => R::default(),
        }
    }

    /// Set the record at `index`, zero-extending the buffer if needed.
    pub fn set(&mut self, index: usize, record: &R) -> Result<(), CodecError> {
        self.ensure_len(index + 1);
        let start = index * R::STRIDE;
        record.encode(&mut self.raw[start..start + R::STRIDE])
    }

    /// Iterate over all whole records.
    pub fn iter(&self) -> impl Iterator<Item = R> + '_ {
        self.raw.chunks_exact(R::STRIDE).map(R::decode)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Convert into the raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}

impl<R: Record> Default for Packed<R> {
    fn default() -> Self {
        Self::from_raw(Vec::new())
    }
}

impl<R: Record + fmt::Debug> fmt::Debug for Packed<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
