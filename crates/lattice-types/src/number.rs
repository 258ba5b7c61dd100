//! Block numbers.

use primitive_types::U256;
use sbor::prelude::*;
use std::fmt;

/// A non-negative block number, up to 256 bits wide.
///
/// Stored (and wire-encoded) as the minimal big-endian byte string: zero is
/// the empty string, and no representation carries leading zero bytes. Two
/// numbers are equal iff their byte strings are equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, BasicSbor)]
#[sbor(transparent)]
pub struct BlockNumber(Vec<u8>);

impl BlockNumber {
    /// The genesis block number.
    pub const ZERO: Self = Self(Vec::new());

    /// Build from a 256-bit value.
    pub fn from_u256(value: U256) -> Self {
        let mut buf = [0u8; 32];
        value.to_big_endian(&mut buf);
        let first = buf.iter().position(|&b| b != 0).unwrap_or(32);
        Self(buf[first..].to_vec())
    }

    /// Interpret as a 256-bit value.
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }

    /// Minimal big-endian bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Rebuild from big-endian bytes; leading zeros are stripped.
    ///
    /// Returns `None` if the input is wider than 256 bits after stripping.
    pub fn from_be_bytes(bytes: &[u8]) -> Option<Self> {
        let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
        let minimal = &bytes[first..];
        if minimal.len() > 32 {
            return None;
        }
        Some(Self(minimal.to_vec()))
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self::from_u256(U256::from(value))
    }
}

impl fmt::Debug for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockNumber({})", self.to_u256())
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u256())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_empty_bytes() {
        assert_eq!(BlockNumber::ZERO.as_bytes(), &[] as &[u8]);
        assert_eq!(BlockNumber::from(0u64), BlockNumber::ZERO);
    }

    #[test]
    fn test_u64_roundtrip() {
        let n = BlockNumber::from(123_456_789u64);
        assert_eq!(n.to_u256(), U256::from(123_456_789u64));
    }

    #[test]
    fn test_leading_zeros_stripped() {
        let a = BlockNumber::from_be_bytes(&[0, 0, 1, 2]).unwrap();
        let b = BlockNumber::from_be_bytes(&[1, 2]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_bytes(), &[1, 2]);
    }

    #[test]
    fn test_overwide_rejected() {
        let wide = vec![1u8; 33];
        assert!(BlockNumber::from_be_bytes(&wide).is_none());
        // 33 bytes of which the first is zero still fits
        let mut padded = vec![0u8];
        padded.extend_from_slice(&[1u8; 32]);
        assert!(BlockNumber::from_be_bytes(&padded).is_some());
    }

    #[test]
    fn test_ordering_matches_numeric_ordering_at_equal_width() {
        let a = BlockNumber::from(41u64);
        let b = BlockNumber::from(42u64);
        assert!(a.to_u256() < b.to_u256());
        assert_ne!(a, b);
    }
}
