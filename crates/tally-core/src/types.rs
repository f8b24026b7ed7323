//! Core value types: digests and entry-feed tuples.
//!
//! Every identity in the system (chains, entries, persisted nodes) is a
//! 32-byte SHA-256 digest. Ordering over digests is unsigned byte-lexicographic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseHashError;

/// A 32-byte digest.
///
/// Used for chain IDs, entry hashes, Merkle roots, and node content hashes.
/// The derived `Ord` gives unsigned byte-lexicographic ordering, which is the
/// canonical ordering for chains within a directory block.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero digest. Stands in for "no previous node" and the root of an
    /// empty Merkle DAG.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash256 {
    type Err = ParseHashError;

    /// Parse a 64-character lowercase or uppercase hex string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(ParseHashError::BadLength(s.len()));
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0])?;
            let lo = hex_val(chunk[1])?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_val(c: u8) -> Result<u8, ParseHashError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(ParseHashError::BadCharacter(c as char)),
    }
}

/// One tuple on the entry feed: an entry hash routed to a chain.
///
/// The validator upstream has already authenticated the payload; only the
/// digest travels here. `chain_id` is the routing key, `entry_hash` becomes
/// a leaf in that chain's Merkle DAG for the current block.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryHash {
    /// Chain the entry belongs to.
    pub chain_id: Hash256,
    /// Digest of the entry payload.
    pub entry_hash: Hash256,
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Hash256 basics ---

    #[test]
    fn zero_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert_eq!(Hash256::ZERO, Hash256::default());
    }

    #[test]
    fn nonzero_is_not_zero() {
        assert!(!Hash256([1; 32]).is_zero());
    }

    #[test]
    fn display_hex() {
        let h = Hash256([0xAB; 32]);
        let s = format!("{h}");
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(&s[0..2], "ab");
    }

    #[test]
    fn from_bytes_round_trip() {
        let bytes = [42u8; 32];
        let h = Hash256::from_bytes(bytes);
        assert_eq!(h.as_bytes(), &bytes);
        assert_eq!(Hash256::from(bytes), h);
    }

    // --- Ordering ---

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = Hash256([0x01; 32]);
        let b = Hash256([0x02; 32]);
        assert!(a < b);

        // First differing byte decides, regardless of the rest.
        let mut lo = [0xFF; 32];
        lo[0] = 0x00;
        let mut hi = [0x00; 32];
        hi[0] = 0x01;
        assert!(Hash256(lo) < Hash256(hi));
    }

    // --- FromStr ---

    #[test]
    fn parse_display_round_trip() {
        let h = Hash256([0xC4; 32]);
        let parsed: Hash256 = format!("{h}").parse().unwrap();
        assert_eq!(parsed, h);
    }

    #[test]
    fn parse_accepts_uppercase() {
        let s = "AB".repeat(32);
        let h: Hash256 = s.parse().unwrap();
        assert_eq!(h, Hash256([0xAB; 32]));
    }

    #[test]
    fn parse_rejects_bad_length() {
        assert!(matches!(
            "abcd".parse::<Hash256>(),
            Err(ParseHashError::BadLength(4))
        ));
    }

    #[test]
    fn parse_rejects_bad_character() {
        let s = "zz".repeat(32);
        assert!(matches!(
            s.parse::<Hash256>(),
            Err(ParseHashError::BadCharacter('z'))
        ));
    }
}
