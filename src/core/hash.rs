//! # Hashes, Keys, and Signatures
//!
//! Fixed-size byte newtypes shared across the transaction and Levin codecs,
//! and the single hashing chokepoint for the crate.
//!
//! The CryptoNote content hash (`cn_fast_hash`) is Keccak-256 — the original
//! Keccak submission, not NIST SHA3-256. No other cryptography lives in this
//! crate; signing and key derivation belong to the consumers.

use crate::error::{Result, WireError};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tiny_keccak::{Hasher as _, Keccak};

/// Size in bytes of hashes, public keys, key images, and merkle roots.
pub const HASH_SIZE: usize = 32;

/// Size in bytes of a ring signature element.
pub const SIGNATURE_SIZE: usize = 64;

/// Appended to a first-pass hash before re-hashing, for transactions of
/// version 2 and above. 65 bytes; never part of the serialized transaction.
pub const TX_V2_HASH_SUFFIX: [u8; 65] = [
    0xbc, 0x36, 0x78, 0x9e, 0x7a, 0x1e, 0x28, 0x14, 0x36, 0x46, 0x42, 0x29, 0x82, 0x8f, 0x81,
    0x7d, 0x66, 0x12, 0xf7, 0xb4, 0x77, 0xd6, 0x65, 0x91, 0xff, 0x96, 0xa9, 0xe0, 0x64, 0xbc,
    0xc9, 0x8a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00,
];

/// A 32-byte value: content hash, one-time key, key image, or merkle root.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl Hash {
    /// The all-zero hash.
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Builds a hash from a slice, failing unless it is exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; HASH_SIZE] = bytes
            .try_into()
            .map_err(|_| WireError::malformed("32-byte hash"))?;
        Ok(Hash(arr))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        Hash::from_slice(&bytes).map_err(D::Error::custom)
    }
}

/// A 64-byte ring signature element.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Builds a signature from a slice, failing unless it is exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|_| WireError::malformed("64-byte signature"))?;
        Ok(Signature(arr))
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(self.0))
    }
}

/// Keccak-256 over `data` (`cn_fast_hash`).
pub fn fast_hash(data: &[u8]) -> Hash {
    let mut keccak = Keccak::v256();
    keccak.update(data);
    let mut out = [0u8; HASH_SIZE];
    keccak.finalize(&mut out);
    Hash(out)
}

/// The published content hash for a blob of the given format version:
/// single-pass Keccak-256 for version 1, `H(H(blob) || SUFFIX)` from
/// version 2 onward.
pub fn content_hash(blob: &[u8], version: u64) -> Hash {
    let first = fast_hash(blob);
    if version >= 2 {
        let mut second = [0u8; HASH_SIZE + TX_V2_HASH_SUFFIX.len()];
        second[..HASH_SIZE].copy_from_slice(&first.0);
        second[HASH_SIZE..].copy_from_slice(&TX_V2_HASH_SUFFIX);
        fast_hash(&second)
    } else {
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_hash_matches_keccak_empty_string() {
        // Keccak-256(""), distinct from SHA3-256("").
        let expected = "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470";
        assert_eq!(fast_hash(b"").to_string(), expected);
    }

    #[test]
    fn v2_suffix_is_65_bytes_with_zero_tail() {
        assert_eq!(TX_V2_HASH_SUFFIX.len(), 65);
        assert!(TX_V2_HASH_SUFFIX[32..].iter().all(|&b| b == 0));
    }

    #[test]
    fn content_hash_version_gate() {
        let blob = b"some transaction bytes";
        assert_eq!(content_hash(blob, 1), fast_hash(blob));
        assert_ne!(content_hash(blob, 2), fast_hash(blob));

        let first = fast_hash(blob);
        let mut second = first.0.to_vec();
        second.extend_from_slice(&TX_V2_HASH_SUFFIX);
        assert_eq!(content_hash(blob, 2), fast_hash(&second));
    }

    #[test]
    fn hash_hex_display_roundtrip() {
        let hash = fast_hash(b"abc");
        let parsed = Hash::from_slice(&hex::decode(hash.to_string()).expect("hex")).expect("hash");
        assert_eq!(hash, parsed);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(Hash::from_slice(&[0u8; 31]).is_err());
        assert!(Signature::from_slice(&[0u8; 65]).is_err());
    }
}
