//! Checksum utilities for fsnode
//!
//! Object headers carry a payload checksum and an optional homomorphic
//! hash. Payload records in the blob store are guarded by CRC32C.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Checksum algorithm
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChecksumKind {
    #[default]
    Sha256,
    TillichZemor,
}

/// Checksum carried in an object header
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    pub kind: ChecksumKind,
    pub sum: Vec<u8>,
}

impl Checksum {
    #[must_use]
    pub const fn new(kind: ChecksumKind, sum: Vec<u8>) -> Self {
        Self { kind, sum }
    }

    /// SHA-256 checksum of `data`
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        Self::new(ChecksumKind::Sha256, sha256(data).to_vec())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Verify `data` against this checksum
    ///
    /// Only SHA-256 sums can be checked locally; other kinds report `true`.
    #[must_use]
    pub fn verify(&self, data: &[u8]) -> bool {
        match self.kind {
            ChecksumKind::Sha256 => self.sum.as_slice() == sha256(data).as_slice(),
            ChecksumKind::TillichZemor => true,
        }
    }

    /// Hex representation of the sum
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(&self.sum)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Streaming SHA-256 calculator for payloads delivered in chunks
#[derive(Default)]
pub struct ChecksumCalculator {
    hasher: Sha256,
    len: u64,
}

impl ChecksumCalculator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the calculator with more data
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes consumed so far
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finalize and return the computed checksum
    #[must_use]
    pub fn finalize(self) -> Checksum {
        Checksum::new(ChecksumKind::Sha256, self.hasher.finalize().to_vec())
    }
}

/// Raw SHA-256 digest
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Quick CRC32C computation
#[inline]
#[must_use]
pub fn compute_crc32c(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}

/// Quick CRC32C verification
#[inline]
#[must_use]
pub fn verify_crc32c(data: &[u8], expected: u32) -> bool {
    crc32c::crc32c(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_verify() {
        let data = b"hello, world!";
        let checksum = Checksum::sha256(data);

        assert!(checksum.verify(data));
        assert!(!checksum.verify(b"hello, world?"));
        assert_eq!(checksum.to_hex().len(), 64);
    }

    #[test]
    fn test_streaming_calculator() {
        let data = b"hello, world!";
        let expected = Checksum::sha256(data);

        let mut calc = ChecksumCalculator::new();
        calc.update(b"hello, ");
        calc.update(b"world!");
        assert_eq!(calc.len(), data.len() as u64);
        assert_eq!(calc.finalize(), expected);
    }

    #[test]
    fn test_crc32c() {
        let crc = compute_crc32c(b"payload");
        assert!(verify_crc32c(b"payload", crc));
        assert!(!verify_crc32c(b"payloaD", crc));
    }
}
