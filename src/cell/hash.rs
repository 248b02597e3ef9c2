/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The 32-byte cryptographic digest that identifies every cell.

use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
};

use sha2::Digest;

use crate::types::crypto_primitives::CryptoHasher;

/// The SHA-256 digest of a cell's canonical encoding.
///
/// Two hashes are equal iff all bytes are equal. The only externally observable ordering
/// is lexicographic on the bytes, which consensus uses for deterministic tie-breaks.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const LENGTH: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Hash a canonical encoding.
    pub fn compute(encoding: &[u8]) -> Hash {
        let mut hasher = CryptoHasher::new();
        hasher.update(encoding);
        Hash(hasher.finalize().into())
    }

    /// The hex digit of this hash at position `i` (0 = most significant nibble).
    ///
    /// Radix tries over key hashes branch on these digits.
    pub fn hex_digit(&self, i: u8) -> u8 {
        let byte = self.0[(i / 2) as usize];
        if i % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0F
        }
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..")
    }
}

impl Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
