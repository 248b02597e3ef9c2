/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! "Inert" types that are sent around and inspected but have no active behavior.
//!
//! These follow the newtype pattern: the inner representation is private (or at least
//! opaque at use sites), and the API for working with each type is defined here.

use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign},
};

/// Millisecond timestamp used by blocks, orders, beliefs, and peers.
///
/// Timestamps only ever move forward: every place that stores one updates it through
/// [`max`](Ord::max)-style logic, never by overwriting with an earlier value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn millis(&self) -> i64 {
        self.0
    }

    /// The timestamp one millisecond after `self`.
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: i64) -> Self::Output {
        Timestamp(self.0 + rhs)
    }
}

/// Stake of a single peer, as recorded in the peer map of the consensus state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Stake(u64);

impl Stake {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Total stake obtained by summing up the [`Stake`]s of a set of peers.
///
/// Kept as a `u128` so that sums of `u64` stakes cannot overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TotalStake(u128);

impl TotalStake {
    pub const fn new(int: u128) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u128 {
        self.0
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    /// Whether `self` is a strict majority (`> 1/2`) of `total`.
    pub fn is_majority_of(&self, total: TotalStake) -> bool {
        self.0 * 2 > total.0
    }

    /// Whether `self` is a strict supermajority (`> 2/3`) of `total`.
    pub fn is_supermajority_of(&self, total: TotalStake) -> bool {
        self.0 * 3 > total.0 * 2
    }
}

impl AddAssign<Stake> for TotalStake {
    fn add_assign(&mut self, rhs: Stake) {
        self.0 += rhs.0 as u128
    }
}

/// An Ed25519 signature represented in bytes.
#[derive(Clone, Copy)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl PartialEq for SignatureBytes {
    fn eq(&self, other: &Self) -> bool {
        self.0[..] == other.0[..]
    }
}

impl Eq for SignatureBytes {}

impl Debug for SignatureBytes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "SignatureBytes({:02x?}..)", &self.0[..4])
    }
}

/// The public identity of a peer: the bytes of its Ed25519 verifying key.
///
/// Account keys order lexicographically on their bytes. This ordering is observable in
/// consensus (vote tie-breaks) and in the iteration order of the peer map, so it must
/// stay stable.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountKey([u8; 32]);

impl AccountKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl PartialOrd for AccountKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccountKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl Debug for AccountKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "AccountKey({:02x?}..)", &self.0[..4])
    }
}

/// Index of an account in the accounts vector of the state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier correlating a request message with its reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

impl MessageId {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}

/// Size of a buffer (in bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BufferSize(u64);

impl BufferSize {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }
}
