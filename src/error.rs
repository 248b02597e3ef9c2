/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The error kinds surfaced by the core.
//!
//! Propagation policy:
//! - [`MissingData`](CoreError::MissingData) is recoverable: the caller collects the
//!   missing hashes and fetches them from the network before retrying.
//! - [`BadSignature`](CoreError::BadSignature) and [`InvalidData`](CoreError::InvalidData)
//!   drop the offending entry but do not abort a belief merge.
//! - [`BadFormat`](CoreError::BadFormat) from a peer closes that peer's connection.
//! - Everything else propagates to the outer orchestrator.
//!
//! Transaction rejections are *not* core errors: they are reported inside
//! [`TxResult`](crate::ledger::TxResult) cells.

use std::fmt::{self, Display, Formatter};

use crate::cell::Hash;

#[derive(Debug)]
pub enum CoreError {
    /// Received bytes are not a valid canonical encoding.
    BadFormat(&'static str),

    /// A signed datum fails verification.
    BadSignature,

    /// A needed cell is not in the local store. Recoverable via fetch.
    MissingData(Hash),

    /// A cell decoded but violates structural invariants. Indicates a malicious peer.
    InvalidData(&'static str),

    /// The outbound buffer is full; the caller retries without duplicating the message.
    WouldBlock,

    /// Transport or disk error.
    Io(std::io::Error),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::BadFormat(what) => write!(f, "bad format: {}", what),
            CoreError::BadSignature => write!(f, "bad signature"),
            CoreError::MissingData(hash) => write!(f, "missing data: {}", hash),
            CoreError::InvalidData(what) => write!(f, "invalid data: {}", what),
            CoreError::WouldBlock => write!(f, "outbound buffer full"),
            CoreError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> CoreError {
        CoreError::Io(err)
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoreError>;
