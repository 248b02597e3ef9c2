/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Transaction kinds, their juice costs, and the results of applying them.

use crate::cell::{Cell, Ref};
use crate::types::data_types::{Address, Timestamp};

/// Juice cost per transaction kind, in juice units. The fee charged to the origin is
/// the juice cost multiplied by the state's juice price.
pub mod juice {
    pub const TRANSFER: u64 = 100;
    pub const SCHEDULE: u64 = 200;
}

/// A transaction: origin, sequence, and the kind-specific payload.
///
/// The sequence number must be exactly one above the origin account's current
/// sequence; this is what makes replaying a signed transaction impossible.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Transaction {
    /// Move `amount` from `origin` to `target`.
    Transfer { origin: Address, sequence: u64, target: Address, amount: u64 },

    /// Reserve `amount` now and transfer it to `target` once the consensus timestamp
    /// reaches `time`.
    Schedule { origin: Address, sequence: u64, time: Timestamp, target: Address, amount: u64 },
}

impl Transaction {
    pub fn origin(&self) -> Address {
        match self {
            Transaction::Transfer { origin, .. } => *origin,
            Transaction::Schedule { origin, .. } => *origin,
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            Transaction::Transfer { sequence, .. } => *sequence,
            Transaction::Schedule { sequence, .. } => *sequence,
        }
    }

    /// The kind's juice cost in juice units.
    pub fn juice(&self) -> u64 {
        match self {
            Transaction::Transfer { .. } => juice::TRANSFER,
            Transaction::Schedule { .. } => juice::SCHEDULE,
        }
    }
}

/// Why the executor rejected a transaction. Carried inside [`TxResult`] cells; never a
/// core failure.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransactionError {
    /// The sequence number is not one above the account's current sequence.
    BadSequence,

    /// The origin cannot cover the amount plus the juice fee.
    InsufficientFunds,

    /// The transaction is signed by a key other than the origin account's key.
    BadSigner,

    /// The origin or target address does not exist.
    UnknownAccount,

    /// The signature over the transaction does not verify.
    BadSignature,

    /// The signed payload is not a transaction, or is otherwise unusable.
    Invalid,
}

impl TransactionError {
    pub fn code(&self) -> u8 {
        match self {
            TransactionError::BadSequence => 1,
            TransactionError::InsufficientFunds => 2,
            TransactionError::BadSigner => 3,
            TransactionError::UnknownAccount => 4,
            TransactionError::BadSignature => 5,
            TransactionError::Invalid => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<TransactionError> {
        Some(match code {
            1 => TransactionError::BadSequence,
            2 => TransactionError::InsufficientFunds,
            3 => TransactionError::BadSigner,
            4 => TransactionError::UnknownAccount,
            5 => TransactionError::BadSignature,
            6 => TransactionError::Invalid,
            _ => return None,
        })
    }
}

/// The outcome of applying one transaction: a correlation id, an optional error code,
/// and a result value.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxResult {
    pub(crate) id: u64,
    pub(crate) error: Option<u8>,
    pub(crate) value: Ref,
}

impl TxResult {
    pub fn ok(id: u64, value: Cell) -> TxResult {
        TxResult { id, error: None, value: Ref::of(value) }
    }

    pub fn rejected(id: u64, error: TransactionError) -> TxResult {
        TxResult { id, error: Some(error.code()), value: Ref::of(Cell::Nil) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<TransactionError> {
        self.error.and_then(TransactionError::from_code)
    }

    pub fn value(&self) -> &Ref {
        &self.value
    }
}
