/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-account bookkeeping.

use crate::types::data_types::AccountKey;

/// The status of one account in the accounts vector: its balance, the sequence number
/// of its last applied transaction, and the key authorized to sign for it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AccountStatus {
    pub(crate) balance: u64,
    pub(crate) sequence: u64,
    pub(crate) key: AccountKey,
}

impl AccountStatus {
    /// A fresh account with the given balance and signing key. Sequence starts at
    /// zero; the first transaction from the account must carry sequence 1.
    pub fn create(balance: u64, key: AccountKey) -> AccountStatus {
        AccountStatus { balance, sequence: 0, key }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub(crate) fn with_balance(&self, balance: u64) -> AccountStatus {
        AccountStatus { balance, ..self.clone() }
    }

    pub(crate) fn with_applied(&self, balance: u64, sequence: u64) -> AccountStatus {
        AccountStatus { balance, sequence, key: self.key }
    }
}
