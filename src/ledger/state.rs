/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The replicated state and the application of blocks to it.
//!
//! A [`State`] holds the accounts vector, the peer-stake map, the globals vector, and
//! the scheduled-actions map. Applying a block first dispatches scheduled actions that
//! have come due, then applies each signed transaction in order. Rejected transactions
//! produce error [`TxResult`]s and leave the state untouched; they never abort the
//! block.
//!
//! `compute_total_funds` sums account balances, peer stakes, scheduled reserves, and
//! the collected fees pool. Every successful application preserves this sum: juice
//! moves value from the origin into fees rather than destroying it.

use crate::cell::{Cell, Hash, Ref, SignedData};
use crate::collections::{u64_key, BlobMap, Vector};
use crate::error::{CoreError, Result};
use crate::types::data_types::{AccountKey, Address, Stake, Timestamp, TotalStake};

use super::{
    account::AccountStatus,
    block::Block,
    peer_status::PeerStatus,
    transaction::{Transaction, TransactionError, TxResult},
};

/// Indices into the globals vector.
pub const GLOBAL_TIMESTAMP: u64 = 0;
pub const GLOBAL_FEES: u64 = 1;
pub const GLOBAL_JUICE_PRICE: u64 = 2;

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct State {
    pub(crate) accounts: Ref,
    pub(crate) peers: Ref,
    pub(crate) globals: Ref,
    pub(crate) schedule: Ref,
}

impl State {
    pub fn create(
        accounts: Vector,
        peers: BlobMap,
        globals: Vector,
        schedule: BlobMap,
    ) -> State {
        State {
            accounts: Ref::of(Cell::Vector(accounts)),
            peers: Ref::of(Cell::BlobMap(peers)),
            globals: Ref::of(Cell::Vector(globals)),
            schedule: Ref::of(Cell::BlobMap(schedule)),
        }
    }

    /// The globals vector of a genesis state: timestamp, zero collected fees, and the
    /// given juice price.
    pub fn genesis_globals(timestamp: Timestamp, juice_price: u64) -> Result<Vector> {
        Vector::from_cells([
            Cell::Long(timestamp.millis()),
            Cell::Long(0),
            Cell::Long(juice_price as i64),
        ])
    }

    pub fn accounts(&self) -> Result<Vector> {
        Ok(self.accounts.value()?.as_vector()?.clone())
    }

    pub fn peers(&self) -> Result<BlobMap> {
        Ok(self.peers.value()?.as_blob_map()?.clone())
    }

    pub fn globals(&self) -> Result<Vector> {
        Ok(self.globals.value()?.as_vector()?.clone())
    }

    pub fn schedule(&self) -> Result<BlobMap> {
        Ok(self.schedule.value()?.as_blob_map()?.clone())
    }

    pub fn hash(&self) -> Hash {
        Cell::State(self.clone()).hash()
    }

    fn global_long(&self, i: u64) -> Result<i64> {
        self.globals()?.get(i)?.as_long()
    }

    pub fn timestamp(&self) -> Result<Timestamp> {
        Ok(Timestamp::new(self.global_long(GLOBAL_TIMESTAMP)?))
    }

    pub fn fees(&self) -> Result<u64> {
        Ok(self.global_long(GLOBAL_FEES)? as u64)
    }

    pub fn juice_price(&self) -> Result<u64> {
        Ok(self.global_long(GLOBAL_JUICE_PRICE)? as u64)
    }

    pub fn get_account(&self, address: Address) -> Result<Option<AccountStatus>> {
        let accounts = self.accounts()?;
        if address.int() >= accounts.count() {
            return Ok(None);
        }
        Ok(Some(accounts.get(address.int())?.as_account_status()?.clone()))
    }

    /// The balance of an existing account.
    pub fn balance(&self, address: Address) -> Result<u64> {
        self.get_account(address)?
            .map(|a| a.balance())
            .ok_or(CoreError::InvalidData("no such account"))
    }

    pub fn peer_stake(&self, key: &AccountKey) -> Result<Option<Stake>> {
        let peers = self.peers()?;
        match peers.get_cell(&key.bytes())? {
            Some(cell) => Ok(Some(cell.as_peer_status()?.stake())),
            None => Ok(None),
        }
    }

    /// Every peer with its stake, in ascending key order.
    pub fn peers_with_stakes(&self) -> Result<Vec<(AccountKey, Stake)>> {
        let mut out = Vec::new();
        for entry in self.peers()?.entries()? {
            let mut key = [0u8; 32];
            if entry.key().len() != 32 {
                return Err(CoreError::InvalidData("peer key of wrong length"));
            }
            key.copy_from_slice(entry.key());
            let status = entry.value().value()?.as_peer_status()?.clone();
            out.push((AccountKey::new(key), status.stake()));
        }
        Ok(out)
    }

    pub fn total_stake(&self) -> Result<TotalStake> {
        let mut total = TotalStake::zero();
        for (_, stake) in self.peers_with_stakes()? {
            total += stake;
        }
        Ok(total)
    }

    /// The sum of all account balances, peer stakes, scheduled reserves, and collected
    /// fees. Conserved by every block application.
    pub fn compute_total_funds(&self) -> Result<u128> {
        let mut total: u128 = 0;
        for r in self.accounts()?.element_refs()? {
            total += r.value()?.as_account_status()?.balance() as u128;
        }
        for (_, stake) in self.peers_with_stakes()? {
            total += stake.int() as u128;
        }
        for entry in self.schedule()?.entries()? {
            let vector = entry.value().value()?.as_vector()?.clone();
            for r in vector.element_refs()? {
                let signed = r.value()?.as_signed()?.clone();
                if let Transaction::Schedule { amount, .. } =
                    signed.value()?.as_transaction()?
                {
                    total += *amount as u128;
                }
            }
        }
        total += self.fees()? as u128;
        Ok(total)
    }

    /// Apply `block`: dispatch due scheduled actions, apply each signed transaction in
    /// order, then advance the consensus timestamp. Returns the new state and one
    /// result per transaction.
    pub fn apply_block(&self, block: &Block) -> Result<(State, Vec<TxResult>)> {
        let mut state = self.dispatch_due(block.timestamp())?;
        let mut results = Vec::new();
        for (i, signed) in block.transactions()?.iter().enumerate() {
            let (next, result) = state.apply_signed(signed, i as u64)?;
            state = next;
            results.push(result);
        }
        let state = state.advanced_to(block.timestamp())?;
        Ok((state, results))
    }

    fn apply_signed(&self, signed: &SignedData, id: u64) -> Result<(State, TxResult)> {
        match signed.verify() {
            Ok(()) => {}
            Err(CoreError::BadSignature) => {
                return Ok((self.clone(), TxResult::rejected(id, TransactionError::BadSignature)))
            }
            Err(other) => return Err(other),
        }
        let payload = signed.value()?;
        let tx = match payload.as_transaction() {
            Ok(tx) => tx.clone(),
            Err(_) => {
                return Ok((self.clone(), TxResult::rejected(id, TransactionError::Invalid)))
            }
        };

        let origin = tx.origin();
        let Some(origin_status) = self.get_account(origin)? else {
            return Ok((self.clone(), TxResult::rejected(id, TransactionError::UnknownAccount)));
        };
        if origin_status.key() != signed.key() {
            return Ok((self.clone(), TxResult::rejected(id, TransactionError::BadSigner)));
        }
        if tx.sequence() != origin_status.sequence() + 1 {
            return Ok((self.clone(), TxResult::rejected(id, TransactionError::BadSequence)));
        }
        let fee = tx.juice().saturating_mul(self.juice_price()?);

        match tx {
            Transaction::Transfer { target, amount, sequence, .. } => {
                if self.get_account(target)?.is_none() {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::UnknownAccount),
                    ));
                }
                let Some(total) = amount.checked_add(fee) else {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::InsufficientFunds),
                    ));
                };
                if origin_status.balance() < total {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::InsufficientFunds),
                    ));
                }
                let debited = origin_status.with_applied(origin_status.balance() - total, sequence);
                let mut accounts =
                    self.accounts()?.assoc(origin.int(), Cell::AccountStatus(debited.clone()))?;
                if target == origin {
                    let credited = debited.with_balance(debited.balance() + amount);
                    accounts = accounts.assoc(target.int(), Cell::AccountStatus(credited))?;
                } else {
                    let target_status =
                        accounts.get(target.int())?.as_account_status()?.clone();
                    let credited = target_status.with_balance(target_status.balance() + amount);
                    accounts = accounts.assoc(target.int(), Cell::AccountStatus(credited))?;
                }
                let state = self.with_accounts(accounts)?.add_fees(fee)?;
                Ok((state, TxResult::ok(id, Cell::Long(amount as i64))))
            }
            Transaction::Schedule { time, target, amount, sequence, .. } => {
                if time.millis() < 0 {
                    return Ok((self.clone(), TxResult::rejected(id, TransactionError::Invalid)));
                }
                if self.get_account(target)?.is_none() {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::UnknownAccount),
                    ));
                }
                let Some(total) = amount.checked_add(fee) else {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::InsufficientFunds),
                    ));
                };
                if origin_status.balance() < total {
                    return Ok((
                        self.clone(),
                        TxResult::rejected(id, TransactionError::InsufficientFunds),
                    ));
                }
                let debited = origin_status.with_applied(origin_status.balance() - total, sequence);
                let accounts =
                    self.accounts()?.assoc(origin.int(), Cell::AccountStatus(debited))?;

                let schedule = self.schedule()?;
                let key = u64_key(time.millis() as u64);
                let pending = match schedule.get_cell(&key)? {
                    Some(cell) => cell.as_vector()?.clone(),
                    None => Vector::empty(),
                };
                let pending = pending.append(Cell::Signed(signed.clone()))?;
                let schedule = schedule.assoc(key, Ref::of(Cell::Vector(pending)))?;

                let state = self
                    .with_accounts(accounts)?
                    .with_schedule(schedule)?
                    .add_fees(fee)?;
                Ok((state, TxResult::ok(id, Cell::Long(time.millis()))))
            }
        }
    }

    /// Dispatch every scheduled entry whose time has come, crediting targets from the
    /// reserves taken when the schedules were accepted.
    fn dispatch_due(&self, now: Timestamp) -> Result<State> {
        let mut state = self.clone();
        loop {
            let schedule = state.schedule()?;
            let Some(entry) = schedule.first_entry()? else { break };
            let mut key = [0u8; 8];
            if entry.key().len() != 8 {
                return Err(CoreError::InvalidData("schedule key of wrong length"));
            }
            key.copy_from_slice(entry.key());
            let due = u64::from_be_bytes(key) as i64;
            if due > now.millis() {
                break;
            }

            let mut accounts = state.accounts()?;
            let mut orphaned_fees: u64 = 0;
            let vector = entry.value().value()?.as_vector()?.clone();
            for r in vector.element_refs()? {
                let signed = r.value()?.as_signed()?.clone();
                if let Transaction::Schedule { target, amount, .. } =
                    signed.value()?.as_transaction()?
                {
                    if target.int() < accounts.count() {
                        let status = accounts.get(target.int())?.as_account_status()?.clone();
                        let credited = status.with_balance(status.balance() + amount);
                        accounts = accounts.assoc(target.int(), Cell::AccountStatus(credited))?;
                    } else {
                        // The reserve has nowhere to go; it falls into the fees pool
                        // so total funds stay conserved.
                        orphaned_fees += amount;
                    }
                }
            }
            state = state
                .with_accounts(accounts)?
                .with_schedule(schedule.dissoc(entry.key())?)?
                .add_fees(orphaned_fees)?;
        }
        Ok(state)
    }

    fn advanced_to(&self, timestamp: Timestamp) -> Result<State> {
        if timestamp <= self.timestamp()? {
            return Ok(self.clone());
        }
        let globals =
            self.globals()?.assoc(GLOBAL_TIMESTAMP, Cell::Long(timestamp.millis()))?;
        self.with_globals(globals)
    }

    fn add_fees(&self, fee: u64) -> Result<State> {
        if fee == 0 {
            return Ok(self.clone());
        }
        let fees = self.fees()? + fee;
        let globals = self.globals()?.assoc(GLOBAL_FEES, Cell::Long(fees as i64))?;
        self.with_globals(globals)
    }

    fn with_accounts(&self, accounts: Vector) -> Result<State> {
        Ok(State { accounts: Ref::of(Cell::Vector(accounts)), ..self.clone() })
    }

    fn with_globals(&self, globals: Vector) -> Result<State> {
        Ok(State { globals: Ref::of(Cell::Vector(globals)), ..self.clone() })
    }

    fn with_schedule(&self, schedule: BlobMap) -> Result<State> {
        Ok(State { schedule: Ref::of(Cell::BlobMap(schedule)), ..self.clone() })
    }

    /// Build the peer map for a genesis state from `(key, status)` pairs.
    pub fn peer_map(peers: impl IntoIterator<Item = (AccountKey, PeerStatus)>) -> Result<BlobMap> {
        let mut map = BlobMap::empty();
        for (key, status) in peers {
            map = map.assoc(key.bytes().to_vec(), Ref::of(Cell::PeerStatus(status)))?;
        }
        Ok(map)
    }
}
