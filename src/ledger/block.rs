/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the block type and its methods.

use crate::cell::{Cell, Hash, Ref, SignedData};
use crate::collections::Vector;
use crate::error::Result;
use crate::types::data_types::{AccountKey, Timestamp};

/// An ordered sequence of signed transactions proposed by one peer at one timestamp.
///
/// A block's identity is the hash of its canonical encoding; two blocks with the same
/// transactions but different timestamps or proposers are distinct.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub(crate) timestamp: Timestamp,
    pub(crate) peer_key: AccountKey,
    pub(crate) transactions: Ref,
}

impl Block {
    /// Create a block of `transactions` proposed by the peer identified by
    /// `peer_key`.
    pub fn of(
        timestamp: Timestamp,
        peer_key: AccountKey,
        transactions: Vec<SignedData>,
    ) -> Result<Block> {
        let vector = Vector::from_cells(transactions.into_iter().map(Cell::Signed))?;
        Ok(Block { timestamp, peer_key, transactions: Ref::of(Cell::Vector(vector)) })
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn peer_key(&self) -> &AccountKey {
        &self.peer_key
    }

    pub fn transactions_ref(&self) -> &Ref {
        &self.transactions
    }

    /// The signed transactions, in order.
    pub fn transactions(&self) -> Result<Vec<SignedData>> {
        let vector = self.transactions.value()?.as_vector()?.clone();
        let mut out = Vec::with_capacity(vector.count() as usize);
        for r in vector.element_refs()? {
            out.push(r.value()?.as_signed()?.clone());
        }
        Ok(out)
    }

    pub fn hash(&self) -> Hash {
        Cell::Block(self.clone()).hash()
    }
}
