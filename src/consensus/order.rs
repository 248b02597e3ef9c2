/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! One peer's proposed ordering of blocks.

use crate::cell::{Cell, Hash, Ref};
use crate::collections::Vector;
use crate::error::{CoreError, Result};
use crate::ledger::Block;
use crate::types::data_types::Timestamp;

/// A vector of blocks with two cut points. Positions below `proposal_point` have
/// supermajority support for proposal; positions below `consensus_point` are final and
/// can never be reordered.
///
/// Invariant: `consensus_point <= proposal_point <= blocks.count()`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Order {
    pub(crate) blocks: Ref,
    pub(crate) proposal_point: u64,
    pub(crate) consensus_point: u64,
    pub(crate) timestamp: Timestamp,
}

impl Order {
    /// An order with no blocks and both cut points at zero.
    pub fn empty(timestamp: Timestamp) -> Order {
        Order {
            blocks: Ref::of(Cell::Vector(Vector::empty())),
            proposal_point: 0,
            consensus_point: 0,
            timestamp,
        }
    }

    pub fn create(
        blocks: Vector,
        proposal_point: u64,
        consensus_point: u64,
        timestamp: Timestamp,
    ) -> Result<Order> {
        if consensus_point > proposal_point || proposal_point > blocks.count() {
            return Err(CoreError::InvalidData("order cut points out of order"));
        }
        Ok(Order { blocks: Ref::of(Cell::Vector(blocks)), proposal_point, consensus_point, timestamp })
    }

    pub fn blocks_ref(&self) -> &Ref {
        &self.blocks
    }

    pub fn blocks(&self) -> Result<Vector> {
        Ok(self.blocks.value()?.as_vector()?.clone())
    }

    pub fn block_count(&self) -> Result<u64> {
        Ok(self.blocks()?.count())
    }

    pub fn get_block(&self, i: u64) -> Result<Block> {
        Ok(self.blocks()?.get(i)?.as_block()?.clone())
    }

    pub fn proposal_point(&self) -> u64 {
        self.proposal_point
    }

    pub fn consensus_point(&self) -> u64 {
        self.consensus_point
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The order with `block` appended at the tail. Cut points are untouched.
    pub fn append_block(&self, block: Block, timestamp: Timestamp) -> Result<Order> {
        let blocks = self.blocks()?.append(Cell::Block(block))?;
        Ok(Order {
            blocks: Ref::of(Cell::Vector(blocks)),
            proposal_point: self.proposal_point,
            consensus_point: self.consensus_point,
            timestamp,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.consensus_point > self.proposal_point {
            return Err(CoreError::InvalidData("order cut points out of order"));
        }
        if self.blocks.is_resolved() && self.proposal_point > self.block_count()? {
            return Err(CoreError::InvalidData("order proposal point beyond blocks"));
        }
        Ok(())
    }

    pub fn hash(&self) -> Hash {
        Cell::Order(self.clone()).hash()
    }
}
