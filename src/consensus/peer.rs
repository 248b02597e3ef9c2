/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The local peer: its keypair, its belief, and the state its consensus has reached.
//!
//! A `Peer` is a value: `propose_block`, `merge_beliefs`, and `update_timestamp`
//! return new peers. It is not internally synchronized; each instance is owned by a
//! single [runtime](crate::runtime) task.

use crate::cell::{Cell, Ref, SignedData};
use crate::collections::{u64_key, BlobMap, CellMap};
use crate::error::{CoreError, Result};
use crate::ledger::{Block, State, TxResult};
use crate::types::{crypto_primitives::Keypair, data_types::{AccountKey, Timestamp}};

use super::{belief::Belief, merge, order::Order};

/// A block newly applied to the consensus state by a merge.
pub struct AppliedBlock {
    /// Position of the block in the consensed chain.
    pub index: u64,
    pub block: Block,
    pub results: Vec<TxResult>,
}

pub struct Peer {
    keypair: Keypair,
    belief: Belief,
    consensus_state: State,
    /// Append-only map from consensus point to the state reached there.
    state_history: BlobMap,
    timestamp: Timestamp,
}

impl Peer {
    /// Create a peer over a genesis state. Its initial belief holds only its own
    /// empty, signed order.
    pub fn create(keypair: Keypair, genesis: State) -> Result<Peer> {
        let timestamp = genesis.timestamp()?;
        let order = Order::empty(timestamp);
        let signed = SignedData::sign(&keypair, Cell::Order(order));
        let orders = CellMap::empty().assoc(
            Cell::AccountKey(keypair.account_key()),
            Cell::Signed(signed),
        )?;
        let belief = Belief::create(orders, timestamp);
        let state_history =
            BlobMap::empty().assoc(u64_key(0), Ref::of(Cell::State(genesis.clone())))?;
        Ok(Peer { keypair, belief, consensus_state: genesis, state_history, timestamp })
    }

    /// Reassemble a peer from a previously persisted belief, recomputing the consensus
    /// state by applying the consensed prefix of the own order to `genesis`.
    pub fn restore(keypair: Keypair, genesis: State, belief: Belief) -> Result<Peer> {
        let key = keypair.account_key();
        let order = belief
            .get_order(&key)?
            .ok_or(CoreError::InvalidData("restored belief lacks the own order"))?;
        let mut state = genesis;
        let mut state_history =
            BlobMap::empty().assoc(u64_key(0), Ref::of(Cell::State(state.clone())))?;
        for i in 0..order.consensus_point() {
            let block = order.get_block(i)?;
            let (next, _) = state.apply_block(&block)?;
            state = next;
            state_history =
                state_history.assoc(u64_key(i + 1), Ref::of(Cell::State(state.clone())))?;
        }
        let timestamp = belief.timestamp();
        Ok(Peer { keypair, belief, consensus_state: state, state_history, timestamp })
    }

    pub fn account_key(&self) -> AccountKey {
        self.keypair.account_key()
    }

    pub fn belief(&self) -> &Belief {
        &self.belief
    }

    pub fn get_consensus_state(&self) -> &State {
        &self.consensus_state
    }

    pub fn state_history(&self) -> &BlobMap {
        &self.state_history
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Sign an arbitrary cell with the peer's key.
    pub fn sign(&self, cell: Cell) -> SignedData {
        SignedData::sign(&self.keypair, cell)
    }

    /// The order observed from `key` in the current belief.
    pub fn get_order(&self, key: &AccountKey) -> Result<Option<Order>> {
        self.belief.get_order(key)
    }

    /// The peer's own order.
    pub fn own_order(&self) -> Result<Order> {
        self.get_order(&self.account_key())?
            .ok_or(CoreError::InvalidData("belief lacks the own order"))
    }

    /// The peer's own consensus point.
    pub fn consensus_point(&self) -> Result<u64> {
        Ok(self.own_order()?.consensus_point())
    }

    /// Advance the peer's clock. Earlier timestamps are ignored: time is monotone.
    pub fn update_timestamp(&self, timestamp: Timestamp) -> Peer {
        Peer {
            keypair: self.keypair.clone(),
            belief: self.belief.clone(),
            consensus_state: self.consensus_state.clone(),
            state_history: self.state_history.clone(),
            timestamp: self.timestamp.max(timestamp),
        }
    }

    /// Append `block` to the own order, re-sign it, and yield the peer holding the
    /// new belief. Cut points are unchanged; they only move in merges.
    pub fn propose_block(&self, block: Block) -> Result<Peer> {
        let own = self.own_order()?;
        let timestamp = self.timestamp.max(own.timestamp().next());
        let order = own.append_block(block, timestamp)?;
        let signed = SignedData::sign(&self.keypair, Cell::Order(order));
        let orders = self.belief.orders()?.assoc(
            Cell::AccountKey(self.account_key()),
            Cell::Signed(signed),
        )?;
        let belief = Belief::create(orders, self.belief.timestamp().max(timestamp));
        Ok(Peer {
            keypair: self.keypair.clone(),
            belief,
            consensus_state: self.consensus_state.clone(),
            state_history: self.state_history.clone(),
            timestamp: self.timestamp,
        })
    }

    /// Merge `received` beliefs into this peer's belief, then catch the consensus
    /// state up to any newly consensed blocks, recording each intermediate state.
    pub fn merge_beliefs(&self, received: &[Belief]) -> Result<Peer> {
        Ok(self.merge_beliefs_with_results(received)?.0)
    }

    /// Like [`merge_beliefs`](Self::merge_beliefs), additionally reporting every block
    /// the merge applied, with the per-transaction results. The runtime uses this to
    /// answer transaction submissions.
    pub fn merge_beliefs_with_results(
        &self,
        received: &[Belief],
    ) -> Result<(Peer, Vec<AppliedBlock>)> {
        let outcome = merge::merge_beliefs(
            &self.keypair,
            &self.belief,
            received,
            &self.consensus_state,
            self.timestamp,
        )?;

        let mut state = self.consensus_state.clone();
        let mut state_history = self.state_history.clone();
        let mut applied = Vec::new();
        if outcome.consensus_point > outcome.previous_consensus_point {
            let chain = outcome.own_order.blocks()?;
            for i in outcome.previous_consensus_point..outcome.consensus_point {
                let block = chain.get(i)?.as_block()?.clone();
                let (next, results) = state.apply_block(&block)?;
                state = next;
                state_history =
                    state_history.assoc(u64_key(i + 1), Ref::of(Cell::State(state.clone())))?;
                applied.push(AppliedBlock { index: i, block, results });
            }
        }

        let peer = Peer {
            keypair: self.keypair.clone(),
            belief: outcome.belief,
            consensus_state: state,
            state_history,
            timestamp: self.timestamp,
        };
        Ok((peer, applied))
    }
}
