/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Notifications that are emitted when significant things happen in the local peer.
//!
//! Each significant occurrence corresponds to a variant of the [event enum](Event),
//! whose inner struct stores a summary of the occurrence, always including the exact
//! time it happened. Events are emitted **after** the corresponding occurrence has
//! completed; for example, [`ApplyBlockEvent`] is only emitted once the consensus
//! state has been advanced past the block.
//!
//! Library users can register handler closures per event type via the
//! [configuration](crate::config::Configuration); the [event bus](crate::event_bus)
//! thread calls them. Default logging handlers live in [logging](crate::logging).

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::cell::Hash;
use crate::types::data_types::{AccountKey, Timestamp};

/// Enumerates all events defined for the peer runtime.
pub enum Event {
    // Events that change the peer's own belief.
    ProposeBlock(ProposeBlockEvent),
    MergeBeliefs(MergeBeliefsEvent),
    ApplyBlock(ApplyBlockEvent),

    // Events that involve sending or receiving a message.
    ReceiveBelief(ReceiveBeliefEvent),
    BroadcastBelief(BroadcastBeliefEvent),
    ReceiveMissingData(ReceiveMissingDataEvent),
    SendDataReply(SendDataReplyEvent),
}

impl Event {
    pub(crate) fn publish(self, event_publisher: &Option<Sender<Event>>) {
        if let Some(publisher) = event_publisher {
            // The event bus outlives every publisher except during shutdown, when
            // losing an event is harmless.
            let _ = publisher.send(self);
        }
    }
}

/// The local peer appended a block to its own order.
pub struct ProposeBlockEvent {
    pub timestamp: SystemTime,
    pub block_hash: Hash,
    pub transaction_count: usize,
}

/// The local peer merged a batch of received beliefs.
pub struct MergeBeliefsEvent {
    pub timestamp: SystemTime,
    pub belief_count: usize,
    pub proposal_point: u64,
    pub consensus_point: u64,
}

/// A newly consensed block was applied to the consensus state.
pub struct ApplyBlockEvent {
    pub timestamp: SystemTime,
    pub block_hash: Hash,
    pub block_timestamp: Timestamp,
    pub consensus_point: u64,
}

/// A belief arrived from another peer.
pub struct ReceiveBeliefEvent {
    pub timestamp: SystemTime,
    pub origin: AccountKey,
    pub belief_hash: Hash,
}

/// The local peer broadcast its updated belief.
pub struct BroadcastBeliefEvent {
    pub timestamp: SystemTime,
    pub belief_hash: Hash,
}

/// Another peer asked for a cell it found missing.
pub struct ReceiveMissingDataEvent {
    pub timestamp: SystemTime,
    pub origin: AccountKey,
    pub hash: Hash,
}

/// The local peer answered a data request.
pub struct SendDataReplyEvent {
    pub timestamp: SystemTime,
    pub peer: AccountKey,
    pub cell_count: usize,
}
