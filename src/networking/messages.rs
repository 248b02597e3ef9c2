/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Exhaustive enumeration of every message variant exchanged between peers.

use crate::cell::{Hash, SignedData};
use crate::consensus::Belief;
use crate::ledger::TxResult;
use crate::types::data_types::MessageId;

/// All message variants. The discriminants are the wire tags of the
/// [framing](super::framing) layer.
#[derive(Clone, Debug)]
pub enum Message {
    /// A gossiped belief.
    Belief(Belief),

    /// Request for the cell stored under a hash.
    Query { id: MessageId, hash: Hash },

    /// Submission of a signed transaction for inclusion in a block.
    Transact { id: MessageId, transaction: SignedData },

    /// Result of a transaction previously submitted with the same id.
    Result(TxResult),

    /// Request for the peer's status.
    StatusRequest { id: MessageId },

    /// The peer's latest belief hash and consensus state hash.
    Status { id: MessageId, belief_hash: Hash, state_hash: Hash },

    /// Request for a cell the sender found missing while resolving a graph.
    MissingData { id: MessageId, hash: Hash },

    /// Encodings answering a [`Query`](Message::Query) or
    /// [`MissingData`](Message::MissingData) request.
    DataReply { id: MessageId, cells: Vec<Vec<u8>> },

    /// A random token the receiver must sign to prove key possession.
    Challenge { id: MessageId, token: Vec<u8> },

    /// The signed token answering a [`Challenge`](Message::Challenge).
    Response { id: MessageId, signed: SignedData },
}

impl Message {
    /// The message's wire tag.
    pub fn tag(&self) -> u8 {
        match self {
            Message::Belief(_) => 1,
            Message::Query { .. } => 2,
            Message::Transact { .. } => 3,
            Message::Result(_) => 4,
            Message::StatusRequest { .. } => 5,
            Message::Status { .. } => 6,
            Message::MissingData { .. } => 7,
            Message::DataReply { .. } => 8,
            Message::Challenge { .. } => 9,
            Message::Response { .. } => 10,
        }
    }

    /// The id correlating this message with a request, if it carries one.
    pub fn id(&self) -> Option<MessageId> {
        match self {
            Message::Belief(_) => None,
            Message::Query { id, .. } => Some(*id),
            Message::Transact { id, .. } => Some(*id),
            Message::Result(result) => Some(MessageId::new(result.id())),
            Message::StatusRequest { id } => Some(*id),
            Message::Status { id, .. } => Some(*id),
            Message::MissingData { id, .. } => Some(*id),
            Message::DataReply { id, .. } => Some(*id),
            Message::Challenge { id, .. } => Some(*id),
            Message::Response { id, .. } => Some(*id),
        }
    }
}

impl From<Belief> for Message {
    fn from(belief: Belief) -> Self {
        Message::Belief(belief)
    }
}

impl From<TxResult> for Message {
    fn from(result: TxResult) -> Self {
        Message::Result(result)
    }
}
