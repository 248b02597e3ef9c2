/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tracking of in-flight requests.
//!
//! Every request (query, missing-data fetch, status, challenge) is an entry mapping
//! its message id to a completion channel. The network-reader task delivers the reply
//! by completing the entry; cancelling one just forgets it, leaving the peer and store
//! untouched.

use std::sync::mpsc::{channel, Receiver, Sender};

use indexmap::IndexMap;

use crate::types::data_types::MessageId;

use super::messages::Message;

/// In-flight requests in insertion order, keyed by message id.
pub struct RequestTracker {
    next_id: u64,
    pending: IndexMap<MessageId, Sender<Message>>,
}

impl RequestTracker {
    pub fn new() -> RequestTracker {
        RequestTracker { next_id: 0, pending: IndexMap::new() }
    }

    /// Allocate a fresh message id and the channel on which its reply will arrive.
    pub fn register(&mut self) -> (MessageId, Receiver<Message>) {
        let id = MessageId::new(self.next_id);
        self.next_id += 1;
        let (sender, receiver) = channel();
        self.pending.insert(id, sender);
        (id, receiver)
    }

    /// Deliver `reply` to the request registered under `id`. Returns `false` when the
    /// id is unknown or already completed (late or duplicate replies are ignored).
    pub fn complete(&mut self, id: MessageId, reply: Message) -> bool {
        match self.pending.shift_remove(&id) {
            Some(sender) => sender.send(reply).is_ok(),
            None => false,
        }
    }

    /// Forget an in-flight request. Any reply that still arrives is ignored.
    pub fn cancel(&mut self, id: MessageId) {
        self.pending.shift_remove(&id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        RequestTracker::new()
    }
}
