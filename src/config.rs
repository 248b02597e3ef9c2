/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Configuration of a running peer.

use std::time::Duration;

use crate::event_bus::HandlerPtr;
use crate::events::*;
use crate::types::crypto_primitives::SigningKey;
use crate::types::data_types::BufferSize;

/// Configuration as specified by the operator.
#[derive(Clone)]
pub struct Configuration {
    /// The peer's signing key.
    pub me: SigningKey,

    /// How long the runtime idles between gossip ticks when no messages are waiting.
    pub gossip_interval: Duration,

    /// Capacity of the outbound frame buffer handed to the transport layer.
    pub outbound_buffer_capacity: BufferSize,

    /// Whether to install the default logging handlers from
    /// [logging](crate::logging).
    pub log_events: bool,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder {
            me: None,
            gossip_interval: Duration::from_millis(100),
            outbound_buffer_capacity: BufferSize::new(1024 * 1024),
            log_events: false,
        }
    }
}

pub struct ConfigurationBuilder {
    me: Option<SigningKey>,
    gossip_interval: Duration,
    outbound_buffer_capacity: BufferSize,
    log_events: bool,
}

impl ConfigurationBuilder {
    pub fn me(mut self, me: SigningKey) -> Self {
        self.me = Some(me);
        self
    }

    pub fn gossip_interval(mut self, interval: Duration) -> Self {
        self.gossip_interval = interval;
        self
    }

    pub fn outbound_buffer_capacity(mut self, capacity: BufferSize) -> Self {
        self.outbound_buffer_capacity = capacity;
        self
    }

    pub fn log_events(mut self, log_events: bool) -> Self {
        self.log_events = log_events;
        self
    }

    pub fn build(self) -> Configuration {
        Configuration {
            me: self.me.expect("a signing key must be configured with `me`"),
            gossip_interval: self.gossip_interval,
            outbound_buffer_capacity: self.outbound_buffer_capacity,
            log_events: self.log_events,
        }
    }
}

/// User-defined event handlers, all optional. Handlers run on the event-bus thread.
#[derive(Default)]
pub struct UserHandlers {
    pub propose_block: Option<HandlerPtr<ProposeBlockEvent>>,
    pub merge_beliefs: Option<HandlerPtr<MergeBeliefsEvent>>,
    pub apply_block: Option<HandlerPtr<ApplyBlockEvent>>,
    pub receive_belief: Option<HandlerPtr<ReceiveBeliefEvent>>,
    pub broadcast_belief: Option<HandlerPtr<BroadcastBeliefEvent>>,
    pub receive_missing_data: Option<HandlerPtr<ReceiveMissingDataEvent>>,
    pub send_data_reply: Option<HandlerPtr<SendDataReplyEvent>>,
}
