/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Thread that receives events emitted by the [runtime](crate::runtime) and passes
//! them to event handlers.
//!
//! When the thread receives a message containing an [event](crate::events::Event), it
//! triggers the execution of all handlers defined for the contained event type, where
//! the handlers for each event type are stored in [`EventHandlers`].
//!
//! When no handlers are present in a peer's instance of `EventHandlers` this thread is
//! not started.

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    thread,
    thread::JoinHandle,
    time::Duration,
};

use crate::{events::*, logging::Logger};

/// Pointer to a handler closure, parametrised by the argument (for our use case,
/// event) type.
pub type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

/// Stores the two optional handlers enabled for an event type that implements the
/// [`Logger`] trait, namely one logging handler, defined in
/// [`logging`](crate::logging), and one user-defined handler, passed to the
/// [configuration](crate::config::Configuration).
pub(crate) struct HandlerPair<T: Logger> {
    pub(crate) user_defined_handler: Option<HandlerPtr<T>>,
    pub(crate) logging_handler: Option<HandlerPtr<T>>,
}

impl<T: Logger> HandlerPair<T> {
    // Checks if no event handlers are defined for this event.
    pub(crate) fn is_empty(&self) -> bool {
        self.user_defined_handler.is_none() && self.logging_handler.is_none()
    }

    /// Creates a new `HandlerPair` with the user-defined handler, and the default
    /// logging handler if logging is enabled.
    pub(crate) fn new(log: bool, user_defined_handler: Option<HandlerPtr<T>>) -> HandlerPair<T> {
        HandlerPair {
            user_defined_handler,
            logging_handler: if log { Some(T::get_logger()) } else { None },
        }
    }

    fn handle(&self, event: &T) {
        if let Some(handler) = &self.logging_handler {
            handler(event)
        }
        if let Some(handler) = &self.user_defined_handler {
            handler(event)
        }
    }
}

/// Stores the `HandlerPair` of user-defined and optional logging handlers for each
/// pre-defined event type from [events](crate::events).
pub(crate) struct EventHandlers {
    pub(crate) propose_block_handlers: HandlerPair<ProposeBlockEvent>,
    pub(crate) merge_beliefs_handlers: HandlerPair<MergeBeliefsEvent>,
    pub(crate) apply_block_handlers: HandlerPair<ApplyBlockEvent>,
    pub(crate) receive_belief_handlers: HandlerPair<ReceiveBeliefEvent>,
    pub(crate) broadcast_belief_handlers: HandlerPair<BroadcastBeliefEvent>,
    pub(crate) receive_missing_data_handlers: HandlerPair<ReceiveMissingDataEvent>,
    pub(crate) send_data_reply_handlers: HandlerPair<SendDataReplyEvent>,
}

impl EventHandlers {
    pub(crate) fn is_empty(&self) -> bool {
        self.propose_block_handlers.is_empty()
            && self.merge_beliefs_handlers.is_empty()
            && self.apply_block_handlers.is_empty()
            && self.receive_belief_handlers.is_empty()
            && self.broadcast_belief_handlers.is_empty()
            && self.receive_missing_data_handlers.is_empty()
            && self.send_data_reply_handlers.is_empty()
    }

    fn handle(&self, event: &Event) {
        match event {
            Event::ProposeBlock(e) => self.propose_block_handlers.handle(e),
            Event::MergeBeliefs(e) => self.merge_beliefs_handlers.handle(e),
            Event::ApplyBlock(e) => self.apply_block_handlers.handle(e),
            Event::ReceiveBelief(e) => self.receive_belief_handlers.handle(e),
            Event::BroadcastBelief(e) => self.broadcast_belief_handlers.handle(e),
            Event::ReceiveMissingData(e) => self.receive_missing_data_handlers.handle(e),
            Event::SendDataReply(e) => self.send_data_reply_handlers.handle(e),
        }
    }
}

pub(crate) fn start_event_bus(
    event_handlers: EventHandlers,
    event_subscriber: Receiver<Event>,
    shutdown_signal: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                panic!("the event bus lost its shutdown channel")
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
        }

        match event_subscriber.recv_timeout(Duration::from_millis(50)) {
            Ok(event) => event_handlers.handle(&event),
            Err(RecvTimeoutError::Timeout) => {}
            // All publishers are gone: the runtime thread has already exited.
            Err(RecvTimeoutError::Disconnected) => return,
        }
    })
}
