/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the peer's
//! [config](crate::config::Configuration).
//!
//! This library logs using the [log](https://docs.rs/log/latest/log/) crate. To get
//! these messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first
//! two values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as
//!    constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event; hashes and keys are
//! printed as the first seven characters of their Base64 encoding.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const PROPOSE_BLOCK: &str = "ProposeBlock";
pub const MERGE_BELIEFS: &str = "MergeBeliefs";
pub const APPLY_BLOCK: &str = "ApplyBlock";

pub const RECEIVE_BELIEF: &str = "ReceiveBelief";
pub const BROADCAST_BELIEF: &str = "BroadcastBelief";
pub const RECEIVE_MISSING_DATA: &str = "ReceiveMissingData";
pub const SEND_DATA_REPLY: &str = "SendDataReply";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for ProposeBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &ProposeBlockEvent| {
            log::info!(
                "{}, {}, {}, {}",
                PROPOSE_BLOCK,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.block_hash.bytes()),
                event.transaction_count
            )
        })
    }
}

impl Logger for MergeBeliefsEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &MergeBeliefsEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                MERGE_BELIEFS,
                secs_since_unix_epoch(event.timestamp),
                event.belief_count,
                event.proposal_point,
                event.consensus_point
            )
        })
    }
}

impl Logger for ApplyBlockEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &ApplyBlockEvent| {
            log::info!(
                "{}, {}, {}, {}, {}",
                APPLY_BLOCK,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.block_hash.bytes()),
                event.block_timestamp,
                event.consensus_point
            )
        })
    }
}

impl Logger for ReceiveBeliefEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &ReceiveBeliefEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_BELIEF,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.origin.bytes()),
                first_seven_base64_chars(&event.belief_hash.bytes())
            )
        })
    }
}

impl Logger for BroadcastBeliefEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &BroadcastBeliefEvent| {
            log::info!(
                "{}, {}, {}",
                BROADCAST_BELIEF,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.belief_hash.bytes())
            )
        })
    }
}

impl Logger for ReceiveMissingDataEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &ReceiveMissingDataEvent| {
            log::info!(
                "{}, {}, {}, {}",
                RECEIVE_MISSING_DATA,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.origin.bytes()),
                first_seven_base64_chars(&event.hash.bytes())
            )
        })
    }
}

impl Logger for SendDataReplyEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        Box::new(|event: &SendDataReplyEvent| {
            log::info!(
                "{}, {}, {}, {}",
                SEND_DATA_REPLY,
                secs_since_unix_epoch(event.timestamp),
                first_seven_base64_chars(&event.peer.bytes()),
                event.cell_count
            )
        })
    }
}

// Get a more readable representation of a bytesequence by base64-encoding it and taking the first 7 characters.
fn first_seven_base64_chars(bytes: &[u8]) -> String {
    let encoded = STANDARD_NO_PAD.encode(bytes);
    if encoded.len() > 7 {
        encoded[0..7].to_string()
    } else {
        encoded
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
