/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The networking surface of the core: message types, wire framing, the pluggable
//! [`Network`] trait, and in-flight request tracking.
//!
//! The core does not own sockets. Library users plug in a [`Network`] implementation;
//! the framing layer is what they run directly above their byte streams.

pub mod framing;
pub mod messages;
pub mod network;
pub mod requests;

pub use framing::{decode_message, encode_message, FrameReader, FrameWriter};
pub use messages::Message;
pub use network::Network;
pub use requests::RequestTracker;
