/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The belief-merge consensus engine.
//!
//! Peers gossip [`Belief`]s, merge them deterministically, and advance per-peer
//! [`Order`] cut points by stake-weighted voting. Across rounds of full gossip the
//! beliefs of honest peers become identical and their consensus points advance
//! monotonically; with at least two thirds of stake honest and eventually connected
//! gossip, a proposed block reaches consensus in four full rounds
//! (adopt, propose, confirm, disseminate).

pub mod belief;
pub mod merge;
pub mod order;
pub mod peer;

pub use belief::Belief;
pub use order::Order;
pub use peer::{AppliedBlock, Peer};
