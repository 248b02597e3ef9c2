/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Per-peer consensus bookkeeping.

use crate::types::data_types::{Address, Stake};

/// The status of one peer in the peer map: the account controlling it and the stake
/// that weights its votes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PeerStatus {
    pub(crate) controller: Address,
    pub(crate) stake: Stake,
}

impl PeerStatus {
    pub fn create(controller: Address, stake: Stake) -> PeerStatus {
        PeerStatus { controller, stake }
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn stake(&self) -> Stake {
        self.stake
    }
}
