/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The ledger: accounts, peers, transactions, blocks, and the replicated state.

pub mod account;
pub mod block;
pub mod peer_status;
pub mod state;
pub mod transaction;

pub use account::AccountStatus;
pub use block::Block;
pub use peer_status::PeerStatus;
pub use state::State;
pub use transaction::{juice, Transaction, TransactionError, TxResult};
