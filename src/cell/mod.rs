/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The cell data model: every value in the system is an immutable **cell**, identified
//! by the hash of its canonical encoding.
//!
//! Polymorphism over cells is a tagged sum over a closed set of kinds. Dispatch is by
//! tag byte on decode and by variant on encode. Cells reference children through
//! [`Ref`]s, which are embedded (value inline) or indirect (hash only, resolved through
//! a [store](crate::store)).
//!
//! Cyclic graphs never arise: a cell is content-addressed by its hash, so a cycle would
//! require a hash to contain itself. All walks in this crate are plain recursion with
//! no visited set.

pub mod encoding;
pub mod hash;
pub mod reference;
pub mod signed;
pub mod tag;

pub use encoding::{decode, encode, encoded_size, is_embedded, MAX_EMBEDDED};
pub use hash::Hash;
pub use reference::{Ref, RefStatus};
pub use signed::SignedData;

use crate::collections::{
    blob_map::BlobMap, hash_map::CellMap, hash_map::MapEntry, hash_set::CellSet, list::List,
    vector::Vector,
};
use crate::consensus::{belief::Belief, order::Order};
use crate::error::{CoreError, Result};
use crate::ledger::{
    account::AccountStatus,
    block::Block,
    peer_status::PeerStatus,
    state::State,
    transaction::{Transaction, TxResult},
};
use crate::types::data_types::{AccountKey, Address};

/// An IEEE-754 double with bitwise equality, so that structural equality of cells
/// coincides with equality of their encodings (and therefore of their hashes).
#[derive(Clone, Copy, Debug)]
pub struct Double(pub f64);

impl PartialEq for Double {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Double {}

/// The closed set of cell kinds.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Cell {
    Nil,
    Boolean(bool),
    Long(i64),
    Double(Double),
    Char(char),
    String(String),
    Blob(Vec<u8>),
    Symbol(String),
    Keyword(String),
    Address(Address),
    AccountKey(AccountKey),
    Vector(Vector),
    List(List),
    Map(CellMap),
    Set(CellSet),
    BlobMap(BlobMap),
    MapEntry(MapEntry),
    Signed(SignedData),
    Block(Block),
    Order(Order),
    Belief(Belief),
    State(State),
    PeerStatus(PeerStatus),
    AccountStatus(AccountStatus),
    Transaction(Transaction),
    TxResult(TxResult),
}

impl Cell {
    /// The cell's tag byte in the canonical encoding.
    pub fn tag(&self) -> u8 {
        match self {
            Cell::Nil => tag::NIL,
            Cell::Boolean(false) => tag::FALSE,
            Cell::Boolean(true) => tag::TRUE,
            Cell::Long(_) => tag::LONG,
            Cell::Double(_) => tag::DOUBLE,
            Cell::Char(_) => tag::CHAR,
            Cell::String(_) => tag::STRING,
            Cell::Blob(_) => tag::BLOB,
            Cell::Symbol(_) => tag::SYMBOL,
            Cell::Keyword(_) => tag::KEYWORD,
            Cell::Address(_) => tag::ADDRESS,
            Cell::AccountKey(_) => tag::ACCOUNT_KEY,
            Cell::Vector(v) => v.tag(),
            Cell::List(_) => tag::LIST,
            Cell::Map(m) => m.tag(),
            Cell::Set(s) => s.tag(),
            Cell::BlobMap(b) => b.tag(),
            Cell::MapEntry(_) => tag::MAP_ENTRY,
            Cell::Signed(_) => tag::SIGNED_DATA,
            Cell::Block(_) => tag::BLOCK,
            Cell::Order(_) => tag::ORDER,
            Cell::Belief(_) => tag::BELIEF,
            Cell::State(_) => tag::STATE,
            Cell::PeerStatus(_) => tag::PEER_STATUS,
            Cell::AccountStatus(_) => tag::ACCOUNT_STATUS,
            Cell::Transaction(Transaction::Transfer { .. }) => tag::TX_TRANSFER,
            Cell::Transaction(Transaction::Schedule { .. }) => tag::TX_SCHEDULE,
            Cell::TxResult(_) => tag::RESULT,
        }
    }

    /// The canonical encoding of the cell.
    pub fn encode(&self) -> Vec<u8> {
        encoding::encode(self)
    }

    /// The hash of the canonical encoding; the cell's identity.
    pub fn hash(&self) -> Hash {
        Hash::compute(&self.encode())
    }

    /// The cell's direct child refs, in encoding order.
    pub fn refs(&self) -> Vec<Ref> {
        match self {
            Cell::Vector(v) => v.refs(),
            Cell::List(l) => l.items.clone(),
            Cell::Map(m) => m.refs(),
            Cell::Set(s) => s.refs(),
            Cell::BlobMap(b) => b.refs(),
            Cell::MapEntry(e) => vec![e.key.clone(), e.value.clone()],
            Cell::Signed(s) => vec![s.payload.clone()],
            Cell::Block(b) => vec![b.transactions.clone()],
            Cell::Order(o) => vec![o.blocks.clone()],
            Cell::Belief(b) => vec![b.orders.clone()],
            Cell::State(s) => vec![
                s.accounts.clone(),
                s.peers.clone(),
                s.globals.clone(),
                s.schedule.clone(),
            ],
            Cell::TxResult(r) => vec![r.value.clone()],
            _ => Vec::new(),
        }
    }

    /// Rebuild the cell with every direct child ref passed through `f`. Key hashes are
    /// unchanged by construction, so tree structure is preserved.
    pub fn update_refs(&self, f: &mut dyn FnMut(&Ref) -> Result<Ref>) -> Result<Cell> {
        Ok(match self {
            Cell::Vector(v) => Cell::Vector(v.update_refs(f)?),
            Cell::List(l) => {
                let items = l.items.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                Cell::List(List { items })
            }
            Cell::Map(m) => Cell::Map(m.update_refs(f)?),
            Cell::Set(s) => Cell::Set(s.update_refs(f)?),
            Cell::BlobMap(b) => Cell::BlobMap(b.update_refs(f)?),
            Cell::MapEntry(e) => Cell::MapEntry(MapEntry { key: f(&e.key)?, value: f(&e.value)? }),
            Cell::Signed(s) => Cell::Signed(SignedData { payload: f(&s.payload)?, ..s.clone() }),
            Cell::Block(b) => Cell::Block(Block { transactions: f(&b.transactions)?, ..b.clone() }),
            Cell::Order(o) => Cell::Order(Order { blocks: f(&o.blocks)?, ..o.clone() }),
            Cell::Belief(b) => Cell::Belief(Belief { orders: f(&b.orders)?, ..b.clone() }),
            Cell::State(s) => Cell::State(State {
                accounts: f(&s.accounts)?,
                peers: f(&s.peers)?,
                globals: f(&s.globals)?,
                schedule: f(&s.schedule)?,
            }),
            Cell::TxResult(r) => Cell::TxResult(TxResult { value: f(&r.value)?, ..r.clone() }),
            other => other.clone(),
        })
    }

    /// Check structural invariants that go beyond what decoding can verify locally.
    /// A violation indicates a malicious peer.
    pub fn validate(&self) -> Result<()> {
        match self {
            Cell::Vector(v) => v.validate(),
            Cell::Map(m) => m.validate(),
            Cell::Set(s) => s.validate(),
            Cell::BlobMap(b) => b.validate(),
            Cell::Order(o) => o.validate(),
            Cell::Belief(b) => b.validate(),
            _ => Ok(()),
        }
    }

    /* ↓↓↓ Downcasts ↓↓↓ */

    pub fn as_long(&self) -> Result<i64> {
        match self {
            Cell::Long(v) => Ok(*v),
            _ => Err(CoreError::InvalidData("expected a long")),
        }
    }

    pub fn as_vector(&self) -> Result<&Vector> {
        match self {
            Cell::Vector(v) => Ok(v),
            _ => Err(CoreError::InvalidData("expected a vector")),
        }
    }

    pub fn as_map(&self) -> Result<&CellMap> {
        match self {
            Cell::Map(m) => Ok(m),
            _ => Err(CoreError::InvalidData("expected a map")),
        }
    }

    pub fn as_blob_map(&self) -> Result<&BlobMap> {
        match self {
            Cell::BlobMap(b) => Ok(b),
            _ => Err(CoreError::InvalidData("expected a blob map")),
        }
    }

    pub fn as_signed(&self) -> Result<&SignedData> {
        match self {
            Cell::Signed(s) => Ok(s),
            _ => Err(CoreError::InvalidData("expected signed data")),
        }
    }

    pub fn as_block(&self) -> Result<&Block> {
        match self {
            Cell::Block(b) => Ok(b),
            _ => Err(CoreError::InvalidData("expected a block")),
        }
    }

    pub fn as_order(&self) -> Result<&Order> {
        match self {
            Cell::Order(o) => Ok(o),
            _ => Err(CoreError::InvalidData("expected an order")),
        }
    }

    pub fn as_belief(&self) -> Result<&Belief> {
        match self {
            Cell::Belief(b) => Ok(b),
            _ => Err(CoreError::InvalidData("expected a belief")),
        }
    }

    pub fn as_state(&self) -> Result<&State> {
        match self {
            Cell::State(s) => Ok(s),
            _ => Err(CoreError::InvalidData("expected a state")),
        }
    }

    pub fn as_account_status(&self) -> Result<&AccountStatus> {
        match self {
            Cell::AccountStatus(a) => Ok(a),
            _ => Err(CoreError::InvalidData("expected an account status")),
        }
    }

    pub fn as_peer_status(&self) -> Result<&PeerStatus> {
        match self {
            Cell::PeerStatus(p) => Ok(p),
            _ => Err(CoreError::InvalidData("expected a peer status")),
        }
    }

    pub fn as_transaction(&self) -> Result<&Transaction> {
        match self {
            Cell::Transaction(t) => Ok(t),
            _ => Err(CoreError::InvalidData("expected a transaction")),
        }
    }

    pub fn as_account_key(&self) -> Result<&AccountKey> {
        match self {
            Cell::AccountKey(k) => Ok(k),
            _ => Err(CoreError::InvalidData("expected an account key")),
        }
    }
}
