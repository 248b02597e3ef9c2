/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The canonical binary encoding.
//!
//! Every cell has exactly one encoding: tag byte, then the kind-specific fields.
//! Variable-length unsigned integers are VLQs (7 data bits per byte, big-endian, high
//! bit as continuation); longs and timestamps are sign-extended VLQs. Child cells
//! appear as refs: inlined when embedded, `REF` tag plus 32-byte hash when indirect.
//!
//! Decoding is strict. Non-minimal VLQs, counts inconsistent with mask popcounts,
//! leaves above [`LEAF_MAX`](crate::collections::LEAF_MAX), tree nodes at or below it,
//! unsorted leaf entries, and trailing bytes all fail with `BadFormat`. The tree-node
//! count check is what catches forged non-canonical forms from malicious peers.

use crate::collections::{
    blob_map::{BlobMap, BlobMapEntry, BlobMapNode},
    hash_map::{CellMap, MapEntry, MapNode},
    hash_set::{CellSet, SetNode},
    list::List,
    vector::{tree_child_size, Vector, VectorNode},
    CHUNK_SIZE, LEAF_MAX,
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
use crate::types::data_types::{AccountKey, Address, SignatureBytes, Stake, Timestamp};

use super::{
    hash::Hash,
    reference::Ref,
    signed::SignedData,
    tag, Cell, Double,
};

/// Maximum length, in bytes, of a cell encoding that may be embedded in its parent.
pub const MAX_EMBEDDED: usize = 140;

/// Produce the canonical encoding of `cell`.
pub fn encode(cell: &Cell) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_cell(&mut out, cell);
    out
}

/// Length of the canonical encoding of `cell`.
pub fn encoded_size(cell: &Cell) -> usize {
    encode(cell).len()
}

/// Whether `cell`'s encoding is small enough to embed in a parent.
pub fn is_embedded(cell: &Cell) -> bool {
    encoded_size(cell) <= MAX_EMBEDDED
}

/// Decode a complete canonical encoding. The whole buffer must be consumed.
pub fn decode(bytes: &[u8]) -> Result<Cell> {
    let mut reader = Reader::new(bytes);
    let cell = read_cell(&mut reader)?;
    if !reader.is_empty() {
        return Err(CoreError::BadFormat("trailing bytes after cell"));
    }
    Ok(cell)
}

/* ↓↓↓ Writing ↓↓↓ */

pub(crate) fn write_cell(out: &mut Vec<u8>, cell: &Cell) {
    match cell {
        Cell::Nil => out.push(tag::NIL),
        Cell::Boolean(false) => out.push(tag::FALSE),
        Cell::Boolean(true) => out.push(tag::TRUE),
        Cell::Long(v) => {
            out.push(tag::LONG);
            write_signed_vlq(out, *v);
        }
        Cell::Double(d) => {
            out.push(tag::DOUBLE);
            out.extend_from_slice(&d.0.to_bits().to_be_bytes());
        }
        Cell::Char(c) => {
            out.push(tag::CHAR);
            write_unsigned_vlq(out, *c as u64);
        }
        Cell::String(s) => write_chars(out, tag::STRING, s),
        Cell::Symbol(s) => write_chars(out, tag::SYMBOL, s),
        Cell::Keyword(s) => write_chars(out, tag::KEYWORD, s),
        Cell::Blob(b) => {
            out.push(tag::BLOB);
            write_unsigned_vlq(out, b.len() as u64);
            out.extend_from_slice(b);
        }
        Cell::Address(a) => {
            out.push(tag::ADDRESS);
            write_unsigned_vlq(out, a.int());
        }
        Cell::AccountKey(k) => {
            out.push(tag::ACCOUNT_KEY);
            out.extend_from_slice(&k.bytes());
        }
        Cell::Vector(v) => match &v.node {
            VectorNode::Leaf { count, prefix, items } => {
                out.push(tag::VECTOR_LEAF);
                write_unsigned_vlq(out, *count);
                if let Some(prefix) = prefix {
                    write_ref(out, prefix);
                }
                for item in items {
                    write_ref(out, item);
                }
            }
            VectorNode::Tree { count, children } => {
                out.push(tag::VECTOR_TREE);
                write_unsigned_vlq(out, *count);
                for child in children {
                    write_ref(out, child);
                }
            }
        },
        Cell::List(l) => {
            out.push(tag::LIST);
            write_unsigned_vlq(out, l.items.len() as u64);
            for item in &l.items {
                write_ref(out, item);
            }
        }
        Cell::Map(m) => match &m.node {
            MapNode::Leaf { entries } => {
                out.push(tag::MAP_LEAF);
                write_unsigned_vlq(out, entries.len() as u64);
                for entry in entries {
                    write_ref(out, &entry.key);
                    write_ref(out, &entry.value);
                }
            }
            MapNode::Tree { count, shift, mask, children } => {
                out.push(tag::MAP_TREE);
                write_unsigned_vlq(out, *count);
                out.push(*shift);
                out.extend_from_slice(&mask.to_be_bytes());
                for child in children {
                    write_ref(out, child);
                }
            }
        },
        Cell::Set(s) => match &s.node {
            SetNode::Leaf { elements } => {
                out.push(tag::SET_LEAF);
                write_unsigned_vlq(out, elements.len() as u64);
                for element in elements {
                    write_ref(out, element);
                }
            }
            SetNode::Tree { count, shift, mask, children } => {
                out.push(tag::SET_TREE);
                write_unsigned_vlq(out, *count);
                out.push(*shift);
                out.extend_from_slice(&mask.to_be_bytes());
                for child in children {
                    write_ref(out, child);
                }
            }
        },
        Cell::BlobMap(b) => match &b.node {
            BlobMapNode::Leaf { entries } => {
                out.push(tag::BLOB_MAP_LEAF);
                write_unsigned_vlq(out, entries.len() as u64);
                for entry in entries {
                    write_unsigned_vlq(out, entry.key.len() as u64);
                    out.extend_from_slice(&entry.key);
                    write_ref(out, &entry.value);
                }
            }
            BlobMapNode::Tree { count, depth, mask, children } => {
                out.push(tag::BLOB_MAP_TREE);
                write_unsigned_vlq(out, *count);
                out.push(*depth);
                out.extend_from_slice(&mask.to_be_bytes());
                for child in children {
                    write_ref(out, child);
                }
            }
        },
        Cell::MapEntry(e) => {
            out.push(tag::MAP_ENTRY);
            write_ref(out, &e.key);
            write_ref(out, &e.value);
        }
        Cell::Signed(s) => {
            out.push(tag::SIGNED_DATA);
            out.extend_from_slice(&s.key.bytes());
            out.extend_from_slice(&s.signature.bytes());
            write_ref(out, &s.payload);
        }
        Cell::Block(b) => {
            out.push(tag::BLOCK);
            write_signed_vlq(out, b.timestamp.millis());
            out.extend_from_slice(&b.peer_key.bytes());
            write_ref(out, &b.transactions);
        }
        Cell::Order(o) => {
            out.push(tag::ORDER);
            write_ref(out, &o.blocks);
            write_unsigned_vlq(out, o.proposal_point);
            write_unsigned_vlq(out, o.consensus_point);
            write_signed_vlq(out, o.timestamp.millis());
        }
        Cell::Belief(b) => {
            out.push(tag::BELIEF);
            write_ref(out, &b.orders);
            write_signed_vlq(out, b.timestamp.millis());
        }
        Cell::State(s) => {
            out.push(tag::STATE);
            write_ref(out, &s.accounts);
            write_ref(out, &s.peers);
            write_ref(out, &s.globals);
            write_ref(out, &s.schedule);
        }
        Cell::PeerStatus(p) => {
            out.push(tag::PEER_STATUS);
            write_unsigned_vlq(out, p.controller.int());
            write_unsigned_vlq(out, p.stake.int());
        }
        Cell::AccountStatus(a) => {
            out.push(tag::ACCOUNT_STATUS);
            write_unsigned_vlq(out, a.balance);
            write_unsigned_vlq(out, a.sequence);
            out.extend_from_slice(&a.key.bytes());
        }
        Cell::Transaction(t) => match t {
            Transaction::Transfer { origin, sequence, target, amount } => {
                out.push(tag::TX_TRANSFER);
                write_unsigned_vlq(out, origin.int());
                write_unsigned_vlq(out, *sequence);
                write_unsigned_vlq(out, target.int());
                write_unsigned_vlq(out, *amount);
            }
            Transaction::Schedule { origin, sequence, time, target, amount } => {
                out.push(tag::TX_SCHEDULE);
                write_unsigned_vlq(out, origin.int());
                write_unsigned_vlq(out, *sequence);
                write_signed_vlq(out, time.millis());
                write_unsigned_vlq(out, target.int());
                write_unsigned_vlq(out, *amount);
            }
        },
        Cell::TxResult(r) => {
            out.push(tag::RESULT);
            write_unsigned_vlq(out, r.id);
            match r.error {
                None => out.push(0),
                Some(code) => {
                    out.push(1);
                    out.push(code);
                }
            }
            write_ref(out, &r.value);
        }
    }
}

fn write_chars(out: &mut Vec<u8>, tag: u8, s: &str) {
    out.push(tag);
    write_unsigned_vlq(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

pub(crate) fn write_ref(out: &mut Vec<u8>, r: &Ref) {
    if r.is_embedded() {
        // Embedded refs always carry their value: the only way to construct one is
        // from an in-memory cell.
        let cell = r.value().expect("embedded ref carries its value");
        write_cell(out, cell);
    } else {
        out.push(tag::REF);
        out.extend_from_slice(&r.hash().bytes());
    }
}

/// Write a big-endian VLQ: 7 data bits per byte, high bit set on all but the last.
pub(crate) fn write_unsigned_vlq(out: &mut Vec<u8>, v: u64) {
    let mut groups = 1;
    while groups < 10 && (v >> (7 * groups)) != 0 {
        groups += 1;
    }
    for i in (0..groups).rev() {
        let group = ((v >> (7 * i)) & 0x7F) as u8;
        out.push(if i == 0 { group } else { group | 0x80 });
    }
}

/// Write a sign-extended big-endian VLQ. Bit 6 of the first byte is the sign.
pub(crate) fn write_signed_vlq(out: &mut Vec<u8>, v: i64) {
    let mut groups = 1;
    while groups < 10 {
        let bits = 7 * groups;
        let min = -(1i128 << (bits - 1));
        let max = (1i128 << (bits - 1)) - 1;
        if (v as i128) >= min && (v as i128) <= max {
            break;
        }
        groups += 1;
    }
    for i in (0..groups).rev() {
        let group = ((v >> (7 * i)) & 0x7F) as u8;
        out.push(if i == 0 { group } else { group | 0x80 });
    }
}

/* ↓↓↓ Reading ↓↓↓ */

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, pos: 0 }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn peek(&self) -> Result<u8> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(CoreError::BadFormat("unexpected end of input"))
    }

    fn read_u8(&mut self) -> Result<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() - self.pos < n {
            return Err(CoreError::BadFormat("unexpected end of input"));
        }
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_hash(&mut self) -> Result<Hash> {
        let bytes = self.read_bytes(Hash::LENGTH)?;
        let mut array = [0u8; Hash::LENGTH];
        array.copy_from_slice(bytes);
        Ok(Hash::new(array))
    }

    pub(crate) fn read_unsigned_vlq(&mut self) -> Result<u64> {
        let first = self.read_u8()?;
        let mut acc = (first & 0x7F) as u128;
        let mut count = 1;
        let mut cont = first & 0x80 != 0;
        while cont {
            let b = self.read_u8()?;
            count += 1;
            if count > 10 {
                return Err(CoreError::BadFormat("overlong VLQ"));
            }
            acc = (acc << 7) | (b & 0x7F) as u128;
            cont = b & 0x80 != 0;
        }
        if count > 1 && first & 0x7F == 0 {
            return Err(CoreError::BadFormat("non-minimal VLQ"));
        }
        if acc > u64::MAX as u128 {
            return Err(CoreError::BadFormat("VLQ out of range"));
        }
        Ok(acc as u64)
    }

    pub(crate) fn read_signed_vlq(&mut self) -> Result<i64> {
        let first = self.read_u8()?;
        // Sign-extend the 7 data bits of the first byte.
        let mut acc = ((first & 0x3F) as i128) - ((first & 0x40) as i128);
        let mut count = 1;
        let mut cont = first & 0x80 != 0;
        let mut second = None;
        while cont {
            let b = self.read_u8()?;
            if second.is_none() {
                second = Some(b);
            }
            count += 1;
            if count > 10 {
                return Err(CoreError::BadFormat("overlong signed VLQ"));
            }
            acc = (acc << 7) | (b & 0x7F) as i128;
            cont = b & 0x80 != 0;
        }
        if let Some(second) = second {
            let data = first & 0x7F;
            let redundant =
                (data == 0x00 && second & 0x40 == 0) || (data == 0x7F && second & 0x40 != 0);
            if redundant {
                return Err(CoreError::BadFormat("non-minimal signed VLQ"));
            }
        }
        if acc < i64::MIN as i128 || acc > i64::MAX as i128 {
            return Err(CoreError::BadFormat("signed VLQ out of range"));
        }
        Ok(acc as i64)
    }

    fn read_count(&mut self, what: &'static str) -> Result<u64> {
        let count = self.read_unsigned_vlq()?;
        // A count beyond u32::MAX in a single node cannot arise from canonical data.
        if count > u32::MAX as u64 {
            return Err(CoreError::BadFormat(what));
        }
        Ok(count)
    }
}

pub(crate) fn read_ref(reader: &mut Reader) -> Result<Ref> {
    if reader.peek()? == tag::REF {
        reader.read_u8()?;
        let hash = reader.read_hash()?;
        return Ok(Ref::indirect(hash));
    }
    let start = reader.pos;
    let cell = read_cell(reader)?;
    let encoding = &reader.bytes[start..reader.pos];
    if encoding.len() > MAX_EMBEDDED {
        return Err(CoreError::BadFormat("oversized embedded child"));
    }
    Ok(Ref::from_parts(cell, encoding))
}

fn read_cell(reader: &mut Reader) -> Result<Cell> {
    let tag_byte = reader.read_u8()?;
    match tag_byte {
        tag::NIL => Ok(Cell::Nil),
        tag::FALSE => Ok(Cell::Boolean(false)),
        tag::TRUE => Ok(Cell::Boolean(true)),
        tag::LONG => Ok(Cell::Long(reader.read_signed_vlq()?)),
        tag::DOUBLE => {
            let bytes = reader.read_bytes(8)?;
            let mut array = [0u8; 8];
            array.copy_from_slice(bytes);
            Ok(Cell::Double(Double(f64::from_bits(u64::from_be_bytes(array)))))
        }
        tag::CHAR => {
            let scalar = reader.read_unsigned_vlq()?;
            let scalar = u32::try_from(scalar)
                .ok()
                .and_then(char::from_u32)
                .ok_or(CoreError::BadFormat("invalid char scalar"))?;
            Ok(Cell::Char(scalar))
        }
        tag::STRING => Ok(Cell::String(read_chars(reader)?)),
        tag::SYMBOL => Ok(Cell::Symbol(read_chars(reader)?)),
        tag::KEYWORD => Ok(Cell::Keyword(read_chars(reader)?)),
        tag::BLOB => {
            let len = reader.read_count("blob length")?;
            Ok(Cell::Blob(reader.read_bytes(len as usize)?.to_vec()))
        }
        tag::ADDRESS => Ok(Cell::Address(Address::new(reader.read_unsigned_vlq()?))),
        tag::ACCOUNT_KEY => {
            let bytes = reader.read_bytes(32)?;
            let mut array = [0u8; 32];
            array.copy_from_slice(bytes);
            Ok(Cell::AccountKey(AccountKey::new(array)))
        }
        tag::VECTOR_LEAF => {
            let count = reader.read_count("vector count")?;
            if count <= CHUNK_SIZE as u64 {
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    items.push(read_ref(reader)?);
                }
                Ok(Cell::Vector(Vector {
                    node: VectorNode::Leaf { count, prefix: None, items },
                }))
            } else {
                let tail_len = (count % CHUNK_SIZE as u64) as usize;
                if tail_len == 0 {
                    return Err(CoreError::BadFormat("packed vector encoded as leaf"));
                }
                let prefix = read_ref(reader)?;
                let mut items = Vec::with_capacity(tail_len);
                for _ in 0..tail_len {
                    items.push(read_ref(reader)?);
                }
                Ok(Cell::Vector(Vector {
                    node: VectorNode::Leaf { count, prefix: Some(prefix), items },
                }))
            }
        }
        tag::VECTOR_TREE => {
            let count = reader.read_count("vector count")?;
            if count <= CHUNK_SIZE as u64 || count % CHUNK_SIZE as u64 != 0 {
                return Err(CoreError::BadFormat("non-packed vector encoded as tree"));
            }
            let child_size = tree_child_size(count);
            let n_children = ((count + child_size - 1) / child_size) as usize;
            let mut children = Vec::with_capacity(n_children);
            for _ in 0..n_children {
                children.push(read_ref(reader)?);
            }
            Ok(Cell::Vector(Vector { node: VectorNode::Tree { count, children } }))
        }
        tag::LIST => {
            let count = reader.read_count("list count")?;
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_ref(reader)?);
            }
            Ok(Cell::List(List { items }))
        }
        tag::MAP_LEAF => {
            let count = reader.read_count("map count")?;
            if count > LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("map leaf above maximum size"));
            }
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key = read_ref(reader)?;
                let value = read_ref(reader)?;
                entries.push(MapEntry { key, value });
            }
            for pair in entries.windows(2) {
                if pair[0].key.hash() >= pair[1].key.hash() {
                    return Err(CoreError::BadFormat("map leaf entries out of order"));
                }
            }
            Ok(Cell::Map(CellMap { node: MapNode::Leaf { entries } }))
        }
        tag::MAP_TREE => {
            let count = reader.read_count("map count")?;
            // Tree nodes must hold more than LEAF_MAX entries. A forged tree at or
            // below the threshold is a non-canonical form.
            if count <= LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("map tree at or below leaf size"));
            }
            let shift = reader.read_u8()?;
            if shift > 63 {
                return Err(CoreError::BadFormat("map tree shift out of range"));
            }
            let mask_bytes = reader.read_bytes(2)?;
            let mask = u16::from_be_bytes([mask_bytes[0], mask_bytes[1]]);
            if mask == 0 {
                return Err(CoreError::BadFormat("map tree with empty mask"));
            }
            let n_children = mask.count_ones() as usize;
            let mut children = Vec::with_capacity(n_children);
            for _ in 0..n_children {
                children.push(read_ref(reader)?);
            }
            Ok(Cell::Map(CellMap { node: MapNode::Tree { count, shift, mask, children } }))
        }
        tag::SET_LEAF => {
            let count = reader.read_count("set count")?;
            if count > LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("set leaf above maximum size"));
            }
            let mut elements = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elements.push(read_ref(reader)?);
            }
            for pair in elements.windows(2) {
                if pair[0].hash() >= pair[1].hash() {
                    return Err(CoreError::BadFormat("set leaf elements out of order"));
                }
            }
            Ok(Cell::Set(CellSet { node: SetNode::Leaf { elements } }))
        }
        tag::SET_TREE => {
            let count = reader.read_count("set count")?;
            if count <= LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("set tree at or below leaf size"));
            }
            let shift = reader.read_u8()?;
            if shift > 63 {
                return Err(CoreError::BadFormat("set tree shift out of range"));
            }
            let mask_bytes = reader.read_bytes(2)?;
            let mask = u16::from_be_bytes([mask_bytes[0], mask_bytes[1]]);
            if mask == 0 {
                return Err(CoreError::BadFormat("set tree with empty mask"));
            }
            let n_children = mask.count_ones() as usize;
            let mut children = Vec::with_capacity(n_children);
            for _ in 0..n_children {
                children.push(read_ref(reader)?);
            }
            Ok(Cell::Set(CellSet { node: SetNode::Tree { count, shift, mask, children } }))
        }
        tag::BLOB_MAP_LEAF => {
            let count = reader.read_count("blob map count")?;
            if count > LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("blob map leaf above maximum size"));
            }
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let key_len = reader.read_count("blob map key length")?;
                let key = reader.read_bytes(key_len as usize)?.to_vec();
                let value = read_ref(reader)?;
                entries.push(BlobMapEntry { key, value });
            }
            for pair in entries.windows(2) {
                if pair[0].key >= pair[1].key {
                    return Err(CoreError::BadFormat("blob map entries out of order"));
                }
                if pair[0].key.len() != pair[1].key.len() {
                    return Err(CoreError::BadFormat("blob map keys of mixed length"));
                }
            }
            Ok(Cell::BlobMap(BlobMap { node: BlobMapNode::Leaf { entries } }))
        }
        tag::BLOB_MAP_TREE => {
            let count = reader.read_count("blob map count")?;
            if count <= LEAF_MAX as u64 {
                return Err(CoreError::BadFormat("blob map tree at or below leaf size"));
            }
            let depth = reader.read_u8()?;
            let mask_bytes = reader.read_bytes(2)?;
            let mask = u16::from_be_bytes([mask_bytes[0], mask_bytes[1]]);
            if mask == 0 {
                return Err(CoreError::BadFormat("blob map tree with empty mask"));
            }
            let n_children = mask.count_ones() as usize;
            let mut children = Vec::with_capacity(n_children);
            for _ in 0..n_children {
                children.push(read_ref(reader)?);
            }
            Ok(Cell::BlobMap(BlobMap { node: BlobMapNode::Tree { count, depth, mask, children } }))
        }
        tag::MAP_ENTRY => {
            let key = read_ref(reader)?;
            let value = read_ref(reader)?;
            Ok(Cell::MapEntry(MapEntry { key, value }))
        }
        tag::SIGNED_DATA => {
            let key_bytes = reader.read_bytes(32)?;
            let mut key = [0u8; 32];
            key.copy_from_slice(key_bytes);
            let sig_bytes = reader.read_bytes(64)?;
            let mut sig = [0u8; 64];
            sig.copy_from_slice(sig_bytes);
            let payload = read_ref(reader)?;
            Ok(Cell::Signed(SignedData {
                key: AccountKey::new(key),
                signature: SignatureBytes::new(sig),
                payload,
            }))
        }
        tag::BLOCK => {
            let timestamp = Timestamp::new(reader.read_signed_vlq()?);
            let key_bytes = reader.read_bytes(32)?;
            let mut key = [0u8; 32];
            key.copy_from_slice(key_bytes);
            let transactions = read_ref(reader)?;
            Ok(Cell::Block(Block {
                timestamp,
                peer_key: AccountKey::new(key),
                transactions,
            }))
        }
        tag::ORDER => {
            let blocks = read_ref(reader)?;
            let proposal_point = reader.read_unsigned_vlq()?;
            let consensus_point = reader.read_unsigned_vlq()?;
            if consensus_point > proposal_point {
                return Err(CoreError::BadFormat("order cut points out of order"));
            }
            let timestamp = Timestamp::new(reader.read_signed_vlq()?);
            Ok(Cell::Order(Order { blocks, proposal_point, consensus_point, timestamp }))
        }
        tag::BELIEF => {
            let orders = read_ref(reader)?;
            let timestamp = Timestamp::new(reader.read_signed_vlq()?);
            Ok(Cell::Belief(Belief { orders, timestamp }))
        }
        tag::STATE => {
            let accounts = read_ref(reader)?;
            let peers = read_ref(reader)?;
            let globals = read_ref(reader)?;
            let schedule = read_ref(reader)?;
            Ok(Cell::State(State { accounts, peers, globals, schedule }))
        }
        tag::PEER_STATUS => {
            let controller = Address::new(reader.read_unsigned_vlq()?);
            let stake = Stake::new(reader.read_unsigned_vlq()?);
            Ok(Cell::PeerStatus(PeerStatus { controller, stake }))
        }
        tag::ACCOUNT_STATUS => {
            let balance = reader.read_unsigned_vlq()?;
            let sequence = reader.read_unsigned_vlq()?;
            let key_bytes = reader.read_bytes(32)?;
            let mut key = [0u8; 32];
            key.copy_from_slice(key_bytes);
            Ok(Cell::AccountStatus(AccountStatus {
                balance,
                sequence,
                key: AccountKey::new(key),
            }))
        }
        tag::TX_TRANSFER => {
            let origin = Address::new(reader.read_unsigned_vlq()?);
            let sequence = reader.read_unsigned_vlq()?;
            let target = Address::new(reader.read_unsigned_vlq()?);
            let amount = reader.read_unsigned_vlq()?;
            Ok(Cell::Transaction(Transaction::Transfer { origin, sequence, target, amount }))
        }
        tag::TX_SCHEDULE => {
            let origin = Address::new(reader.read_unsigned_vlq()?);
            let sequence = reader.read_unsigned_vlq()?;
            let time = Timestamp::new(reader.read_signed_vlq()?);
            let target = Address::new(reader.read_unsigned_vlq()?);
            let amount = reader.read_unsigned_vlq()?;
            Ok(Cell::Transaction(Transaction::Schedule { origin, sequence, time, target, amount }))
        }
        tag::RESULT => {
            let id = reader.read_unsigned_vlq()?;
            let error = match reader.read_u8()? {
                0 => None,
                1 => Some(reader.read_u8()?),
                _ => return Err(CoreError::BadFormat("invalid result error flag")),
            };
            let value = read_ref(reader)?;
            Ok(Cell::TxResult(TxResult { id, error, value }))
        }
        _ => Err(CoreError::BadFormat("unknown tag")),
    }
}

fn read_chars(reader: &mut Reader) -> Result<String> {
    let len = reader.read_count("string length")?;
    let bytes = reader.read_bytes(len as usize)?;
    String::from_utf8(bytes.to_vec()).map_err(|_| CoreError::BadFormat("invalid UTF-8"))
}
