/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Tag bytes of the canonical encoding.
//!
//! Every cell encoding begins with exactly one of these bytes. The set of cell kinds is
//! closed: a tag outside this table fails decoding with `BadFormat`.
//!
//! Tags in `0xA0..=0xAF` are record kinds; the tag byte doubles as the record subtag.

pub const NIL: u8 = 0x00;
pub const FALSE: u8 = 0x01;
pub const TRUE: u8 = 0x02;
pub const LONG: u8 = 0x09;
pub const DOUBLE: u8 = 0x0A;
pub const CHAR: u8 = 0x0B;

/// An indirect child reference: tag followed by the 32-byte hash of the child.
pub const REF: u8 = 0x20;
pub const ADDRESS: u8 = 0x21;
pub const ACCOUNT_KEY: u8 = 0x22;

pub const STRING: u8 = 0x30;
pub const BLOB: u8 = 0x31;
pub const SYMBOL: u8 = 0x32;
pub const KEYWORD: u8 = 0x33;

pub const VECTOR_LEAF: u8 = 0x80;
pub const VECTOR_TREE: u8 = 0x81;
pub const LIST: u8 = 0x82;
pub const MAP_LEAF: u8 = 0x83;
pub const MAP_TREE: u8 = 0x84;
pub const SET_LEAF: u8 = 0x85;
pub const SET_TREE: u8 = 0x86;
pub const BLOB_MAP_LEAF: u8 = 0x87;
pub const BLOB_MAP_TREE: u8 = 0x88;
pub const MAP_ENTRY: u8 = 0x89;

pub const SIGNED_DATA: u8 = 0x90;

// Record kinds.
pub const BLOCK: u8 = 0xA0;
pub const ORDER: u8 = 0xA1;
pub const BELIEF: u8 = 0xA2;
pub const STATE: u8 = 0xA3;
pub const PEER_STATUS: u8 = 0xA4;
pub const ACCOUNT_STATUS: u8 = 0xA5;
pub const TX_TRANSFER: u8 = 0xA8;
pub const TX_SCHEDULE: u8 = 0xA9;
pub const RESULT: u8 = 0xAC;
