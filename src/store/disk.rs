/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The on-disk implementation of [`CellStore`]: an append-only file of
//! `(hash, length, bytes)` records with an in-memory radix-trie index keyed by hash
//! prefix.
//!
//! Crash safety: a record becomes visible only once fully written. On open the file is
//! scanned from the start; a partial trailing record (from a crash mid-append) is
//! detected and truncated away before the index is rebuilt.

use std::{
    array,
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
    sync::{Arc, Mutex},
};

use crate::cell::Hash;
use crate::error::{CoreError, Result};

use super::CellStore;

const MAGIC: &[u8; 8] = b"CVGSTORE";

/// The on-disk cell store. Cheap to clone; clones share the same file and index.
#[derive(Clone)]
pub struct DiskStore {
    inner: Arc<Mutex<Inner>>,
}

struct Inner {
    file: File,
    index: Option<IndexNode>,
    /// Offset one past the last valid record.
    end: u64,
}

/// Radix trie over hash nibbles. A lookup descends by successive hex digits of the
/// sought hash until it reaches an entry, then compares the full hash.
enum IndexNode {
    Branch(Box<[Option<IndexNode>; 16]>),
    Entry { hash: Hash, offset: u64, len: u32 },
}

fn insert(slot: &mut Option<IndexNode>, hash: Hash, offset: u64, len: u32, depth: u8) {
    match slot {
        None => {
            *slot = Some(IndexNode::Entry { hash, offset, len });
        }
        Some(IndexNode::Entry { hash: existing, .. }) if *existing == hash => {
            // Same hash, same bytes: the first record wins.
        }
        Some(IndexNode::Entry { .. }) => {
            // Two distinct hashes share a prefix of `depth` digits: split the entry
            // into a branch and push both down.
            let Some(IndexNode::Entry { hash: e_hash, offset: e_offset, len: e_len }) = slot.take()
            else {
                unreachable!()
            };
            let mut children: [Option<IndexNode>; 16] = array::from_fn(|_| None);
            insert(
                &mut children[e_hash.hex_digit(depth) as usize],
                e_hash,
                e_offset,
                e_len,
                depth + 1,
            );
            insert(&mut children[hash.hex_digit(depth) as usize], hash, offset, len, depth + 1);
            *slot = Some(IndexNode::Branch(Box::new(children)));
        }
        Some(IndexNode::Branch(children)) => {
            insert(&mut children[hash.hex_digit(depth) as usize], hash, offset, len, depth + 1);
        }
    }
}

fn lookup(slot: &Option<IndexNode>, hash: &Hash, depth: u8) -> Option<(u64, u32)> {
    match slot {
        None => None,
        Some(IndexNode::Entry { hash: existing, offset, len }) => {
            if existing == hash {
                Some((*offset, *len))
            } else {
                None
            }
        }
        Some(IndexNode::Branch(children)) => {
            lookup(&children[hash.hex_digit(depth) as usize], hash, depth + 1)
        }
    }
}

/// Parse a minimal big-endian VLQ out of `buf` at `pos`. `None` means the buffer ends
/// mid-number, which at open time signals a truncated record.
fn read_vlq(buf: &[u8], mut pos: usize) -> Option<(u64, usize)> {
    let mut acc: u64 = 0;
    loop {
        let byte = *buf.get(pos)?;
        pos += 1;
        acc = (acc << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            return Some((acc, pos));
        }
    }
}

fn write_vlq(out: &mut Vec<u8>, v: u64) {
    let mut groups = 1;
    while groups < 10 && (v >> (7 * groups)) != 0 {
        groups += 1;
    }
    for i in (0..groups).rev() {
        let group = ((v >> (7 * i)) & 0x7F) as u8;
        out.push(if i == 0 { group } else { group | 0x80 });
    }
}

impl DiskStore {
    /// Open the store file at `path`, creating it if absent, scanning it to rebuild
    /// the index, and truncating any partial trailing record.
    pub fn open(path: impl AsRef<Path>) -> Result<DiskStore> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path.as_ref())?;

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut contents)?;

        if contents.is_empty() {
            file.write_all(MAGIC)?;
            file.sync_data()?;
            contents.extend_from_slice(MAGIC);
        } else if contents.len() < MAGIC.len() || &contents[..MAGIC.len()] != MAGIC {
            return Err(CoreError::BadFormat("store file header"));
        }

        let mut index = None;
        let mut pos = MAGIC.len();
        let valid_end;
        loop {
            let record_start = pos;
            if pos == contents.len() {
                valid_end = record_start;
                break;
            }
            if contents.len() - pos < Hash::LENGTH {
                valid_end = record_start;
                break;
            }
            let mut hash_bytes = [0u8; Hash::LENGTH];
            hash_bytes.copy_from_slice(&contents[pos..pos + Hash::LENGTH]);
            pos += Hash::LENGTH;
            let Some((len, after_len)) = read_vlq(&contents, pos) else {
                valid_end = record_start;
                break;
            };
            pos = after_len;
            if contents.len() - pos < len as usize {
                valid_end = record_start;
                break;
            }
            insert(&mut index, Hash::new(hash_bytes), pos as u64, len as u32, 0);
            pos += len as usize;
        }

        if (valid_end as u64) < contents.len() as u64 {
            log::warn!(
                "TruncateStore, {}, {}",
                contents.len() - valid_end,
                valid_end
            );
            file.set_len(valid_end as u64)?;
        }

        Ok(DiskStore {
            inner: Arc::new(Mutex::new(Inner { file, index, end: valid_end as u64 })),
        })
    }
}

impl CellStore for DiskStore {
    fn put(&self, encoding: &[u8]) -> Result<Hash> {
        let hash = Hash::compute(encoding);
        let mut inner = self.inner.lock().unwrap();
        if lookup(&inner.index, &hash, 0).is_some() {
            return Ok(hash);
        }
        let mut record = Vec::with_capacity(Hash::LENGTH + 10 + encoding.len());
        record.extend_from_slice(&hash.bytes());
        write_vlq(&mut record, encoding.len() as u64);
        let data_offset = inner.end + (record.len() as u64);
        record.extend_from_slice(encoding);

        let end = inner.end;
        inner.file.seek(SeekFrom::Start(end))?;
        inner.file.write_all(&record)?;
        inner.file.sync_data()?;
        inner.end += record.len() as u64;
        insert(&mut inner.index, hash, data_offset, encoding.len() as u32, 0);
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        let Some((offset, len)) = lookup(&inner.index, hash, 0) else {
            return Ok(None);
        };
        let mut buf = vec![0u8; len as usize];
        inner.file.seek(SeekFrom::Start(offset))?;
        inner.file.read_exact(&mut buf)?;
        Ok(Some(buf))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(lookup(&inner.index, hash, 0).is_some())
    }
}
