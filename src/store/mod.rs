/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Content-addressed persistence for cells.
//!
//! A [`CellStore`] maps hashes to canonical encodings. Stores are pluggable: the
//! in-memory [`MemoryStore`] backs tests and transient peers, the on-disk
//! [`DiskStore`] backs running peers. Stores are safe for concurrent reads and
//! append-only writes; putting the same hash twice is idempotent because the bytes are
//! identical by content-addressing.
//!
//! [`persist`] writes a cell graph durably, [`resolve`] reads one cell back, and
//! [`try_acquire`] assembles a whole graph, reporting the hashes still missing so the
//! caller can fetch them from the network and retry.

pub mod disk;
pub mod memory;

pub use disk::DiskStore;
pub use memory::MemoryStore;

use std::sync::Arc;

use crate::cell::{decode, encode, Cell, Hash, Ref, RefStatus};
use crate::error::{CoreError, Result};

/// Content-addressed persistent map from hash to canonical encoding.
pub trait CellStore: Clone + Send + 'static {
    /// Store an encoding under its hash. Idempotent: putting bytes that are already
    /// present is a no-op returning the same hash.
    fn put(&self, encoding: &[u8]) -> Result<Hash>;

    /// Read the encoding stored under `hash`.
    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>>;

    /// Whether an encoding is stored under `hash`.
    fn has(&self, hash: &Hash) -> Result<bool>;
}

/// Write the cell behind `r` and every non-embedded descendant into `store`,
/// returning a ref whose graph carries [`RefStatus::Persisted`] throughout.
///
/// Children already at `Persisted` or above are not revisited: the status lattice
/// makes repeated persists of shared structure cheap.
pub fn persist<S: CellStore>(r: &Ref, store: &S) -> Result<Ref> {
    if r.status() >= RefStatus::Persisted {
        return Ok(r.clone());
    }
    let cell = if r.is_resolved() {
        r.cell()?
    } else {
        // Not in memory: it can still be walked if the store already holds it.
        match store.get(r.hash())? {
            Some(bytes) => Arc::new(decode(&bytes)?),
            None => return Err(CoreError::MissingData(*r.hash())),
        }
    };
    let new_cell = cell.update_refs(&mut |child| persist(child, store))?;
    if !r.is_embedded() {
        store.put(&encode(&new_cell))?;
    }
    Ok(r.resolved_with(Arc::new(new_cell)).with_status(RefStatus::Persisted))
}

/// Persist a top-level cell unconditionally (even if it would embed in a parent), so
/// that its hash resolves from the store. Used for beliefs and states referenced by
/// hash from the peer directory.
pub fn persist_root<S: CellStore>(cell: Cell, store: &S) -> Result<(Hash, Ref)> {
    let r = persist(&Ref::of(cell), store)?;
    let root = r.cell()?;
    let hash = store.put(&encode(&root))?;
    Ok((hash, r))
}

/// Read and decode the cell stored under `hash`.
pub fn resolve<S: CellStore>(hash: &Hash, store: &S) -> Result<Cell> {
    match store.get(hash)? {
        Some(bytes) => decode(&bytes),
        None => Err(CoreError::MissingData(*hash)),
    }
}

/// Outcome of [`try_acquire`].
pub enum AcquireOutcome {
    /// The whole graph was assembled; every ref in the returned cell is resolved.
    Complete(Cell),

    /// Some descendants are not locally available. The caller requests these hashes
    /// from the network, stores the replies, and calls `try_acquire` again.
    Missing(Vec<Hash>),
}

/// Attempt to assemble the full cell graph rooted at `hash` from `store`.
pub fn try_acquire<S: CellStore>(hash: &Hash, store: &S) -> Result<AcquireOutcome> {
    let mut missing = Vec::new();
    let root = deep_resolve(&Ref::indirect(*hash), store, &mut missing)?;
    if missing.is_empty() {
        Ok(AcquireOutcome::Complete(root.cell()?.as_ref().clone()))
    } else {
        missing.sort();
        missing.dedup();
        Ok(AcquireOutcome::Missing(missing))
    }
}

fn deep_resolve<S: CellStore>(r: &Ref, store: &S, missing: &mut Vec<Hash>) -> Result<Ref> {
    let cell = if r.is_resolved() {
        r.cell()?
    } else {
        match store.get(r.hash())? {
            Some(bytes) => Arc::new(decode(&bytes)?),
            None => {
                missing.push(*r.hash());
                return Ok(r.clone());
            }
        }
    };
    let new_cell = cell.update_refs(&mut |child| deep_resolve(child, store, missing))?;
    Ok(r.resolved_with(Arc::new(new_cell)))
}
