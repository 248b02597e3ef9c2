/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! A simple, volatile, in-memory implementation of [`CellStore`].

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::cell::Hash;
use crate::error::Result;

use super::CellStore;

/// An in-memory cell store. Cheap to clone; clones share the same contents.
#[derive(Clone)]
pub struct MemoryStore(Arc<Mutex<HashMap<Hash, Arc<[u8]>>>>);

impl MemoryStore {
    /// Create a new, empty `MemoryStore`.
    pub fn new() -> MemoryStore {
        MemoryStore(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Number of cells currently stored.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl CellStore for MemoryStore {
    fn put(&self, encoding: &[u8]) -> Result<Hash> {
        let hash = Hash::compute(encoding);
        self.0
            .lock()
            .unwrap()
            .entry(hash)
            .or_insert_with(|| Arc::from(encoding));
        Ok(hash)
    }

    fn get(&self, hash: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(self.0.lock().unwrap().get(hash).map(|bytes| bytes.to_vec()))
    }

    fn has(&self, hash: &Hash) -> Result<bool> {
        Ok(self.0.lock().unwrap().contains_key(hash))
    }
}
