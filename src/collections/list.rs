/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent list: a small sequential cell used where front-insertion order
//! matters. Not chunked; large ordered collections use [`Vector`](super::vector).

use std::sync::Arc;

use crate::cell::{Cell, Ref};
use crate::error::{CoreError, Result};

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct List {
    pub(crate) items: Vec<Ref>,
}

impl List {
    pub fn empty() -> List {
        List { items: Vec::new() }
    }

    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> List {
        List { items: cells.into_iter().map(Ref::of).collect() }
    }

    pub fn count(&self) -> u64 {
        self.items.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: u64) -> Result<Arc<Cell>> {
        self.items
            .get(i as usize)
            .ok_or(CoreError::InvalidData("list index out of bounds"))?
            .cell()
    }

    /// A new list with `cell` at the front.
    pub fn cons(&self, cell: Cell) -> List {
        let mut items = Vec::with_capacity(self.items.len() + 1);
        items.push(Ref::of(cell));
        items.extend(self.items.iter().cloned());
        List { items }
    }
}
