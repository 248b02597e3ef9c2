/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent hash map: a 16-way radix trie over key hashes.
//!
//! A node holding at most [`LEAF_MAX`] entries is a flat leaf with entries sorted by
//! key hash; a node above that threshold is a tree splitting on the hex digit of the
//! key hash at its `shift` position, children in mask-bit order. Both directions of the
//! threshold are canonical: `assoc` splits a leaf that grows past the maximum, and
//! `dissoc` collapses a tree that shrinks to it.
//!
//! Subtrees whose refs compare equal by hash are skipped entirely when walking two
//! maps together; belief convergence leans on this fast path.

use std::sync::Arc;

use crate::cell::{tag, Cell, Ref};
use crate::error::{CoreError, Result};

use super::LEAF_MAX;

/// A key-value pair held in a map leaf. Also a standalone cell kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MapEntry {
    pub(crate) key: Ref,
    pub(crate) value: Ref,
}

impl MapEntry {
    pub fn new(key: Ref, value: Ref) -> MapEntry {
        MapEntry { key, value }
    }

    pub fn key(&self) -> &Ref {
        &self.key
    }

    pub fn value(&self) -> &Ref {
        &self.value
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CellMap {
    pub(crate) node: MapNode,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum MapNode {
    Leaf { entries: Vec<MapEntry> },
    Tree { count: u64, shift: u8, mask: u16, children: Vec<Ref> },
}

/// Index of the child for `digit` in a node's child array: the number of mask bits
/// below it. `None` if the digit is absent.
fn index_for_digit(digit: u8, mask: u16) -> Option<usize> {
    if mask & (1 << digit) == 0 {
        None
    } else {
        Some((mask & ((1u32 << digit) as u16).wrapping_sub(1)).count_ones() as usize)
    }
}

fn as_map(r: &Ref) -> Result<CellMap> {
    Ok(r.value()?.as_map()?.clone())
}

impl CellMap {
    pub fn empty() -> CellMap {
        CellMap { node: MapNode::Leaf { entries: Vec::new() } }
    }

    pub fn count(&self) -> u64 {
        match &self.node {
            MapNode::Leaf { entries } => entries.len() as u64,
            MapNode::Tree { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub(crate) fn tag(&self) -> u8 {
        match &self.node {
            MapNode::Leaf { .. } => tag::MAP_LEAF,
            MapNode::Tree { .. } => tag::MAP_TREE,
        }
    }

    /// Look up the value ref under `key`.
    pub fn get_ref(&self, key: &Ref) -> Result<Option<Ref>> {
        self.get_at(0, key)
    }

    /// Look up the value under a key cell.
    pub fn get(&self, key: &Cell) -> Result<Option<Arc<Cell>>> {
        match self.get_ref(&Ref::of(key.clone()))? {
            Some(value) => Ok(Some(value.cell()?)),
            None => Ok(None),
        }
    }

    pub fn contains_key(&self, key: &Cell) -> Result<bool> {
        Ok(self.get_ref(&Ref::of(key.clone()))?.is_some())
    }

    fn get_at(&self, shift: u8, key: &Ref) -> Result<Option<Ref>> {
        match &self.node {
            MapNode::Leaf { entries } => {
                Ok(entries
                    .binary_search_by(|e| e.key.hash().cmp(key.hash()))
                    .ok()
                    .map(|i| entries[i].value.clone()))
            }
            MapNode::Tree { shift: s, mask, children, .. } => {
                debug_assert_eq!(*s, shift);
                match index_for_digit(key.hash().hex_digit(shift), *mask) {
                    None => Ok(None),
                    Some(i) => as_map(&children[i])?.get_at(shift + 1, key),
                }
            }
        }
    }

    /// Associate `value` under `key`, returning the updated map.
    pub fn assoc(&self, key: Cell, value: Cell) -> Result<CellMap> {
        self.assoc_ref(Ref::of(key), Ref::of(value))
    }

    pub fn assoc_ref(&self, key: Ref, value: Ref) -> Result<CellMap> {
        self.assoc_at(0, key, value)
    }

    fn assoc_at(&self, shift: u8, key: Ref, value: Ref) -> Result<CellMap> {
        match &self.node {
            MapNode::Leaf { entries } => {
                let mut entries = entries.clone();
                match entries.binary_search_by(|e| e.key.hash().cmp(key.hash())) {
                    Ok(i) => {
                        entries[i] = MapEntry { key, value };
                        Ok(CellMap { node: MapNode::Leaf { entries } })
                    }
                    Err(i) => {
                        entries.insert(i, MapEntry { key, value });
                        if entries.len() <= LEAF_MAX {
                            Ok(CellMap { node: MapNode::Leaf { entries } })
                        } else {
                            Ok(create_tree(entries, shift))
                        }
                    }
                }
            }
            MapNode::Tree { count, shift: s, mask, children } => {
                debug_assert_eq!(*s, shift);
                let digit = key.hash().hex_digit(shift);
                let mut children = children.clone();
                match index_for_digit(digit, *mask) {
                    None => {
                        let child = CellMap {
                            node: MapNode::Leaf { entries: vec![MapEntry { key, value }] },
                        };
                        let mask = mask | (1 << digit);
                        let i = index_for_digit(digit, mask)
                            .expect("digit was just added to the mask");
                        children.insert(i, Ref::of(Cell::Map(child)));
                        Ok(CellMap {
                            node: MapNode::Tree { count: count + 1, shift, mask, children },
                        })
                    }
                    Some(i) => {
                        let child = as_map(&children[i])?;
                        let old_count = child.count();
                        let child = child.assoc_at(shift + 1, key, value)?;
                        let count = count + child.count() - old_count;
                        children[i] = Ref::of(Cell::Map(child));
                        Ok(CellMap { node: MapNode::Tree { count, shift, mask: *mask, children } })
                    }
                }
            }
        }
    }

    /// Remove `key`, returning the updated map. Removing an absent key is a no-op.
    pub fn dissoc(&self, key: &Cell) -> Result<CellMap> {
        self.dissoc_ref(&Ref::of(key.clone()))
    }

    pub fn dissoc_ref(&self, key: &Ref) -> Result<CellMap> {
        self.dissoc_at(0, key)
    }

    fn dissoc_at(&self, shift: u8, key: &Ref) -> Result<CellMap> {
        match &self.node {
            MapNode::Leaf { entries } => {
                match entries.binary_search_by(|e| e.key.hash().cmp(key.hash())) {
                    Err(_) => Ok(self.clone()),
                    Ok(i) => {
                        let mut entries = entries.clone();
                        entries.remove(i);
                        Ok(CellMap { node: MapNode::Leaf { entries } })
                    }
                }
            }
            MapNode::Tree { count, shift: s, mask, children } => {
                debug_assert_eq!(*s, shift);
                let digit = key.hash().hex_digit(shift);
                let Some(i) = index_for_digit(digit, *mask) else {
                    return Ok(self.clone());
                };
                let child = as_map(&children[i])?;
                let new_child = child.dissoc_at(shift + 1, key)?;
                if new_child.count() == child.count() {
                    return Ok(self.clone());
                }
                let count = count - 1;
                if count <= LEAF_MAX as u64 {
                    // Shrunk to leaf size: collapse the whole node.
                    let mut entries = Vec::with_capacity(count as usize);
                    for (j, child_ref) in children.iter().enumerate() {
                        if j == i {
                            new_child.entries_into(&mut entries)?;
                        } else {
                            as_map(child_ref)?.entries_into(&mut entries)?;
                        }
                    }
                    entries.sort_by(|a, b| a.key.hash().cmp(b.key.hash()));
                    return Ok(CellMap { node: MapNode::Leaf { entries } });
                }
                let mut children = children.clone();
                if new_child.is_empty() {
                    children.remove(i);
                    let mask = mask & !(1 << digit);
                    Ok(CellMap { node: MapNode::Tree { count, shift, mask, children } })
                } else {
                    children[i] = Ref::of(Cell::Map(new_child));
                    Ok(CellMap { node: MapNode::Tree { count, shift, mask: *mask, children } })
                }
            }
        }
    }

    /// All entries, in key-hash order.
    pub fn entries(&self) -> Result<Vec<MapEntry>> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.entries_into(&mut out)?;
        Ok(out)
    }

    fn entries_into(&self, out: &mut Vec<MapEntry>) -> Result<()> {
        match &self.node {
            MapNode::Leaf { entries } => {
                out.extend(entries.iter().cloned());
                Ok(())
            }
            MapNode::Tree { children, .. } => {
                for child in children {
                    as_map(child)?.entries_into(out)?;
                }
                Ok(())
            }
        }
    }

    /// Walk the keys on which `self` and `other` disagree, calling `f` with the key
    /// ref and the value refs on each side (`None` = absent). Subtrees with equal
    /// hashes are skipped without being visited.
    pub fn for_each_difference(
        &self,
        other: &CellMap,
        f: &mut dyn FnMut(&Ref, Option<&Ref>, Option<&Ref>) -> Result<()>,
    ) -> Result<()> {
        diff_nodes(self, other, f)
    }

    /// Merge `other` into `self`: for every key on which the two maps disagree, `f`
    /// picks the surviving value ref (`None` removes the key). Keys on which the maps
    /// agree are untouched, and shared subtrees are never walked.
    pub fn merge_differences(
        &self,
        other: &CellMap,
        f: &mut dyn FnMut(&Ref, Option<&Ref>, Option<&Ref>) -> Result<Option<Ref>>,
    ) -> Result<CellMap> {
        let mut out = self.clone();
        let mut updates: Vec<(Ref, Option<Ref>)> = Vec::new();
        diff_nodes(self, other, &mut |key, left, right| {
            updates.push((key.clone(), f(key, left, right)?));
            Ok(())
        })?;
        for (key, value) in updates {
            out = match value {
                Some(value) => out.assoc_ref(key, value)?,
                None => out.dissoc_ref(&key)?,
            };
        }
        Ok(out)
    }

    pub(crate) fn refs(&self) -> Vec<Ref> {
        match &self.node {
            MapNode::Leaf { entries } => {
                let mut refs = Vec::with_capacity(entries.len() * 2);
                for entry in entries {
                    refs.push(entry.key.clone());
                    refs.push(entry.value.clone());
                }
                refs
            }
            MapNode::Tree { children, .. } => children.clone(),
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&Ref) -> Result<Ref>) -> Result<CellMap> {
        Ok(match &self.node {
            MapNode::Leaf { entries } => {
                let entries = entries
                    .iter()
                    .map(|e| {
                        Ok(MapEntry { key: f(&e.key)?, value: f(&e.value)? })
                    })
                    .collect::<Result<Vec<_>>>()?;
                CellMap { node: MapNode::Leaf { entries } }
            }
            MapNode::Tree { count, shift, mask, children } => {
                let children = children.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                CellMap {
                    node: MapNode::Tree { count: *count, shift: *shift, mask: *mask, children },
                }
            }
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.node {
            MapNode::Leaf { entries } => {
                if entries.len() > LEAF_MAX {
                    return Err(CoreError::InvalidData("map leaf above maximum size"));
                }
                Ok(())
            }
            MapNode::Tree { count, mask, children, .. } => {
                if *count <= LEAF_MAX as u64 {
                    return Err(CoreError::InvalidData("map tree at or below leaf size"));
                }
                if children.len() != mask.count_ones() as usize || children.is_empty() {
                    return Err(CoreError::InvalidData("map tree mask mismatch"));
                }
                Ok(())
            }
        }
    }
}

/// Build a tree node from more than `LEAF_MAX` entries, splitting on the digit at
/// `shift`. `entries` must be sorted by key hash.
fn create_tree(entries: Vec<MapEntry>, shift: u8) -> CellMap {
    let count = entries.len() as u64;
    let mut buckets: Vec<Vec<MapEntry>> = vec![Vec::new(); 16];
    for entry in entries {
        let digit = entry.key.hash().hex_digit(shift);
        buckets[digit as usize].push(entry);
    }
    let mut mask = 0u16;
    let mut children = Vec::new();
    for (digit, bucket) in buckets.into_iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        mask |= 1 << digit;
        let child = if bucket.len() <= LEAF_MAX {
            CellMap { node: MapNode::Leaf { entries: bucket } }
        } else {
            create_tree(bucket, shift + 1)
        };
        children.push(Ref::of(Cell::Map(child)));
    }
    CellMap { node: MapNode::Tree { count, shift, mask, children } }
}

fn diff_nodes(
    a: &CellMap,
    b: &CellMap,
    f: &mut dyn FnMut(&Ref, Option<&Ref>, Option<&Ref>) -> Result<()>,
) -> Result<()> {
    if a.node == b.node {
        return Ok(());
    }
    match (&a.node, &b.node) {
        (MapNode::Leaf { entries: ae }, MapNode::Leaf { entries: be }) => {
            diff_sorted(ae, be, f)
        }
        (
            MapNode::Tree { mask: am, children: ac, .. },
            MapNode::Tree { mask: bm, children: bc, .. },
        ) => {
            for digit in 0..16u8 {
                let ar = index_for_digit(digit, *am).map(|i| &ac[i]);
                let br = index_for_digit(digit, *bm).map(|i| &bc[i]);
                match (ar, br) {
                    (None, None) => {}
                    (a_child, b_child) => {
                        if a_child == b_child {
                            continue;
                        }
                        let a_map = match a_child {
                            Some(r) => as_map(r)?,
                            None => CellMap::empty(),
                        };
                        let b_map = match b_child {
                            Some(r) => as_map(r)?,
                            None => CellMap::empty(),
                        };
                        diff_nodes(&a_map, &b_map, f)?;
                    }
                }
            }
            Ok(())
        }
        _ => {
            // Mixed leaf/tree shapes at the same position: fall back to comparing the
            // full entry lists. At least one side is leaf-sized.
            let ae = a.entries()?;
            let be = b.entries()?;
            diff_sorted(&ae, &be, f)
        }
    }
}

/// Merge-join two entry lists sorted by key hash, reporting disagreeing keys.
fn diff_sorted(
    a: &[MapEntry],
    b: &[MapEntry],
    f: &mut dyn FnMut(&Ref, Option<&Ref>, Option<&Ref>) -> Result<()>,
) -> Result<()> {
    let (mut i, mut j) = (0, 0);
    while i < a.len() || j < b.len() {
        if i == a.len() {
            f(&b[j].key, None, Some(&b[j].value))?;
            j += 1;
        } else if j == b.len() {
            f(&a[i].key, Some(&a[i].value), None)?;
            i += 1;
        } else {
            match a[i].key.hash().cmp(b[j].key.hash()) {
                std::cmp::Ordering::Less => {
                    f(&a[i].key, Some(&a[i].value), None)?;
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    f(&b[j].key, None, Some(&b[j].value))?;
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    if a[i].value != b[j].value {
                        f(&a[i].key, Some(&a[i].value), Some(&b[j].value))?;
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
    }
    Ok(())
}
