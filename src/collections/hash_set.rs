/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent hash set: the [map](super::hash_map) trie shape without values.
//!
//! The four merge operations are expressed as one generic apply-op. At each digit
//! position the pair of children (either possibly absent) is combined using the op's
//! identity rules: union keeps either side, intersection keeps only where both are
//! present, and the two differences keep the one-sided elements of their side.

use std::sync::Arc;

use crate::cell::{tag, Cell, Ref};
use crate::error::{CoreError, Result};

use super::LEAF_MAX;

/// A merge operation over two sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOp {
    Union,
    Intersection,
    /// Elements present only in the left set.
    DiffLeft,
    /// Elements present only in the right set.
    DiffRight,
}

impl SetOp {
    fn keeps(&self, in_left: bool, in_right: bool) -> bool {
        match self {
            SetOp::Union => in_left || in_right,
            SetOp::Intersection => in_left && in_right,
            SetOp::DiffLeft => in_left && !in_right,
            SetOp::DiffRight => !in_left && in_right,
        }
    }

    /// What the op yields when the two subtrees are identical.
    fn on_equal(&self, side: &CellSet) -> CellSet {
        match self {
            SetOp::Union | SetOp::Intersection => side.clone(),
            SetOp::DiffLeft | SetOp::DiffRight => CellSet::empty(),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CellSet {
    pub(crate) node: SetNode,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum SetNode {
    Leaf { elements: Vec<Ref> },
    Tree { count: u64, shift: u8, mask: u16, children: Vec<Ref> },
}

fn index_for_digit(digit: u8, mask: u16) -> Option<usize> {
    if mask & (1 << digit) == 0 {
        None
    } else {
        Some((mask & ((1u32 << digit) as u16).wrapping_sub(1)).count_ones() as usize)
    }
}

fn as_set(r: &Ref) -> Result<CellSet> {
    match &**r.value()? {
        Cell::Set(s) => Ok(s.clone()),
        _ => Err(CoreError::InvalidData("expected a set")),
    }
}

impl CellSet {
    pub fn empty() -> CellSet {
        CellSet { node: SetNode::Leaf { elements: Vec::new() } }
    }

    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Result<CellSet> {
        let mut set = CellSet::empty();
        for cell in cells {
            set = set.include(cell)?;
        }
        Ok(set)
    }

    pub fn count(&self) -> u64 {
        match &self.node {
            SetNode::Leaf { elements } => elements.len() as u64,
            SetNode::Tree { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub(crate) fn tag(&self) -> u8 {
        match &self.node {
            SetNode::Leaf { .. } => tag::SET_LEAF,
            SetNode::Tree { .. } => tag::SET_TREE,
        }
    }

    pub fn contains(&self, cell: &Cell) -> Result<bool> {
        self.contains_ref(&Ref::of(cell.clone()))
    }

    pub fn contains_ref(&self, r: &Ref) -> Result<bool> {
        self.contains_at(0, r)
    }

    fn contains_at(&self, shift: u8, r: &Ref) -> Result<bool> {
        match &self.node {
            SetNode::Leaf { elements } => {
                Ok(elements.binary_search_by(|e| e.hash().cmp(r.hash())).is_ok())
            }
            SetNode::Tree { shift: s, mask, children, .. } => {
                debug_assert_eq!(*s, shift);
                match index_for_digit(r.hash().hex_digit(shift), *mask) {
                    None => Ok(false),
                    Some(i) => as_set(&children[i])?.contains_at(shift + 1, r),
                }
            }
        }
    }

    pub fn include(&self, cell: Cell) -> Result<CellSet> {
        self.include_ref(Ref::of(cell))
    }

    pub fn include_ref(&self, r: Ref) -> Result<CellSet> {
        self.include_at(0, r)
    }

    fn include_at(&self, shift: u8, r: Ref) -> Result<CellSet> {
        match &self.node {
            SetNode::Leaf { elements } => {
                let mut elements = elements.clone();
                match elements.binary_search_by(|e| e.hash().cmp(r.hash())) {
                    Ok(_) => Ok(self.clone()),
                    Err(i) => {
                        elements.insert(i, r);
                        if elements.len() <= LEAF_MAX {
                            Ok(CellSet { node: SetNode::Leaf { elements } })
                        } else {
                            Ok(create_tree(elements, shift))
                        }
                    }
                }
            }
            SetNode::Tree { count, shift: s, mask, children } => {
                debug_assert_eq!(*s, shift);
                let digit = r.hash().hex_digit(shift);
                let mut children = children.clone();
                match index_for_digit(digit, *mask) {
                    None => {
                        let child = CellSet { node: SetNode::Leaf { elements: vec![r] } };
                        let mask = mask | (1 << digit);
                        let i = index_for_digit(digit, mask)
                            .expect("digit was just added to the mask");
                        children.insert(i, Ref::of(Cell::Set(child)));
                        Ok(CellSet {
                            node: SetNode::Tree { count: count + 1, shift, mask, children },
                        })
                    }
                    Some(i) => {
                        let child = as_set(&children[i])?;
                        let old_count = child.count();
                        let child = child.include_at(shift + 1, r)?;
                        let count = count + child.count() - old_count;
                        children[i] = Ref::of(Cell::Set(child));
                        Ok(CellSet { node: SetNode::Tree { count, shift, mask: *mask, children } })
                    }
                }
            }
        }
    }

    pub fn exclude(&self, cell: &Cell) -> Result<CellSet> {
        self.exclude_at(0, &Ref::of(cell.clone()))
    }

    fn exclude_at(&self, shift: u8, r: &Ref) -> Result<CellSet> {
        match &self.node {
            SetNode::Leaf { elements } => {
                match elements.binary_search_by(|e| e.hash().cmp(r.hash())) {
                    Err(_) => Ok(self.clone()),
                    Ok(i) => {
                        let mut elements = elements.clone();
                        elements.remove(i);
                        Ok(CellSet { node: SetNode::Leaf { elements } })
                    }
                }
            }
            SetNode::Tree { count, shift: s, mask, children } => {
                debug_assert_eq!(*s, shift);
                let digit = r.hash().hex_digit(shift);
                let Some(i) = index_for_digit(digit, *mask) else {
                    return Ok(self.clone());
                };
                let child = as_set(&children[i])?;
                let new_child = child.exclude_at(shift + 1, r)?;
                if new_child.count() == child.count() {
                    return Ok(self.clone());
                }
                let count = count - 1;
                if count <= LEAF_MAX as u64 {
                    let mut elements = Vec::with_capacity(count as usize);
                    for (j, child_ref) in children.iter().enumerate() {
                        if j == i {
                            new_child.elements_into(&mut elements)?;
                        } else {
                            as_set(child_ref)?.elements_into(&mut elements)?;
                        }
                    }
                    elements.sort_by(|a, b| a.hash().cmp(b.hash()));
                    return Ok(CellSet { node: SetNode::Leaf { elements } });
                }
                let mut children = children.clone();
                if new_child.is_empty() {
                    children.remove(i);
                    let mask = mask & !(1 << digit);
                    Ok(CellSet { node: SetNode::Tree { count, shift, mask, children } })
                } else {
                    children[i] = Ref::of(Cell::Set(new_child));
                    Ok(CellSet { node: SetNode::Tree { count, shift, mask: *mask, children } })
                }
            }
        }
    }

    pub fn union(&self, other: &CellSet) -> Result<CellSet> {
        apply_op(self, other, SetOp::Union, 0)
    }

    pub fn intersection(&self, other: &CellSet) -> Result<CellSet> {
        apply_op(self, other, SetOp::Intersection, 0)
    }

    pub fn diff_left(&self, other: &CellSet) -> Result<CellSet> {
        apply_op(self, other, SetOp::DiffLeft, 0)
    }

    pub fn diff_right(&self, other: &CellSet) -> Result<CellSet> {
        apply_op(self, other, SetOp::DiffRight, 0)
    }

    /// All element refs, in hash order.
    pub fn elements(&self) -> Result<Vec<Ref>> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.elements_into(&mut out)?;
        Ok(out)
    }

    /// All elements as cells, in hash order.
    pub fn element_cells(&self) -> Result<Vec<Arc<Cell>>> {
        self.elements()?.iter().map(|r| r.cell()).collect()
    }

    fn elements_into(&self, out: &mut Vec<Ref>) -> Result<()> {
        match &self.node {
            SetNode::Leaf { elements } => {
                out.extend(elements.iter().cloned());
                Ok(())
            }
            SetNode::Tree { children, .. } => {
                for child in children {
                    as_set(child)?.elements_into(out)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn refs(&self) -> Vec<Ref> {
        match &self.node {
            SetNode::Leaf { elements } => elements.clone(),
            SetNode::Tree { children, .. } => children.clone(),
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&Ref) -> Result<Ref>) -> Result<CellSet> {
        Ok(match &self.node {
            SetNode::Leaf { elements } => {
                let elements = elements.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                CellSet { node: SetNode::Leaf { elements } }
            }
            SetNode::Tree { count, shift, mask, children } => {
                let children = children.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                CellSet {
                    node: SetNode::Tree { count: *count, shift: *shift, mask: *mask, children },
                }
            }
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.node {
            SetNode::Leaf { elements } => {
                if elements.len() > LEAF_MAX {
                    return Err(CoreError::InvalidData("set leaf above maximum size"));
                }
                Ok(())
            }
            SetNode::Tree { count, mask, children, .. } => {
                if *count <= LEAF_MAX as u64 {
                    return Err(CoreError::InvalidData("set tree at or below leaf size"));
                }
                if children.len() != mask.count_ones() as usize || children.is_empty() {
                    return Err(CoreError::InvalidData("set tree mask mismatch"));
                }
                Ok(())
            }
        }
    }
}

fn create_tree(elements: Vec<Ref>, shift: u8) -> CellSet {
    let count = elements.len() as u64;
    let mut buckets: Vec<Vec<Ref>> = vec![Vec::new(); 16];
    for element in elements {
        let digit = element.hash().hex_digit(shift);
        buckets[digit as usize].push(element);
    }
    let mut mask = 0u16;
    let mut children = Vec::new();
    for (digit, bucket) in buckets.into_iter().enumerate() {
        if bucket.is_empty() {
            continue;
        }
        mask |= 1 << digit;
        let child = if bucket.len() <= LEAF_MAX {
            CellSet { node: SetNode::Leaf { elements: bucket } }
        } else {
            create_tree(bucket, shift + 1)
        };
        children.push(Ref::of(Cell::Set(child)));
    }
    CellSet { node: SetNode::Tree { count, shift, mask, children } }
}

/// Combine two sets digit-bucket by digit-bucket. Identical subtrees short-circuit
/// through the op's identity rules without being walked.
fn apply_op(a: &CellSet, b: &CellSet, op: SetOp, shift: u8) -> Result<CellSet> {
    if a.node == b.node {
        return Ok(op.on_equal(a));
    }
    match (&a.node, &b.node) {
        (
            SetNode::Tree { mask: am, children: ac, .. },
            SetNode::Tree { mask: bm, children: bc, .. },
        ) => {
            let mut elements = Vec::new();
            for digit in 0..16u8 {
                let ar = index_for_digit(digit, *am).map(|i| &ac[i]);
                let br = index_for_digit(digit, *bm).map(|i| &bc[i]);
                let combined = match (ar, br) {
                    (None, None) => continue,
                    (Some(l), Some(r)) => {
                        apply_op(&as_set(l)?, &as_set(r)?, op, shift + 1)?
                    }
                    (Some(l), None) => {
                        if op.keeps(true, false) { as_set(l)? } else { CellSet::empty() }
                    }
                    (None, Some(r)) => {
                        if op.keeps(false, true) { as_set(r)? } else { CellSet::empty() }
                    }
                };
                combined.elements_into(&mut elements)?;
            }
            Ok(from_sorted_by_bucket(elements, shift))
        }
        _ => {
            // At least one side is a leaf; merge-join the sorted element lists.
            let ae = a.elements()?;
            let be = b.elements()?;
            let mut elements = Vec::new();
            let (mut i, mut j) = (0, 0);
            while i < ae.len() || j < be.len() {
                if i == ae.len() {
                    if op.keeps(false, true) {
                        elements.push(be[j].clone());
                    }
                    j += 1;
                } else if j == be.len() {
                    if op.keeps(true, false) {
                        elements.push(ae[i].clone());
                    }
                    i += 1;
                } else {
                    match ae[i].hash().cmp(be[j].hash()) {
                        std::cmp::Ordering::Less => {
                            if op.keeps(true, false) {
                                elements.push(ae[i].clone());
                            }
                            i += 1;
                        }
                        std::cmp::Ordering::Greater => {
                            if op.keeps(false, true) {
                                elements.push(be[j].clone());
                            }
                            j += 1;
                        }
                        std::cmp::Ordering::Equal => {
                            if op.keeps(true, true) {
                                elements.push(ae[i].clone());
                            }
                            i += 1;
                            j += 1;
                        }
                    }
                }
            }
            Ok(from_sorted_by_bucket(elements, shift))
        }
    }
}

/// Rebuild a canonical node at `shift` from elements already in hash order.
fn from_sorted_by_bucket(elements: Vec<Ref>, shift: u8) -> CellSet {
    if elements.len() <= LEAF_MAX {
        CellSet { node: SetNode::Leaf { elements } }
    } else {
        create_tree(elements, shift)
    }
}
