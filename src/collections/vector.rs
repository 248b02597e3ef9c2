/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent vector: an immutable ordered sequence of cells, chunked into leaves
//! of up to [`CHUNK_SIZE`] elements and a tree of full chunks.
//!
//! Canonical forms, which decoding enforces and every operation preserves:
//! - `count <= 16`: a leaf holding all elements, no prefix.
//! - `count > 16` and divisible by 16 ("packed"): a tree whose children are all full
//!   except possibly the last, which is itself packed.
//! - otherwise: a leaf of the `count % 16` tail elements over a packed prefix.
//!
//! Indexed access and chunk append are O(log n); element append and pop are O(1)
//! amortized at the tail. Because equal subtrees have equal refs, comparing vectors
//! can skip whole shared chunks, which `common_prefix_length` exploits.

use std::sync::Arc;

use crate::cell::{tag, Cell, Ref};
use crate::error::{CoreError, Result};

use super::CHUNK_SIZE;

const CHUNK: u64 = CHUNK_SIZE as u64;

/// Size of each non-final child of a packed tree with `count` elements: the largest
/// power of sixteen strictly below `count`.
pub(crate) fn tree_child_size(count: u64) -> u64 {
    let mut size = CHUNK;
    while size * CHUNK < count {
        size *= CHUNK;
    }
    size
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Vector {
    pub(crate) node: VectorNode,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub(crate) enum VectorNode {
    Leaf {
        count: u64,
        /// Packed vector of `count - items.len()` elements; present iff `count > 16`.
        prefix: Option<Ref>,
        items: Vec<Ref>,
    },
    Tree {
        count: u64,
        children: Vec<Ref>,
    },
}

fn as_vector(r: &Ref) -> Result<Vector> {
    Ok(r.value()?.as_vector()?.clone())
}

impl Vector {
    pub fn empty() -> Vector {
        Vector { node: VectorNode::Leaf { count: 0, prefix: None, items: Vec::new() } }
    }

    /// Build a vector from cells, in order.
    pub fn from_cells(cells: impl IntoIterator<Item = Cell>) -> Result<Vector> {
        let mut v = Vector::empty();
        for cell in cells {
            v = v.append(cell)?;
        }
        Ok(v)
    }

    pub fn count(&self) -> u64 {
        match &self.node {
            VectorNode::Leaf { count, .. } => *count,
            VectorNode::Tree { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Whether the vector is a whole number of full chunks.
    pub fn is_packed(&self) -> bool {
        self.count() % CHUNK == 0
    }

    pub(crate) fn tag(&self) -> u8 {
        match &self.node {
            VectorNode::Leaf { .. } => tag::VECTOR_LEAF,
            VectorNode::Tree { .. } => tag::VECTOR_TREE,
        }
    }

    /// The ref of the element at index `i`.
    pub fn element_ref(&self, i: u64) -> Result<Ref> {
        if i >= self.count() {
            return Err(CoreError::InvalidData("vector index out of bounds"));
        }
        match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                let prefix_count = *count - items.len() as u64;
                if i < prefix_count {
                    // prefix is Some whenever prefix_count > 0
                    let prefix = prefix.as_ref().expect("leaf with elements below the tail has a prefix");
                    as_vector(prefix)?.element_ref(i)
                } else {
                    Ok(items[(i - prefix_count) as usize].clone())
                }
            }
            VectorNode::Tree { count, children } => {
                let child_size = tree_child_size(*count);
                let child_index = (i / child_size) as usize;
                as_vector(&children[child_index])?.element_ref(i % child_size)
            }
        }
    }

    /// The element at index `i`.
    pub fn get(&self, i: u64) -> Result<Arc<Cell>> {
        self.element_ref(i)?.cell()
    }

    /// Replace the element at index `i`, path-copying down to it.
    pub fn assoc(&self, i: u64, cell: Cell) -> Result<Vector> {
        self.assoc_ref(i, Ref::of(cell))
    }

    pub fn assoc_ref(&self, i: u64, r: Ref) -> Result<Vector> {
        if i >= self.count() {
            return Err(CoreError::InvalidData("vector index out of bounds"));
        }
        match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                let prefix_count = *count - items.len() as u64;
                if i < prefix_count {
                    let prefix = prefix.as_ref().expect("leaf with elements below the tail has a prefix");
                    let new_prefix = as_vector(prefix)?.assoc_ref(i, r)?;
                    Ok(Vector {
                        node: VectorNode::Leaf {
                            count: *count,
                            prefix: Some(Ref::of(Cell::Vector(new_prefix))),
                            items: items.clone(),
                        },
                    })
                } else {
                    let mut items = items.clone();
                    items[(i - prefix_count) as usize] = r;
                    Ok(Vector {
                        node: VectorNode::Leaf { count: *count, prefix: prefix.clone(), items },
                    })
                }
            }
            VectorNode::Tree { count, children } => {
                let child_size = tree_child_size(*count);
                let child_index = (i / child_size) as usize;
                let new_child = as_vector(&children[child_index])?.assoc_ref(i % child_size, r)?;
                let mut children = children.clone();
                children[child_index] = Ref::of(Cell::Vector(new_child));
                Ok(Vector { node: VectorNode::Tree { count: *count, children } })
            }
        }
    }

    /// Append a cell at the tail.
    pub fn append(&self, cell: Cell) -> Result<Vector> {
        self.append_ref(Ref::of(cell))
    }

    /// Append a ref at the tail.
    pub fn append_ref(&self, r: Ref) -> Result<Vector> {
        match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                if *count < CHUNK {
                    let mut items = items.clone();
                    items.push(r);
                    Ok(Vector { node: VectorNode::Leaf { count: count + 1, prefix: None, items } })
                } else if *count == CHUNK {
                    // The full chunk becomes the packed prefix of a new tail.
                    Ok(Vector {
                        node: VectorNode::Leaf {
                            count: count + 1,
                            prefix: Some(Ref::of(Cell::Vector(self.clone()))),
                            items: vec![r],
                        },
                    })
                } else if items.len() + 1 < CHUNK_SIZE {
                    let mut items = items.clone();
                    items.push(r);
                    Ok(Vector {
                        node: VectorNode::Leaf { count: count + 1, prefix: prefix.clone(), items },
                    })
                } else {
                    // Tail fills up: merge it into the packed prefix.
                    let prefix = prefix.as_ref().expect("leaf with count > 16 has a prefix");
                    let mut chunk = items.clone();
                    chunk.push(r);
                    append_chunk(&as_vector(prefix)?, chunk)
                }
            }
            VectorNode::Tree { count, .. } => Ok(Vector {
                node: VectorNode::Leaf {
                    count: count + 1,
                    prefix: Some(Ref::of(Cell::Vector(self.clone()))),
                    items: vec![r],
                },
            }),
        }
    }

    /// Remove the last element, returning the shorter vector and the removed ref.
    pub fn pop(&self) -> Result<Option<(Vector, Ref)>> {
        match &self.node {
            VectorNode::Leaf { count: 0, .. } => Ok(None),
            VectorNode::Leaf { count, prefix, items } => {
                if items.len() > 1 || *count <= CHUNK {
                    let mut items = items.clone();
                    let popped = items.pop().expect("non-empty leaf has tail items");
                    let prefix = if *count - 1 <= CHUNK { None } else { prefix.clone() };
                    Ok(Some((
                        Vector { node: VectorNode::Leaf { count: count - 1, prefix, items } },
                        popped,
                    )))
                } else {
                    // The tail had a single element; the result is the packed prefix.
                    let prefix = prefix.as_ref().expect("leaf with count > 16 has a prefix");
                    Ok(Some((as_vector(prefix)?, items[0].clone())))
                }
            }
            VectorNode::Tree { count, .. } => {
                let (rest, mut chunk) = split_last_chunk(self)?;
                let popped = chunk.pop().expect("chunks hold sixteen elements");
                let prefix = if *count - 1 <= CHUNK { None } else { Some(Ref::of(Cell::Vector(rest))) };
                Ok(Some((
                    Vector { node: VectorNode::Leaf { count: count - 1, prefix, items: chunk } },
                    popped,
                )))
            }
        }
    }

    /// Rebuild the subsequence `[start, start + len)` as a fresh vector.
    pub fn slice(&self, start: u64, len: u64) -> Result<Vector> {
        if start + len > self.count() {
            return Err(CoreError::InvalidData("vector slice out of bounds"));
        }
        let mut out = Vector::empty();
        for i in start..start + len {
            out = out.append_ref(self.element_ref(i)?)?;
        }
        Ok(out)
    }

    /// Number of leading elements `self` and `other` agree on.
    ///
    /// When two aligned chunks have the same hash their sixteen elements are skipped
    /// without being compared individually; this is what makes comparing largely-equal
    /// block orders cheap.
    pub fn common_prefix_length(&self, other: &Vector) -> Result<u64> {
        let limit = self.count().min(other.count());
        let mut n = 0;
        while n < limit {
            if n % CHUNK == 0 && n + CHUNK <= limit {
                if let (Some(a), Some(b)) = (self.chunk_ref(n / CHUNK)?, other.chunk_ref(n / CHUNK)?)
                {
                    if a == b {
                        n += CHUNK;
                        continue;
                    }
                }
            }
            if self.element_ref(n)? == other.element_ref(n)? {
                n += 1;
            } else {
                break;
            }
        }
        Ok(n)
    }

    /// The ref of the full chunk covering elements `[16c, 16c + 16)`, if that range
    /// lies wholly within the packed portion of the vector.
    fn chunk_ref(&self, c: u64) -> Result<Option<Ref>> {
        match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                let prefix_count = *count - items.len() as u64;
                if (c + 1) * CHUNK <= prefix_count {
                    let prefix = prefix.as_ref().expect("leaf with elements below the tail has a prefix");
                    as_vector(prefix)?.chunk_ref(c)
                } else if *count == CHUNK && c == 0 {
                    // A full chunk leaf is its own chunk, but has no standalone ref here.
                    Ok(None)
                } else {
                    Ok(None)
                }
            }
            VectorNode::Tree { count, children } => {
                let child_size = tree_child_size(*count);
                let child_index = ((c * CHUNK) / child_size) as usize;
                if child_size == CHUNK {
                    Ok(Some(children[child_index].clone()))
                } else {
                    as_vector(&children[child_index])?
                        .chunk_ref(c - child_index as u64 * (child_size / CHUNK))
                }
            }
        }
    }

    /// All element refs, in order.
    pub fn element_refs(&self) -> Result<Vec<Ref>> {
        let mut out = Vec::with_capacity(self.count() as usize);
        self.collect_refs(&mut out)?;
        Ok(out)
    }

    fn collect_refs(&self, out: &mut Vec<Ref>) -> Result<()> {
        match &self.node {
            VectorNode::Leaf { prefix, items, .. } => {
                if let Some(prefix) = prefix {
                    as_vector(prefix)?.collect_refs(out)?;
                }
                out.extend(items.iter().cloned());
                Ok(())
            }
            VectorNode::Tree { children, .. } => {
                for child in children {
                    as_vector(child)?.collect_refs(out)?;
                }
                Ok(())
            }
        }
    }

    pub(crate) fn refs(&self) -> Vec<Ref> {
        match &self.node {
            VectorNode::Leaf { prefix, items, .. } => {
                let mut refs: Vec<Ref> = Vec::with_capacity(items.len() + 1);
                if let Some(prefix) = prefix {
                    refs.push(prefix.clone());
                }
                refs.extend(items.iter().cloned());
                refs
            }
            VectorNode::Tree { children, .. } => children.clone(),
        }
    }

    pub(crate) fn update_refs(&self, f: &mut dyn FnMut(&Ref) -> Result<Ref>) -> Result<Vector> {
        Ok(match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                let prefix = match prefix {
                    Some(p) => Some(f(p)?),
                    None => None,
                };
                let items = items.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                Vector { node: VectorNode::Leaf { count: *count, prefix, items } }
            }
            VectorNode::Tree { count, children } => {
                let children = children.iter().map(|r| f(r)).collect::<Result<Vec<_>>>()?;
                Vector { node: VectorNode::Tree { count: *count, children } }
            }
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match &self.node {
            VectorNode::Leaf { count, prefix, items } => {
                if *count <= CHUNK {
                    if prefix.is_some() || items.len() as u64 != *count {
                        return Err(CoreError::InvalidData("malformed vector leaf"));
                    }
                } else {
                    let tail = *count % CHUNK;
                    if tail == 0 || prefix.is_none() || items.len() as u64 != tail {
                        return Err(CoreError::InvalidData("malformed vector leaf"));
                    }
                }
                Ok(())
            }
            VectorNode::Tree { count, children } => {
                if *count <= CHUNK || *count % CHUNK != 0 {
                    return Err(CoreError::InvalidData("malformed vector tree"));
                }
                let child_size = tree_child_size(*count);
                let expected = ((*count + child_size - 1) / child_size) as usize;
                if children.len() != expected || children.len() < 2 {
                    return Err(CoreError::InvalidData("vector tree child count mismatch"));
                }
                Ok(())
            }
        }
    }
}

/// Append a full chunk of sixteen refs to a packed vector.
fn append_chunk(packed: &Vector, chunk: Vec<Ref>) -> Result<Vector> {
    debug_assert_eq!(chunk.len(), CHUNK_SIZE);
    let chunk_leaf = || Vector {
        node: VectorNode::Leaf { count: CHUNK, prefix: None, items: chunk.clone() },
    };
    match &packed.node {
        VectorNode::Leaf { count: 0, .. } => Ok(chunk_leaf()),
        VectorNode::Leaf { count, .. } => {
            // A packed leaf is exactly one full chunk.
            debug_assert_eq!(*count, CHUNK);
            Ok(Vector {
                node: VectorNode::Tree {
                    count: count + CHUNK,
                    children: vec![
                        Ref::of(Cell::Vector(packed.clone())),
                        Ref::of(Cell::Vector(chunk_leaf())),
                    ],
                },
            })
        }
        VectorNode::Tree { count, children } => {
            let child_size = tree_child_size(*count);
            let capacity = child_size * CHUNK;
            if *count == capacity {
                // Full at this level: grow a new root.
                return Ok(Vector {
                    node: VectorNode::Tree {
                        count: count + CHUNK,
                        children: vec![
                            Ref::of(Cell::Vector(packed.clone())),
                            Ref::of(Cell::Vector(chunk_leaf())),
                        ],
                    },
                });
            }
            let n = children.len();
            let last_size = *count - (n as u64 - 1) * child_size;
            let mut children = children.clone();
            if last_size == child_size {
                children.push(Ref::of(Cell::Vector(chunk_leaf())));
            } else {
                let new_last = append_chunk(&as_vector(&children[n - 1])?, chunk)?;
                children[n - 1] = Ref::of(Cell::Vector(new_last));
            }
            Ok(Vector { node: VectorNode::Tree { count: count + CHUNK, children } })
        }
    }
}

/// Split the last full chunk off a packed vector, returning the remainder and the
/// chunk's sixteen refs.
fn split_last_chunk(packed: &Vector) -> Result<(Vector, Vec<Ref>)> {
    match &packed.node {
        VectorNode::Leaf { items, .. } => {
            // A packed leaf is exactly one full chunk.
            Ok((Vector::empty(), items.clone()))
        }
        VectorNode::Tree { count, children } => {
            let child_size = tree_child_size(*count);
            let n = children.len();
            let last_size = *count - (n as u64 - 1) * child_size;
            let last = as_vector(&children[n - 1])?;
            if last_size == CHUNK {
                let chunk = match &last.node {
                    VectorNode::Leaf { items, .. } => items.clone(),
                    VectorNode::Tree { .. } => {
                        return Err(CoreError::InvalidData("packed chunk is not a leaf"))
                    }
                };
                if n == 2 {
                    // Trees hold at least two children; unwrap the survivor.
                    Ok((as_vector(&children[0])?, chunk))
                } else {
                    let children = children[..n - 1].to_vec();
                    Ok((
                        Vector { node: VectorNode::Tree { count: count - CHUNK, children } },
                        chunk,
                    ))
                }
            } else {
                let (rest_last, chunk) = split_last_chunk(&last)?;
                let mut children = children.clone();
                children[n - 1] = Ref::of(Cell::Vector(rest_last));
                Ok((
                    Vector { node: VectorNode::Tree { count: count - CHUNK, children } },
                    chunk,
                ))
            }
        }
    }
}
