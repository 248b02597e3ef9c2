/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Persistent, immutable collections over cells.
//!
//! Every collection is itself a cell: updates return new values sharing structure with
//! the old, and equal collections have equal canonical encodings (and hashes), which is
//! what makes subtree-skipping comparisons possible.

pub mod blob_map;
pub mod hash_map;
pub mod hash_set;
pub mod list;
pub mod vector;

pub use blob_map::{u64_key, BlobMap, BlobMapEntry};
pub use hash_map::{CellMap, MapEntry};
pub use hash_set::{CellSet, SetOp};
pub use list::List;
pub use vector::Vector;

/// Elements per vector chunk.
pub const CHUNK_SIZE: usize = 16;

/// Maximum entries in a trie leaf; nodes above this threshold must be trees, nodes at
/// or below it must be leaves.
pub const LEAF_MAX: usize = 8;
