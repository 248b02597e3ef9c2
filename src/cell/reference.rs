/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Child references between cells.
//!
//! A [`Ref`] is *embedded* when the referenced cell's canonical encoding is at most
//! [`MAX_EMBEDDED`](crate::cell::encoding::MAX_EMBEDDED) bytes, in which case the
//! encoding is inlined into the parent's encoding. Otherwise the ref is *indirect* and
//! the parent encodes only the tag byte and the child's hash.
//!
//! An indirect ref may or may not currently hold the referenced value in memory. A ref
//! without a value resolves through a [store](crate::store); a failed resolution
//! surfaces as `MissingData`, which callers recover from by fetching the hash from the
//! network.

use std::sync::Arc;

use crate::error::{CoreError, Result};

use super::{
    encoding::{self, MAX_EMBEDDED},
    hash::Hash,
    Cell,
};

/// How far a ref has progressed towards durability. Levels form a monotone lattice:
/// a ref's status never moves backwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefStatus {
    /// Nothing is known about the referenced cell's persistence.
    Unknown,

    /// The referenced cell itself is in the local store.
    Stored,

    /// The referenced cell and all of its descendants are in the local store.
    Persisted,

    /// The referenced cell has additionally been announced to the network.
    Announced,
}

/// A reference to a cell: either embedded (carrying the value) or indirect (carrying
/// the hash, and the value only if it has been resolved).
#[derive(Clone)]
pub struct Ref {
    hash: Hash,
    value: Option<Arc<Cell>>,
    embedded: bool,
    status: RefStatus,
}

impl Ref {
    /// Create a ref to an in-memory cell, choosing embedded or indirect representation
    /// from the size of the cell's canonical encoding.
    pub fn of(cell: Cell) -> Ref {
        let enc = encoding::encode(&cell);
        Ref {
            hash: Hash::compute(&enc),
            embedded: enc.len() <= MAX_EMBEDDED,
            value: Some(Arc::new(cell)),
            status: RefStatus::Unknown,
        }
    }

    /// Create a ref from a cell whose canonical encoding is already at hand, avoiding a
    /// re-encode. `encoding` must be exactly `encode(&cell)`.
    pub(crate) fn from_parts(cell: Cell, encoding: &[u8]) -> Ref {
        Ref {
            hash: Hash::compute(encoding),
            embedded: encoding.len() <= MAX_EMBEDDED,
            value: Some(Arc::new(cell)),
            status: RefStatus::Unknown,
        }
    }

    /// Create an unresolved indirect ref from a bare hash.
    pub fn indirect(hash: Hash) -> Ref {
        Ref {
            hash,
            value: None,
            embedded: false,
            status: RefStatus::Unknown,
        }
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }

    pub fn status(&self) -> RefStatus {
        self.status
    }

    /// Raise the ref's status. Lowering is a no-op: the lattice is monotone.
    pub fn with_status(mut self, status: RefStatus) -> Ref {
        if status > self.status {
            self.status = status;
        }
        self
    }

    /// Get the referenced cell, failing with `MissingData` if the value is not in
    /// memory. The caller may then fetch the hash and retry.
    pub fn value(&self) -> Result<&Arc<Cell>> {
        self.value.as_ref().ok_or(CoreError::MissingData(self.hash))
    }

    /// Like [`value`](Self::value), but cloning the shared pointer.
    pub fn cell(&self) -> Result<Arc<Cell>> {
        self.value().cloned()
    }

    /// A copy of this ref carrying `cell` as its resolved value. `cell` must hash to
    /// this ref's hash; this is the resolution step after a store read.
    pub(crate) fn resolved_with(&self, cell: Arc<Cell>) -> Ref {
        Ref {
            hash: self.hash,
            value: Some(cell),
            embedded: self.embedded,
            status: if self.status < RefStatus::Stored {
                RefStatus::Stored
            } else {
                self.status
            },
        }
    }
}

impl PartialEq for Ref {
    /// Refs compare equal iff their hashes do; by content-addressing this coincides
    /// with structural equality of the referenced cells.
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Ref {}

impl std::fmt::Debug for Ref {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ref({}, {}, {:?})",
            self.hash,
            if self.embedded { "embedded" } else { "indirect" },
            self.status
        )
    }
}
