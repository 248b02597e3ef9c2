/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Signed envelopes over arbitrary cells.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::types::{
    crypto_primitives::{verify_signature, Keypair},
    data_types::{AccountKey, SignatureBytes},
};

use super::{encoding, reference::Ref, Cell};

/// A cell signed by a peer: the signer's public key, an Ed25519 signature over the
/// payload cell's canonical encoding, and a ref to the payload.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignedData {
    pub(crate) key: AccountKey,
    pub(crate) signature: SignatureBytes,
    pub(crate) payload: Ref,
}

impl SignedData {
    /// Sign `payload` with `keypair`. The signature covers the payload's canonical
    /// encoding, so it is well-defined for structurally equal cells.
    pub fn sign(keypair: &Keypair, payload: Cell) -> SignedData {
        let encoding = encoding::encode(&payload);
        SignedData {
            key: keypair.account_key(),
            signature: keypair.sign(&encoding),
            payload: Ref::of(payload),
        }
    }

    /// Check the signature against the signer's key, failing with `BadSignature` when
    /// it does not verify and `MissingData` when the payload is not in memory.
    pub fn verify(&self) -> Result<()> {
        let payload = self.payload.value()?;
        let encoding = encoding::encode(payload);
        if verify_signature(&self.key, &encoding, &self.signature) {
            Ok(())
        } else {
            Err(CoreError::BadSignature)
        }
    }

    pub fn key(&self) -> &AccountKey {
        &self.key
    }

    pub fn signature(&self) -> &SignatureBytes {
        &self.signature
    }

    pub fn payload(&self) -> &Ref {
        &self.payload
    }

    /// The payload cell, if resolved.
    pub fn value(&self) -> Result<Arc<Cell>> {
        self.payload.cell()
    }
}
