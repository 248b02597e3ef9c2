/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The on-disk layout of a running peer.
//!
//! A peer directory contains:
//! - `store` — the disk cell store;
//! - `belief.hash` — 32 bytes: the hash of the latest durable belief;
//! - `keypair` — the ChaCha20-Poly1305-encrypted signing key.
//!
//! On startup the peer reads `belief.hash`, resolves the belief from the store, and
//! recomputes its consensus state from genesis forward along the consensed prefix of
//! its own order.

use std::{fs, path::Path};

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use sha2::{Digest, Sha256};

use crate::cell::{Cell, Hash};
use crate::consensus::{Belief, Peer};
use crate::error::{CoreError, Result};
use crate::ledger::State;
use crate::store::{self, DiskStore};
use crate::types::crypto_primitives::{Keypair, SigningKey};

pub const STORE_FILE: &str = "store";
pub const BELIEF_HASH_FILE: &str = "belief.hash";
pub const KEYPAIR_FILE: &str = "keypair";

const NONCE_LENGTH: usize = 12;

fn cipher(passphrase: &str) -> ChaCha20Poly1305 {
    let mut hasher = Sha256::new();
    hasher.update(passphrase.as_bytes());
    let key: [u8; 32] = hasher.finalize().into();
    ChaCha20Poly1305::new(Key::from_slice(&key))
}

/// Open (or create) the peer directory's cell store.
pub fn open_store(dir: impl AsRef<Path>) -> Result<DiskStore> {
    fs::create_dir_all(dir.as_ref())?;
    DiskStore::open(dir.as_ref().join(STORE_FILE))
}

/// Encrypt `key` under `passphrase` and write it to the directory's keypair file.
pub fn save_keypair(dir: impl AsRef<Path>, key: &SigningKey, passphrase: &str) -> Result<()> {
    fs::create_dir_all(dir.as_ref())?;
    let nonce_bytes: [u8; NONCE_LENGTH] = rand::random();
    let ciphertext = cipher(passphrase)
        .encrypt(Nonce::from_slice(&nonce_bytes), key.to_bytes().as_ref())
        .map_err(|_| CoreError::InvalidData("keypair encryption failed"))?;
    let mut contents = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    contents.extend_from_slice(&nonce_bytes);
    contents.extend_from_slice(&ciphertext);
    fs::write(dir.as_ref().join(KEYPAIR_FILE), contents)?;
    Ok(())
}

/// Read and decrypt the directory's keypair file.
pub fn load_keypair(dir: impl AsRef<Path>, passphrase: &str) -> Result<Keypair> {
    let contents = fs::read(dir.as_ref().join(KEYPAIR_FILE))?;
    if contents.len() < NONCE_LENGTH {
        return Err(CoreError::BadFormat("keypair file too short"));
    }
    let (nonce_bytes, ciphertext) = contents.split_at(NONCE_LENGTH);
    let plaintext = cipher(passphrase)
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| CoreError::InvalidData("keypair decryption failed"))?;
    let key_bytes: [u8; 32] = plaintext
        .try_into()
        .map_err(|_| CoreError::BadFormat("keypair file of wrong length"))?;
    Ok(Keypair::new(SigningKey::from_bytes(&key_bytes)))
}

/// Persist `belief` into the directory's store and record its hash in
/// `belief.hash`. The hash file is written through a rename so a crash leaves either
/// the old hash or the new one, never a torn write.
pub fn save_belief(dir: impl AsRef<Path>, store: &DiskStore, belief: &Belief) -> Result<Hash> {
    let (hash, _) = store::persist_root(Cell::Belief(belief.clone()), store)?;
    let tmp = dir.as_ref().join(format!("{}.tmp", BELIEF_HASH_FILE));
    fs::write(&tmp, hash.bytes())?;
    fs::rename(tmp, dir.as_ref().join(BELIEF_HASH_FILE))?;
    Ok(hash)
}

/// Resolve the latest durable belief recorded in `belief.hash`, with its whole graph.
pub fn load_belief(dir: impl AsRef<Path>, store: &DiskStore) -> Result<Belief> {
    let contents = fs::read(dir.as_ref().join(BELIEF_HASH_FILE))?;
    let hash_bytes: [u8; 32] = contents
        .try_into()
        .map_err(|_| CoreError::BadFormat("belief hash file of wrong length"))?;
    match store::try_acquire(&Hash::new(hash_bytes), store)? {
        store::AcquireOutcome::Complete(cell) => Ok(cell.as_belief()?.clone()),
        store::AcquireOutcome::Missing(mut hashes) => {
            // A local store should never hold a belief hash without its graph.
            Err(CoreError::MissingData(hashes.remove(0)))
        }
    }
}

/// Initialize a fresh peer directory: store, encrypted keypair, and the genesis
/// belief.
pub fn init_peer_dir(
    dir: impl AsRef<Path>,
    key: SigningKey,
    genesis: State,
    passphrase: &str,
) -> Result<(Peer, DiskStore)> {
    let store = open_store(dir.as_ref())?;
    save_keypair(dir.as_ref(), &key, passphrase)?;
    let peer = Peer::create(Keypair::new(key), genesis)?;
    save_belief(dir.as_ref(), &store, peer.belief())?;
    Ok((peer, store))
}

/// Reopen a peer directory written by [`init_peer_dir`] and subsequent
/// [`save_belief`] calls. `genesis` must be the same state the directory was
/// initialized with; the consensus state is recomputed from it.
pub fn load_peer(
    dir: impl AsRef<Path>,
    passphrase: &str,
    genesis: State,
) -> Result<(Peer, DiskStore)> {
    let store = open_store(dir.as_ref())?;
    let keypair = load_keypair(dir.as_ref(), passphrase)?;
    let belief = load_belief(dir.as_ref(), &store)?;
    let peer = Peer::restore(keypair, genesis, belief)?;
    Ok((peer, store))
}
