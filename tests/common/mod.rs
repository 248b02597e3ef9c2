//! Shared fixtures for the integration tests: deterministic keypairs, the standard
//! nine-peer genesis state, and belief-sharing helpers.

#![allow(dead_code)]

pub(crate) mod logging;
pub(crate) mod network;

use rand::{rngs::StdRng, Rng};

use converge_rs::{
    cell::Cell,
    collections::{BlobMap, Vector},
    consensus::{Belief, Peer},
    ledger::{AccountStatus, Block, PeerStatus, State, Transaction},
    types::{
        crypto_primitives::{Keypair, SigningKey},
        data_types::{Address, Stake, Timestamp},
    },
};

pub(crate) const NUM_PEERS: usize = 9;

pub(crate) const TEST_TIMESTAMP: i64 = 1_000_000_000;

/// A deterministic signing key for test peer `i`, so that runs are reproducible.
pub(crate) fn test_signing_key(i: usize) -> SigningKey {
    let mut bytes = [0u8; 32];
    for (j, byte) in bytes.iter_mut().enumerate() {
        *byte = (i as u8)
            .wrapping_mul(17)
            .wrapping_add((j as u8).wrapping_mul(31))
            .wrapping_add(7);
    }
    SigningKey::from_bytes(&bytes)
}

pub(crate) fn test_keypairs(n: usize) -> Vec<Keypair> {
    (0..n).map(|i| Keypair::new(test_signing_key(i))).collect()
}

/// The standard genesis: peer `i` controls account `i` with balance
/// `(i + 1) * 1_000_000` and stake `(i + 1) * 100_000`; juice price 1.
pub(crate) fn initial_state(keypairs: &[Keypair]) -> State {
    let mut accounts = Vector::empty();
    let mut peers = Vec::new();
    for (i, keypair) in keypairs.iter().enumerate() {
        let key = keypair.account_key();
        accounts = accounts
            .append(Cell::AccountStatus(AccountStatus::create(
                (i as u64 + 1) * 1_000_000,
                key,
            )))
            .unwrap();
        peers.push((
            key,
            PeerStatus::create(Address::new(i as u64), Stake::new((i as u64 + 1) * 100_000)),
        ));
    }
    let globals = State::genesis_globals(Timestamp::new(TEST_TIMESTAMP), 1).unwrap();
    State::create(accounts, State::peer_map(peers).unwrap(), globals, BlobMap::empty())
}

pub(crate) fn initial_peers(keypairs: &[Keypair], genesis: &State) -> Vec<Peer> {
    keypairs
        .iter()
        .map(|keypair| Peer::create(keypair.clone(), genesis.clone()).unwrap())
        .collect()
}

/// One full-gossip round: every peer merges every peer's current belief.
pub(crate) fn share_beliefs(peers: &[Peer]) -> Vec<Peer> {
    let beliefs: Vec<Belief> = peers.iter().map(|p| p.belief().clone()).collect();
    peers.iter().map(|p| p.merge_beliefs(&beliefs).unwrap()).collect()
}

/// One partial-gossip round: every peer merges `fanout` randomly drawn beliefs.
pub(crate) fn share_gossip(peers: &[Peer], fanout: usize, rng: &mut StdRng) -> Vec<Peer> {
    let beliefs: Vec<Belief> = peers.iter().map(|p| p.belief().clone()).collect();
    peers
        .iter()
        .map(|p| {
            let sources: Vec<Belief> = (0..fanout)
                .map(|_| beliefs[rng.gen_range(0..peers.len())].clone())
                .collect();
            p.merge_beliefs(&sources).unwrap()
        })
        .collect()
}

pub(crate) fn all_beliefs_equal(peers: &[Peer]) -> bool {
    peers.windows(2).all(|pair| pair[0].belief() == pair[1].belief())
}

/// Have peer `i` propose a block of one transfer, in the same shape the original
/// network uses: block timestamp `peer time + i + 100`, first sequence number 1.
pub(crate) fn propose_transfer(
    peers: &mut [Peer],
    i: usize,
    sequence: u64,
    target: usize,
    amount: u64,
) {
    let next = {
        let peer = &peers[i];
        let transaction = Transaction::Transfer {
            origin: Address::new(i as u64),
            sequence,
            target: Address::new(target as u64),
            amount,
        };
        let signed = peer.sign(Cell::Transaction(transaction));
        let timestamp = Timestamp::new(peer.timestamp().millis() + i as i64 + 100);
        let block = Block::of(timestamp, peer.account_key(), vec![signed]).unwrap();
        peer.propose_block(block).unwrap()
    };
    peers[i] = next;
}
