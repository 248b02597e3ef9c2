//! The peer directory: encrypted keypair at rest, the durable belief hash, and
//! restart recovery of the consensus state.

use std::{
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use converge_rs::{
    error::CoreError,
    peer_storage::{init_peer_dir, load_keypair, load_peer, save_belief},
};

mod common;

use crate::common::{
    initial_peers, initial_state, propose_transfer, share_beliefs, test_keypairs,
    test_signing_key, NUM_PEERS,
};

fn temp_peer_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    std::env::temp_dir().join(format!(
        "converge-peer-{}-{}-{}",
        name,
        std::process::id(),
        nanos
    ))
}

#[test]
fn keypair_round_trip_requires_passphrase() {
    let dir = temp_peer_dir("keypair");
    let keypairs = test_keypairs(1);
    let genesis = initial_state(&keypairs);
    init_peer_dir(&dir, test_signing_key(0), genesis, "hunter2").unwrap();

    let loaded = load_keypair(&dir, "hunter2").unwrap();
    assert_eq!(keypairs[0].account_key(), loaded.account_key());

    match load_keypair(&dir, "wrong") {
        Err(CoreError::InvalidData(_)) => {}
        other => panic!("expected decryption failure, got {:?}", other.map(|k| k.account_key())),
    }

    let _ = std::fs::remove_dir_all(&dir);
}

/// Run consensus to completion among nine peers, persist peer 0's belief, then reload
/// the directory and check the recomputed consensus state matches.
#[test]
fn peer_restart_recovers_state() {
    let dir = temp_peer_dir("restart");
    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);

    let (_, store) = init_peer_dir(&dir, test_signing_key(0), genesis.clone(), "s3cret").unwrap();

    // Drive a transfer through four full gossip rounds outside the directory.
    let mut peers = share_beliefs(&share_beliefs(&initial_peers(&keypairs, &genesis)));
    propose_transfer(&mut peers, 0, 1, NUM_PEERS - 1, 100);
    for _ in 0..4 {
        peers = share_beliefs(&peers);
    }
    assert_eq!(1, peers[0].consensus_point().unwrap());

    // Persist the final belief into the directory.
    save_belief(&dir, &store, peers[0].belief()).unwrap();
    drop(store);

    // Reload: same belief, and the consensus state recomputed from genesis forward.
    let (restored, _) = load_peer(&dir, "s3cret", genesis).unwrap();
    assert_eq!(peers[0].belief(), restored.belief());
    assert_eq!(1, restored.consensus_point().unwrap());
    assert_eq!(
        peers[0].get_consensus_state().hash(),
        restored.get_consensus_state().hash()
    );

    let _ = std::fs::remove_dir_all(&dir);
}
