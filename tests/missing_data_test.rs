//! Missing-data recovery: a peer resolves a state by hash from another peer's store,
//! fetching missing cells batch by batch until the full graph is assembled.

use converge_rs::{
    cell::{Cell, Ref, RefStatus},
    error::CoreError,
    store::{self, AcquireOutcome, CellStore, MemoryStore},
};

mod common;

use crate::common::{initial_state, test_keypairs};

/// Persisting writes every non-embedded descendant and raises the whole ref graph to
/// `Persisted`; re-persisting shared structure is a no-op.
#[test]
fn persist_raises_status_and_stores_descendants() {
    let keypairs = test_keypairs(64);
    let state = initial_state(&keypairs);
    let store = MemoryStore::new();

    let r = Ref::of(Cell::State(state.clone()));
    assert_eq!(RefStatus::Unknown, r.status());
    let persisted = store::persist(&r, &store).unwrap();
    assert_eq!(RefStatus::Persisted, persisted.status());
    assert_eq!(r.hash(), persisted.hash());

    // The accounts chunks are non-embedded descendants; they must resolve by hash.
    let accounts = Cell::Vector(state.accounts().unwrap());
    let mut non_embedded = 0;
    for chunk in accounts.refs() {
        if !chunk.is_embedded() {
            non_embedded += 1;
            assert!(store.has(chunk.hash()).unwrap());
        }
    }
    assert!(non_embedded > 0);

    // Idempotent by status: persisting the persisted ref again changes nothing.
    let before = store.len();
    store::persist(&persisted, &store).unwrap();
    assert_eq!(before, store.len());
}

/// Peer A requests a state by hash from peer B. Half of the graph is missing locally;
/// A issues missing-data requests until the value resolves, and the final hash matches
/// the requested one.
#[test]
fn missing_data_recovery() {
    let keypairs = test_keypairs(64);
    let state = initial_state(&keypairs);
    let state_hash = state.hash();

    // Peer B holds the full graph.
    let remote = MemoryStore::new();
    let (remote_hash, _) = store::persist_root(Cell::State(state.clone()), &remote).unwrap();
    assert_eq!(state_hash, remote_hash);

    // Peer A starts with nothing.
    let local = MemoryStore::new();
    match store::resolve(&state_hash, &local) {
        Err(CoreError::MissingData(hash)) => assert_eq!(state_hash, hash),
        _ => panic!("expected MissingData from an empty store"),
    }

    let mut fetch_rounds = 0;
    let acquired = loop {
        match store::try_acquire(&state_hash, &local).unwrap() {
            AcquireOutcome::Complete(cell) => break cell,
            AcquireOutcome::Missing(hashes) => {
                assert!(!hashes.is_empty());
                fetch_rounds += 1;
                assert!(fetch_rounds < 100, "acquire did not make progress");
                // "Send" a missing-data request per hash and store B's replies.
                for hash in hashes {
                    let bytes = remote.get(&hash).unwrap().expect("peer B has the full graph");
                    local.put(&bytes).unwrap();
                }
            }
        }
    };

    // The recovery took more than one round trip: the graph is deeper than one level.
    assert!(fetch_rounds > 1);
    assert_eq!(state_hash, acquired.hash());
    assert_eq!(Cell::State(state), acquired);

    // The reassembled state is fully usable.
    let reassembled = acquired.as_state().unwrap();
    assert_eq!(
        state_hash,
        reassembled.hash()
    );
    assert_eq!(64, reassembled.accounts().unwrap().count());
}
