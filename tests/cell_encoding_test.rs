//! Canonical encoding properties: round trips, hash determinism, the embedding
//! boundary, and strict rejection of non-canonical bytes.

use converge_rs::{
    cell::{decode, encode, encoded_size, is_embedded, tag, Cell, Double, MAX_EMBEDDED},
    collections::{CellMap, CellSet, List, Vector},
    error::CoreError,
    ledger::{Block, Transaction, TxResult},
    types::data_types::{Address, Timestamp},
};

mod common;

use crate::common::{initial_peers, initial_state, test_keypairs, NUM_PEERS, TEST_TIMESTAMP};

fn assert_round_trip(cell: &Cell) {
    let encoding = encode(cell);
    let decoded = decode(&encoding).unwrap();
    assert_eq!(cell, &decoded, "decode(encode(x)) == x");
    assert_eq!(encoding, encode(&decoded), "encode(decode(encode(x))) == encode(x)");
    assert_eq!(cell.hash(), decoded.hash());
}

#[test]
fn round_trip_primitives() {
    assert_round_trip(&Cell::Nil);
    assert_round_trip(&Cell::Boolean(true));
    assert_round_trip(&Cell::Boolean(false));
    for v in [0i64, 1, -1, 63, 64, -64, -65, 1 << 20, -(1 << 20), i64::MAX, i64::MIN] {
        assert_round_trip(&Cell::Long(v));
    }
    for d in [0.0f64, -0.0, 1.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
        assert_round_trip(&Cell::Double(Double(d)));
    }
    assert_round_trip(&Cell::Char('a'));
    assert_round_trip(&Cell::Char('\u{1F600}'));
    assert_round_trip(&Cell::String(String::from("hello, world")));
    assert_round_trip(&Cell::String(String::new()));
    assert_round_trip(&Cell::Symbol(String::from("transfer")));
    assert_round_trip(&Cell::Keyword(String::from("balance")));
    assert_round_trip(&Cell::Blob(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    assert_round_trip(&Cell::Address(Address::new(12345)));
}

#[test]
fn round_trip_collections() {
    let empty = Vector::empty();
    assert_round_trip(&Cell::Vector(empty));

    for n in [1u64, 15, 16, 17, 32, 33, 100, 257] {
        let vector = Vector::from_cells((0..n).map(|i| Cell::Long(i as i64))).unwrap();
        assert_round_trip(&Cell::Vector(vector));
    }

    let list = List::from_cells((0..5).map(Cell::Long));
    assert_round_trip(&Cell::List(list));

    let entry = converge_rs::collections::MapEntry::new(
        converge_rs::cell::Ref::of(Cell::Keyword(String::from("stake"))),
        converge_rs::cell::Ref::of(Cell::Long(100_000)),
    );
    assert_round_trip(&Cell::MapEntry(entry));

    for n in [0i64, 1, 8, 9, 40, 200] {
        let mut map = CellMap::empty();
        for i in 0..n {
            map = map.assoc(Cell::Long(i), Cell::String(format!("value-{}", i))).unwrap();
        }
        assert_round_trip(&Cell::Map(map));
    }

    for n in [0i64, 8, 9, 100] {
        let set = CellSet::from_cells((0..n).map(Cell::Long)).unwrap();
        assert_round_trip(&Cell::Set(set));
    }
}

#[test]
fn round_trip_records() {
    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    assert_round_trip(&Cell::State(genesis.clone()));

    let transfer = Transaction::Transfer {
        origin: Address::new(0),
        sequence: 1,
        target: Address::new(8),
        amount: 100,
    };
    assert_round_trip(&Cell::Transaction(transfer.clone()));
    let schedule = Transaction::Schedule {
        origin: Address::new(1),
        sequence: 1,
        time: Timestamp::new(TEST_TIMESTAMP + 5000),
        target: Address::new(2),
        amount: 50,
    };
    assert_round_trip(&Cell::Transaction(schedule));

    let peers = initial_peers(&keypairs, &genesis);
    let signed = peers[0].sign(Cell::Transaction(transfer));
    signed.verify().unwrap();
    assert_round_trip(&Cell::Signed(signed.clone()));

    let block = Block::of(
        Timestamp::new(TEST_TIMESTAMP + 100),
        peers[0].account_key(),
        vec![signed],
    )
    .unwrap();
    assert_round_trip(&Cell::Block(block));

    assert_round_trip(&Cell::Order(peers[0].own_order().unwrap()));
    assert_round_trip(&Cell::Belief(peers[0].belief().clone()));
    assert_round_trip(&Cell::TxResult(TxResult::ok(7, Cell::Long(100))));
}

/// Structurally equal values have equal encodings and hashes no matter how they were
/// built.
#[test]
fn hash_determinism() {
    let forward = {
        let mut map = CellMap::empty();
        for i in 0..50i64 {
            map = map.assoc(Cell::Long(i), Cell::Long(i * 10)).unwrap();
        }
        map
    };
    let backward = {
        let mut map = CellMap::empty();
        for i in (0..60i64).rev() {
            map = map.assoc(Cell::Long(i), Cell::Long(i * 10)).unwrap();
        }
        for i in 50..60i64 {
            map = map.dissoc(&Cell::Long(i)).unwrap();
        }
        map
    };
    assert_eq!(forward, backward);
    assert_eq!(
        encode(&Cell::Map(forward.clone())),
        encode(&Cell::Map(backward.clone()))
    );
    assert_eq!(Cell::Map(forward).hash(), Cell::Map(backward).hash());

    let appended = Vector::from_cells((0..40).map(Cell::Long)).unwrap();
    let sliced = Vector::from_cells((0..50).map(Cell::Long))
        .unwrap()
        .slice(0, 40)
        .unwrap();
    assert_eq!(appended, sliced);
    assert_eq!(Cell::Vector(appended).hash(), Cell::Vector(sliced).hash());
}

/// `is_embedded(x)` iff `encoded_size(x) <= MAX_EMBEDDED`.
#[test]
fn embedding_boundary() {
    // A blob of 137 bytes encodes to exactly 140 bytes (tag + two length bytes).
    let at_boundary = Cell::Blob(vec![0xAB; 137]);
    assert_eq!(MAX_EMBEDDED, encoded_size(&at_boundary));
    assert!(is_embedded(&at_boundary));

    let over_boundary = Cell::Blob(vec![0xAB; 138]);
    assert_eq!(MAX_EMBEDDED + 1, encoded_size(&over_boundary));
    assert!(!is_embedded(&over_boundary));

    assert!(is_embedded(&Cell::Nil));
    assert!(is_embedded(&Cell::Long(i64::MAX)));
}

fn assert_bad_format(bytes: &[u8]) {
    match decode(bytes) {
        Err(CoreError::BadFormat(_)) => {}
        other => panic!("expected BadFormat, got {:?}", other.map(|c| c.tag())),
    }
}

#[test]
fn rejects_non_canonical_bytes() {
    // Unknown tag.
    assert_bad_format(&[0xF3]);

    // Truncated long.
    assert_bad_format(&[tag::LONG]);
    assert_bad_format(&[tag::LONG, 0x80]);

    // Non-minimal signed VLQ: a leading zero group adds nothing.
    assert_bad_format(&[tag::LONG, 0x80, 0x01]);

    // Trailing bytes after a complete cell.
    assert_bad_format(&[tag::NIL, 0x00]);

    // A map tree node whose count is at the leaf threshold. Tree nodes must hold more
    // than the leaf maximum; this is the forged form a malicious peer would send.
    assert_bad_format(&[tag::MAP_TREE, 0x08, 0x00, 0x00, 0x01]);

    // A packed vector encoded as a leaf.
    assert_bad_format(&[tag::VECTOR_LEAF, 0x20]);

    // A vector tree too small to be a tree.
    assert_bad_format(&[tag::VECTOR_TREE, 0x10]);
}
