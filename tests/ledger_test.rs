//! Block application: sequence enforcement, signer authorization, juice accounting,
//! scheduled actions, and conservation of total funds throughout.

use converge_rs::{
    cell::Cell,
    ledger::{juice, Block, Transaction, TransactionError},
    types::data_types::{Address, Timestamp},
};

mod common;

use crate::common::{initial_peers, initial_state, test_keypairs, NUM_PEERS, TEST_TIMESTAMP};

#[test]
fn transfer_moves_funds_and_charges_juice() {
    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let peers = initial_peers(&keypairs, &genesis);
    let total = genesis.compute_total_funds().unwrap();

    let transfer = Transaction::Transfer {
        origin: Address::new(0),
        sequence: 1,
        target: Address::new(3),
        amount: 2500,
    };
    let signed = peers[0].sign(Cell::Transaction(transfer));
    let block = Block::of(
        Timestamp::new(TEST_TIMESTAMP + 100),
        peers[0].account_key(),
        vec![signed],
    )
    .unwrap();

    let (state, results) = genesis.apply_block(&block).unwrap();
    assert_eq!(1, results.len());
    assert!(results[0].is_ok());

    let fee = juice::TRANSFER * genesis.juice_price().unwrap();
    assert_eq!(1_000_000 - 2500 - fee, state.balance(Address::new(0)).unwrap());
    assert_eq!(4_000_000 + 2500, state.balance(Address::new(3)).unwrap());
    assert_eq!(fee, state.fees().unwrap());
    assert_eq!(1, state.get_account(Address::new(0)).unwrap().unwrap().sequence());
    assert_eq!(Timestamp::new(TEST_TIMESTAMP + 100), state.timestamp().unwrap());

    // Conservation: the fee moved into the fees pool, nothing vanished.
    assert_eq!(total, state.compute_total_funds().unwrap());
}

#[test]
fn rejections_leave_state_untouched() {
    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let peers = initial_peers(&keypairs, &genesis);
    let total = genesis.compute_total_funds().unwrap();

    let bad_sequence = peers[0].sign(Cell::Transaction(Transaction::Transfer {
        origin: Address::new(0),
        sequence: 2, // must be 1
        target: Address::new(1),
        amount: 10,
    }));
    let bad_signer = peers[1].sign(Cell::Transaction(Transaction::Transfer {
        origin: Address::new(0), // account 0 is controlled by peer 0's key
        sequence: 1,
        target: Address::new(1),
        amount: 10,
    }));
    let overdraft = peers[2].sign(Cell::Transaction(Transaction::Transfer {
        origin: Address::new(2),
        sequence: 1,
        target: Address::new(1),
        amount: u64::MAX,
    }));
    let unknown_target = peers[3].sign(Cell::Transaction(Transaction::Transfer {
        origin: Address::new(3),
        sequence: 1,
        target: Address::new(999),
        amount: 10,
    }));

    let block = Block::of(
        Timestamp::new(TEST_TIMESTAMP + 50),
        peers[0].account_key(),
        vec![bad_sequence, bad_signer, overdraft, unknown_target],
    )
    .unwrap();
    let (state, results) = genesis.apply_block(&block).unwrap();

    assert_eq!(Some(TransactionError::BadSequence), results[0].error());
    assert_eq!(Some(TransactionError::BadSigner), results[1].error());
    assert_eq!(Some(TransactionError::InsufficientFunds), results[2].error());
    assert_eq!(Some(TransactionError::UnknownAccount), results[3].error());

    // No balances or sequences moved, and nothing was charged.
    for i in 0..NUM_PEERS as u64 {
        assert_eq!((i + 1) * 1_000_000, state.balance(Address::new(i)).unwrap());
        assert_eq!(0, state.get_account(Address::new(i)).unwrap().unwrap().sequence());
    }
    assert_eq!(0, state.fees().unwrap());
    assert_eq!(total, state.compute_total_funds().unwrap());
}

#[test]
fn scheduled_transfer_reserves_then_dispatches() {
    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let peers = initial_peers(&keypairs, &genesis);
    let total = genesis.compute_total_funds().unwrap();
    let fee = juice::SCHEDULE * genesis.juice_price().unwrap();

    let due_time = TEST_TIMESTAMP + 10_000;
    let schedule = peers[0].sign(Cell::Transaction(Transaction::Schedule {
        origin: Address::new(0),
        sequence: 1,
        time: Timestamp::new(due_time),
        target: Address::new(5),
        amount: 777,
    }));
    let block = Block::of(
        Timestamp::new(TEST_TIMESTAMP + 100),
        peers[0].account_key(),
        vec![schedule],
    )
    .unwrap();
    let (reserved, results) = genesis.apply_block(&block).unwrap();
    assert!(results[0].is_ok());

    // The amount is reserved: gone from the origin, not yet at the target.
    assert_eq!(1_000_000 - 777 - fee, reserved.balance(Address::new(0)).unwrap());
    assert_eq!(6_000_000, reserved.balance(Address::new(5)).unwrap());
    assert_eq!(1, reserved.schedule().unwrap().count());
    assert_eq!(total, reserved.compute_total_funds().unwrap());

    // A block before the due time does not dispatch.
    let early = Block::of(
        Timestamp::new(due_time - 1),
        peers[1].account_key(),
        Vec::new(),
    )
    .unwrap();
    let (still_reserved, _) = reserved.apply_block(&early).unwrap();
    assert_eq!(6_000_000, still_reserved.balance(Address::new(5)).unwrap());
    assert_eq!(1, still_reserved.schedule().unwrap().count());

    // A block at the due time dispatches the reserve to the target.
    let due = Block::of(Timestamp::new(due_time), peers[1].account_key(), Vec::new()).unwrap();
    let (dispatched, _) = still_reserved.apply_block(&due).unwrap();
    assert_eq!(6_000_777, dispatched.balance(Address::new(5)).unwrap());
    assert!(dispatched.schedule().unwrap().is_empty());
    assert_eq!(total, dispatched.compute_total_funds().unwrap());
}
