//! Belief-merge convergence over full gossip rounds: one proposed block reaching
//! consensus, and one block from every peer reaching consensus, with balances and
//! total funds checked at the end.

use log::LevelFilter;

use converge_rs::{
    consensus::Peer,
    ledger::{juice, Block, State},
    types::data_types::{Address, Timestamp},
};

mod common;

use crate::common::{
    all_beliefs_equal, initial_peers, initial_state, propose_transfer, share_beliefs,
    test_keypairs, NUM_PEERS, TEST_TIMESTAMP,
};
use crate::common::logging::setup_logger;

#[test]
fn basic_merge() {
    setup_logger(LevelFilter::Warn);

    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let p0 = Peer::create(keypairs[0].clone(), genesis.clone()).unwrap();
    let p1 = Peer::create(keypairs[1].clone(), genesis.clone()).unwrap();
    // No knowledge of other peer chains yet.
    assert_ne!(p0.belief(), p1.belief());

    let pm0 = p0.merge_beliefs(&[p1.belief().clone()]).unwrap();
    assert_eq!(p0.own_order().unwrap(), pm0.own_order().unwrap());

    // Propose a new block by peer 1, after 200ms.
    let p1 = p1.update_timestamp(Timestamp::new(p1.timestamp().millis() + 200));
    assert_eq!(0, p1.own_order().unwrap().block_count().unwrap());
    let block = Block::of(
        Timestamp::new(TEST_TIMESTAMP + 200),
        p1.account_key(),
        Vec::new(),
    )
    .unwrap();
    let p1a = p1.propose_block(block).unwrap();
    assert_eq!(1, p1a.own_order().unwrap().block_count().unwrap());

    // Merge the updated belief; the new proposed block should be included.
    let pm2 = p0.merge_beliefs(&[p1a.belief().clone()]).unwrap();
    assert_eq!(
        p1a.own_order().unwrap().blocks().unwrap(),
        pm2.own_order().unwrap().blocks().unwrap()
    );
}

/// A single transfer from the first peer to the last propagates to consensus on every
/// peer in four full gossip rounds: adopt, propose, confirm, disseminate.
#[test]
fn single_block_consensus() {
    setup_logger(LevelFilter::Warn);

    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let total_value = genesis.compute_total_funds().unwrap();
    let bs0 = initial_peers(&keypairs, &genesis);
    assert_ne!(bs0[0].belief(), bs0[1].belief()); // only have own beliefs
    for peer in &bs0 {
        peer.belief().validate().unwrap();
    }

    let bs1 = share_beliefs(&bs0); // sync all beliefs
    assert!(all_beliefs_equal(&bs1));

    let bs2 = share_beliefs(&bs1); // sync again, should be idempotent
    assert_eq!(bs1[0].belief(), bs2[0].belief());
    assert!(all_beliefs_equal(&bs2));

    const PROPOSER: usize = 0;
    const RECEIVER: usize = NUM_PEERS - 1;
    let proposer_address = Address::new(PROPOSER as u64);
    let receiver_address = Address::new(RECEIVER as u64);
    let proposer_key = bs2[PROPOSER].account_key();
    let receiver_key = bs2[RECEIVER].account_key();
    let initial_balance_proposer = genesis.balance(proposer_address).unwrap();
    let initial_balance_receiver = genesis.balance(receiver_address).unwrap();
    const TRANSFER_AMOUNT: u64 = 100;
    let transfer_juice = juice::TRANSFER * genesis.juice_price().unwrap();

    // Note 1 = first sequence number required.
    let mut bs3 = bs2;
    propose_transfer(&mut bs3, PROPOSER, 1, RECEIVER, TRANSFER_AMOUNT);
    assert_eq!(1, order_of(&bs3[PROPOSER], &proposer_key).block_count().unwrap());
    assert_eq!(0, order_of(&bs3[RECEIVER], &proposer_key).block_count().unwrap());

    // New block should win the vote for all peers, but not achieve enough support for
    // proposed consensus yet.
    let bs4 = share_beliefs(&bs3);
    assert_eq!(1, order_of(&bs4[PROPOSER], &proposer_key).block_count().unwrap());
    assert_eq!(1, order_of(&bs4[RECEIVER], &receiver_key).block_count().unwrap());
    // The proposer can't see the block in the receiver's chain yet.
    assert_eq!(0, order_of(&bs4[PROPOSER], &receiver_key).block_count().unwrap());
    assert_eq!(0, order_of(&bs4[PROPOSER], &proposer_key).proposal_point());
    assert_eq!(0, order_of(&bs4[RECEIVER], &receiver_key).proposal_point());

    // All peers should propose new consensus after seeing a majority for the block.
    let bs5 = share_beliefs(&bs4);
    assert_eq!(1, order_of(&bs5[PROPOSER], &proposer_key).proposal_point());
    assert_eq!(1, order_of(&bs5[RECEIVER], &receiver_key).proposal_point());
    assert_eq!(0, order_of(&bs5[PROPOSER], &proposer_key).consensus_point());
    assert_eq!(0, order_of(&bs5[RECEIVER], &receiver_key).consensus_point());

    // All peers should confirm consensus after seeing proposals from the others.
    let bs6 = share_beliefs(&bs5);
    assert_eq!(1, order_of(&bs6[PROPOSER], &proposer_key).consensus_point());
    assert_eq!(1, order_of(&bs6[RECEIVER], &receiver_key).consensus_point());
    assert_eq!(0, order_of(&bs6[PROPOSER], &receiver_key).consensus_point());

    // Confirmations get shared in the fourth round.
    let bs7 = share_beliefs(&bs6);
    assert_eq!(1, order_of(&bs7[PROPOSER], &receiver_key).consensus_point());

    // Final state checks.
    assert!(all_beliefs_equal(&bs7));
    let final_state = bs7[0].get_consensus_state();
    assert_eq!(
        initial_balance_proposer - TRANSFER_AMOUNT - transfer_juice,
        final_state.balance(proposer_address).unwrap()
    );
    assert_eq!(
        initial_balance_receiver + TRANSFER_AMOUNT,
        final_state.balance(receiver_address).unwrap()
    );

    // Matter cannot be created or destroyed.
    assert_eq!(total_value, final_state.compute_total_funds().unwrap());
}

/// Every peer proposes one transfer to its mirror peer; after four full gossip rounds
/// all nine blocks are consensed everywhere and every account has sequence 1.
#[test]
fn multi_block_consensus() {
    setup_logger(LevelFilter::Warn);

    let keypairs = test_keypairs(NUM_PEERS);
    let genesis = initial_state(&keypairs);
    let total_value = genesis.compute_total_funds().unwrap();
    let bs0 = initial_peers(&keypairs, &genesis);
    assert!(!all_beliefs_equal(&bs0));

    let bs1 = share_beliefs(&bs0);
    assert!(all_beliefs_equal(&bs1));
    let bs2 = share_beliefs(&bs1);
    assert_eq!(bs1[0].belief(), bs2[0].belief());

    const PROPOSER: usize = 0;
    const RECEIVER: usize = NUM_PEERS - 1;
    let proposer_address = Address::new(PROPOSER as u64);
    let receiver_address = Address::new(RECEIVER as u64);
    let proposer_key = bs2[PROPOSER].account_key();
    let receiver_key = bs2[RECEIVER].account_key();
    let initial_balance_proposer = genesis.balance(proposer_address).unwrap();
    let initial_balance_receiver = genesis.balance(receiver_address).unwrap();
    let transfer_juice = juice::TRANSFER * genesis.juice_price().unwrap();

    let mut bs3 = bs2;
    for i in 0..NUM_PEERS {
        propose_transfer(&mut bs3, i, 1, NUM_PEERS - 1 - i, 100);
    }
    assert_eq!(1, order_of(&bs3[PROPOSER], &proposer_key).block_count().unwrap());
    assert_eq!(1, order_of(&bs3[RECEIVER], &receiver_key).block_count().unwrap());
    assert_eq!(0, order_of(&bs3[RECEIVER], &proposer_key).block_count().unwrap());

    // Each peer sees the others' chains and votes for the same blocks plus its own.
    let bs4 = share_beliefs(&bs3);
    assert_eq!(
        NUM_PEERS as u64,
        order_of(&bs4[PROPOSER], &proposer_key).block_count().unwrap()
    );
    assert_eq!(
        NUM_PEERS as u64,
        order_of(&bs4[RECEIVER], &receiver_key).block_count().unwrap()
    );
    // The proposer can only see the first block from the receiver.
    assert_eq!(1, order_of(&bs4[PROPOSER], &receiver_key).block_count().unwrap());
    assert_eq!(0, order_of(&bs4[PROPOSER], &proposer_key).proposal_point());

    let bs5 = share_beliefs(&bs4);
    let bs6 = share_beliefs(&bs5);
    let bs7 = share_beliefs(&bs6);
    assert_eq!(
        NUM_PEERS as u64,
        order_of(&bs7[PROPOSER], &receiver_key).consensus_point()
    );

    // Final state checks: one applied transaction for each account.
    assert!(all_beliefs_equal(&bs7));
    let final_state: &State = bs7[0].get_consensus_state();
    assert_eq!(
        1,
        final_state.get_account(proposer_address).unwrap().unwrap().sequence()
    );
    assert_eq!(
        1,
        final_state.get_account(receiver_address).unwrap().unwrap().sequence()
    );
    assert_eq!(
        initial_balance_proposer - transfer_juice,
        final_state.balance(proposer_address).unwrap()
    );
    assert_eq!(
        initial_balance_receiver - transfer_juice,
        final_state.balance(receiver_address).unwrap()
    );

    // Law of conservation of funds.
    assert_eq!(total_value, final_state.compute_total_funds().unwrap());
}

fn order_of(peer: &Peer, key: &converge_rs::types::data_types::AccountKey) -> converge_rs::Order {
    peer.get_order(key).unwrap().expect("order present for peer key")
}
