//! Convergence under partial gossip: ninety blocks across nine peers, four random
//! gossip partners per round.

use log::LevelFilter;
use rand::{rngs::StdRng, SeedableRng};

use converge_rs::types::data_types::Address;

mod common;

use crate::common::{
    all_beliefs_equal, initial_peers, initial_state, propose_transfer, share_beliefs,
    share_gossip, test_keypairs, NUM_PEERS,
};
use crate::common::logging::setup_logger;

const NUM_INITIAL_TRANS: usize = 10;
const GOSSIP_NUM: usize = 4;
const MAX_ROUNDS: usize = 40;

#[test]
fn gossip_consensus() {
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

    let transfer_juice =
        converge_rs::ledger::juice::TRANSFER * genesis.juice_price().unwrap();
    let expected_blocks = (NUM_PEERS * NUM_INITIAL_TRANS) as u64;

    // Each peer proposes ten sequenced transfers to its mirror peer, one block each.
    let mut peers = bs2;
    for i in 0..NUM_PEERS {
        for sequence in 1..=NUM_INITIAL_TRANS as u64 {
            propose_transfer(&mut peers, i, sequence, NUM_PEERS - 1 - i, 100);
        }
    }
    assert_eq!(
        NUM_INITIAL_TRANS as u64,
        peers[0].own_order().unwrap().block_count().unwrap()
    );

    // Gossip rounds with a fixed seed, each peer merging four random beliefs. Both
    // cut points must be non-decreasing on every peer across every round.
    let mut rng = StdRng::seed_from_u64(107_701);
    let mut previous_points = vec![(0u64, 0u64); NUM_PEERS];
    let mut converged_at = None;
    for round in 1..=MAX_ROUNDS {
        peers = share_gossip(&peers, GOSSIP_NUM, &mut rng);
        for (peer, (prev_proposal, prev_consensus)) in peers.iter().zip(&mut previous_points) {
            let order = peer.own_order().unwrap();
            assert!(order.proposal_point() >= *prev_proposal);
            assert!(order.consensus_point() >= *prev_consensus);
            *prev_proposal = order.proposal_point();
            *prev_consensus = order.consensus_point();
        }
        let all_consensed = peers
            .iter()
            .all(|p| p.consensus_point().unwrap() == expected_blocks);
        if all_consensed && all_beliefs_equal(&peers) {
            converged_at = Some(round);
            break;
        }
    }
    let converged_at = converged_at.expect("gossip did not converge within the round bound");
    log::info!("GossipConverged, {}", converged_at);

    // Every block is consensed on every peer and all beliefs are equal.
    for peer in &peers {
        assert_eq!(expected_blocks, peer.consensus_point().unwrap());
    }
    assert!(all_beliefs_equal(&peers));

    // No block occurs twice in the final chain.
    let final_chain = peers[0].own_order().unwrap().blocks().unwrap();
    let mut hashes = std::collections::HashSet::new();
    for r in final_chain.element_refs().unwrap() {
        assert!(hashes.insert(*r.hash()));
    }
    assert_eq!(expected_blocks as usize, hashes.len());

    // Every account applied all ten of its transactions.
    let final_state = peers[0].get_consensus_state();
    for i in 0..NUM_PEERS {
        let account = final_state
            .get_account(Address::new(i as u64))
            .unwrap()
            .unwrap();
        assert_eq!(NUM_INITIAL_TRANS as u64, account.sequence());
        assert_eq!(
            (i as u64 + 1) * 1_000_000 - NUM_INITIAL_TRANS as u64 * transfer_juice,
            account.balance()
        );
    }

    // 100% of value still exists.
    assert_eq!(total_value, final_state.compute_total_funds().unwrap());
}
