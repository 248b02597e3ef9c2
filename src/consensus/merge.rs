/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The belief-merge algorithm.
//!
//! A merge is a pure function of the peer's own belief, the received beliefs, and the
//! consensus state (which supplies the stake weights). It proceeds in the following
//! steps:
//!
//! 1. Combine the orders maps, retaining per peer the signed order with the largest
//!    timestamp that verifies and does not regress its consensus point.
//! 2. Select the winning chain: the longest block prefix backed by a strict majority
//!    (`> 1/2`) of total stake, found by greedy descent of the prefix tree.
//! 3. Adopt the winner as the own chain unless that would cut below the own consensus
//!    point, then append every novel block observed in any retained order, in
//!    timestamp order.
//! 4. Advance the proposal point to the longest own-chain prefix backed by a strict
//!    supermajority (`> 2/3`) of stake, and the consensus point to the longest prefix
//!    that a supermajority has itself proposed at or beyond. Both cut points are
//!    monotone.
//! 5. Re-sign the own order if (and only if) its content changed, and assemble the new
//!    belief.
//!
//! Dropped entries (bad signatures, malformed cells, regressing consensus points) never
//! abort the merge. A `MissingData` failure does: the caller fetches and retries.

use std::collections::{HashMap, HashSet};

use crate::cell::{Cell, Hash, Ref, SignedData};
use crate::collections::{CellMap, Vector};
use crate::error::{CoreError, Result};
use crate::ledger::State;
use crate::types::{
    crypto_primitives::Keypair,
    data_types::{AccountKey, Timestamp, TotalStake},
};

use super::{
    belief::{decode_entry, Belief, OrderEntry},
    order::Order,
};

pub(crate) struct MergeOutcome {
    pub(crate) belief: Belief,
    pub(crate) own_order: Order,
    pub(crate) previous_consensus_point: u64,
    pub(crate) consensus_point: u64,
}

/// Prefix-agreement of one retained order with the (new) own chain, used for cut-point
/// advancement.
struct Support {
    own: bool,
    common_prefix: u64,
    proposal_point: u64,
    stake: u128,
}

pub(crate) fn merge_beliefs(
    keypair: &Keypair,
    own_belief: &Belief,
    received: &[Belief],
    state: &State,
    peer_timestamp: Timestamp,
) -> Result<MergeOutcome> {
    let self_key = keypair.account_key();

    // 1. Combine orders maps.
    let mut orders = own_belief.orders()?;
    for belief in received {
        orders = combine_orders(&orders, &belief.orders()?)?;
    }

    let mut entries = Vec::new();
    for entry in orders.entries()? {
        entries.push(decode_entry(entry.key(), entry.value())?);
    }
    let own_entry = entries
        .iter()
        .find(|e| e.key == self_key)
        .cloned()
        .ok_or(CoreError::InvalidData("own order missing from belief"))?;
    let prev_consensus_point = own_entry.order.consensus_point();

    // Stake is snapshotted from the consensus state at merge entry.
    let stakes: HashMap<AccountKey, u128> = state
        .peers_with_stakes()?
        .into_iter()
        .map(|(key, stake)| (key, stake.int() as u128))
        .collect();
    let total = state.total_stake()?;

    // Participation check: without a majority of stake behind the retained orders, no
    // cut point moves this round. Chain adoption and novel-block collection still
    // happen, so blocks spread even through sparsely connected gossip.
    let mut known: u128 = 0;
    for entry in &entries {
        if let Some(stake) = stakes.get(&entry.key) {
            known += stake;
        }
    }
    let advance_cut_points = TotalStake::new(known).is_majority_of(total);

    // 2. Winning chain selection.
    let own_chain = own_entry.order.blocks()?;
    let winner = winning_chain(&entries, &stakes, total)?;

    // 3. Own-order update: adopt the winner (consensus is final: never cut below the
    // own consensus point), then append novel blocks.
    let mut new_chain = if own_chain.common_prefix_length(&winner)? < prev_consensus_point {
        own_chain.clone()
    } else {
        winner
    };
    let mut seen: HashSet<Hash> =
        new_chain.element_refs()?.iter().map(|r| *r.hash()).collect();
    let mut novel: Vec<(i64, Ref)> = Vec::new();
    for entry in &entries {
        let chain = entry.order.blocks()?;
        let agreed = chain.common_prefix_length(&new_chain)?;
        for i in agreed..chain.count() {
            let r = chain.element_ref(i)?;
            if seen.insert(*r.hash()) {
                let timestamp = r.value()?.as_block()?.timestamp().millis();
                novel.push((timestamp, r));
            }
        }
    }
    // The sort must be stable: same-timestamp blocks from one source chain keep their
    // chain order (a peer's sequenced transactions depend on it), and sources are
    // already walked in canonical map order, so the result is deterministic.
    novel.sort_by_key(|(timestamp, _)| *timestamp);
    for (_, r) in novel {
        new_chain = new_chain.append_ref(r)?;
    }

    // 4. Cut-point advancement.
    let length = new_chain.count();
    let old_proposal_point = own_entry.order.proposal_point();
    let mut supports = Vec::with_capacity(entries.len());
    for entry in &entries {
        let Some(stake) = stakes.get(&entry.key).copied() else { continue };
        if entry.key == self_key {
            supports.push(Support {
                own: true,
                common_prefix: length,
                proposal_point: 0,
                stake,
            });
        } else {
            let chain = entry.order.blocks()?;
            supports.push(Support {
                own: false,
                common_prefix: chain.common_prefix_length(&new_chain)?,
                proposal_point: entry.order.proposal_point(),
                stake,
            });
        }
    }

    let mut new_proposal_point = old_proposal_point.min(length);
    let mut new_consensus_point = prev_consensus_point;
    if advance_cut_points {
        for l in (0..=length).rev() {
            let backing: u128 =
                supports.iter().filter(|s| s.common_prefix >= l).map(|s| s.stake).sum();
            if TotalStake::new(backing).is_supermajority_of(total) {
                new_proposal_point = new_proposal_point.max(l);
                break;
            }
        }
        for support in supports.iter_mut().filter(|s| s.own) {
            support.proposal_point = new_proposal_point;
        }

        for l in (0..=new_proposal_point).rev() {
            let backing: u128 = supports
                .iter()
                .filter(|s| s.common_prefix >= l && s.proposal_point >= l)
                .map(|s| s.stake)
                .sum();
            if TotalStake::new(backing).is_supermajority_of(total) {
                new_consensus_point = new_consensus_point.max(l);
                break;
            }
        }
    }

    // 5. Re-sign when, and only when, the own order changed: merging identical
    // beliefs must be idempotent.
    let new_blocks_ref = Ref::of(Cell::Vector(new_chain));
    let content_changed = new_blocks_ref != *own_entry.order.blocks_ref()
        || new_proposal_point != old_proposal_point
        || new_consensus_point != prev_consensus_point;
    let (own_order, orders) = if content_changed {
        let timestamp = peer_timestamp.max(own_entry.order.timestamp().next());
        let order = Order {
            blocks: new_blocks_ref,
            proposal_point: new_proposal_point,
            consensus_point: new_consensus_point,
            timestamp,
        };
        let signed = SignedData::sign(keypair, Cell::Order(order.clone()));
        let orders = orders.assoc(Cell::AccountKey(self_key), Cell::Signed(signed))?;
        (order, orders)
    } else {
        (own_entry.order.clone(), orders)
    };

    Ok(MergeOutcome {
        belief: rebuild_belief(&orders)?,
        own_order,
        previous_consensus_point: prev_consensus_point,
        consensus_point: new_consensus_point,
    })
}

/// Merge `other`'s entries into `ours`. Per key, the signed order with the larger
/// timestamp wins, provided it verifies and does not regress the consensus point
/// previously observed from that key. Offending entries are dropped silently; shared
/// subtrees of the two maps are skipped by hash.
fn combine_orders(ours: &CellMap, other: &CellMap) -> Result<CellMap> {
    ours.merge_differences(other, &mut |key_ref, mine, theirs| {
        let Some(theirs) = theirs else {
            return Ok(mine.cloned());
        };
        let candidate = match decode_entry(key_ref, theirs) {
            Ok(entry) => entry,
            Err(CoreError::MissingData(hash)) => return Err(CoreError::MissingData(hash)),
            Err(_) => {
                log::debug!("DropOrder, malformed entry");
                return Ok(mine.cloned());
            }
        };
        if candidate.signed.verify().is_err() {
            log::debug!("DropOrder, bad signature");
            return Ok(mine.cloned());
        }
        if candidate.order.validate().is_err() {
            log::debug!("DropOrder, invalid order");
            return Ok(mine.cloned());
        }
        match mine {
            None => Ok(Some(theirs.clone())),
            Some(current_ref) => {
                let current = decode_entry(key_ref, current_ref)?;
                if candidate.order.timestamp() > current.order.timestamp()
                    && candidate.order.consensus_point() >= current.order.consensus_point()
                {
                    Ok(Some(theirs.clone()))
                } else {
                    Ok(Some(current_ref.clone()))
                }
            }
        }
    })
}

/// Greedy majority descent of the block-prefix tree.
///
/// Each staked peer votes its stake for its own chain. Starting from the empty prefix,
/// the descent repeatedly groups the surviving chains by their block at the current
/// position and follows the branch holding a strict majority of *total* stake,
/// breaking ties towards the smaller block hash. The winner is the prefix where no
/// majority branch remains.
fn winning_chain(
    entries: &[OrderEntry],
    stakes: &HashMap<AccountKey, u128>,
    total: TotalStake,
) -> Result<Vector> {
    let mut by_chain: HashMap<Hash, (Vector, u128)> = HashMap::new();
    for entry in entries {
        let Some(stake) = stakes.get(&entry.key).copied() else { continue };
        if stake == 0 {
            continue;
        }
        let chain_hash = *entry.order.blocks_ref().hash();
        match by_chain.get_mut(&chain_hash) {
            Some((_, backing)) => *backing += stake,
            None => {
                by_chain.insert(chain_hash, (entry.order.blocks()?, stake));
            }
        }
    }
    let mut active: Vec<(Vector, u128)> = by_chain.into_values().collect();

    let mut level: u64 = 0;
    loop {
        let mut branches: HashMap<Hash, u128> = HashMap::new();
        for (chain, stake) in &active {
            if chain.count() > level {
                *branches.entry(*chain.element_ref(level)?.hash()).or_insert(0) += *stake;
            }
        }
        let Some((best_hash, best_stake)) = branches
            .into_iter()
            .min_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
        else {
            break;
        };
        if !TotalStake::new(best_stake).is_majority_of(total) {
            break;
        }
        level += 1;
        let mut survivors = Vec::with_capacity(active.len());
        for (chain, stake) in active {
            if chain.count() >= level && *chain.element_ref(level - 1)?.hash() == best_hash {
                survivors.push((chain, stake));
            }
        }
        active = survivors;
    }

    let base = active
        .iter()
        .map(|(chain, _)| chain)
        .find(|chain| chain.count() >= level);
    match base {
        None => Ok(Vector::empty()),
        Some(chain) if chain.count() == level => Ok(chain.clone()),
        Some(chain) => chain.slice(0, level),
    }
}

/// A belief over `orders` stamped with the largest order timestamp, so that
/// reassembling an unchanged map yields an identical belief.
fn rebuild_belief(orders: &CellMap) -> Result<Belief> {
    let mut timestamp = Timestamp::new(0);
    for entry in orders.entries()? {
        let decoded = decode_entry(entry.key(), entry.value())?;
        timestamp = timestamp.max(decoded.order.timestamp());
    }
    Ok(Belief::create(orders.clone(), timestamp))
}
