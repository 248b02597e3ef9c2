/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that [start](PeerRuntime::start) a peer runtime, as well as
//! [the type](PeerRuntime) which keeps it alive.
//!
//! Each peer is owned by exactly one thread. The thread drains incoming messages,
//! batches submitted transactions into blocks, merges received beliefs, answers data
//! and status requests, and broadcasts the peer's belief whenever it changes. The
//! merge itself is a pure function; everything stateful lives in this loop.
//!
//! Read access from other threads goes through a [`PeerCamera`], which the loop
//! refreshes after every change.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::cell::{Cell, Hash, SignedData};
use crate::config::{Configuration, UserHandlers};
use crate::consensus::{Belief, Peer};
use crate::error::Result;
use crate::event_bus::{start_event_bus, EventHandlers, HandlerPair};
use crate::events::*;
use crate::ledger::{State, TxResult};
use crate::networking::{Message, Network};
use crate::store::{self, CellStore};
use crate::types::{
    crypto_primitives::Keypair,
    data_types::{AccountKey, MessageId, Timestamp},
};

/// A read-only view of the peer owned by the runtime thread.
#[derive(Clone)]
pub struct PeerView {
    pub belief: Belief,
    pub consensus_state: State,
    pub consensus_point: u64,
}

/// Handle for reading the peer's current view from any thread.
#[derive(Clone)]
pub struct PeerCamera {
    shared: Arc<Mutex<PeerView>>,
}

impl PeerCamera {
    pub fn view(&self) -> PeerView {
        self.shared.lock().unwrap().clone()
    }

    pub fn consensus_point(&self) -> u64 {
        self.shared.lock().unwrap().consensus_point
    }
}

/// Keeps the runtime's threads alive; dropping it shuts them down and joins them.
pub struct PeerRuntime {
    camera: PeerCamera,
    account_key: AccountKey,
    transactions: Sender<SignedData>,
    main: Option<JoinHandle<()>>,
    main_shutdown: Sender<()>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Sender<()>,
}

impl PeerRuntime {
    /// Start a peer over `genesis` with the given store and network provider.
    pub fn start<S: CellStore, N: Network + 'static>(
        config: Configuration,
        genesis: State,
        store: S,
        mut network: N,
        handlers: UserHandlers,
    ) -> Result<PeerRuntime> {
        let keypair = Keypair::new(config.me.clone());
        let account_key = keypair.account_key();
        let peer = Peer::create(keypair, genesis.clone())?;

        let peer_keys: Vec<AccountKey> =
            genesis.peers_with_stakes()?.into_iter().map(|(key, _)| key).collect();
        network.init_peer_set(&peer_keys);

        let camera = PeerCamera {
            shared: Arc::new(Mutex::new(PeerView {
                belief: peer.belief().clone(),
                consensus_state: peer.get_consensus_state().clone(),
                consensus_point: peer.consensus_point()?,
            })),
        };

        let event_handlers = EventHandlers {
            propose_block_handlers: HandlerPair::new(config.log_events, handlers.propose_block),
            merge_beliefs_handlers: HandlerPair::new(config.log_events, handlers.merge_beliefs),
            apply_block_handlers: HandlerPair::new(config.log_events, handlers.apply_block),
            receive_belief_handlers: HandlerPair::new(config.log_events, handlers.receive_belief),
            broadcast_belief_handlers: HandlerPair::new(
                config.log_events,
                handlers.broadcast_belief,
            ),
            receive_missing_data_handlers: HandlerPair::new(
                config.log_events,
                handlers.receive_missing_data,
            ),
            send_data_reply_handlers: HandlerPair::new(config.log_events, handlers.send_data_reply),
        };

        let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
        let (event_publisher, event_subscriber) = mpsc::channel();
        let (event_publisher, event_bus) = if event_handlers.is_empty() {
            (None, None)
        } else {
            let handle =
                start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
            (Some(event_publisher), Some(handle))
        };

        let (main_shutdown, main_shutdown_receiver) = mpsc::channel();
        let (transactions, transaction_receiver) = mpsc::channel();
        let main = start_main_loop(
            config,
            peer,
            store,
            network,
            camera.clone(),
            transaction_receiver,
            main_shutdown_receiver,
            event_publisher,
        );

        Ok(PeerRuntime {
            camera,
            account_key,
            transactions,
            main: Some(main),
            main_shutdown,
            event_bus,
            event_bus_shutdown,
        })
    }

    pub fn camera(&self) -> &PeerCamera {
        &self.camera
    }

    pub fn account_key(&self) -> AccountKey {
        self.account_key
    }

    /// Submit a signed transaction for inclusion in the peer's next proposed block.
    pub fn submit_transaction(&self, transaction: SignedData) {
        // The main loop outlives this handle; a send failure means shutdown raced us.
        let _ = self.transactions.send(transaction);
    }
}

impl Drop for PeerRuntime {
    fn drop(&mut self) {
        // Shut the main loop down first: it publishes to the event bus.
        let _ = self.main_shutdown.send(());
        if let Some(main) = self.main.take() {
            let _ = main.join();
        }
        let _ = self.event_bus_shutdown.send(());
        if let Some(event_bus) = self.event_bus.take() {
            let _ = event_bus.join();
        }
    }
}

fn now() -> (SystemTime, Timestamp) {
    let system = SystemTime::now();
    let millis = system
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the Unix Epoch")
        .as_millis() as i64;
    (system, Timestamp::new(millis))
}

#[allow(clippy::too_many_arguments)]
fn start_main_loop<S: CellStore, N: Network + 'static>(
    config: Configuration,
    mut peer: Peer,
    store: S,
    mut network: N,
    camera: PeerCamera,
    transaction_receiver: Receiver<SignedData>,
    shutdown: Receiver<()>,
    event_publisher: Option<Sender<Event>>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        // Requests answered once their transaction is consensed, keyed by the hash of
        // the signed transaction cell.
        let mut submitted: HashMap<Hash, (AccountKey, MessageId)> = HashMap::new();
        let mut last_broadcast: Option<Hash> = None;

        loop {
            match shutdown.try_recv() {
                Ok(()) => return,
                Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => {}
            }

            let (system_now, timestamp) = now();
            peer = peer.update_timestamp(timestamp);

            // 1. Drain the network.
            let mut received_beliefs = Vec::new();
            let mut pending: Vec<SignedData> = Vec::new();
            while let Some((origin, message)) = network.recv() {
                match message {
                    Message::Belief(belief) => {
                        Event::ReceiveBelief(ReceiveBeliefEvent {
                            timestamp: system_now,
                            origin,
                            belief_hash: belief.hash(),
                        })
                        .publish(&event_publisher);
                        received_beliefs.push(belief);
                    }
                    Message::Transact { id, transaction } => {
                        submitted
                            .insert(Cell::Signed(transaction.clone()).hash(), (origin, id));
                        pending.push(transaction);
                    }
                    Message::Query { id, hash } | Message::MissingData { id, hash } => {
                        Event::ReceiveMissingData(ReceiveMissingDataEvent {
                            timestamp: system_now,
                            origin,
                            hash,
                        })
                        .publish(&event_publisher);
                        let cells = match store.get(&hash) {
                            Ok(Some(bytes)) => vec![bytes],
                            _ => Vec::new(),
                        };
                        Event::SendDataReply(SendDataReplyEvent {
                            timestamp: system_now,
                            peer: origin,
                            cell_count: cells.len(),
                        })
                        .publish(&event_publisher);
                        network.send(origin, Message::DataReply { id, cells });
                    }
                    Message::DataReply { cells, .. } => {
                        for encoding in cells {
                            if let Err(err) = store.put(&encoding) {
                                log::warn!("StoreReply, rejected, {}", err);
                            }
                        }
                    }
                    Message::StatusRequest { id } => {
                        network.send(
                            origin,
                            Message::Status {
                                id,
                                belief_hash: peer.belief().hash(),
                                state_hash: peer.get_consensus_state().hash(),
                            },
                        );
                    }
                    Message::Challenge { id, token } => {
                        let signed = peer.sign(Cell::Blob(token));
                        network.send(origin, Message::Response { id, signed });
                    }
                    // Replies to our own requests and responses to our challenges are
                    // routed by the library user's request tracker, not this loop.
                    Message::Result(_) | Message::Status { .. } | Message::Response { .. } => {}
                }
            }

            // 2. Batch locally submitted transactions with network submissions into
            // one block proposal.
            while let Ok(transaction) = transaction_receiver.try_recv() {
                pending.push(transaction);
            }
            if !pending.is_empty() {
                match crate::ledger::Block::of(timestamp, peer.account_key(), pending) {
                    Ok(block) => {
                        let block_hash = block.hash();
                        let transaction_count = block.transactions().map(|t| t.len()).unwrap_or(0);
                        match peer.propose_block(block) {
                            Ok(next) => {
                                peer = next;
                                Event::ProposeBlock(ProposeBlockEvent {
                                    timestamp: system_now,
                                    block_hash,
                                    transaction_count,
                                })
                                .publish(&event_publisher);
                            }
                            Err(err) => log::warn!("ProposeBlock, failed, {}", err),
                        }
                    }
                    Err(err) => log::warn!("ProposeBlock, failed, {}", err),
                }
            }

            // 3. Merge received beliefs and answer consensed submissions.
            if !received_beliefs.is_empty() {
                match peer.merge_beliefs_with_results(&received_beliefs) {
                    Ok((next, applied)) => {
                        peer = next;
                        for applied_block in &applied {
                            Event::ApplyBlock(ApplyBlockEvent {
                                timestamp: system_now,
                                block_hash: applied_block.block.hash(),
                                block_timestamp: applied_block.block.timestamp(),
                                consensus_point: applied_block.index + 1,
                            })
                            .publish(&event_publisher);
                            answer_submissions(
                                &mut network,
                                &mut submitted,
                                applied_block.block.transactions().unwrap_or_default(),
                                &applied_block.results,
                            );
                        }
                        if let Ok(own) = peer.own_order() {
                            Event::MergeBeliefs(MergeBeliefsEvent {
                                timestamp: system_now,
                                belief_count: received_beliefs.len(),
                                proposal_point: own.proposal_point(),
                                consensus_point: own.consensus_point(),
                            })
                            .publish(&event_publisher);
                        }
                    }
                    Err(err) => log::warn!("MergeBeliefs, failed, {}", err),
                }
            }

            // 4. Broadcast the belief if it changed, persisting it first.
            let belief_hash = peer.belief().hash();
            if last_broadcast != Some(belief_hash) {
                match store::persist_root(Cell::Belief(peer.belief().clone()), &store) {
                    Ok(_) => {
                        network.broadcast(Message::Belief(peer.belief().clone()));
                        Event::BroadcastBelief(BroadcastBeliefEvent {
                            timestamp: system_now,
                            belief_hash,
                        })
                        .publish(&event_publisher);
                        last_broadcast = Some(belief_hash);
                    }
                    Err(err) => log::warn!("PersistBelief, failed, {}", err),
                }
            }

            // 5. Refresh the camera.
            {
                let mut view = camera.shared.lock().unwrap();
                view.belief = peer.belief().clone();
                view.consensus_state = peer.get_consensus_state().clone();
                view.consensus_point = peer.consensus_point().unwrap_or(view.consensus_point);
            }

            thread::sleep(config.gossip_interval);
        }
    })
}

/// Send a [`Message::Result`] to the submitter of every transaction in a newly
/// consensed block that arrived through [`Message::Transact`].
fn answer_submissions<N: Network>(
    network: &mut N,
    submitted: &mut HashMap<Hash, (AccountKey, MessageId)>,
    transactions: Vec<SignedData>,
    results: &[TxResult],
) {
    for (signed, result) in transactions.iter().zip(results) {
        let tx_hash = Cell::Signed(signed.clone()).hash();
        if let Some((origin, id)) = submitted.remove(&tx_hash) {
            let reply = TxResult {
                id: id.int(),
                error: result.error().map(|e| e.code()),
                value: result.value().clone(),
            };
            network.send(origin, Message::Result(reply));
        }
    }
}
