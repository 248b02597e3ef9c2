//! End-to-end run of three peer runtimes over a mock network: a transaction submitted
//! to one peer reaches consensus on all of them, and the submitter gets its result.

use std::{thread, time::Duration};

use log::LevelFilter;

use converge_rs::{
    cell::Cell,
    config::{Configuration, UserHandlers},
    ledger::Transaction,
    networking::{Message, Network},
    runtime::PeerRuntime,
    store::MemoryStore,
    types::{
        crypto_primitives::Keypair,
        data_types::{Address, MessageId},
    },
};

mod common;

use crate::common::{
    initial_state, logging::setup_logger, network::mock_network, test_keypairs, test_signing_key,
};

const NUM_NODES: usize = 3;
const POLL: Duration = Duration::from_millis(100);
const DEADLINE: Duration = Duration::from_secs(30);

#[test]
fn runtime_consensus_and_result_reply() {
    setup_logger(LevelFilter::Warn);

    let keypairs = test_keypairs(NUM_NODES);
    let genesis = initial_state(&keypairs);

    // One extra network endpoint acts as the submitting client.
    let client_key = Keypair::new(test_signing_key(99)).account_key();
    let mut stubs = mock_network(
        keypairs
            .iter()
            .map(|kp| kp.account_key())
            .chain(std::iter::once(client_key)),
    );
    let mut client_net = stubs.pop().unwrap();

    // 1. Start all three runtimes.
    let runtimes: Vec<PeerRuntime> = (0..NUM_NODES)
        .map(|i| {
            let config = Configuration::builder()
                .me(test_signing_key(i))
                .gossip_interval(Duration::from_millis(20))
                .log_events(false)
                .build();
            PeerRuntime::start(
                config,
                genesis.clone(),
                MemoryStore::new(),
                stubs[i].clone(),
                UserHandlers::default(),
            )
            .unwrap()
        })
        .collect();

    // 2. Submit a transfer to node 0 through the wire, as a client would.
    let transfer = Transaction::Transfer {
        origin: Address::new(0),
        sequence: 1,
        target: Address::new(2),
        amount: 100,
    };
    let signed = {
        // The client holds account 0's key in this test.
        let keypair = keypairs[0].clone();
        converge_rs::cell::SignedData::sign(&keypair, Cell::Transaction(transfer))
    };
    let request_id = MessageId::new(71);
    client_net.send(
        runtimes[0].account_key(),
        Message::Transact { id: request_id, transaction: signed },
    );

    // 3. Poll every runtime's camera until the transfer is consensed everywhere.
    let mut waited = Duration::ZERO;
    loop {
        let all_consensed = runtimes.iter().all(|r| r.camera().consensus_point() == 1);
        if all_consensed {
            break;
        }
        assert!(waited < DEADLINE, "consensus did not complete in time");
        thread::sleep(POLL);
        waited += POLL;
    }

    // 4. Check balances on every node's consensus state.
    for runtime in &runtimes {
        let state = runtime.camera().view().consensus_state;
        let fee = converge_rs::ledger::juice::TRANSFER * state.juice_price().unwrap();
        assert_eq!(1_000_000 - 100 - fee, state.balance(Address::new(0)).unwrap());
        assert_eq!(3_000_000 + 100, state.balance(Address::new(2)).unwrap());
    }

    // 5. The submitting client received a successful result for its id. The client
    // inbox also sees gossiped beliefs; skip past those.
    let mut waited = Duration::ZERO;
    let result = 'outer: loop {
        while let Some((_, message)) = client_net.recv() {
            if let Message::Result(result) = message {
                break 'outer result;
            }
        }
        assert!(waited < DEADLINE, "no result reply arrived in time");
        thread::sleep(POLL);
        waited += POLL;
    };
    assert_eq!(request_id.int(), result.id());
    assert!(result.is_ok());

    drop(runtimes);
}
