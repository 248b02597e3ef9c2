//! A "mock" (totally local) network for passing messages between peers in tests.

use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
};

use converge_rs::{
    networking::{Message, Network},
    types::data_types::AccountKey,
};

/// A network stub that passes messages to and from peers using channels.
///
/// The set of reachable peers is fixed on construction by [`mock_network`]; the
/// [`Network`] trait's `init_peer_set` method is a no-op.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_key: AccountKey,
    all_peers: HashMap<AccountKey, Sender<(AccountKey, Message)>>,
    inbox: Arc<Mutex<Receiver<(AccountKey, Message)>>>,
}

impl Network for NetworkStub {
    fn init_peer_set(&mut self, _: &[AccountKey]) {}

    fn send(&mut self, peer: AccountKey, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.my_key, message));
        }
    }

    fn broadcast(&mut self, message: Message) {
        for (key, peer) in &self.all_peers {
            if *key != self.my_key {
                let _ = peer.send((self.my_key, message.clone()));
            }
        }
    }

    fn recv(&mut self) -> Option<(AccountKey, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(incoming) => Some(incoming),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a vector of `NetworkStub`s connecting the provided peers, in the same order
/// as the provided keys.
pub(crate) fn mock_network(keys: impl Iterator<Item = AccountKey>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let keys_and_inboxes: Vec<(AccountKey, Receiver<(AccountKey, Message)>)> = keys
        .map(|key| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(key, sender);
            (key, receiver)
        })
        .collect();

    keys_and_inboxes
        .into_iter()
        .map(|(my_key, inbox)| NetworkStub {
            my_key,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
        })
        .collect()
}
