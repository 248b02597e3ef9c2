//! Trait for pluggable peer-to-peer (P2P) networking.
//!
//! Main trait: [`Network`].

use crate::types::data_types::AccountKey;

use super::messages::Message;

/// Trait for pluggable peer-to-peer (P2P) networking.
///
/// The core never blocks on the network: `send` and `broadcast` hand the message to
/// the provider, and `recv` returns immediately with `None` when nothing is waiting.
pub trait Network: Clone + Send {
    /// Inform the network provider of the peer set on wake-up.
    fn init_peer_set(&mut self, peers: &[AccountKey]);

    /// Send a message to all connected peers without blocking.
    fn broadcast(&mut self, message: Message);

    /// Send a message to the specified peer without blocking.
    fn send(&mut self, peer: AccountKey, message: Message);

    /// Receive a message from any peer. Returns immediately with a `None` if no
    /// message is available now.
    fn recv(&mut self) -> Option<(AccountKey, Message)>;
}
