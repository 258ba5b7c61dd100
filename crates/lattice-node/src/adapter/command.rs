//! Commands sent from the adapter API to the swarm event loop.

use libp2p::{Multiaddr, PeerId};
use tokio::sync::oneshot;

/// Commands processed by the swarm task.
///
/// Queries carry a oneshot reply channel; fire-and-forget commands do
/// not. All commands share one unbounded channel and are processed FIFO.
#[derive(Debug)]
pub(crate) enum SwarmCommand {
    /// Subscribe to a gossipsub topic.
    Subscribe { topic: String },

    /// Publish pre-encoded data to a gossipsub topic.
    Publish { topic: String, data: Vec<u8> },

    /// Dial a peer address.
    Dial { address: Multiaddr },

    /// Query peers currently subscribed to a gossipsub topic.
    TopicPeers {
        topic: String,
        response_tx: oneshot::Sender<Vec<PeerId>>,
    },

    /// Enumerate up to `limit` DHT providers for a content key.
    FindProviders {
        key: Vec<u8>,
        limit: usize,
        response_tx: oneshot::Sender<Vec<PeerId>>,
    },

    /// Forcibly close all connections to a peer.
    DisconnectPeer { peer: PeerId },

    /// Query currently connected peers.
    ConnectedPeers {
        response_tx: oneshot::Sender<Vec<PeerId>>,
    },

    /// Query listen addresses.
    ListenAddresses {
        response_tx: oneshot::Sender<Vec<Multiaddr>>,
    },
}

/// A gossip message delivered raw from the event loop.
///
/// Topic parsing and payload decoding happen off the swarm task so a
/// large or malformed message cannot stall event processing.
#[derive(Debug)]
pub struct GossipMessage {
    /// The peer that relayed the message to us.
    pub source: PeerId,
    /// Topic string as published.
    pub topic: String,
    /// Compressed, encoded payload bytes.
    pub data: Vec<u8>,
}
