//! P2P node for the lattice sliced-ledger network.
//!
//! The node fetches blocks, headers, transactions, and block-hash-by-number
//! values from remote peers when its cache and consensus backend lack
//! them, and serves symmetric requests to other peers over the same wire
//! protocol:
//!
//! - **Gossipsub** for topic broadcast, keyed by `(location, tag)`
//! - **Kademlia** for slice provider discovery (keys from
//!   [`location_to_cid`])
//! - **Raw streams** for request/response, framed by `lattice-network`
//!
//! Outbound queries go through [`Node::request`], which races topic peers
//! against DHT-discovered providers and streams results on a channel.
//! Inbound streams are served by a per-stream read loop against the node's
//! cache and consensus backend.

mod adapter;
mod cache;
mod cid;
mod config;
mod consensus;
mod dispatcher;
mod framing;
mod node;
mod peers;
mod protocol;
mod request_id;
mod requester;

pub use adapter::{Adapter, AdapterError, GossipMessage, PROTOCOL_VERSION};
pub use cache::{ResponseCache, DEFAULT_CACHE_CAPACITY};
pub use cid::location_to_cid;
pub use config::NodeConfig;
pub use consensus::ConsensusApi;
pub use node::{Node, NodeError, ShutdownError};
pub use peers::{PeerLedger, PeerRecord};
pub use protocol::{InboundHandler, NodeFacade};
pub use request_id::{RegistryError, RequestIdRegistry};
pub use requester::RequestError;

// Re-export libp2p types that appear in the public API.
pub use libp2p::{Multiaddr, PeerId};
