//! Node configuration.

use crate::cache::DEFAULT_CACHE_CAPACITY;
use libp2p::Multiaddr;
use std::time::Duration;

/// Configuration for a [`Node`](crate::Node).
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Run as a bootnode: serve the DHT and streams but skip pubsub
    /// ingestion.
    pub bootnode: bool,

    /// Run solo: allow starting without any bootpeers (local testing).
    pub solo: bool,

    /// Well-known peers dialed at startup to join the network. Required
    /// unless `bootnode` or `solo` is set.
    pub bootpeers: Vec<Multiaddr>,

    /// Addresses to listen on (QUIC).
    pub listen_addresses: Vec<Multiaddr>,

    /// Also listen on a TCP fallback transport.
    pub tcp_fallback_enabled: bool,

    /// Port for the TCP fallback listener.
    pub tcp_fallback_port: Option<u16>,

    /// Deadline for each outbound request's stream open, write, and read,
    /// so a silent peer cannot pin a stream forever.
    pub request_timeout: Duration,

    /// Bound on the response cache, in entries.
    pub cache_capacity: usize,

    /// Optional 32-byte seed for a deterministic Ed25519 identity.
    /// When absent a fresh identity is generated.
    pub keypair_seed: Option<[u8; 32]>,

    /// Close connections idle for longer than this.
    pub idle_connection_timeout: Duration,

    /// QUIC keep-alive ping interval.
    pub keep_alive_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bootnode: false,
            solo: false,
            bootpeers: Vec::new(),
            listen_addresses: vec!["/ip4/0.0.0.0/udp/0/quic-v1"
                .parse()
                .expect("static multiaddr is valid")],
            tcp_fallback_enabled: false,
            tcp_fallback_port: None,
            request_timeout: Duration::from_secs(10),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            keypair_seed: None,
            idle_connection_timeout: Duration::from_secs(60),
            keep_alive_interval: Duration::from_secs(15),
        }
    }
}

impl NodeConfig {
    /// Whether this configuration can join (or form) a network.
    ///
    /// A node that is neither a bootnode nor solo has no way into the
    /// network without at least one bootpeer.
    pub fn can_join_network(&self) -> bool {
        self.bootnode || self.solo || !self.bootpeers.is_empty()
    }
}
