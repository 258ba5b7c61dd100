//! Core Adapter: construction, public API, and shutdown.

use super::behaviour::{Behaviour, PROTOCOL_VERSION, PROTOCOL_VERSION_STR};
use super::command::{GossipMessage, SwarmCommand};
use super::error::AdapterError;
use crate::config::NodeConfig;
use crate::framing::MAX_FRAME_SIZE;
use futures::FutureExt;
use lattice_network::Topic;
use libp2p::{gossipsub, identify, identity, kad, Multiaddr, PeerId, Stream};
use libp2p_stream as stream;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

/// libp2p-based network adapter.
///
/// Owns the swarm event loop and exposes gossipsub, Kademlia provider
/// lookups, and raw streams behind an async API. Request/response timeout
/// logic does not live here; the adapter is a dumb pipe.
pub struct Adapter {
    /// Local peer ID.
    local_peer_id: PeerId,

    /// Command channel to the swarm task.
    command_tx: mpsc::UnboundedSender<SwarmCommand>,

    /// Shutdown signal sender.
    shutdown_tx: StdMutex<Option<mpsc::Sender<()>>>,

    /// Event loop task, awaited on close.
    event_loop: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,

    /// Stream control handle for opening outbound streams.
    stream_control: stream::Control,
}

/// Build the node's identity keypair.
///
/// A configured seed gives a deterministic identity (useful for stable
/// bootnode addresses); otherwise a fresh Ed25519 key is generated.
pub(crate) fn build_keypair(seed: Option<[u8; 32]>) -> identity::Keypair {
    match seed {
        Some(seed) => {
            let secret = identity::ed25519::SecretKey::try_from_bytes(seed)
                .expect("32-byte seed is a valid ed25519 secret key");
            identity::Keypair::from(identity::ed25519::Keypair::from(secret))
        }
        None => identity::Keypair::generate_ed25519(),
    }
}

impl Adapter {
    /// Create a new adapter and spawn its event loop.
    ///
    /// Returns the adapter and the receiver carrying raw gossip messages;
    /// the caller owns decoding and ingestion.
    pub fn new(
        config: &NodeConfig,
        keypair: identity::Keypair,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<GossipMessage>), AdapterError> {
        let local_peer_id = PeerId::from(keypair.public());
        info!(local_peer_id = %local_peer_id, "Creating network adapter");

        let gossipsub_config = gossipsub::ConfigBuilder::default()
            .validation_mode(gossipsub::ValidationMode::Strict)
            .message_id_fn(|msg| {
                // Data + topic as the id: the same payload published to two
                // slice topics must not be deduplicated across them.
                use std::hash::{Hash, Hasher};
                let mut hasher = std::collections::hash_map::DefaultHasher::new();
                msg.data.hash(&mut hasher);
                msg.topic.hash(&mut hasher);
                gossipsub::MessageId::from(hasher.finish().to_le_bytes().to_vec())
            })
            .max_transmit_size(MAX_FRAME_SIZE)
            .build()
            .map_err(|e| AdapterError::Network(e.to_string()))?;

        let gossipsub = gossipsub::Behaviour::new(
            gossipsub::MessageAuthenticity::Signed(keypair.clone()),
            gossipsub_config,
        )
        .map_err(|e| AdapterError::Network(e.to_string()))?;

        // Server mode: answer routing and provider queries from peers.
        let store = kad::store::MemoryStore::new(local_peer_id);
        let mut kademlia = kad::Behaviour::new(local_peer_id, store);
        kademlia.set_mode(Some(kad::Mode::Server));

        let stream_behaviour = stream::Behaviour::new();
        let stream_control = stream_behaviour.new_control();

        let limits = libp2p::connection_limits::Behaviour::new(
            libp2p::connection_limits::ConnectionLimits::default()
                .with_max_pending_incoming(Some(10))
                .with_max_pending_outgoing(Some(10))
                .with_max_established_incoming(Some(100))
                .with_max_established_outgoing(Some(100))
                .with_max_established_per_peer(Some(2)),
        );

        let identify = identify::Behaviour::new(identify::Config::new(
            PROTOCOL_VERSION_STR.to_string(),
            keypair.public(),
        ));

        let behaviour = Behaviour {
            gossipsub,
            kademlia,
            stream: stream_behaviour,
            identify,
            limits,
        };

        let mut swarm = super::swarm_builder::build_swarm(config, keypair, behaviour)?;

        for addr in &config.listen_addresses {
            swarm.listen_on(addr.clone()).map_err(|e| {
                AdapterError::Network(format!("Failed to bind transport on {}: {:?}", addr, e))
            })?;
        }

        if config.tcp_fallback_enabled {
            if let Some(tcp_port) = config.tcp_fallback_port {
                let tcp_addr: Multiaddr = format!("/ip4/0.0.0.0/tcp/{}", tcp_port)
                    .parse()
                    .map_err(|e| AdapterError::Network(format!("Invalid TCP address: {}", e)))?;
                swarm.listen_on(tcp_addr.clone()).map_err(|e| {
                    AdapterError::Network(format!(
                        "Failed to bind TCP transport on {}: {:?}",
                        tcp_addr, e
                    ))
                })?;
            }
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (gossip_tx, gossip_rx) = mpsc::unbounded_channel();

        // A panicking event loop takes networking down with it; contain
        // the panic so the rest of the node can shut down cleanly.
        let handle = tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(super::event_loop::run(
                swarm,
                command_rx,
                shutdown_rx,
                gossip_tx,
            ))
            .catch_unwind()
            .await;

            match result {
                Ok(()) => info!("Swarm event loop exited"),
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(panic = %msg, "Swarm event loop panicked; networking is down");
                }
            }
        });

        let adapter = Arc::new(Self {
            local_peer_id,
            command_tx,
            shutdown_tx: StdMutex::new(Some(shutdown_tx)),
            event_loop: tokio::sync::Mutex::new(Some(handle)),
            stream_control,
        });

        Ok((adapter, gossip_rx))
    }

    fn send(&self, cmd: SwarmCommand) -> Result<(), AdapterError> {
        self.command_tx.send(cmd).map_err(|_| AdapterError::Shutdown)
    }

    /// Open a bidirectional stream to a peer with the lattice protocol.
    ///
    /// The caller owns framing, timeouts, and closing.
    pub async fn open_stream(&self, peer: PeerId) -> Result<Stream, AdapterError> {
        self.stream_control
            .clone()
            .open_stream(peer, PROTOCOL_VERSION)
            .await
            .map_err(|e| AdapterError::StreamOpenFailed(format!("{:?}", e)))
    }

    /// Subscribe to a gossip topic.
    pub fn subscribe(&self, topic: &Topic) -> Result<(), AdapterError> {
        self.send(SwarmCommand::Subscribe {
            topic: topic.to_string(),
        })
    }

    /// Publish pre-encoded bytes to a gossip topic.
    pub fn publish(&self, topic: &Topic, data: Vec<u8>) -> Result<(), AdapterError> {
        self.send(SwarmCommand::Publish {
            topic: topic.to_string(),
            data,
        })
    }

    /// Dial a peer address.
    pub fn dial(&self, address: Multiaddr) -> Result<(), AdapterError> {
        self.send(SwarmCommand::Dial { address })
    }

    /// Peers currently subscribed to `topic`.
    pub async fn topic_peers(&self, topic: &Topic) -> Vec<PeerId> {
        let (tx, rx) = oneshot::channel();
        if self
            .send(SwarmCommand::TopicPeers {
                topic: topic.to_string(),
                response_tx: tx,
            })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Enumerate up to `limit` DHT providers for a content key.
    ///
    /// Resolves when the provider walk finishes or the limit is reached;
    /// returns whatever was found (possibly nothing).
    pub async fn find_providers(&self, key: Vec<u8>, limit: usize) -> Vec<PeerId> {
        let (tx, rx) = oneshot::channel();
        if self
            .send(SwarmCommand::FindProviders {
                key,
                limit,
                response_tx: tx,
            })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Forcibly close all connections to `peer`.
    pub fn disconnect_peer(&self, peer: PeerId) {
        let _ = self.send(SwarmCommand::DisconnectPeer { peer });
    }

    /// Currently connected peers.
    pub async fn connected_peers(&self) -> Vec<PeerId> {
        let (tx, rx) = oneshot::channel();
        if self
            .send(SwarmCommand::ConnectedPeers { response_tx: tx })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Current listen addresses.
    pub async fn listen_addresses(&self) -> Vec<Multiaddr> {
        let (tx, rx) = oneshot::channel();
        if self
            .send(SwarmCommand::ListenAddresses { response_tx: tx })
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Get the local peer ID.
    pub fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    /// Get a clone of the stream control handle, for accepting inbound
    /// streams.
    pub fn stream_control(&self) -> stream::Control {
        self.stream_control.clone()
    }

    /// Stop the event loop and wait for it to exit.
    ///
    /// Idempotent: a second call returns immediately.
    pub async fn close(&self) -> Result<(), AdapterError> {
        let shutdown_tx = self
            .shutdown_tx
            .lock()
            .expect("shutdown lock is never poisoned")
            .take();
        if let Some(tx) = shutdown_tx {
            let _ = tx.send(()).await;
        }

        let handle = self.event_loop.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| AdapterError::Network(format!("event loop task failed: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for Adapter {
    fn drop(&mut self) {
        // Signal shutdown to the event loop
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .expect("shutdown lock is never poisoned")
            .take()
        {
            let _ = tx.try_send(());
        }
    }
}
