//! Node facade: lifecycle, lookups, gossip ingestion, and peer ops.

use crate::adapter::{build_keypair, Adapter, AdapterError, GossipMessage};
use crate::cache::ResponseCache;
use crate::config::NodeConfig;
use crate::consensus::ConsensusApi;
use crate::peers::PeerLedger;
use crate::protocol::{spawn_inbound_router, NodeFacade, RouterHandle};
use crate::request_id::RequestIdRegistry;
use futures::future::BoxFuture;
use lattice_network::codec::{self, CodecError};
use lattice_network::Topic;
use lattice_types::{Block, BlockNumber, Hash, Header, Location, Payload, Selector, TypeTag};
use libp2p::{Multiaddr, PeerId};
use std::fmt;
use std::sync::Mutex as StdMutex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Ceiling for each stop function during shutdown.
pub(crate) const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Node lifecycle and wiring errors.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Neither bootnode nor solo, and no bootpeers configured.
    #[error("no bootpeers provided; unable to join network")]
    NoBootpeers,

    /// The consensus backend can only be wired once.
    #[error("consensus backend already set")]
    ConsensusBackendAlreadySet,

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// One or more services failed or timed out during shutdown.
    #[error("errors during shutdown: {0}")]
    Shutdown(ShutdownError),
}

/// Aggregate of per-service shutdown failures.
#[derive(Debug)]
pub struct ShutdownError {
    /// One entry per failed or timed-out stop function.
    pub errors: Vec<String>,
}

impl fmt::Display for ShutdownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.errors.join("; "))
    }
}

/// A node in the lattice network.
///
/// A cheaply cloneable handle wiring the swarm adapter, request-id
/// registry, response cache, and peer ledger together. Exposes the
/// request/serve surface: outbound dispatch (`request*`), inbound lookups,
/// gossip (`subscribe`/`broadcast`), and peer reputation ops.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

/// Shared node state; tasks hold an `Arc` of this.
pub(crate) struct NodeInner {
    pub(crate) config: NodeConfig,
    pub(crate) adapter: Arc<Adapter>,
    pub(crate) registry: RequestIdRegistry,
    pub(crate) cache: ResponseCache,
    pub(crate) peer_ledger: PeerLedger,
    consensus: OnceLock<Arc<dyn ConsensusApi>>,
    router: StdMutex<Option<RouterHandle>>,
    gossip_rx: StdMutex<Option<mpsc::UnboundedReceiver<GossipMessage>>>,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl Node {
    /// Create a node from configuration. The swarm starts listening
    /// immediately; request serving begins with [`Node::start`].
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let keypair = build_keypair(config.keypair_seed);
        let (adapter, gossip_rx) = Adapter::new(&config, keypair)?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(NodeInner {
                cache: ResponseCache::new(config.cache_capacity),
                registry: RequestIdRegistry::new(),
                peer_ledger: PeerLedger::new(),
                consensus: OnceLock::new(),
                router: StdMutex::new(None),
                gossip_rx: StdMutex::new(Some(gossip_rx)),
                shutdown,
                adapter,
                config,
            }),
        })
    }

    /// Start the node's services.
    ///
    /// Fails when the configuration cannot join a network (no bootpeers
    /// and neither the bootnode nor the solo flag set). A bootnode serves
    /// streams and the DHT but skips pubsub ingestion.
    pub fn start(&self) -> Result<(), NodeError> {
        info!("starting lattice node");
        let inner = &self.inner;

        if !inner.config.can_join_network() {
            warn!("no bootpeers provided and neither bootnode nor solo mode set");
            return Err(NodeError::NoBootpeers);
        }

        let router = spawn_inbound_router(inner.adapter.stream_control(), inner.clone());
        *inner
            .router
            .lock()
            .expect("router lock is never poisoned") = Some(router);

        for addr in &inner.config.bootpeers {
            inner.adapter.dial(addr.clone())?;
        }

        if inner.config.bootnode {
            info!("running as a bootnode; pubsub ingestion disabled");
            return Ok(());
        }

        let gossip_rx = inner
            .gossip_rx
            .lock()
            .expect("gossip lock is never poisoned")
            .take();
        if let Some(mut gossip_rx) = gossip_rx {
            let inner = inner.clone();
            tokio::spawn(async move {
                while let Some(message) = gossip_rx.recv().await {
                    inner.ingest_gossip(message);
                }
                debug!("gossip ingestion loop exited");
            });
        }

        Ok(())
    }

    /// Gracefully shut down all running services.
    ///
    /// Stop functions run concurrently, each under a 5-second ceiling;
    /// individual failures and timeouts are collected and returned as an
    /// aggregate rather than aborting the rest of the shutdown.
    pub async fn stop(&self) -> Result<(), NodeError> {
        info!("stopping lattice node");
        self.inner.shutdown.send_replace(true);

        let mut stoppers: Vec<(&'static str, BoxFuture<'static, Result<(), String>>)> = Vec::new();

        let adapter = self.inner.adapter.clone();
        stoppers.push((
            "host",
            Box::pin(async move { adapter.close().await.map_err(|e| e.to_string()) }),
        ));

        let router = self
            .inner
            .router
            .lock()
            .expect("router lock is never poisoned")
            .take();
        if let Some(router) = router {
            stoppers.push(("protocol router", Box::pin(router.close())));
        }

        let errors = run_stop_functions(stoppers).await;
        if errors.is_empty() {
            Ok(())
        } else {
            Err(NodeError::Shutdown(ShutdownError { errors }))
        }
    }

    /// Wire the consensus backend. May be called once.
    pub fn set_consensus_backend(&self, backend: Arc<dyn ConsensusApi>) -> Result<(), NodeError> {
        self.inner
            .consensus
            .set(backend)
            .map_err(|_| NodeError::ConsensusBackendAlreadySet)
    }

    /// Subscribe to gossip for `(location, tag)`.
    pub fn subscribe(&self, location: Location, tag: TypeTag) -> Result<(), NodeError> {
        self.inner.adapter.subscribe(&Topic::new(location, tag))?;
        Ok(())
    }

    /// Broadcast a payload on its `(location, kind)` topic.
    pub fn broadcast(&self, location: Location, payload: &Payload) -> Result<(), NodeError> {
        let topic = Topic::new(location, payload.kind());
        let data = codec::encode_gossip(payload)?;
        self.inner.adapter.publish(&topic, data)?;
        Ok(())
    }

    /// Resolve a query into racing peer requests.
    ///
    /// Checks the cache (hash selectors only), fans out to topic peers,
    /// and races bounded rounds of DHT provider lookups. The returned
    /// channel yields zero or more payloads, first responder first, and
    /// closes when the search is abandoned; closure with no value means
    /// "not found on network".
    pub fn request(
        &self,
        location: Location,
        selector: Selector,
        tag: TypeTag,
    ) -> mpsc::Receiver<Payload> {
        NodeInner::request(self.inner.clone(), location, selector, tag)
    }

    /// [`Node::request`] with a hash selector.
    pub fn request_by_hash(
        &self,
        location: Location,
        hash: Hash,
        tag: TypeTag,
    ) -> mpsc::Receiver<Payload> {
        self.request(location, Selector::Hash(hash), tag)
    }

    /// [`Node::request`] with a number selector.
    pub fn request_by_number(
        &self,
        location: Location,
        number: BlockNumber,
        tag: TypeTag,
    ) -> mpsc::Receiver<Payload> {
        self.request(location, Selector::Number(number), tag)
    }

    /// Ingest a decoded broadcast.
    ///
    /// Blocks are cached before forwarding to the consensus backend; bare
    /// block-hash broadcasts are dropped.
    pub fn handle_broadcast(&self, source: PeerId, payload: Payload, location: Location) {
        self.inner.handle_broadcast(source, payload, location)
    }

    /// Search the cache, then the consensus backend, for a block.
    pub fn get_block(&self, hash: Hash, location: Location) -> Option<Block> {
        self.inner.get_block(hash, location)
    }

    /// Search the cache, then the consensus backend, for a header.
    pub fn get_header(&self, hash: Hash, location: Location) -> Option<Header> {
        self.inner.get_header(hash, location)
    }

    /// Resolve a block number to its hash via the consensus backend.
    pub fn get_block_hash_by_number(
        &self,
        number: &BlockNumber,
        location: Location,
    ) -> Option<Hash> {
        self.inner.get_block_hash_by_number(number, location)
    }

    /// Record a well-behaving peer.
    pub fn mark_lively_peer(&self, peer: PeerId) {
        debug!(peer = %peer, "recording well-behaving peer");
        self.inner.peer_ledger.mark_lively(&peer);
    }

    /// Record a misbehaving or slow peer.
    pub fn mark_latent_peer(&self, peer: PeerId) {
        debug!(peer = %peer, "recording misbehaving peer");
        self.inner.peer_ledger.mark_latent(&peer);
    }

    /// Protect a peer's connection from pruning.
    pub fn protect_peer(&self, peer: PeerId) {
        debug!(peer = %peer, "protecting peer connection from pruning");
        self.inner.peer_ledger.protect(&peer);
    }

    /// Ban a peer for misbehaving and close its connections.
    pub fn ban_peer(&self, peer: PeerId) {
        self.inner.ban_peer(peer);
    }

    /// The node's own peer id.
    pub fn local_peer_id(&self) -> PeerId {
        self.inner.adapter.local_peer_id()
    }

    /// Addresses the node is currently listening on.
    pub async fn listen_addresses(&self) -> Vec<Multiaddr> {
        self.inner.adapter.listen_addresses().await
    }

    /// Peers currently connected to this node.
    pub async fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.adapter.connected_peers().await
    }

    /// Peers currently subscribed to the `(location, tag)` topic.
    pub async fn peers_for_topic(&self, location: Location, tag: TypeTag) -> Vec<PeerId> {
        self.inner.adapter.topic_peers(&Topic::new(location, tag)).await
    }

    /// Connect to the given peer address.
    pub fn connect(&self, address: Multiaddr) -> Result<(), NodeError> {
        self.inner.adapter.dial(address)?;
        Ok(())
    }

    /// Number of cached payloads, for diagnostics.
    pub fn cached_entries(&self) -> usize {
        self.inner.cache.len()
    }
}

impl NodeInner {
    /// Decode one raw gossip message and hand it to broadcast handling.
    fn ingest_gossip(&self, message: GossipMessage) {
        let Some(topic) = Topic::parse(&message.topic) else {
            debug!(topic = %message.topic, "dropping gossip on unrecognized topic");
            return;
        };

        match codec::decode_gossip(&message.data) {
            Ok(payload) => self.handle_broadcast(message.source, payload, topic.location()),
            Err(e) => {
                debug!(
                    topic = %message.topic,
                    source = %message.source,
                    error = %e,
                    "dropping undecodable gossip payload"
                );
            }
        }
    }

    /// Ingest a decoded broadcast.
    ///
    /// Blocks are cached before forwarding so subsequent by-hash requests
    /// short-circuit. Bare block-hash broadcasts carry no content and are
    /// dropped.
    pub(crate) fn handle_broadcast(&self, source: PeerId, payload: Payload, location: Location) {
        match &payload {
            Payload::Block(_) => self.cache.put(payload.clone()),
            Payload::BlockHash(_) => {
                debug!(source = %source, "dropping bare block-hash broadcast");
                return;
            }
            Payload::Header(_) | Payload::Transaction(_) => {}
        }

        if let Some(consensus) = self.consensus.get() {
            consensus.on_new_broadcast(source, payload, location);
        }
    }

    pub(crate) fn get_block(&self, hash: Hash, location: Location) -> Option<Block> {
        if let Some(Payload::Block(block)) = self.cache.get(&hash, TypeTag::Block) {
            return Some(block);
        }
        self.consensus.get()?.lookup_block(hash, location)
    }

    pub(crate) fn get_header(&self, hash: Hash, location: Location) -> Option<Header> {
        if let Some(Payload::Header(header)) = self.cache.get(&hash, TypeTag::Header) {
            return Some(header);
        }
        self.consensus.get()?.lookup_header(hash, location)
    }

    /// Numbers are mutable under reorgs; never served from cache.
    pub(crate) fn get_block_hash_by_number(
        &self,
        number: &BlockNumber,
        location: Location,
    ) -> Option<Hash> {
        self.consensus
            .get()?
            .lookup_block_hash_by_number(number, location)
    }

    pub(crate) fn ban_peer(&self, peer: PeerId) {
        warn!(peer = %peer, "banning peer for misbehaving");
        self.peer_ledger.ban(&peer);
        self.adapter.disconnect_peer(peer);
    }
}

impl NodeFacade for NodeInner {
    fn get_block(&self, hash: Hash, location: Location) -> Option<Block> {
        NodeInner::get_block(self, hash, location)
    }

    fn get_header(&self, hash: Hash, location: Location) -> Option<Header> {
        NodeInner::get_header(self, hash, location)
    }

    fn get_block_hash_by_number(&self, number: &BlockNumber, location: Location) -> Option<Hash> {
        NodeInner::get_block_hash_by_number(self, number, location)
    }
}

/// Run each named stop function concurrently under [`SHUTDOWN_TIMEOUT`],
/// collecting a message per failure or timeout.
pub(crate) async fn run_stop_functions(
    stoppers: Vec<(&'static str, BoxFuture<'static, Result<(), String>>)>,
) -> Vec<String> {
    let tasks = stoppers.into_iter().map(|(name, stop)| async move {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, stop).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                warn!(service = name, error = %e, "error during shutdown");
                Some(format!("{name}: {e}"))
            }
            Err(_) => {
                warn!(service = name, "timeout during shutdown");
                Some(format!("{name}: shutdown timed out"))
            }
        }
    });

    futures::future::join_all(tasks)
        .await
        .into_iter()
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    type Stoppers = Vec<(&'static str, BoxFuture<'static, Result<(), String>>)>;

    #[tokio::test(start_paused = true)]
    async fn test_stop_functions_all_succeed() {
        let stoppers: Stoppers = vec![
            ("a", Box::pin(async { Ok(()) })),
            ("b", Box::pin(async { Ok(()) })),
        ];
        let errors = run_stop_functions(stoppers).await;
        assert!(errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_stop_function_times_out_but_others_finish() {
        let stoppers: Stoppers = vec![
            ("healthy", Box::pin(async { Ok(()) })),
            (
                "hung",
                Box::pin(async {
                    futures::future::pending::<()>().await;
                    Ok(())
                }),
            ),
        ];
        let errors = run_stop_functions(stoppers).await;

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("hung"));
        assert!(errors[0].contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_stop_function_is_reported() {
        let stoppers: Stoppers = vec![(
            "flaky",
            Box::pin(async { Err("close failed".to_string()) }),
        )];
        let errors = run_stop_functions(stoppers).await;

        assert_eq!(errors, vec!["flaky: close failed".to_string()]);
    }
}
