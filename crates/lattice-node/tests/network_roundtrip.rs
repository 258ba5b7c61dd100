//! End-to-end tests over real localhost transports.
//!
//! Two in-process nodes talk QUIC on 127.0.0.1: one seeds its cache or
//! consensus backend, the other fetches through the dispatcher.

use dashmap::DashMap;
use lattice_node::{ConsensusApi, Node, NodeConfig, NodeError, PeerId};
use lattice_types::{Block, BlockNumber, Hash, Header, Location, Payload, Transaction, TypeTag};
use std::sync::Arc;
use std::time::Duration;

const TEST_LOCATION: Location = Location::Zone(0, 1);

fn solo_config() -> NodeConfig {
    NodeConfig {
        solo: true,
        listen_addresses: vec!["/ip4/127.0.0.1/udp/0/quic-v1".parse().unwrap()],
        ..Default::default()
    }
}

fn test_block(body: u8) -> Block {
    Block {
        header: Header {
            location: TEST_LOCATION,
            number: BlockNumber::from(body as u64),
            parent_hash: Hash::from_bytes(b"parent"),
            state_root: Hash::from_bytes(b"state"),
        },
        body: vec![body],
    }
}

/// Poll `probe` until it returns `Some`, failing after `deadline`.
async fn wait_for<T, F, Fut>(deadline: Duration, mut probe: F) -> T
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let start = std::time::Instant::now();
    loop {
        if let Some(value) = probe().await {
            return value;
        }
        assert!(
            start.elapsed() < deadline,
            "condition not reached within {deadline:?}"
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Connect `dialer` to `listener` and wait until both sides see it.
async fn connect(dialer: &Node, listener: &Node) {
    let addr = wait_for(Duration::from_secs(10), || async {
        listener.listen_addresses().await.into_iter().next()
    })
    .await;

    dialer.connect(addr).unwrap();

    let listener_id = listener.local_peer_id();
    wait_for(Duration::from_secs(10), || async {
        dialer
            .connected_peers()
            .await
            .contains(&listener_id)
            .then_some(())
    })
    .await;
}

#[derive(Default)]
struct StubConsensus {
    blocks: DashMap<Hash, Block>,
    numbers: DashMap<BlockNumber, Hash>,
}

impl ConsensusApi for StubConsensus {
    fn lookup_block(&self, hash: Hash, _location: Location) -> Option<Block> {
        self.blocks.get(&hash).map(|b| b.clone())
    }

    fn lookup_header(&self, _hash: Hash, _location: Location) -> Option<Header> {
        None
    }

    fn lookup_block_hash_by_number(
        &self,
        number: &BlockNumber,
        _location: Location,
    ) -> Option<Hash> {
        self.numbers.get(number).map(|h| *h)
    }

    fn on_new_broadcast(&self, _source: PeerId, _payload: Payload, _location: Location) {}
}

#[tokio::test]
async fn start_fails_without_bootpeers() {
    let node = Node::new(NodeConfig {
        listen_addresses: vec!["/ip4/127.0.0.1/udp/0/quic-v1".parse().unwrap()],
        ..Default::default()
    })
    .unwrap();

    assert!(matches!(node.start(), Err(NodeError::NoBootpeers)));
}

#[tokio::test]
async fn solo_node_starts_and_stops() {
    let node = Node::new(solo_config()).unwrap();
    node.start().unwrap();
    node.stop().await.unwrap();
}

#[tokio::test]
async fn cache_hit_serves_without_network() {
    let node = Node::new(solo_config()).unwrap();
    node.start().unwrap();

    let block = test_block(1);
    let hash = block.hash();
    node.handle_broadcast(
        PeerId::random(),
        Payload::Block(block.clone()),
        TEST_LOCATION,
    );

    let mut rx = node.request_by_hash(TEST_LOCATION, hash, TypeTag::Block);

    let payload = rx.recv().await.expect("cached payload delivered");
    assert_eq!(payload.hash(), hash);
    assert_eq!(payload, Payload::Block(block));
    // Exactly one payload, then closure.
    assert!(rx.recv().await.is_none());

    node.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_network_request_closes_without_value() {
    let node = Node::new(solo_config()).unwrap();
    node.start().unwrap();

    let mut rx = node.request_by_hash(TEST_LOCATION, Hash::from_bytes(b"nowhere"), TypeTag::Block);

    // Three DHT rounds at five virtual seconds each, then closure with
    // nothing delivered.
    let result = tokio::time::timeout(Duration::from_secs(120), rx.recv())
        .await
        .expect("search should exhaust within the retry budget");
    assert!(result.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn peer_fetch_by_hash_delivers_and_caches() {
    let node_a = Node::new(solo_config()).unwrap();
    let node_b = Node::new(solo_config()).unwrap();
    node_a.start().unwrap();
    node_b.start().unwrap();

    // Seed A with a block and make it visible on the (location, Block)
    // topic.
    let block = test_block(2);
    let hash = block.hash();
    node_a.handle_broadcast(
        PeerId::random(),
        Payload::Block(block.clone()),
        TEST_LOCATION,
    );
    node_a.subscribe(TEST_LOCATION, TypeTag::Block).unwrap();

    connect(&node_b, &node_a).await;

    // Wait until B has learned of A's subscription.
    let a_id = node_a.local_peer_id();
    wait_for(Duration::from_secs(10), || async {
        node_b
            .peers_for_topic(TEST_LOCATION, TypeTag::Block)
            .await
            .contains(&a_id)
            .then_some(())
    })
    .await;

    let mut rx = node_b.request_by_hash(TEST_LOCATION, hash, TypeTag::Block);
    let payload = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("fetch should answer before the deadline")
        .expect("payload delivered");
    assert_eq!(payload.hash(), hash);

    // The response was cached: a repeat request short-circuits even with
    // the serving peer gone.
    assert!(node_b.cached_entries() > 0);
    node_a.stop().await.unwrap();

    let mut rx = node_b.request_by_hash(TEST_LOCATION, hash, TypeTag::Block);
    let payload = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("cache hit should answer immediately")
        .expect("payload delivered");
    assert_eq!(payload, Payload::Block(block));

    node_b.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn by_number_fetch_delivers_but_does_not_cache() {
    let node_a = Node::new(solo_config()).unwrap();
    let node_b = Node::new(solo_config()).unwrap();
    node_a.start().unwrap();
    node_b.start().unwrap();

    // A answers number 42 from its consensus backend.
    let answer = Hash::from_bytes(b"block at 42");
    let consensus = StubConsensus::default();
    consensus.numbers.insert(BlockNumber::from(42u64), answer);
    node_a.set_consensus_backend(Arc::new(consensus)).unwrap();
    node_a.subscribe(TEST_LOCATION, TypeTag::BlockHash).unwrap();

    connect(&node_b, &node_a).await;

    let a_id = node_a.local_peer_id();
    wait_for(Duration::from_secs(10), || async {
        node_b
            .peers_for_topic(TEST_LOCATION, TypeTag::BlockHash)
            .await
            .contains(&a_id)
            .then_some(())
    })
    .await;

    let mut rx =
        node_b.request_by_number(TEST_LOCATION, BlockNumber::from(42u64), TypeTag::BlockHash);
    let payload = tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("fetch should answer before the deadline")
        .expect("payload delivered");
    assert_eq!(payload, Payload::BlockHash(answer));

    // Number-to-hash answers are never cached.
    assert_eq!(node_b.cached_entries(), 0);

    node_a.stop().await.unwrap();
    node_b.stop().await.unwrap();
}

#[tokio::test]
async fn broadcast_of_non_block_is_not_cached() {
    let node = Node::new(solo_config()).unwrap();
    node.start().unwrap();

    let tx = Transaction {
        location: TEST_LOCATION,
        body: vec![1, 2, 3],
    };
    node.handle_broadcast(PeerId::random(), Payload::Transaction(tx), TEST_LOCATION);
    node.handle_broadcast(
        PeerId::random(),
        Payload::BlockHash(Hash::from_bytes(b"bare hash")),
        TEST_LOCATION,
    );
    assert_eq!(node.cached_entries(), 0);

    node.stop().await.unwrap();
}
