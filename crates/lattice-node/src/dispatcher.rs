//! Outbound request dispatcher.
//!
//! Resolves a logical query into racing peer requests:
//!
//! 1. Cache fast path (hash selectors only)
//! 2. One concurrent attempt per peer subscribed to the query's topic
//! 3. In parallel, bounded rounds of DHT provider lookups for the slice's
//!    content key, one attempt per provider
//!
//! Results stream on a bounded channel: whichever peer answers first is
//! delivered first, duplicates may follow, and the channel closes once the
//! supervisor and every attempt have finished. Per-peer failures never
//! surface to the caller; exhaustion is signalled by closure alone.
//!
//! Winning a race does not cancel the losers; their streams are bounded by
//! the request deadline and their results land in the channel buffer or
//! are dropped with it.

use crate::cid::location_to_cid;
use crate::node::NodeInner;
use lattice_types::{Location, Payload, Selector, TypeTag};
use libp2p::PeerId;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Rounds of DHT provider lookups before giving up.
pub(crate) const MAX_DHT_RETRIES: u32 = 3;

/// Providers to enumerate per DHT round.
pub(crate) const PEERS_PER_DHT: usize = 10;

/// Pause between DHT rounds.
pub(crate) const DHT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Result channel capacity; the caller decides how many values to consume.
const RESULT_CHANNEL_CAPACITY: usize = 1;

impl NodeInner {
    /// Start an asynchronous search for `(location, selector, tag)`.
    pub(crate) fn request(
        self: Arc<Self>,
        location: Location,
        selector: Selector,
        tag: TypeTag,
    ) -> mpsc::Receiver<Payload> {
        let (tx, rx) = mpsc::channel(RESULT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            self.run_search(location, selector, tag, tx).await;
        });
        rx
    }

    /// Supervisor for one search. Holds a sender clone for its duration;
    /// the channel closes when it and all attempt tasks are done.
    async fn run_search(
        self: Arc<Self>,
        location: Location,
        selector: Selector,
        tag: TypeTag,
        tx: mpsc::Sender<Payload>,
    ) {
        // 1. Cache fast path. Only content-addressed queries can be
        // answered from the cache.
        if let Selector::Hash(hash) = &selector {
            if let Some(payload) = self.cache.get(hash, tag) {
                debug!(hash = %hash, tag = tag.as_str(), "request served from cache");
                let _ = tx.send(payload).await;
                return;
            }
        }

        // 2. Fan out to peers subscribed to the query's topic.
        let topic = lattice_network::Topic::new(location, tag);
        let peers = self.adapter.topic_peers(&topic).await;
        debug!(
            topic = %topic,
            peers = peers.len(),
            "querying topic peers"
        );
        for peer in peers {
            spawn_attempt(&self, peer, location, &selector, tag, &tx);
        }

        // 3. Race DHT providers for the slice's content key, in bounded
        // rounds. Runs in parallel with the topic attempts above.
        let key = location_to_cid(&location).to_bytes();
        let mut shutdown = self.shutdown.subscribe();

        for round in 1..=MAX_DHT_RETRIES {
            if *shutdown.borrow_and_update() {
                debug!(location = %location, "search cancelled by shutdown");
                return;
            }

            let providers = self.adapter.find_providers(key.clone(), PEERS_PER_DHT).await;
            debug!(
                location = %location,
                round,
                providers = providers.len(),
                "querying slice providers"
            );
            for peer in providers {
                spawn_attempt(&self, peer, location, &selector, tag, &tx);
            }

            tokio::select! {
                _ = tokio::time::sleep(DHT_RETRY_INTERVAL) => {}
                _ = shutdown.changed() => {
                    debug!(location = %location, "search cancelled by shutdown");
                    return;
                }
            }
        }

        debug!(location = %location, tag = tag.as_str(), "search exhausted");
    }
}

/// Spawn one per-peer attempt feeding the result channel.
///
/// Successful responders are marked lively and their payload cached. The
/// cache write happens for hash selectors only: a number-to-hash answer is
/// mutable under reorgs and must not short-circuit later queries.
fn spawn_attempt(
    node: &Arc<NodeInner>,
    peer: PeerId,
    location: Location,
    selector: &Selector,
    tag: TypeTag,
    tx: &mpsc::Sender<Payload>,
) {
    if peer == node.adapter.local_peer_id() || node.peer_ledger.is_banned(&peer) {
        return;
    }

    let node = node.clone();
    let selector = selector.clone();
    let tx = tx.clone();

    tokio::spawn(async move {
        match node
            .request_from_peer(peer, location, selector.clone(), tag)
            .await
        {
            Ok(payload) => {
                debug!(peer = %peer, hash = %payload.hash(), "received payload from peer");
                node.peer_ledger.mark_lively(&peer);
                if matches!(selector, Selector::Hash(_)) {
                    node.cache.put(payload.clone());
                }
                let _ = tx.send(payload).await;
            }
            Err(e) => {
                debug!(peer = %peer, error = %e, "peer attempt failed");
            }
        }
    });
}
