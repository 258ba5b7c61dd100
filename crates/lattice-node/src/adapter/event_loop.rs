//! Async event loop processing swarm events and adapter commands.

use super::behaviour::{Behaviour, BehaviourEvent};
use super::command::{GossipMessage, SwarmCommand};
use futures::StreamExt;
use libp2p::swarm::SwarmEvent;
use libp2p::{gossipsub, identify, kad, Multiaddr, PeerId, Swarm};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

/// Tracks a pending DHT provider query.
///
/// Providers accumulate across query progress events; the query is cut
/// short once `limit` distinct providers are known.
struct PendingProviderQuery {
    response_tx: oneshot::Sender<Vec<PeerId>>,
    providers: HashSet<PeerId>,
    limit: usize,
}

/// Background event loop that processes swarm events and routes messages.
pub(super) async fn run(
    mut swarm: Swarm<Behaviour>,
    mut command_rx: mpsc::UnboundedReceiver<SwarmCommand>,
    mut shutdown_rx: mpsc::Receiver<()>,
    gossip_tx: mpsc::UnboundedSender<GossipMessage>,
) {
    // Bootstrap Kademlia once, after the first connection.
    let mut kademlia_bootstrapped = false;

    let mut pending_provider_queries: HashMap<kad::QueryId, PendingProviderQuery> = HashMap::new();

    loop {
        tokio::select! {
            // Handle shutdown signal
            _ = shutdown_rx.recv() => {
                info!("Shutting down swarm event loop");
                break;
            }

            Some(cmd) = command_rx.recv() => {
                handle_command(&mut swarm, cmd, &mut pending_provider_queries);
            }

            event = swarm.select_next_some() => {
                handle_event(
                    &mut swarm,
                    event,
                    &mut kademlia_bootstrapped,
                    &mut pending_provider_queries,
                    &gossip_tx,
                );
            }
        }
    }

    // Fail any provider queries still in flight so callers unblock.
    for (_, query) in pending_provider_queries.drain() {
        let _ = query
            .response_tx
            .send(query.providers.into_iter().collect());
    }
}

/// Handle a single command from the adapter.
fn handle_command(
    swarm: &mut Swarm<Behaviour>,
    cmd: SwarmCommand,
    pending_provider_queries: &mut HashMap<kad::QueryId, PendingProviderQuery>,
) {
    match cmd {
        SwarmCommand::Subscribe { topic } => {
            let topic = gossipsub::IdentTopic::new(topic);
            if let Err(e) = swarm.behaviour_mut().gossipsub.subscribe(&topic) {
                warn!(topic = %topic, error = %e, "Failed to subscribe to topic");
            } else {
                info!(topic = %topic, "Subscribed to gossipsub topic");
            }
        }
        SwarmCommand::Publish { topic, data } => {
            let topic = gossipsub::IdentTopic::new(topic);
            let data_len = data.len();
            if let Err(e) = swarm.behaviour_mut().gossipsub.publish(topic.clone(), data) {
                // Duplicates are expected: several peers may publish the
                // same payload and gossipsub deduplicates by message id.
                if matches!(e, gossipsub::PublishError::Duplicate) {
                    trace!(topic = %topic, "Gossipsub duplicate (already delivered)");
                } else {
                    warn!(
                        topic = %topic,
                        data_len,
                        error = ?e,
                        "Failed to publish to gossipsub topic - message may be lost"
                    );
                }
            } else {
                trace!(topic = %topic, data_len, "Published message to gossipsub topic");
            }
        }
        SwarmCommand::Dial { address } => {
            if let Err(e) = swarm.dial(address.clone()) {
                warn!(address = %address, error = %e, "Failed to dial peer");
            }
        }
        SwarmCommand::TopicPeers { topic, response_tx } => {
            let hash = gossipsub::IdentTopic::new(topic).hash();
            let peers: Vec<PeerId> = swarm
                .behaviour()
                .gossipsub
                .all_peers()
                .filter(|(_, topics)| topics.contains(&&hash))
                .map(|(peer, _)| *peer)
                .collect();
            let _ = response_tx.send(peers);
        }
        SwarmCommand::FindProviders {
            key,
            limit,
            response_tx,
        } => {
            if limit == 0 {
                let _ = response_tx.send(Vec::new());
                return;
            }
            let query_id = swarm
                .behaviour_mut()
                .kademlia
                .get_providers(kad::RecordKey::new(&key));
            pending_provider_queries.insert(
                query_id,
                PendingProviderQuery {
                    response_tx,
                    providers: HashSet::new(),
                    limit,
                },
            );
        }
        SwarmCommand::DisconnectPeer { peer } => {
            if swarm.disconnect_peer_id(peer).is_err() {
                debug!(peer = %peer, "Disconnect requested for peer with no connections");
            }
        }
        SwarmCommand::ConnectedPeers { response_tx } => {
            let peers: Vec<PeerId> = swarm.connected_peers().cloned().collect();
            let _ = response_tx.send(peers);
        }
        SwarmCommand::ListenAddresses { response_tx } => {
            let addrs: Vec<Multiaddr> = swarm.listeners().cloned().collect();
            let _ = response_tx.send(addrs);
        }
    }
}

/// Handle a single swarm event.
fn handle_event(
    swarm: &mut Swarm<Behaviour>,
    event: SwarmEvent<BehaviourEvent>,
    kademlia_bootstrapped: &mut bool,
    pending_provider_queries: &mut HashMap<kad::QueryId, PendingProviderQuery>,
    gossip_tx: &mpsc::UnboundedSender<GossipMessage>,
) {
    match event {
        SwarmEvent::ConnectionEstablished {
            peer_id, endpoint, ..
        } => {
            let addr = endpoint.get_remote_address().clone();
            info!(peer = %peer_id, addr = %addr, "Connection established");

            // Feed the routing table so provider lookups can route.
            swarm
                .behaviour_mut()
                .kademlia
                .add_address(&peer_id, addr);

            if !*kademlia_bootstrapped {
                match swarm.behaviour_mut().kademlia.bootstrap() {
                    Ok(_) => {
                        info!("Kademlia bootstrap initiated");
                        *kademlia_bootstrapped = true;
                    }
                    Err(e) => warn!("Failed to bootstrap Kademlia: {:?}", e),
                }
            }
        }

        SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
            debug!(peer = %peer_id, cause = ?cause, "Connection closed");
        }

        SwarmEvent::NewListenAddr { address, .. } => {
            info!(address = %address, "Listening on new address");
        }

        SwarmEvent::Behaviour(BehaviourEvent::Identify(identify::Event::Received {
            peer_id,
            info,
            ..
        })) => {
            debug!(
                peer = %peer_id,
                agent_version = %info.agent_version,
                protocol_version = %info.protocol_version,
                "Identified peer"
            );
        }

        SwarmEvent::Behaviour(BehaviourEvent::Kademlia(kad::Event::OutboundQueryProgressed {
            id,
            result: kad::QueryResult::GetProviders(result),
            step,
            ..
        })) => {
            let finished = step.last;
            if let Some(query) = pending_provider_queries.get_mut(&id) {
                match result {
                    Ok(kad::GetProvidersOk::FoundProviders { providers, .. }) => {
                        query.providers.extend(providers);
                        if query.providers.len() >= query.limit {
                            // Enough providers; cut the walk short.
                            if let Some(mut q) = swarm.behaviour_mut().kademlia.query_mut(&id) {
                                q.finish();
                            }
                        }
                    }
                    Ok(kad::GetProvidersOk::FinishedWithNoAdditionalRecord { .. }) => {}
                    Err(e) => {
                        debug!(error = ?e, "Provider query failed");
                    }
                }
            }
            if finished {
                if let Some(query) = pending_provider_queries.remove(&id) {
                    let providers: Vec<PeerId> = query.providers.into_iter().collect();
                    debug!(count = providers.len(), "Provider query finished");
                    let _ = query.response_tx.send(providers);
                }
            }
        }

        SwarmEvent::Behaviour(BehaviourEvent::Kademlia(kad_event)) => {
            trace!("Kademlia event: {:?}", kad_event);
        }

        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Message {
            propagation_source,
            message,
            ..
        })) => {
            // Decoding happens off this task; forward raw bytes.
            let _ = gossip_tx.send(GossipMessage {
                source: propagation_source,
                topic: message.topic.into_string(),
                data: message.data,
            });
        }

        SwarmEvent::Behaviour(BehaviourEvent::Gossipsub(gossipsub::Event::Subscribed {
            peer_id,
            topic,
        })) => {
            debug!(peer = %peer_id, topic = %topic, "Peer subscribed to topic");
        }

        _ => {}
    }
}
