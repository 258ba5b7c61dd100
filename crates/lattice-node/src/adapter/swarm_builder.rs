//! Swarm construction with QUIC/TCP transport configuration.

use super::behaviour::Behaviour;
use super::error::AdapterError;
use crate::config::NodeConfig;
use futures::future::Either;
use libp2p::core::muxing::StreamMuxerBox;
use libp2p::core::transport::{OrTransport, Transport};
use libp2p::core::upgrade::Version;
use libp2p::{identity, Swarm, SwarmBuilder};
use tracing::info;

/// Apply transport tuning shared by both build paths.
fn apply_quic_tuning(quic_config: &mut libp2p::quic::Config, app_config: &NodeConfig) {
    // Handshake timeout well under the request deadline so unreachable
    // peers fail the attempt, not the dispatcher round.
    quic_config.handshake_timeout = app_config.request_timeout / 2;
    quic_config.keep_alive_interval = app_config.keep_alive_interval;
    // Idle timeout must exceed the keep-alive interval or pings can't
    // keep the connection open.
    quic_config.max_idle_timeout = app_config.idle_connection_timeout.as_millis() as u32;
}

/// Build a configured libp2p Swarm with QUIC transport and optional TCP fallback.
pub(super) fn build_swarm(
    config: &NodeConfig,
    keypair: identity::Keypair,
    behaviour: Behaviour,
) -> Result<Swarm<Behaviour>, AdapterError> {
    if config.tcp_fallback_enabled {
        info!("Building swarm with QUIC (primary) + TCP (fallback)");

        let mut quic_config = libp2p::quic::Config::new(&keypair);
        apply_quic_tuning(&mut quic_config, config);

        let quic_transport = libp2p::quic::tokio::Transport::new(quic_config)
            .map(|(p, c), _| (p, StreamMuxerBox::new(c)));

        let tcp_transport =
            libp2p::tcp::tokio::Transport::new(libp2p::tcp::Config::default().nodelay(true))
                .upgrade(Version::V1)
                .authenticate(
                    libp2p::noise::Config::new(&keypair)
                        .map_err(|e| AdapterError::Network(e.to_string()))?,
                )
                .multiplex(libp2p::yamux::Config::default())
                .map(|(p, c), _| (p, StreamMuxerBox::new(c)));

        // Prioritize QUIC by putting it first (Left side of OrTransport)
        let transport =
            OrTransport::new(quic_transport, tcp_transport).map(|either, _| match either {
                Either::Left((peer_id, muxer)) => (peer_id, muxer),
                Either::Right((peer_id, muxer)) => (peer_id, muxer),
            });

        Ok(SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_other_transport(|_| transport)
            .unwrap() // Unwrap Infallible error from transport add
            .with_behaviour(|_| behaviour)
            .map_err(|e| {
                AdapterError::Network(format!("Failed to configure swarm behaviour: {:?}", e))
            })?
            .with_swarm_config(|c| {
                c.with_idle_connection_timeout(config.idle_connection_timeout)
            })
            .build())
    } else {
        info!("Building swarm with QUIC only (TCP fallback disabled)");
        Ok(SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_quic_config(|mut quic_config| {
                apply_quic_tuning(&mut quic_config, config);
                quic_config
            })
            .with_behaviour(|_| behaviour)
            .map_err(|e| {
                AdapterError::Network(format!("Failed to configure swarm behaviour: {:?}", e))
            })?
            .with_swarm_config(|c| {
                c.with_idle_connection_timeout(config.idle_connection_timeout)
            })
            .build())
    }
}
