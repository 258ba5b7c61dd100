//! libp2p network behaviour definition.

use libp2p::{gossipsub, identify, kad, swarm::NetworkBehaviour, StreamProtocol};
use libp2p_stream as stream;

/// Protocol identifier string, also advertised via identify.
pub(crate) const PROTOCOL_VERSION_STR: &str = "/lattice/1.0.0";

/// Protocol identifier for request/response streams. Used both when
/// opening outbound streams and when accepting inbound ones; negotiation
/// rejects anything else.
pub const PROTOCOL_VERSION: StreamProtocol = StreamProtocol::new(PROTOCOL_VERSION_STR);

/// libp2p network behaviour combining gossipsub, Kademlia, and raw streams.
#[derive(NetworkBehaviour)]
pub(crate) struct Behaviour {
    /// Gossipsub for topic broadcast.
    pub(crate) gossipsub: gossipsub::Behaviour,

    /// Kademlia DHT for slice provider discovery.
    pub(crate) kademlia: kad::Behaviour<kad::store::MemoryStore>,

    /// Raw streams for request/response. The adapter is a dumb pipe; all
    /// timeout logic belongs to the requester.
    pub(crate) stream: stream::Behaviour,

    /// Identify protocol for peer versioning.
    pub(crate) identify: identify::Behaviour,

    /// Connection limits to prevent storms.
    pub(crate) limits: libp2p::connection_limits::Behaviour,
}
