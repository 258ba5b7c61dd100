//! libp2p swarm adapter: behaviour, command channel, and event loop.

mod behaviour;
mod command;
mod core;
mod error;
mod event_loop;
mod swarm_builder;

pub use self::core::Adapter;
pub use behaviour::PROTOCOL_VERSION;
pub use command::GossipMessage;
pub use error::AdapterError;

pub(crate) use self::core::build_keypair;
