//! Consensus backend seam.

use lattice_types::{Block, BlockNumber, Hash, Header, Location, Payload};
use libp2p::PeerId;

/// Interface to the consensus backend.
///
/// The networking core calls into this when its cache misses and when
/// gossip arrives; the backend must be safe to call from concurrent
/// handler tasks.
pub trait ConsensusApi: Send + Sync {
    /// Look up a block by hash in the given slice.
    fn lookup_block(&self, hash: Hash, location: Location) -> Option<Block>;

    /// Look up a header by hash in the given slice.
    fn lookup_header(&self, hash: Hash, location: Location) -> Option<Header>;

    /// Resolve the hash of the block at `number` in the given slice.
    ///
    /// Numbers are mutable under reorgs, so there is no cache in front of
    /// this lookup.
    fn lookup_block_hash_by_number(&self, number: &BlockNumber, location: Location)
        -> Option<Hash>;

    /// Ingest a payload received via gossip.
    fn on_new_broadcast(&self, source: PeerId, payload: Payload, location: Location);
}
