//! Block, header, and transaction payloads.
//!
//! The request/response core treats these bodies as opaque: it moves them
//! between peers and verifies only that a payload's digest matches what was
//! asked for. Interpretation belongs to the consensus backend.

use crate::{BlockNumber, Hash, Location};
use sbor::prelude::*;

/// Block header: the hashed identity of a block.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub struct Header {
    /// Slice this header belongs to.
    pub location: Location,
    /// Position in the slice's chain.
    pub number: BlockNumber,
    /// Digest of the parent header.
    pub parent_hash: Hash,
    /// Commitment to the slice state after this block.
    pub state_root: Hash,
}

impl Header {
    /// Content digest of this header.
    ///
    /// A header hashes identically whether carried alone or inside its
    /// block, so by-hash lookups agree across both payload kinds.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("Header serialization should never fail");
        Hash::from_bytes(&bytes)
    }
}

/// A full block: header plus opaque body bytes.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub struct Block {
    /// The block's header.
    pub header: Header,
    /// Opaque body (transactions, receipts) owned by consensus.
    pub body: Vec<u8>,
}

impl Block {
    /// Content digest of this block, defined as its header digest.
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    /// Slice this block belongs to.
    pub fn location(&self) -> Location {
        self.header.location
    }

    /// Position in the slice's chain.
    pub fn number(&self) -> &BlockNumber {
        &self.header.number
    }
}

/// A transaction: opaque body bound to a slice.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub struct Transaction {
    /// Slice this transaction targets.
    pub location: Location,
    /// Opaque signed transaction bytes.
    pub body: Vec<u8>,
}

impl Transaction {
    /// Content digest of this transaction.
    pub fn hash(&self) -> Hash {
        let bytes = basic_encode(self).expect("Transaction serialization should never fail");
        Hash::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(number: u64) -> Header {
        Header {
            location: Location::Zone(0, 1),
            number: BlockNumber::from(number),
            parent_hash: Hash::from_bytes(b"parent"),
            state_root: Hash::from_bytes(b"state"),
        }
    }

    #[test]
    fn test_header_hash_deterministic() {
        assert_eq!(header(5).hash(), header(5).hash());
        assert_ne!(header(5).hash(), header(6).hash());
    }

    #[test]
    fn test_block_hash_is_header_hash() {
        let block = Block {
            header: header(9),
            body: vec![1, 2, 3],
        };
        assert_eq!(block.hash(), block.header.hash());
        // The body does not alter block identity.
        let mut other = block.clone();
        other.body = vec![4, 5, 6];
        assert_eq!(block.hash(), other.hash());
    }

    #[test]
    fn test_transaction_hash_covers_body() {
        let tx = Transaction {
            location: Location::Prime,
            body: vec![1],
        };
        let other = Transaction {
            location: Location::Prime,
            body: vec![2],
        };
        assert_ne!(tx.hash(), other.hash());
    }
}
