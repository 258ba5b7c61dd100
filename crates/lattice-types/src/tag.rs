//! Request type tags, selectors, and payloads.
//!
//! Every query on the wire names what it wants with a [`TypeTag`] and how
//! to find it with a [`Selector`]. The tag is the single dispatch point:
//! it decides which selector kind is legal, which handler serves the
//! request, and which [`Payload`] variant a valid response may carry.

use crate::{Block, BlockNumber, Hash, Header, Transaction};
use sbor::prelude::*;

/// Discriminator for what a request asks for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, BasicSbor)]
pub enum TypeTag {
    /// A full block, selected by hash.
    Block,
    /// A block header, selected by hash.
    Header,
    /// A transaction, selected by hash.
    Transaction,
    /// The hash of the block at a given number.
    BlockHash,
}

impl TypeTag {
    /// Returns a string representation for topics and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Block => "block",
            TypeTag::Header => "header",
            TypeTag::Transaction => "transaction",
            TypeTag::BlockHash => "block-hash",
        }
    }

    /// Parse the topic/log representation.
    pub fn from_str_tag(s: &str) -> Option<Self> {
        match s {
            "block" => Some(TypeTag::Block),
            "header" => Some(TypeTag::Header),
            "transaction" => Some(TypeTag::Transaction),
            "block-hash" => Some(TypeTag::BlockHash),
            _ => None,
        }
    }

    /// Whether `selector` is a legal way to query this tag.
    ///
    /// Block, Header, and Transaction are content-addressed; only
    /// BlockHash is queried by number.
    pub fn admits(&self, selector: &Selector) -> bool {
        match self {
            TypeTag::Block | TypeTag::Header | TypeTag::Transaction => {
                matches!(selector, Selector::Hash(_))
            }
            TypeTag::BlockHash => matches!(selector, Selector::Number(_)),
        }
    }
}

/// How a request identifies the entity it wants.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub enum Selector {
    /// Content-addressed lookup.
    Hash(Hash),
    /// Positional lookup within a slice's chain.
    Number(BlockNumber),
}

/// A response body, tagged with its kind.
#[derive(Clone, PartialEq, Eq, Debug, BasicSbor)]
pub enum Payload {
    Block(Block),
    Header(Header),
    Transaction(Transaction),
    BlockHash(Hash),
}

impl Payload {
    /// The tag this payload answers.
    pub fn kind(&self) -> TypeTag {
        match self {
            Payload::Block(_) => TypeTag::Block,
            Payload::Header(_) => TypeTag::Header,
            Payload::Transaction(_) => TypeTag::Transaction,
            Payload::BlockHash(_) => TypeTag::BlockHash,
        }
    }

    /// The payload's self-describing content digest.
    ///
    /// For `BlockHash` the carried hash is the content.
    pub fn hash(&self) -> Hash {
        match self {
            Payload::Block(block) => block.hash(),
            Payload::Header(header) => header.hash(),
            Payload::Transaction(tx) => tx.hash(),
            Payload::BlockHash(hash) => *hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;

    fn hash_selector() -> Selector {
        Selector::Hash(Hash::from_bytes(b"h"))
    }

    fn number_selector() -> Selector {
        Selector::Number(BlockNumber::from(42u64))
    }

    #[test]
    fn test_legality_table() {
        assert!(TypeTag::Block.admits(&hash_selector()));
        assert!(TypeTag::Header.admits(&hash_selector()));
        assert!(TypeTag::Transaction.admits(&hash_selector()));
        assert!(TypeTag::BlockHash.admits(&number_selector()));

        assert!(!TypeTag::Block.admits(&number_selector()));
        assert!(!TypeTag::Header.admits(&number_selector()));
        assert!(!TypeTag::Transaction.admits(&number_selector()));
        assert!(!TypeTag::BlockHash.admits(&hash_selector()));
    }

    #[test]
    fn test_tag_string_roundtrip() {
        for tag in [
            TypeTag::Block,
            TypeTag::Header,
            TypeTag::Transaction,
            TypeTag::BlockHash,
        ] {
            assert_eq!(TypeTag::from_str_tag(tag.as_str()), Some(tag));
        }
        assert_eq!(TypeTag::from_str_tag("blocks"), None);
    }

    #[test]
    fn test_payload_kind_and_hash() {
        let tx = Transaction {
            location: Location::Region(3),
            body: vec![7],
        };
        let expected = tx.hash();
        let payload = Payload::Transaction(tx);
        assert_eq!(payload.kind(), TypeTag::Transaction);
        assert_eq!(payload.hash(), expected);

        let h = Hash::from_bytes(b"answer");
        let payload = Payload::BlockHash(h);
        assert_eq!(payload.kind(), TypeTag::BlockHash);
        assert_eq!(payload.hash(), h);
    }
}
