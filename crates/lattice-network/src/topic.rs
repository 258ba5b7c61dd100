//! Gossipsub topic builder/parser.
//!
//! Topics are keyed by `(Location, TypeTag)`:
//!
//! ```text
//! lattice/v1/<location-name>/<tag>
//! ```
//!
//! The string form must be byte-identical across all peers, so it is built
//! only from the canonical location name and tag string.

use lattice_types::{Location, TypeTag};
use std::fmt;

/// Topic namespace prefix, bumped on incompatible topic layout changes.
const TOPIC_PREFIX: &str = "lattice";

/// Topic namespace version.
const TOPIC_VERSION: &str = "v1";

/// A gossip topic for one payload kind in one slice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Topic {
    location: Location,
    tag: TypeTag,
}

impl Topic {
    /// Build the topic for `(location, tag)`.
    pub fn new(location: Location, tag: TypeTag) -> Self {
        Self { location, tag }
    }

    /// The slice this topic covers.
    pub fn location(&self) -> Location {
        self.location
    }

    /// The payload kind this topic carries.
    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    /// Parse a topic string produced by [`fmt::Display`].
    ///
    /// Returns `None` for foreign or malformed topics; the caller drops
    /// such messages.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.split('/');
        if parts.next()? != TOPIC_PREFIX || parts.next()? != TOPIC_VERSION {
            return None;
        }
        let location = Location::from_name(parts.next()?)?;
        let tag = TypeTag::from_str_tag(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { location, tag })
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            TOPIC_PREFIX,
            TOPIC_VERSION,
            self.location.name(),
            self.tag.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let topic = Topic::new(Location::Zone(2, 1), TypeTag::Block);
        assert_eq!(topic.to_string(), "lattice/v1/zone-2-1/block");
    }

    #[test]
    fn test_parse_roundtrip() {
        for location in [Location::Prime, Location::Region(4), Location::Zone(0, 3)] {
            for tag in [
                TypeTag::Block,
                TypeTag::Header,
                TypeTag::Transaction,
                TypeTag::BlockHash,
            ] {
                let topic = Topic::new(location, tag);
                let parsed = Topic::parse(&topic.to_string()).unwrap();
                assert_eq!(parsed, topic);
            }
        }
    }

    #[test]
    fn test_parse_rejects_foreign_topics() {
        assert_eq!(Topic::parse(""), None);
        assert_eq!(Topic::parse("lattice/v1/zone-0-1"), None);
        assert_eq!(Topic::parse("lattice/v2/zone-0-1/block"), None);
        assert_eq!(Topic::parse("other/v1/zone-0-1/block"), None);
        assert_eq!(Topic::parse("lattice/v1/zone-0-1/blob"), None);
        assert_eq!(Topic::parse("lattice/v1/zone-0-1/block/extra"), None);
    }
}
