//! Slice coordinates in the hierarchical ledger.
//!
//! The ledger is partitioned into slices arranged in a three-level
//! hierarchy: a single prime chain, regions under it, and zones under each
//! region. A [`Location`] identifies one slice; its canonical name is the
//! byte string used for gossip topics and DHT content keys, so it must be
//! identical across all peers.

use sbor::prelude::*;
use std::fmt;

/// Identifier of one slice of the ledger. Identity is by value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, BasicSbor)]
pub enum Location {
    /// The prime chain at the top of the hierarchy.
    Prime,
    /// A region chain.
    Region(u8),
    /// A zone chain within a region.
    Zone(u8, u8),
}

impl Location {
    /// Canonical printable name, stable across versions and peers.
    pub fn name(&self) -> String {
        match self {
            Location::Prime => "prime".to_string(),
            Location::Region(r) => format!("region-{r}"),
            Location::Zone(r, z) => format!("zone-{r}-{z}"),
        }
    }

    /// Canonical name as bytes, the preimage for the slice's content key.
    pub fn name_bytes(&self) -> Vec<u8> {
        self.name().into_bytes()
    }

    /// Parse a canonical name back into a location.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "prime" {
            return Some(Location::Prime);
        }
        if let Some(rest) = name.strip_prefix("region-") {
            return rest.parse().ok().map(Location::Region);
        }
        if let Some(rest) = name.strip_prefix("zone-") {
            let (r, z) = rest.split_once('-')?;
            return Some(Location::Zone(r.parse().ok()?, z.parse().ok()?));
        }
        None
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for loc in [
            Location::Prime,
            Location::Region(0),
            Location::Region(7),
            Location::Zone(0, 0),
            Location::Zone(2, 1),
        ] {
            assert_eq!(Location::from_name(&loc.name()), Some(loc));
        }
    }

    #[test]
    fn test_name_identity_matches_value_identity() {
        assert_eq!(Location::Zone(1, 2).name(), Location::Zone(1, 2).name());
        assert_ne!(Location::Zone(1, 2).name(), Location::Zone(2, 1).name());
        assert_ne!(Location::Region(1).name(), Location::Zone(1, 0).name());
    }

    #[test]
    fn test_from_name_rejects_malformed() {
        assert_eq!(Location::from_name(""), None);
        assert_eq!(Location::from_name("zone-1"), None);
        assert_eq!(Location::from_name("zone-a-b"), None);
        assert_eq!(Location::from_name("region-"), None);
        assert_eq!(Location::from_name("galaxy-1"), None);
    }
}
