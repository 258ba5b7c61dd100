//! DHT content keys for slices.
//!
//! Peers advertise provider records for the slices they serve under a
//! deterministic content identifier derived from the slice's canonical
//! name. The derivation must be byte-identical across all peers or
//! provider lookups silently find nothing.

use cid::Cid;
use lattice_types::Location;
use multihash_codetable::{Code, MultihashDigest};

/// Multicodec code for raw (uninterpreted) bytes.
const RAW_CODEC: u64 = 0x55;

/// Derive the content identifier for a slice.
///
/// `CIDv1(raw, sha2-256(location.name()))`. Two locations map to the
/// same CID exactly when their canonical names are equal.
pub fn location_to_cid(location: &Location) -> Cid {
    let digest = Code::Sha2_256.digest(&location.name_bytes());
    Cid::new_v1(RAW_CODEC, digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        let a = location_to_cid(&Location::Zone(1, 2));
        let b = location_to_cid(&Location::Zone(1, 2));
        assert_eq!(a, b);
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_distinct_names_distinct_cids() {
        let cids = [
            location_to_cid(&Location::Prime),
            location_to_cid(&Location::Region(1)),
            location_to_cid(&Location::Zone(1, 0)),
            location_to_cid(&Location::Zone(0, 1)),
        ];
        for (i, a) in cids.iter().enumerate() {
            for b in &cids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_cid_shape() {
        let cid = location_to_cid(&Location::Prime);
        assert_eq!(cid.version(), cid::Version::V1);
        assert_eq!(cid.codec(), RAW_CODEC);
    }
}
