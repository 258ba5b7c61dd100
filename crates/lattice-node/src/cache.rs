//! Local response cache.
//!
//! Short-circuits repeat by-hash lookups: entries are written on
//! successful peer responses and on inbound block broadcasts, and served
//! before any stream is opened. Entries are immutable once inserted; a
//! re-insert under the same hash replaces the whole entry.

use lattice_types::{Hash, Payload, TypeTag};
use quick_cache::sync::Cache as QuickCache;

/// Default number of cached payloads.
pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

/// Bounded concurrent cache keyed by content hash.
pub struct ResponseCache {
    entries: QuickCache<Hash, Payload>,
}

impl ResponseCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: QuickCache::new(capacity),
        }
    }

    /// Look up `hash`, returning the payload only when its kind matches
    /// `tag`. A hash cached under a different kind is a miss, not an
    /// answer.
    pub fn get(&self, hash: &Hash, tag: TypeTag) -> Option<Payload> {
        self.entries.get(hash).filter(|payload| payload.kind() == tag)
    }

    /// Insert `payload` under its own content hash, replacing any
    /// previous entry.
    pub fn put(&self, payload: Payload) {
        self.entries.insert(payload.hash(), payload);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_types::{Location, Transaction};

    fn tx(body: u8) -> Transaction {
        Transaction {
            location: Location::Zone(0, 0),
            body: vec![body],
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let cache = ResponseCache::new(16);
        let payload = Payload::Transaction(tx(1));
        let hash = payload.hash();

        assert!(cache.get(&hash, TypeTag::Transaction).is_none());
        cache.put(payload.clone());
        assert_eq!(cache.get(&hash, TypeTag::Transaction), Some(payload));
    }

    #[test]
    fn test_tag_mismatch_is_a_miss() {
        let cache = ResponseCache::new(16);
        let payload = Payload::Transaction(tx(2));
        let hash = payload.hash();
        cache.put(payload);

        assert!(cache.get(&hash, TypeTag::Block).is_none());
        assert!(cache.get(&hash, TypeTag::Header).is_none());
    }

    #[test]
    fn test_reinsert_replaces() {
        let cache = ResponseCache::new(16);
        let payload = Payload::Transaction(tx(3));
        let hash = payload.hash();
        cache.put(payload.clone());
        cache.put(payload.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&hash, TypeTag::Transaction), Some(payload));
    }
}
