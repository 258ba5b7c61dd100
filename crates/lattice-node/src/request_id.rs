//! Request identifier registry.
//!
//! Correlates outbound requests with inbound responses across concurrent
//! streams. Each node owns one registry instance; ids are unique for the
//! life of the process and tracked while their request is outstanding.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use thiserror::Error;

/// Errors from registry misuse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id is already pending; generated ids are registered once.
    #[error("request id {0} is already pending")]
    DuplicateRequestId(u32),
}

/// Issues request ids and tracks which are outstanding.
///
/// All operations are safe under concurrent callers; there are no ordering
/// guarantees beyond each operation being atomic.
pub struct RequestIdRegistry {
    next: AtomicU32,
    pending: DashMap<u32, ()>,
}

impl Default for RequestIdRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(0),
            pending: DashMap::new(),
        }
    }

    /// Return an id never previously returned by this registry.
    ///
    /// # Panics
    ///
    /// Panics when the 32-bit id space is exhausted. Reaching 2^32
    /// lifetime requests means the node has leaked ids or run far past
    /// any sane restart horizon; wrapping would silently alias pending
    /// requests, so this is treated as a fatal logic error.
    pub fn generate(&self) -> u32 {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        if id == u32::MAX {
            panic!("request id space exhausted");
        }
        id
    }

    /// Track `id` as outstanding.
    pub fn add(&self, id: u32) -> Result<(), RegistryError> {
        match self.pending.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(RegistryError::DuplicateRequestId(id))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(());
                Ok(())
            }
        }
    }

    /// Stop tracking `id`. Returns whether it was pending.
    ///
    /// A late or duplicate response may race the original removal, so an
    /// absent id is not an error.
    pub fn remove(&self, id: u32) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Whether `id` is currently outstanding.
    pub fn is_pending(&self, id: u32) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of outstanding requests.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_generate_is_unique_and_monotonic() {
        let registry = RequestIdRegistry::new();
        let ids: Vec<u32> = (0..100).map(|_| registry.generate()).collect();
        let unique: HashSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_generate_unique_under_concurrency() {
        let registry = Arc::new(RequestIdRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                (0..1000).map(|_| registry.generate()).collect::<Vec<u32>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), 8000);
    }

    #[test]
    fn test_add_remove_lifecycle() {
        let registry = RequestIdRegistry::new();
        let id = registry.generate();

        assert!(!registry.is_pending(id));
        registry.add(id).unwrap();
        assert!(registry.is_pending(id));
        assert_eq!(registry.pending_count(), 1);

        assert!(registry.remove(id));
        assert!(!registry.is_pending(id));
        assert_eq!(registry.pending_count(), 0);
    }

    #[test]
    fn test_add_twice_fails() {
        let registry = RequestIdRegistry::new();
        let id = registry.generate();
        registry.add(id).unwrap();
        assert_eq!(
            registry.add(id),
            Err(RegistryError::DuplicateRequestId(id))
        );
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let registry = RequestIdRegistry::new();
        assert!(!registry.remove(1234));
    }
}
