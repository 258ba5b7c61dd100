//! Peer reputation ledger.
//!
//! Tracks observed peer behavior to back the node's peer operations:
//! well-behaving peers are marked lively, slow ones latent, important ones
//! protected, and protocol violators banned. Banned peers are excluded
//! from request fan-out until the process restarts.

use dashmap::DashMap;
use libp2p::PeerId;
use std::time::Instant;

/// Recorded behavior for a single peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Successful, timely interactions.
    pub lively_marks: u64,
    /// Slow or failed interactions.
    pub latent_marks: u64,
    /// Connection is protected from pruning.
    pub protected: bool,
    /// Peer violated the protocol and is excluded.
    pub banned: bool,
    /// Most recent mark of any kind.
    pub last_marked: Option<Instant>,
}

impl Default for PeerRecord {
    fn default() -> Self {
        Self {
            lively_marks: 0,
            latent_marks: 0,
            protected: false,
            banned: false,
            last_marked: None,
        }
    }
}

/// Concurrent per-peer reputation records.
pub struct PeerLedger {
    peers: DashMap<PeerId, PeerRecord>,
}

impl Default for PeerLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Record a well-behaving interaction with `peer`.
    pub fn mark_lively(&self, peer: &PeerId) {
        let mut record = self.peers.entry(*peer).or_default();
        record.lively_marks += 1;
        record.last_marked = Some(Instant::now());
    }

    /// Record a slow or failed interaction with `peer`.
    pub fn mark_latent(&self, peer: &PeerId) {
        let mut record = self.peers.entry(*peer).or_default();
        record.latent_marks += 1;
        record.last_marked = Some(Instant::now());
    }

    /// Protect `peer`'s connection from pruning.
    pub fn protect(&self, peer: &PeerId) {
        self.peers.entry(*peer).or_default().protected = true;
    }

    /// Exclude `peer` from all future fan-out.
    pub fn ban(&self, peer: &PeerId) {
        self.peers.entry(*peer).or_default().banned = true;
    }

    /// Whether `peer` is banned.
    pub fn is_banned(&self, peer: &PeerId) -> bool {
        self.peers.get(peer).map(|r| r.banned).unwrap_or(false)
    }

    /// Whether `peer` is protected.
    pub fn is_protected(&self, peer: &PeerId) -> bool {
        self.peers.get(peer).map(|r| r.protected).unwrap_or(false)
    }

    /// Snapshot of `peer`'s record, if any interaction was recorded.
    pub fn record(&self, peer: &PeerId) -> Option<PeerRecord> {
        self.peers.get(peer).map(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_peer_is_neutral() {
        let ledger = PeerLedger::new();
        let peer = PeerId::random();
        assert!(!ledger.is_banned(&peer));
        assert!(!ledger.is_protected(&peer));
        assert!(ledger.record(&peer).is_none());
    }

    #[test]
    fn test_marks_accumulate() {
        let ledger = PeerLedger::new();
        let peer = PeerId::random();
        ledger.mark_lively(&peer);
        ledger.mark_lively(&peer);
        ledger.mark_latent(&peer);

        let record = ledger.record(&peer).unwrap();
        assert_eq!(record.lively_marks, 2);
        assert_eq!(record.latent_marks, 1);
        assert!(record.last_marked.is_some());
        assert!(!record.banned);
    }

    #[test]
    fn test_ban_sticks() {
        let ledger = PeerLedger::new();
        let peer = PeerId::random();
        ledger.ban(&peer);
        assert!(ledger.is_banned(&peer));

        // Later marks don't lift the ban.
        ledger.mark_lively(&peer);
        assert!(ledger.is_banned(&peer));
    }

    #[test]
    fn test_protect_is_independent_of_marks() {
        let ledger = PeerLedger::new();
        let peer = PeerId::random();
        ledger.protect(&peer);
        assert!(ledger.is_protected(&peer));
        assert!(!ledger.is_banned(&peer));
    }
}
