//! Snapshot cache (component D): per-pool last snapshot, consecutive
//! error count, stale flag. Owned by the price monitor; the detector
//! holds only a read reference (see `monitor.rs`, `detector.rs`).

use crate::types::PriceSnapshot;
use dashmap::DashMap;
use std::sync::Arc;

/// One pool's cache entry.
#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub snapshot: Option<PriceSnapshot>,
    pub consecutive_errors: u32,
    pub last_refresh_block: u64,
    pub stale: bool,
}

/// Thread-safe, lowercased-address-keyed pool state store. Single-writer
/// (the monitor's poll cycle); readers may observe a snapshot that is one
/// cycle old — see §5 concurrency model.
#[derive(Clone)]
pub struct SnapshotCache {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    fn key(addr_lowercase: &str) -> String {
        addr_lowercase.to_ascii_lowercase()
    }

    /// Records a successful fetch: stores the snapshot, resets the error
    /// counter to zero, advances `last_refresh_block`, and clears the
    /// stale flag. Returns `true` if this call cleared a previously-set
    /// stale flag (a recovery edge the monitor should emit `price_update`
    /// for in a way the detector's stale set can observe).
    pub fn record_success(&self, addr_lowercase: &str, snapshot: PriceSnapshot, block: u64) -> bool {
        let mut entry = self.entries.entry(Self::key(addr_lowercase)).or_default();
        let was_stale = entry.stale;
        entry.snapshot = Some(snapshot);
        entry.consecutive_errors = 0;
        entry.last_refresh_block = block;
        entry.stale = false;
        was_stale
    }

    /// Records a failure: increments the error counter. Returns `true`
    /// exactly the first time the counter crosses `max_retries` (the
    /// caller emits `stale` on that transition only).
    pub fn record_error(&self, addr_lowercase: &str, max_retries: u32) -> bool {
        let mut entry = self.entries.entry(Self::key(addr_lowercase)).or_default();
        entry.consecutive_errors += 1;
        if entry.consecutive_errors >= max_retries && !entry.stale {
            entry.stale = true;
            return true;
        }
        false
    }

    pub fn get(&self, addr_lowercase: &str) -> Option<CacheEntry> {
        self.entries.get(&Self::key(addr_lowercase)).map(|e| e.clone())
    }

    pub fn is_stale(&self, addr_lowercase: &str) -> bool {
        self.entries
            .get(&Self::key(addr_lowercase))
            .map(|e| e.stale)
            .unwrap_or(false)
    }

    pub fn all_snapshots(&self) -> Vec<PriceSnapshot> {
        self.entries
            .iter()
            .filter_map(|e| e.value().snapshot.clone())
            .collect()
    }

    pub fn list_all(&self) -> Vec<(String, CacheEntry)> {
        self.entries.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}
