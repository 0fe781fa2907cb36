//! Bounded fallback cache with TTL expiry and LRU eviction.
//!
//! Every successful execution writes its output here. The cache is only read
//! once all live tiers have failed, so entries trade freshness for
//! availability.

use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};
use tiercast_core::{CacheConfig, Fingerprint, IgnoreLock as _, Tier};

/// A cached inference output with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Output payload
    pub output: Vec<u8>,
    /// Tier that produced the output
    pub tier: Tier,
    /// When the output was produced
    pub created_at: SystemTime,
    /// How long the entry may be served
    pub ttl: Duration,
}

impl CacheEntry {
    /// Creates an entry stamped with the current time
    pub fn new(output: Vec<u8>, tier: Tier, ttl: Duration) -> Self {
        Self {
            output,
            tier,
            created_at: SystemTime::now(),
            ttl,
        }
    }

    /// Override the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: SystemTime) -> Self {
        self.created_at = created_at;
        self
    }

    /// Time since the entry was created; zero if the clock went backwards.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.created_at)
            .unwrap_or(Duration::ZERO)
    }

    /// Checks if this cache entry has expired
    pub fn is_expired(&self) -> bool {
        self.age() > self.ttl
    }

    /// Moment the entry stops being servable; `None` if that is unrepresentable.
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.created_at.checked_add(self.ttl)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of entries in the cache
    pub entries: usize,
    /// Lookups that returned an entry
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed
    pub expirations: u64,
}

struct CacheState {
    entries: LruCache<Fingerprint, CacheEntry>,
    /// Earliest expiry among stored entries, so full caches only scan when
    /// something can actually be purged.
    next_expiry: Option<SystemTime>,
    stats: CacheStats,
}

impl CacheState {
    fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            next_expiry: None,
            stats: CacheStats::default(),
        }
    }

    fn note_expiry(&mut self, entry: &CacheEntry) {
        if let Some(expires_at) = entry.expires_at() {
            self.next_expiry = Some(
                self.next_expiry
                    .map_or(expires_at, |earliest| earliest.min(expires_at)),
            );
        }
    }

    fn purge_expired(&mut self) -> usize {
        let expired: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.entries.pop(key);
        }
        self.next_expiry = self
            .entries
            .iter()
            .filter_map(|(_, entry)| entry.expires_at())
            .min();
        self.stats.expirations += expired.len() as u64;
        expired.len()
    }

    fn purge_if_due(&mut self) {
        if self
            .next_expiry
            .is_some_and(|earliest| earliest <= SystemTime::now())
        {
            self.purge_expired();
        }
    }
}

/// Thread-safe fallback cache keyed by request fingerprint.
pub struct FallbackCache {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

impl FallbackCache {
    /// Creates a new cache with the given configuration
    pub fn new(config: CacheConfig) -> Self {
        Self {
            state: Mutex::new(CacheState::new(config.capacity)),
            config,
        }
    }

    /// Whether the cache stores anything at all.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Gets a cached entry if it exists and hasn't expired
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        if !self.config.enabled {
            return None;
        }

        let mut state = self.state.lock_ignore_poison();
        let expired = match state.entries.peek(fingerprint) {
            None => {
                state.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(),
        };

        if expired {
            state.entries.pop(fingerprint);
            state.stats.expirations += 1;
            state.stats.misses += 1;
            return None;
        }

        state.stats.hits += 1;
        state.entries.get(fingerprint).cloned()
    }

    /// Stores an output produced by `tier` using the configured TTL
    pub fn put(&self, fingerprint: Fingerprint, output: Vec<u8>, tier: Tier) {
        self.put_entry(fingerprint, CacheEntry::new(output, tier, self.config.ttl()));
    }

    /// Stores a prepared entry, replacing any entry for the same fingerprint.
    pub fn put_entry(&self, fingerprint: Fingerprint, entry: CacheEntry) {
        if !self.config.enabled {
            return;
        }

        let mut state = self.state.lock_ignore_poison();
        let replacing = state.entries.contains(&fingerprint);
        if !replacing && state.entries.len() >= state.entries.cap().get() {
            state.purge_if_due();
        }

        state.note_expiry(&entry);
        if let Some((evicted, _)) = state.entries.push(fingerprint, entry) {
            if !replacing {
                state.stats.evictions += 1;
                tracing::trace!(fingerprint = %evicted, "Evicted least recently used cache entry");
            }
        }
    }

    /// Clears all expired entries from the cache, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        self.state.lock_ignore_poison().purge_expired()
    }

    /// Clears all entries from the cache
    pub fn clear(&self) {
        let mut state = self.state.lock_ignore_poison();
        state.entries.clear();
        state.next_expiry = None;
    }

    /// Returns the number of entries in the cache
    pub fn len(&self) -> usize {
        self.state.lock_ignore_poison().entries.len()
    }

    /// Returns whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns cache statistics
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock_ignore_poison();
        CacheStats {
            entries: state.entries.len(),
            ..state.stats
        }
    }
}

impl Default for FallbackCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
