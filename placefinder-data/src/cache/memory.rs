//! Bounded in-process cache tier.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use placefinder_core::CacheKey;

use super::{CacheError, CacheTier, CachedEntry, TierKind};

/// Default number of entries kept in memory.
pub const DEFAULT_MEMORY_CAPACITY: usize = 512;

const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

#[derive(Debug)]
struct Entry {
    payload: Vec<u8>,
    expires_at: Instant,
}

/// Fast cache tier with per-entry expiry and a size bound.
///
/// When full, expired entries are purged first; if that frees nothing, the
/// entry closest to expiry is evicted.
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Entry>>,
    capacity: usize,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl MemoryCache {
    /// Create a cache holding at most `capacity` entries (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Number of stored entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn make_room(entries: &mut HashMap<CacheKey, Entry>, capacity: usize, now: Instant) {
    if entries.len() < capacity {
        return;
    }
    entries.retain(|_, entry| entry.expires_at > now);
    if entries.len() < capacity {
        return;
    }
    let soonest = entries
        .iter()
        .min_by_key(|(_, entry)| entry.expires_at)
        .map(|(key, _)| key.clone());
    if let Some(key) = soonest {
        entries.remove(&key);
    }
}

impl CacheTier for MemoryCache {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(CachedEntry {
                payload: entry.payload.clone(),
                remaining: entry.expires_at.duration_since(now),
            })),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        // Far-future TTLs saturate.
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now);
        let mut entries = self.entries.lock();
        if !entries.contains_key(key) {
            make_room(&mut entries, self.capacity, now);
        }
        entries.insert(
            key.clone(),
            Entry {
                payload: payload.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }
}
