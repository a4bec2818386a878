//! Response caching keyed by the finalized query hash.
//!
//! [`CacheManager`] consults its tiers in order. A hit in a slower tier is
//! copied into the faster tiers above it for the lifetime it has left, so a
//! promoted entry never outlives its original TTL. A successful pipeline
//! run writes through to every tier. Tier failures are logged and treated
//! as misses.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};
use placefinder_core::CacheKey;
use thiserror::Error;

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::{DEFAULT_MEMORY_CAPACITY, MemoryCache};

/// Default lifetime of a cached response.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Which kind of storage a tier uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// In-process memory.
    Memory,
    /// Files on local disk.
    Disk,
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Disk => "disk",
        })
    }
}

/// A cache tier failed to read or write an entry.
#[derive(Debug, Error)]
#[error("{tier} cache failed for {key}: {source}")]
pub struct CacheError {
    /// Tier that failed.
    pub tier: TierKind,
    /// Entry involved.
    pub key: CacheKey,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

/// One storage level of the response cache.
pub trait CacheTier: Send + Sync {
    /// Storage kind, used for logging and reply metadata.
    fn kind(&self) -> TierKind;

    /// Fetch a live entry with its remaining lifetime.
    ///
    /// # Errors
    ///
    /// Returns an error when the tier cannot be read; a missing or expired
    /// entry is `Ok(None)`.
    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError>;

    /// Store `payload` under `key` for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns an error when the tier cannot be written.
    fn put(&self, key: &CacheKey, payload: &[u8], ttl: Duration) -> Result<(), CacheError>;
}

/// A live entry read from one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    /// Stored bytes.
    pub payload: Vec<u8>,
    /// Time left before the entry expires.
    pub remaining: Duration,
}

/// A payload found in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHit {
    /// Tier that answered.
    pub tier: TierKind,
    /// Cached response body, byte for byte.
    pub payload: Vec<u8>,
}

/// Ordered set of cache tiers, fastest first.
pub struct CacheManager {
    tiers: Vec<Box<dyn CacheTier>>,
}

impl fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<TierKind> = self.tiers.iter().map(|tier| tier.kind()).collect();
        f.debug_struct("CacheManager").field("tiers", &kinds).finish()
    }
}

impl CacheManager {
    /// Cache consulting `tiers` in the given order.
    #[must_use]
    pub fn new(tiers: Vec<Box<dyn CacheTier>>) -> Self {
        Self { tiers }
    }

    /// Cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Look `key` up, promoting hits into faster tiers for the lifetime the
    /// entry has left.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<CacheHit> {
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.get(key) {
                Ok(Some(entry)) => {
                    debug!(
                        "{} cache hit for {key}, {} ms left",
                        tier.kind(),
                        entry.remaining.as_millis()
                    );
                    for faster in self.tiers.iter().take(index) {
                        if let Err(err) = faster.put(key, &entry.payload, entry.remaining) {
                            warn!("failed to promote cache entry: {err}");
                        }
                    }
                    return Some(CacheHit {
                        tier: tier.kind(),
                        payload: entry.payload,
                    });
                }
                Ok(None) => {}
                Err(err) => warn!("cache tier unavailable, treating as miss: {err}"),
            }
        }
        None
    }

    /// Write `payload` through to every tier.
    pub fn store(&self, key: &CacheKey, payload: &[u8], ttl: Duration) {
        for tier in &self.tiers {
            if let Err(err) = tier.put(key, payload, ttl) {
                warn!("failed to write cache entry: {err}");
            }
        }
    }
}
