//! Persistent cache tier storing one file per entry.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use placefinder_core::CacheKey;

use super::{CacheError, CacheTier, CachedEntry, TierKind};

/// Cache tier writing `<key>.json` files into a directory.
///
/// Freshness is judged at read time from the file's modification time
/// against `max_age`. Writes replace files atomically, so concurrent readers
/// never see a partial entry.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: Utf8PathBuf,
    max_age: Duration,
}

impl DiskCache {
    /// Cache rooted at `root`; entries older than `max_age` are misses.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>, max_age: Duration) -> Self {
        Self {
            root: root.into(),
            max_age,
        }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> Utf8PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn error(key: &CacheKey, source: std::io::Error) -> CacheError {
        CacheError {
            tier: TierKind::Disk,
            key: key.clone(),
            source,
        }
    }
}

impl CacheTier for DiskCache {
    fn kind(&self) -> TierKind {
        TierKind::Disk
    }

    fn get(&self, key: &CacheKey) -> Result<Option<CachedEntry>, CacheError> {
        let fresh = placefinder_fs::read_if_fresh(&self.entry_path(key), self.max_age)
            .map_err(|err| Self::error(key, err))?;
        Ok(fresh.map(|file| CachedEntry {
            payload: file.contents,
            remaining: file.remaining,
        }))
    }

    fn put(&self, key: &CacheKey, payload: &[u8], _ttl: Duration) -> Result<(), CacheError> {
        placefinder_fs::write_atomic(&self.entry_path(key), payload)
            .map_err(|err| Self::error(key, err))
    }
}
