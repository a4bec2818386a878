//! [`StatsStore`] backends.
//!
//! - [`MemoryStatsStore`]: process-local map behind a mutex.
//! - [`SqliteStatsStore`]: durable store shared across processes.
//! - [`TieredStatsStore`]: ordered fallback chain over other stores.

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use placefinder_core::{MirrorEndpoint, MirrorStats, Observation, StatsStore, StatsStoreError};

#[cfg(feature = "store-sqlite")]
mod sqlite;

#[cfg(feature = "store-sqlite")]
pub use sqlite::SqliteStatsStore;

/// In-process statistics.
///
/// Each `record` reads, updates and writes one entry inside a single
/// critical section.
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    entries: Mutex<HashMap<MirrorEndpoint, MirrorStats>>,
}

impl MemoryStatsStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatsStore for MemoryStatsStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load_all(&self) -> Result<HashMap<MirrorEndpoint, MirrorStats>, StatsStoreError> {
        Ok(self.entries.lock().clone())
    }

    fn save(&self, endpoint: &MirrorEndpoint, stats: &MirrorStats) -> Result<(), StatsStoreError> {
        self.entries.lock().insert(endpoint.clone(), *stats);
        Ok(())
    }

    fn record(
        &self,
        endpoint: &MirrorEndpoint,
        observation: Observation,
    ) -> Result<MirrorStats, StatsStoreError> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(endpoint.clone()).or_default();
        entry.record(observation);
        Ok(*entry)
    }
}

/// Ordered chain of stores, fastest first.
///
/// Reads are served by the first tier holding any statistics; a durable
/// tier that answers after an empty fast tier seeds the faster tiers.
/// Writes go to the most durable tier that accepts them, and the updated
/// value is then copied into every faster tier so all tiers agree.
/// A failing tier is logged at `warn` and skipped.
pub struct TieredStatsStore {
    tiers: Vec<Arc<dyn StatsStore>>,
}

impl std::fmt::Debug for TieredStatsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.tiers.iter().map(|tier| tier.backend()).collect();
        f.debug_struct("TieredStatsStore")
            .field("tiers", &names)
            .finish()
    }
}

impl TieredStatsStore {
    /// Chain `tiers`, fastest first.
    #[must_use]
    pub fn new(tiers: Vec<Arc<dyn StatsStore>>) -> Self {
        Self { tiers }
    }

    fn exhausted(last: Option<StatsStoreError>) -> StatsStoreError {
        last.unwrap_or_else(|| StatsStoreError::new("tiered", "no stats tiers configured"))
    }

    fn seed(&self, faster: usize, snapshot: &HashMap<MirrorEndpoint, MirrorStats>) {
        for tier in self.tiers.iter().take(faster) {
            for (endpoint, stats) in snapshot {
                if let Err(err) = tier.save(endpoint, stats) {
                    warn!("failed to seed {} stats tier: {err}", tier.backend());
                    break;
                }
            }
        }
    }
}

impl StatsStore for TieredStatsStore {
    fn backend(&self) -> &'static str {
        "tiered"
    }

    fn load_all(&self) -> Result<HashMap<MirrorEndpoint, MirrorStats>, StatsStoreError> {
        let mut last_error = None;
        let mut answered = false;
        for (index, tier) in self.tiers.iter().enumerate() {
            match tier.load_all() {
                Ok(snapshot) if !snapshot.is_empty() => {
                    self.seed(index, &snapshot);
                    return Ok(snapshot);
                }
                Ok(_) => answered = true,
                Err(err) => {
                    warn!("{} stats tier unavailable: {err}", tier.backend());
                    last_error = Some(err);
                }
            }
        }
        if answered {
            Ok(HashMap::new())
        } else {
            Err(Self::exhausted(last_error))
        }
    }

    fn save(&self, endpoint: &MirrorEndpoint, stats: &MirrorStats) -> Result<(), StatsStoreError> {
        let mut saved = false;
        let mut last_error = None;
        for tier in &self.tiers {
            match tier.save(endpoint, stats) {
                Ok(()) => saved = true,
                Err(err) => {
                    warn!("{} stats tier rejected save: {err}", tier.backend());
                    last_error = Some(err);
                }
            }
        }
        if saved {
            Ok(())
        } else {
            Err(Self::exhausted(last_error))
        }
    }

    fn record(
        &self,
        endpoint: &MirrorEndpoint,
        observation: Observation,
    ) -> Result<MirrorStats, StatsStoreError> {
        let mut last_error = None;
        for (index, tier) in self.tiers.iter().enumerate().rev() {
            match tier.record(endpoint, observation) {
                Ok(updated) => {
                    for faster in self.tiers.iter().take(index) {
                        if let Err(err) = faster.save(endpoint, &updated) {
                            warn!("failed to mirror stats into {} tier: {err}", faster.backend());
                        }
                    }
                    return Ok(updated);
                }
                Err(err) => {
                    warn!("{} stats tier rejected record: {err}", tier.backend());
                    last_error = Some(err);
                }
            }
        }
        Err(Self::exhausted(last_error))
    }
}
