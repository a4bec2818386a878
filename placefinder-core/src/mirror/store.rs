//! Persistence seam for mirror statistics.

use std::collections::HashMap;

use thiserror::Error;

use super::{MirrorEndpoint, MirrorStats, Observation};

/// Error raised by a [`StatsStore`] backend.
#[derive(Debug, Error)]
#[error("{backend} stats store failed: {source}")]
pub struct StatsStoreError {
    /// Backend that raised the error.
    pub backend: &'static str,
    /// Underlying cause.
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl StatsStoreError {
    /// Wrap a backend error.
    #[must_use]
    pub fn new(
        backend: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            backend,
            source: source.into(),
        }
    }
}

/// Keyed store of [`MirrorStats`] shared by concurrent requests.
///
/// Implementations must apply [`StatsStore::record`] atomically per
/// endpoint: two concurrent observations of the same mirror both land.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::sync::Mutex;
/// use placefinder_core::{MirrorEndpoint, MirrorStats, Observation, StatsStore, StatsStoreError};
///
/// #[derive(Default)]
/// struct InMemory(Mutex<HashMap<MirrorEndpoint, MirrorStats>>);
///
/// impl StatsStore for InMemory {
///     fn backend(&self) -> &'static str { "doc" }
///     fn load_all(&self) -> Result<HashMap<MirrorEndpoint, MirrorStats>, StatsStoreError> {
///         Ok(self.0.lock().map_err(|e| StatsStoreError::new("doc", e.to_string()))?.clone())
///     }
///     fn save(&self, endpoint: &MirrorEndpoint, stats: &MirrorStats) -> Result<(), StatsStoreError> {
///         self.0.lock().map_err(|e| StatsStoreError::new("doc", e.to_string()))?.insert(endpoint.clone(), *stats);
///         Ok(())
///     }
///     fn record(&self, endpoint: &MirrorEndpoint, observation: Observation) -> Result<MirrorStats, StatsStoreError> {
///         let mut map = self.0.lock().map_err(|e| StatsStoreError::new("doc", e.to_string()))?;
///         let entry = map.entry(endpoint.clone()).or_default();
///         entry.record(observation);
///         Ok(*entry)
///     }
/// }
///
/// let store = InMemory::default();
/// let mirror = MirrorEndpoint::from("https://a.test/api");
/// store.record(&mirror, Observation::success(120.0)).expect("record");
/// assert_eq!(store.load_all().expect("load")[&mirror].successes, 1);
/// ```
pub trait StatsStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &'static str;

    /// Snapshot of every known mirror's statistics.
    fn load_all(&self) -> Result<HashMap<MirrorEndpoint, MirrorStats>, StatsStoreError>;

    /// Overwrite the statistics stored for `endpoint`.
    fn save(&self, endpoint: &MirrorEndpoint, stats: &MirrorStats) -> Result<(), StatsStoreError>;

    /// Fold `observation` into the stored statistics for `endpoint` and
    /// return the updated value.
    fn record(
        &self,
        endpoint: &MirrorEndpoint,
        observation: Observation,
    ) -> Result<MirrorStats, StatsStoreError>;
}
