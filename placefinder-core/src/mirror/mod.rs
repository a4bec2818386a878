//! Mirror identities, performance statistics and ranking.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

mod store;

pub use store::{StatsStore, StatsStoreError};

/// Success rate assumed for a mirror that has never been tried.
pub const DEFAULT_SUCCESS_RATE: f64 = 0.5;
/// Latency assumed for a mirror with no latency samples, in milliseconds.
pub const DEFAULT_LATENCY_MS: f64 = 2000.0;
/// Weight given to the newest latency sample.
pub const LATENCY_SMOOTHING: f64 = 0.3;

/// URL of an upstream Overpass interpreter; the identity under which
/// statistics are kept.
///
/// # Examples
///
/// ```
/// use placefinder_core::MirrorEndpoint;
///
/// let endpoint = MirrorEndpoint::from("https://overpass-api.de/api/interpreter");
/// assert_eq!(endpoint.as_str(), "https://overpass-api.de/api/interpreter");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorEndpoint(String);

impl MirrorEndpoint {
    /// Wrap a mirror URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The mirror URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the URL.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<&str> for MirrorEndpoint {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MirrorEndpoint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for MirrorEndpoint {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for MirrorEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of one completed attempt against a mirror.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Whether the mirror produced a valid response.
    pub success: bool,
    /// Round-trip time, when a response was received.
    pub latency_ms: Option<f64>,
}

impl Observation {
    /// A successful attempt.
    #[must_use]
    pub const fn success(latency_ms: f64) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency_ms),
        }
    }

    /// A failed attempt.
    #[must_use]
    pub const fn failure(latency_ms: Option<f64>) -> Self {
        Self {
            success: false,
            latency_ms,
        }
    }
}

/// Accumulated performance of one mirror.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MirrorStats {
    /// Completed attempts.
    pub attempts: u64,
    /// Attempts that produced a valid response; never exceeds `attempts`.
    pub successes: u64,
    /// Exponentially smoothed latency in milliseconds.
    pub avg_latency_ms: Option<f64>,
}

impl MirrorStats {
    /// Fold one observation into the statistics.
    ///
    /// The first positive latency sample seeds the average directly; later
    /// samples are blended with weight [`LATENCY_SMOOTHING`].
    ///
    /// # Examples
    ///
    /// ```
    /// use placefinder_core::{MirrorStats, Observation};
    ///
    /// let mut stats = MirrorStats::default();
    /// stats.record(Observation::success(100.0));
    /// stats.record(Observation::failure(None));
    /// assert_eq!(stats.attempts, 2);
    /// assert_eq!(stats.successes, 1);
    /// assert_eq!(stats.avg_latency_ms, Some(100.0));
    /// ```
    #[expect(
        clippy::float_arithmetic,
        reason = "latency smoothing is defined over floating point samples"
    )]
    pub fn record(&mut self, observation: Observation) {
        self.attempts = self.attempts.saturating_add(1);
        if observation.success {
            self.successes = self.successes.saturating_add(1);
        }
        if let Some(sample) = observation.latency_ms.filter(|ms| *ms > 0.0) {
            self.avg_latency_ms = Some(match self.avg_latency_ms {
                Some(previous) => {
                    LATENCY_SMOOTHING * sample + (1.0 - LATENCY_SMOOTHING) * previous
                }
                None => sample,
            });
        }
    }

    /// Fraction of attempts that succeeded, or [`DEFAULT_SUCCESS_RATE`]
    /// before the first attempt.
    #[must_use]
    #[expect(
        clippy::float_arithmetic,
        reason = "success rate is a ratio of counters"
    )]
    #[expect(
        clippy::cast_precision_loss,
        reason = "attempt counters stay far below 2^52"
    )]
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            DEFAULT_SUCCESS_RATE
        } else {
            self.successes as f64 / self.attempts as f64
        }
    }

    /// Ranking score: reliability dominates, latency breaks near-ties.
    ///
    /// `success_rate × 1000 − avg_latency_ms / 1000`
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "score is a weighted sum")]
    pub fn score(&self) -> f64 {
        let latency = self.avg_latency_ms.unwrap_or(DEFAULT_LATENCY_MS);
        self.success_rate() * 1000.0 - latency / 1000.0
    }
}

/// A mirror paired with the statistics used to rank it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMirror {
    /// The mirror.
    pub endpoint: MirrorEndpoint,
    /// Statistics at ranking time.
    pub stats: MirrorStats,
    /// Score derived from `stats`.
    pub score: f64,
}

/// Order `endpoints` best first.
///
/// Mirrors without statistics are scored from defaults. Equal scores keep
/// their configured order.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use placefinder_core::{MirrorEndpoint, MirrorStats, rank_mirrors};
///
/// let a = MirrorEndpoint::from("https://a.test/api");
/// let b = MirrorEndpoint::from("https://b.test/api");
/// let stats = HashMap::from([
///     (b.clone(), MirrorStats { attempts: 10, successes: 5, avg_latency_ms: Some(100.0) }),
///     (a.clone(), MirrorStats { attempts: 10, successes: 9, avg_latency_ms: Some(500.0) }),
/// ]);
///
/// let ranked = rank_mirrors(&[b.clone(), a.clone()], &stats);
/// assert_eq!(ranked[0].endpoint, a);
/// assert_eq!(ranked[1].endpoint, b);
/// ```
#[must_use]
#[expect(
    clippy::implicit_hasher,
    reason = "stats maps come from StatsStore::load_all"
)]
pub fn rank_mirrors(
    endpoints: &[MirrorEndpoint],
    stats: &HashMap<MirrorEndpoint, MirrorStats>,
) -> Vec<RankedMirror> {
    let mut ranked: Vec<RankedMirror> = endpoints
        .iter()
        .map(|endpoint| {
            let found = stats.get(endpoint).copied().unwrap_or_default();
            RankedMirror {
                endpoint: endpoint.clone(),
                stats: found,
                score: found.score(),
            }
        })
        .collect();
    ranked.sort_by(|left, right| right.score.total_cmp(&left.score));
    ranked
}
