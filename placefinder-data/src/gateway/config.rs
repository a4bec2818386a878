//! Gateway configuration.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use placefinder_core::{BboxLimits, MirrorEndpoint, StatsStoreError};
use placefinder_core::request::DEFAULT_LIMIT;
use thiserror::Error;
use url::Url;

use crate::cache::{DEFAULT_CACHE_TTL, DEFAULT_MEMORY_CAPACITY};
use crate::fetch::RetryPolicy;
use crate::transport::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_USER_AGENT};

/// Public Overpass instances tried when no mirrors are configured.
pub const DEFAULT_MIRRORS: [&str; 3] = [
    "https://overpass-api.de/api/interpreter",
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass.private.coffee/api/interpreter",
];

/// Errors raised while assembling a [`Gateway`](super::Gateway).
#[derive(Debug, Error)]
pub enum GatewayBuildError {
    /// The mirror list is empty.
    #[error("at least one Overpass mirror must be configured")]
    NoMirrors,
    /// A mirror URL does not parse.
    #[error("invalid mirror URL {url:?}: {source}")]
    InvalidMirror {
        /// Offending value.
        url: String,
        /// Parser error.
        #[source]
        source: url::ParseError,
    },
    /// A mirror URL uses a scheme other than HTTP(S).
    #[error("mirror URL {url:?} must use http or https, not {scheme}")]
    UnsupportedScheme {
        /// Offending value.
        url: String,
        /// Scheme found.
        scheme: String,
    },
    /// The retry policy allows no attempts.
    #[error("attempts per mirror must be at least one")]
    ZeroAttempts,
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// The request journal writer could not be started.
    #[error("failed to start request journal {path}: {source}")]
    Journal {
        /// Journal file.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The durable statistics store could not be opened.
    #[error(transparent)]
    Stats(#[from] StatsStoreError),
}

/// Settings for [`Gateway::from_config`](super::Gateway::from_config).
///
/// Storage paths are optional: without a cache directory only the memory
/// cache is used; without a stats path statistics live in memory only;
/// without a journal path events go to the `log` facade.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Candidate mirrors, in tie-break order.
    pub mirrors: Vec<String>,
    /// User agent sent upstream.
    pub user_agent: String,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Retry, timeout and deadline settings.
    pub retry: RetryPolicy,
    /// Lifetime of cached responses.
    pub cache_ttl: Duration,
    /// Maximum number of responses held in memory.
    pub memory_cache_capacity: usize,
    /// Directory for the disk cache.
    pub cache_dir: Option<Utf8PathBuf>,
    /// SQLite database for mirror statistics.
    pub stats_path: Option<Utf8PathBuf>,
    /// File receiving the request journal.
    pub journal_path: Option<Utf8PathBuf>,
    /// Maximum search area.
    pub bbox_limits: BboxLimits,
    /// Result count used when none is requested.
    pub default_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|url| (*url).to_owned()).collect(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry: RetryPolicy::default(),
            cache_ttl: DEFAULT_CACHE_TTL,
            memory_cache_capacity: DEFAULT_MEMORY_CAPACITY,
            cache_dir: None,
            stats_path: None,
            journal_path: None,
            bbox_limits: BboxLimits::default(),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl GatewayConfig {
    /// Replace the mirror list.
    #[must_use]
    pub fn with_mirrors<I, S>(mut self, mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mirrors = mirrors.into_iter().map(Into::into).collect();
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the cache lifetime.
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the memory cache capacity.
    #[must_use]
    pub fn with_memory_cache_capacity(mut self, capacity: usize) -> Self {
        self.memory_cache_capacity = capacity;
        self
    }

    /// Enable the disk cache under `dir`.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Persist statistics in the SQLite database at `path`.
    #[must_use]
    pub fn with_stats_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.stats_path = Some(path.into());
        self
    }

    /// Append journal lines to `path`.
    #[must_use]
    pub fn with_journal_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }

    /// Set the bounding box limits.
    #[must_use]
    pub fn with_bbox_limits(mut self, limits: BboxLimits) -> Self {
        self.bbox_limits = limits;
        self
    }

    /// Set the result count used when none is requested.
    #[must_use]
    pub fn with_default_limit(mut self, default_limit: usize) -> Self {
        self.default_limit = default_limit;
        self
    }

    /// Disk cache directory, if configured.
    #[must_use]
    pub fn cache_dir(&self) -> Option<&Utf8Path> {
        self.cache_dir.as_deref()
    }

    /// Check the mirror list and retry policy, returning parsed endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or malformed mirror list, or a retry
    /// policy allowing zero attempts.
    pub fn validate(&self) -> Result<Vec<MirrorEndpoint>, GatewayBuildError> {
        if self.retry.attempts_per_mirror == 0 {
            return Err(GatewayBuildError::ZeroAttempts);
        }
        if self.mirrors.is_empty() {
            return Err(GatewayBuildError::NoMirrors);
        }
        self.mirrors
            .iter()
            .map(|raw| {
                let url = Url::parse(raw.trim()).map_err(|source| {
                    GatewayBuildError::InvalidMirror {
                        url: raw.clone(),
                        source,
                    }
                })?;
                match url.scheme() {
                    "http" | "https" => Ok(MirrorEndpoint::new(url.as_str())),
                    other => Err(GatewayBuildError::UnsupportedScheme {
                        url: raw.clone(),
                        scheme: other.to_owned(),
                    }),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_name_three_public_mirrors() {
        let endpoints = GatewayConfig::default().validate().expect("defaults valid");

        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints[0].as_str(), DEFAULT_MIRRORS[0]);
    }

    #[rstest]
    #[case::empty(Vec::<String>::new(), "at least one")]
    #[case::garbage(vec!["not a url".to_owned()], "invalid mirror URL")]
    #[case::ftp(vec!["ftp://mirror.test/api".to_owned()], "must use http or https")]
    fn rejects_bad_mirror_lists(#[case] mirrors: Vec<String>, #[case] expected: &str) {
        let err = GatewayConfig::default()
            .with_mirrors(mirrors)
            .validate()
            .expect_err("invalid config");

        assert!(err.to_string().contains(expected), "{err}");
    }

    #[rstest]
    fn rejects_zero_attempts() {
        let config = GatewayConfig::default()
            .with_retry(RetryPolicy::default().with_attempts_per_mirror(0));

        assert!(matches!(config.validate(), Err(GatewayBuildError::ZeroAttempts)));
    }
}
