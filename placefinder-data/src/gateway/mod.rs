//! End-to-end search pipeline.
//!
//! [`Gateway::search`] validates the request, builds the Overpass query,
//! consults the cache, ranks mirrors, fetches with failover, normalises the
//! elements and encodes the envelope. It never returns an error: every
//! outcome, including exhaustion of all mirrors, is a [`GatewayReply`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use placefinder_core::{
    CacheKey, Diagnostic, ErrorKind, GatewayResponse, MirrorEndpoint, MirrorStats, QueryBuilder,
    RankedMirror, RequestValidator, ResultProcessor, SearchParams, StatsStore, rank_mirrors,
};
use serde::Deserialize;

use crate::cache::{CacheHit, CacheManager, CacheTier, DiskCache, MemoryCache, TierKind};
use crate::fetch::{FetchExecutor, FetchFailure};
use crate::journal::{FileRequestLog, GatewayEvent, LogRequestLog, RequestLog};
use crate::stats::MemoryStatsStore;
use crate::transport::{HttpMirrorTransport, MirrorTransport, duration_millis};

mod config;
mod reply;

pub use config::{DEFAULT_MIRRORS, GatewayBuildError, GatewayConfig};
pub use reply::{GatewayReply, ReplyOrigin};

/// Message returned when every mirror failed.
pub const UNREACHABLE_MESSAGE: &str =
    "All Overpass mirrors are currently unreachable. Please try again later.";
/// Message returned when a mirror sent an unreadable body.
pub const INVALID_RESPONSE_MESSAGE: &str =
    "The map data service returned an unexpected response. Please try again later.";

const FALLBACK_BODY: &[u8] = br#"{"page":1,"per_page":0,"data":[]}"#;

/// Collaborators injected into a [`Gateway`].
pub struct GatewayComponents {
    /// Outbound transport.
    pub transport: Arc<dyn MirrorTransport>,
    /// Mirror statistics.
    pub stats: Arc<dyn StatsStore>,
    /// Response cache.
    pub cache: CacheManager,
    /// Request journal.
    pub journal: Arc<dyn RequestLog>,
}

/// The Overpass search gateway.
pub struct Gateway {
    mirrors: Vec<MirrorEndpoint>,
    validator: RequestValidator,
    builder: QueryBuilder,
    processor: ResultProcessor,
    cache: Arc<CacheManager>,
    cache_ttl: Duration,
    stats: Arc<dyn StatsStore>,
    executor: FetchExecutor,
    journal: Arc<dyn RequestLog>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("mirrors", &self.mirrors)
            .field("validator", &self.validator)
            .field("cache", &self.cache)
            .field("cache_ttl", &self.cache_ttl)
            .field("stats", &self.stats.backend())
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct ResultCount {
    per_page: usize,
}

impl Gateway {
    /// Assemble a gateway with the HTTP transport and the storage described
    /// by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid configuration, an HTTP client that fails
    /// to build, or a statistics database that cannot be opened.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayBuildError> {
        let transport = HttpMirrorTransport::new(&config.user_agent, config.connect_timeout)
            .map_err(GatewayBuildError::HttpClient)?;
        let mut tiers: Vec<Box<dyn CacheTier>> =
            vec![Box::new(MemoryCache::new(config.memory_cache_capacity))];
        if let Some(dir) = config.cache_dir() {
            tiers.push(Box::new(DiskCache::new(dir.to_owned(), config.cache_ttl)));
        }
        let journal: Arc<dyn RequestLog> = match &config.journal_path {
            Some(path) => Arc::new(FileRequestLog::new(path.clone()).map_err(|source| {
                GatewayBuildError::Journal {
                    path: path.clone(),
                    source,
                }
            })?),
            None => Arc::new(LogRequestLog),
        };
        Self::with_components(
            config,
            GatewayComponents {
                transport: Arc::new(transport),
                stats: open_stats(config)?,
                cache: CacheManager::new(tiers),
                journal,
            },
        )
    }

    /// Assemble a gateway from explicit collaborators.
    ///
    /// Storage paths in `config` are ignored; everything else applies.
    ///
    /// # Errors
    ///
    /// Returns an error when the mirror list or retry policy is invalid.
    pub fn with_components(
        config: &GatewayConfig,
        components: GatewayComponents,
    ) -> Result<Self, GatewayBuildError> {
        let mirrors = config.validate()?;
        let executor = FetchExecutor::new(
            components.transport,
            Arc::clone(&components.stats),
            Arc::clone(&components.journal),
            config.retry,
        );
        Ok(Self {
            mirrors,
            validator: RequestValidator::new(config.bbox_limits, config.default_limit),
            builder: QueryBuilder,
            processor: ResultProcessor,
            cache: Arc::new(components.cache),
            cache_ttl: config.cache_ttl,
            stats: components.stats,
            executor,
            journal: components.journal,
        })
    }

    /// Configured mirrors, in tie-break order.
    #[must_use]
    pub fn mirrors(&self) -> &[MirrorEndpoint] {
        &self.mirrors
    }

    /// Run one search.
    pub async fn search(&self, params: &SearchParams) -> GatewayReply {
        self.journal.record(&GatewayEvent::RequestReceived {
            search: params.search.clone(),
            bbox: params.bbox.clone(),
            limit: params.limit.clone(),
        });

        let request = match self.validator.validate(params) {
            Ok(request) => request,
            Err(err) => {
                self.journal
                    .record(&GatewayEvent::Rejected { kind: err.kind() });
                let response =
                    GatewayResponse::failure(err.kind(), err.user_message(), err.diagnostic());
                return self.finish(&response, ReplyOrigin::Rejected);
            }
        };

        let query = self.builder.build(&request);
        let key = query.cache_key();
        self.journal.record(&GatewayEvent::QueryBuilt {
            key: key.clone(),
            query: query.as_str().to_owned(),
        });

        if let Some(hit) = self.lookup(&key).await {
            return self.replay(&key, hit);
        }

        let ranked = self.ranked_mirrors().await;
        let order: Vec<MirrorEndpoint> = ranked.into_iter().map(|entry| entry.endpoint).collect();
        let response = match self.executor.fetch(&order, &query).await {
            Ok(success) => {
                let received = success.elements.len();
                let data = self.processor.process(success.elements, request.limit());
                GatewayResponse::success(
                    data,
                    Diagnostic::Served {
                        mirror: success.mirror.into_inner(),
                        latency_ms: duration_millis(success.latency),
                        elements_received: received,
                        attempts: success.attempts,
                    },
                )
            }
            Err(failure) => failure_response(failure),
        };

        let reply = self.finish(&response, ReplyOrigin::Upstream);
        if reply.is_success() && response.per_page > 0 && reply.body != FALLBACK_BODY {
            self.store(key, reply.body.clone()).await;
        }
        reply
    }

    /// Current mirror ranking with the statistics behind it.
    pub async fn mirror_report(&self) -> Vec<RankedMirror> {
        self.ranked_mirrors().await
    }

    async fn ranked_mirrors(&self) -> Vec<RankedMirror> {
        let stats = Arc::clone(&self.stats);
        let snapshot: HashMap<MirrorEndpoint, MirrorStats> =
            match tokio::task::spawn_blocking(move || stats.load_all()).await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(err)) => {
                    warn!("mirror statistics unavailable, ranking from defaults: {err}");
                    HashMap::new()
                }
                Err(err) => {
                    warn!("mirror statistics load did not complete: {err}");
                    HashMap::new()
                }
            };
        rank_mirrors(&self.mirrors, &snapshot)
    }

    async fn lookup(&self, key: &CacheKey) -> Option<CacheHit> {
        let cache = Arc::clone(&self.cache);
        let key = key.clone();
        match tokio::task::spawn_blocking(move || cache.lookup(&key)).await {
            Ok(hit) => hit,
            Err(err) => {
                warn!("cache lookup did not complete: {err}");
                None
            }
        }
    }

    async fn store(&self, key: CacheKey, payload: Vec<u8>) {
        let cache = Arc::clone(&self.cache);
        let ttl = self.cache_ttl;
        if let Err(err) =
            tokio::task::spawn_blocking(move || cache.store(&key, &payload, ttl)).await
        {
            warn!("cache write did not complete: {err}");
        }
    }

    fn replay(&self, key: &CacheKey, hit: CacheHit) -> GatewayReply {
        let origin = match hit.tier {
            TierKind::Memory => ReplyOrigin::MemoryCache,
            TierKind::Disk => ReplyOrigin::DiskCache,
        };
        self.journal.record(&GatewayEvent::CacheHit {
            origin,
            key: key.clone(),
        });
        let results = serde_json::from_slice::<ResultCount>(&hit.payload)
            .map_or(0, |count| count.per_page);
        let reply = GatewayReply {
            status: 200,
            origin,
            body: hit.payload,
        };
        self.journal.record(&GatewayEvent::Completed {
            status: reply.status,
            origin,
            results,
            error: None,
        });
        reply
    }

    fn finish(&self, response: &GatewayResponse, origin: ReplyOrigin) -> GatewayReply {
        let status = response.error.map_or(200, ErrorKind::http_status);
        let body = serde_json::to_vec(response).unwrap_or_else(|err| {
            warn!("failed to encode search response: {err}");
            FALLBACK_BODY.to_vec()
        });
        self.journal.record(&GatewayEvent::Completed {
            status,
            origin,
            results: response.per_page,
            error: response.error,
        });
        GatewayReply {
            status,
            origin,
            body,
        }
    }
}

fn failure_response(failure: FetchFailure) -> GatewayResponse {
    match failure {
        FetchFailure::Unreachable {
            last_mirror,
            last_error,
            http_status,
            attempts,
            elapsed,
        } => GatewayResponse::failure(
            ErrorKind::OverpassUnreachable,
            UNREACHABLE_MESSAGE,
            Some(Diagnostic::Unreachable {
                last_mirror: last_mirror.map(MirrorEndpoint::into_inner),
                last_error,
                http_status,
                attempts,
                elapsed_ms: duration_millis(elapsed),
            }),
        ),
        FetchFailure::InvalidResponse {
            mirror,
            http_status,
            detail,
            ..
        } => GatewayResponse::failure(
            ErrorKind::InvalidOverpassResponse,
            INVALID_RESPONSE_MESSAGE,
            Some(Diagnostic::InvalidResponse {
                mirror: mirror.into_inner(),
                http_status,
                detail,
            }),
        ),
    }
}

#[cfg(feature = "store-sqlite")]
fn open_stats(config: &GatewayConfig) -> Result<Arc<dyn StatsStore>, GatewayBuildError> {
    use crate::stats::{SqliteStatsStore, TieredStatsStore};

    let memory: Arc<dyn StatsStore> = Arc::new(MemoryStatsStore::new());
    match &config.stats_path {
        Some(path) => {
            let durable = SqliteStatsStore::open(path)?;
            Ok(Arc::new(TieredStatsStore::new(vec![
                memory,
                Arc::new(durable),
            ])))
        }
        None => Ok(memory),
    }
}

#[cfg(not(feature = "store-sqlite"))]
fn open_stats(config: &GatewayConfig) -> Result<Arc<dyn StatsStore>, GatewayBuildError> {
    if let Some(path) = &config.stats_path {
        warn!("built without SQLite support; statistics for {path} stay in memory");
    }
    Ok(Arc::new(MemoryStatsStore::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryRequestLog, StubReply, StubTransport};
    use rstest::rstest;

    const NODE: &str = r#"{"elements":[{"type":"node","id":7,"lat":52.5163,"lon":13.3777,"tags":{"name":"Brandenburger Tor","historic":"monument"}}]}"#;

    fn gateway(transport: StubTransport) -> (Gateway, Arc<StubTransport>, Arc<MemoryRequestLog>) {
        let transport = Arc::new(transport);
        let journal = Arc::new(MemoryRequestLog::default());
        let config = GatewayConfig::default()
            .with_mirrors(["https://one.test/api/interpreter", "https://two.test/api/interpreter"]);
        let gateway = Gateway::with_components(
            &config,
            GatewayComponents {
                transport: transport.clone(),
                stats: Arc::new(MemoryStatsStore::new()),
                cache: CacheManager::new(vec![Box::new(MemoryCache::new(8))]),
                journal: journal.clone(),
            },
        )
        .expect("gateway builds");
        (gateway, transport, journal)
    }

    fn one() -> MirrorEndpoint {
        MirrorEndpoint::from("https://one.test/api/interpreter")
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn successful_search_is_cached() {
        let (gateway, transport, journal) =
            gateway(StubTransport::new().with_script(&one(), vec![StubReply::elements(NODE)]));
        let params = SearchParams::term("Brandenburger Tor");

        let first = gateway.search(&params).await;
        let second = gateway.search(&params).await;

        assert_eq!(first.status, 200);
        assert_eq!(first.origin, ReplyOrigin::Upstream);
        assert_eq!(second.origin, ReplyOrigin::MemoryCache);
        assert_eq!(second.body, first.body);
        assert_eq!(transport.total_calls(), 1);
        let response = second.response().expect("decode");
        assert_eq!(response.per_page, 1);
        assert_eq!(response.data[0].category.as_deref(), Some("monument"));
        assert!(
            journal
                .lines()
                .last()
                .expect("completion logged")
                .starts_with("response status=200 origin=memory-cache results=1")
        );
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn empty_answers_everywhere_map_to_unreachable() {
        let (gateway, transport, _journal) = gateway(
            StubTransport::new()
                .with_script(&one(), vec![StubReply::empty(), StubReply::empty()])
                .with_script(
                    &MirrorEndpoint::from("https://two.test/api/interpreter"),
                    vec![StubReply::empty(), StubReply::empty()],
                ),
        );
        let params = SearchParams::term("Nowhere");

        let first = gateway.search(&params).await;
        let second = gateway.search(&params).await;

        let response = first.response().expect("decode");
        assert_eq!(first.status, 502);
        assert_eq!(response.error, Some(ErrorKind::OverpassUnreachable));
        assert_eq!(response.per_page, 0);
        let Some(Diagnostic::Unreachable {
            last_mirror,
            last_error,
            attempts,
            ..
        }) = response.diagnostic
        else {
            panic!("expected unreachable diagnostic");
        };
        assert_eq!(attempts, 2);
        assert_eq!(last_error.as_deref(), Some(crate::fetch::NO_ELEMENTS_ERROR));
        assert!(last_mirror.is_some());
        assert_eq!(second.origin, ReplyOrigin::Upstream);
        assert_eq!(transport.total_calls(), 4);
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn exhaustion_maps_to_bad_gateway() {
        let (gateway, _transport, _journal) = gateway(StubTransport::new());

        let reply = gateway.search(&SearchParams::term("Anything")).await;

        let response = reply.response().expect("decode");
        assert_eq!(reply.status, 502);
        assert_eq!(response.error, Some(ErrorKind::OverpassUnreachable));
        assert_eq!(response.message.as_deref(), Some(UNREACHABLE_MESSAGE));
        assert!(matches!(
            response.diagnostic,
            Some(Diagnostic::Unreachable { attempts: 4, .. })
        ));
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn unreadable_body_maps_to_invalid_response() {
        let two = MirrorEndpoint::from("https://two.test/api/interpreter");
        let (gateway, _transport, _journal) = gateway(
            StubTransport::new().with_script(&two, vec![StubReply::body("Service busy")]),
        );

        let reply = gateway.search(&SearchParams::term("Anything")).await;

        let response = reply.response().expect("decode");
        assert_eq!(reply.status, 502);
        assert_eq!(response.error, Some(ErrorKind::InvalidOverpassResponse));
        assert_eq!(response.message.as_deref(), Some(INVALID_RESPONSE_MESSAGE));
    }

    #[rstest]
    #[tokio::test]
    async fn mirror_report_ranks_recorded_failures_last() {
        let (gateway, _transport, _journal) = gateway(StubTransport::new());
        gateway
            .stats
            .save(
                &one(),
                &MirrorStats {
                    attempts: 4,
                    successes: 0,
                    avg_latency_ms: None,
                },
            )
            .expect("seed stats");

        let report = gateway.mirror_report().await;

        assert_eq!(report.len(), 2);
        assert_eq!(report[1].endpoint, one());
        assert_eq!(report[1].stats.attempts, 4);
    }

    #[rstest]
    fn from_config_rejects_empty_mirror_list() {
        let config = GatewayConfig::default().with_mirrors(Vec::<String>::new());

        assert!(matches!(
            Gateway::from_config(&config),
            Err(GatewayBuildError::NoMirrors)
        ));
    }
}
