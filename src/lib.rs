//! Facade crate for the Placefinder search gateway.
//!
//! This crate re-exports the domain types from `placefinder-core` and the
//! gateway, transport and storage adapters from `placefinder-data`. The
//! SQLite statistics store is available behind the `store-sqlite` feature.

#![forbid(unsafe_code)]

pub use placefinder_core::{
    BboxLimits, BoundingBox, CacheKey, Category, Coordinates, Diagnostic, ErrorKind,
    GatewayResponse, MirrorEndpoint, MirrorStats, OverpassQuery, PoiResult, QueryBuilder,
    RankedMirror, RequestValidator, ResultProcessor, SearchParams, SearchRequest, StatsStore,
    StatsStoreError, ValidationError, rank_mirrors,
};

pub use placefinder_data::{
    CacheManager, CacheTier, DiskCache, FetchExecutor, FetchFailure, Gateway, GatewayBuildError,
    GatewayConfig, GatewayReply, HttpMirrorTransport, MemoryCache, MemoryStatsStore,
    MirrorTransport, ReplyOrigin, RequestLog, RetryPolicy, TieredStatsStore,
};

#[cfg(feature = "store-sqlite")]
pub use placefinder_data::SqliteStatsStore;
