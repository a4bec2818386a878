//! I/O adapters and orchestration for the Placefinder gateway.
//!
//! Responsibilities:
//! - Talk to Overpass mirrors over HTTP and parse their JSON replies.
//! - Persist mirror statistics (memory, SQLite) and cached responses
//!   (memory, disk).
//! - Run the search pipeline end to end in [`gateway::Gateway`].
//!
//! Boundaries:
//! - Do not encode domain rules (live in `placefinder-core`).
//! - Keep blocking storage calls off the async executor threads.
//!
//! Invariants:
//! - Storage faults degrade to cache misses or default rankings; they never
//!   fail a search.
//! - No global mutable state.

pub mod cache;
pub mod fetch;
pub mod gateway;
pub mod journal;
pub mod overpass;
pub mod stats;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

pub use cache::{
    CacheError, CacheHit, CacheManager, CacheTier, CachedEntry, DiskCache, MemoryCache, TierKind,
};
pub use fetch::{FetchExecutor, FetchFailure, FetchSuccess, RetryPolicy};
pub use gateway::{
    Gateway, GatewayBuildError, GatewayComponents, GatewayConfig, GatewayReply, ReplyOrigin,
};
pub use journal::{FileRequestLog, GatewayEvent, LogRequestLog, NullRequestLog, RequestLog};
#[cfg(feature = "store-sqlite")]
pub use stats::SqliteStatsStore;
pub use stats::{MemoryStatsStore, TieredStatsStore};
pub use transport::{HttpMirrorTransport, MirrorReply, MirrorTransport, TransportError};
