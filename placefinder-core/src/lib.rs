//! Core domain types for the Placefinder gateway.
//!
//! Everything here is pure: request validation, Overpass query
//! construction, mirror scoring and result normalisation. I/O adapters that
//! talk to mirrors, caches and statistics backends live in
//! `placefinder-data`.
//!
//! A search flows through the pieces in this order:
//!
//! 1. [`RequestValidator`] turns raw [`SearchParams`] into a
//!    [`SearchRequest`] or a [`ValidationError`].
//! 2. [`QueryBuilder`] renders the request as an [`OverpassQuery`], whose
//!    [`CacheKey`] identifies cached responses.
//! 3. [`rank_mirrors`] orders [`MirrorEndpoint`]s using [`MirrorStats`]
//!    loaded from a [`StatsStore`].
//! 4. [`ResultProcessor`] converts upstream [`RawElement`]s into
//!    deduplicated [`PoiResult`]s wrapped in a [`GatewayResponse`].
#![forbid(unsafe_code)]

pub mod bbox;
pub mod category;
pub mod mirror;
pub mod poi;
pub mod process;
pub mod query;
pub mod request;
pub mod response;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use bbox::{BboxLimits, BoundingBox};
pub use category::{CATEGORY_PRIORITY, Category, resolve_category};
pub use mirror::{
    MirrorEndpoint, MirrorStats, Observation, RankedMirror, StatsStore, StatsStoreError,
    rank_mirrors,
};
pub use poi::{Coordinates, ElementKind, PoiResult, RawElement, Tags};
pub use process::ResultProcessor;
pub use query::{CacheKey, OverpassQuery, QueryBuilder};
pub use request::{RequestValidator, SearchParams, SearchRequest, ValidationError};
pub use response::{Diagnostic, ErrorKind, GatewayResponse};
