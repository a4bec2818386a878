//! Outbound transport to Overpass mirrors.
//!
//! [`MirrorTransport`] is the seam between the fetch loop and the network.
//! Transports report every HTTP response, whatever its status, as a
//! [`MirrorReply`]; only failures that produced no response at all are
//! errors.

use std::time::Duration;

use async_trait::async_trait;
use placefinder_core::MirrorEndpoint;
use thiserror::Error;

mod http;

pub use http::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_USER_AGENT, HttpMirrorTransport};

/// An HTTP response received from a mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReply {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl MirrorReply {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures that prevented a response from being received.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The attempt exceeded its time budget.
    #[error("request to {url} timed out after {timeout_ms} ms")]
    Timeout {
        /// Mirror URL.
        url: String,
        /// Budget that was exceeded.
        timeout_ms: u64,
    },
    /// Connection or protocol failure.
    #[error("network error contacting {url}: {message}")]
    Network {
        /// Mirror URL.
        url: String,
        /// Description of the failure.
        message: String,
    },
}

/// Posts Overpass queries to a mirror.
#[async_trait]
pub trait MirrorTransport: Send + Sync {
    /// Send `query` to `mirror` and wait at most `timeout` for the reply.
    async fn post_query(
        &self,
        mirror: &MirrorEndpoint,
        query: &str,
        timeout: Duration,
    ) -> Result<MirrorReply, TransportError>;
}

pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
