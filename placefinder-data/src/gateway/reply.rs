//! Replies handed to front doors.

use std::fmt;

use placefinder_core::GatewayResponse;
use serde::Serialize;

/// Where a reply body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyOrigin {
    /// Fetched from a mirror during this request.
    Upstream,
    /// Served from the in-process cache.
    MemoryCache,
    /// Served from the disk cache.
    DiskCache,
    /// Rejected before any upstream work.
    Rejected,
}

impl ReplyOrigin {
    /// Whether the body was served from a cache tier.
    #[must_use]
    pub const fn is_cached(self) -> bool {
        matches!(self, Self::MemoryCache | Self::DiskCache)
    }

    /// Stable name, as used in journal lines and response headers.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::MemoryCache => "memory-cache",
            Self::DiskCache => "disk-cache",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ReplyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded search reply.
///
/// `body` is the JSON [`GatewayResponse`] exactly as it should be sent;
/// cached replies carry the stored bytes unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayReply {
    /// HTTP status for the reply.
    pub status: u16,
    /// Where the body came from.
    pub origin: ReplyOrigin,
    /// JSON body.
    pub body: Vec<u8>,
}

impl GatewayReply {
    /// Decode the body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a valid response envelope.
    pub fn response(&self) -> Result<GatewayResponse, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
