//! The JSON envelope returned to callers.
//!
//! Every gateway outcome, including validation failures and upstream
//! exhaustion, is expressed as a [`GatewayResponse`]. Optional members are
//! omitted from the serialised form when absent.

use serde::{Deserialize, Serialize};

use crate::PoiResult;

/// Machine-readable failure category carried in the `error` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The search term was missing or blank.
    EmptySearch,
    /// The bounding box exceeded the configured span limits.
    BboxTooLarge,
    /// Every mirror exhausted its retry budget without a usable response.
    OverpassUnreachable,
    /// A mirror answered successfully with a body that could not be used.
    InvalidOverpassResponse,
}

impl ErrorKind {
    /// Wire name of the error, as serialised into the `error` field.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EmptySearch => "empty_search",
            Self::BboxTooLarge => "bbox_too_large",
            Self::OverpassUnreachable => "overpass_unreachable",
            Self::InvalidOverpassResponse => "invalid_overpass_response",
        }
    }

    /// HTTP status a front door should use for this error.
    #[must_use]
    pub const fn http_status(self) -> u16 {
        match self {
            Self::EmptySearch | Self::BboxTooLarge => 400,
            Self::OverpassUnreachable | Self::InvalidOverpassResponse => 502,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured context attached to a response.
///
/// The `kind` tag names which shape is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Results were fetched from a mirror.
    Served {
        /// Mirror that produced the data.
        mirror: String,
        /// Latency of the successful attempt in milliseconds.
        latency_ms: u64,
        /// Number of raw elements received before deduplication.
        elements_received: usize,
        /// Attempts made across all mirrors, including the successful one.
        attempts: u32,
    },
    /// The requested area was too large.
    BboxTooLarge {
        /// Latitude span of the request in degrees.
        lat_span: f64,
        /// Longitude span of the request in degrees.
        lon_span: f64,
        /// Configured latitude maximum.
        max_lat_span: f64,
        /// Configured longitude maximum.
        max_lon_span: f64,
    },
    /// No mirror produced a usable response.
    Unreachable {
        /// Last mirror contacted, if any attempt was made.
        last_mirror: Option<String>,
        /// Description of the last failure.
        last_error: Option<String>,
        /// HTTP status of the last failed attempt, when one was received.
        http_status: Option<u16>,
        /// Attempts made across all mirrors.
        attempts: u32,
        /// Wall-clock time spent in the mirror loop in milliseconds.
        elapsed_ms: u64,
    },
    /// A mirror answered with a body that was not a usable result document.
    InvalidResponse {
        /// Mirror that produced the body.
        mirror: String,
        /// HTTP status that accompanied the body.
        http_status: u16,
        /// Parser error description.
        detail: String,
    },
}

/// Response envelope for a search.
///
/// # Examples
///
/// ```
/// use placefinder_core::{ErrorKind, GatewayResponse};
///
/// let response = GatewayResponse::failure(ErrorKind::EmptySearch, "Please enter a search term.", None);
/// let json = serde_json::to_value(&response).expect("serialise");
/// assert_eq!(json["error"], "empty_search");
/// assert_eq!(json["per_page"], 0);
/// assert!(json.get("diagnostic").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// Page number; results are never paginated, so this is always `1`.
    pub page: u32,
    /// Number of items in `data`.
    pub per_page: usize,
    /// Deduplicated results in upstream order.
    pub data: Vec<PoiResult>,
    /// Failure category, absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Human-readable explanation accompanying `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured context for the outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<Diagnostic>,
}

impl GatewayResponse {
    /// Successful response carrying `data`.
    #[must_use]
    pub fn success(data: Vec<PoiResult>, diagnostic: Diagnostic) -> Self {
        Self {
            page: 1,
            per_page: data.len(),
            data,
            error: None,
            message: None,
            diagnostic: Some(diagnostic),
        }
    }

    /// Failed response with no data.
    #[must_use]
    pub fn failure(
        kind: ErrorKind,
        message: impl Into<String>,
        diagnostic: Option<Diagnostic>,
    ) -> Self {
        Self {
            page: 1,
            per_page: 0,
            data: Vec::new(),
            error: Some(kind),
            message: Some(message.into()),
            diagnostic,
        }
    }

    /// Whether the response reports a failure.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(ErrorKind::EmptySearch, "empty_search", 400)]
    #[case(ErrorKind::BboxTooLarge, "bbox_too_large", 400)]
    #[case(ErrorKind::OverpassUnreachable, "overpass_unreachable", 502)]
    #[case(ErrorKind::InvalidOverpassResponse, "invalid_overpass_response", 502)]
    fn error_kinds_serialise_to_wire_names(
        #[case] kind: ErrorKind,
        #[case] wire: &str,
        #[case] status: u16,
    ) {
        assert_eq!(serde_json::to_value(kind).expect("serialise"), json!(wire));
        assert_eq!(kind.as_str(), wire);
        assert_eq!(kind.http_status(), status);
    }

    #[rstest]
    fn diagnostics_are_tagged_by_kind() {
        let diagnostic = Diagnostic::BboxTooLarge {
            lat_span: 0.6,
            lon_span: 0.8,
            max_lat_span: 0.5,
            max_lon_span: 0.7,
        };

        let value = serde_json::to_value(&diagnostic).expect("serialise");

        assert_eq!(value["kind"], "bbox_too_large");
        assert_eq!(value["lat_span"], 0.6);
        let back: Diagnostic = serde_json::from_value(value).expect("deserialise");
        assert_eq!(back, diagnostic);
    }

    #[rstest]
    fn success_counts_items() {
        let response = GatewayResponse::success(
            Vec::new(),
            Diagnostic::Served {
                mirror: "https://mirror.test/api".to_owned(),
                latency_ms: 120,
                elements_received: 0,
                attempts: 1,
            },
        );

        let value = serde_json::to_value(&response).expect("serialise");

        assert_eq!(value["page"], 1);
        assert_eq!(value["per_page"], 0);
        assert!(value.get("error").is_none());
        assert!(value.get("message").is_none());
        assert_eq!(value["diagnostic"]["kind"], "served");
    }
}
