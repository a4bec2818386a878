//! Validation of raw search parameters.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bbox::{BboxLimits, BoundingBox};
use crate::response::{Diagnostic, ErrorKind};

/// Number of results returned when the caller does not ask for a count.
pub const DEFAULT_LIMIT: usize = 10;

/// Raw, untrusted search parameters as received from a caller.
///
/// Field names match the query-string parameters accepted by front doors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Free-text place name.
    #[serde(default)]
    pub search: Option<String>,
    /// `"south,west,north,east"` filter.
    #[serde(default)]
    pub bbox: Option<String>,
    /// Requested result count.
    #[serde(default)]
    pub limit: Option<String>,
}

impl SearchParams {
    /// Parameters carrying only a search term.
    #[must_use]
    pub fn term(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }

    /// Attach a bounding box string.
    #[must_use]
    pub fn with_bbox(mut self, bbox: impl Into<String>) -> Self {
        self.bbox = Some(bbox.into());
        self
    }

    /// Attach a result limit.
    #[must_use]
    pub fn with_limit(mut self, limit: impl ToString) -> Self {
        self.limit = Some(limit.to_string());
        self
    }
}

/// A validated search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    term: String,
    bbox: Option<BoundingBox>,
    limit: usize,
}

impl SearchRequest {
    /// Trimmed, non-empty search term.
    #[must_use]
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Optional geographic filter.
    #[must_use]
    pub const fn bbox(&self) -> Option<&BoundingBox> {
        self.bbox.as_ref()
    }

    /// Maximum number of results.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

/// Reasons a search is rejected before any upstream work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The term was missing or contained only whitespace.
    #[error("search term is empty")]
    EmptySearch,
    /// The bounding box covered too large an area.
    #[error(
        "bounding box spans {lat_span:.3}° latitude and {lon_span:.3}° longitude, \
         limits are {max_lat_span}° and {max_lon_span}°"
    )]
    BboxTooLarge {
        /// Requested latitude span in degrees.
        lat_span: f64,
        /// Requested longitude span in degrees.
        lon_span: f64,
        /// Configured latitude limit.
        max_lat_span: f64,
        /// Configured longitude limit.
        max_lon_span: f64,
    },
}

impl ValidationError {
    /// Error category reported to the caller.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptySearch => ErrorKind::EmptySearch,
            Self::BboxTooLarge { .. } => ErrorKind::BboxTooLarge,
        }
    }

    /// Message suitable for showing to an end user.
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::EmptySearch => "Please enter a search term.",
            Self::BboxTooLarge { .. } => {
                "The visible map area is too large to search. Zoom in to narrow the viewport and try again."
            }
        }
    }

    /// Structured detail, when the error carries any.
    #[must_use]
    pub const fn diagnostic(&self) -> Option<Diagnostic> {
        match *self {
            Self::EmptySearch => None,
            Self::BboxTooLarge {
                lat_span,
                lon_span,
                max_lat_span,
                max_lon_span,
            } => Some(Diagnostic::BboxTooLarge {
                lat_span,
                lon_span,
                max_lat_span,
                max_lon_span,
            }),
        }
    }
}

/// Turns [`SearchParams`] into a [`SearchRequest`].
///
/// # Examples
///
/// ```
/// use placefinder_core::{RequestValidator, SearchParams, ValidationError};
///
/// let validator = RequestValidator::default();
/// let request = validator
///     .validate(&SearchParams::term("  Eiffel Tower ").with_limit(0))
///     .expect("valid request");
/// assert_eq!(request.term(), "Eiffel Tower");
/// assert_eq!(request.limit(), 10);
///
/// let rejected = validator.validate(&SearchParams::term("   "));
/// assert_eq!(rejected, Err(ValidationError::EmptySearch));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestValidator {
    bbox_limits: BboxLimits,
    default_limit: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self {
            bbox_limits: BboxLimits::default(),
            default_limit: DEFAULT_LIMIT,
        }
    }
}

impl RequestValidator {
    /// Build a validator with explicit bounds.
    ///
    /// A `default_limit` of zero is replaced by [`DEFAULT_LIMIT`].
    #[must_use]
    pub fn new(bbox_limits: BboxLimits, default_limit: usize) -> Self {
        let default_limit = if default_limit == 0 {
            DEFAULT_LIMIT
        } else {
            default_limit
        };
        Self {
            bbox_limits,
            default_limit,
        }
    }

    /// Configured bounding box limits.
    #[must_use]
    pub const fn bbox_limits(&self) -> BboxLimits {
        self.bbox_limits
    }

    /// Validate raw parameters.
    ///
    /// A malformed bounding box is dropped rather than rejected, and a
    /// missing, non-positive or non-numeric limit falls back to the default.
    pub fn validate(&self, params: &SearchParams) -> Result<SearchRequest, ValidationError> {
        let term = params.search.as_deref().map(str::trim).unwrap_or_default();
        if term.is_empty() {
            return Err(ValidationError::EmptySearch);
        }

        let bbox = params.bbox.as_deref().and_then(BoundingBox::parse);
        if let Some(found) = bbox.as_ref() {
            if !self.bbox_limits.admits(found) {
                return Err(ValidationError::BboxTooLarge {
                    lat_span: found.lat_span(),
                    lon_span: found.lon_span(),
                    max_lat_span: self.bbox_limits.max_lat_span,
                    max_lon_span: self.bbox_limits.max_lon_span,
                });
            }
        }

        Ok(SearchRequest {
            term: term.to_owned(),
            bbox,
            limit: self.resolve_limit(params.limit.as_deref()),
        })
    }

    fn resolve_limit(&self, raw: Option<&str>) -> usize {
        raw.and_then(|value| value.trim().parse::<i64>().ok())
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0)
            .unwrap_or(self.default_limit)
    }
}
