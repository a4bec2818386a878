//! Overpass QL construction.
//!
//! The builder is a pure function of the validated request: identical
//! requests yield byte-identical query text, which is what makes the query
//! hash usable as a cache key.

use sha2::{Digest, Sha256};

use crate::category::CATEGORY_PRIORITY;
use crate::request::SearchRequest;

/// Server-side execution timeout embedded in every query, in seconds.
pub const UPSTREAM_TIMEOUT_SECS: u32 = 25;

const ELEMENT_TYPES: [&str; 3] = ["node", "way", "relation"];
const WILDCARD: &str = ".*";

/// Escape a term for embedding inside a double-quoted Overpass string.
///
/// # Examples
///
/// ```
/// use placefinder_core::query::escape_term;
///
/// assert_eq!(escape_term(r#"Joe's "Bar" \o/"#), r#"Joe's \"Bar\" \\o/"#);
/// ```
#[must_use]
pub fn escape_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '"') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Turn a term into a separator-insensitive regular expression.
///
/// Runs of whitespace, hyphens and underscores collapse into a single
/// wildcard, and the pattern is wrapped in wildcards on both sides.
///
/// # Examples
///
/// ```
/// use placefinder_core::query::flexible_pattern;
///
/// assert_eq!(flexible_pattern("Mercedes-Benz Museum"), ".*Mercedes.*Benz.*Museum.*");
/// assert_eq!(flexible_pattern("  _cafe_  "), ".*cafe.*");
/// ```
#[must_use]
pub fn flexible_pattern(term: &str) -> String {
    let escaped = escape_term(term);
    let segments: Vec<&str> = escaped
        .split(|ch: char| ch.is_whitespace() || ch == '-' || ch == '_')
        .filter(|segment| !segment.is_empty())
        .collect();
    let mut pattern = String::with_capacity(escaped.len() + WILDCARD.len() * (segments.len() + 1));
    pattern.push_str(WILDCARD);
    pattern.push_str(&segments.join(WILDCARD));
    if !segments.is_empty() {
        pattern.push_str(WILDCARD);
    }
    pattern
}

/// A finalized Overpass QL query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverpassQuery(String);

impl OverpassQuery {
    /// Query text as sent upstream.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper and return the query text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Content hash of the query text.
    #[must_use]
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::for_query(&self.0)
    }
}

impl From<String> for OverpassQuery {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for OverpassQuery {
    fn from(text: &str) -> Self {
        Self(text.to_owned())
    }
}

impl AsRef<str> for OverpassQuery {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::fmt::Display for OverpassQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase hex SHA-256 digest identifying a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hash arbitrary query text.
    #[must_use]
    pub fn for_query(query: &str) -> Self {
        Self(hex::encode(Sha256::digest(query.as_bytes())))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds Overpass QL from validated requests.
///
/// # Examples
///
/// ```
/// use placefinder_core::{QueryBuilder, RequestValidator, SearchParams};
///
/// let request = RequestValidator::default()
///     .validate(&SearchParams::term("Mercedes-Benz Museum").with_limit(5))
///     .expect("valid");
/// let query = QueryBuilder.build(&request);
/// assert!(query.as_str().starts_with("[out:json][timeout:25];"));
/// assert!(query.as_str().contains(r#"node["tourism"]["name"~".*Mercedes.*Benz.*Museum.*",i];"#));
/// assert!(query.as_str().ends_with("out center 5;"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryBuilder;

impl QueryBuilder {
    /// Render the query for `request`.
    #[must_use]
    pub fn build(self, request: &SearchRequest) -> OverpassQuery {
        let pattern = flexible_pattern(request.term());
        let area = request.bbox().map_or_else(String::new, |bbox| {
            format!(
                "({},{},{},{})",
                bbox.south(),
                bbox.west(),
                bbox.north(),
                bbox.east()
            )
        });

        let mut text = format!("[out:json][timeout:{UPSTREAM_TIMEOUT_SECS}];\n(\n");
        for category in CATEGORY_PRIORITY {
            for element in ELEMENT_TYPES {
                text.push_str(&format!(
                    "  {element}[\"{key}\"][\"name\"~\"{pattern}\",i]{area};\n",
                    key = category.tag_key(),
                ));
            }
        }
        text.push_str(&format!(");\nout center {};", request.limit()));
        OverpassQuery(text)
    }
}
