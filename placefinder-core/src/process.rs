//! Normalisation and deduplication of upstream elements.

use std::collections::HashSet;

use crate::category::resolve_category;
use crate::poi::{Coordinates, PoiResult, RawElement};

/// Converts raw elements into [`PoiResult`]s.
///
/// The same physical feature often appears as a node, a way and a relation
/// at once. Results are deduplicated on the normalised name plus the
/// coordinates rounded to four decimal places (roughly 11 m), keeping the
/// first element seen.
///
/// # Examples
///
/// ```
/// use placefinder_core::{ResultProcessor, RawElement};
///
/// let elements: Vec<RawElement> = serde_json::from_str(r#"[
///     {"type":"node","id":1,"lat":40.78510,"lon":-73.96850,"tags":{"name":"Central Park","leisure":"park"}},
///     {"type":"way","id":2,"center":{"lat":40.78512,"lon":-73.96849},"tags":{"name":"central park "}}
/// ]"#).expect("elements");
///
/// let results = ResultProcessor.process(elements, 10);
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].source_id, 1);
/// assert_eq!(results[0].category.as_deref(), Some("park"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResultProcessor;

impl ResultProcessor {
    /// Normalise, deduplicate and truncate `elements` to `limit` results.
    #[must_use]
    pub fn process(self, elements: Vec<RawElement>, limit: usize) -> Vec<PoiResult> {
        let mut seen = HashSet::with_capacity(elements.len());
        elements
            .into_iter()
            .map(normalise)
            .filter(|result| seen.insert(dedup_key(result)))
            .take(limit)
            .collect()
    }
}

fn normalise(element: RawElement) -> PoiResult {
    let coordinates = element.coordinates();
    let category = resolve_category(&element.tags).map(|(_, value)| value.to_owned());
    let name = element.tags.get("name").cloned().unwrap_or_default();
    PoiResult {
        source_id: element.id,
        source_kind: element.kind,
        name,
        category,
        coordinates,
        tags: element.tags,
    }
}

fn dedup_key(result: &PoiResult) -> String {
    let name = result.name.trim().to_lowercase();
    match result.coordinates {
        Some(Coordinates { lat, lon }) => format!("{name}|{}|{}", rounded(lat), rounded(lon)),
        None => format!("{name}||"),
    }
}

/// Four-decimal rendering with negative zero folded into zero.
fn rounded(value: f64) -> String {
    let text = format!("{value:.4}");
    match text.strip_prefix('-') {
        Some(magnitude) if magnitude.bytes().all(|b| b == b'0' || b == b'.') => {
            magnitude.to_owned()
        }
        _ => text,
    }
}
