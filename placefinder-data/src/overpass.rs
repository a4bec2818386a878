//! Overpass JSON response parsing.
//!
//! See: <https://wiki.openstreetmap.org/wiki/Overpass_API/Output_Formats#JSON>

use log::debug;
use placefinder_core::RawElement;
use serde::Deserialize;

/// Top-level Overpass JSON document.
///
/// Elements are kept as raw JSON values so a single element of an
/// unexpected shape (for example an `area`) does not invalidate the whole
/// response.
#[derive(Debug, Deserialize)]
struct OverpassDocument {
    elements: Vec<serde_json::Value>,
    /// Runtime warnings such as query timeouts reported by the server.
    #[serde(default)]
    remark: Option<String>,
}

/// Elements extracted from a well-formed Overpass response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedElements {
    /// Elements that matched the expected shape, in upstream order.
    pub elements: Vec<RawElement>,
    /// Number of elements skipped because they did not deserialise.
    pub skipped: usize,
    /// Server-side remark, if any.
    pub remark: Option<String>,
}

/// Parse an Overpass JSON body.
///
/// # Errors
///
/// Returns an error when the body is not JSON or lacks an `elements` array.
pub fn parse_elements(body: &[u8]) -> Result<ParsedElements, serde_json::Error> {
    let document: OverpassDocument = serde_json::from_slice(body)?;
    let total = document.elements.len();
    let elements: Vec<RawElement> = document
        .elements
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(element) => Some(element),
            Err(err) => {
                debug!("skipping malformed Overpass element: {err}");
                None
            }
        })
        .collect();
    Ok(ParsedElements {
        skipped: total - elements.len(),
        elements,
        remark: document.remark,
    })
}
