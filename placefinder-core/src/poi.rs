//! Raw upstream elements and the normalised results derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Tag map carried by elements and results.
pub type Tags = BTreeMap<String, String>;

/// OSM element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A single point.
    Node,
    /// An open or closed polyline.
    Way,
    /// A grouping of other elements.
    Relation,
}

/// A WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

/// An element as returned by a mirror.
///
/// Nodes carry `lat`/`lon` directly; ways and relations carry a computed
/// `center` when the query asks for centroids.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawElement {
    /// Element type.
    #[serde(rename = "type")]
    pub kind: ElementKind,
    /// OSM identifier, unique per element type.
    pub id: u64,
    /// Latitude of a point element.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude of a point element.
    #[serde(default)]
    pub lon: Option<f64>,
    /// Centroid of an area element.
    #[serde(default)]
    pub center: Option<Coordinates>,
    /// Raw OSM tags.
    #[serde(default)]
    pub tags: Tags,
}

impl RawElement {
    /// Resolve the element's representative position.
    ///
    /// Point coordinates take precedence over the centroid.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => self.center,
        }
    }
}

/// A normalised search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiResult {
    /// OSM identifier of the source element.
    pub source_id: u64,
    /// Type of the source element.
    pub source_kind: ElementKind,
    /// Display name, empty when the element carried none.
    pub name: String,
    /// Value of the highest-priority category tag.
    pub category: Option<String>,
    /// Representative position, when known.
    pub coordinates: Option<Coordinates>,
    /// Raw tags, passed through unmodified.
    pub tags: Tags,
}
