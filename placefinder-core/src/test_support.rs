//! Element builders for tests.

use crate::poi::{Coordinates, ElementKind, RawElement, Tags};

fn tags(name: &str, extra: &[(&str, &str)]) -> Tags {
    let mut tags: Tags = extra
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    tags.insert("name".to_owned(), name.to_owned());
    tags
}

/// A named node at `(lat, lon)` with additional tags.
#[must_use]
pub fn node(id: u64, name: &str, lat: f64, lon: f64, extra: &[(&str, &str)]) -> RawElement {
    RawElement {
        kind: ElementKind::Node,
        id,
        lat: Some(lat),
        lon: Some(lon),
        center: None,
        tags: tags(name, extra),
    }
}

/// A named way or relation with a centroid at `(lat, lon)`.
#[must_use]
pub fn area(
    kind: ElementKind,
    id: u64,
    name: &str,
    lat: f64,
    lon: f64,
    extra: &[(&str, &str)],
) -> RawElement {
    RawElement {
        kind,
        id,
        lat: None,
        lon: None,
        center: Some(Coordinates { lat, lon }),
        tags: tags(name, extra),
    }
}

/// A named relation without any geometry.
#[must_use]
pub fn unplaced(id: u64, name: &str) -> RawElement {
    RawElement {
        kind: ElementKind::Relation,
        id,
        lat: None,
        lon: None,
        center: None,
        tags: tags(name, &[]),
    }
}
