//! Caller-supplied bounding boxes and the span guard applied to them.
//!
//! Bounding boxes arrive as `"south,west,north,east"` strings. Anything
//! other than four finite numbers means "no bounding box" rather than an
//! error. Boxes that do parse must stay within [`BboxLimits`].

use geo::{Coord, Rect};

/// Largest accepted latitude span in degrees.
pub const DEFAULT_MAX_LAT_SPAN: f64 = 0.5;
/// Largest accepted longitude span in degrees.
pub const DEFAULT_MAX_LON_SPAN: f64 = 0.7;

/// An axis-aligned WGS84 rectangle.
///
/// Coordinates follow the `geo` convention of `x = longitude` and
/// `y = latitude`. Corners are normalised, so a box given with north below
/// south still describes the same area.
///
/// # Examples
///
/// ```
/// use placefinder_core::BoundingBox;
///
/// let bbox = BoundingBox::parse("48.7,9.1,49.3,9.9").expect("four numbers");
/// assert_eq!(bbox.south(), 48.7);
/// assert_eq!(bbox.east(), 9.9);
/// assert!(BoundingBox::parse("48.7,9.1,49.3").is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    rect: Rect<f64>,
}

impl BoundingBox {
    /// Build a bounding box from its four edges.
    #[must_use]
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            rect: Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north }),
        }
    }

    /// Parse a `"south,west,north,east"` string.
    ///
    /// Returns `None` unless the input holds exactly four finite numbers.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let fields = raw
            .split(',')
            .map(|field| {
                field
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| value.is_finite())
            })
            .collect::<Option<Vec<f64>>>()?;
        match fields.as_slice() {
            [south, west, north, east] => Some(Self::new(*south, *west, *north, *east)),
            _ => None,
        }
    }

    /// Southern edge (minimum latitude).
    #[must_use]
    pub fn south(&self) -> f64 {
        self.rect.min().y
    }

    /// Western edge (minimum longitude).
    #[must_use]
    pub fn west(&self) -> f64 {
        self.rect.min().x
    }

    /// Northern edge (maximum latitude).
    #[must_use]
    pub fn north(&self) -> f64 {
        self.rect.max().y
    }

    /// Eastern edge (maximum longitude).
    #[must_use]
    pub fn east(&self) -> f64 {
        self.rect.max().x
    }

    /// Latitude span in degrees, `|north - south|`.
    #[must_use]
    pub fn lat_span(&self) -> f64 {
        self.rect.height()
    }

    /// Longitude span in degrees, `|east - west|`.
    #[must_use]
    pub fn lon_span(&self) -> f64 {
        self.rect.width()
    }

    /// Borrow the underlying rectangle.
    #[must_use]
    pub const fn as_rect(&self) -> &Rect<f64> {
        &self.rect
    }
}

/// Upper bounds on the area a single search may cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BboxLimits {
    /// Maximum latitude span in degrees.
    pub max_lat_span: f64,
    /// Maximum longitude span in degrees.
    pub max_lon_span: f64,
}

impl Default for BboxLimits {
    fn default() -> Self {
        Self {
            max_lat_span: DEFAULT_MAX_LAT_SPAN,
            max_lon_span: DEFAULT_MAX_LON_SPAN,
        }
    }
}

impl BboxLimits {
    /// Whether `bbox` stays within both span limits.
    #[must_use]
    pub fn admits(&self, bbox: &BoundingBox) -> bool {
        bbox.lat_span() <= self.max_lat_span && bbox.lon_span() <= self.max_lon_span
    }
}
