//! Category tags that make an OSM feature searchable.
//!
//! The same ordered table drives both query construction (one predicate per
//! category) and display-category resolution (first present tag wins).

use std::collections::BTreeMap;

/// A category tag family searched by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// `tourism=*`
    Tourism,
    /// `amenity=*`
    Amenity,
    /// `shop=*`
    Shop,
    /// `leisure=*`
    Leisure,
    /// `historic=*`
    Historic,
}

/// Categories in priority order.
pub const CATEGORY_PRIORITY: [Category; 5] = [
    Category::Tourism,
    Category::Amenity,
    Category::Shop,
    Category::Leisure,
    Category::Historic,
];

impl Category {
    /// OSM tag key for the category.
    #[must_use]
    pub const fn tag_key(self) -> &'static str {
        match self {
            Self::Tourism => "tourism",
            Self::Amenity => "amenity",
            Self::Shop => "shop",
            Self::Leisure => "leisure",
            Self::Historic => "historic",
        }
    }
}

/// Pick the display category for a tag set.
///
/// Returns the first category from [`CATEGORY_PRIORITY`] present in `tags`
/// together with its tag value.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use placefinder_core::{Category, resolve_category};
///
/// let tags = BTreeMap::from([
///     ("amenity".to_owned(), "cafe".to_owned()),
///     ("tourism".to_owned(), "museum".to_owned()),
/// ]);
/// assert_eq!(resolve_category(&tags), Some((Category::Tourism, "museum")));
/// ```
#[must_use]
pub fn resolve_category(tags: &BTreeMap<String, String>) -> Option<(Category, &str)> {
    CATEGORY_PRIORITY.iter().find_map(|category| {
        tags.get(category.tag_key())
            .map(|value| (*category, value.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    #[rstest]
    #[case(&[("historic", "castle"), ("leisure", "park")], Some((Category::Leisure, "park")))]
    #[case(&[("shop", "books"), ("historic", "yes")], Some((Category::Shop, "books")))]
    #[case(&[("amenity", "cafe"), ("shop", "coffee")], Some((Category::Amenity, "cafe")))]
    #[case(&[("historic", "memorial")], Some((Category::Historic, "memorial")))]
    #[case(&[("name", "Nowhere")], None)]
    fn first_present_category_wins(
        #[case] pairs: &[(&str, &str)],
        #[case] expected: Option<(Category, &str)>,
    ) {
        let tags = tags(pairs);
        assert_eq!(resolve_category(&tags), expected);
    }

    #[rstest]
    fn priority_table_order_is_fixed() {
        let keys: Vec<_> = CATEGORY_PRIORITY.iter().map(|c| c.tag_key()).collect();
        assert_eq!(keys, ["tourism", "amenity", "shop", "leisure", "historic"]);
    }
}
