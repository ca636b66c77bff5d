//! Grouping documents into listing pages by type and category.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use doclineage_core::{CatalogConfig, DocumentMetadata};
use serde::Serialize;
use serde_json::Value;

/// Header key/value a listing selects on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingFilter {
    /// Header key (`type` or `category`).
    pub key: String,
    /// Required value.
    pub value: String,
}

/// One listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// URL-safe name, e.g. `standards-track` or `erc`.
    pub slug: String,
    /// Display label.
    pub title: String,
    /// Selection criterion; `None` for the `all` listing.
    pub filter: Option<ListingFilter>,
    /// Matching identifiers in numeric-aware order.
    pub identifiers: Vec<String>,
}

/// Build the `all` listing, one per uncategorised type, and one per category.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use doclineage_core::CatalogConfig;
/// use doclineage_history::listing::build_listings;
///
/// let listings = build_listings(&BTreeMap::new(), &CatalogConfig::default());
/// let slugs: Vec<_> = listings.iter().map(|l| l.slug.as_str()).collect();
/// assert_eq!(slugs, ["all", "informational", "meta", "core", "erc", "interface", "networking"]);
/// ```
pub fn build_listings(
    documents: &BTreeMap<String, DocumentMetadata>,
    config: &CatalogConfig,
) -> Vec<Listing> {
    let mut listings = vec![Listing {
        slug: "all".into(),
        title: "All".into(),
        filter: None,
        identifiers: sorted_ids(documents.keys().map(String::as_str)),
    }];

    for doc_type in &config.types {
        if config.categories.contains_key(doc_type) {
            continue;
        }
        listings.push(filtered(documents, "type", doc_type, doc_type.clone()));
    }
    for doc_type in &config.types {
        let Some(categories) = config.categories.get(doc_type) else {
            continue;
        };
        for category in categories {
            listings.push(filtered(documents, "category", category, title_case(category)));
        }
    }
    listings
}

fn filtered(
    documents: &BTreeMap<String, DocumentMetadata>,
    key: &str,
    value: &str,
    title: String,
) -> Listing {
    let ids = documents
        .iter()
        .filter(|(_, doc)| doc.raw_header_fields.get(key).and_then(Value::as_str) == Some(value))
        .map(|(id, _)| id.as_str());
    Listing {
        slug: slugify(value),
        title,
        filter: Some(ListingFilter {
            key: key.into(),
            value: value.into(),
        }),
        identifiers: sorted_ids(ids),
    }
}

/// Lowercase with spaces replaced by `-`.
pub fn slugify(value: &str) -> String {
    value.to_lowercase().replace(' ', "-")
}

/// Capitalise the first letter of each word and lowercase the rest.
pub fn title_case(value: &str) -> String {
    value
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Numeric identifiers first in numeric order, then the rest lexically.
pub fn compare_identifiers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn sorted_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut ids: Vec<&str> = ids.collect();
    ids.sort_by(|a, b| compare_identifiers(a, b));
    ids.into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;

    fn doc(id: &str, doc_type: &str, category: Option<&str>) -> (String, DocumentMetadata) {
        let mut header = Map::new();
        header.insert("type".into(), Value::String(doc_type.into()));
        if let Some(category) = category {
            header.insert("category".into(), Value::String(category.into()));
        }
        (id.to_string(), DocumentMetadata::new(id, header, String::new()))
    }

    #[test]
    fn documents_land_in_matching_listings() {
        let docs: BTreeMap<_, _> = [
            doc("1559", "Standards Track", Some("Core")),
            doc("20", "Standards Track", Some("ERC")),
            doc("1", "Meta", None),
            doc("721", "Standards Track", Some("ERC")),
        ]
        .into_iter()
        .collect();

        let listings = build_listings(&docs, &CatalogConfig::default());
        let by_slug = |slug: &str| listings.iter().find(|l| l.slug == slug).unwrap();

        assert_eq!(by_slug("all").identifiers, vec!["1", "20", "721", "1559"]);
        assert_eq!(by_slug("erc").identifiers, vec!["20", "721"]);
        assert_eq!(by_slug("erc").title, "Erc");
        assert_eq!(by_slug("core").identifiers, vec!["1559"]);
        assert_eq!(by_slug("meta").identifiers, vec!["1"]);
        assert!(by_slug("informational").identifiers.is_empty());
        assert_eq!(
            by_slug("meta").filter,
            Some(ListingFilter {
                key: "type".into(),
                value: "Meta".into()
            })
        );
    }

    #[test]
    fn slug_and_title_helpers() {
        assert_eq!(slugify("Standards Track"), "standards-track");
        assert_eq!(title_case("last CALL"), "Last Call");
    }

    #[test]
    fn identifiers_sort_numerically_then_lexically() {
        let mut ids = vec!["100", "draft", "9", "alpha"];
        ids.sort_by(|a, b| compare_identifiers(a, b));
        assert_eq!(ids, vec!["9", "100", "alpha", "draft"]);
    }
}
