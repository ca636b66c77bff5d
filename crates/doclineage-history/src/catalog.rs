//! Post-walk presentation of mined metadata.
//!
//! Turns [`DocumentMetadata`] into the header a renderer consumes: derived
//! lifecycle dates merged under their conventional keys (declared header
//! values win), slash-formatted date variants, a prefixed display title,
//! and a structured author list.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use doclineage_core::{CatalogConfig, DocumentMetadata, LifecycleField};
use serde::Serialize;
use serde_json::{Map, Value};

/// One author parsed from the `author` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Author {
    /// Display name.
    pub name: String,
    /// GitHub handle from a `(@handle)` suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    /// Address from a `<email>` suffix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A document ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Canonical identifier.
    pub identifier: String,
    /// Header with derived dates merged in.
    pub header: Map<String, Value>,
    /// Document body.
    pub body: String,
}

/// Build catalog entries for every document not excluded by `config`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use doclineage_core::{CatalogConfig, DocumentMetadata};
/// use doclineage_history::catalog::build_catalog;
///
/// let mut header = serde_json::Map::new();
/// header.insert("title".into(), "Fee market change".into());
/// header.insert("category".into(), "Core".into());
/// let mut docs = BTreeMap::new();
/// docs.insert("1559".to_string(), DocumentMetadata::new("1559", header, String::new()));
///
/// let catalog = build_catalog(&docs, &CatalogConfig::default());
/// assert_eq!(catalog["1559"].header["title"], "EIP-1559: Fee market change");
/// ```
pub fn build_catalog(
    documents: &BTreeMap<String, DocumentMetadata>,
    config: &CatalogConfig,
) -> BTreeMap<String, CatalogEntry> {
    documents
        .iter()
        .filter(|(id, _)| !config.exclude.iter().any(|ex| ex == *id))
        .map(|(id, doc)| (id.clone(), catalog_entry(doc, config)))
        .collect()
}

fn catalog_entry(doc: &DocumentMetadata, config: &CatalogConfig) -> CatalogEntry {
    let mut header = doc.raw_header_fields.clone();

    for field in LifecycleField::ALL {
        let key = field.key();
        if let Some(stamp) = doc.stamp(field) {
            if !header.contains_key(key) {
                header.insert(key.to_string(), Value::String(stamp.iso_date()));
            }
            let commit_key = format!("{key}-commit");
            if !header.contains_key(&commit_key) {
                header.insert(commit_key, Value::String(stamp.commit.clone()));
            }
        }
        let slash = header
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
            .map(|d| format!("{}/{}/{}", d.year(), d.month(), d.day()));
        if let Some(slash) = slash {
            header.insert(format!("{key}-slash"), Value::String(slash));
        }
    }

    if let Some(title) = display_title(&doc.identifier, &header, config) {
        header.insert("title".into(), Value::String(title));
    }
    if let Some(raw) = header.get("author").and_then(Value::as_str) {
        let authors = parse_authors(raw);
        header.insert(
            "author".into(),
            serde_json::to_value(authors).unwrap_or(Value::Null),
        );
    }

    CatalogEntry {
        identifier: doc.identifier.clone(),
        header,
        body: doc.body.clone(),
    }
}

/// `"{PREFIX}-{id}: {title}"`, with the prefix chosen by the `category` header.
pub fn display_title(id: &str, header: &Map<String, Value>, config: &CatalogConfig) -> Option<String> {
    let title = header.get("title").and_then(Value::as_str)?;
    let prefix = header
        .get("category")
        .and_then(Value::as_str)
        .and_then(|c| config.title_prefixes.get(c))
        .unwrap_or(&config.default_title_prefix);
    Some(format!("{prefix}-{id}: {title}"))
}

/// Split an author line into structured entries.
///
/// Entries are separated by commas outside quotes, parentheses and angle
/// brackets.
///
/// # Examples
///
/// ```
/// use doclineage_history::catalog::parse_authors;
///
/// let authors = parse_authors("Vitalik Buterin (@vbuterin), Jane Doe <jane@example.com>");
/// assert_eq!(authors.len(), 2);
/// assert_eq!(authors[0].github.as_deref(), Some("vbuterin"));
/// assert_eq!(authors[1].email.as_deref(), Some("jane@example.com"));
/// ```
pub fn parse_authors(raw: &str) -> Vec<Author> {
    split_top_level(raw)
        .into_iter()
        .filter_map(parse_author)
        .collect()
}

fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            '(' | '<' if !quoted => depth += 1,
            ')' | '>' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_author(part: &str) -> Option<Author> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }
    let name_end = part.find(['(', '<']).unwrap_or(part.len());
    let name = part[..name_end].trim().trim_matches('"').trim().to_string();
    if name.is_empty() {
        return None;
    }
    let github = between(part, "(@", ")").map(str::to_string);
    let email = between(part, "<", ">").map(str::to_string);
    Some(Author {
        name,
        github,
        email,
    })
}

fn between<'a>(text: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let len = text[start..].find(close)?;
    let inner = text[start..start + len].trim();
    (!inner.is_empty()).then_some(inner)
}
