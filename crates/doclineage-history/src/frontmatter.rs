//! YAML front-matter splitting.
//!
//! A document starts with a `---` line, a YAML mapping, and a closing `---`
//! line; everything after is the body. Failures are returned as values,
//! never raised, so one malformed historical version cannot stop a walk.

use chrono::NaiveDate;
use serde_json::{Map, Value};

/// A document split into header and body.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    /// Top-level header fields.
    pub header: Map<String, Value>,
    /// Text after the closing delimiter.
    pub body: String,
}

impl FrontMatter {
    /// String value of header field `key`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.header.get(key).and_then(Value::as_str)
    }
}

/// Why a blob could not be split into front matter and body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseFailure {
    /// The text does not begin with a `---` line.
    #[error("no front matter delimiter at start of document")]
    MissingHeader,
    /// The opening delimiter is never closed.
    #[error("front matter is not terminated")]
    Unterminated,
    /// The header is not valid YAML.
    #[error("invalid YAML in front matter: {0}")]
    Yaml(String),
    /// The header parsed, but not to a mapping.
    #[error("front matter is not a mapping")]
    NotAMapping,
}

/// Split `text` into header and body.
///
/// String values shaped like `YYYY-M-D` that name a real calendar date are
/// rewritten to zero-padded `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns a [`ParseFailure`] describing why the document has no usable header.
///
/// # Examples
///
/// ```
/// use doclineage_history::frontmatter::parse;
///
/// let doc = parse("---\ntitle: Fee market\nstatus: Final\ncreated: 2019-4-13\n---\n\nBody.\n").unwrap();
/// assert_eq!(doc.get_str("status"), Some("Final"));
/// assert_eq!(doc.get_str("created"), Some("2019-04-13"));
/// assert_eq!(doc.body, "\nBody.\n");
/// ```
pub fn parse(text: &str) -> Result<FrontMatter, ParseFailure> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let (first, mut rest) = split_line(text);
    if first.trim_end() != "---" {
        return Err(ParseFailure::MissingHeader);
    }

    let header_start = rest;
    let mut header_len = 0;
    loop {
        if rest.is_empty() {
            return Err(ParseFailure::Unterminated);
        }
        let (line, after) = split_line(rest);
        if line.trim_end() == "---" {
            let yaml = &header_start[..header_len];
            let header = parse_header(yaml)?;
            return Ok(FrontMatter {
                header,
                body: after.to_string(),
            });
        }
        header_len += rest.len() - after.len();
        rest = after;
    }
}

/// Zero-pad a `YYYY-M-D` date, or `None` if `value` is not a valid date of that shape.
///
/// # Examples
///
/// ```
/// use doclineage_history::frontmatter::normalize_date;
///
/// assert_eq!(normalize_date("2023-7-4").as_deref(), Some("2023-07-04"));
/// assert_eq!(normalize_date("2023-02-30"), None);
/// assert_eq!(normalize_date("July 4"), None);
/// ```
pub fn normalize_date(value: &str) -> Option<String> {
    let mut parts = value.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !(all_digits(year) && all_digits(month) && all_digits(day)) {
        return None;
    }
    let date = NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn parse_header(yaml: &str) -> Result<Map<String, Value>, ParseFailure> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    let value: Value =
        serde_yaml::from_str(yaml).map_err(|e| ParseFailure::Yaml(e.to_string()))?;
    let Value::Object(mut header) = value else {
        return Err(ParseFailure::NotAMapping);
    };
    for value in header.values_mut() {
        if let Some(fixed) = value.as_str().and_then(normalize_date) {
            *value = Value::String(fixed);
        }
    }
    Ok(header)
}

/// Split off the first line (without its terminator) from the rest.
fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(i) => (text[..i].trim_end_matches('\r'), &text[i + 1..]),
        None => (text, ""),
    }
}
