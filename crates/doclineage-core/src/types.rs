use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::StatusConfig;

/// A lifecycle date together with the commit it was derived from.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use doclineage_core::Stamp;
///
/// let stamp = Stamp::new(Utc.with_ymd_and_hms(2023, 7, 4, 12, 0, 0).unwrap(), "abc123");
/// assert_eq!(stamp.iso_date(), "2023-07-04");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stamp {
    /// Committer timestamp of the originating commit.
    pub date: DateTime<Utc>,
    /// Full hex id of the originating commit.
    pub commit: String,
}

impl Stamp {
    /// Create a stamp from a date and a commit id.
    pub fn new(date: DateTime<Utc>, commit: impl Into<String>) -> Self {
        Self {
            date,
            commit: commit.into(),
        }
    }

    /// `YYYY-MM-DD` rendering of the date.
    pub fn iso_date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// The derived lifecycle fields of a document.
///
/// # Examples
///
/// ```
/// use doclineage_core::LifecycleField;
///
/// assert_eq!(LifecycleField::LastStatusChange.key(), "last-status-change");
/// assert_eq!(LifecycleField::ALL.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifecycleField {
    /// Date the document was introduced.
    Created,
    /// Date of the most recent change to the document.
    LastUpdated,
    /// Date the status header last changed.
    LastStatusChange,
    /// Date the document entered a terminal status.
    Finalized,
}

impl LifecycleField {
    /// Every lifecycle field.
    pub const ALL: [LifecycleField; 4] = [
        LifecycleField::Created,
        LifecycleField::LastUpdated,
        LifecycleField::LastStatusChange,
        LifecycleField::Finalized,
    ];

    /// Header key used when the field is merged into front matter.
    pub fn key(self) -> &'static str {
        match self {
            LifecycleField::Created => "created",
            LifecycleField::LastUpdated => "last-updated",
            LifecycleField::LastStatusChange => "last-status-change",
            LifecycleField::Finalized => "finalized",
        }
    }
}

impl fmt::Display for LifecycleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Lifecycle metadata mined for one canonical document.
///
/// Header and body come from the first version encountered in a
/// newest-first walk, i.e. the document's current state. Lifecycle stamps
/// are filled lazily and never overwritten once set.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use doclineage_core::{DocumentMetadata, LifecycleField, Stamp};
///
/// let mut doc = DocumentMetadata::new("1559", Default::default(), "body".into());
/// let first = Stamp::new(Utc.timestamp_opt(2_000, 0).unwrap(), "bbb");
/// let second = Stamp::new(Utc.timestamp_opt(1_000, 0).unwrap(), "aaa");
///
/// assert!(doc.fill(LifecycleField::LastUpdated, first.clone()));
/// assert!(!doc.fill(LifecycleField::LastUpdated, second));
/// assert_eq!(doc.stamp(LifecycleField::LastUpdated), Some(&first));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Canonical document identifier.
    pub identifier: String,
    /// Introduction of the document.
    pub created_at: Option<Stamp>,
    /// Most recent change.
    pub last_updated_at: Option<Stamp>,
    /// Most recent status transition.
    pub last_status_change_at: Option<Stamp>,
    /// Transition into a terminal status.
    pub finalized_at: Option<Stamp>,
    /// Front-matter fields exactly as parsed.
    pub raw_header_fields: Map<String, Value>,
    /// Document text after the front matter.
    pub body: String,
}

impl DocumentMetadata {
    /// Create an entry with no lifecycle stamps.
    pub fn new(identifier: impl Into<String>, header: Map<String, Value>, body: String) -> Self {
        Self {
            identifier: identifier.into(),
            created_at: None,
            last_updated_at: None,
            last_status_change_at: None,
            finalized_at: None,
            raw_header_fields: header,
            body,
        }
    }

    /// The stamp stored for `field`, if any.
    pub fn stamp(&self, field: LifecycleField) -> Option<&Stamp> {
        match field {
            LifecycleField::Created => self.created_at.as_ref(),
            LifecycleField::LastUpdated => self.last_updated_at.as_ref(),
            LifecycleField::LastStatusChange => self.last_status_change_at.as_ref(),
            LifecycleField::Finalized => self.finalized_at.as_ref(),
        }
    }

    /// Set `field` unless it already holds a value. Returns whether it was set.
    pub fn fill(&mut self, field: LifecycleField, stamp: Stamp) -> bool {
        let slot = match field {
            LifecycleField::Created => &mut self.created_at,
            LifecycleField::LastUpdated => &mut self.last_updated_at,
            LifecycleField::LastStatusChange => &mut self.last_status_change_at,
            LifecycleField::Finalized => &mut self.finalized_at,
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(stamp);
        true
    }

    /// Current status, read from the header key configured in `status`.
    pub fn status<'a>(&'a self, status: &StatusConfig) -> Option<&'a str> {
        self.raw_header_fields
            .get(&status.field)
            .and_then(Value::as_str)
    }

}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use doclineage_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
