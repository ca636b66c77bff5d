//! Incremental lifecycle metadata accumulation.
//!
//! Versions arrive newest commit first. Each version can make some
//! lifecycle fields eligible; an eligible field is stored only if it is
//! still empty, so the stored value is the newest qualifying event. Once a
//! document has every required field it joins the completion set and later
//! (older) versions are skipped without being parsed.
//!
//! With declared dates trusted, a lifecycle key already present in the
//! newest header (e.g. `created: 2015-11-19`) counts as settled for
//! completion, since the catalog prefers the declared value anyway.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use doclineage_core::{DocumentMetadata, LifecycleField, Stamp, StatusConfig};

use crate::frontmatter::FrontMatter;

/// What is known about the version preceding the one being applied.
#[derive(Debug, Clone, Copy)]
pub enum PreviousVersion<'a> {
    /// The current version is an addition; there is no earlier version.
    Absent,
    /// The earlier version parsed successfully.
    Parsed(&'a FrontMatter),
    /// The earlier version exists but was not loaded or could not be parsed.
    Unknown,
}

/// Result of applying one document version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// These fields were newly set (possibly none).
    Applied(Vec<LifecycleField>),
    /// The document was already complete; nothing was inspected.
    SkippedComplete,
    /// The version is a redirect stub and contributes nothing.
    SkippedStub,
}

/// Owns the metadata table and the completion set for one walk.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use doclineage_core::{LifecycleField, Stamp, StatusConfig};
/// use doclineage_history::accumulator::{Accumulator, Outcome, PreviousVersion};
/// use doclineage_history::frontmatter::parse;
///
/// let status = StatusConfig::default();
/// let mut acc = Accumulator::new(&status);
/// let version = parse("---\nstatus: Draft\n---\n").unwrap();
/// let stamp = Stamp::new(Utc.timestamp_opt(1_000, 0).unwrap(), "c1");
///
/// let outcome = acc.apply("1", &stamp, true, &version, PreviousVersion::Absent);
/// assert!(matches!(outcome, Outcome::Applied(_)));
/// assert!(acc.is_complete("1"));
/// assert_eq!(acc.apply("1", &stamp, true, &version, PreviousVersion::Absent), Outcome::SkippedComplete);
/// ```
pub struct Accumulator<'c> {
    status: &'c StatusConfig,
    documents: BTreeMap<String, DocumentMetadata>,
    complete: BTreeSet<String>,
    trust_declared: bool,
}

impl<'c> Accumulator<'c> {
    /// An empty accumulator using `status` for status comparisons.
    pub fn new(status: &'c StatusConfig) -> Self {
        Self {
            status,
            documents: BTreeMap::new(),
            complete: BTreeSet::new(),
            trust_declared: false,
        }
    }

    /// Count header-declared lifecycle dates as settled when checking completion.
    pub fn with_declared_dates(mut self, trust: bool) -> Self {
        self.trust_declared = trust;
        self
    }

    /// Whether `id` is in the completion set.
    pub fn is_complete(&self, id: &str) -> bool {
        self.complete.contains(id)
    }

    /// Whether applying a version of `id` could use the previous version.
    ///
    /// Only the status-derived fields look at the previous version, so once
    /// they are settled the caller can skip reading the old blob.
    pub fn wants_previous(&self, id: &str) -> bool {
        match self.documents.get(id) {
            None => true,
            Some(doc) => {
                !self.is_settled(doc, LifecycleField::LastStatusChange)
                    || (self.current_is_terminal(doc)
                        && !self.is_settled(doc, LifecycleField::Finalized))
            }
        }
    }

    /// Metadata accumulated so far for `id`.
    pub fn get(&self, id: &str) -> Option<&DocumentMetadata> {
        self.documents.get(id)
    }

    /// Apply one version of canonical document `id`, committed at `stamp`.
    ///
    /// `is_add` marks a version introduced by a pure addition; only those
    /// can set `created`. The first version seen for a document also
    /// supplies its header and body.
    pub fn apply(
        &mut self,
        id: &str,
        stamp: &Stamp,
        is_add: bool,
        current: &FrontMatter,
        previous: PreviousVersion<'_>,
    ) -> Outcome {
        if self.complete.contains(id) {
            return Outcome::SkippedComplete;
        }
        let current_status = current.get_str(&self.status.field);
        if current_status.is_some_and(|s| self.status.is_stub(s)) {
            return Outcome::SkippedStub;
        }

        let previous_status = match previous {
            PreviousVersion::Absent => Some(None),
            PreviousVersion::Parsed(prev) => Some(prev.get_str(&self.status.field)),
            PreviousVersion::Unknown => None,
        };
        let status_changed = previous_status.is_some_and(|prev| prev != current_status);
        let became_terminal = current_status.is_some_and(|s| self.status.is_terminal(s))
            && previous_status.is_some_and(|prev| !prev.is_some_and(|p| self.status.is_terminal(p)));

        let eligible = [
            (LifecycleField::LastUpdated, true),
            (LifecycleField::Created, is_add),
            (LifecycleField::LastStatusChange, status_changed),
            (LifecycleField::Finalized, became_terminal),
        ];

        let doc = self.documents.entry(id.to_string()).or_insert_with(|| {
            DocumentMetadata::new(id, current.header.clone(), current.body.clone())
        });
        let mut set = Vec::new();
        for (field, is_eligible) in eligible {
            if is_eligible && doc.fill(field, stamp.clone()) {
                set.push(field);
            }
        }

        if self.is_settled_complete(&self.documents[id]) {
            tracing::debug!(id, commit = %stamp.commit, "document metadata complete");
            self.complete.insert(id.to_string());
        }
        Outcome::Applied(set)
    }

    /// Consume the accumulator, returning the metadata table.
    pub fn into_documents(self) -> BTreeMap<String, DocumentMetadata> {
        self.documents
    }

    fn is_settled(&self, doc: &DocumentMetadata, field: LifecycleField) -> bool {
        doc.stamp(field).is_some() || (self.trust_declared && declares_date(doc, field))
    }

    fn is_settled_complete(&self, doc: &DocumentMetadata) -> bool {
        !doc.identifier.is_empty()
            && self.is_settled(doc, LifecycleField::LastUpdated)
            && self.is_settled(doc, LifecycleField::Created)
            && self.is_settled(doc, LifecycleField::LastStatusChange)
            && (!self.current_is_terminal(doc) || self.is_settled(doc, LifecycleField::Finalized))
    }

    fn current_is_terminal(&self, doc: &DocumentMetadata) -> bool {
        doc.status(self.status)
            .is_some_and(|s| self.status.is_terminal(s))
    }
}

fn declares_date(doc: &DocumentMetadata, field: LifecycleField) -> bool {
    doc.raw_header_fields
        .get(field.key())
        .and_then(|v| v.as_str())
        .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok())
}
