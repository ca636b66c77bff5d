//! Content-similarity rename detection.
//!
//! A commit that removes one document and adds another may really be a
//! rename, possibly with edits. Pairs are scored by the Jaccard similarity
//! of their line sets and matched greedily, best score first, so unrelated
//! renames in the same commit do not steal each other's partners.
//!
//! Line sets come from [`str::lines`], so a trailing newline adds no empty
//! line. Splitting on `'\n'` instead would count that empty segment as one
//! more shared line and nudge borderline pairs over the threshold.

use std::collections::HashSet;

use doclineage_core::{LineageError, MatchingConfig};
use git2::{Oid, Repository};
use rayon::prelude::*;

use crate::differ::ChangeRecord;
use crate::documents::DocumentPattern;

/// Read access to blob content.
pub trait BlobSource {
    /// Raw bytes of blob `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Git`] if the blob cannot be read.
    fn read_blob(&self, id: Oid) -> Result<Vec<u8>, LineageError>;
}

impl BlobSource for Repository {
    fn read_blob(&self, id: Oid) -> Result<Vec<u8>, LineageError> {
        let blob = self
            .find_blob(id)
            .map_err(|e| LineageError::Git(format!("failed to read blob {id}: {e}")))?;
        Ok(blob.content().to_vec())
    }
}

/// A scored (added, removed) pair that cleared the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameCandidate {
    /// Index into the commit's added records.
    pub added: usize,
    /// Index into the commit's removed records.
    pub removed: usize,
    /// Jaccard similarity of the two line sets.
    pub similarity: f64,
}

/// Whether `content` looks like text: no NUL byte in the first `probe_bytes` bytes.
///
/// # Examples
///
/// ```
/// use doclineage_history::matcher::is_text;
///
/// assert!(is_text(b"---\ntitle: x\n---\n", 8000));
/// assert!(!is_text(b"\x89PNG\x00\x00", 8000));
/// ```
pub fn is_text(content: &[u8], probe_bytes: usize) -> bool {
    let probe = &content[..content.len().min(probe_bytes)];
    !probe.contains(&0)
}

/// Distinct lines of `text`.
pub fn line_set(text: &str) -> HashSet<&str> {
    text.lines().collect()
}

/// `|a ∩ b| / |a ∪ b|`; two empty sets score 0.
///
/// # Examples
///
/// ```
/// use doclineage_history::matcher::{jaccard, line_set};
///
/// let a = line_set("x\ny\n");
/// let b = line_set("y\nz\n");
/// assert!((jaccard(&a, &b) - 1.0 / 3.0).abs() < f64::EPSILON);
/// ```
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

/// Greedily pick non-overlapping pairs, highest similarity first.
///
/// Ties are broken by added index, then removed index, so the selection is
/// deterministic for a given diff order.
pub fn select_greedy(mut candidates: Vec<RenameCandidate>) -> Vec<RenameCandidate> {
    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then(a.added.cmp(&b.added))
            .then(a.removed.cmp(&b.removed))
    });
    let mut used_added = HashSet::new();
    let mut used_removed = HashSet::new();
    let mut selected = Vec::new();
    for candidate in candidates {
        if used_added.contains(&candidate.added) || used_removed.contains(&candidate.removed) {
            continue;
        }
        used_added.insert(candidate.added);
        used_removed.insert(candidate.removed);
        selected.push(candidate);
    }
    selected
}

/// Turns a commit's raw add/remove records into renames where warranted.
pub struct RenameMatcher<'a> {
    pattern: &'a DocumentPattern,
    threshold: f64,
    probe_bytes: usize,
}

impl<'a> RenameMatcher<'a> {
    /// Create a matcher with the configured threshold and binary probe size.
    pub fn new(pattern: &'a DocumentPattern, config: &MatchingConfig) -> Self {
        Self {
            pattern,
            threshold: config.threshold,
            probe_bytes: config.binary_probe_bytes,
        }
    }

    /// Replace matched add/remove pairs in `records` with [`ChangeRecord::Rename`]s.
    ///
    /// `records` should already be restricted to document paths. Modifications
    /// and existing renames pass through unchanged. Output order is: renames
    /// in selection order, then every untouched record in input order.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Git`] if a blob needed for scoring cannot be read.
    pub fn resolve<B: BlobSource + ?Sized>(
        &self,
        records: Vec<ChangeRecord>,
        blobs: &B,
    ) -> Result<Vec<ChangeRecord>, LineageError> {
        let added: Vec<(usize, &str, Oid)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                ChangeRecord::Add { path, blob } => Some((i, path.as_str(), *blob)),
                _ => None,
            })
            .collect();
        let removed: Vec<(usize, &str, Oid)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match r {
                ChangeRecord::Remove { path, blob } => Some((i, path.as_str(), *blob)),
                _ => None,
            })
            .collect();

        if added.is_empty() || removed.is_empty() {
            return Ok(records);
        }

        let pairs = if added.len() == 1
            && removed.len() == 1
            && self.pattern.is_document(added[0].1)
            && self.pattern.is_document(removed[0].1)
        {
            // No competing pair exists, so the swap is a rename regardless of content.
            vec![RenameCandidate {
                added: 0,
                removed: 0,
                similarity: 1.0,
            }]
        } else {
            let added_text = self.load_texts(added.iter().map(|a| a.2), blobs)?;
            let removed_text = self.load_texts(removed.iter().map(|r| r.2), blobs)?;
            select_greedy(self.score(&added_text, &removed_text))
        };

        let mut consumed = HashSet::new();
        let mut out = Vec::with_capacity(records.len());
        for pair in &pairs {
            let (add_idx, to, blob) = added[pair.added];
            let (remove_idx, from, previous_blob) = removed[pair.removed];
            tracing::debug!(
                from,
                to,
                similarity = pair.similarity,
                "classified add/remove pair as rename"
            );
            consumed.insert(add_idx);
            consumed.insert(remove_idx);
            out.push(ChangeRecord::Rename {
                from: from.to_string(),
                to: to.to_string(),
                blob,
                previous_blob,
            });
        }
        out.extend(
            records
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !consumed.contains(i))
                .map(|(_, r)| r),
        );
        Ok(out)
    }

    /// Decoded text per blob, or `None` for binary content.
    fn load_texts<B: BlobSource + ?Sized>(
        &self,
        ids: impl Iterator<Item = Oid>,
        blobs: &B,
    ) -> Result<Vec<Option<String>>, LineageError> {
        ids.map(|id| {
            let bytes = blobs.read_blob(id)?;
            if !is_text(&bytes, self.probe_bytes) {
                tracing::debug!(blob = %id, "skipping binary blob in rename matching");
                return Ok(None);
            }
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        })
        .collect()
    }

    fn score(&self, added: &[Option<String>], removed: &[Option<String>]) -> Vec<RenameCandidate> {
        let added_sets: Vec<Option<HashSet<&str>>> = added
            .iter()
            .map(|t| t.as_deref().map(line_set))
            .collect();
        let removed_sets: Vec<Option<HashSet<&str>>> = removed
            .iter()
            .map(|t| t.as_deref().map(line_set))
            .collect();

        let pairs: Vec<(usize, usize)> = (0..added_sets.len())
            .flat_map(|i| (0..removed_sets.len()).map(move |j| (i, j)))
            .collect();

        pairs
            .into_par_iter()
            .filter_map(|(i, j)| {
                let a = added_sets[i].as_ref()?;
                let b = removed_sets[j].as_ref()?;
                let similarity = jaccard(a, b);
                (similarity >= self.threshold).then_some(RenameCandidate {
                    added: i,
                    removed: j,
                    similarity,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use doclineage_core::DocumentsConfig;
    use git2::ObjectType;

    use super::*;
    use crate::differ::ChangeKind;

    #[derive(Default)]
    struct MemoryBlobs(HashMap<Oid, Vec<u8>>);

    impl MemoryBlobs {
        fn put(&mut self, content: &str) -> Oid {
            self.put_bytes(content.as_bytes())
        }

        fn put_bytes(&mut self, content: &[u8]) -> Oid {
            let id = Oid::hash_object(ObjectType::Blob, content).unwrap();
            self.0.insert(id, content.to_vec());
            id
        }
    }

    impl BlobSource for MemoryBlobs {
        fn read_blob(&self, id: Oid) -> Result<Vec<u8>, LineageError> {
            self.0
                .get(&id)
                .cloned()
                .ok_or_else(|| LineageError::Git(format!("missing blob {id}")))
        }
    }

    fn pattern() -> DocumentPattern {
        DocumentPattern::new(&DocumentsConfig {
            directories: vec!["docs".into()],
            pattern: r"doc-(\w+)\.md$".into(),
            ..DocumentsConfig::default()
        })
        .unwrap()
    }

    fn lines(range: std::ops::RangeInclusive<u32>) -> String {
        range.map(|n| format!("line {n}\n")).collect()
    }

    fn add(path: &str, blob: Oid) -> ChangeRecord {
        ChangeRecord::Add {
            path: path.into(),
            blob,
        }
    }

    fn remove(path: &str, blob: Oid) -> ChangeRecord {
        ChangeRecord::Remove {
            path: path.into(),
            blob,
        }
    }

    fn renames(records: &[ChangeRecord]) -> Vec<(&str, &str)> {
        records
            .iter()
            .filter_map(|r| match r {
                ChangeRecord::Rename { from, to, .. } => Some((from.as_str(), to.as_str())),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn single_swap_is_always_a_rename() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        let old = blobs.put("completely\ndifferent\n");
        let new = blobs.put("nothing\nin\ncommon\n");

        let out = matcher
            .resolve(
                vec![add("docs/doc-B.md", new), remove("docs/doc-A.md", old)],
                &blobs,
            )
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(renames(&out), vec![("docs/doc-A.md", "docs/doc-B.md")]);
        assert_eq!(out[0].current_blob(), Some(new));
        assert_eq!(out[0].previous_blob(), Some(old));
    }

    #[test]
    fn exactly_half_shared_lines_is_a_rename() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        // 75 + 75 lines sharing 50: 50 / 100.
        let old = blobs.put(&lines(1..=75));
        let new = blobs.put(&lines(26..=100));
        let decoy_old = blobs.put("decoy\n");
        let decoy_new = blobs.put("unrelated\n");

        let out = matcher
            .resolve(
                vec![
                    add("docs/doc-B.md", new),
                    add("docs/doc-Y.md", decoy_new),
                    remove("docs/doc-A.md", old),
                    remove("docs/doc-X.md", decoy_old),
                ],
                &blobs,
            )
            .unwrap();
        assert_eq!(renames(&out), vec![("docs/doc-A.md", "docs/doc-B.md")]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn forty_nine_percent_is_not_a_rename() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        // 75 + 74 lines sharing 49: 49 / 100.
        let old = blobs.put(&lines(1..=75));
        let new = blobs.put(&lines(27..=100));
        let decoy_old = blobs.put("decoy\n");
        let decoy_new = blobs.put("unrelated\n");

        let out = matcher
            .resolve(
                vec![
                    add("docs/doc-B.md", new),
                    add("docs/doc-Y.md", decoy_new),
                    remove("docs/doc-A.md", old),
                    remove("docs/doc-X.md", decoy_old),
                ],
                &blobs,
            )
            .unwrap();
        assert!(renames(&out).is_empty());
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn greedy_matching_prefers_best_pairs() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        let a = blobs.put(&lines(1..=20));
        let b = blobs.put(&lines(101..=120));
        let a_moved = blobs.put(&lines(1..=19));
        let b_moved = blobs.put(&lines(101..=118));

        let out = matcher
            .resolve(
                vec![
                    add("docs/doc-A2.md", a_moved),
                    add("docs/doc-B2.md", b_moved),
                    remove("docs/doc-A.md", a),
                    remove("docs/doc-B.md", b),
                ],
                &blobs,
            )
            .unwrap();
        let mut found = renames(&out);
        found.sort();
        assert_eq!(
            found,
            vec![
                ("docs/doc-A.md", "docs/doc-A2.md"),
                ("docs/doc-B.md", "docs/doc-B2.md")
            ]
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn one_removed_path_is_matched_at_most_once() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        let original = blobs.put(&lines(1..=10));
        let close = blobs.put(&lines(1..=9));
        let closer = blobs.put(&lines(1..=10));

        let out = matcher
            .resolve(
                vec![
                    add("docs/doc-C.md", close),
                    add("docs/doc-D.md", closer),
                    remove("docs/doc-A.md", original),
                ],
                &blobs,
            )
            .unwrap();
        assert_eq!(renames(&out), vec![("docs/doc-A.md", "docs/doc-D.md")]);
        let leftover: Vec<_> = out.iter().filter(|r| r.kind() == ChangeKind::Add).collect();
        assert_eq!(leftover.len(), 1);
        assert_eq!(leftover[0].current_path(), Some("docs/doc-C.md"));
    }

    #[test]
    fn binary_blobs_are_never_paired() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let mut blobs = MemoryBlobs::default();
        let bin_old = blobs.put_bytes(b"same\n\x00payload\n");
        let bin_new = blobs.put_bytes(b"same\n\x00payload\n!");
        let other_old = blobs.put("x\n");
        let other_new = blobs.put("y\n");

        let out = matcher
            .resolve(
                vec![
                    add("docs/doc-B.md", bin_new),
                    add("docs/doc-Y.md", other_new),
                    remove("docs/doc-A.md", bin_old),
                    remove("docs/doc-X.md", other_old),
                ],
                &blobs,
            )
            .unwrap();
        assert!(renames(&out).is_empty());
    }

    #[test]
    fn modifications_pass_through() {
        let pattern = pattern();
        let matcher = RenameMatcher::new(&pattern, &MatchingConfig::default());
        let blobs = MemoryBlobs::default();
        let modify = ChangeRecord::Modify {
            path: "docs/doc-A.md".into(),
            blob: Oid::zero(),
            previous_blob: Oid::zero(),
        };
        let out = matcher.resolve(vec![modify.clone()], &blobs).unwrap();
        assert_eq!(out, vec![modify]);
    }

    #[test]
    fn jaccard_of_empty_sets_is_zero() {
        assert_eq!(jaccard(&HashSet::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn select_greedy_breaks_ties_by_index() {
        let selected = select_greedy(vec![
            RenameCandidate {
                added: 1,
                removed: 0,
                similarity: 0.8,
            },
            RenameCandidate {
                added: 0,
                removed: 0,
                similarity: 0.8,
            },
        ]);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].added, 0);
    }

    #[test]
    fn probe_only_checks_prefix() {
        let mut content = vec![b'a'; 10];
        content.push(0);
        assert!(is_text(&content, 10));
        assert!(!is_text(&content, 11));
    }
}
