//! Per-commit tree comparison.
//!
//! Classifies every blob path that differs between a commit's tree and its
//! first parent's tree. Unchanged paths produce no record; identity is the
//! blob id, so a touched-but-identical file is not a change.

use std::fmt;
use std::path::Path;

use doclineage_core::LineageError;
use git2::{Delta, DiffOptions, FileMode, Oid, Repository, Tree};

use crate::walker::CommitInfo;

/// Kind of a [`ChangeRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Path exists only in the current tree.
    Add,
    /// Path exists only in the previous tree.
    Remove,
    /// Path exists in both trees with different content.
    Modify,
    /// A removed path whose content reappeared under a new path.
    Rename,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Modify => "modify",
            ChangeKind::Rename => "rename",
        };
        f.write_str(name)
    }
}

/// One path-level change between two trees.
///
/// Records are built once and never mutated; the rename matcher produces
/// fresh [`ChangeRecord::Rename`] values from the add/remove pairs it consumes.
///
/// # Examples
///
/// ```
/// use doclineage_history::differ::{ChangeKind, ChangeRecord};
/// use git2::Oid;
///
/// let record = ChangeRecord::Rename {
///     from: "EIPS/eip-draft.md".into(),
///     to: "EIPS/eip-7702.md".into(),
///     blob: Oid::zero(),
///     previous_blob: Oid::zero(),
/// };
/// assert_eq!(record.kind(), ChangeKind::Rename);
/// assert_eq!(record.current_path(), Some("EIPS/eip-7702.md"));
/// assert_eq!(record.previous_path(), Some("EIPS/eip-draft.md"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// New path.
    Add {
        /// Path in the current tree.
        path: String,
        /// Blob in the current tree.
        blob: Oid,
    },
    /// Deleted path.
    Remove {
        /// Path in the previous tree.
        path: String,
        /// Blob in the previous tree.
        blob: Oid,
    },
    /// Content change at a stable path.
    Modify {
        /// Path in both trees.
        path: String,
        /// Blob in the current tree.
        blob: Oid,
        /// Blob in the previous tree.
        previous_blob: Oid,
    },
    /// Path change, possibly with content edits.
    Rename {
        /// Path in the previous tree.
        from: String,
        /// Path in the current tree.
        to: String,
        /// Blob in the current tree.
        blob: Oid,
        /// Blob in the previous tree.
        previous_blob: Oid,
    },
}

impl ChangeRecord {
    /// The record's kind.
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::Add { .. } => ChangeKind::Add,
            ChangeRecord::Remove { .. } => ChangeKind::Remove,
            ChangeRecord::Modify { .. } => ChangeKind::Modify,
            ChangeRecord::Rename { .. } => ChangeKind::Rename,
        }
    }

    /// Path in the current tree; absent for removals.
    pub fn current_path(&self) -> Option<&str> {
        match self {
            ChangeRecord::Add { path, .. } | ChangeRecord::Modify { path, .. } => Some(path),
            ChangeRecord::Rename { to, .. } => Some(to),
            ChangeRecord::Remove { .. } => None,
        }
    }

    /// Path in the previous tree; absent for additions.
    pub fn previous_path(&self) -> Option<&str> {
        match self {
            ChangeRecord::Remove { path, .. } | ChangeRecord::Modify { path, .. } => Some(path),
            ChangeRecord::Rename { from, .. } => Some(from),
            ChangeRecord::Add { .. } => None,
        }
    }

    /// Blob in the current tree; absent for removals.
    pub fn current_blob(&self) -> Option<Oid> {
        match self {
            ChangeRecord::Add { blob, .. }
            | ChangeRecord::Modify { blob, .. }
            | ChangeRecord::Rename { blob, .. } => Some(*blob),
            ChangeRecord::Remove { .. } => None,
        }
    }

    /// Blob in the previous tree; absent for additions.
    pub fn previous_blob(&self) -> Option<Oid> {
        match self {
            ChangeRecord::Remove { blob, .. } => Some(*blob),
            ChangeRecord::Modify { previous_blob, .. }
            | ChangeRecord::Rename { previous_blob, .. } => Some(*previous_blob),
            ChangeRecord::Add { .. } => None,
        }
    }

    /// The path most useful in log messages.
    pub fn display_path(&self) -> &str {
        self.current_path()
            .or_else(|| self.previous_path())
            .unwrap_or("")
    }
}

/// Diff `commit` against its first parent (or against nothing for a root commit).
///
/// `directories` restricts the comparison to those repository-relative
/// directories; an empty slice compares the whole tree.
///
/// # Errors
///
/// Returns [`LineageError::Git`] if either tree cannot be read or diffed.
pub fn diff_commit(
    repo: &Repository,
    commit: &CommitInfo,
    directories: &[String],
) -> Result<Vec<ChangeRecord>, LineageError> {
    let current = repo
        .find_tree(commit.tree)
        .map_err(|e| LineageError::Git(format!("failed to read tree of {}: {e}", commit.id)))?;
    let previous = match commit.parent {
        Some(parent) => {
            let parent = repo
                .find_commit(parent)
                .map_err(|e| LineageError::Git(format!("failed to read parent {parent}: {e}")))?;
            Some(parent.tree().map_err(|e| {
                LineageError::Git(format!("failed to read parent tree of {}: {e}", commit.id))
            })?)
        }
        None => None,
    };
    diff_trees(repo, &current, previous.as_ref(), directories)
}

/// Classify every blob path that differs between `current` and `previous`.
///
/// With no `previous` tree every blob in `current` is an [`ChangeRecord::Add`].
/// Submodule entries and directories never produce records.
///
/// # Errors
///
/// Returns [`LineageError::Git`] if the diff cannot be computed.
pub fn diff_trees(
    repo: &Repository,
    current: &Tree<'_>,
    previous: Option<&Tree<'_>>,
    directories: &[String],
) -> Result<Vec<ChangeRecord>, LineageError> {
    let mut diff_opts = DiffOptions::new();
    for dir in directories {
        diff_opts.pathspec(dir.as_str());
    }
    let diff = repo
        .diff_tree_to_tree(previous, Some(current), Some(&mut diff_opts))
        .map_err(|e| LineageError::Git(format!("failed to compute diff: {e}")))?;

    let mut records = Vec::with_capacity(diff.deltas().len());
    for delta in diff.deltas() {
        let old_file = delta.old_file();
        let new_file = delta.new_file();
        let old_path = old_file.path().map(path_string);
        let new_path = new_file.path().map(path_string);

        let record = match delta.status() {
            Delta::Added if is_blob(new_file.mode()) => new_path.map(|path| ChangeRecord::Add {
                path,
                blob: new_file.id(),
            }),
            Delta::Deleted if is_blob(old_file.mode()) => {
                old_path.map(|path| ChangeRecord::Remove {
                    path,
                    blob: old_file.id(),
                })
            }
            Delta::Modified | Delta::Typechange
                if is_blob(old_file.mode()) && is_blob(new_file.mode()) =>
            {
                if old_file.id() == new_file.id() {
                    None
                } else {
                    new_path.map(|path| ChangeRecord::Modify {
                        path,
                        blob: new_file.id(),
                        previous_blob: old_file.id(),
                    })
                }
            }
            _ => None,
        };
        records.extend(record);
    }

    Ok(records)
}

fn is_blob(mode: FileMode) -> bool {
    matches!(
        mode,
        FileMode::Blob | FileMode::BlobExecutable | FileMode::BlobGroupWritable | FileMode::Link
    )
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
