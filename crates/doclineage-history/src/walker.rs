//! First-parent commit traversal via git2.
//!
//! Yields commits from a branch head back to the root, following only the
//! first parent of each commit so merged side branches are never visited.

use std::path::Path;

use chrono::{DateTime, Utc};
use doclineage_core::LineageError;
use git2::{ErrorCode, Oid, Repository};

/// Commit data needed by the miner.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use doclineage_history::walker::CommitInfo;
/// use git2::Oid;
///
/// let info = CommitInfo {
///     id: Oid::zero(),
///     time: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
///     parent: None,
///     tree: Oid::zero(),
///     summary: "Add EIP-1".into(),
/// };
/// assert!(info.is_root());
/// ```
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// Commit id.
    pub id: Oid,
    /// Committer timestamp.
    pub time: DateTime<Utc>,
    /// First parent, used as the comparison side of the tree diff.
    pub parent: Option<Oid>,
    /// Root tree of the commit.
    pub tree: Oid,
    /// First line of the commit message.
    pub summary: String,
}

impl CommitInfo {
    /// Full hex id.
    pub fn hash(&self) -> String {
        self.id.to_string()
    }

    /// Whether this commit has no parent.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn from_commit(commit: &git2::Commit<'_>) -> Result<Self, LineageError> {
        let seconds = commit.time().seconds();
        let time = DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
            LineageError::Git(format!(
                "commit {} has out-of-range timestamp {seconds}",
                commit.id()
            ))
        })?;
        Ok(Self {
            id: commit.id(),
            time,
            parent: commit.parent_ids().next(),
            tree: commit.tree_id(),
            summary: commit.summary().unwrap_or("").to_string(),
        })
    }
}

/// Open the repository at `path`.
///
/// # Errors
///
/// Returns [`LineageError::RepositoryNotFound`] if nothing is there, or
/// [`LineageError::Git`] for any other failure.
pub fn open_repository(path: &Path) -> Result<Repository, LineageError> {
    Repository::open(path).map_err(|e| {
        if e.code() == ErrorCode::NotFound {
            LineageError::RepositoryNotFound(path.to_path_buf())
        } else {
            LineageError::Git(format!("failed to open repository {}: {e}", path.display()))
        }
    })
}

/// Resolve the commit to start walking from: `branch` if given, else HEAD.
///
/// # Errors
///
/// Returns [`LineageError::Git`] if the reference cannot be resolved to a commit.
pub fn resolve_start(repo: &Repository, branch: Option<&str>) -> Result<Oid, LineageError> {
    let reference = match branch {
        Some(name) => repo
            .resolve_reference_from_short_name(name)
            .map_err(|e| LineageError::Git(format!("failed to resolve branch '{name}': {e}")))?,
        None => repo
            .head()
            .map_err(|e| LineageError::Git(format!("failed to resolve HEAD: {e}")))?,
    };
    let commit = reference
        .peel_to_commit()
        .map_err(|e| LineageError::Git(format!("reference does not point to a commit: {e}")))?;
    Ok(commit.id())
}

/// Lazy first-parent walk from a starting commit to the root.
///
/// A commit that cannot be read ends the walk with an error; partial
/// history would produce unsound metadata, so callers should propagate it.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use doclineage_history::walker::{open_repository, FirstParentWalk};
///
/// let repo = open_repository(Path::new(".")).unwrap();
/// for commit in FirstParentWalk::from_branch(&repo, None).unwrap() {
///     let commit = commit.unwrap();
///     println!("{} {}", commit.hash(), commit.summary);
/// }
/// ```
pub struct FirstParentWalk<'r> {
    repo: &'r Repository,
    next: Option<Oid>,
}

impl<'r> FirstParentWalk<'r> {
    /// Walk starting at `start`.
    pub fn new(repo: &'r Repository, start: Oid) -> Self {
        Self {
            repo,
            next: Some(start),
        }
    }

    /// Walk starting at `branch` (or HEAD when `None`).
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Git`] if the start reference cannot be resolved.
    pub fn from_branch(repo: &'r Repository, branch: Option<&str>) -> Result<Self, LineageError> {
        Ok(Self::new(repo, resolve_start(repo, branch)?))
    }
}

impl Iterator for FirstParentWalk<'_> {
    type Item = Result<CommitInfo, LineageError>;

    fn next(&mut self) -> Option<Self::Item> {
        let oid = self.next.take()?;
        let result = self
            .repo
            .find_commit(oid)
            .map_err(|e| LineageError::Git(format!("failed to read commit {oid}: {e}")))
            .and_then(|commit| CommitInfo::from_commit(&commit));
        if let Ok(info) = &result {
            self.next = info.parent;
        }
        Some(result)
    }
}

/// Collect the first-parent history of `branch`, newest first by committer time.
///
/// The first-parent chain is usually already in timestamp order; the sort
/// is stable so commits with equal or skewed timestamps keep chain order
/// wherever the timestamps allow it.
///
/// # Errors
///
/// Returns [`LineageError::Git`] if the start reference or any commit cannot be read.
pub fn collect_history(
    repo: &Repository,
    branch: Option<&str>,
) -> Result<Vec<CommitInfo>, LineageError> {
    let mut commits = FirstParentWalk::from_branch(repo, branch)?.collect::<Result<Vec<_>, _>>()?;
    commits.sort_by(|a, b| b.time.cmp(&a.time));
    Ok(commits)
}
