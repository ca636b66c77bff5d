//! The single-pass history miner.
//!
//! Commits from every source repository are merged newest-first by
//! committer time and processed one at a time. For each commit the driver
//! diffs against the first parent, keeps document paths, detects renames,
//! registers aliases, then feeds every surviving document version to the
//! accumulator. Within a commit, blob parsing runs in parallel; all table
//! mutation stays on the driver thread, in commit order.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

use doclineage_core::{DocumentMetadata, LineageConfig, LineageError, Stamp};
use git2::Repository;
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::Serialize;

use crate::accumulator::{Accumulator, Outcome, PreviousVersion};
use crate::differ::{diff_commit, ChangeRecord};
use crate::documents::DocumentPattern;
use crate::frontmatter::{self, FrontMatter, ParseFailure};
use crate::matcher::{BlobSource, RenameMatcher};
use crate::resolver::{AliasTable, Registration, Resolution};
use crate::walker::{collect_history, open_repository, CommitInfo};

const PROGRESS_INTERVAL: usize = 100;

/// A repository to mine and the branch to start from.
///
/// # Examples
///
/// ```
/// use doclineage_history::RepoSource;
///
/// let source = RepoSource::new("./EIPs").with_branch("master");
/// assert_eq!(source.branch.as_deref(), Some("master"));
/// ```
#[derive(Debug, Clone)]
pub struct RepoSource {
    /// Path to the repository.
    pub path: PathBuf,
    /// Branch to walk; HEAD when `None`.
    pub branch: Option<String>,
}

impl RepoSource {
    /// Mine HEAD of the repository at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            branch: None,
        }
    }

    /// Walk `branch` instead of HEAD.
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

/// Counters describing what the walk did and skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkStats {
    /// Commits processed.
    pub commits: usize,
    /// Document change records seen after rename matching.
    pub records: usize,
    /// Renames that registered an alias.
    pub renames: usize,
    /// Removals that registered an alias.
    pub removals: usize,
    /// Renames or removals refused (already aliased, live document, or would cycle).
    pub aliases_rejected: usize,
    /// Renames away from a live identifier, followed only for older commits.
    pub redirects: usize,
    /// Versions whose front matter could not be parsed.
    pub parse_failures: usize,
    /// Versions skipped because their document was already complete.
    pub skipped_complete: usize,
    /// Versions skipped as redirect stubs.
    pub skipped_stub: usize,
    /// Versions skipped because their lineage ends in a removal.
    pub skipped_removed: usize,
    /// Versions skipped because their identifier's alias chain loops.
    pub cycles: usize,
    /// Entries dropped after the walk because their identifier became an alias.
    pub pruned: usize,
}

/// Everything the miner produces.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningOutput {
    /// Metadata per canonical identifier.
    pub documents: BTreeMap<String, DocumentMetadata>,
    /// Retired identifiers and their successors.
    pub aliases: AliasTable,
    /// Walk instrumentation.
    pub stats: WalkStats,
}

/// Configured history miner.
///
/// # Examples
///
/// ```no_run
/// use doclineage_core::LineageConfig;
/// use doclineage_history::{Engine, RepoSource};
///
/// let engine = Engine::new(LineageConfig::default()).unwrap();
/// let output = engine.run(&[RepoSource::new(".")]).unwrap();
/// for (id, doc) in &output.documents {
///     println!("{id}: created {:?}", doc.created_at);
/// }
/// ```
pub struct Engine {
    config: LineageConfig,
    pattern: DocumentPattern,
    progress: Option<ProgressBar>,
}

/// A document version queued for parsing within one commit.
struct VersionJob {
    canonical: String,
    path: String,
    is_add: bool,
    current: Vec<u8>,
    previous: Option<Vec<u8>>,
}

struct ParsedJob {
    job: VersionJob,
    current: Result<FrontMatter, ParseFailure>,
    previous: Option<Result<FrontMatter, ParseFailure>>,
}

/// Mutable state threaded through one run.
struct WalkState<'c> {
    aliases: AliasTable,
    accumulator: Accumulator<'c>,
    live: HashSet<String>,
    /// Identifiers renamed away while a newer document held them: successor
    /// and the ordinal of the retiring commit.
    retired: HashMap<String, (String, usize)>,
    stats: WalkStats,
}

impl WalkState<'_> {
    /// Resolve `id` as seen in the commit being processed.
    ///
    /// A retired identifier only redirects in commits older than the one
    /// that retired it, so the newer document keeps its own name.
    fn resolve(&self, id: &str) -> Resolution {
        let mut current = id.to_string();
        for _ in 0..=self.retired.len() {
            let canonical = match self.aliases.resolve(&current) {
                Resolution::Canonical(canonical) => canonical,
                other => return other,
            };
            match self.retired.get(&canonical) {
                Some((successor, at)) if *at < self.stats.commits => current = successor.clone(),
                _ => return Resolution::Canonical(canonical),
            }
        }
        Resolution::Cycle
    }
}

impl Engine {
    /// Create an engine from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::Pattern`] if the document pattern is invalid.
    pub fn new(config: LineageConfig) -> Result<Self, LineageError> {
        let pattern = DocumentPattern::new(&config.documents)?;
        Ok(Self {
            config,
            pattern,
            progress: None,
        })
    }

    /// Report progress on `bar`; its length is set once history is collected.
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    /// The engine's configuration.
    pub fn config(&self) -> &LineageConfig {
        &self.config
    }

    /// Mine every source and return the metadata and alias tables.
    ///
    /// # Errors
    ///
    /// Returns [`LineageError::RepositoryNotFound`] or [`LineageError::Git`]
    /// if any repository, reference, commit, tree or blob cannot be read.
    /// Malformed documents never cause an error.
    pub fn run(&self, sources: &[RepoSource]) -> Result<MiningOutput, LineageError> {
        let repos = sources
            .iter()
            .map(|s| open_repository(&s.path))
            .collect::<Result<Vec<_>, _>>()?;

        let mut history: Vec<(usize, CommitInfo)> = Vec::new();
        for (idx, (repo, source)) in repos.iter().zip(sources).enumerate() {
            let commits = collect_history(repo, source.branch.as_deref())?;
            tracing::info!(
                repo = %source.path.display(),
                commits = commits.len(),
                "collected first-parent history"
            );
            history.extend(commits.into_iter().map(|c| (idx, c)));
        }
        history.sort_by(|a, b| b.1.time.cmp(&a.1.time));

        if let Some(bar) = &self.progress {
            bar.set_length(history.len() as u64);
        }

        let mut state = WalkState {
            aliases: AliasTable::new(),
            accumulator: Accumulator::new(&self.config.status)
                .with_declared_dates(self.config.documents.trust_declared_dates),
            live: HashSet::new(),
            retired: HashMap::new(),
            stats: WalkStats::default(),
        };

        let total = history.len();
        for (i, (idx, commit)) in history.iter().enumerate() {
            if i % PROGRESS_INTERVAL == 0 {
                tracing::info!(done = i, total, "walking history");
            }
            self.process_commit(&repos[*idx], commit, &mut state)?;
            if let Some(bar) = &self.progress {
                bar.inc(1);
            }
        }
        if let Some(bar) = &self.progress {
            bar.finish_and_clear();
        }

        let WalkState {
            aliases,
            accumulator,
            mut stats,
            ..
        } = state;
        let mut documents = accumulator.into_documents();
        let before = documents.len();
        documents.retain(|id, _| aliases.resolve(id) == Resolution::Canonical(id.clone()));
        stats.pruned = before - documents.len();

        tracing::info!(
            documents = documents.len(),
            aliases = aliases.len(),
            commits = stats.commits,
            "history walk finished"
        );
        Ok(MiningOutput {
            documents,
            aliases,
            stats,
        })
    }

    fn process_commit(
        &self,
        repo: &Repository,
        commit: &CommitInfo,
        state: &mut WalkState<'_>,
    ) -> Result<(), LineageError> {
        state.stats.commits += 1;

        let raw: Vec<ChangeRecord> = diff_commit(repo, commit, self.pattern.directories())?
            .into_iter()
            .filter(|r| self.pattern.is_document(r.display_path()))
            .collect();
        if raw.is_empty() {
            return Ok(());
        }
        let matcher = RenameMatcher::new(&self.pattern, &self.config.matching);
        let records = matcher.resolve(raw, repo)?;
        state.stats.records += records.len();
        log_unpaired(commit, &records);

        self.register_aliases(commit, &records, state);

        let stamp = Stamp::new(commit.time, commit.hash());
        let jobs = self.collect_jobs(repo, commit, &records, state)?;
        let parsed: Vec<ParsedJob> = jobs
            .into_par_iter()
            .map(|job| {
                let current = frontmatter::parse(&String::from_utf8_lossy(&job.current));
                let previous = job
                    .previous
                    .as_ref()
                    .map(|bytes| frontmatter::parse(&String::from_utf8_lossy(bytes)));
                ParsedJob {
                    job,
                    current,
                    previous,
                }
            })
            .collect();

        for ParsedJob {
            job,
            current,
            previous,
        } in parsed
        {
            let current = match current {
                Ok(fm) => fm,
                Err(failure) => {
                    tracing::warn!(
                        commit = %commit.id,
                        path = %job.path,
                        error = %failure,
                        "skipping version with unparseable front matter"
                    );
                    state.stats.parse_failures += 1;
                    continue;
                }
            };
            let previous_version = match (&previous, job.is_add) {
                (_, true) => PreviousVersion::Absent,
                (Some(Ok(fm)), false) => PreviousVersion::Parsed(fm),
                (Some(Err(failure)), false) => {
                    tracing::debug!(
                        commit = %commit.id,
                        path = %job.path,
                        error = %failure,
                        "previous version unparseable; status fields not eligible"
                    );
                    PreviousVersion::Unknown
                }
                (None, false) => PreviousVersion::Unknown,
            };
            match state.accumulator.apply(
                &job.canonical,
                &stamp,
                job.is_add,
                &current,
                previous_version,
            ) {
                Outcome::Applied(fields) => {
                    if !fields.is_empty() {
                        tracing::debug!(
                            commit = %commit.id,
                            id = %job.canonical,
                            ?fields,
                            "lifecycle fields set"
                        );
                    }
                }
                Outcome::SkippedComplete => state.stats.skipped_complete += 1,
                Outcome::SkippedStub => {
                    tracing::debug!(commit = %commit.id, path = %job.path, "skipping stub");
                    state.stats.skipped_stub += 1;
                }
            }
        }
        Ok(())
    }

    /// Register removals, then renames, in the order the walk sees them.
    fn register_aliases(&self, commit: &CommitInfo, records: &[ChangeRecord], state: &mut WalkState<'_>) {
        for record in records {
            let ChangeRecord::Remove { path, .. } = record else {
                continue;
            };
            let Some(id) = self.pattern.identifier(path) else {
                continue;
            };
            if state.live.contains(&id) {
                // Re-added in a newer commit; the live document keeps its identifier.
                tracing::debug!(commit = %commit.id, %path, %id, "removal of live document not aliased");
                state.stats.aliases_rejected += 1;
                continue;
            }
            match state.aliases.register_removal(&id) {
                Registration::Added => state.stats.removals += 1,
                rejected => {
                    tracing::debug!(commit = %commit.id, %path, %id, ?rejected, "removal not aliased");
                    state.stats.aliases_rejected += 1;
                }
            }
        }

        for record in records {
            let ChangeRecord::Rename { from, to, .. } = record else {
                continue;
            };
            let (Some(old), Some(new)) = (self.pattern.identifier(from), self.pattern.identifier(to))
            else {
                continue;
            };
            if old == new {
                continue;
            }
            if state.live.contains(&old) {
                // The newer document keeps `old`; older versions of it belong to `new`.
                tracing::debug!(
                    commit = %commit.id,
                    %from,
                    %to,
                    "rename away from live identifier; redirecting older versions"
                );
                let at = state.stats.commits;
                state.retired.entry(old).or_insert((new, at));
                state.stats.redirects += 1;
                continue;
            }
            match state.aliases.register_rename(&old, &new) {
                Registration::Added => state.stats.renames += 1,
                Registration::WouldCycle => {
                    tracing::warn!(
                        commit = %commit.id,
                        %from,
                        %to,
                        "rename would create an alias cycle; ignored"
                    );
                    state.stats.aliases_rejected += 1;
                }
                rejected @ (Registration::AlreadyAliased | Registration::SelfAlias) => {
                    tracing::debug!(commit = %commit.id, %from, %to, ?rejected, "rename not aliased");
                    state.stats.aliases_rejected += 1;
                }
            }
        }
    }

    /// Resolve identifiers and read the blobs each surviving version needs.
    fn collect_jobs(
        &self,
        repo: &Repository,
        commit: &CommitInfo,
        records: &[ChangeRecord],
        state: &mut WalkState<'_>,
    ) -> Result<Vec<VersionJob>, LineageError> {
        let mut jobs = Vec::new();
        for record in records {
            let (Some(path), Some(blob)) = (record.current_path(), record.current_blob()) else {
                continue;
            };
            let Some(id) = self.pattern.identifier(path) else {
                continue;
            };
            let canonical = match state.resolve(&id) {
                Resolution::Canonical(canonical) => canonical,
                Resolution::Removed => {
                    tracing::debug!(commit = %commit.id, %path, %id, "lineage ends in removal; skipped");
                    state.stats.skipped_removed += 1;
                    continue;
                }
                Resolution::Cycle => {
                    tracing::warn!(commit = %commit.id, %path, %id, "alias cycle; resolution abandoned");
                    state.stats.cycles += 1;
                    continue;
                }
            };
            state.live.insert(canonical.clone());
            if state.accumulator.is_complete(&canonical) {
                tracing::debug!(commit = %commit.id, %path, id = %canonical, "document complete; skipped");
                state.stats.skipped_complete += 1;
                continue;
            }

            let is_add = matches!(record, ChangeRecord::Add { .. });
            let previous = match record.previous_blob() {
                Some(prev) if !is_add && state.accumulator.wants_previous(&canonical) => {
                    Some(repo.read_blob(prev)?)
                }
                _ => None,
            };
            jobs.push(VersionJob {
                canonical,
                path: path.to_string(),
                is_add,
                current: repo.read_blob(blob)?,
                previous,
            });
        }
        Ok(jobs)
    }
}

/// Log every add or remove the matcher left unpaired in a commit that had both.
fn log_unpaired(commit: &CommitInfo, records: &[ChangeRecord]) {
    let adds = records.iter().filter(|r| matches!(r, ChangeRecord::Add { .. })).count();
    let removes = records.iter().filter(|r| matches!(r, ChangeRecord::Remove { .. })).count();
    if adds == 0 || removes == 0 {
        return;
    }
    for record in records {
        if let ChangeRecord::Add { path, .. } | ChangeRecord::Remove { path, .. } = record {
            tracing::debug!(
                commit = %commit.id,
                %path,
                "no rename partner cleared the similarity threshold; kept independent"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use doclineage_core::DocumentsConfig;

    use super::*;
    use crate::test_support::TestRepo;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run the engine with debug logging captured as plain text.
    fn run_logged(repo: &TestRepo) -> (MiningOutput, String) {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let out = tracing::subscriber::with_default(subscriber, || run(repo));
        let logs = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        (out, logs)
    }

    fn log_line<'a>(logs: &'a str, message: &str) -> &'a str {
        logs.lines()
            .find(|line| line.contains(message))
            .unwrap_or_else(|| panic!("no log line containing {message:?} in:\n{logs}"))
    }

    fn config() -> LineageConfig {
        LineageConfig {
            documents: DocumentsConfig {
                directories: vec!["docs".into()],
                pattern: r"doc-(\w+)\.md$".into(),
                trust_declared_dates: true,
            },
            ..LineageConfig::default()
        }
    }

    fn doc(status: &str, body: &str) -> String {
        format!("---\ntitle: Test\nstatus: {status}\n---\n{body}\n")
    }

    fn run(repo: &TestRepo) -> MiningOutput {
        let engine = Engine::new(config()).unwrap();
        engine
            .run(&[RepoSource::new(repo.repo.workdir().unwrap())])
            .unwrap()
    }

    #[test]
    fn removed_documents_are_dropped() {
        let repo = TestRepo::new();
        repo.commit(1_000, "add", &[("docs/doc-A.md", Some(&doc("Draft", "a")))]);
        repo.commit(2_000, "add", &[("docs/doc-K.md", Some(&doc("Draft", "k")))]);
        repo.commit(3_000, "remove", &[("docs/doc-A.md", None)]);

        let out = run(&repo);
        assert!(!out.documents.contains_key("A"));
        assert!(out.documents.contains_key("K"));
        assert_eq!(out.aliases.resolve("A"), Resolution::Removed);
        assert_eq!(out.stats.removals, 1);
        assert!(out.stats.skipped_removed >= 1);
    }

    #[test]
    fn readded_document_survives_older_removal() {
        let repo = TestRepo::new();
        repo.commit(1_000, "add", &[("docs/doc-A.md", Some(&doc("Draft", "v1")))]);
        repo.commit(2_000, "remove", &[("docs/doc-A.md", None)]);
        repo.commit(3_000, "readd", &[("docs/doc-A.md", Some(&doc("Review", "v2")))]);

        let out = run(&repo);
        let a = &out.documents["A"];
        assert_eq!(a.created_at.as_ref().unwrap().date.timestamp(), 3_000);
        assert!(out.aliases.is_empty());
        assert_eq!(out.stats.aliases_rejected, 1);
    }

    #[test]
    fn malformed_front_matter_is_skipped_not_fatal() {
        let repo = TestRepo::new();
        repo.commit(1_000, "add", &[("docs/doc-A.md", Some(&doc("Draft", "a")))]);
        repo.commit(
            2_000,
            "break",
            &[("docs/doc-A.md", Some("---\nstatus: [broken\n---\n"))],
        );

        let out = run(&repo);
        assert_eq!(out.stats.parse_failures, 1);
        let a = &out.documents["A"];
        assert_eq!(a.last_updated_at.as_ref().unwrap().date.timestamp(), 1_000);
    }

    #[test]
    fn non_document_paths_are_ignored() {
        let repo = TestRepo::new();
        repo.commit(
            1_000,
            "init",
            &[
                ("docs/doc-A.md", Some(&doc("Draft", "a"))),
                ("docs/README.md", Some("readme")),
                ("other/doc-Z.md", Some(&doc("Draft", "z"))),
            ],
        );

        let out = run(&repo);
        assert_eq!(out.documents.keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn stub_versions_do_not_create_documents() {
        let repo = TestRepo::new();
        repo.commit(1_000, "stub", &[("docs/doc-S.md", Some(&doc("Moved", "see elsewhere")))]);

        let out = run(&repo);
        assert!(out.documents.is_empty());
        assert_eq!(out.stats.skipped_stub, 1);
    }

    #[test]
    fn removed_lineage_skips_are_logged_with_commit_and_path() {
        let repo = TestRepo::new();
        let c1 = repo.commit(1_000, "add", &[("docs/doc-A.md", Some(&doc("Draft", "a")))]);
        repo.commit(2_000, "add", &[("docs/doc-K.md", Some(&doc("Draft", "k")))]);
        repo.commit(3_000, "remove", &[("docs/doc-A.md", None)]);

        let (out, logs) = run_logged(&repo);
        assert_eq!(out.stats.skipped_removed, 1);
        let line = log_line(&logs, "lineage ends in removal");
        assert!(line.contains(&c1.to_string()));
        assert!(line.contains("docs/doc-A.md"));
    }

    #[test]
    fn unpaired_adds_and_removes_are_logged_with_commit_and_path() {
        let repo = TestRepo::new();
        repo.commit(
            1_000,
            "init",
            &[
                ("docs/doc-A.md", Some("---\nstatus: Draft\n---\nalpha\n")),
                ("docs/doc-Z.md", Some("---\nstatus: Draft\n---\nzulu\n")),
            ],
        );
        let c2 = repo.commit(
            2_000,
            "swap",
            &[
                ("docs/doc-A.md", None),
                ("docs/doc-Z.md", None),
                ("docs/doc-B.md", Some("---\nstatus: Review\ntitle: b\n---\nbravo\n")),
                ("docs/doc-Y.md", Some("---\nstatus: Review\ntitle: y\n---\nyankee\n")),
            ],
        );

        let (out, logs) = run_logged(&repo);
        assert_eq!(out.stats.renames, 0);
        let unpaired: Vec<_> = logs
            .lines()
            .filter(|line| line.contains("no rename partner cleared the similarity threshold"))
            .collect();
        assert_eq!(unpaired.len(), 4);
        assert!(unpaired.iter().all(|line| line.contains(&c2.to_string())));
        assert!(unpaired.iter().any(|line| line.contains("docs/doc-B.md")));
        assert!(unpaired.iter().any(|line| line.contains("docs/doc-Z.md")));
    }

    #[test]
    fn rejected_renames_are_logged_with_commit_and_paths() {
        let repo = TestRepo::new();
        repo.commit(1_000, "add", &[("docs/doc-A.md", Some(&doc("Draft", "a")))]);
        let c2 = repo.commit(
            2_000,
            "move",
            &[("docs/doc-A.md", None), ("docs/doc-B.md", Some(&doc("Draft", "a")))],
        );
        repo.commit(3_000, "readd", &[("docs/doc-A.md", Some(&doc("Draft", "new")))]);
        repo.commit(4_000, "remove", &[("docs/doc-A.md", None)]);

        let (out, logs) = run_logged(&repo);
        // The newer removal already claimed A.
        assert_eq!(out.aliases.resolve("A"), Resolution::Removed);
        assert_eq!(out.stats.renames, 0);
        assert_eq!(out.stats.aliases_rejected, 1);
        let line = log_line(&logs, "rename not aliased");
        assert!(line.contains(&c2.to_string()));
        assert!(line.contains("docs/doc-A.md"));
        assert!(line.contains("docs/doc-B.md"));
        assert!(line.contains("AlreadyAliased"));
    }
}
