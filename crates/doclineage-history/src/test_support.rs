//! Synthetic repositories for unit tests.

use std::path::Path;

use git2::{Oid, Repository, Signature, Time};
use tempfile::TempDir;

pub struct TestRepo {
    pub repo: Repository,
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { repo, dir }
    }

    /// Apply `changes` (path, Some(content) to write, None to delete) and
    /// commit them on HEAD with the given committer timestamp.
    pub fn commit(&self, time: i64, message: &str, changes: &[(&str, Option<&str>)]) -> Oid {
        let mut index = self.repo.index().unwrap();
        for (path, content) in changes {
            let full = self.dir.path().join(path);
            match content {
                Some(text) => {
                    if let Some(parent) = full.parent() {
                        std::fs::create_dir_all(parent).unwrap();
                    }
                    std::fs::write(&full, text).unwrap();
                    index.add_path(Path::new(path)).unwrap();
                }
                None => {
                    std::fs::remove_file(&full).unwrap();
                    index.remove_path(Path::new(path)).unwrap();
                }
            }
        }
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let sig = Signature::new("Tester", "tester@example.com", &Time::new(time, 0)).unwrap();
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }
}
