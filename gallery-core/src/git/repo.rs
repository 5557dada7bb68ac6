//! Inspection of local clones

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use git2::{Oid, Repository};

use crate::{Error, Result};

/// Commit currently checked out in a clone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadCommit {
    /// Full commit id
    pub id: String,
    /// Committer timestamp
    pub time: DateTime<Utc>,
}

/// A git repository wrapper providing gallery-specific operations
pub struct GitRepo {
    /// The underlying git2 repository
    repo: Repository,
    /// Path to the working tree root
    root: PathBuf,
}

impl std::fmt::Debug for GitRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitRepo")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl GitRepo {
    /// Open the git working tree rooted exactly at `path`
    ///
    /// Unlike discovery this does not search parent directories, so a
    /// destination nested inside some other checkout is not mistaken for a
    /// clone.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let repo = Repository::open(path).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                Error::Config(format!("Not a git repository: {}", path.display()))
            } else {
                Error::Git(e)
            }
        })?;

        let root = repo
            .workdir()
            .ok_or_else(|| Error::Config("Bare repositories are not supported".to_string()))?
            .to_path_buf();

        Ok(Self { repo, root })
    }

    /// Check if `path` is the root of a git working tree
    pub fn is_git_repo(path: impl AsRef<Path>) -> bool {
        Self::open(path).is_ok()
    }

    /// URL of the `origin` remote, if configured
    pub fn origin_url(&self) -> Option<String> {
        self.repo
            .find_remote("origin")
            .ok()
            .and_then(|remote| remote.url().map(str::to_string))
    }

    /// Get the current branch name
    pub fn current_branch(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(Error::Git(e)),
        };

        if head.is_branch() {
            Ok(head.shorthand().map(|s| s.to_string()))
        } else {
            // Detached HEAD
            Ok(None)
        }
    }

    /// Commit id of HEAD, `None` for an unborn branch
    pub fn head_oid(&self) -> Option<Oid> {
        self.repo.head().ok().and_then(|head| head.target())
    }

    /// Commit checked out in the working tree
    pub fn head_commit(&self) -> Result<Option<HeadCommit>> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(Error::Git(e)),
        };

        let commit = head.peel_to_commit()?;
        let time = DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default();

        Ok(Some(HeadCommit {
            id: commit.id().to_string(),
            time,
        }))
    }

    /// Branch the remote's HEAD points at, from the refs of the last fetch
    ///
    /// Falls back to `origin/main` and `origin/master` when the remote HEAD
    /// symref was never recorded.
    pub fn remote_head_branch(&self) -> Option<String> {
        if let Ok(reference) = self.repo.find_reference("refs/remotes/origin/HEAD") {
            if let Some(target) = reference.symbolic_target() {
                if let Some(branch) = target.strip_prefix("refs/remotes/origin/") {
                    return Some(branch.to_string());
                }
            }
        }

        if self.repo.find_reference("refs/remotes/origin/main").is_ok() {
            return Some("main".to_string());
        }

        if self.repo.find_reference("refs/remotes/origin/master").is_ok() {
            return Some("master".to_string());
        }

        None
    }

    /// Whether the remote-tracking branch has moved past HEAD
    ///
    /// Only local refs are consulted, so the answer reflects the last fetch.
    /// Returns `None` when HEAD is detached or no tracking ref exists.
    pub fn updates_available(&self) -> Result<Option<bool>> {
        let Some(branch) = self.current_branch()? else {
            return Ok(None);
        };

        let tracking = match self
            .repo
            .find_reference(&format!("refs/remotes/origin/{}", branch))
        {
            Ok(reference) => reference.target(),
            Err(_) => return Ok(None),
        };

        Ok(tracking.map(|oid| Some(oid) != self.head_oid()))
    }

    /// Get access to the underlying git2 repository
    pub fn inner(&self) -> &Repository {
        &self.repo
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{RepositoryInitOptions, Signature};
    use tempfile::TempDir;

    fn init_with_commit(dir: &Path) -> Repository {
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir, &opts).unwrap();
        {
            let sig = Signature::now("Gallery", "gallery@example.com").unwrap();
            let tree_id = repo.index().unwrap().write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_is_git_repo_negative() {
        let temp = TempDir::new().unwrap();
        assert!(!GitRepo::is_git_repo(temp.path()));
    }

    #[test]
    fn test_open_does_not_discover_parent() {
        let temp = TempDir::new().unwrap();
        init_with_commit(temp.path());
        let nested = temp.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        assert!(GitRepo::is_git_repo(temp.path()));
        assert!(!GitRepo::is_git_repo(&nested));
    }

    #[test]
    fn test_head_commit_and_branch() {
        let temp = TempDir::new().unwrap();
        let raw = init_with_commit(temp.path());
        let repo = GitRepo::open(temp.path()).unwrap();

        assert_eq!(repo.current_branch().unwrap().as_deref(), Some("main"));
        let head = repo.head_commit().unwrap().unwrap();
        assert_eq!(head.id, raw.head().unwrap().target().unwrap().to_string());
        assert!(repo.origin_url().is_none());
        // No origin, so nothing to compare against
        assert_eq!(repo.updates_available().unwrap(), None);
    }

    #[test]
    fn test_unborn_head() {
        let temp = TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        let repo = GitRepo::open(temp.path()).unwrap();
        assert!(repo.head_commit().unwrap().is_none());
        assert!(repo.head_oid().is_none());
    }
}
