//! Local mirrors of remote project repositories
//!
//! A mirror is a non-bare clone whose checked-out branch follows the
//! remote's default branch. Refreshing moves the branch to whatever the
//! remote has, including rewritten history.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{Commit, Cred, ErrorCode, FetchOptions, RemoteCallbacks, Repository, Revwalk, Sort};

use crate::GitError;

/// Remote every mirror is cloned from
pub const REMOTE_NAME: &str = "origin";

/// Credential attempts before a fetch gives up
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Socket timeouts for every clone and fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Establishing the connection to the remote
    pub connect: Duration,
    /// Any single read or write on an open connection
    pub io: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(15),
            io: Duration::from_secs(60),
        }
    }
}

/// Bound how long a stalled remote can hold a clone or fetch.
///
/// libgit2 keeps these settings in process-wide globals without
/// synchronization. Call once at startup, before any git work runs.
pub fn set_transport_timeouts(timeouts: TransportTimeouts) -> Result<(), GitError> {
    let connect = timeout_millis(timeouts.connect);
    let io = timeout_millis(timeouts.io);

    // SAFETY: no clone or fetch is running yet, so nothing reads the
    // globals while they change.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(connect)?;
        git2::opts::set_server_timeout_in_milliseconds(io)?;
    }
    Ok(())
}

fn timeout_millis(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX).max(1)
}

/// Result of refreshing a mirror from its remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The local branch moved
    Updated,
    /// The remote had nothing new
    AlreadyCurrent,
}

/// One entry of a mirror's history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub hash: String,
    pub author: String,
    pub message: String,
    /// Author time
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    fn from_commit(commit: &Commit<'_>) -> Result<Self, GitError> {
        let hash = commit.id().to_string();
        let author = commit.author();
        let seconds = author.when().seconds();
        let timestamp = DateTime::from_timestamp(seconds, 0).ok_or_else(|| GitError::InvalidCommit {
            hash: hash.clone(),
            reason: format!("author time {} out of range", seconds),
        })?;

        Ok(Self {
            author: String::from_utf8_lossy(author.name_bytes()).into_owned(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            hash,
            timestamp,
        })
    }
}

/// A local mirror of one remote repository
pub struct Mirror {
    repo: Repository,
    path: PathBuf,
}

impl std::fmt::Debug for Mirror {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mirror").field("path", &self.path).finish()
    }
}

impl Mirror {
    /// Clone `url` into `path`, creating parent directories as needed
    pub fn materialize(url: &str, path: &Path) -> Result<Self, GitError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_options());
        let repo = builder.clone(url, path).map_err(GitError::Clone)?;

        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing mirror
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::open(path).map_err(|e| GitError::corrupted(path, e.message()))?;
        if let Err(e) = repo.find_remote(REMOTE_NAME) {
            return Err(GitError::corrupted(
                path,
                format!("no '{}' remote: {}", REMOTE_NAME, e.message()),
            ));
        }

        Ok(Self {
            repo,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch the checked-out branch from the remote and move it to the
    /// fetched commit.
    pub fn refresh(&self) -> Result<RefreshOutcome, GitError> {
        let branch_ref = self.head_branch()?;
        let branch = branch_ref
            .strip_prefix("refs/heads/")
            .ok_or_else(|| GitError::corrupted(&self.path, format!("HEAD points at {}", branch_ref)))?;
        let tracking_ref = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);
        let refspec = format!("+{}:{}", branch_ref, tracking_ref);

        let mut remote = self
            .repo
            .find_remote(REMOTE_NAME)
            .map_err(|e| GitError::corrupted(&self.path, e.message()))?;
        remote
            .fetch(&[refspec.as_str()], Some(&mut fetch_options()), None)
            .map_err(GitError::Fetch)?;

        let upstream = match self.repo.refname_to_id(&tracking_ref) {
            Ok(oid) => oid,
            // The remote branch is still unborn
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(RefreshOutcome::AlreadyCurrent),
            Err(e) => return Err(e.into()),
        };
        let local = match self.repo.refname_to_id(&branch_ref) {
            Ok(oid) => Some(oid),
            Err(e) if e.code() == ErrorCode::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if local == Some(upstream) {
            return Ok(RefreshOutcome::AlreadyCurrent);
        }

        self.repo
            .reference(&branch_ref, upstream, true, "progress: refresh from origin")?;
        self.repo.set_head(&branch_ref)?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;

        Ok(RefreshOutcome::Updated)
    }

    /// Walk the checked-out branch newest-first.
    ///
    /// The walk is lazy: commits are read as the iterator advances. An
    /// unborn branch yields nothing.
    pub fn history(&self) -> Result<History<'_>, GitError> {
        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TIME)?;

        match self.repo.head() {
            Ok(_) => walk.push_head()?,
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(History {
            repo: &self.repo,
            walk,
        })
    }

    /// Hash of the checked-out commit, if any
    pub fn head_commit(&self) -> Result<Option<String>, GitError> {
        match self.repo.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn head_branch(&self) -> Result<String, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::corrupted(&self.path, e.message()))?;
        head.symbolic_target()
            .map(str::to_string)
            .ok_or_else(|| GitError::corrupted(&self.path, "HEAD is detached"))
    }
}

/// Lazy newest-first commit iterator over a mirror
pub struct History<'repo> {
    repo: &'repo Repository,
    walk: Revwalk<'repo>,
}

impl Iterator for History<'_> {
    type Item = Result<CommitInfo, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        let oid = match self.walk.next()? {
            Ok(oid) => oid,
            Err(e) => return Some(Err(e.into())),
        };
        Some(
            self.repo
                .find_commit(oid)
                .map_err(GitError::from)
                .and_then(|commit| CommitInfo::from_commit(&commit)),
        )
    }
}

fn fetch_options<'cb>() -> FetchOptions<'cb> {
    let config = git2::Config::open_default().ok();
    let mut attempts = 0;

    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::from_str("no usable credentials"));
        }
        if allowed.is_ssh_key() {
            if let Some(user) = username_from_url {
                return Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.is_user_pass_plaintext() {
            if let Some(ref cfg) = config {
                if let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }
        Cred::default()
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Oid, Signature, Time};
    use tempfile::TempDir;
    use url::Url;

    fn commit_at(repo: &Repository, message: &str, secs: i64) -> Oid {
        let sig = Signature::new("Alice", "alice@example.com", &Time::new(secs, 0)).unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap()
    }

    fn upstream_with(times: &[i64]) -> (TempDir, Repository, String) {
        let dir = TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        for (i, t) in times.iter().enumerate() {
            commit_at(&repo, &format!("commit {}", i), *t);
        }
        let url = Url::from_file_path(dir.path()).unwrap().to_string();
        (dir, repo, url)
    }

    #[test]
    fn test_materialize_and_walk_newest_first() {
        let (_up, _repo, url) = upstream_with(&[100, 200, 300]);
        let local = TempDir::new().unwrap();
        let path = local.path().join("nested").join("mirror");

        let mirror = Mirror::materialize(&url, &path).unwrap();
        let history: Vec<_> = mirror.history().unwrap().map(|c| c.unwrap()).collect();

        let times: Vec<_> = history.iter().map(|c| c.timestamp.timestamp()).collect();
        assert_eq!(times, vec![300, 200, 100]);
        assert_eq!(history[0].author, "Alice");
        assert_eq!(history[0].message, "commit 2");
        assert_eq!(mirror.head_commit().unwrap().as_deref(), Some(history[0].hash.as_str()));
    }

    #[test]
    fn test_refresh_reports_current_then_updated() {
        let (_up, upstream, url) = upstream_with(&[100]);
        let local = TempDir::new().unwrap();
        let path = local.path().join("mirror");
        Mirror::materialize(&url, &path).unwrap();

        let mirror = Mirror::open(&path).unwrap();
        assert_eq!(mirror.refresh().unwrap(), RefreshOutcome::AlreadyCurrent);

        let new_oid = commit_at(&upstream, "late work", 500);
        assert_eq!(mirror.refresh().unwrap(), RefreshOutcome::Updated);

        let newest = mirror.history().unwrap().next().unwrap().unwrap();
        assert_eq!(newest.hash, new_oid.to_string());
        assert_eq!(mirror.refresh().unwrap(), RefreshOutcome::AlreadyCurrent);
    }

    #[test]
    fn test_empty_upstream_has_empty_history() {
        let (_up, _repo, url) = upstream_with(&[]);
        let local = TempDir::new().unwrap();
        let path = local.path().join("mirror");

        let mirror = Mirror::materialize(&url, &path).unwrap();
        assert_eq!(mirror.history().unwrap().count(), 0);
        assert_eq!(mirror.head_commit().unwrap(), None);
    }

    #[test]
    fn test_open_missing_mirror_is_corrupted() {
        let local = TempDir::new().unwrap();
        let err = Mirror::open(&local.path().join("absent")).unwrap_err();
        assert!(matches!(err, GitError::Corrupted { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_unreachable_remote_is_transient() {
        let (up, _repo, url) = upstream_with(&[100]);
        let local = TempDir::new().unwrap();
        let path = local.path().join("mirror");
        let mirror = Mirror::materialize(&url, &path).unwrap();

        drop(_repo);
        up.close().unwrap();

        let err = mirror.refresh().unwrap_err();
        assert!(matches!(err, GitError::Fetch(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_timeout_millis_clamps() {
        assert_eq!(timeout_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(timeout_millis(Duration::ZERO), 1);
        assert_eq!(timeout_millis(Duration::from_secs(u64::MAX)), i32::MAX);
    }

    #[test]
    fn test_clone_of_missing_remote_fails() {
        let local = TempDir::new().unwrap();
        let missing = local.path().join("no-such-upstream");
        let url = Url::from_file_path(&missing).unwrap().to_string();

        let err = Mirror::materialize(&url, &local.path().join("mirror")).unwrap_err();
        assert!(matches!(err, GitError::Clone(_)));
    }
}
