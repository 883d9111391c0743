use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during Git operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Clone failed: {0}")]
    Clone(#[source] git2::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[source] git2::Error),

    #[error("Invalid remote URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Mirror at {} is unusable: {reason}", .path.display())]
    Corrupted { path: PathBuf, reason: String },

    #[error("Invalid commit {hash}: {reason}")]
    InvalidCommit { hash: String, reason: String },
}

impl GitError {
    /// Whether retrying on a later pass may succeed.
    ///
    /// Network and I/O failures are transient; a broken mirror or a bad
    /// URL will not fix itself.
    pub fn is_transient(&self) -> bool {
        match self {
            GitError::Clone(_) | GitError::Fetch(_) | GitError::Io(_) => true,
            GitError::Git(e) => matches!(
                e.class(),
                git2::ErrorClass::Net
                    | git2::ErrorClass::Http
                    | git2::ErrorClass::Ssh
                    | git2::ErrorClass::Ssl
                    | git2::ErrorClass::Os
            ),
            GitError::InvalidUrl { .. } | GitError::Corrupted { .. } | GitError::InvalidCommit { .. } => false,
        }
    }

    pub(crate) fn corrupted(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        GitError::Corrupted {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
