//! Daemon-specific error types

use libprogress_core::ProgressError;
use libprogress_git::GitError;
use thiserror::Error;

/// Errors surfaced by the service, the supervisor and the CLI
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Store, validation and lookup errors
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// Git error
    #[error("git: {0}")]
    Git(#[from] GitError),

    /// A spawned task panicked or was cancelled
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The supervisor no longer accepts work
    #[error("tracking supervisor is shut down")]
    Shutdown,
}

impl DaemonError {
    /// Error code used in JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            DaemonError::Progress(e) => e.error_code(),
            DaemonError::Git(GitError::InvalidUrl { .. }) => "invalid_args",
            DaemonError::Git(_) => "git_error",
            DaemonError::Join(_) => "internal_error",
            DaemonError::Io(_) => "io_error",
            DaemonError::Json(_) => "internal_error",
            DaemonError::Shutdown => "shutdown",
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Progress(e) => e.exit_code(),
            DaemonError::Git(GitError::InvalidUrl { .. }) => 2,
            DaemonError::Git(_) => 6,
            DaemonError::Io(_) => 5,
            _ => 1,
        }
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            DaemonError::Progress(e) => e.suggestions(),
            DaemonError::Git(e) if e.is_transient() => {
                vec!["Check that the remote is reachable and credentials are available, then retry"]
            }
            DaemonError::Git(GitError::Corrupted { .. }) => {
                vec!["Remove the mirror directory and register the project again"]
            }
            _ => vec![],
        }
    }

    /// Whether a background tracking task must stop on this error
    pub fn is_fatal_to_tracking(&self) -> bool {
        match self {
            DaemonError::Progress(ProgressError::NotFound(_)) => true,
            DaemonError::Progress(e) => e.is_storage(),
            DaemonError::Shutdown => true,
            _ => false,
        }
    }
}
