use sled::transaction::{ConflictableTransactionError, TransactionError};
use thiserror::Error;

use crate::types::ids::id_short;
use uuid::Uuid;

/// Main error type for progress-logger operations
#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database busy: {0}")]
    DbBusy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("ID parse error: {0}")]
    IdParse(#[from] crate::types::ids::IdParseError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProgressError {
    /// Error code used in JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            ProgressError::Validation(_) => "invalid_args",
            ProgressError::NotFound(_) => "not_found",
            ProgressError::Conflict(_) => "conflict",
            ProgressError::DbBusy(_) => "db_busy",
            ProgressError::Io(_) => "io_error",
            ProgressError::Sled(_) => "db_error",
            ProgressError::Json(_) => "internal_error",
            ProgressError::TomlParse(_) => "invalid_args",
            ProgressError::TomlSerialize(_) => "internal_error",
            ProgressError::IdParse(_) => "invalid_args",
            ProgressError::Internal(_) => "internal_error",
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            ProgressError::Validation(_) => 2,
            ProgressError::NotFound(_) => 3,
            ProgressError::Conflict(_) => 4,
            ProgressError::DbBusy(_) => 5,
            ProgressError::Io(_) => 5,
            ProgressError::Sled(_) => 5,
            ProgressError::IdParse(_) => 2,
            ProgressError::TomlParse(_) => 2,
            _ => 1,
        }
    }

    /// Whether this error comes from the storage layer itself.
    ///
    /// Storage errors are fatal to a background tracking task.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            ProgressError::Sled(_) | ProgressError::Json(_) | ProgressError::Io(_)
        )
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            ProgressError::NotFound(msg) => {
                if msg.starts_with("Event") {
                    vec!["Run 'progressd event list' to see known events"]
                } else {
                    vec![]
                }
            }
            ProgressError::DbBusy(_) => vec![
                "Another process holds the database, most likely 'progressd serve'",
                "Stop it or wait for it to finish, then retry",
            ],
            ProgressError::Sled(_) => vec![
                "Check disk space and permissions of the data directory",
            ],
            ProgressError::IdParse(_) => vec![
                "IDs are UUIDs (e.g., '0b6b0a3e-5a3c-4f3a-9a44-2f1d4c6f2e11')",
            ],
            ProgressError::Conflict(_) => vec![
                "Run 'progressd event show <id>' to see the projects already bound",
            ],
            _ => vec![],
        }
    }

    /// NotFound error for an event
    pub fn event_not_found(event_id: &Uuid) -> Self {
        ProgressError::NotFound(format!("Event '{}' not found", id_short(event_id)))
    }

    /// NotFound error for a project
    pub fn project_not_found(project_id: &Uuid) -> Self {
        ProgressError::NotFound(format!("Project '{}' not found", id_short(project_id)))
    }

    /// DbBusy error with lock details
    pub fn database_locked(details: Option<&str>) -> Self {
        let msg = match details {
            Some(d) => format!("Database is locked ({})", d),
            None => "Database is locked by another process".to_string(),
        };
        ProgressError::DbBusy(msg)
    }
}

impl From<TransactionError<ProgressError>> for ProgressError {
    fn from(e: TransactionError<ProgressError>) -> Self {
        match e {
            TransactionError::Abort(inner) => inner,
            TransactionError::Storage(inner) => ProgressError::Sled(inner),
        }
    }
}

/// Abort a sled transaction with a store error
pub(crate) fn abort<E: Into<ProgressError>>(e: E) -> ConflictableTransactionError<ProgressError> {
    ConflictableTransactionError::Abort(e.into())
}
