use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ingested commit, as stored in an event's commit log.
///
/// Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Display name of the project the commit came from
    pub project: String,
    pub author: String,
    pub message: String,
    /// Author timestamp
    pub date: DateTime<Utc>,
}

impl CommitRecord {
    pub fn new(
        project: impl Into<String>,
        author: impl Into<String>,
        message: impl Into<String>,
        date: DateTime<Utc>,
    ) -> Self {
        Self {
            project: project.into(),
            author: author.into(),
            message: message.into(),
            date,
        }
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}
