use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ids::ProjectId;

/// An external repository bound to an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    /// Remote locator the mirror is cloned from
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub authors: Vec<String>,
    /// Local mirror path
    pub path: PathBuf,
    /// Hash of the newest ingested commit
    #[serde(default)]
    pub last_synced_commit: Option<String>,
    /// Watermark: author time of the newest ingested commit.
    /// `None` until the first successful sync.
    #[serde(default)]
    pub last_synced_time: Option<DateTime<Utc>>,
}

impl Project {
    pub fn new(id: ProjectId, request: ProjectRequest, path: PathBuf) -> Self {
        Self {
            id,
            url: request.url,
            name: request.name,
            authors: request.authors,
            path,
            last_synced_commit: None,
            last_synced_time: None,
        }
    }

    /// Advance the watermark. A timestamp at or before the current
    /// watermark leaves the project untouched.
    pub fn advance_watermark(&mut self, hash: impl Into<String>, time: DateTime<Utc>) -> bool {
        if self.last_synced_time.is_some_and(|current| time <= current) {
            return false;
        }
        self.last_synced_commit = Some(hash.into());
        self.last_synced_time = Some(time);
        true
    }

    /// Whether a commit with this timestamp is newer than the watermark
    pub fn is_unseen(&self, time: DateTime<Utc>) -> bool {
        self.last_synced_time.map_or(true, |current| time > current)
    }
}

/// Request to bind a new project to an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRequest {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub authors: Vec<String>,
}
