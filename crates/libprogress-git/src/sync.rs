//! Incremental ingestion of a project's history
//!
//! A sync pass refreshes the mirror, walks its history newest-first and
//! keeps every commit whose author time is strictly after the project's
//! watermark. Selected commits come back oldest-first so an event's log
//! reads in the order the work happened.

use chrono::{DateTime, Utc};
use libprogress_core::{CommitRecord, Project};

use crate::mirror::{CommitInfo, Mirror, RefreshOutcome};
use crate::GitError;

/// Commits picked from one history walk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Oldest-first
    pub commits: Vec<CommitRecord>,
    /// Hash and author time of the newest selected commit
    pub newest: Option<(String, DateTime<Utc>)>,
}

impl Selection {
    /// Apply to `project`, producing the outcome of a sync pass
    pub fn into_outcome(self, project: &Project, refresh: RefreshOutcome) -> SyncOutcome {
        let mut project = project.clone();
        if let Some((hash, time)) = self.newest {
            project.advance_watermark(hash, time);
        }
        SyncOutcome {
            project,
            commits: self.commits,
            refresh,
        }
    }
}

/// Result of syncing one project
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// The project with its watermark advanced
    pub project: Project,
    /// New commits, oldest-first
    pub commits: Vec<CommitRecord>,
    pub refresh: RefreshOutcome,
}

impl SyncOutcome {
    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Pick the commits of `history` (newest-first) that are newer than
/// `watermark`. With no watermark every commit is picked.
///
/// The first error in the walk aborts the selection.
pub fn select_new_commits<I>(
    project_name: &str,
    watermark: Option<DateTime<Utc>>,
    history: I,
) -> Result<Selection, GitError>
where
    I: IntoIterator<Item = Result<CommitInfo, GitError>>,
{
    let mut selection = Selection::default();

    for info in history {
        let info = info?;
        if watermark.is_some_and(|mark| info.timestamp <= mark) {
            continue;
        }

        let is_newest = selection
            .newest
            .as_ref()
            .map_or(true, |(_, time)| info.timestamp > *time);
        if is_newest {
            selection.newest = Some((info.hash.clone(), info.timestamp));
        }

        selection.commits.push(CommitRecord::new(
            project_name,
            info.author,
            info.message,
            info.timestamp,
        ));
    }

    selection.commits.reverse();
    Ok(selection)
}

/// Refresh a project's mirror and collect what arrived since its watermark
pub fn sync_project(project: &Project) -> Result<SyncOutcome, GitError> {
    let mirror = Mirror::open(&project.path)?;
    let refresh = mirror.refresh()?;
    collect(&mirror, project, refresh)
}

/// Collect a project's history from a mirror that was just cloned
pub fn ingest_mirror(mirror: &Mirror, project: &Project) -> Result<SyncOutcome, GitError> {
    collect(mirror, project, RefreshOutcome::Updated)
}

fn collect(mirror: &Mirror, project: &Project, refresh: RefreshOutcome) -> Result<SyncOutcome, GitError> {
    let selection = select_new_commits(&project.name, project.last_synced_time, mirror.history()?)?;
    Ok(selection.into_outcome(project, refresh))
}
