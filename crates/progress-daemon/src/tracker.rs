//! Tracker module - the polling task of one tracked event
//!
//! Each tick walks the event's projects in order, syncs each one on the
//! blocking pool and records the result. A failing project is logged and
//! skipped; losing the event or the store ends the task.

use std::sync::Arc;
use std::time::Duration;

use libprogress_core::{EventId, ProgressStore};
use libprogress_git::sync_project;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::DaemonError;

/// Why a tracking task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerExit {
    /// Tracking was disabled or replaced
    Stopped,
    /// The supervisor shut down
    Shutdown,
    /// An unrecoverable tick error
    Failed(String),
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub projects: usize,
    pub synced: usize,
    pub failed: usize,
    pub appended: usize,
    /// Stop or shutdown arrived before every project was visited
    pub interrupted: bool,
}

/// Sent to the supervisor's reaper when a task ends on its own
#[derive(Debug)]
pub(crate) struct TrackerExited {
    pub event_id: EventId,
    pub generation: u64,
    pub exit: TrackerExit,
}

pub(crate) struct Tracker {
    pub event_id: EventId,
    pub generation: u64,
    pub store: Arc<ProgressStore>,
    pub interval: Duration,
    pub stop_rx: watch::Receiver<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
    pub exit_tx: mpsc::UnboundedSender<TrackerExited>,
}

impl Tracker {
    /// Run until stopped, shut down, or failed
    pub async fn run(mut self) -> TrackerExit {
        debug!(event = %self.event_id, generation = self.generation, "Tracker started");

        let exit = self.run_loop().await;
        match &exit {
            TrackerExit::Failed(reason) => {
                error!(event = %self.event_id, reason = %reason, "Tracker stopped on error");
            }
            _ => debug!(event = %self.event_id, exit = ?exit, "Tracker stopped"),
        }

        // The reaper may already be gone during teardown
        let _ = self.exit_tx.send(TrackerExited {
            event_id: self.event_id,
            generation: self.generation,
            exit: exit.clone(),
        });
        exit
    }

    async fn run_loop(&mut self) -> TrackerExit {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(exit) = self.cancelled() {
                return exit;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                changed = self.stop_rx.changed() => {
                    if changed.is_err() {
                        return TrackerExit::Stopped;
                    }
                    continue;
                }
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() {
                        return TrackerExit::Shutdown;
                    }
                    continue;
                }
            }

            match self.tick().await {
                Ok(report) if report.appended > 0 => {
                    info!(
                        event = %self.event_id,
                        appended = report.appended,
                        failed = report.failed,
                        "Tick recorded new commits"
                    );
                }
                Ok(report) => {
                    debug!(event = %self.event_id, report = ?report, "Tick finished");
                }
                Err(e) if e.is_fatal_to_tracking() => return TrackerExit::Failed(e.to_string()),
                Err(e) => warn!(event = %self.event_id, "Tick failed: {}", e),
            }
        }
    }

    fn cancelled(&self) -> Option<TrackerExit> {
        if *self.shutdown_rx.borrow() {
            Some(TrackerExit::Shutdown)
        } else if *self.stop_rx.borrow() {
            Some(TrackerExit::Stopped)
        } else {
            None
        }
    }

    /// Sync every project of the event once.
    ///
    /// A stop or shutdown abandons the sync in flight. Its result is
    /// dropped before anything is recorded.
    async fn tick(&mut self) -> Result<TickReport, DaemonError> {
        let event = self.store.require_event(&self.event_id)?;
        let mut report = TickReport {
            projects: event.projects.len(),
            ..TickReport::default()
        };

        for project_id in &event.projects {
            if self.cancelled().is_some() {
                report.interrupted = true;
                break;
            }

            let Some(project) = self.store.get_project(project_id)? else {
                warn!(event = %self.event_id, project = %project_id, "Bound project has no record");
                report.failed += 1;
                continue;
            };
            let name = project.name.clone();

            let sync = tokio::task::spawn_blocking(move || sync_project(&project));
            let joined = tokio::select! {
                joined = sync => joined,
                _ = cancel_requested(&mut self.stop_rx, &mut self.shutdown_rx) => {
                    debug!(event = %self.event_id, project = %name, "Abandoned sync in flight");
                    report.interrupted = true;
                    break;
                }
            };

            match joined {
                Ok(Ok(outcome)) => {
                    let appended = self
                        .store
                        .record_sync(&self.event_id, &outcome.project, &outcome.commits)?;
                    report.synced += 1;
                    report.appended += appended;
                    debug!(event = %self.event_id, project = %name, appended, "Project synced");
                }
                Ok(Err(e)) if e.is_transient() => {
                    warn!(event = %self.event_id, project = %name, "Sync failed, retrying next tick: {}", e);
                    report.failed += 1;
                }
                Ok(Err(e)) => {
                    error!(event = %self.event_id, project = %name, "Sync failed: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!(event = %self.event_id, project = %name, "Sync task panicked: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Resolves once stop or shutdown is requested, or a sender is gone
async fn cancel_requested(stop_rx: &mut watch::Receiver<bool>, shutdown_rx: &mut watch::Receiver<bool>) {
    tokio::select! {
        _ = stop_rx.wait_for(|stop| *stop) => {}
        _ = shutdown_rx.wait_for(|shutdown| *shutdown) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(store: Arc<ProgressStore>, event_id: EventId) -> (Tracker, watch::Sender<bool>, watch::Sender<bool>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (exit_tx, _exit_rx) = mpsc::unbounded_channel();
        let tracker = Tracker {
            event_id,
            generation: 0,
            store,
            interval: Duration::from_millis(20),
            stop_rx,
            shutdown_rx,
            exit_tx,
        };
        (tracker, stop_tx, shutdown_tx)
    }

    #[tokio::test]
    async fn test_tick_on_event_without_projects() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("empty").unwrap();
        let (mut tracker, _stop, _shutdown) = tracker(store, event_id);

        let report = tracker.tick().await.unwrap();
        assert_eq!(report, TickReport::default());
    }

    #[tokio::test]
    async fn test_tick_on_missing_event_is_fatal() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let (mut tracker, _stop, _shutdown) = tracker(store, uuid::Uuid::new_v4());

        let err = tracker.tick().await.unwrap_err();
        assert!(err.is_fatal_to_tracking());
    }

    #[tokio::test]
    async fn test_stop_signal_ends_task() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("stop").unwrap();
        let (tracker, stop, _shutdown) = tracker(store, event_id);

        let join = tokio::spawn(tracker.run());
        stop.send_replace(true);
        let exit = tokio::time::timeout(Duration::from_secs(2), join).await.unwrap().unwrap();
        assert_eq!(exit, TrackerExit::Stopped);
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_stop() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("shutdown").unwrap();
        let (tracker, stop, shutdown) = tracker(store, event_id);

        shutdown.send_replace(true);
        stop.send_replace(true);
        let exit = tracker.run().await;
        assert_eq!(exit, TrackerExit::Shutdown);
    }

    #[tokio::test]
    async fn test_failed_project_is_isolated() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("broken").unwrap();
        let project = libprogress_core::Project::new(
            libprogress_core::types::ids::generate_project_id(),
            libprogress_core::ProjectRequest {
                url: "https://example.com/gone.git".into(),
                name: "gone".into(),
                authors: vec![],
            },
            std::path::PathBuf::from("/nonexistent/progress/mirror"),
        );
        store.attach_project(&event_id, &project, &[]).unwrap();
        let (mut tracker, _stop, _shutdown) = tracker(store, event_id);

        let report = tracker.tick().await.unwrap();
        assert_eq!(report.projects, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.synced, 0);
    }

    fn upstream(dir: &std::path::Path, times: &[i64]) -> git2::Repository {
        let repo = git2::Repository::init(dir).unwrap();
        for (i, secs) in times.iter().enumerate() {
            commit_at(&repo, &format!("work {}", i), *secs);
        }
        repo
    }

    fn commit_at(repo: &git2::Repository, message: &str, secs: i64) {
        let sig = git2::Signature::new("Dana", "dana@example.com", &git2::Time::new(secs, 0)).unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents).unwrap();
    }

    /// Clone an upstream, ingest it and bind it to the event
    fn bind(store: &ProgressStore, event_id: &EventId, upstream: &std::path::Path, mirror: std::path::PathBuf) {
        let url = url::Url::from_file_path(upstream).unwrap().to_string();
        let project = libprogress_core::Project::new(
            libprogress_core::types::ids::generate_project_id(),
            libprogress_core::ProjectRequest {
                url: url.clone(),
                name: mirror.file_name().unwrap().to_string_lossy().into_owned(),
                authors: vec![],
            },
            mirror,
        );
        let cloned = libprogress_git::Mirror::materialize(&url, &project.path).unwrap();
        let outcome = libprogress_git::ingest_mirror(&cloned, &project).unwrap();
        store
            .attach_project(event_id, &outcome.project, &outcome.commits)
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unreachable_remote_does_not_stop_the_tick() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("mixed").unwrap();
        let mirrors = tempfile::TempDir::new().unwrap();
        let gone = tempfile::TempDir::new().unwrap();
        let healthy = tempfile::TempDir::new().unwrap();

        drop(upstream(gone.path(), &[100]));
        let healthy_repo = upstream(healthy.path(), &[100]);
        bind(&store, &event_id, gone.path(), mirrors.path().join("gone"));
        bind(&store, &event_id, healthy.path(), mirrors.path().join("healthy"));

        // The first project's remote disappears; its fetch now fails
        gone.close().unwrap();
        commit_at(&healthy_repo, "still moving", 200);

        let (mut tracker, _stop, _shutdown) = tracker(store.clone(), event_id);
        let report = tracker.tick().await.unwrap();
        assert_eq!(report.projects, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.synced, 1);
        assert_eq!(report.appended, 1);
        assert!(!report.interrupted);

        let log = store.get_commits(&event_id).unwrap().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[2].message, "still moving");
        assert_eq!(log[2].project, "healthy");
    }

    #[tokio::test]
    async fn test_tick_after_stop_visits_nothing() {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let event_id = store.create_event("stopped").unwrap();
        let mirrors = tempfile::TempDir::new().unwrap();
        let up = tempfile::TempDir::new().unwrap();
        let _repo = upstream(up.path(), &[100]);
        bind(&store, &event_id, up.path(), mirrors.path().join("api"));

        let (mut tracker, stop, _shutdown) = tracker(store, event_id);
        stop.send_replace(true);
        let report = tracker.tick().await.unwrap();
        assert!(report.interrupted);
        assert_eq!(report.synced, 0);
    }
}
