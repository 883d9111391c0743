//! Supervisor module - owns the tracking tasks of all events
//!
//! The supervisor:
//! - Keeps at most one live tracking task per event
//! - Stops and joins a task before replacing or removing it
//! - Reaps tasks that end on their own
//! - Stops every task on shutdown and refuses new work afterwards

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use libprogress_core::{EventId, ProgressStore};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::DaemonError;
use crate::tracker::{Tracker, TrackerExit, TrackerExited};

/// Observable state of an event's tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Idle,
    Running,
    /// The supervisor has shut down
    Stopped,
}

/// Handle of a live tracking task
struct TrackerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<TrackerExit>,
    generation: u64,
}

type Registry = Arc<Mutex<HashMap<EventId, TrackerHandle>>>;

/// Supervisor of per-event tracking tasks
pub struct TrackingSupervisor {
    store: Arc<ProgressStore>,
    interval: Duration,
    /// Live tasks by event
    trackers: Registry,
    shutdown_tx: watch::Sender<bool>,
    /// Cloned into every task
    exit_tx: mpsc::UnboundedSender<TrackerExited>,
    next_generation: AtomicU64,
}

impl TrackingSupervisor {
    /// Create a supervisor ticking every `interval`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(store: Arc<ProgressStore>, interval: Duration) -> Self {
        let trackers: Registry = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, _) = watch::channel(false);
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();

        tokio::spawn(reap(trackers.clone(), exit_rx));

        Self {
            store,
            interval,
            trackers,
            shutdown_tx,
            exit_tx,
            next_generation: AtomicU64::new(0),
        }
    }

    /// Start tracking an event, replacing any task already running for it.
    ///
    /// A replaced task is joined after the registry is released, so other
    /// events stay reachable while it winds down.
    pub async fn enable(&self, event_id: EventId) -> Result<(), DaemonError> {
        self.store.require_event(&event_id)?;

        loop {
            let previous = {
                let mut trackers = self.trackers.lock().await;
                if *self.shutdown_tx.borrow() {
                    return Err(DaemonError::Shutdown);
                }
                prune_finished(&mut trackers);

                match trackers.remove(&event_id) {
                    Some(previous) => {
                        previous.stop_tx.send_replace(true);
                        previous
                    }
                    None => {
                        let generation = self.spawn_tracker(&mut trackers, event_id);
                        info!(event = %event_id, generation, "Tracking enabled");
                        return Ok(());
                    }
                }
            };

            debug!(event = %event_id, generation = previous.generation, "Replacing tracker");
            join_tracker(&event_id, previous).await;
        }
    }

    fn spawn_tracker(&self, trackers: &mut HashMap<EventId, TrackerHandle>, event_id: EventId) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);
        let tracker = Tracker {
            event_id,
            generation,
            store: self.store.clone(),
            interval: self.interval,
            stop_rx,
            shutdown_rx: self.shutdown_tx.subscribe(),
            exit_tx: self.exit_tx.clone(),
        };
        let join = tokio::spawn(tracker.run());

        trackers.insert(
            event_id,
            TrackerHandle {
                stop_tx,
                join,
                generation,
            },
        );
        generation
    }

    /// Stop tracking an event. Returns false when nothing was running.
    pub async fn disable(&self, event_id: &EventId) -> bool {
        let handle = {
            let mut trackers = self.trackers.lock().await;
            prune_finished(&mut trackers);
            let handle = trackers.remove(event_id);
            if let Some(handle) = &handle {
                handle.stop_tx.send_replace(true);
            }
            handle
        };

        match handle {
            Some(handle) => {
                join_tracker(event_id, handle).await;
                info!(event = %event_id, "Tracking disabled");
                true
            }
            None => false,
        }
    }

    /// Stop every task and refuse further `enable` calls
    pub async fn shutdown(&self) {
        let handles: Vec<_> = {
            let mut trackers = self.trackers.lock().await;
            if self.shutdown_tx.send_replace(true) {
                return;
            }
            trackers.drain().collect()
        };

        let count = handles.len();
        for (event_id, handle) in handles {
            join_tracker(&event_id, handle).await;
        }
        info!(stopped = count, "Tracking supervisor shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub async fn status(&self, event_id: &EventId) -> TrackerState {
        let mut trackers = self.trackers.lock().await;
        if self.is_shut_down() {
            return TrackerState::Stopped;
        }
        prune_finished(&mut trackers);
        if trackers.contains_key(event_id) {
            TrackerState::Running
        } else {
            TrackerState::Idle
        }
    }

    /// Events with a live tracking task
    pub async fn tracked_events(&self) -> Vec<EventId> {
        let mut trackers = self.trackers.lock().await;
        prune_finished(&mut trackers);
        let mut ids: Vec<_> = trackers.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn prune_finished(trackers: &mut HashMap<EventId, TrackerHandle>) {
    trackers.retain(|_, handle| !handle.join.is_finished());
}

async fn join_tracker(event_id: &EventId, handle: TrackerHandle) -> Option<TrackerExit> {
    match handle.join.await {
        Ok(exit) => Some(exit),
        Err(e) => {
            error!(event = %event_id, "Tracker task failed to join: {}", e);
            None
        }
    }
}

/// Drop the handles of tasks that ended on their own
async fn reap(trackers: Registry, mut exit_rx: mpsc::UnboundedReceiver<TrackerExited>) {
    while let Some(exited) = exit_rx.recv().await {
        let mut trackers = trackers.lock().await;
        let current = trackers
            .get(&exited.event_id)
            .is_some_and(|handle| handle.generation == exited.generation);
        if current {
            trackers.remove(&exited.event_id);
            debug!(event = %exited.event_id, exit = ?exited.exit, "Reaped tracker");
        }
    }
}
