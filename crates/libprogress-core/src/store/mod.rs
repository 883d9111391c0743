use std::fs::File;
use std::path::Path;

use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionResult, TransactionalTree};
use sled::Transactional;

use crate::error::{abort, ProgressError};
use crate::pagination::PageRequest;
use crate::types::commit::CommitRecord;
use crate::types::event::Event;
use crate::types::ids::{generate_event_id, id_from_key, id_key, EventId, ProjectId};
use crate::types::project::Project;

/// Tree holding event records
pub const EVENTS_TREE: &str = "events";
/// Tree holding project records
pub const PROJECTS_TREE: &str = "projects";
/// Tree holding one commit log per event
pub const COMMITS_TREE: &str = "commits";
/// Tree holding the ids of events whose tracking is enabled
pub const TRACKING_TREE: &str = "tracking";

type TxResult<T> = TransactionResult<T, ProgressError>;
type TxStep<T> = Result<T, ConflictableTransactionError<ProgressError>>;

/// Statistics about the database
#[derive(Debug)]
pub struct DbStats {
    pub path: String,
    pub size_bytes: u64,
    pub event_count: usize,
    pub project_count: usize,
    pub commit_count: usize,
    pub tracked_count: usize,
}

/// A ProgressStore with filesystem-level exclusive lock.
///
/// The lock is held for the lifetime of this struct and released when
/// dropped, so two processes never open the same sled database.
pub struct LockedStore {
    /// Lock file handle - flock released on drop
    _lock_file: File,
    store: ProgressStore,
}

impl std::fmt::Debug for LockedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockedStore")
            .field("store", &"ProgressStore { ... }")
            .finish()
    }
}

impl LockedStore {
    /// Give up the wrapper, keeping the lock alive alongside the store
    pub fn into_parts(self) -> (ProgressStore, File) {
        (self.store, self._lock_file)
    }
}

impl std::ops::Deref for LockedStore {
    type Target = ProgressStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Event, project and commit-log storage backed by sled.
///
/// Every read-modify-write runs inside a sled transaction, so concurrent
/// writers to the same event never lose each other's appends and no caller
/// observes a half-applied update.
pub struct ProgressStore {
    db: sled::Db,
    events: sled::Tree,
    projects: sled::Tree,
    commits: sled::Tree,
    tracking: sled::Tree,
}

impl ProgressStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self, ProgressError> {
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Build a store on an already opened database
    pub fn with_db(db: sled::Db) -> Result<Self, ProgressError> {
        let events = db.open_tree(EVENTS_TREE)?;
        let projects = db.open_tree(PROJECTS_TREE)?;
        let commits = db.open_tree(COMMITS_TREE)?;
        let tracking = db.open_tree(TRACKING_TREE)?;

        Ok(Self {
            db,
            events,
            projects,
            commits,
            tracking,
        })
    }

    /// In-memory store removed on drop
    pub fn temporary() -> Result<Self, ProgressError> {
        Self::with_db(sled::Config::new().temporary(true).open()?)
    }

    /// Open store with exclusive filesystem lock (non-blocking).
    ///
    /// Lock file is created at `<path>.lock`.
    /// Returns `ProgressError::DbBusy` if another process holds the lock.
    pub fn open_locked(path: &Path) -> Result<LockedStore, ProgressError> {
        let lock_file = create_lock_file(path)?;

        lock_file
            .try_lock_exclusive()
            .map_err(|e| ProgressError::database_locked(Some(&e.to_string())))?;

        let store = Self::open(path)?;
        Ok(LockedStore {
            _lock_file: lock_file,
            store,
        })
    }

    /// Create an event with no projects and an empty commit log
    pub fn create_event(&self, name: &str) -> Result<EventId, ProgressError> {
        let event = Event::new(generate_event_id(), name);
        self.insert_event(&event)?;
        Ok(event.id)
    }

    /// Store a new event together with its empty commit log
    pub fn insert_event(&self, event: &Event) -> Result<(), ProgressError> {
        let key = id_key(&event.id);
        let event_json = serde_json::to_vec(event)?;
        let empty_log = serde_json::to_vec(&Vec::<CommitRecord>::new())?;

        let result: TxResult<()> = (&self.events, &self.commits).transaction(|(events, commits)| {
            events.insert(&key[..], event_json.as_slice())?;
            commits.insert(&key[..], empty_log.as_slice())?;
            Ok(())
        });
        result?;
        Ok(())
    }

    /// Get an event by ID
    pub fn get_event(&self, event_id: &EventId) -> Result<Option<Event>, ProgressError> {
        get_json(&self.events, &id_key(event_id))
    }

    /// Get an event by ID, failing with NotFound if it does not exist
    pub fn require_event(&self, event_id: &EventId) -> Result<Event, ProgressError> {
        self.get_event(event_id)?
            .ok_or_else(|| ProgressError::event_not_found(event_id))
    }

    /// List all events, in key order
    pub fn list_events(&self) -> Result<Vec<Event>, ProgressError> {
        let mut events = Vec::new();
        for result in self.events.iter() {
            let (_, value) = result?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    /// Bind a project to an event. Binding twice is a no-op.
    pub fn add_project_ref(&self, event_id: &EventId, project_id: &ProjectId) -> Result<(), ProgressError> {
        let result: TxResult<bool> = self
            .events
            .transaction(|events| bind_project(events, event_id, project_id));
        result?;
        Ok(())
    }

    /// Get an event's full commit log, oldest first
    pub fn get_commits(&self, event_id: &EventId) -> Result<Option<Vec<CommitRecord>>, ProgressError> {
        get_json(&self.commits, &id_key(event_id))
    }

    /// One page of an event's commit log, counted from the newest end
    pub fn get_commit_page(&self, event_id: &EventId, page: PageRequest) -> Result<Vec<CommitRecord>, ProgressError> {
        let log = self
            .get_commits(event_id)?
            .ok_or_else(|| ProgressError::event_not_found(event_id))?;
        Ok(page.apply(&log).to_vec())
    }

    /// Append commits to the end of an event's log.
    ///
    /// Returns the new length of the log.
    pub fn append_commits(&self, event_id: &EventId, commits: &[CommitRecord]) -> Result<usize, ProgressError> {
        let result: TxResult<usize> = self
            .commits
            .transaction(|logs| append_log(logs, event_id, commits));
        Ok(result?)
    }

    /// Get a project by ID
    pub fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>, ProgressError> {
        get_json(&self.projects, &id_key(project_id))
    }

    /// Store a project, replacing any previous record
    pub fn store_project(&self, project: &Project) -> Result<(), ProgressError> {
        let project_json = serde_json::to_vec(project)?;
        self.projects.insert(id_key(&project.id), project_json)?;
        Ok(())
    }

    /// Persist the result of one sync pass for a project.
    ///
    /// Appends `commits` to the event's log and stores `project` in a single
    /// transaction. Commits that are not newer than the watermark already on
    /// record are dropped and a newer stored watermark is kept, so the
    /// watermark never moves backward. Returns the number of commits appended.
    pub fn record_sync(
        &self,
        event_id: &EventId,
        project: &Project,
        commits: &[CommitRecord],
    ) -> Result<usize, ProgressError> {
        let project_key = id_key(&project.id);

        let result: TxResult<usize> = (&self.projects, &self.commits).transaction(|(projects, logs)| {
            let mut merged = project.clone();
            let mut fresh = commits.to_vec();

            if let Some(stored) = read_json::<Project>(projects, &project_key)? {
                fresh.retain(|c| stored.is_unseen(c.date));
                if stored.last_synced_time > merged.last_synced_time {
                    merged.last_synced_commit = stored.last_synced_commit;
                    merged.last_synced_time = stored.last_synced_time;
                }
            }

            append_log(logs, event_id, &fresh)?;
            write_json(projects, &project_key, &merged)?;
            Ok(fresh.len())
        });
        Ok(result?)
    }

    /// Register a project on an event together with its initial history.
    ///
    /// The reference, the project record and the commits land atomically.
    pub fn attach_project(
        &self,
        event_id: &EventId,
        project: &Project,
        commits: &[CommitRecord],
    ) -> Result<(), ProgressError> {
        let project_key = id_key(&project.id);

        let result: TxResult<()> = (&self.events, &self.projects, &self.commits).transaction(
            |(events, projects, logs)| {
                bind_project(events, event_id, &project.id)?;
                write_json(projects, &project_key, project)?;
                append_log(logs, event_id, commits)?;
                Ok(())
            },
        );
        result?;
        Ok(())
    }

    /// Remember whether tracking is enabled for an event
    pub fn set_tracking_flag(&self, event_id: &EventId, enabled: bool) -> Result<(), ProgressError> {
        let key = id_key(event_id);
        if enabled {
            self.tracking.insert(key, &[1u8][..])?;
        } else {
            self.tracking.remove(key)?;
        }
        Ok(())
    }

    /// Events whose tracking flag is set
    pub fn tracked_events(&self) -> Result<Vec<EventId>, ProgressError> {
        let mut ids = Vec::new();
        for result in self.tracking.iter() {
            let (key, _) = result?;
            ids.push(id_from_key(&key)?);
        }
        Ok(ids)
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), ProgressError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self, path: &Path) -> Result<DbStats, ProgressError> {
        let mut commit_count = 0;
        for result in self.commits.iter() {
            let (_, value) = result?;
            let log: Vec<CommitRecord> = serde_json::from_slice(&value)?;
            commit_count += log.len();
        }

        Ok(DbStats {
            path: path.to_string_lossy().to_string(),
            size_bytes: self.db.size_on_disk()?,
            event_count: self.events.len(),
            project_count: self.projects.len(),
            commit_count,
            tracked_count: self.tracking.len(),
        })
    }
}

fn create_lock_file(path: &Path) -> Result<File, ProgressError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(path.with_extension("lock"))?)
}

fn get_json<T: DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, ProgressError> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn read_json<T: DeserializeOwned>(tree: &TransactionalTree, key: &[u8]) -> TxStep<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(abort),
        None => Ok(None),
    }
}

fn write_json<T: Serialize>(tree: &TransactionalTree, key: &[u8], value: &T) -> TxStep<()> {
    let bytes = serde_json::to_vec(value).map_err(abort)?;
    tree.insert(key, bytes)?;
    Ok(())
}

fn bind_project(events: &TransactionalTree, event_id: &EventId, project_id: &ProjectId) -> TxStep<bool> {
    let key = id_key(event_id);
    let mut event: Event = read_json(events, &key)?
        .ok_or_else(|| abort(ProgressError::event_not_found(event_id)))?;
    if !event.bind(*project_id) {
        return Ok(false);
    }
    write_json(events, &key, &event)?;
    Ok(true)
}

fn append_log(logs: &TransactionalTree, event_id: &EventId, commits: &[CommitRecord]) -> TxStep<usize> {
    let key = id_key(event_id);
    let mut log: Vec<CommitRecord> = read_json(logs, &key)?
        .ok_or_else(|| abort(ProgressError::event_not_found(event_id)))?;
    if commits.is_empty() {
        return Ok(log.len());
    }
    log.extend_from_slice(commits);
    write_json(logs, &key, &log)?;
    Ok(log.len())
}
