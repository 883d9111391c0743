//! Request-level API over the store, the git mirrors and the supervisor

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use libprogress_core::types::ids::{generate_event_id, generate_project_id};
use libprogress_core::{
    CommitRecord, Event, EventId, EventRequest, PageRequest, ProgressConfig, ProgressError,
    ProgressStore, Project, ProjectId, ProjectRequest,
};
use libprogress_git::{ingest_mirror, mirror_path, validate_remote_url, Mirror, SyncOutcome};
use tracing::{info, warn};

use crate::error::DaemonError;
use crate::supervisor::TrackingSupervisor;

/// Environment variable overriding the configured auth key
pub const AUTH_KEY_ENV: &str = "PROGRESS_AUTH_KEY";

/// Settings the service runs with
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub repos_dir: PathBuf,
    /// Key event creation must present. Creation is refused while unset.
    pub auth_key: Option<String>,
    pub poll_interval: Duration,
}

impl ServiceConfig {
    /// Resolve file config against the data directory and the environment
    pub fn resolve(data_dir: &Path, config: &ProgressConfig) -> Self {
        let auth_key = std::env::var(AUTH_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| config.auth_key.clone());

        Self {
            repos_dir: config.repos_dir(data_dir),
            auth_key,
            poll_interval: config.poll_interval(),
        }
    }
}

/// Events, their projects, and commit tracking
pub struct EventService {
    store: Arc<ProgressStore>,
    supervisor: TrackingSupervisor,
    config: ServiceConfig,
}

impl EventService {
    /// Must be called inside a tokio runtime
    pub fn new(store: Arc<ProgressStore>, config: ServiceConfig) -> Self {
        let supervisor = TrackingSupervisor::new(store.clone(), config.poll_interval);
        Self {
            store,
            supervisor,
            config,
        }
    }

    pub fn store(&self) -> &ProgressStore {
        &self.store
    }

    pub fn supervisor(&self) -> &TrackingSupervisor {
        &self.supervisor
    }

    /// Create an event after checking the presented key
    pub fn create_event(&self, request: EventRequest) -> Result<EventId, DaemonError> {
        match &self.config.auth_key {
            None => {
                return Err(ProgressError::Validation(
                    "event creation is disabled: no auth key is configured".to_string(),
                )
                .into())
            }
            Some(expected) if *expected != request.key => {
                return Err(ProgressError::Validation("invalid auth key".to_string()).into())
            }
            Some(_) => {}
        }

        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProgressError::Validation("event name must not be empty".to_string()).into());
        }

        let event = Event::new(generate_event_id(), name);
        let mirrors = self.config.repos_dir.join(event.id.to_string());
        std::fs::create_dir_all(&mirrors)?;
        if let Err(e) = self.store.insert_event(&event) {
            if let Err(cleanup) = remove_mirror(&mirrors) {
                warn!(path = %mirrors.display(), "Failed to remove event directory: {}", cleanup);
            }
            return Err(e.into());
        }

        let event_id = event.id;
        info!(event = %event_id, name = %name, "Event created");
        Ok(event_id)
    }

    /// Clone a project, ingest its full history and bind it to the event.
    ///
    /// Nothing is recorded unless the clone and the ingest both succeed.
    pub async fn register_project(
        &self,
        event_id: &EventId,
        request: ProjectRequest,
    ) -> Result<ProjectId, DaemonError> {
        let event = self.store.require_event(event_id)?;

        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ProgressError::Validation("project name must not be empty".to_string()).into());
        }
        let url = validate_remote_url(&request.url)
            .map_err(|e| ProgressError::Validation(e.to_string()))?;
        let remote = request.url.trim().to_string();

        for bound in self.projects_of(&event)? {
            if bound.url == remote {
                return Err(ProgressError::Conflict(format!(
                    "project '{}' is already registered on this event",
                    remote
                ))
                .into());
            }
        }

        // Claiming the directory serializes registrations of the same remote
        let path = mirror_path(&self.config.repos_dir, event_id, &url);
        claim_mirror_dir(&path)?;

        let project = Project::new(
            generate_project_id(),
            ProjectRequest {
                url: remote,
                name,
                authors: request.authors,
            },
            path.clone(),
        );

        let outcome = match self.ingest_and_attach(event_id, project).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(cleanup) = remove_mirror(&path) {
                    warn!(path = %path.display(), "Failed to remove partial mirror: {}", cleanup);
                }
                return Err(e);
            }
        };

        info!(
            event = %event_id,
            project = %outcome.project.name,
            commits = outcome.commits.len(),
            "Project registered"
        );
        Ok(outcome.project.id)
    }

    async fn ingest_and_attach(&self, event_id: &EventId, project: Project) -> Result<SyncOutcome, DaemonError> {
        let outcome = tokio::task::spawn_blocking(move || {
            let mirror = Mirror::materialize(&project.url, &project.path)?;
            ingest_mirror(&mirror, &project)
        })
        .await??;

        self.store
            .attach_project(event_id, &outcome.project, &outcome.commits)?;
        Ok(outcome)
    }

    pub fn get_event(&self, event_id: &EventId) -> Result<Event, DaemonError> {
        Ok(self.store.require_event(event_id)?)
    }

    pub fn get_project(&self, project_id: &ProjectId) -> Result<Project, DaemonError> {
        self.store
            .get_project(project_id)?
            .ok_or_else(|| ProgressError::project_not_found(project_id).into())
    }

    /// Projects bound to an event, in binding order
    pub fn projects_of(&self, event: &Event) -> Result<Vec<Project>, DaemonError> {
        let mut projects = Vec::with_capacity(event.projects.len());
        for project_id in &event.projects {
            if let Some(project) = self.store.get_project(project_id)? {
                projects.push(project);
            }
        }
        Ok(projects)
    }

    /// One page of an event's commit log, counted from the newest end
    pub fn get_commits(&self, event_id: &EventId, page: PageRequest) -> Result<Vec<CommitRecord>, DaemonError> {
        Ok(self.store.get_commit_page(event_id, page)?)
    }

    /// Turn tracking on or off and remember the choice
    pub async fn set_tracking(&self, event_id: &EventId, enabled: bool) -> Result<(), DaemonError> {
        self.store.require_event(event_id)?;

        if enabled {
            self.supervisor.enable(*event_id).await?;
        } else {
            self.supervisor.disable(event_id).await;
        }
        self.store.set_tracking_flag(event_id, enabled)?;
        Ok(())
    }

    /// Restart tracking for every event whose flag is set.
    ///
    /// Flags of events that no longer exist are cleared. Returns the number
    /// of trackers started.
    pub async fn resume_tracking(&self) -> Result<usize, DaemonError> {
        let mut started = 0;
        for event_id in self.store.tracked_events()? {
            match self.supervisor.enable(event_id).await {
                Ok(()) => started += 1,
                Err(DaemonError::Progress(ProgressError::NotFound(_))) => {
                    warn!(event = %event_id, "Dropping tracking flag of missing event");
                    self.store.set_tracking_flag(&event_id, false)?;
                }
                Err(e) => return Err(e),
            }
        }
        info!(started, "Tracking resumed");
        Ok(started)
    }

    /// Stop all tracking and flush the store
    pub async fn shutdown(&self) -> Result<(), DaemonError> {
        self.supervisor.shutdown().await;
        self.store.flush()?;
        Ok(())
    }
}

/// Create the mirror directory, failing if anything already occupies it
fn claim_mirror_dir(path: &Path) -> Result<(), DaemonError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::create_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(ProgressError::Conflict(format!(
            "mirror path {} is already in use",
            path.display()
        ))
        .into()),
        Err(e) => Err(e.into()),
    }
}

fn remove_mirror(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_dir_all(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir, key: Option<&str>) -> EventService {
        let store = Arc::new(ProgressStore::temporary().unwrap());
        let config = ServiceConfig {
            repos_dir: dir.path().join("repos"),
            auth_key: key.map(str::to_string),
            poll_interval: Duration::from_millis(50),
        };
        EventService::new(store, config)
    }

    fn request(name: &str, key: &str) -> EventRequest {
        EventRequest {
            name: name.to_string(),
            key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_event_checks_key_and_name() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Some("42"));

        let wrong_key = service.create_event(request("hackathon", "41")).unwrap_err();
        assert_eq!(wrong_key.exit_code(), 2);

        let blank = service.create_event(request("   ", "42")).unwrap_err();
        assert_eq!(blank.exit_code(), 2);

        let event_id = service.create_event(request("hackathon", "42")).unwrap();
        let event = service.get_event(&event_id).unwrap();
        assert_eq!(event.name, "hackathon");
        assert!(event.projects.is_empty());
        assert!(service.get_commits(&event_id, PageRequest::default()).unwrap().is_empty());
        assert!(dir.path().join("repos").join(event_id.to_string()).is_dir());
    }

    #[tokio::test]
    async fn test_create_event_requires_configured_key() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, None);
        let err = service.create_event(request("hackathon", "")).unwrap_err();
        assert!(err.to_string().contains("no auth key"));
    }

    #[tokio::test]
    async fn test_create_event_stores_nothing_without_its_directory() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Some("k"));
        // A file where the repos directory should be
        std::fs::write(dir.path().join("repos"), b"").unwrap();

        let err = service.create_event(request("hackathon", "k")).unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert!(service.store().list_events().unwrap().is_empty());
    }

    #[test]
    fn test_mirror_dir_is_claimed_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("repos").join("event").join("host").join("app");

        claim_mirror_dir(&path).unwrap();
        assert!(path.is_dir());

        let err = claim_mirror_dir(&path).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(path.is_dir());
    }

    #[tokio::test]
    async fn test_register_project_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Some("k"));
        let event_id = service.create_event(request("e", "k")).unwrap();

        let bad_url = ProjectRequest {
            url: "not a url".into(),
            name: "p".into(),
            authors: vec![],
        };
        let err = service.register_project(&event_id, bad_url).await.unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let unknown = ProjectRequest {
            url: "https://example.com/a/b.git".into(),
            name: "p".into(),
            authors: vec![],
        };
        let err = service
            .register_project(&uuid::Uuid::new_v4(), unknown)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[tokio::test]
    async fn test_tracking_unknown_event_is_not_found() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Some("k"));
        let err = service.set_tracking(&uuid::Uuid::new_v4(), true).await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(service.store().tracked_events().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resume_drops_flags_of_missing_events() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir, Some("k"));
        let live = service.create_event(request("live", "k")).unwrap();
        let ghost = uuid::Uuid::new_v4();
        service.store().set_tracking_flag(&live, true).unwrap();
        service.store().set_tracking_flag(&ghost, true).unwrap();

        assert_eq!(service.resume_tracking().await.unwrap(), 1);
        assert_eq!(service.store().tracked_events().unwrap(), vec![live]);
        assert_eq!(service.supervisor().tracked_events().await, vec![live]);

        service.shutdown().await.unwrap();
    }
}
