pub mod commits;
pub mod db;
pub mod event;
pub mod project;
pub mod serve;
pub mod track;

use libprogress_core::types::ids::{parse_event_id, parse_project_id};
use libprogress_core::{EventId, ProgressError, ProjectId};
use progress_daemon::DaemonError;

/// Parse an event ID given on the command line
pub fn event_id_arg(raw: &str) -> Result<EventId, DaemonError> {
    Ok(parse_event_id(raw).map_err(ProgressError::from)?)
}

/// Parse a project ID given on the command line
pub fn project_id_arg(raw: &str) -> Result<ProjectId, DaemonError> {
    Ok(parse_project_id(raw).map_err(ProgressError::from)?)
}
