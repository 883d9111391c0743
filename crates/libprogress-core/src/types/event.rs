use serde::{Deserialize, Serialize};

use crate::types::ids::{EventId, ProjectId};

/// A named collection of tracked projects sharing one commit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    /// Bound projects, in registration order. Only ever grows.
    #[serde(default)]
    pub projects: Vec<ProjectId>,
}

impl Event {
    pub fn new(id: EventId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            projects: Vec::new(),
        }
    }

    /// Bind a project; returns false if it was already bound
    pub fn bind(&mut self, project_id: ProjectId) -> bool {
        if self.projects.contains(&project_id) {
            return false;
        }
        self.projects.push(project_id);
        true
    }
}

/// Request to create an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRequest {
    pub name: String,
    /// Shared key authorizing event creation
    pub key: String,
}
