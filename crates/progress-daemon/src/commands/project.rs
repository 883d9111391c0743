use chrono::{DateTime, Utc};
use libprogress_core::types::ids::id_short;
use libprogress_core::{Project, ProjectRequest};
use progress_daemon::DaemonError;
use serde::Serialize;

use super::{event_id_arg, project_id_arg};
use crate::cli::{Cli, ProjectCommand};
use crate::context::AppContext;
use crate::output::output_success;

#[derive(Serialize)]
pub struct ProjectOutput {
    pub project_id: String,
    pub name: String,
    pub url: String,
    pub authors: Vec<String>,
    pub path: String,
    pub last_synced_commit: Option<String>,
    pub last_synced_time: Option<DateTime<Utc>>,
}

impl From<&Project> for ProjectOutput {
    fn from(project: &Project) -> Self {
        Self {
            project_id: project.id.to_string(),
            name: project.name.clone(),
            url: project.url.clone(),
            authors: project.authors.clone(),
            path: project.path.to_string_lossy().to_string(),
            last_synced_commit: project.last_synced_commit.clone(),
            last_synced_time: project.last_synced_time,
        }
    }
}

impl ProjectOutput {
    /// One-line human summary
    pub fn summary(&self) -> String {
        let synced = match (&self.last_synced_commit, &self.last_synced_time) {
            (Some(hash), Some(time)) => format!("synced to {} ({})", &hash[..hash.len().min(10)], time.to_rfc3339()),
            _ => "never synced".to_string(),
        };
        format!("{} {} <{}> {}", &self.project_id[..8], self.name, self.url, synced)
    }
}

pub async fn run(cli: &Cli, cmd: ProjectCommand) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    match cmd {
        ProjectCommand::Add {
            event_id,
            url,
            name,
            authors,
        } => run_add(cli, &ctx, &event_id, url, name, authors).await,
        ProjectCommand::Show { project_id } => run_show(cli, &ctx, &project_id),
    }
}

async fn run_add(
    cli: &Cli,
    ctx: &AppContext,
    event_id: &str,
    url: String,
    name: String,
    authors: Vec<String>,
) -> Result<(), DaemonError> {
    let event_id = event_id_arg(event_id)?;
    let (service, _lock) = ctx.open_service(ctx.service_config())?;

    let project_id = service
        .register_project(&event_id, ProjectRequest { url, name, authors })
        .await?;
    let project = service.get_project(&project_id)?;
    service.shutdown().await?;

    output_success(cli, ProjectOutput::from(&project), |out| {
        format!("Registered project {} on event {}\n  {}", out.project_id, id_short(&event_id), out.summary())
    })
}

fn run_show(cli: &Cli, ctx: &AppContext, project_id: &str) -> Result<(), DaemonError> {
    let project_id = project_id_arg(project_id)?;
    let store = ctx.open_store()?;
    let project = store
        .get_project(&project_id)?
        .ok_or_else(|| libprogress_core::ProgressError::project_not_found(&project_id))?;

    output_success(cli, ProjectOutput::from(&project), |out| {
        let authors = if out.authors.is_empty() {
            "-".to_string()
        } else {
            out.authors.join(", ")
        };
        format!("{}\n  authors: {}\n  mirror: {}", out.summary(), authors, out.path)
    })
}
