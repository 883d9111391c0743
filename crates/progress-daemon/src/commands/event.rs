use libprogress_core::EventRequest;
use progress_daemon::DaemonError;
use serde::Serialize;

use super::event_id_arg;
use super::project::ProjectOutput;
use crate::cli::{Cli, EventCommand};
use crate::context::AppContext;
use crate::output::output_success;

#[derive(Serialize)]
struct EventCreatedOutput {
    event_id: String,
    name: String,
}

#[derive(Serialize)]
struct EventOutput {
    event_id: String,
    name: String,
    commit_count: usize,
    tracked: bool,
    projects: Vec<ProjectOutput>,
}

#[derive(Serialize)]
struct EventSummary {
    event_id: String,
    name: String,
    project_count: usize,
}

#[derive(Serialize)]
struct EventListOutput {
    events: Vec<EventSummary>,
}

pub fn run(cli: &Cli, cmd: EventCommand) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    match cmd {
        EventCommand::Create { name, key } => run_create(cli, &ctx, name, key),
        EventCommand::Show { event_id } => run_show(cli, &ctx, &event_id),
        EventCommand::List => run_list(cli, &ctx),
    }
}

fn run_create(cli: &Cli, ctx: &AppContext, name: String, key: String) -> Result<(), DaemonError> {
    let (service, _lock) = ctx.open_service(ctx.service_config())?;
    let event_id = service.create_event(EventRequest { name, key })?;
    let event = service.get_event(&event_id)?;
    service.store().flush()?;

    output_success(
        cli,
        EventCreatedOutput {
            event_id: event_id.to_string(),
            name: event.name,
        },
        |out| format!("Created event {} ({})", out.event_id, out.name),
    )
}

fn run_show(cli: &Cli, ctx: &AppContext, event_id: &str) -> Result<(), DaemonError> {
    let event_id = event_id_arg(event_id)?;
    let store = ctx.open_store()?;

    let event = store.require_event(&event_id)?;
    let commit_count = store.get_commits(&event_id)?.map_or(0, |log| log.len());
    let tracked = store.tracked_events()?.contains(&event_id);

    let mut projects = Vec::with_capacity(event.projects.len());
    for project_id in &event.projects {
        if let Some(project) = store.get_project(project_id)? {
            projects.push(ProjectOutput::from(&project));
        }
    }

    output_success(
        cli,
        EventOutput {
            event_id: event.id.to_string(),
            name: event.name,
            commit_count,
            tracked,
            projects,
        },
        |out| {
            let mut lines = vec![
                format!("{} {}", out.event_id, out.name),
                format!(
                    "  commits: {}  tracking: {}",
                    out.commit_count,
                    if out.tracked { "on" } else { "off" }
                ),
            ];
            if out.projects.is_empty() {
                lines.push("  no projects".to_string());
            }
            for project in &out.projects {
                lines.push(format!("  - {}", project.summary()));
            }
            lines.join("\n")
        },
    )
}

fn run_list(cli: &Cli, ctx: &AppContext) -> Result<(), DaemonError> {
    let store = ctx.open_store()?;
    let events = store
        .list_events()?
        .into_iter()
        .map(|event| EventSummary {
            event_id: event.id.to_string(),
            project_count: event.projects.len(),
            name: event.name,
        })
        .collect();

    output_success(cli, EventListOutput { events }, |out| {
        if out.events.is_empty() {
            return "No events".to_string();
        }
        out.events
            .iter()
            .map(|e| format!("{} {} ({} projects)", e.event_id, e.name, e.project_count))
            .collect::<Vec<_>>()
            .join("\n")
    })
}
