use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use libprogress_core::{CommitRecord, PageRequest};
use progress_daemon::DaemonError;
use serde::Serialize;

use super::event_id_arg;
use crate::cli::Cli;
use crate::context::AppContext;
use crate::output::output_success;

#[derive(Serialize)]
struct CommitsOutput {
    event_id: String,
    page: u32,
    limit: u32,
    /// Oldest-first within the page
    commits: Vec<CommitRecord>,
}

pub fn run(cli: &Cli, event_id: &str, page: u32, limit: Option<u32>) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    let event_id = event_id_arg(event_id)?;
    let request = PageRequest::new(page, limit.unwrap_or(ctx.config.page_limit));

    let commits = ctx.open_store()?.get_commit_page(&event_id, request)?;

    output_success(
        cli,
        CommitsOutput {
            event_id: event_id.to_string(),
            page: request.page,
            limit: request.limit,
            commits,
        },
        |out| render(&out.commits),
    )
}

fn render(commits: &[CommitRecord]) -> String {
    if commits.is_empty() {
        return "No commits on this page".to_string();
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["date", "project", "author", "message"]);

    // Newest first reads better in a terminal
    for commit in commits.iter().rev() {
        table.add_row(vec![
            commit.date.format("%Y-%m-%d %H:%M").to_string(),
            commit.project.clone(),
            commit.author.clone(),
            commit.summary().to_string(),
        ]);
    }

    table.to_string()
}
