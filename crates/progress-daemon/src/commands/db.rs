use progress_daemon::DaemonError;
use serde::Serialize;

use crate::cli::{Cli, DbCommand};
use crate::context::AppContext;
use crate::output::output_success;

#[derive(Serialize)]
struct DbStatsOutput {
    path: String,
    size_bytes: u64,
    event_count: usize,
    project_count: usize,
    commit_count: usize,
    tracked_count: usize,
}

pub fn run(cli: &Cli, cmd: DbCommand) -> Result<(), DaemonError> {
    match cmd {
        DbCommand::Stats => run_stats(cli),
    }
}

fn run_stats(cli: &Cli) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    let store = ctx.open_store()?;
    let stats = store.stats(&ctx.store_path())?;

    output_success(
        cli,
        DbStatsOutput {
            path: stats.path,
            size_bytes: stats.size_bytes,
            event_count: stats.event_count,
            project_count: stats.project_count,
            commit_count: stats.commit_count,
            tracked_count: stats.tracked_count,
        },
        |out| {
            format!(
                "{}\n  size: {} bytes\n  events: {}  projects: {}  commits: {}  tracked: {}",
                out.path, out.size_bytes, out.event_count, out.project_count, out.commit_count, out.tracked_count
            )
        },
    )
}
