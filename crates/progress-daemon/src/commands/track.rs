use libprogress_core::types::ids::id_short;
use progress_daemon::DaemonError;
use serde::Serialize;

use super::event_id_arg;
use crate::cli::Cli;
use crate::context::AppContext;
use crate::output::output_success;

#[derive(Serialize)]
struct TrackOutput {
    event_id: String,
    tracked: bool,
}

/// Persist the tracking flag; a running `serve` picks it up on its next start
pub fn run(cli: &Cli, event_id: &str, off: bool) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    let event_id = event_id_arg(event_id)?;
    let store = ctx.open_store()?;

    store.require_event(&event_id)?;
    store.set_tracking_flag(&event_id, !off)?;
    store.flush()?;

    output_success(
        cli,
        TrackOutput {
            event_id: event_id.to_string(),
            tracked: !off,
        },
        |out| {
            let state = if out.tracked { "on" } else { "off" };
            format!(
                "Tracking {} for event {} (applied by the next 'progressd serve')",
                state,
                id_short(&event_id)
            )
        },
    )
}
