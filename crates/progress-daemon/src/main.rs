//! progressd - tracks the git projects of events and logs their commits
//!
//! `serve` runs the tracking supervisor in the foreground. The other
//! commands administer the store directly and refuse to run while a
//! daemon holds it.

mod cli;
mod commands;
mod context;
mod output;

use clap::Parser;
use cli::{Cli, Command};
use libprogress_git::{set_transport_timeouts, TransportTimeouts};
use progress_daemon::DaemonError;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(&cli);

    // Before any clone or fetch can run
    if let Err(e) = set_transport_timeouts(TransportTimeouts::default()) {
        warn!("Failed to bound git transport timeouts: {}", e);
    }

    if let Err(e) = run_command(&cli).await {
        output::output_error(&cli, &e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(cli: &Cli) {
    // Admin commands stay quiet unless asked otherwise
    let default_level = match cli.command {
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let level = cli.log_level.as_deref().unwrap_or(default_level);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_command(cli: &Cli) -> Result<(), DaemonError> {
    match &cli.command {
        Command::Serve { interval } => commands::serve::run(cli, *interval).await,
        Command::Event { cmd } => commands::event::run(cli, cmd.clone()),
        Command::Project { cmd } => commands::project::run(cli, cmd.clone()).await,
        Command::Commits {
            event_id,
            page,
            limit,
        } => commands::commits::run(cli, event_id, *page, *limit),
        Command::Track { event_id, off } => commands::track::run(cli, event_id, *off),
        Command::Db { cmd } => commands::db::run(cli, cmd.clone()),
    }
}
