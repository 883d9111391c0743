use std::time::Duration;

use progress_daemon::DaemonError;
use tracing::{error, info};

use crate::cli::Cli;
use crate::context::AppContext;
use crate::output::print_human;

/// Resume tracking and run until Ctrl-C or SIGTERM
pub async fn run(cli: &Cli, interval: Option<u64>) -> Result<(), DaemonError> {
    let ctx = AppContext::resolve(cli)?;
    let mut config = ctx.service_config();
    if let Some(secs) = interval {
        config.poll_interval = Duration::from_secs(secs.max(1));
    }
    let poll_interval = config.poll_interval;

    let (service, _lock) = ctx.open_service(config)?;
    info!(
        data_dir = %ctx.data_dir.display(),
        interval_secs = poll_interval.as_secs(),
        "progressd starting"
    );

    let resumed = service.resume_tracking().await?;
    print_human(
        cli,
        &format!("Tracking {} events every {}s (Ctrl-C to stop)", resumed, poll_interval.as_secs()),
    );

    shutdown_signal().await;
    info!("Received shutdown signal");

    service.shutdown().await?;
    info!("progressd stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
