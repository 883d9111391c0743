use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use libprogress_core::{load_config, store_path, LockedStore, ProgressConfig, ProgressStore};
use progress_daemon::{DaemonError, EventService, ServiceConfig};

use crate::cli::Cli;

/// Environment variable naming the data directory
pub const DATA_DIR_ENV: &str = "PROGRESS_DATA_DIR";

/// Data directory used when neither the flag nor the environment names one
const DEFAULT_DATA_DIR: &str = ".progress";

/// Resolved context for a progressd command
pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: ProgressConfig,
}

impl AppContext {
    /// Resolve the data directory and load its config, if any
    pub fn resolve(cli: &Cli) -> Result<Self, DaemonError> {
        let data_dir = cli
            .data_dir
            .clone()
            .or_else(|| std::env::var_os(DATA_DIR_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let config = load_config(&data_dir)?.unwrap_or_default();

        Ok(Self { data_dir, config })
    }

    pub fn store_path(&self) -> PathBuf {
        store_path(&self.data_dir)
    }

    /// Open the store, failing with `DbBusy` while another process holds it
    pub fn open_store(&self) -> Result<LockedStore, DaemonError> {
        Ok(ProgressStore::open_locked(&self.store_path())?)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig::resolve(&self.data_dir, &self.config)
    }

    /// Open the store behind a service.
    ///
    /// The returned file holds the store lock; keep it alive as long as the
    /// service.
    pub fn open_service(&self, config: ServiceConfig) -> Result<(EventService, File), DaemonError> {
        let (store, lock) = self.open_store()?.into_parts();
        Ok((EventService::new(Arc::new(store), config), lock))
    }
}
