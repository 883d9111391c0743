//! Core library for progress-logger
//!
//! - Event, project and commit record types
//! - The sled-backed event store with atomic append primitives
//! - Commit log pagination
//! - Daemon configuration

pub mod config;
pub mod error;
pub mod pagination;
pub mod store;
pub mod types;

pub use config::{load_config, save_config, store_path, ProgressConfig};
pub use error::ProgressError;
pub use pagination::{paginate, PageRequest, DEFAULT_PAGE_LIMIT};
pub use store::{DbStats, LockedStore, ProgressStore};
pub use types::{CommitRecord, Event, EventId, EventRequest, Project, ProjectId, ProjectRequest};
