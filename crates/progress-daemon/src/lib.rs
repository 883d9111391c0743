//! progress-logger daemon
//!
//! The daemon provides:
//! - The event service: event creation, project registration, commit pages
//! - Per-event tracking tasks that poll project mirrors for new commits
//! - A supervisor that owns the lifecycle of those tasks

pub mod error;
pub mod service;
pub mod supervisor;
pub mod tracker;

pub use error::DaemonError;
pub use service::{EventService, ServiceConfig, AUTH_KEY_ENV};
pub use supervisor::{TrackerState, TrackingSupervisor};
pub use tracker::{TickReport, TrackerExit};
