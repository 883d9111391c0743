use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "progressd", about = "Track the commits of event projects", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the tracking daemon in the foreground
    Serve {
        /// Seconds between two polls of a tracked event
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Event management commands
    Event {
        #[command(subcommand)]
        cmd: EventCommand,
    },

    /// Project management commands
    Project {
        #[command(subcommand)]
        cmd: ProjectCommand,
    },

    /// Show a page of an event's commits, newest page first
    Commits {
        /// Event ID
        event_id: String,

        /// Zero-based page number
        #[arg(long, default_value = "0")]
        page: u32,

        /// Commits per page (defaults to the configured page size)
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Mark an event for tracking by the daemon
    Track {
        /// Event ID
        event_id: String,

        /// Stop tracking instead
        #[arg(long)]
        off: bool,
    },

    /// Database management commands
    Db {
        #[command(subcommand)]
        cmd: DbCommand,
    },
}

#[derive(Clone, Subcommand)]
pub enum EventCommand {
    /// Create a new event
    Create {
        /// Event name
        #[arg(long)]
        name: String,

        /// Auth key authorizing event creation
        #[arg(long, default_value = "")]
        key: String,
    },

    /// Show an event and its projects
    Show {
        /// Event ID
        event_id: String,
    },

    /// List all events
    List,
}

#[derive(Clone, Subcommand)]
pub enum ProjectCommand {
    /// Clone a project and bind it to an event
    Add {
        /// Event ID
        event_id: String,

        /// Remote repository URL
        #[arg(long)]
        url: String,

        /// Display name
        #[arg(long)]
        name: String,

        /// Project author (repeatable)
        #[arg(long = "author")]
        authors: Vec<String>,
    },

    /// Show a project
    Show {
        /// Project ID
        project_id: String,
    },
}

#[derive(Clone, Subcommand)]
pub enum DbCommand {
    /// Show database statistics
    Stats,
}
