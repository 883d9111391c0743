//! Git mirrors and incremental commit sync for progress-logger
//!
//! Every project bound to an event gets a local mirror. Tracking passes
//! refresh the mirror and select the commits that landed since the
//! project's watermark.

pub mod error;
pub mod mirror;
pub mod remote;
pub mod sync;

pub use error::GitError;
pub use mirror::{
    set_transport_timeouts, CommitInfo, History, Mirror, RefreshOutcome, TransportTimeouts,
};
pub use remote::{mirror_path, validate_remote_url};
pub use sync::{ingest_mirror, select_new_commits, sync_project, Selection, SyncOutcome};
