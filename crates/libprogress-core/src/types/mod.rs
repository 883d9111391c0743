pub mod commit;
pub mod event;
pub mod ids;
pub mod project;

pub use commit::CommitRecord;
pub use event::{Event, EventRequest};
pub use ids::{EventId, ProjectId};
pub use project::{Project, ProjectRequest};
