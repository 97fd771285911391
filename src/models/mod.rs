pub mod record;
pub mod task;

pub use record::{Price, Record, RecordParseError};
pub use task::{
    Credentials, RequestDefaults, ScrapeRequest, SubmitPayload, TaskEvent, TaskId, TaskOutcome,
    TaskPhase, TaskStatus,
};
