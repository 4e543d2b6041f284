//! Scribe core: pure batch reconciliation state machine and view-model helpers.
mod effect;
mod error;
mod msg;
mod reconcile;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, NoticeLevel};
pub use error::{BatchError, ErrorKind};
pub use msg::{Msg, PollFailure, RetryOutcome};
pub use reconcile::{compute_progress, Progress, UNKNOWN_STATUS_ERROR};
pub use state::{
    validate_topics, ArticleRef, Attachments, BatchAction, BatchPhase, BatchState, FailedEntry,
    ItemStatus, JobId, JobSnapshot, JobStatus, SavedJob, SucceededEntry, Topic, TopicImage,
    WorkItem, MAX_TOPICS,
};
pub use update::update;
pub use view_model::{BatchViewModel, ConfirmationView, RowKind, RowView};
