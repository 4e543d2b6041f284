use crate::{Attachments, JobId, SavedJob, Topic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the backend whether the document converter is configured.
    CheckTools,
    SubmitBatch {
        topics: Vec<Topic>,
        attachments: Attachments,
    },
    SaveDraft {
        topics: Vec<Topic>,
        attachments: Attachments,
    },
    SaveJob(SavedJob),
    ClearSavedJob,
    /// Replace any running poll timer with one for `job_id`.
    StartPolling { job_id: JobId, generation: u64 },
    StopPolling,
    RetryTopics { job_id: JobId, topics: Vec<Topic> },
    ScrollResultsIntoView,
    Notify { level: NoticeLevel, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl Effect {
    pub(crate) fn notify(level: NoticeLevel, message: impl Into<String>) -> Self {
        Effect::Notify {
            level,
            message: message.into(),
        }
    }
}
