use crate::{Attachments, JobId, JobSnapshot, SavedJob, Topic};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User pressed the submit control with the current topic list.
    SubmitClicked {
        topics: Vec<String>,
        attachments: Attachments,
    },
    /// Converter check answered: `Ok(ready)` or a transport error message.
    ToolCheckFinished(Result<bool, String>),
    /// Batch submission answered with a job id or a transport error message.
    SubmitFinished(Result<JobId, String>),
    /// A job persisted by an earlier session was found on start-up.
    RestoreSavedJob(SavedJob),
    /// Poll tick returned a snapshot.
    PollSucceeded { generation: u64, snapshot: JobSnapshot },
    /// Poll tick failed.
    PollFailed {
        generation: u64,
        failure: PollFailure,
    },
    RetryClicked { topic: Topic },
    RetryAllClicked,
    DiscardClicked { topic: Topic },
    DiscardAllClicked,
    /// User accepted the pending batch confirmation.
    ConfirmAccepted,
    /// User declined the pending batch confirmation.
    ConfirmDismissed,
    /// Retry request answered for `topics`.
    RetryFinished {
        topics: Vec<Topic>,
        result: Result<RetryOutcome, String>,
    },
    /// User gave up on the current job.
    AbandonClicked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollFailure {
    /// The server does not know the job; fatal for this job.
    NotFound,
    /// Anything else; polling continues.
    Transient(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    SameJob,
    /// The original job is gone and the server started `job_id` for the retried topics.
    Superseded { job_id: JobId },
}
