use thiserror::Error;

use crate::{JobId, Topic};

/// Broad class of a [`BatchError`], used to pick notice severity and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Precondition,
    Transport,
    State,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("enter at least one article topic")]
    EmptySubmission,
    #[error("topic {0:?} is listed more than once")]
    DuplicateTopic(Topic),
    #[error("at most {max} topics per batch, got {actual}")]
    TooManyTopics { max: usize, actual: usize },
    #[error("the document converter is not configured; set its path first")]
    ToolNotConfigured,
    #[error("could not check the configuration: {0}")]
    ToolCheckFailed(String),
    #[error("a batch is already in progress")]
    Busy,
    #[error("there is no active job")]
    NoActiveJob,
    #[error("topic {topic:?} cannot be {action}: it is {status}")]
    InvalidItemState {
        topic: Topic,
        action: &'static str,
        status: &'static str,
    },
    #[error("topic {0:?} is not part of this batch")]
    UnknownTopic(Topic),
    #[error("nothing to {0}")]
    NothingToDo(&'static str),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("job {0} no longer exists on the server; submit the batch again")]
    JobLost(JobId),
}

impl BatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BatchError::EmptySubmission
            | BatchError::DuplicateTopic(_)
            | BatchError::TooManyTopics { .. } => ErrorKind::Validation,
            BatchError::ToolNotConfigured | BatchError::ToolCheckFailed(_) => {
                ErrorKind::Precondition
            }
            BatchError::Transport(_) | BatchError::JobLost(_) => ErrorKind::Transport,
            BatchError::Busy
            | BatchError::NoActiveJob
            | BatchError::InvalidItemState { .. }
            | BatchError::UnknownTopic(_)
            | BatchError::NothingToDo(_) => ErrorKind::State,
        }
    }
}
