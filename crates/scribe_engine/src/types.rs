use std::fmt;

use thiserror::Error;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleResult {
    pub topic: String,
    pub title: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleFailure {
    pub topic: String,
    pub error: String,
    pub retry_count: u32,
}

/// Status of a generation job as reported by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub state: JobState,
    pub total: usize,
    /// Server-side percentage; informational only.
    pub progress: f64,
    pub succeeded: Vec<ArticleResult>,
    pub failed: Vec<ArticleFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAttachment {
    Url(String),
    Uploaded(String),
}

/// Answer to a retry request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryAck {
    pub job_id: JobId,
    /// The original job was gone and `job_id` is a new job for the retried topics.
    pub superseded: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ToolsChecked(Result<bool, ApiError>),
    Submitted(Result<JobId, ApiError>),
    Polled {
        generation: u64,
        job_id: JobId,
        result: Result<StatusSnapshot, ApiError>,
    },
    Retried {
        topics: Vec<String>,
        result: Result<RetryAck, ApiError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    InvalidUrl,
    NotFound,
    HttpStatus(u16),
    Timeout,
    Network,
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::InvalidUrl => write!(f, "invalid url"),
            ApiErrorKind::NotFound => write!(f, "not found"),
            ApiErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            ApiErrorKind::Timeout => write!(f, "timeout"),
            ApiErrorKind::Network => write!(f, "network error"),
            ApiErrorKind::Decode => write!(f, "unexpected response"),
        }
    }
}
