use crate::{BatchAction, BatchPhase, JobId, Progress, Topic};

/// Everything the presentation needs; it never reads `BatchState` directly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchViewModel {
    pub phase: BatchPhase,
    pub job_id: Option<JobId>,
    pub progress: Progress,
    /// Rows in submission order; discarded topics are absent.
    pub rows: Vec<RowView>,
    pub outstanding_failures: usize,
    pub batch_controls_visible: bool,
    pub submit_enabled: bool,
    pub confirmation: Option<ConfirmationView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowView {
    pub topic: Topic,
    pub kind: RowKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Pending,
    Succeeded {
        title: String,
        download_filename: String,
    },
    Failed {
        error: String,
        retry_count: u32,
    },
    Retrying {
        retry_count: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationView {
    pub action: BatchAction,
    /// Number of rows the action would touch.
    pub count: usize,
}
