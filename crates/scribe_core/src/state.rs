use std::collections::{BTreeMap, BTreeSet};

use crate::reconcile::Progress;
use crate::view_model::{BatchViewModel, ConfirmationView, RowKind, RowView};
use crate::BatchError;

pub type Topic = String;
pub type JobId = String;
pub type Attachments = BTreeMap<Topic, TopicImage>;

/// Upper bound on topics accepted in one submission.
pub const MAX_TOPICS: usize = 50;

/// Image reference attached to a topic. Only references travel; never the bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicImage {
    /// Remote image the server downloads itself.
    Url(String),
    /// Server-side path returned by an earlier upload.
    Uploaded(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRef {
    pub title: String,
    pub download_filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Pending,
    Succeeded,
    Failed,
    Retrying,
    Discarded,
}

impl ItemStatus {
    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Succeeded => "succeeded",
            ItemStatus::Failed => "failed",
            ItemStatus::Retrying => "retrying",
            ItemStatus::Discarded => "discarded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub topic: Topic,
    pub status: ItemStatus,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub result: Option<ArticleRef>,
}

impl WorkItem {
    pub(crate) fn pending(topic: impl Into<Topic>) -> Self {
        Self {
            topic: topic.into(),
            status: ItemStatus::Pending,
            retry_count: 0,
            last_error: None,
            result: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SucceededEntry {
    pub topic: Topic,
    pub title: String,
    pub download_filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedEntry {
    pub topic: Topic,
    pub error: String,
    pub retry_count: u32,
}

/// One server-reported view of a batch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub total: usize,
    pub succeeded: Vec<SucceededEntry>,
    pub failed: Vec<FailedEntry>,
}

impl JobSnapshot {
    pub fn observed_topics(&self) -> BTreeSet<Topic> {
        self.succeeded
            .iter()
            .map(|entry| entry.topic.clone())
            .chain(self.failed.iter().map(|entry| entry.topic.clone()))
            .collect()
    }
}

/// What survives a reload: the job to poll and the topics submitted with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedJob {
    pub job_id: JobId,
    /// The originally submitted topic list, carried across superseding job ids.
    pub topics: Vec<Topic>,
    /// Topics the current `job_id` is processing; equal to `topics` until a retry
    /// is moved onto a new job.
    pub job_topics: Vec<Topic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPhase {
    #[default]
    Idle,
    CheckingTools,
    Submitting,
    Polling,
    /// The job finished but some topics still need a retry or a discard.
    PartiallyCompleted,
    Completed,
    /// The server no longer knows the job.
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    RetryAll,
    DiscardAll,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchState {
    pub(crate) phase: BatchPhase,
    pub(crate) job_id: Option<JobId>,
    pub(crate) topics: Vec<Topic>,
    pub(crate) job_topics: BTreeSet<Topic>,
    pub(crate) pending_submission: Option<(Vec<Topic>, Attachments)>,
    pub(crate) items: Vec<WorkItem>,
    /// Topics reported by the latest accepted snapshot of the current job.
    pub(crate) observed: BTreeSet<Topic>,
    /// Topics force-failed by finalization because the server never reported them.
    pub(crate) synthetic: BTreeSet<Topic>,
    pub(crate) snapshot_total: Option<usize>,
    pub(crate) progress: Progress,
    pub(crate) generation: u64,
    pub(crate) retries_in_flight: usize,
    pub(crate) scrolled: bool,
    pub(crate) batch_controls_visible: bool,
    pub(crate) confirmation: Option<BatchAction>,
    dirty: bool,
}

impl BatchState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Poll generation the reconciler currently accepts results for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    pub fn item(&self, topic: &str) -> Option<&WorkItem> {
        self.items.iter().find(|item| item.topic == topic)
    }

    pub(crate) fn item_mut(&mut self, topic: &str) -> Option<&mut WorkItem> {
        self.items.iter_mut().find(|item| item.topic == topic)
    }

    pub fn status_of(&self, topic: &str) -> Option<ItemStatus> {
        self.item(topic).map(|item| item.status)
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn batch_controls_visible(&self) -> bool {
        self.batch_controls_visible
    }

    pub fn pending_confirmation(&self) -> Option<BatchAction> {
        self.confirmation
    }

    pub fn discarded_topics(&self) -> BTreeSet<Topic> {
        self.topics_with(ItemStatus::Discarded).into_iter().collect()
    }

    pub fn retrying_topics(&self) -> BTreeSet<Topic> {
        self.topics_with(ItemStatus::Retrying).into_iter().collect()
    }

    pub fn retry_counts(&self) -> BTreeMap<Topic, u32> {
        self.items
            .iter()
            .filter(|item| item.retry_count > 0)
            .map(|item| (item.topic.clone(), item.retry_count))
            .collect()
    }

    /// Failed topics that are not mid-retry, in list order.
    pub fn retryable_topics(&self) -> Vec<Topic> {
        self.topics_with(ItemStatus::Failed)
    }

    pub fn outstanding_failures(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ItemStatus::Failed)
            .count()
    }

    /// Whether a new batch may be submitted.
    pub fn submit_enabled(&self) -> bool {
        matches!(
            self.phase,
            BatchPhase::Idle | BatchPhase::Completed | BatchPhase::Lost
        )
    }

    pub fn saved_job(&self) -> Option<SavedJob> {
        let job_id = self.job_id.clone()?;
        let job_topics = self
            .topics
            .iter()
            .filter(|topic| self.job_topics.contains(*topic))
            .cloned()
            .collect();
        Some(SavedJob {
            job_id,
            topics: self.topics.clone(),
            job_topics,
        })
    }

    pub fn view(&self) -> BatchViewModel {
        let rows = self
            .items
            .iter()
            .filter_map(|item| {
                let kind = match item.status {
                    ItemStatus::Discarded => return None,
                    ItemStatus::Pending => RowKind::Pending,
                    ItemStatus::Succeeded => {
                        let result = item.result.clone().unwrap_or_else(|| ArticleRef {
                            title: item.topic.clone(),
                            download_filename: String::new(),
                        });
                        RowKind::Succeeded {
                            title: result.title,
                            download_filename: result.download_filename,
                        }
                    }
                    ItemStatus::Failed => RowKind::Failed {
                        error: item.last_error.clone().unwrap_or_default(),
                        retry_count: item.retry_count,
                    },
                    ItemStatus::Retrying => RowKind::Retrying {
                        retry_count: item.retry_count,
                    },
                };
                Some(RowView {
                    topic: item.topic.clone(),
                    kind,
                })
            })
            .collect();

        let confirmation = self.confirmation.map(|action| ConfirmationView {
            action,
            count: self.retryable_topics().len(),
        });

        BatchViewModel {
            phase: self.phase,
            job_id: self.job_id.clone(),
            progress: self.progress,
            rows,
            outstanding_failures: self.outstanding_failures(),
            batch_controls_visible: self.batch_controls_visible,
            submit_enabled: self.submit_enabled(),
            confirmation,
        }
    }

    /// Returns whether anything changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Starts tracking a fresh batch: Pending placeholders and empty session sets.
    pub(crate) fn begin_batch(&mut self, topics: Vec<Topic>, job_topics: Vec<Topic>) {
        let generation = self.generation;
        *self = Self {
            generation,
            items: job_topics.iter().map(WorkItem::pending).collect(),
            job_topics: job_topics.into_iter().collect(),
            topics,
            ..Self::default()
        };
        self.recompute_progress();
        self.mark_dirty();
    }

    /// Drops everything about the current batch. The generation keeps counting
    /// so late poll results are still recognised as stale.
    pub(crate) fn reset(&mut self) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
        self.mark_dirty();
    }

    pub(crate) fn topics_with(&self, status: ItemStatus) -> Vec<Topic> {
        self.items
            .iter()
            .filter(|item| item.status == status)
            .map(|item| item.topic.clone())
            .collect()
    }
}

/// Trims topics, drops blank entries and rejects empty, duplicate or oversized lists.
pub fn validate_topics(raw: Vec<String>) -> Result<Vec<Topic>, BatchError> {
    let mut seen = BTreeSet::new();
    let mut topics = Vec::with_capacity(raw.len());
    for topic in raw {
        let topic = topic.trim();
        if topic.is_empty() {
            continue;
        }
        if !seen.insert(topic.to_owned()) {
            return Err(BatchError::DuplicateTopic(topic.to_owned()));
        }
        topics.push(topic.to_owned());
    }
    if topics.is_empty() {
        return Err(BatchError::EmptySubmission);
    }
    if topics.len() > MAX_TOPICS {
        return Err(BatchError::TooManyTopics {
            max: MAX_TOPICS,
            actual: topics.len(),
        });
    }
    Ok(topics)
}
