use std::collections::BTreeMap;
use std::time::Duration;

use scribe_core::{Attachments, SavedJob, Topic, TopicImage};
use scribe_engine::Store;
use scribe_logging::{scribe_error, scribe_info, scribe_warn};
use serde::{Deserialize, Serialize};

const JOB_KEY: &str = "current_job";
const DRAFT_KEY: &str = "draft";
const DRAFT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedJob {
    job_id: String,
    topics: Vec<String>,
    /// Missing in records written before a retry could move topics to a new job.
    #[serde(default)]
    job_topics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedDraft {
    topics: Vec<String>,
    #[serde(default)]
    images: BTreeMap<String, PersistedImage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PersistedImage {
    Url { url: String },
    Uploaded { path: String },
}

/// The client's durable session: the job being tracked and the last draft.
///
/// Storage failures are logged and never interrupt the batch.
pub(crate) struct SessionStore {
    store: Store,
}

impl SessionStore {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    pub(crate) fn load_job(&mut self) -> Option<SavedJob> {
        let job: PersistedJob = self.store.get(JOB_KEY)?;
        if job.job_id.is_empty() || job.topics.is_empty() {
            scribe_warn!("Ignoring saved job without id or topics");
            return None;
        }
        scribe_info!("Found saved job {} ({} topics)", job.job_id, job.topics.len());
        let job_topics = if job.job_topics.is_empty() {
            job.topics.clone()
        } else {
            job.job_topics
        };
        Some(SavedJob {
            job_id: job.job_id,
            topics: job.topics,
            job_topics,
        })
    }

    pub(crate) fn save_job(&mut self, job: &SavedJob) {
        let record = PersistedJob {
            job_id: job.job_id.clone(),
            topics: job.topics.clone(),
            job_topics: job.job_topics.clone(),
        };
        if let Err(err) = self.store.set(JOB_KEY, &record, None) {
            scribe_error!("Failed to save job {}: {}", job.job_id, err);
        }
    }

    pub(crate) fn clear_job(&mut self) {
        match self.store.remove(JOB_KEY) {
            Ok(true) => scribe_info!("Cleared saved job"),
            Ok(false) => {}
            Err(err) => scribe_error!("Failed to clear saved job: {}", err),
        }
    }

    pub(crate) fn save_draft(&mut self, topics: &[Topic], attachments: &Attachments) {
        let draft = PersistedDraft {
            topics: topics.to_vec(),
            images: attachments
                .iter()
                .map(|(topic, image)| {
                    let image = match image {
                        TopicImage::Url(url) => PersistedImage::Url { url: url.clone() },
                        TopicImage::Uploaded(path) => PersistedImage::Uploaded { path: path.clone() },
                    };
                    (topic.clone(), image)
                })
                .collect(),
        };
        if let Err(err) = self.store.set(DRAFT_KEY, &draft, Some(DRAFT_TTL)) {
            scribe_error!("Failed to save draft: {}", err);
        }
    }

    /// The last draft, unless it expired or holds no topics.
    pub(crate) fn load_draft(&mut self) -> Option<(Vec<Topic>, Attachments)> {
        let draft: PersistedDraft = self.store.get(DRAFT_KEY)?;
        if draft.topics.is_empty() {
            return None;
        }
        let attachments = draft
            .images
            .into_iter()
            .map(|(topic, image)| {
                let image = match image {
                    PersistedImage::Url { url } => TopicImage::Url(url),
                    PersistedImage::Uploaded { path } => TopicImage::Uploaded(path),
                };
                (topic, image)
            })
            .collect();
        Some((draft.topics, attachments))
    }
}
