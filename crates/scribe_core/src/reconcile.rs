//! Merging server snapshots into the local batch view.
//!
//! A snapshot only says what the server has produced so far. Local intent the
//! server does not know about (discarded topics, retries that have not shown up
//! yet) is layered on top here, and the result must not depend on how many
//! times the same snapshot is applied.

use std::collections::BTreeSet;

use scribe_logging::{scribe_debug, scribe_info, scribe_warn};

use crate::{
    ArticleRef, BatchPhase, BatchState, Effect, ItemStatus, JobSnapshot, NoticeLevel, Topic,
    WorkItem,
};

/// Error attached to topics a completed job never reported.
pub const UNKNOWN_STATUS_ERROR: &str = "status unknown, please retry";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: usize,
    pub display_total: usize,
    pub percent: u8,
}

/// Builds a progress value, clamping `completed` to `display_total`.
/// An empty total reports 0%.
pub fn compute_progress(completed: usize, display_total: usize) -> Progress {
    let completed = completed.min(display_total);
    let percent = if display_total == 0 {
        0
    } else {
        ((completed as f64 * 100.0) / display_total as f64).round() as u8
    };
    Progress {
        completed,
        display_total,
        percent,
    }
}

impl BatchState {
    /// Applies one snapshot. Returns the one-shot scroll request the first time
    /// an outcome shows up for this submission.
    pub(crate) fn reconcile(&mut self, snapshot: &JobSnapshot) -> Vec<Effect> {
        let observed = snapshot.observed_topics();

        for topic in snapshot
            .succeeded
            .iter()
            .map(|entry| &entry.topic)
            .chain(snapshot.failed.iter().map(|entry| &entry.topic))
        {
            if self.item(topic).is_none() {
                scribe_warn!("Snapshot reported unknown topic {:?}; adding a row", topic);
                self.items.push(WorkItem::pending(topic.clone()));
                self.job_topics.insert(topic.clone());
            }
        }

        let mut succeeded = BTreeSet::new();
        for entry in &snapshot.succeeded {
            succeeded.insert(entry.topic.as_str());
            let Some(item) = self.item_mut(&entry.topic) else {
                continue;
            };
            match item.status {
                ItemStatus::Discarded | ItemStatus::Succeeded => {}
                ItemStatus::Pending | ItemStatus::Failed | ItemStatus::Retrying => {
                    item.status = ItemStatus::Succeeded;
                    item.last_error = None;
                    item.result = Some(ArticleRef {
                        title: entry.title.clone(),
                        download_filename: entry.download_filename.clone(),
                    });
                }
            }
        }

        for entry in &snapshot.failed {
            if succeeded.contains(entry.topic.as_str()) {
                continue;
            }
            let Some(item) = self.item_mut(&entry.topic) else {
                continue;
            };
            match item.status {
                ItemStatus::Discarded | ItemStatus::Succeeded => {}
                ItemStatus::Pending | ItemStatus::Failed | ItemStatus::Retrying => {
                    item.status = ItemStatus::Failed;
                    item.last_error = Some(entry.error.clone());
                    item.retry_count = item.retry_count.max(entry.retry_count);
                }
            }
        }

        self.observed = observed;
        self.snapshot_total = Some(snapshot.total);
        let items = &self.items;
        self.synthetic.retain(|topic| {
            items
                .iter()
                .any(|item| &item.topic == topic && item.status == ItemStatus::Failed)
        });
        self.synthetic.retain(|topic| !self.observed.contains(topic));

        self.recompute_progress();
        self.refresh_batch_controls();
        self.mark_dirty();

        scribe_debug!(
            "Reconciled snapshot: {}/{} ({}%), {} outstanding failure(s)",
            self.progress.completed,
            self.progress.display_total,
            self.progress.percent,
            self.outstanding_failures()
        );

        let has_outcome = self.observed.iter().any(|topic| {
            !matches!(
                self.status_of(topic),
                Some(ItemStatus::Discarded) | Some(ItemStatus::Pending) | None
            )
        });
        if has_outcome && !self.scrolled {
            self.scrolled = true;
            vec![Effect::ScrollResultsIntoView]
        } else {
            Vec::new()
        }
    }

    /// Runs after the completed snapshot has been reconciled: fails whatever the
    /// server silently dropped, then settles the batch.
    pub(crate) fn finalize(&mut self) -> Vec<Effect> {
        let mut forced = Vec::new();
        for item in &mut self.items {
            let unresolved = matches!(item.status, ItemStatus::Pending | ItemStatus::Retrying);
            if unresolved && !self.observed.contains(&item.topic) {
                item.status = ItemStatus::Failed;
                item.last_error = Some(UNKNOWN_STATUS_ERROR.to_owned());
                forced.push(item.topic.clone());
            }
        }
        if !forced.is_empty() {
            scribe_warn!(
                "Job completed without reporting {} topic(s): {:?}",
                forced.len(),
                forced
            );
            self.synthetic.extend(forced);
        }

        self.recompute_progress();
        self.refresh_batch_controls();
        self.mark_dirty();
        self.settle()
    }

    /// Decides between done and partially completed once no poll is running.
    pub(crate) fn settle(&mut self) -> Vec<Effect> {
        let outstanding = self.outstanding_failures();
        if outstanding == 0 {
            self.phase = BatchPhase::Completed;
            self.confirmation = None;
            scribe_info!("Batch {:?} completed", self.job_id);
            vec![
                Effect::ClearSavedJob,
                Effect::notify(NoticeLevel::Success, "All articles have been generated"),
            ]
        } else {
            self.phase = BatchPhase::PartiallyCompleted;
            scribe_info!(
                "Batch {:?} completed with {} failure(s)",
                self.job_id,
                outstanding
            );
            vec![Effect::notify(
                NoticeLevel::Warning,
                format!(
                    "Batch completed with {outstanding} failure(s); retry or discard them"
                ),
            )]
        }
    }

    pub(crate) fn recompute_progress(&mut self) {
        let discarded = self.discarded_topics();
        let discarded_in_job = discarded.intersection(&self.job_topics).count();
        let (completed, total) = match self.snapshot_total {
            Some(total) => {
                let completed = self
                    .observed
                    .union(&self.synthetic)
                    .filter(|topic| !discarded.contains(*topic))
                    .count();
                (completed, total)
            }
            None => (0, self.job_topics.len()),
        };
        self.progress = compute_progress(completed, total.saturating_sub(discarded_in_job));
    }

    /// Batch retry/discard is offered only when more than one topic could use it.
    pub(crate) fn refresh_batch_controls(&mut self) {
        self.batch_controls_visible = self.retryable_topics().len() > 1;
        if !self.batch_controls_visible {
            self.confirmation = None;
        }
    }

    /// Forgets the observations of the previous job after a job id swap.
    pub(crate) fn adopt_job(&mut self, job_id: String, job_topics: Vec<Topic>) {
        self.job_id = Some(job_id);
        self.job_topics = job_topics.into_iter().collect();
        self.observed.clear();
        self.synthetic.clear();
        self.snapshot_total = None;
        self.recompute_progress();
    }
}
