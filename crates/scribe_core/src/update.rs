use scribe_logging::{scribe_debug, scribe_info, scribe_warn};

use crate::{
    validate_topics, BatchAction, BatchError, BatchPhase, BatchState, Effect, ErrorKind,
    ItemStatus, JobStatus, Msg, NoticeLevel, PollFailure, RetryOutcome, Topic,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: BatchState, msg: Msg) -> (BatchState, Vec<Effect>) {
    let effects = match msg {
        Msg::SubmitClicked {
            topics,
            mut attachments,
        } => {
            if !state.submit_enabled() {
                return reject(state, BatchError::Busy);
            }
            let topics = match validate_topics(topics) {
                Ok(topics) => topics,
                Err(err) => return reject(state, err),
            };
            attachments.retain(|topic, _| topics.contains(topic));
            state.phase = BatchPhase::CheckingTools;
            state.pending_submission = Some((topics.clone(), attachments.clone()));
            state.mark_dirty();
            vec![
                Effect::SaveDraft {
                    topics,
                    attachments,
                },
                Effect::CheckTools,
            ]
        }
        Msg::ToolCheckFinished(result) => {
            if state.phase != BatchPhase::CheckingTools {
                return (state, Vec::new());
            }
            let pending = state.pending_submission.take();
            match (result, pending) {
                (Ok(true), Some((topics, attachments))) => {
                    state.begin_batch(topics.clone(), topics.clone());
                    state.phase = BatchPhase::Submitting;
                    vec![Effect::SubmitBatch {
                        topics,
                        attachments,
                    }]
                }
                (Ok(true), None) => {
                    state.phase = BatchPhase::Idle;
                    state.mark_dirty();
                    Vec::new()
                }
                (Ok(false), _) => {
                    state.phase = BatchPhase::Idle;
                    return reject(state, BatchError::ToolNotConfigured);
                }
                (Err(message), _) => {
                    state.phase = BatchPhase::Idle;
                    return reject(state, BatchError::ToolCheckFailed(message));
                }
            }
        }
        Msg::SubmitFinished(result) => {
            if state.phase != BatchPhase::Submitting {
                return (state, Vec::new());
            }
            match result {
                Ok(job_id) => {
                    scribe_info!("Batch submitted as job {}", job_id);
                    state.job_id = Some(job_id.clone());
                    state.phase = BatchPhase::Polling;
                    state.generation += 1;
                    state.mark_dirty();
                    let mut effects = Vec::with_capacity(3);
                    if let Some(saved) = state.saved_job() {
                        effects.push(Effect::SaveJob(saved));
                    }
                    effects.push(Effect::StartPolling {
                        job_id,
                        generation: state.generation,
                    });
                    effects.push(Effect::notify(
                        NoticeLevel::Success,
                        "Job started, generating articles...",
                    ));
                    effects
                }
                Err(message) => {
                    state.reset();
                    return reject(state, BatchError::Transport(message));
                }
            }
        }
        Msg::RestoreSavedJob(saved) => {
            if state.phase != BatchPhase::Idle {
                return (state, Vec::new());
            }
            let job_topics = if saved.job_topics.is_empty() {
                saved.topics.clone()
            } else {
                saved.job_topics
            };
            state.begin_batch(saved.topics, job_topics);
            state.job_id = Some(saved.job_id.clone());
            state.phase = BatchPhase::Polling;
            state.generation += 1;
            vec![
                Effect::StartPolling {
                    job_id: saved.job_id,
                    generation: state.generation,
                },
                Effect::notify(NoticeLevel::Info, "Resumed the job in progress"),
            ]
        }
        Msg::PollSucceeded {
            generation,
            snapshot,
        } => {
            if !accepts_poll(&state, generation) {
                return (state, Vec::new());
            }
            let mut effects = state.reconcile(&snapshot);
            if snapshot.status == JobStatus::Completed {
                effects.push(Effect::StopPolling);
                effects.extend(state.finalize());
            }
            effects
        }
        Msg::PollFailed {
            generation,
            failure,
        } => {
            if !accepts_poll(&state, generation) {
                return (state, Vec::new());
            }
            match failure {
                PollFailure::NotFound => {
                    let job_id = state.job_id.take().unwrap_or_default();
                    state.phase = BatchPhase::Lost;
                    state.confirmation = None;
                    state.generation += 1;
                    state.mark_dirty();
                    let notice = BatchError::JobLost(job_id).to_string();
                    scribe_warn!("{}", notice);
                    vec![
                        Effect::StopPolling,
                        Effect::ClearSavedJob,
                        Effect::notify(NoticeLevel::Error, notice),
                    ]
                }
                PollFailure::Transient(message) => {
                    scribe_warn!("Polling job {:?} failed: {}", state.job_id, message);
                    Vec::new()
                }
            }
        }
        Msg::RetryClicked { topic } => return retry(state, vec![topic]),
        Msg::DiscardClicked { topic } => return discard(state, vec![topic]),
        Msg::RetryAllClicked => return ask_confirmation(state, BatchAction::RetryAll),
        Msg::DiscardAllClicked => return ask_confirmation(state, BatchAction::DiscardAll),
        Msg::ConfirmAccepted => match state.confirmation.take() {
            Some(BatchAction::RetryAll) => {
                let topics = state.retryable_topics();
                return retry(state, topics);
            }
            Some(BatchAction::DiscardAll) => {
                let topics = state.retryable_topics();
                return discard(state, topics);
            }
            None => Vec::new(),
        },
        Msg::ConfirmDismissed => {
            if state.confirmation.take().is_some() {
                state.mark_dirty();
            }
            Vec::new()
        }
        Msg::RetryFinished { topics, result } => retry_finished(&mut state, topics, result),
        Msg::AbandonClicked => {
            if state.phase == BatchPhase::Idle && state.items.is_empty() {
                return (state, Vec::new());
            }
            scribe_info!("Abandoning job {:?}", state.job_id);
            state.reset();
            vec![
                Effect::StopPolling,
                Effect::ClearSavedJob,
                Effect::notify(NoticeLevel::Info, "Job abandoned"),
            ]
        }
    };

    (state, effects)
}

fn accepts_poll(state: &BatchState, generation: u64) -> bool {
    let current = state.phase == BatchPhase::Polling && generation == state.generation;
    if !current {
        scribe_debug!(
            "Dropping poll result for generation {} (current {}, phase {:?})",
            generation,
            state.generation,
            state.phase
        );
    }
    current
}

fn reject(mut state: BatchState, err: BatchError) -> (BatchState, Vec<Effect>) {
    let level = match err.kind() {
        ErrorKind::Validation | ErrorKind::State => NoticeLevel::Warning,
        ErrorKind::Precondition | ErrorKind::Transport => NoticeLevel::Error,
    };
    scribe_warn!("Rejected ({:?}): {}", err.kind(), err);
    state.mark_dirty();
    (state, vec![Effect::notify(level, err.to_string())])
}

fn check_items(
    state: &BatchState,
    topics: &[Topic],
    action: &'static str,
    allowed: &[ItemStatus],
) -> Result<(), BatchError> {
    for topic in topics {
        let status = state
            .status_of(topic)
            .ok_or_else(|| BatchError::UnknownTopic(topic.clone()))?;
        if !allowed.contains(&status) {
            return Err(BatchError::InvalidItemState {
                topic: topic.clone(),
                action,
                status: status.label(),
            });
        }
    }
    Ok(())
}

fn retry(mut state: BatchState, topics: Vec<Topic>) -> (BatchState, Vec<Effect>) {
    if topics.is_empty() {
        return reject(state, BatchError::NothingToDo("retry"));
    }
    let job_id = match (&state.job_id, state.phase) {
        (Some(job_id), BatchPhase::Polling | BatchPhase::PartiallyCompleted) => job_id.clone(),
        _ => return reject(state, BatchError::NoActiveJob),
    };
    if let Err(err) = check_items(&state, &topics, "retried", &[ItemStatus::Failed]) {
        return reject(state, err);
    }

    for topic in &topics {
        if let Some(item) = state.item_mut(topic) {
            item.status = ItemStatus::Retrying;
            item.retry_count += 1;
        }
    }
    state.retries_in_flight += 1;
    state.confirmation = None;
    state.mark_dirty();

    let mut effects = Vec::with_capacity(3);
    if state.phase == BatchPhase::Polling {
        // Snapshots already in flight predate the retry.
        state.generation += 1;
        effects.push(Effect::StopPolling);
    }
    let message = if topics.len() == 1 {
        format!("Retrying {:?}...", topics[0])
    } else {
        format!("Retrying {} topics...", topics.len())
    };
    effects.push(Effect::RetryTopics { job_id, topics });
    effects.push(Effect::notify(NoticeLevel::Info, message));
    (state, effects)
}

fn retry_finished(
    state: &mut BatchState,
    topics: Vec<Topic>,
    result: Result<RetryOutcome, String>,
) -> Vec<Effect> {
    state.retries_in_flight = state.retries_in_flight.saturating_sub(1);
    if state.job_id.is_none() {
        return Vec::new();
    }

    let mut effects = Vec::new();
    match result {
        Ok(RetryOutcome::SameJob) => {
            state.phase = BatchPhase::Polling;
        }
        Ok(RetryOutcome::Superseded { job_id }) => {
            scribe_info!(
                "Job {:?} superseded by {} for {} topic(s)",
                state.job_id,
                job_id,
                topics.len()
            );
            let job_topics = topics
                .iter()
                .filter(|topic| state.status_of(topic) != Some(ItemStatus::Discarded))
                .cloned()
                .collect();
            state.adopt_job(job_id, job_topics);
            state.phase = BatchPhase::Polling;
            if let Some(saved) = state.saved_job() {
                effects.push(Effect::SaveJob(saved));
            }
            effects.push(Effect::notify(
                NoticeLevel::Info,
                "The original job expired; retrying in a new job",
            ));
        }
        Err(message) => {
            for topic in &topics {
                if let Some(item) = state.item_mut(topic) {
                    if item.status == ItemStatus::Retrying {
                        item.status = ItemStatus::Failed;
                        item.last_error = Some(message.clone());
                        item.retry_count = item.retry_count.saturating_sub(1);
                    }
                }
            }
            effects.push(Effect::notify(
                NoticeLevel::Error,
                BatchError::Transport(message).to_string(),
            ));
        }
    }
    state.mark_dirty();

    if state.retries_in_flight == 0 && state.phase == BatchPhase::Polling {
        if let Some(job_id) = state.job_id.clone() {
            state.generation += 1;
            effects.push(Effect::StartPolling {
                job_id,
                generation: state.generation,
            });
        }
    }
    // Stragglers discarded while their retry was in flight settle here.
    if state.retries_in_flight == 0
        && state.phase == BatchPhase::PartiallyCompleted
        && state.outstanding_failures() == 0
    {
        effects.extend(state.settle());
    }
    effects
}

fn discard(mut state: BatchState, topics: Vec<Topic>) -> (BatchState, Vec<Effect>) {
    if topics.is_empty() {
        return reject(state, BatchError::NothingToDo("discard"));
    }
    if let Err(err) = check_items(
        &state,
        &topics,
        "discarded",
        &[ItemStatus::Failed, ItemStatus::Retrying],
    ) {
        return reject(state, err);
    }

    for topic in &topics {
        if let Some(item) = state.item_mut(topic) {
            item.status = ItemStatus::Discarded;
        }
    }
    state.confirmation = None;
    state.recompute_progress();
    state.refresh_batch_controls();
    state.mark_dirty();

    let message = if topics.len() == 1 {
        format!("Discarded {:?}", topics[0])
    } else {
        format!("Discarded {} topics", topics.len())
    };
    let mut effects = vec![Effect::notify(NoticeLevel::Info, message)];
    if state.phase == BatchPhase::PartiallyCompleted && state.retries_in_flight == 0 {
        effects.extend(state.settle());
    }
    (state, effects)
}

fn ask_confirmation(mut state: BatchState, action: BatchAction) -> (BatchState, Vec<Effect>) {
    if !state.batch_controls_visible {
        let verb = match action {
            BatchAction::RetryAll => "retry",
            BatchAction::DiscardAll => "discard",
        };
        return reject(state, BatchError::NothingToDo(verb));
    }
    state.confirmation = Some(action);
    state.mark_dirty();
    (state, Vec::new())
}
