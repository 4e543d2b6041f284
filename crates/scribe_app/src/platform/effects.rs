use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread;

use scribe_core::{
    Attachments, Effect, FailedEntry, JobSnapshot, JobStatus, Msg, PollFailure, RetryOutcome,
    SucceededEntry, TopicImage,
};
use scribe_engine::{
    ApiError, EngineEvent, EngineHandle, ImageAttachment, JobState, RetryAck, StatusSnapshot,
};
use scribe_logging::{scribe_debug, scribe_info, scribe_warn};

use super::app::Inbound;
use super::persistence::SessionStore;
use super::ui::render::UiCommand;

/// Carries effects out: requests go to the engine, persistence to the session
/// store, and notices come back as surface commands.
pub(crate) struct EffectRunner {
    engine: EngineHandle,
    session: SessionStore,
}

impl EffectRunner {
    pub(crate) fn new(engine: EngineHandle, session: SessionStore) -> Self {
        Self { engine, session }
    }

    pub(crate) fn run(&mut self, effects: Vec<Effect>) -> Vec<UiCommand> {
        let mut ui = Vec::new();
        for effect in effects {
            match effect {
                Effect::CheckTools => self.engine.check_tools(),
                Effect::SubmitBatch {
                    topics,
                    attachments,
                } => {
                    scribe_info!(
                        "SubmitBatch topics={} images={}",
                        topics.len(),
                        attachments.len()
                    );
                    self.engine.submit(topics, map_attachments(&attachments));
                }
                Effect::SaveDraft {
                    topics,
                    attachments,
                } => self.session.save_draft(&topics, &attachments),
                Effect::SaveJob(job) => self.session.save_job(&job),
                Effect::ClearSavedJob => self.session.clear_job(),
                Effect::StartPolling { job_id, generation } => {
                    self.engine.start_polling(job_id, generation)
                }
                Effect::StopPolling => self.engine.stop_polling(),
                Effect::RetryTopics { job_id, topics } => {
                    scribe_info!("RetryTopics job_id={} topics={}", job_id, topics.len());
                    self.engine.retry(job_id, topics);
                }
                Effect::ScrollResultsIntoView => ui.push(UiCommand::ScrollResultsIntoView),
                Effect::Notify { level, message } => ui.push(UiCommand::ShowToast {
                    level,
                    text: message,
                }),
            }
        }
        ui
    }
}

/// Forwards engine events to the app loop until either side hangs up.
pub(crate) fn spawn_event_loop(events: mpsc::Receiver<EngineEvent>, tx: mpsc::Sender<Inbound>) {
    thread::spawn(move || {
        while let Ok(event) = events.recv() {
            if tx.send(Inbound::Core(map_event(event))).is_err() {
                break;
            }
        }
        scribe_debug!("Engine event loop finished");
    });
}

pub(crate) fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ToolsChecked(result) => Msg::ToolCheckFinished(result.map_err(describe)),
        EngineEvent::Submitted(result) => Msg::SubmitFinished(result.map_err(describe)),
        EngineEvent::Polled {
            generation,
            job_id,
            result,
        } => match result {
            Ok(snapshot) => Msg::PollSucceeded {
                generation,
                snapshot: map_snapshot(snapshot),
            },
            Err(err) if err.is_not_found() => {
                scribe_warn!("Job {} not found on the server", job_id);
                Msg::PollFailed {
                    generation,
                    failure: PollFailure::NotFound,
                }
            }
            Err(err) => {
                scribe_warn!("Poll for job {} failed: {}", job_id, err);
                Msg::PollFailed {
                    generation,
                    failure: PollFailure::Transient(err.to_string()),
                }
            }
        },
        EngineEvent::Retried { topics, result } => Msg::RetryFinished {
            topics,
            result: result.map(map_retry).map_err(describe),
        },
    }
}

fn describe(err: ApiError) -> String {
    err.to_string()
}

fn map_snapshot(snapshot: StatusSnapshot) -> JobSnapshot {
    JobSnapshot {
        status: match snapshot.state {
            JobState::Running => JobStatus::Running,
            JobState::Completed => JobStatus::Completed,
        },
        total: snapshot.total,
        succeeded: snapshot
            .succeeded
            .into_iter()
            .map(|result| SucceededEntry {
                topic: result.topic,
                title: result.title,
                download_filename: result.filename,
            })
            .collect(),
        failed: snapshot
            .failed
            .into_iter()
            .map(|failure| FailedEntry {
                topic: failure.topic,
                error: failure.error,
                retry_count: failure.retry_count,
            })
            .collect(),
    }
}

fn map_retry(ack: RetryAck) -> RetryOutcome {
    if let Some(message) = &ack.message {
        scribe_debug!("Retry acknowledged: {}", message);
    }
    if ack.superseded {
        RetryOutcome::Superseded { job_id: ack.job_id }
    } else {
        RetryOutcome::SameJob
    }
}

fn map_attachments(attachments: &Attachments) -> BTreeMap<String, ImageAttachment> {
    attachments
        .iter()
        .map(|(topic, image)| {
            let image = match image {
                TopicImage::Url(url) => ImageAttachment::Url(url.clone()),
                TopicImage::Uploaded(path) => ImageAttachment::Uploaded(path.clone()),
            };
            (topic.clone(), image)
        })
        .collect()
}
