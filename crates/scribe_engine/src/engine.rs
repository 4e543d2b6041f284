use std::collections::BTreeMap;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use scribe_logging::{scribe_debug, scribe_error, scribe_info};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{EngineEvent, ImageAttachment, JobApi, JobId, JobState};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub poll_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
        }
    }
}

enum EngineCommand {
    CheckTools,
    Submit {
        topics: Vec<String>,
        images: BTreeMap<String, ImageAttachment>,
    },
    StartPolling {
        job_id: JobId,
        generation: u64,
    },
    StopPolling,
    Retry {
        job_id: JobId,
        topics: Vec<String>,
    },
}

/// Runs requests against a [`JobApi`] on a background runtime.
///
/// At most one poll timer exists at a time: starting a new one aborts the old.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub fn spawn(
        api: Arc<dyn JobApi>,
        settings: EngineSettings,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    scribe_error!("Failed to start the engine runtime: {}", err);
                    return;
                }
            };
            let mut poller: Option<JoinHandle<()>> = None;

            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::StartPolling { job_id, generation } => {
                        if let Some(previous) = poller.take() {
                            previous.abort();
                        }
                        scribe_info!("Polling job {} (generation {})", job_id, generation);
                        poller = Some(runtime.spawn(poll_job(
                            api.clone(),
                            job_id,
                            generation,
                            settings.poll_interval,
                            event_tx.clone(),
                        )));
                    }
                    EngineCommand::StopPolling => {
                        if let Some(previous) = poller.take() {
                            scribe_debug!("Stopping poll timer");
                            previous.abort();
                        }
                    }
                    request => {
                        let api = api.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            handle_request(api.as_ref(), request, event_tx).await;
                        });
                    }
                }
            }

            if let Some(previous) = poller.take() {
                previous.abort();
            }
        });

        (Self { cmd_tx }, event_rx)
    }

    pub fn check_tools(&self) {
        self.send(EngineCommand::CheckTools);
    }

    pub fn submit(&self, topics: Vec<String>, images: BTreeMap<String, ImageAttachment>) {
        self.send(EngineCommand::Submit { topics, images });
    }

    pub fn start_polling(&self, job_id: impl Into<JobId>, generation: u64) {
        self.send(EngineCommand::StartPolling {
            job_id: job_id.into(),
            generation,
        });
    }

    pub fn stop_polling(&self) {
        self.send(EngineCommand::StopPolling);
    }

    pub fn retry(&self, job_id: impl Into<JobId>, topics: Vec<String>) {
        self.send(EngineCommand::Retry {
            job_id: job_id.into(),
            topics,
        });
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            scribe_error!("Engine thread is gone; command dropped");
        }
    }
}

async fn handle_request(
    api: &dyn JobApi,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let event = match command {
        EngineCommand::CheckTools => EngineEvent::ToolsChecked(api.check_tools().await),
        EngineCommand::Submit { topics, images } => {
            EngineEvent::Submitted(api.submit(&topics, &images).await)
        }
        EngineCommand::Retry { job_id, topics } => {
            let result = api.retry(&job_id, &topics).await;
            EngineEvent::Retried { topics, result }
        }
        EngineCommand::StartPolling { .. } | EngineCommand::StopPolling => return,
    };
    let _ = event_tx.send(event);
}

/// Polls immediately, then once per interval, one request at a time, until the
/// job completes, disappears, or the task is aborted.
async fn poll_job(
    api: Arc<dyn JobApi>,
    job_id: JobId,
    generation: u64,
    interval: Duration,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let result = api.status(&job_id).await;
        let finished = match &result {
            Ok(snapshot) => {
                scribe_debug!(
                    "Job {} reports {:.0}% of {} topic(s)",
                    job_id,
                    snapshot.progress,
                    snapshot.total
                );
                snapshot.state == JobState::Completed
            }
            Err(err) => err.is_not_found(),
        };
        let event = EngineEvent::Polled {
            generation,
            job_id: job_id.clone(),
            result,
        };
        if event_tx.send(event).is_err() || finished {
            break;
        }
    }
}
