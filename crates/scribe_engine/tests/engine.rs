use std::collections::{BTreeMap, VecDeque};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use scribe_engine::{
    ApiError, ApiErrorKind, EngineEvent, EngineHandle, EngineSettings, ImageAttachment, JobApi,
    JobId, JobState, RetryAck, StatusSnapshot,
};

/// Replays scripted status answers and records which jobs were polled.
#[derive(Default)]
struct ScriptedApi {
    statuses: Mutex<VecDeque<Result<StatusSnapshot, ApiError>>>,
    polled: Mutex<Vec<String>>,
}

impl ScriptedApi {
    fn with_statuses(statuses: Vec<Result<StatusSnapshot, ApiError>>) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.into()),
            polled: Mutex::new(Vec::new()),
        })
    }

    fn polled(&self) -> Vec<String> {
        self.polled.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl JobApi for ScriptedApi {
    async fn check_tools(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn submit(
        &self,
        topics: &[String],
        _images: &BTreeMap<String, ImageAttachment>,
    ) -> Result<JobId, ApiError> {
        Ok(format!("job-{}", topics.len()))
    }

    async fn status(&self, job_id: &str) -> Result<StatusSnapshot, ApiError> {
        self.polled.lock().unwrap().push(job_id.to_string());
        self.statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot(JobState::Running)))
    }

    async fn retry(&self, job_id: &str, _topics: &[String]) -> Result<RetryAck, ApiError> {
        Err(ApiError::new(
            ApiErrorKind::Network,
            format!("cannot reach server for {job_id}"),
        ))
    }
}

fn snapshot(state: JobState) -> StatusSnapshot {
    StatusSnapshot {
        state,
        total: 1,
        progress: 0.0,
        succeeded: Vec::new(),
        failed: Vec::new(),
    }
}

fn fast() -> EngineSettings {
    EngineSettings {
        poll_interval: Duration::from_millis(20),
    }
}

fn next(events: &mpsc::Receiver<EngineEvent>) -> EngineEvent {
    events
        .recv_timeout(Duration::from_secs(5))
        .expect("engine event")
}

#[test]
fn polling_stops_after_completion() {
    let api = ScriptedApi::with_statuses(vec![
        Ok(snapshot(JobState::Running)),
        Ok(snapshot(JobState::Completed)),
    ]);
    let (engine, events) = EngineHandle::spawn(api.clone(), fast());
    engine.start_polling("job-1", 7);

    for expected in [JobState::Running, JobState::Completed] {
        match next(&events) {
            EngineEvent::Polled {
                generation,
                job_id,
                result,
            } => {
                assert_eq!(generation, 7);
                assert_eq!(job_id, "job-1");
                assert_eq!(result.unwrap().state, expected);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    std::thread::sleep(Duration::from_millis(100));
    assert!(events.try_recv().is_err());
    assert_eq!(api.polled().len(), 2);
}

#[test]
fn not_found_ends_polling() {
    let api = ScriptedApi::with_statuses(vec![Err(ApiError::new(
        ApiErrorKind::NotFound,
        "no such task",
    ))]);
    let (engine, events) = EngineHandle::spawn(api.clone(), fast());
    engine.start_polling("gone", 1);

    match next(&events) {
        EngineEvent::Polled { result, .. } => assert!(result.unwrap_err().is_not_found()),
        other => panic!("unexpected event {other:?}"),
    }
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(api.polled(), vec!["gone".to_string()]);
}

#[test]
fn starting_a_new_poll_replaces_the_old_timer() {
    let api = ScriptedApi::with_statuses(Vec::new());
    let (engine, events) = EngineHandle::spawn(api.clone(), fast());
    engine.start_polling("job-1", 1);
    let _ = next(&events);
    engine.start_polling("job-2", 2);

    // Drain until the new generation shows up, then stop everything.
    loop {
        if let EngineEvent::Polled { generation: 2, .. } = next(&events) {
            break;
        }
    }
    engine.stop_polling();
    std::thread::sleep(Duration::from_millis(60));
    while events.try_recv().is_ok() {}
    let before = api.polled().len();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(api.polled().len(), before);
    assert!(api.polled().contains(&"job-2".to_string()));
}

#[test]
fn requests_report_back_as_events() {
    let api = ScriptedApi::with_statuses(Vec::new());
    let (engine, events) = EngineHandle::spawn(api, fast());

    engine.check_tools();
    assert_eq!(next(&events), EngineEvent::ToolsChecked(Ok(true)));

    engine.submit(vec!["A".into(), "B".into()], BTreeMap::new());
    assert_eq!(next(&events), EngineEvent::Submitted(Ok("job-2".into())));

    engine.retry("job-2", vec!["A".into()]);
    match next(&events) {
        EngineEvent::Retried { topics, result } => {
            assert_eq!(topics, vec!["A".to_string()]);
            assert_eq!(result.unwrap_err().kind, ApiErrorKind::Network);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn transient_failures_keep_polling() {
    let api = ScriptedApi::with_statuses(vec![
        Err(ApiError::new(ApiErrorKind::Network, "connection reset")),
        Ok(snapshot(JobState::Completed)),
    ]);
    let (engine, events) = EngineHandle::spawn(api.clone(), fast());
    engine.start_polling("job-1", 3);

    match next(&events) {
        EngineEvent::Polled { result, .. } => {
            assert_eq!(result.unwrap_err().kind, ApiErrorKind::Network)
        }
        other => panic!("unexpected event {other:?}"),
    }
    match next(&events) {
        EngineEvent::Polled { result, .. } => assert_eq!(result.unwrap().state, JobState::Completed),
        other => panic!("unexpected event {other:?}"),
    }

    std::thread::sleep(Duration::from_millis(100));
    assert!(events.try_recv().is_err());
    assert_eq!(api.polled().len(), 2);
}
