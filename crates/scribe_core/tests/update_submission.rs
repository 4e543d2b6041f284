use std::collections::BTreeMap;
use std::sync::Once;

use pretty_assertions::assert_eq;
use scribe_core::{
    update, validate_topics, BatchError, BatchPhase, BatchState, Effect, ItemStatus, Msg,
    NoticeLevel, PollFailure, RowKind, SavedJob, TopicImage,
};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(scribe_logging::initialize_for_tests);
}

fn click_submit(state: BatchState, topics: &[&str]) -> (BatchState, Vec<Effect>) {
    update(
        state,
        Msg::SubmitClicked {
            topics: topics.iter().map(|t| t.to_string()).collect(),
            attachments: BTreeMap::new(),
        },
    )
}

fn notices(effects: &[Effect]) -> Vec<(NoticeLevel, String)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Notify { level, message } => Some((*level, message.clone())),
            _ => None,
        })
        .collect()
}

#[test]
fn empty_submission_is_rejected_without_network() {
    init_logging();
    let (state, effects) = click_submit(BatchState::new(), &["  ", ""]);

    assert_eq!(state.phase(), BatchPhase::Idle);
    assert_eq!(
        notices(&effects),
        vec![(
            NoticeLevel::Warning,
            BatchError::EmptySubmission.to_string()
        )]
    );
    assert!(!effects.contains(&Effect::CheckTools));
}

#[test]
fn duplicate_topics_are_flagged() {
    assert_eq!(
        validate_topics(vec!["A".into(), " A ".into()]),
        Err(BatchError::DuplicateTopic("A".into()))
    );
}

#[test]
fn oversized_batches_are_rejected() {
    let topics = (0..51).map(|i| format!("topic {i}")).collect();
    assert!(matches!(
        validate_topics(topics),
        Err(BatchError::TooManyTopics { max: 50, actual: 51 })
    ));
}

#[test]
fn submit_checks_tools_before_submitting() {
    init_logging();
    let mut attachments = BTreeMap::new();
    attachments.insert("A".to_string(), TopicImage::Url("https://img/a.png".into()));
    attachments.insert("gone".to_string(), TopicImage::Uploaded("uploads/x.png".into()));

    let (state, effects) = update(
        BatchState::new(),
        Msg::SubmitClicked {
            topics: vec![" A ".into(), "B".into()],
            attachments,
        },
    );
    assert_eq!(state.phase(), BatchPhase::CheckingTools);

    let mut kept = BTreeMap::new();
    kept.insert("A".to_string(), TopicImage::Url("https://img/a.png".into()));
    assert_eq!(
        effects,
        vec![
            Effect::SaveDraft {
                topics: vec!["A".into(), "B".into()],
                attachments: kept.clone(),
            },
            Effect::CheckTools,
        ]
    );

    let (state, effects) = update(state, Msg::ToolCheckFinished(Ok(true)));
    assert_eq!(state.phase(), BatchPhase::Submitting);
    assert_eq!(
        effects,
        vec![Effect::SubmitBatch {
            topics: vec!["A".into(), "B".into()],
            attachments: kept,
        }]
    );
}

#[test]
fn missing_converter_blocks_submission() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A"]);
    let (state, effects) = update(state, Msg::ToolCheckFinished(Ok(false)));

    assert_eq!(state.phase(), BatchPhase::Idle);
    assert!(state.submit_enabled());
    assert_eq!(
        notices(&effects),
        vec![(NoticeLevel::Error, BatchError::ToolNotConfigured.to_string())]
    );
}

#[test]
fn accepted_submission_creates_pending_rows_and_starts_polling() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A", "B", "C"]);
    let (state, _) = update(state, Msg::ToolCheckFinished(Ok(true)));
    let (mut state, effects) = update(state, Msg::SubmitFinished(Ok("job1".into())));

    let view = state.view();
    assert_eq!(view.phase, BatchPhase::Polling);
    assert_eq!(view.rows.len(), 3);
    assert!(view.rows.iter().all(|row| row.kind == RowKind::Pending));
    assert!(!view.submit_enabled);
    assert_eq!(view.progress.percent, 0);
    assert_eq!(view.progress.display_total, 3);
    assert!(state.consume_dirty());

    assert_eq!(
        effects[..2],
        [
            Effect::SaveJob(SavedJob {
                job_id: "job1".into(),
                topics: vec!["A".into(), "B".into(), "C".into()],
                job_topics: vec!["A".into(), "B".into(), "C".into()],
            }),
            Effect::StartPolling {
                job_id: "job1".into(),
                generation: state.generation(),
            },
        ]
    );
}

#[test]
fn failed_submission_resets_the_batch() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A"]);
    let (state, _) = update(state, Msg::ToolCheckFinished(Ok(true)));
    let (state, effects) = update(state, Msg::SubmitFinished(Err("boom".into())));

    assert_eq!(state.phase(), BatchPhase::Idle);
    assert!(state.items().is_empty());
    assert_eq!(notices(&effects)[0].0, NoticeLevel::Error);
}

#[test]
fn submit_is_ignored_while_polling() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A"]);
    let (state, _) = update(state, Msg::ToolCheckFinished(Ok(true)));
    let (state, _) = update(state, Msg::SubmitFinished(Ok("job1".into())));

    let (state, effects) = click_submit(state, &["B"]);
    assert_eq!(state.phase(), BatchPhase::Polling);
    assert_eq!(state.items().len(), 1);
    assert_eq!(
        notices(&effects),
        vec![(NoticeLevel::Warning, BatchError::Busy.to_string())]
    );
}

#[test]
fn restored_job_polls_only_its_own_topics() {
    init_logging();
    let saved = SavedJob {
        job_id: "job2".into(),
        topics: vec!["A".into(), "B".into(), "C".into()],
        job_topics: vec!["C".into()],
    };
    let (state, effects) = update(BatchState::new(), Msg::RestoreSavedJob(saved.clone()));

    assert_eq!(state.phase(), BatchPhase::Polling);
    assert_eq!(state.job_id(), Some("job2"));
    assert_eq!(state.items().len(), 1);
    assert_eq!(state.status_of("C"), Some(ItemStatus::Pending));
    assert_eq!(state.saved_job(), Some(saved));
    assert!(effects.contains(&Effect::StartPolling {
        job_id: "job2".into(),
        generation: state.generation(),
    }));
}

#[test]
fn lost_job_is_cleared_and_submit_reenabled() {
    init_logging();
    let saved = SavedJob {
        job_id: "gone".into(),
        topics: vec!["A".into()],
        job_topics: Vec::new(),
    };
    let (state, _) = update(BatchState::new(), Msg::RestoreSavedJob(saved));
    let generation = state.generation();
    let (state, effects) = update(
        state,
        Msg::PollFailed {
            generation,
            failure: PollFailure::NotFound,
        },
    );

    assert_eq!(state.phase(), BatchPhase::Lost);
    assert!(state.submit_enabled());
    assert_eq!(state.job_id(), None);
    assert_eq!(effects[..2], [Effect::StopPolling, Effect::ClearSavedJob]);
    assert_eq!(notices(&effects)[0].0, NoticeLevel::Error);
}

#[test]
fn transient_poll_errors_keep_polling() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A"]);
    let (state, _) = update(state, Msg::ToolCheckFinished(Ok(true)));
    let (state, _) = update(state, Msg::SubmitFinished(Ok("job1".into())));
    let generation = state.generation();

    let (state, effects) = update(
        state,
        Msg::PollFailed {
            generation,
            failure: PollFailure::Transient("connection reset".into()),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state.phase(), BatchPhase::Polling);
    assert_eq!(state.generation(), generation);
}

#[test]
fn abandon_stops_polling_and_forgets_the_job() {
    init_logging();
    let (state, _) = click_submit(BatchState::new(), &["A"]);
    let (state, _) = update(state, Msg::ToolCheckFinished(Ok(true)));
    let (state, _) = update(state, Msg::SubmitFinished(Ok("job1".into())));
    let before = state.generation();

    let (state, effects) = update(state, Msg::AbandonClicked);
    assert_eq!(state.phase(), BatchPhase::Idle);
    assert!(state.items().is_empty());
    assert!(state.generation() > before);
    assert_eq!(effects[..2], [Effect::StopPolling, Effect::ClearSavedJob]);

    let (_state, effects) = update(state, Msg::AbandonClicked);
    assert!(effects.is_empty());
}
