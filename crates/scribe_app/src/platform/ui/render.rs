use std::collections::{BTreeMap, BTreeSet};

use scribe_core::{
    BatchAction, BatchPhase, BatchViewModel, ConfirmationView, NoticeLevel, RowKind, RowView,
    Topic,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    SetProgress { percent: u8, text: String },
    SetSubmitControl { enabled: bool, label: &'static str },
    SetBatchControlsVisible(bool),
    InsertRow { index: usize, row: RowView },
    ReplaceRow { topic: Topic, row: RowView },
    RemoveRow { topic: Topic, transition: RowTransition },
    ShowConfirmation { prompt: String },
    HideConfirmation,
    ScrollResultsIntoView,
    ShowToast { level: NoticeLevel, text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowTransition {
    Immediate,
    /// The row was dismissed by the user and fades out.
    FadeOut,
}

/// Turns successive view models into the commands that bring a surface from
/// the previous view to the next one.
#[derive(Debug, Default)]
pub struct ResultsRenderer {
    rows: Vec<RowView>,
    progress: Option<(u8, String)>,
    submit: Option<(bool, &'static str)>,
    batch_controls: Option<bool>,
    confirmation: Option<Option<String>>,
}

impl ResultsRenderer {
    pub fn render(&mut self, view: &BatchViewModel) -> Vec<UiCommand> {
        let mut cmds = Vec::new();

        let progress = (view.progress.percent, progress_text(view));
        if self.progress.as_ref() != Some(&progress) {
            cmds.push(UiCommand::SetProgress {
                percent: progress.0,
                text: progress.1.clone(),
            });
            self.progress = Some(progress);
        }

        let submit = (view.submit_enabled, submit_label(view.phase));
        if self.submit != Some(submit) {
            cmds.push(UiCommand::SetSubmitControl {
                enabled: submit.0,
                label: submit.1,
            });
            self.submit = Some(submit);
        }

        self.diff_rows(&view.rows, &mut cmds);

        if self.batch_controls != Some(view.batch_controls_visible) {
            cmds.push(UiCommand::SetBatchControlsVisible(view.batch_controls_visible));
            self.batch_controls = Some(view.batch_controls_visible);
        }

        let prompt = view.confirmation.map(confirmation_prompt);
        if self.confirmation.as_ref() != Some(&prompt) {
            cmds.push(match &prompt {
                Some(prompt) => UiCommand::ShowConfirmation {
                    prompt: prompt.clone(),
                },
                None => UiCommand::HideConfirmation,
            });
            self.confirmation = Some(prompt);
        }

        cmds
    }

    fn diff_rows(&mut self, next: &[RowView], cmds: &mut Vec<UiCommand>) {
        let next_topics: BTreeSet<&str> = next.iter().map(|row| row.topic.as_str()).collect();
        for old in &self.rows {
            if next_topics.contains(old.topic.as_str()) {
                continue;
            }
            let transition = match old.kind {
                RowKind::Failed { .. } | RowKind::Retrying { .. } => RowTransition::FadeOut,
                RowKind::Pending | RowKind::Succeeded { .. } => RowTransition::Immediate,
            };
            cmds.push(UiCommand::RemoveRow {
                topic: old.topic.clone(),
                transition,
            });
        }

        let previous: BTreeMap<&str, &RowView> =
            self.rows.iter().map(|row| (row.topic.as_str(), row)).collect();
        for (index, row) in next.iter().enumerate() {
            match previous.get(row.topic.as_str()) {
                Some(old) if *old == row => {}
                Some(_) => cmds.push(UiCommand::ReplaceRow {
                    topic: row.topic.clone(),
                    row: row.clone(),
                }),
                None => cmds.push(UiCommand::InsertRow {
                    index,
                    row: row.clone(),
                }),
            }
        }

        self.rows = next.to_vec();
    }
}

fn progress_text(view: &BatchViewModel) -> String {
    match view.phase {
        BatchPhase::Idle => "Ready".to_string(),
        BatchPhase::CheckingTools => "Checking backend configuration...".to_string(),
        BatchPhase::Submitting => "Starting generation...".to_string(),
        BatchPhase::Polling => format!(
            "Generating... ({}/{}) {}%",
            view.progress.completed, view.progress.display_total, view.progress.percent
        ),
        BatchPhase::PartiallyCompleted => format!(
            "Finished with {} failed topic(s); retry or discard them",
            view.outstanding_failures
        ),
        BatchPhase::Completed => format!(
            "All articles finished ({}/{})",
            view.progress.completed, view.progress.display_total
        ),
        BatchPhase::Lost => "Job no longer exists on the server".to_string(),
    }
}

fn submit_label(phase: BatchPhase) -> &'static str {
    match phase {
        BatchPhase::CheckingTools | BatchPhase::Submitting => "Submitting...",
        BatchPhase::Polling | BatchPhase::PartiallyCompleted => "Generating...",
        BatchPhase::Idle | BatchPhase::Completed | BatchPhase::Lost => "Start generation",
    }
}

fn confirmation_prompt(confirmation: ConfirmationView) -> String {
    match confirmation.action {
        BatchAction::RetryAll => format!(
            "Retry all {} failed topics? [yes/no]",
            confirmation.count
        ),
        BatchAction::DiscardAll => format!(
            "Discard all {} failed topics? They cannot be retried afterwards. [yes/no]",
            confirmation.count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scribe_core::compute_progress;

    fn row(topic: &str, kind: RowKind) -> RowView {
        RowView {
            topic: topic.to_string(),
            kind,
        }
    }

    fn failed(topic: &str) -> RowView {
        row(
            topic,
            RowKind::Failed {
                error: "timeout".to_string(),
                retry_count: 0,
            },
        )
    }

    fn polling_view(rows: Vec<RowView>) -> BatchViewModel {
        BatchViewModel {
            phase: BatchPhase::Polling,
            job_id: Some("job1".to_string()),
            progress: compute_progress(1, 3),
            rows,
            outstanding_failures: 0,
            batch_controls_visible: false,
            submit_enabled: false,
            confirmation: None,
        }
    }

    #[test]
    fn first_render_emits_everything() {
        let mut renderer = ResultsRenderer::default();
        let cmds = renderer.render(&polling_view(vec![row("A", RowKind::Pending)]));

        assert_eq!(
            cmds,
            vec![
                UiCommand::SetProgress {
                    percent: 33,
                    text: "Generating... (1/3) 33%".to_string(),
                },
                UiCommand::SetSubmitControl {
                    enabled: false,
                    label: "Generating...",
                },
                UiCommand::InsertRow {
                    index: 0,
                    row: row("A", RowKind::Pending),
                },
                UiCommand::SetBatchControlsVisible(false),
                UiCommand::HideConfirmation,
            ]
        );
    }

    #[test]
    fn unchanged_view_renders_nothing() {
        let mut renderer = ResultsRenderer::default();
        let view = polling_view(vec![row("A", RowKind::Pending)]);
        renderer.render(&view);
        assert!(renderer.render(&view).is_empty());
    }

    #[test]
    fn changed_row_is_replaced_in_place() {
        let mut renderer = ResultsRenderer::default();
        renderer.render(&polling_view(vec![
            row("A", RowKind::Pending),
            row("B", RowKind::Pending),
        ]));

        let cmds = renderer.render(&polling_view(vec![row("A", RowKind::Pending), failed("B")]));
        assert_eq!(
            cmds,
            vec![UiCommand::ReplaceRow {
                topic: "B".to_string(),
                row: failed("B"),
            }]
        );
    }

    #[test]
    fn discarded_row_fades_out_and_new_rows_insert() {
        let mut renderer = ResultsRenderer::default();
        renderer.render(&polling_view(vec![failed("A"), row("B", RowKind::Pending)]));

        let cmds = renderer.render(&polling_view(vec![
            row("B", RowKind::Pending),
            row("C", RowKind::Pending),
        ]));
        assert_eq!(
            cmds,
            vec![
                UiCommand::RemoveRow {
                    topic: "A".to_string(),
                    transition: RowTransition::FadeOut,
                },
                UiCommand::InsertRow {
                    index: 1,
                    row: row("C", RowKind::Pending),
                },
            ]
        );
    }

    #[test]
    fn confirmation_shows_and_hides() {
        let mut renderer = ResultsRenderer::default();
        let mut view = polling_view(vec![failed("A"), failed("B")]);
        view.phase = BatchPhase::PartiallyCompleted;
        view.outstanding_failures = 2;
        view.batch_controls_visible = true;
        renderer.render(&view);

        view.confirmation = Some(ConfirmationView {
            action: BatchAction::DiscardAll,
            count: 2,
        });
        let cmds = renderer.render(&view);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(
            &cmds[0],
            UiCommand::ShowConfirmation { prompt } if prompt.starts_with("Discard all 2 failed topics?")
        ));

        view.confirmation = None;
        assert_eq!(renderer.render(&view), vec![UiCommand::HideConfirmation]);
    }
}
