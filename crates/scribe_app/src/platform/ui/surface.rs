use std::io::{self, Write};

use chrono::Local;
use scribe_core::{NoticeLevel, RowKind, RowView};

use super::render::{RowTransition, UiCommand};

const BAR_WIDTH: usize = 20;

/// Builds the download link shown for a finished article.
pub type LinkBuilder = Box<dyn Fn(&str) -> String + Send>;

/// Line-oriented terminal rendering of the results panel.
///
/// Keeps its own copy of the panel so `redraw` can reprint it at any time.
pub struct TerminalSurface<W: Write> {
    out: W,
    link: LinkBuilder,
    rows: Vec<RowView>,
    percent: u8,
    progress_text: String,
    submit: (bool, &'static str),
    batch_controls: bool,
    confirmation: Option<String>,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, link: LinkBuilder) -> Self {
        Self {
            out,
            link,
            rows: Vec::new(),
            percent: 0,
            progress_text: String::new(),
            submit: (true, "Start generation"),
            batch_controls: false,
            confirmation: None,
        }
    }

    pub fn apply(&mut self, cmds: &[UiCommand]) -> io::Result<()> {
        for cmd in cmds {
            self.apply_one(cmd)?;
        }
        self.out.flush()
    }

    fn apply_one(&mut self, cmd: &UiCommand) -> io::Result<()> {
        match cmd {
            UiCommand::SetProgress { percent, text } => {
                self.percent = *percent;
                self.progress_text = text.clone();
                let line = self.progress_line();
                writeln!(self.out, "{line}")
            }
            UiCommand::SetSubmitControl { enabled, label } => {
                self.submit = (*enabled, *label);
                Ok(())
            }
            UiCommand::SetBatchControlsVisible(visible) => {
                self.batch_controls = *visible;
                if *visible {
                    writeln!(self.out, "  batch actions available: retry-all, discard-all")?;
                }
                Ok(())
            }
            UiCommand::InsertRow { index, row } => {
                let index = (*index).min(self.rows.len());
                writeln!(self.out, "+ {}", row_line(&self.link, row))?;
                self.rows.insert(index, row.clone());
                Ok(())
            }
            UiCommand::ReplaceRow { topic, row } => {
                writeln!(self.out, "~ {}", row_line(&self.link, row))?;
                match self.rows.iter_mut().find(|existing| existing.topic == *topic) {
                    Some(existing) => *existing = row.clone(),
                    None => self.rows.push(row.clone()),
                }
                Ok(())
            }
            UiCommand::RemoveRow { topic, transition } => {
                self.rows.retain(|row| row.topic != *topic);
                match transition {
                    RowTransition::FadeOut => writeln!(self.out, "- {topic} (discarded)"),
                    RowTransition::Immediate => Ok(()),
                }
            }
            UiCommand::ShowConfirmation { prompt } => {
                self.confirmation = Some(prompt.clone());
                writeln!(self.out, "? {prompt}")
            }
            UiCommand::HideConfirmation => {
                self.confirmation = None;
                Ok(())
            }
            UiCommand::ScrollResultsIntoView => self.write_results(),
            UiCommand::ShowToast { level, text } => writeln!(
                self.out,
                "[{}] {:<7} {}",
                Local::now().format("%H:%M:%S"),
                level_label(*level),
                text
            ),
        }
    }

    /// Reprints the whole panel.
    pub fn redraw(&mut self) -> io::Result<()> {
        let line = self.progress_line();
        writeln!(self.out, "{line}")?;
        let (enabled, label) = self.submit;
        writeln!(
            self.out,
            "  [{}]{}",
            label,
            if enabled { "" } else { " (disabled)" }
        )?;
        self.write_results()?;
        if self.batch_controls {
            writeln!(self.out, "  batch actions available: retry-all, discard-all")?;
        }
        if let Some(prompt) = &self.confirmation {
            writeln!(self.out, "? {prompt}")?;
        }
        self.out.flush()
    }

    fn write_results(&mut self) -> io::Result<()> {
        writeln!(self.out, "== Results ({}) ==", self.rows.len())?;
        for row in &self.rows {
            writeln!(self.out, "  {}", row_line(&self.link, row))?;
        }
        Ok(())
    }

    fn progress_line(&self) -> String {
        let filled = usize::from(self.percent.min(100)) * BAR_WIDTH / 100;
        format!(
            "[{}{}] {:>3}% {}",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            self.percent,
            self.progress_text
        )
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

fn row_line(link: &LinkBuilder, row: &RowView) -> String {
    match &row.kind {
        RowKind::Pending => format!("{} (pending)", row.topic),
        RowKind::Succeeded {
            title,
            download_filename,
        } => format!("{} -> {}", title, link(download_filename)),
        RowKind::Failed { error, retry_count } if *retry_count > 0 => format!(
            "{} FAILED: {} (retried {}x) [retry | discard]",
            row.topic, error, retry_count
        ),
        RowKind::Failed { error, .. } => {
            format!("{} FAILED: {} [retry | discard]", row.topic, error)
        }
        RowKind::Retrying { retry_count } => {
            format!("{} retrying (attempt {})", row.topic, retry_count + 1)
        }
    }
}

fn level_label(level: NoticeLevel) -> &'static str {
    match level {
        NoticeLevel::Info => "INFO",
        NoticeLevel::Success => "OK",
        NoticeLevel::Warning => "WARNING",
        NoticeLevel::Error => "ERROR",
    }
}
