use std::io::{self, BufRead};
use std::sync::mpsc;
use std::thread;

use scribe_core::{Msg, Topic};
use scribe_logging::scribe_debug;

use crate::platform::app::Inbound;

pub const HELP: &str =
    "commands: retry <topic>, retry-all, discard <topic>, discard-all, yes, no, abandon, show, quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Retry(Topic),
    RetryAll,
    Discard(Topic),
    DiscardAll,
    Confirm,
    Dismiss,
    Abandon,
    Redraw,
    Quit,
}

impl Intent {
    pub fn into_inbound(self) -> Inbound {
        match self {
            Intent::Retry(topic) => Inbound::Core(Msg::RetryClicked { topic }),
            Intent::RetryAll => Inbound::Core(Msg::RetryAllClicked),
            Intent::Discard(topic) => Inbound::Core(Msg::DiscardClicked { topic }),
            Intent::DiscardAll => Inbound::Core(Msg::DiscardAllClicked),
            Intent::Confirm => Inbound::Core(Msg::ConfirmAccepted),
            Intent::Dismiss => Inbound::Core(Msg::ConfirmDismissed),
            Intent::Abandon => Inbound::Core(Msg::AbandonClicked),
            Intent::Redraw => Inbound::Redraw,
            Intent::Quit => Inbound::Quit,
        }
    }
}

/// Parses one input line. Blank lines are `Ok(None)`.
pub fn parse_intent(line: &str) -> Result<Option<Intent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let intent = match (command.to_ascii_lowercase().as_str(), rest) {
        ("retry", "") | ("discard", "") => {
            return Err(format!("{command} needs a topic; {HELP}"));
        }
        ("retry", topic) => Intent::Retry(topic.to_string()),
        ("discard", topic) => Intent::Discard(topic.to_string()),
        ("retry-all", "") => Intent::RetryAll,
        ("discard-all", "") => Intent::DiscardAll,
        ("yes", "") | ("y", "") => Intent::Confirm,
        ("no", "") | ("n", "") => Intent::Dismiss,
        ("abandon", "") => Intent::Abandon,
        ("show", "") | ("status", "") => Intent::Redraw,
        ("quit", "") | ("exit", "") | ("q", "") => Intent::Quit,
        _ => return Err(format!("unknown command {line:?}; {HELP}")),
    };
    Ok(Some(intent))
}

/// Reads commands from stdin until it closes or the app stops listening.
pub fn spawn_reader(tx: mpsc::Sender<Inbound>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let inbound = match parse_intent(&line) {
                Ok(Some(intent)) => intent.into_inbound(),
                Ok(None) => continue,
                Err(hint) => Inbound::Hint(hint),
            };
            if tx.send(inbound).is_err() {
                break;
            }
        }
        scribe_debug!("Input closed; the job keeps being followed");
    });
}
