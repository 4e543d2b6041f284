use std::io;
use std::sync::{mpsc, Arc};

use anyhow::Context;
use scribe_core::{update, BatchPhase, BatchState, Msg, NoticeLevel};
use scribe_engine::{EngineHandle, ReqwestJobApi, Store};
use scribe_logging::{parse_level, scribe_info};

use super::cli::Cli;
use super::config::ClientConfig;
use super::effects::{spawn_event_loop, EffectRunner};
use super::logging;
use super::persistence::SessionStore;
use super::ui::input::{spawn_reader, HELP};
use super::ui::render::{ResultsRenderer, UiCommand};
use super::ui::surface::TerminalSurface;

/// Everything the app loop reacts to.
pub(crate) enum Inbound {
    Core(Msg),
    /// Input the user typed that was not a command.
    Hint(String),
    Redraw,
    Quit,
}

pub fn run_app(cli: Cli) -> anyhow::Result<()> {
    let mut config = ClientConfig::load(&cli.config)?;
    cli.apply_overrides(&mut config);
    logging::initialize(config.log_destination, parse_level(&config.log_level));
    scribe_info!("Starting scribe against {}", config.api_base);

    let store = Store::open(&config.store_path(), config.storage_prefix.clone())
        .context("opening local storage")?;
    let mut session = SessionStore::new(store);
    if cli.abandon {
        session.clear_job();
    }

    let Some(first) = first_message(&cli, &mut session)? else {
        println!("Nothing to do: pass topics, --topics-file or --draft, or leave a job to resume.");
        return Ok(());
    };

    let api = ReqwestJobApi::new(config.gateway_settings()).context("configuring the job API")?;
    let links = api.clone();
    let (engine, events) = EngineHandle::spawn(Arc::new(api), config.engine_settings());

    let (tx, rx) = mpsc::channel::<Inbound>();
    tx.send(Inbound::Core(first))
        .context("queueing the first message")?;
    spawn_event_loop(events, tx.clone());
    spawn_reader(tx);

    let mut runner = EffectRunner::new(engine, session);
    let mut renderer = ResultsRenderer::default();
    let mut surface = TerminalSurface::new(
        io::stdout(),
        Box::new(move |filename: &str| links.download_url(filename).to_string()),
    );
    surface.apply(&[UiCommand::ShowToast {
        level: NoticeLevel::Info,
        text: HELP.to_string(),
    }])?;

    let mut state = BatchState::new();
    while let Ok(inbound) = rx.recv() {
        let msg = match inbound {
            Inbound::Core(msg) => msg,
            Inbound::Hint(text) => {
                surface.apply(&[UiCommand::ShowToast {
                    level: NoticeLevel::Warning,
                    text,
                }])?;
                continue;
            }
            Inbound::Redraw => {
                surface.redraw()?;
                continue;
            }
            Inbound::Quit => {
                scribe_info!("Quit requested; the saved job stays resumable");
                break;
            }
        };

        let (next, effects) = update(std::mem::take(&mut state), msg);
        state = next;
        let notices = runner.run(effects);
        if state.consume_dirty() {
            let view = state.view();
            surface.apply(&renderer.render(&view))?;
        }
        surface.apply(&notices)?;

        if session_over(state.phase()) {
            scribe_info!("Session finished in phase {:?}", state.phase());
            break;
        }
    }

    Ok(())
}

/// Fresh topics win over a saved job, which wins over the saved draft.
fn first_message(cli: &Cli, session: &mut SessionStore) -> anyhow::Result<Option<Msg>> {
    let topics = cli.read_topics()?;
    if !topics.is_empty() {
        return Ok(Some(Msg::SubmitClicked {
            topics,
            attachments: cli.attachments(),
        }));
    }
    if cli.draft {
        return Ok(session
            .load_draft()
            .map(|(topics, attachments)| Msg::SubmitClicked {
                topics,
                attachments,
            }));
    }
    Ok(session.load_job().map(Msg::RestoreSavedJob))
}

/// Idle after the first message means the batch was rejected or abandoned.
fn session_over(phase: BatchPhase) -> bool {
    matches!(
        phase,
        BatchPhase::Idle | BatchPhase::Completed | BatchPhase::Lost
    )
}
