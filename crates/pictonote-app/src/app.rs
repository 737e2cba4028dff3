//! Headless client loop.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::BufRead;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::thread;
use std::time::{Duration, Instant};

use pictonote_core::{
    ChannelSession, ComposeError, ComposeSlot, Connector, Cue, Effects, MessageRecord,
    ReconnectingTransport, SendOutcome, SessionError, SharedEffects, UserSettings,
};
use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::sink::{PngSink, SinkError};

/// How long the loop waits for input before polling the transport again.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Application errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// What a line of input did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Sent,
    /// Not connected; the note was discarded.
    Dropped,
    /// Nothing to send.
    Empty,
    Command,
    Quit,
}

/// Effects sink for a terminal: cues become trace logs.
struct LogEffects;

impl Effects for LogEffects {
    fn play(&self, cue: Cue) {
        log::trace!("cue: {:?}", cue);
    }
}

/// Main application struct.
pub struct App<C: Connector> {
    settings: UserSettings,
    transport: ReconnectingTransport<C>,
    session: ChannelSession,
    compose: ComposeSlot,
    sink: Option<PngSink>,
    /// Records received since the last tick.
    inbox: Rc<RefCell<VecDeque<MessageRecord>>>,
}

impl<C: Connector> App<C> {
    /// Validate `config`, start connecting and join the configured channel.
    pub fn new(config: AppConfig, connector: C) -> Result<Self, AppError> {
        let (url, settings) = config.validate()?;
        let effects: SharedEffects = Rc::new(LogEffects);

        let mut transport = ReconnectingTransport::open_at(
            connector,
            url,
            effects.clone(),
            config.reconnect_delay,
            Instant::now(),
        );
        let mut session = ChannelSession::attach(&mut transport, effects.clone());
        session.join(&mut transport, settings.clone())?;

        let inbox = Rc::new(RefCell::new(VecDeque::new()));
        let sink_inbox = inbox.clone();
        session.on_receive(move |record| sink_inbox.borrow_mut().push_back(record.clone()));

        let compose = ComposeSlot::new(config.surface, effects)?;
        let sink = config.save_dir.map(PngSink::new).transpose()?;
        if let Some(sink) = &sink {
            log::info!("saving received notes to {}", sink.base_path().display());
        }

        Ok(Self {
            settings,
            transport,
            session,
            compose,
            sink,
            inbox,
        })
    }

    pub fn transport(&self) -> &ReconnectingTransport<C> {
        &self.transport
    }

    pub fn session(&self) -> &ChannelSession {
        &self.session
    }

    pub fn compose(&self) -> &ComposeSlot {
        &self.compose
    }

    /// Handle one line of user input.
    ///
    /// Lines starting with `/` are commands; anything else is typed onto the
    /// compose surface and sent as one note.
    pub fn handle_line(&mut self, line: &str) -> Result<LineOutcome, AppError> {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            "/quit" => return Ok(LineOutcome::Quit),
            "/clear" => {
                self.compose.clear();
                return Ok(LineOutcome::Command);
            }
            "/up" => {
                self.session.log_mut().select_previous();
                self.show_selection();
                return Ok(LineOutcome::Command);
            }
            "/down" => {
                self.session.log_mut().select_next();
                self.show_selection();
                return Ok(LineOutcome::Command);
            }
            "/copy" => {
                let selected = self.session.log().current().cloned();
                let copied = match selected {
                    Some(record) => self.compose.copy_from(&record)?,
                    None => false,
                };
                if copied {
                    log::info!("copied selected note into the compose surface");
                } else {
                    log::info!("selected entry has no drawing to copy");
                }
                return Ok(LineOutcome::Command);
            }
            _ => {}
        }

        // A literal "\n" in the input breaks the line on the note.
        self.compose.type_text(&line.replace("\\n", "\n"));
        let Some(content) = self.compose.send(&self.settings.authorship())? else {
            return Ok(LineOutcome::Empty);
        };
        match self.session.send(&mut self.transport, content)? {
            SendOutcome::Sent => Ok(LineOutcome::Sent),
            SendOutcome::Dropped => {
                log::warn!("not connected; note discarded");
                Ok(LineOutcome::Dropped)
            }
        }
    }

    /// Poll the transport and report what arrived.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.transport.poll_at(now);
        let arrived: Vec<MessageRecord> = self.inbox.borrow_mut().drain(..).collect();
        for record in arrived {
            self.report(&record);
        }
    }

    /// Run until `/quit` or end of input, then leave the channel.
    pub fn run(mut self, input: Receiver<String>) -> Result<(), AppError> {
        log::info!(
            "type a line to send it as a note; /up /down /copy /clear /quit"
        );
        loop {
            self.tick();
            match input.recv_timeout(POLL_INTERVAL) {
                Ok(line) => match self.handle_line(&line) {
                    Ok(LineOutcome::Quit) => break,
                    Ok(outcome) => log::debug!("line handled: {:?}", outcome),
                    Err(e) => log::error!("{}", e),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.session.leave(&mut self.transport)?;
        // Give the socket thread a moment to flush the leave frame.
        thread::sleep(POLL_INTERVAL);
        self.transport.shutdown();
        Ok(())
    }

    fn report(&mut self, record: &MessageRecord) {
        match record {
            MessageRecord::Banner => log::info!("*** welcome to PictoNote ***"),
            MessageRecord::Join(presence) => {
                log::info!("{} joined {}", presence.author, presence.channel)
            }
            MessageRecord::Leave(presence) => {
                log::info!("{} left {}", presence.author, presence.channel)
            }
            MessageRecord::User(content) => {
                log::info!(
                    "note from {} ({} zone{}, {})",
                    content.author,
                    content.height,
                    if content.height == 1 { "" } else { "s" },
                    content.color
                );
                if let Some(sink) = &mut self.sink {
                    if let Err(e) = sink.save(content) {
                        log::warn!("could not save note from {}: {}", content.author, e);
                    }
                }
            }
        }
    }

    fn show_selection(&self) {
        let log = self.session.log();
        match (log.selected_index(), log.current()) {
            (Some(index), Some(record)) => log::info!(
                "selected {}/{}: {}",
                index + 1,
                log.len(),
                record.author().unwrap_or("banner")
            ),
            _ => log::info!("no messages yet"),
        }
    }
}

/// Read stdin lines on a background thread.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    log::error!("stdin read error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}
