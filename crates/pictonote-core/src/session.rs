//! Channel session: join protocol, outgoing messages and the message log.
//!
//! The session registers itself with a [`ReconnectingTransport`] and keeps
//! that registration for as long as it lives. Operations that write to the
//! wire borrow the transport for the duration of the call.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use thiserror::Error;

use crate::effects::{Cue, SharedEffects};
use crate::message::{ClientFrame, MessageRecord, ServerFrame, UserContent, parse_server_frame};
use crate::settings::UserSettings;
use crate::sync::{
    Connector, Outbox, ReconnectingTransport, SendOutcome, Subscription, TransportListener,
};

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Already joined channel {0}")]
    AlreadyJoined(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Append-only record log with a selection cursor.
///
/// The cursor starts on the latest record and follows new arrivals until
/// moved with [`select_previous`](Self::select_previous).
pub struct MessageLog {
    records: Vec<MessageRecord>,
    /// `None` selects the latest record.
    cursor: Option<usize>,
    effects: SharedEffects,
}

impl MessageLog {
    pub fn new(effects: SharedEffects) -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
            effects,
        }
    }

    pub fn push(&mut self, record: MessageRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn latest(&self) -> Option<&MessageRecord> {
        self.records.last()
    }

    /// Index of the selected record.
    pub fn selected_index(&self) -> Option<usize> {
        match self.cursor {
            Some(index) => Some(index),
            None => self.records.len().checked_sub(1),
        }
    }

    /// The selected record.
    pub fn current(&self) -> Option<&MessageRecord> {
        self.selected_index().and_then(|index| self.records.get(index))
    }

    /// Whether the cursor is following the latest record.
    pub fn is_following(&self) -> bool {
        self.cursor.is_none()
    }

    /// Move the cursor one record back, stopping at the first.
    pub fn select_previous(&mut self) {
        self.effects.play(Cue::Scroll);
        self.cursor = match self.cursor {
            None => self.records.len().checked_sub(2),
            Some(index) => Some(index.saturating_sub(1)),
        };
    }

    /// Move the cursor one record forward; reaching the latest record
    /// resumes following.
    pub fn select_next(&mut self) {
        self.effects.play(Cue::Scroll);
        self.cursor = match self.cursor {
            None => None,
            Some(index) if index + 1 >= self.records.len().saturating_sub(1) => None,
            Some(index) => Some(index + 1),
        };
    }
}

type ReceiveHandler = Box<dyn FnMut(&MessageRecord)>;

/// Session state shared with the transport's listener registry.
pub struct SessionState {
    settings: Option<UserSettings>,
    log: MessageLog,
    handlers: Vec<ReceiveHandler>,
    rejected: usize,
}

impl SessionState {
    fn new(effects: SharedEffects) -> Self {
        Self {
            settings: None,
            log: MessageLog::new(effects),
            handlers: Vec::new(),
            rejected: 0,
        }
    }

    fn join_frame(&self) -> Option<String> {
        let settings = self.settings.as_ref()?;
        let frame = ClientFrame::Join {
            channel: settings.channel.clone(),
            name: Some(settings.name.clone()),
        };
        match frame.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                log::error!("failed to encode join frame: {}", e);
                None
            }
        }
    }

    fn queue_join(&self, outbox: &mut Outbox) {
        if let Some(frame) = self.join_frame() {
            log::info!(
                "sending join for channel {} on new connection",
                self.settings.as_ref().map_or("", |s| s.channel.as_str())
            );
            outbox.push(frame);
        }
    }

    fn append(&mut self, record: MessageRecord) {
        for handler in &mut self.handlers {
            handler(&record);
        }
        self.log.push(record);
    }
}

impl TransportListener for SessionState {
    fn on_message(&mut self, text: &str) {
        match parse_server_frame(text) {
            Ok(ServerFrame::Message { message }) => self.append(message),
            Ok(ServerFrame::Other) => log::debug!("ignoring non-message frame"),
            Err(e) => {
                self.rejected += 1;
                log::warn!("dropping inbound frame: {}", e);
            }
        }
    }

    fn on_close(&mut self) {
        log::debug!("session lost its connection; waiting for reconnect");
    }

    fn on_connect(&mut self, outbox: &mut Outbox) {
        // A join issued before the first open was dropped; send it now.
        self.queue_join(outbox);
    }

    fn on_reconnect(&mut self, outbox: &mut Outbox) {
        self.queue_join(outbox);
    }
}

/// One user's membership of one channel.
pub struct ChannelSession {
    state: Rc<RefCell<SessionState>>,
    _subscription: Subscription,
}

impl ChannelSession {
    /// Create a session listening on `transport`.
    pub fn attach<C: Connector>(
        transport: &mut ReconnectingTransport<C>,
        effects: SharedEffects,
    ) -> Self {
        let state = Rc::new(RefCell::new(SessionState::new(effects)));
        let subscription = transport.subscribe(state.clone());
        Self {
            state,
            _subscription: subscription,
        }
    }

    /// Join a channel and seed the log with the local banner and presence.
    ///
    /// If the transport is not open yet the join goes out on the next open.
    pub fn join<C: Connector>(
        &mut self,
        transport: &mut ReconnectingTransport<C>,
        settings: UserSettings,
    ) -> SessionResult<SendOutcome> {
        if let Some(current) = &self.state.borrow().settings {
            return Err(SessionError::AlreadyJoined(current.channel.clone()));
        }

        let frame = ClientFrame::Join {
            channel: settings.channel.clone(),
            name: Some(settings.name.clone()),
        }
        .to_json()?;
        let outcome = transport.send(&frame);
        log::info!(
            "{} joining channel {} ({:?})",
            settings.name,
            settings.channel,
            outcome
        );

        let mut state = self.state.borrow_mut();
        state.log.push(MessageRecord::Banner);
        state.log.push(MessageRecord::presence(
            settings.name.as_str(),
            settings.channel.as_str(),
            false,
        ));
        state.settings = Some(settings);
        Ok(outcome)
    }

    /// Announce departure and forget the joined channel.
    pub fn leave<C: Connector>(
        &mut self,
        transport: &mut ReconnectingTransport<C>,
    ) -> SessionResult<SendOutcome> {
        let Some(settings) = self.state.borrow_mut().settings.take() else {
            return Ok(SendOutcome::Dropped);
        };
        let frame = ClientFrame::Message {
            channel: settings.channel.clone(),
            message: MessageRecord::presence(settings.name.as_str(), settings.channel.as_str(), true),
        }
        .to_json()?;
        let outcome = transport.send(&frame);
        log::info!("{} left channel {}", settings.name, settings.channel);
        Ok(outcome)
    }

    /// Send a drawn message to the joined channel.
    ///
    /// Dropped when not joined or not connected. The relay echoes the
    /// message back, so nothing is appended locally.
    pub fn send<C: Connector>(
        &self,
        transport: &mut ReconnectingTransport<C>,
        content: UserContent,
    ) -> SessionResult<SendOutcome> {
        let Some(channel) = self.channel() else {
            log::debug!("not joined; dropping message");
            return Ok(SendOutcome::Dropped);
        };
        let frame = ClientFrame::Message {
            channel,
            message: MessageRecord::User(content),
        }
        .to_json()?;
        Ok(transport.send(&frame))
    }

    /// Call `handler` for every inbound record, before it is logged.
    pub fn on_receive(&self, handler: impl FnMut(&MessageRecord) + 'static) {
        self.state.borrow_mut().handlers.push(Box::new(handler));
    }

    pub fn is_joined(&self) -> bool {
        self.state.borrow().settings.is_some()
    }

    pub fn settings(&self) -> Option<UserSettings> {
        self.state.borrow().settings.clone()
    }

    pub fn channel(&self) -> Option<String> {
        self.state
            .borrow()
            .settings
            .as_ref()
            .map(|s| s.channel.clone())
    }

    pub fn log(&self) -> Ref<'_, MessageLog> {
        Ref::map(self.state.borrow(), |state| &state.log)
    }

    pub fn log_mut(&self) -> RefMut<'_, MessageLog> {
        RefMut::map(self.state.borrow_mut(), |state| &mut state.log)
    }

    /// Inbound frames dropped as malformed so far.
    pub fn rejected_frames(&self) -> usize {
        self.state.borrow().rejected
    }
}
