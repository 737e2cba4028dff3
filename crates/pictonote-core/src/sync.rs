//! Reconnecting WebSocket transport.
//!
//! [`ReconnectingTransport`] owns exactly one live connection handle and
//! walks it through `Connecting -> Open -> Closed -> Connecting ...` forever.
//! The host drives it by calling [`ReconnectingTransport::poll`] from its
//! event loop; nothing here blocks. The reconnect delay is a deadline checked
//! on each poll, not a sleeping timer.
//!
//! Real sockets sit behind the [`Connector`] seam. [`NativeConnector`] runs
//! each connection on a background thread and talks to it over channels.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

use thiserror::Error;
use url::Url;

use crate::effects::{Cue, SharedEffects};

/// Delay between a connection closing and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Send failed: {0}")]
    Send(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Parse a relay URL.
///
/// Only plain `ws` is accepted. The socket is built without TLS, so `wss`
/// could never connect and is rejected up front.
pub fn parse_endpoint(url: &str) -> TransportResult<Url> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    match parsed.scheme() {
        "ws" => {}
        "wss" => {
            return Err(TransportError::InvalidUrl(
                "wss is not supported: this client has no TLS support".to_string(),
            ));
        }
        scheme => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported WebSocket scheme: {}",
                scheme
            )));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(TransportError::InvalidUrl("missing host".to_string()));
    }
    Ok(parsed)
}

/// Something that happened on one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Opened,
    Frame(String),
    /// The connection is gone, for whatever reason. Always the last event.
    Closed,
}

/// One connection attempt. Dropping the handle must close it.
pub trait ConnectionHandle {
    fn send(&mut self, text: &str) -> TransportResult<()>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<LinkEvent>;

    fn close(&mut self);
}

/// Opens connections to an endpoint.
pub trait Connector {
    type Handle: ConnectionHandle;

    fn open(&mut self, url: &Url) -> TransportResult<Self::Handle>;
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

/// Result of a send request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Not open; the frame was discarded, not queued.
    Dropped,
}

/// Frames a listener wants written on a fresh connection before it opens.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<String>,
}

impl Outbox {
    pub fn push(&mut self, frame: impl Into<String>) {
        self.frames.push(frame.into());
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Callbacks for transport consumers. All methods default to no-ops.
pub trait TransportListener {
    /// An inbound text frame.
    fn on_message(&mut self, _text: &str) {}

    /// The live connection went away.
    fn on_close(&mut self) {}

    /// The first connection opened. Runs before the state becomes
    /// [`ConnectionState::Open`].
    fn on_connect(&mut self, _outbox: &mut Outbox) {}

    /// A replacement connection opened. Runs before the state becomes
    /// [`ConnectionState::Open`].
    fn on_reconnect(&mut self, _outbox: &mut Outbox) {}
}

type SharedListener = Rc<RefCell<dyn TransportListener>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, SharedListener)>,
}

impl Registry {
    fn contains(&self, id: u64) -> bool {
        self.listeners.iter().any(|(lid, _)| *lid == id)
    }

    fn remove(&mut self, id: u64) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }
}

/// Keeps a listener registered; unregisters it when dropped.
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    registry: Weak<RefCell<Registry>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().remove(self.id);
        }
    }
}

enum Link<H> {
    Connecting { handle: H, generation: u64 },
    Open { handle: H, generation: u64 },
    /// `retry_at` is `None` once the transport has been shut down.
    Closed { retry_at: Option<Instant> },
}

/// A WebSocket connection that reopens itself after every close.
pub struct ReconnectingTransport<C: Connector> {
    connector: C,
    url: Url,
    link: Link<C::Handle>,
    generation: u64,
    has_opened: bool,
    reconnect_delay: Duration,
    registry: Rc<RefCell<Registry>>,
    effects: SharedEffects,
}

impl<C: Connector> ReconnectingTransport<C> {
    /// Start connecting to `url` immediately.
    pub fn new(connector: C, url: Url, effects: SharedEffects) -> Self {
        Self::open_at(connector, url, effects, DEFAULT_RECONNECT_DELAY, Instant::now())
    }

    /// Start connecting at the given instant with a custom reconnect delay.
    pub fn open_at(
        connector: C,
        url: Url,
        effects: SharedEffects,
        reconnect_delay: Duration,
        now: Instant,
    ) -> Self {
        let mut transport = Self {
            connector,
            url,
            link: Link::Closed { retry_at: None },
            generation: 0,
            has_opened: false,
            reconnect_delay,
            registry: Rc::new(RefCell::new(Registry::default())),
            effects,
        };
        transport.open_link(now);
        transport
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        match self.link {
            Link::Connecting { .. } => ConnectionState::Connecting,
            Link::Open { .. } => ConnectionState::Open,
            Link::Closed { .. } => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Number of the current (or last) connection attempt, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When the next connection attempt is due, if one is scheduled.
    pub fn next_retry(&self) -> Option<Instant> {
        match self.link {
            Link::Closed { retry_at } => retry_at,
            _ => None,
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(self.link, Link::Closed { retry_at: None })
    }

    /// Register a listener for as long as the returned guard lives.
    pub fn subscribe<L: TransportListener + 'static>(
        &mut self,
        listener: Rc<RefCell<L>>,
    ) -> Subscription {
        let listener: SharedListener = listener;
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.listeners.push((id, listener));
        Subscription {
            registry: Rc::downgrade(&self.registry),
            id,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registry.borrow().listeners.len()
    }

    /// Send a text frame if the connection is open.
    pub fn send(&mut self, text: &str) -> SendOutcome {
        let Link::Open { handle, generation } = &mut self.link else {
            log::debug!("dropping frame while {:?}", self.state());
            return SendOutcome::Dropped;
        };
        match handle.send(text) {
            Ok(()) => {
                log::debug!("sent {} bytes on generation {}", text.len(), generation);
                self.effects.play(Cue::Sent);
                SendOutcome::Sent
            }
            Err(e) => {
                log::error!("send on generation {} failed: {}", generation, e);
                SendOutcome::Dropped
            }
        }
    }

    /// Process pending connection events and fire the reconnect timer.
    pub fn poll(&mut self) {
        self.poll_at(Instant::now());
    }

    pub fn poll_at(&mut self, now: Instant) {
        if let Link::Closed {
            retry_at: Some(retry_at),
        } = self.link
        {
            if now >= retry_at {
                self.open_link(now);
            }
        }

        let events = match &mut self.link {
            Link::Connecting { handle, .. } | Link::Open { handle, .. } => handle.poll_events(),
            Link::Closed { .. } => return,
        };
        for event in events {
            match event {
                LinkEvent::Opened => self.handle_opened(),
                LinkEvent::Frame(text) => self.handle_frame(&text),
                LinkEvent::Closed => {
                    // Anything after Closed belongs to a dead handle.
                    self.handle_closed(now);
                    break;
                }
            }
        }
    }

    /// Close the connection and stop reconnecting.
    pub fn shutdown(&mut self) {
        let link = std::mem::replace(&mut self.link, Link::Closed { retry_at: None });
        if let Link::Connecting { mut handle, .. } | Link::Open { mut handle, .. } = link {
            handle.close();
        }
        log::info!("transport to {} shut down", self.url);
    }

    fn open_link(&mut self, now: Instant) {
        self.generation += 1;
        let generation = self.generation;
        log::info!("connecting to {} (generation {})", self.url, generation);
        self.link = match self.connector.open(&self.url) {
            Ok(handle) => Link::Connecting { handle, generation },
            Err(e) => {
                log::error!("connection to {} failed: {}", self.url, e);
                Link::Closed {
                    retry_at: Some(now + self.reconnect_delay),
                }
            }
        };
    }

    fn handle_opened(&mut self) {
        let link = std::mem::replace(&mut self.link, Link::Closed { retry_at: None });
        let Link::Connecting {
            mut handle,
            generation,
        } = link
        else {
            self.link = link;
            return;
        };

        let mut outbox = Outbox::default();
        let reconnect = self.has_opened;
        if reconnect {
            self.dispatch(|listener| listener.on_reconnect(&mut outbox));
        } else {
            self.dispatch(|listener| listener.on_connect(&mut outbox));
        }
        for frame in &outbox.frames {
            match handle.send(frame) {
                Ok(()) => self.effects.play(Cue::Sent),
                Err(e) => log::error!("replay on generation {} failed: {}", generation, e),
            }
        }
        log::info!(
            "{} {} (generation {}, {} frames replayed)",
            if reconnect { "reconnected to" } else { "connected to" },
            self.url,
            generation,
            outbox.frames.len()
        );

        self.has_opened = true;
        self.link = Link::Open { handle, generation };
    }

    fn handle_frame(&mut self, text: &str) {
        if !self.is_open() {
            log::debug!("ignoring frame received while {:?}", self.state());
            return;
        }
        log::debug!("received {} bytes", text.len());
        self.effects.play(Cue::Received);
        self.dispatch(|listener| listener.on_message(text));
    }

    fn handle_closed(&mut self, now: Instant) {
        let retry_at = now + self.reconnect_delay;
        let link = std::mem::replace(
            &mut self.link,
            Link::Closed {
                retry_at: Some(retry_at),
            },
        );
        if let Link::Connecting { mut handle, generation } | Link::Open { mut handle, generation } =
            link
        {
            handle.close();
            log::info!(
                "connection generation {} closed; retrying in {:?}",
                generation,
                self.reconnect_delay
            );
        }
        self.dispatch(|listener| listener.on_close());
    }

    /// Call `f` on every listener registered now and still registered when
    /// its turn comes.
    fn dispatch(&self, mut f: impl FnMut(&mut (dyn TransportListener + 'static))) {
        let snapshot: Vec<(u64, SharedListener)> = self.registry.borrow().listeners.clone();
        for (id, listener) in snapshot {
            if !self.registry.borrow().contains(id) {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut listener) => f(&mut *listener),
                Err(_) => log::warn!("listener {} is busy; event skipped", id),
            }
        }
    }
}

impl<C: Connector> Drop for ReconnectingTransport<C> {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            self.shutdown();
        }
    }
}

// ============================================================================
// Native WebSocket Client
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use tungstenite::{Message, WebSocket};

    /// Read timeout while the loop is running, so queued sends are serviced.
    const READ_POLL: Duration = Duration::from_millis(50);
    const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Commands sent to the WebSocket thread.
    enum WsCommand {
        Send(String),
        Close,
    }

    /// Opens [`NativeConnection`]s.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NativeConnector;

    impl Connector for NativeConnector {
        type Handle = NativeConnection;

        fn open(&mut self, url: &Url) -> TransportResult<NativeConnection> {
            NativeConnection::spawn(url.clone())
        }
    }

    /// One WebSocket connection served by a background thread.
    pub struct NativeConnection {
        /// Channel to send commands to the WebSocket thread.
        cmd_tx: Option<Sender<WsCommand>>,
        /// Channel to receive events from the WebSocket thread.
        event_rx: Option<Receiver<LinkEvent>>,
        _thread: Option<JoinHandle<()>>,
    }

    impl NativeConnection {
        fn spawn(url: Url) -> TransportResult<Self> {
            let (cmd_tx, cmd_rx) = channel::<WsCommand>();
            let (event_tx, event_rx) = channel::<LinkEvent>();

            let handle = thread::Builder::new()
                .name("pictonote-ws".to_string())
                .spawn(move || run_socket(url, cmd_rx, event_tx))
                .map_err(|e| TransportError::Connect(e.to_string()))?;

            Ok(Self {
                cmd_tx: Some(cmd_tx),
                event_rx: Some(event_rx),
                _thread: Some(handle),
            })
        }
    }

    impl ConnectionHandle for NativeConnection {
        fn send(&mut self, text: &str) -> TransportResult<()> {
            match &self.cmd_tx {
                Some(tx) => tx
                    .send(WsCommand::Send(text.to_string()))
                    .map_err(|e| TransportError::Send(e.to_string())),
                None => Err(TransportError::Send("not connected".to_string())),
            }
        }

        fn poll_events(&mut self) -> Vec<LinkEvent> {
            let Some(rx) = &self.event_rx else {
                return Vec::new();
            };
            let mut events = Vec::new();
            loop {
                match rx.try_recv() {
                    Ok(event) => events.push(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        // Thread died without reporting; treat as a close.
                        if events.last() != Some(&LinkEvent::Closed) {
                            events.push(LinkEvent::Closed);
                        }
                        self.event_rx = None;
                        break;
                    }
                }
            }
            events
        }

        fn close(&mut self) {
            if let Some(tx) = self.cmd_tx.take() {
                let _ = tx.send(WsCommand::Close);
            }
            // Detach so a stale thread cannot deliver into a newer generation.
            self.event_rx = None;
            self._thread = None;
        }
    }

    impl Drop for NativeConnection {
        fn drop(&mut self) {
            self.close();
        }
    }

    /// Connect the TCP stream ourselves so its timeouts can be set directly.
    fn open_socket(url: &Url) -> Result<WebSocket<TcpStream>, String> {
        let addrs = url.socket_addrs(|| Some(80)).map_err(|e| e.to_string())?;
        let tcp = TcpStream::connect(&addrs[..]).map_err(|e| e.to_string())?;
        tcp.set_read_timeout(Some(HANDSHAKE_TIMEOUT))
            .map_err(|e| e.to_string())?;
        tcp.set_write_timeout(Some(WRITE_TIMEOUT))
            .map_err(|e| e.to_string())?;

        let (mut socket, response) =
            tungstenite::client(url.as_str(), tcp).map_err(|e| e.to_string())?;
        log::info!("WebSocket connected, status: {}", response.status());

        socket
            .get_mut()
            .set_read_timeout(Some(READ_POLL))
            .map_err(|e| e.to_string())?;
        Ok(socket)
    }

    fn run_socket(url: Url, cmd_rx: Receiver<WsCommand>, event_tx: Sender<LinkEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);

        let mut socket = match open_socket(&url) {
            Ok(socket) => socket,
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = event_tx.send(LinkEvent::Closed);
                return;
            }
        };

        let _ = event_tx.send(LinkEvent::Opened);

        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(msg)) => {
                    log::debug!("WebSocket sending: {}", preview(&msg));
                    if let Err(e) = socket.send(Message::Text(msg)) {
                        log::error!("WebSocket send error: {}", e);
                        break;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    break;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("WebSocket command channel disconnected");
                    break;
                }
                Err(TryRecvError::Empty) => {}
            }

            match socket.read() {
                Ok(Message::Text(txt)) => {
                    log::debug!("WebSocket received: {}", preview(&txt));
                    if event_tx.send(LinkEvent::Frame(txt)).is_err() {
                        break;
                    }
                }
                Ok(Message::Ping(data)) => {
                    let _ = socket.send(Message::Pong(data));
                }
                Ok(Message::Close(_)) => {
                    log::info!("WebSocket received close frame");
                    break;
                }
                Ok(_) => {}
                Err(tungstenite::Error::Io(ref e))
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(e) => {
                    log::error!("WebSocket read error: {}", e);
                    break;
                }
            }
        }

        log::info!("WebSocket thread exiting");
        let _ = event_tx.send(LinkEvent::Closed);
    }

    /// First 100 bytes of a frame, cut on a char boundary.
    fn preview(text: &str) -> &str {
        let mut end = text.len().min(100);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        &text[..end]
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::{NativeConnection, NativeConnector};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory connector whose connections are driven by the test.

    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;

    #[derive(Debug, Default)]
    pub(crate) struct MockWire {
        pub sent: Vec<String>,
        pub events: VecDeque<LinkEvent>,
        pub closed: bool,
    }

    pub(crate) struct MockHandle(Rc<RefCell<MockWire>>);

    impl ConnectionHandle for MockHandle {
        fn send(&mut self, text: &str) -> TransportResult<()> {
            let mut wire = self.0.borrow_mut();
            if wire.closed {
                return Err(TransportError::Send("closed".to_string()));
            }
            wire.sent.push(text.to_string());
            Ok(())
        }

        fn poll_events(&mut self) -> Vec<LinkEvent> {
            self.0.borrow_mut().events.drain(..).collect()
        }

        fn close(&mut self) {
            self.0.borrow_mut().closed = true;
        }
    }

    #[derive(Clone, Default)]
    pub(crate) struct MockConnector {
        wires: Rc<RefCell<Vec<Rc<RefCell<MockWire>>>>>,
        fail_next: Rc<Cell<bool>>,
    }

    impl MockConnector {
        pub fn connections(&self) -> usize {
            self.wires.borrow().len()
        }

        pub fn wire(&self, index: usize) -> Rc<RefCell<MockWire>> {
            self.wires.borrow()[index].clone()
        }

        pub fn latest(&self) -> Rc<RefCell<MockWire>> {
            let wires = self.wires.borrow();
            wires[wires.len() - 1].clone()
        }

        pub fn push(&self, index: usize, event: LinkEvent) {
            self.wire(index).borrow_mut().events.push_back(event);
        }

        pub fn sent(&self, index: usize) -> Vec<String> {
            self.wire(index).borrow().sent.clone()
        }

        pub fn fail_next(&self) {
            self.fail_next.set(true);
        }
    }

    impl Connector for MockConnector {
        type Handle = MockHandle;

        fn open(&mut self, _url: &Url) -> TransportResult<MockHandle> {
            if self.fail_next.replace(false) {
                return Err(TransportError::Connect("refused".to_string()));
            }
            let wire = Rc::new(RefCell::new(MockWire::default()));
            self.wires.borrow_mut().push(wire.clone());
            Ok(MockHandle(wire))
        }
    }

    pub(crate) fn endpoint() -> Url {
        Url::parse("ws://relay.test/ws").unwrap()
    }
}
