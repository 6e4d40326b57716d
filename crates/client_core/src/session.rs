//! Session controller.
//!
//! [`SessionCore`] is the single writer for timeline, typing, roster,
//! status and identity. [`spawn_session`] runs it as one actor task and
//! hands back a [`SessionHandle`]; every state change is published as a
//! [`SessionEvent`] on a broadcast channel.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{Timestamp, Username},
    protocol::{ClientRequest, JoinResult, ServerEvent},
};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::{debug, error, info, warn};

use crate::{
    config::ClientSettings,
    error::SessionError,
    roster::{Roster, RosterEntry},
    timeline::{ChatEntry, Timeline},
    transport::{ConnectionId, Transport, TransportEvent, TransportEventKind, TransportLink},
    typing::{TypingAggregator, TypingDebounce},
};

pub const MAX_MESSAGE_CHARS: usize = 500;
const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    Joined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub identity: Option<String>,
    pub timeline: Arc<Vec<ChatEntry>>,
    pub typists: Vec<String>,
    pub typing_indicator: Option<String>,
    pub roster: Vec<RosterEntry>,
}

impl SessionSnapshot {
    pub fn is_own(&self, entry: &ChatEntry) -> bool {
        entry.is_own(self.identity.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.identity.is_none()
            && self.timeline.is_empty()
            && self.typists.is_empty()
            && self.roster.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Changed(Arc<SessionSnapshot>),
    Error(SessionError),
}

pub struct SessionCore {
    transport: Box<dyn Transport>,
    transport_events: mpsc::UnboundedSender<TransportEvent>,
    events: broadcast::Sender<SessionEvent>,
    next_connection: ConnectionId,
    live_connection: Option<ConnectionId>,
    status: SessionStatus,
    identity: Option<Username>,
    pending_join: Option<Username>,
    history_loaded: bool,
    timeline: Timeline,
    typing: TypingAggregator,
    roster: Roster,
    debounce: TypingDebounce,
    typing_expiry: Option<Duration>,
}

impl SessionCore {
    pub fn new(
        settings: &ClientSettings,
        transport: Box<dyn Transport>,
        transport_events: mpsc::UnboundedSender<TransportEvent>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            transport,
            transport_events,
            events,
            next_connection: 1,
            live_connection: None,
            status: SessionStatus::Disconnected,
            identity: None,
            pending_join: None,
            history_loaded: false,
            timeline: Timeline::new(),
            typing: TypingAggregator::new(),
            roster: Roster::new(),
            debounce: TypingDebounce::new(settings.typing_debounce),
            typing_expiry: settings.typing_expiry,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_ref().map(Username::as_str)
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let identity = self.identity().map(str::to_string);
        SessionSnapshot {
            status: self.status,
            roster: self.roster.entries(identity.as_deref()),
            identity,
            timeline: self.timeline.shared(),
            typists: self.typing.typists(),
            typing_indicator: self.typing.indicator(),
        }
    }

    /// Starts a connection when disconnected; otherwise a no-op.
    pub fn connect(&mut self) {
        if self.status != SessionStatus::Disconnected {
            debug!(status = ?self.status, "connect ignored; connection already live");
            return;
        }
        let connection = self.next_connection;
        self.next_connection += 1;
        self.live_connection = Some(connection);
        self.status = SessionStatus::Connecting;
        info!(connection, "connecting");
        self.transport
            .open(TransportLink::new(connection, self.transport_events.clone()));
        self.publish();
    }

    pub fn join(&mut self, username: Username) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::Connected => {}
            SessionStatus::Joined => {
                return Err(SessionError::AlreadyJoined(
                    self.identity().unwrap_or_default().to_string(),
                ))
            }
            SessionStatus::Disconnected | SessionStatus::Connecting => {
                return Err(SessionError::NotConnected)
            }
        }
        self.send(ClientRequest::Join(username.to_string()))?;
        info!(username = %username, "join requested");
        self.pending_join = Some(username);
        Ok(())
    }

    pub fn send_message(&mut self, body: &str) -> Result<(), SessionError> {
        self.require_joined()?;
        let body = body.trim();
        if body.is_empty() {
            return Err(SessionError::InvalidMessage("message is empty"));
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SessionError::InvalidMessage(
                "message exceeds 500 characters",
            ));
        }
        if let Some(stop) = self.debounce.stop() {
            self.send(stop)?;
        }
        self.send(ClientRequest::ChatMessage {
            message: body.to_string(),
        })
    }

    pub fn keystroke(&mut self, now: Instant) -> Result<(), SessionError> {
        self.require_joined()?;
        match self.debounce.keystroke(now) {
            Some(start) => self.send(start),
            None => Ok(()),
        }
    }

    /// Tears the session down in one step. Leaving while disconnected is a
    /// no-op.
    pub fn leave(&mut self) {
        if self.status == SessionStatus::Disconnected {
            return;
        }
        info!(identity = ?self.identity(), "leaving session");
        self.teardown();
    }

    pub fn handle_transport(&mut self, event: TransportEvent, now: Instant) {
        if self.live_connection != Some(event.connection) {
            debug!(
                connection = event.connection,
                live = ?self.live_connection,
                "dropping event from retired connection"
            );
            return;
        }
        match event.kind {
            TransportEventKind::Connected => {
                if self.status == SessionStatus::Connecting {
                    info!(connection = event.connection, "connected");
                    self.status = SessionStatus::Connected;
                    self.publish();
                }
            }
            TransportEventKind::Event(server_event) => self.handle_server_event(server_event, now),
            TransportEventKind::Malformed(reason) => {
                self.report(SessionError::Server(format!("invalid server event: {reason}")));
            }
            TransportEventKind::Disconnected => {
                warn!(connection = event.connection, "server closed the connection");
                self.teardown();
                self.report(SessionError::Disconnected);
            }
            TransportEventKind::Failed(reason) => {
                error!(connection = event.connection, %reason, "transport failure");
                self.teardown();
                self.report(SessionError::Transport(reason));
            }
        }
    }

    fn handle_server_event(&mut self, event: ServerEvent, now: Instant) {
        debug!(event = event.name(), "server event");
        match event {
            ServerEvent::Join(result) => return self.handle_join_result(result),
            ServerEvent::Error(err) => return self.report(SessionError::Server(err.message)),
            _ => {}
        }
        if !matches!(
            self.status,
            SessionStatus::Connected | SessionStatus::Joined
        ) {
            debug!(status = ?self.status, "dropping chat event outside a connection");
            return;
        }

        let received_at = Timestamp::now();
        let changed = match event {
            ServerEvent::Message(data) => {
                self.timeline
                    .append_live(ChatEntry::message(data, received_at));
                true
            }
            ServerEvent::MessageHistory(history) => {
                if self.history_loaded {
                    warn!(entries = history.len(), "ignoring repeated message history");
                    false
                } else {
                    self.history_loaded = true;
                    info!(entries = history.len(), "loading message history");
                    self.timeline.load_history(
                        history
                            .into_iter()
                            .map(|data| ChatEntry::message(data, received_at)),
                    );
                    true
                }
            }
            ServerEvent::UserJoined(data) | ServerEvent::UserLeft(data) => {
                self.timeline
                    .append_live(ChatEntry::notification(data, received_at));
                true
            }
            ServerEvent::UpdateUsersList(users) => self.roster.replace(users),
            ServerEvent::UserTyping(typing) => {
                self.typing
                    .set_typing(&typing.username, typing.is_typing, now)
            }
            ServerEvent::Join(_) | ServerEvent::Error(_) => false,
        };
        if changed {
            self.publish();
        }
    }

    fn handle_join_result(&mut self, result: JoinResult) {
        let Some(username) = self.pending_join.take() else {
            warn!(success = result.success, "join result without a pending join");
            return;
        };
        if !result.success {
            warn!(username = %username, reason = %result.message, "join rejected");
            self.report(SessionError::Rejected(result.message));
            return;
        }
        if self.status != SessionStatus::Connected {
            warn!(status = ?self.status, "join accepted outside connected state");
            return;
        }
        info!(username = %username, "joined");
        self.identity = Some(username);
        self.status = SessionStatus::Joined;
        self.publish();
    }

    /// Earliest pending timer: the typing-stop debounce or a typing expiry.
    pub fn next_deadline(&self) -> Option<Instant> {
        let expiry = self
            .typing_expiry
            .and_then(|ttl| self.typing.next_expiry(ttl));
        match (self.debounce.deadline(), expiry) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn fire_timers(&mut self, now: Instant) {
        if let Some(stop) = self.debounce.poll(now) {
            if let Err(err) = self.send(stop) {
                self.report(err);
            }
        }
        if let Some(ttl) = self.typing_expiry {
            let expired = self.typing.expire(now, ttl);
            if !expired.is_empty() {
                debug!(?expired, "typing indicators expired locally");
                self.publish();
            }
        }
    }

    fn require_joined(&self) -> Result<(), SessionError> {
        if self.status == SessionStatus::Joined {
            Ok(())
        } else {
            Err(SessionError::NotJoined)
        }
    }

    fn send(&mut self, request: ClientRequest) -> Result<(), SessionError> {
        let name = request.name();
        self.transport.send(&request).map_err(|err| {
            warn!(event = name, error = %err, "failed to send");
            SessionError::Transport(err.to_string())
        })
    }

    fn teardown(&mut self) {
        self.debounce.cancel();
        if self.live_connection.take().is_some() {
            self.transport.close();
        }
        self.status = SessionStatus::Disconnected;
        self.identity = None;
        self.pending_join = None;
        self.history_loaded = false;
        self.timeline.clear();
        self.typing.clear();
        self.roster.clear();
        self.publish();
    }

    fn publish(&self) {
        let _ = self
            .events
            .send(SessionEvent::Changed(Arc::new(self.snapshot())));
    }

    fn report(&self, err: SessionError) {
        let _ = self.events.send(SessionEvent::Error(err));
    }
}

enum Command {
    Connect {
        reply: oneshot::Sender<()>,
    },
    Join {
        username: Username,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    SendMessage {
        body: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Keystroke {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable front for a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn connect(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Connect { reply }).await
    }

    /// Validates the username locally before anything is sent.
    pub async fn join(&self, username: &str) -> Result<(), SessionError> {
        let username = Username::parse(username)?;
        self.request(|reply| Command::Join { username, reply })
            .await?
    }

    pub async fn send_message(&self, body: &str) -> Result<(), SessionError> {
        let body = body.to_string();
        self.request(|reply| Command::SendMessage { body, reply })
            .await?
    }

    pub async fn keystroke(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Keystroke { reply }).await?
    }

    pub async fn leave(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Leave { reply }).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Leaves and stops the actor; later calls on any clone fail with
    /// [`SessionError::Closed`].
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

/// Runs a session actor that owns `transport`.
pub fn spawn_session(
    settings: &ClientSettings,
    transport: Box<dyn Transport>,
) -> (SessionHandle, JoinHandle<()>) {
    let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (events, _) = broadcast::channel(settings.event_buffer.max(1));
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let core = SessionCore::new(settings, transport, transport_tx, events.clone());
    let task = tokio::spawn(run_session(core, command_rx, transport_rx));
    (SessionHandle { commands, events }, task)
}

async fn run_session(
    mut core: SessionCore,
    mut commands: mpsc::Receiver<Command>,
    mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    loop {
        let deadline = core.next_deadline();
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if !apply_command(&mut core, command) {
                    break;
                }
            }
            Some(event) = transport_events.recv() => core.handle_transport(event, Instant::now()),
            () = wait_until(deadline) => core.fire_timers(Instant::now()),
        }
    }
    core.leave();
    debug!("session task stopped");
}

/// Returns false once the actor should stop.
fn apply_command(core: &mut SessionCore, command: Command) -> bool {
    match command {
        Command::Connect { reply } => {
            core.connect();
            let _ = reply.send(());
        }
        Command::Join { username, reply } => {
            let _ = reply.send(core.join(username));
        }
        Command::SendMessage { body, reply } => {
            let _ = reply.send(core.send_message(&body));
        }
        Command::Keystroke { reply } => {
            let _ = reply.send(core.keystroke(Instant::now()));
        }
        Command::Leave { reply } => {
            core.leave();
            let _ = reply.send(());
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(core.snapshot());
        }
        Command::Shutdown { reply } => {
            core.leave();
            let _ = reply.send(());
            return false;
        }
    }
    true
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
