//! Connection adapter: one bidirectional named-event channel to one server.

use futures::{SinkExt, StreamExt};
use shared::protocol::{ClientRequest, ServerEvent};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::TransportError;

/// Tags one `open` of a transport. Events from a retired id are stale.
pub type ConnectionId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEventKind {
    Connected,
    Event(ServerEvent),
    Malformed(String),
    Disconnected,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub connection: ConnectionId,
    pub kind: TransportEventKind,
}

/// Where a transport delivers inbound events for one connection.
#[derive(Debug, Clone)]
pub struct TransportLink {
    connection: ConnectionId,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportLink {
    pub fn new(connection: ConnectionId, events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { connection, events }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Returns false once the session side has gone away.
    pub fn emit(&self, kind: TransportEventKind) -> bool {
        self.events
            .send(TransportEvent {
                connection: self.connection,
                kind,
            })
            .is_ok()
    }
}

pub trait Transport: Send {
    /// Starts connecting; progress is reported through `link`. Any previous
    /// connection is closed first.
    fn open(&mut self, link: TransportLink);
    fn send(&mut self, request: &ClientRequest) -> Result<(), TransportError>;
    /// After this returns, nothing more is emitted for the closed connection.
    fn close(&mut self);
}

/// Rewrites an `http(s)` server URL to its `ws(s)` form.
pub fn websocket_url(server_url: &str) -> Result<Url, TransportError> {
    let invalid = || TransportError::InvalidUrl(server_url.to_string());
    let mut url = Url::parse(server_url.trim()).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|_| invalid())?;
    Ok(url)
}

enum Outbound {
    Frame(String),
    Close,
}

struct ActiveSocket {
    connection: ConnectionId,
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

pub struct WsTransport {
    url: Url,
    active: Option<ActiveSocket>,
}

impl WsTransport {
    pub fn new(server_url: &str) -> Result<Self, TransportError> {
        Ok(Self {
            url: websocket_url(server_url)?,
            active: None,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Transport for WsTransport {
    fn open(&mut self, link: TransportLink) {
        self.close();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let connection = link.connection();
        let task = tokio::spawn(run_socket(self.url.clone(), link, outbound_rx));
        self.active = Some(ActiveSocket {
            connection,
            outbound,
            task,
        });
    }

    fn send(&mut self, request: &ClientRequest) -> Result<(), TransportError> {
        let active = self.active.as_ref().ok_or(TransportError::NotOpen)?;
        let frame = request.encode()?;
        debug!(connection = active.connection, event = request.name(), "sending");
        active
            .outbound
            .send(Outbound::Frame(frame))
            .map_err(|_| TransportError::NotOpen)
    }

    fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        debug!(connection = active.connection, "closing websocket");
        if active.outbound.send(Outbound::Close).is_err() {
            active.task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}

async fn run_socket(
    url: Url,
    link: TransportLink,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
) {
    let connection = link.connection();
    let ws_stream = tokio::select! {
        biased;
        _ = wait_for_close(&mut outbound) => {
            debug!(connection, "websocket closed while connecting");
            return;
        }
        result = connect_async(url.as_str()) => match result {
            Ok((ws_stream, _)) => ws_stream,
            Err(err) => {
                link.emit(TransportEventKind::Failed(format!(
                    "failed to connect websocket {url}: {err}"
                )));
                return;
            }
        },
    };
    info!(connection, %url, "websocket connected");
    link.emit(TransportEventKind::Connected);

    let (mut ws_writer, mut ws_reader) = ws_stream.split();
    loop {
        tokio::select! {
            biased;
            next = outbound.recv() => match next {
                Some(Outbound::Frame(frame)) => {
                    if let Err(err) = ws_writer.send(Message::Text(frame)).await {
                        link.emit(TransportEventKind::Failed(format!(
                            "websocket send failed: {err}"
                        )));
                        return;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = ws_writer.send(Message::Close(None)).await;
                    debug!(connection, "websocket closed by client");
                    return;
                }
            },
            incoming = ws_reader.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let kind = match ServerEvent::decode(&text) {
                        Ok(event) => TransportEventKind::Event(event),
                        Err(err) => {
                            warn!(connection, error = %err, "dropping undecodable frame");
                            TransportEventKind::Malformed(err.to_string())
                        }
                    };
                    if !link.emit(kind) {
                        return;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(connection, "websocket closed by server");
                    link.emit(TransportEventKind::Disconnected);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    link.emit(TransportEventKind::Failed(format!(
                        "websocket receive failed: {err}"
                    )));
                    return;
                }
            },
        }
    }
}

/// Resolves when the owner asks to close; frames queued before the socket
/// is up are discarded.
async fn wait_for_close(outbound: &mut mpsc::UnboundedReceiver<Outbound>) {
    while let Some(next) = outbound.recv().await {
        if matches!(next, Outbound::Close) {
            return;
        }
        warn!("dropping frame queued before websocket connected");
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
