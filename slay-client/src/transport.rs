//! Transport client: one logical websocket connection with bounded reconnect
//!
//! ## Architecture
//!
//! - [`Dispatcher`]: routes decoded push messages to listeners by type
//! - [`ReconnectPolicy`] / [`ReconnectSchedule`]: backoff arithmetic, no I/O
//! - [`Transport`]: the async run loop (connect, pump, keepalive, retry)
//!
//! Outbound frames are fire-and-forget. Status changes are reported through
//! a callback so the owner can surface them without polling.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol::{decode, ClientMessage, MessageKind, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("websocket URL must start with ws:// or wss://, got {0:?}")]
    InvalidUrl(String),

    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

// ============================================================================
// DISPATCH
// ============================================================================

type Listener = Box<dyn Fn(&ServerMessage) + Send + Sync>;

/// Per-type listener registry
#[derive(Default)]
pub struct Dispatcher {
    listeners: FxHashMap<MessageKind, Vec<Listener>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: MessageKind, listener: F)
    where
        F: Fn(&ServerMessage) + Send + Sync + 'static,
    {
        self.listeners.entry(kind).or_default().push(Box::new(listener));
    }

    /// Deliver to every listener of the message's type; returns how many ran
    pub fn dispatch(&self, message: &ServerMessage) -> usize {
        let Some(listeners) = self.listeners.get(&message.kind()) else {
            return 0;
        };
        for listener in listeners {
            listener(message);
        }
        listeners.len()
    }

    /// Decode and dispatch one text frame
    ///
    /// Unknown types are ignored; malformed known types are dropped whole.
    pub fn dispatch_text(&self, text: &str) -> usize {
        match decode(text) {
            Ok(Some(message)) => self.dispatch(&message),
            Ok(None) => {
                tracing::trace!("Ignoring unrecognized push: {}", truncate(text));
                0
            }
            Err(e) => {
                tracing::warn!("Dropping malformed push: {}", e);
                0
            }
        }
    }
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(120) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ============================================================================
// RECONNECT SCHEDULE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based): `base * 2^attempt`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconnectStep {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

/// Counts consecutive failures against a [`ReconnectPolicy`]
#[derive(Clone, Debug)]
pub struct ReconnectSchedule {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl ReconnectSchedule {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempts: 0 }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// The connection dropped or an attempt failed
    pub fn on_failure(&mut self) -> ReconnectStep {
        if self.attempts >= self.policy.max_attempts {
            return ReconnectStep::GiveUp;
        }
        self.attempts += 1;
        ReconnectStep::Retry {
            attempt: self.attempts,
            delay: self.policy.delay_for(self.attempts),
        }
    }
}

// ============================================================================
// CONNECTION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay: Duration },
    /// Attempts exhausted or the transport was shut down
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

type StatusListener = Box<dyn Fn(ConnectionStatus) + Send + Sync>;

pub struct Transport {
    url: String,
    policy: ReconnectPolicy,
    keepalive: Duration,
    dispatcher: Dispatcher,
    status_listener: Option<StatusListener>,
}

/// Handle to a running transport task
pub struct TransportHandle {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Queue a frame; false once the transport has stopped
    pub fn send(&self, message: ClientMessage) -> bool {
        self.outbound.send(message).is_ok()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Close the connection and wait for the task to end
    pub async fn shutdown(self) {
        drop(self.outbound);
        if let Err(e) = self.task.await {
            tracing::warn!("Transport task ended abnormally: {}", e);
        }
    }
}

enum PumpEnd {
    Lost,
    Shutdown,
}

impl Transport {
    pub fn new(
        url: impl Into<String>,
        policy: ReconnectPolicy,
        keepalive: Duration,
        dispatcher: Dispatcher,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(url));
        }
        Ok(Self {
            url,
            policy,
            keepalive,
            dispatcher,
            status_listener: None,
        })
    }

    pub fn on_status<F>(mut self, listener: F) -> Self
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        self.status_listener = Some(Box::new(listener));
        self
    }

    pub fn spawn(self) -> TransportHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        TransportHandle { outbound: tx, task }
    }

    fn emit(&self, status: ConnectionStatus) {
        tracing::info!("Connection status: {:?}", status);
        if let Some(listener) = &self.status_listener {
            listener(status);
        }
    }

    async fn run(self, mut outbound: mpsc::UnboundedReceiver<ClientMessage>) {
        let mut schedule = ReconnectSchedule::new(self.policy);
        self.emit(ConnectionStatus::Connecting);

        loop {
            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    schedule.on_connected();
                    self.emit(ConnectionStatus::Connected);
                    match self.pump(ws, &mut outbound).await {
                        PumpEnd::Shutdown => {
                            self.emit(ConnectionStatus::Disconnected);
                            return;
                        }
                        PumpEnd::Lost => tracing::warn!("Connection to {} lost", self.url),
                    }
                }
                Err(e) => tracing::warn!("Connect to {} failed: {}", self.url, e),
            }

            match schedule.on_failure() {
                ReconnectStep::Retry { attempt, delay } => {
                    tracing::info!(
                        "Reconnecting in {:?} (attempt {}/{})",
                        delay,
                        attempt,
                        self.policy.max_attempts
                    );
                    self.emit(ConnectionStatus::Reconnecting { attempt, delay });
                    if !wait_or_shutdown(delay, &mut outbound).await {
                        self.emit(ConnectionStatus::Disconnected);
                        return;
                    }
                }
                ReconnectStep::GiveUp => {
                    tracing::warn!("Giving up after {} reconnect attempts", schedule.attempts());
                    self.emit(ConnectionStatus::Disconnected);
                    return;
                }
            }
        }
    }

    async fn pump(&self, ws: WsStream, outbound: &mut mpsc::UnboundedReceiver<ClientMessage>) -> PumpEnd {
        let (mut sink, mut stream) = ws.split();
        let mut ticker = tokio::time::interval(self.keepalive);
        ticker.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.dispatcher.dispatch_text(&text);
                    }
                    Some(Ok(Message::Close(_))) | None => return PumpEnd::Lost,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Websocket read error: {}", e);
                        return PumpEnd::Lost;
                    }
                },
                queued = outbound.recv() => {
                    let Some(message) = queued else {
                        if let Err(e) = sink.send(Message::Close(None)).await {
                            tracing::debug!("Close frame not sent: {}", e);
                        }
                        return PumpEnd::Shutdown;
                    };
                    if let Err(e) = send_frame(&mut sink, &message).await {
                        tracing::warn!("Send failed: {}", e);
                        return PumpEnd::Lost;
                    }
                }
                _ = ticker.tick() => {
                    if let Err(e) = send_frame(&mut sink, &ClientMessage::Ping).await {
                        tracing::warn!("Keepalive failed: {}", e);
                        return PumpEnd::Lost;
                    }
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, message: &ClientMessage) -> Result<(), TransportError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message)?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Sleep for `delay`; false if the handle was dropped meanwhile
async fn wait_or_shutdown(delay: Duration, outbound: &mut mpsc::UnboundedReceiver<ClientMessage>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            queued = outbound.recv() => {
                if queued.is_none() {
                    return false;
                }
                tracing::debug!("Dropping outbound frame while disconnected");
            }
        }
    }
}
