//! Slay Client - Networking and synchronization for the Slay board
//!
//! This crate connects the I/O-free core to the game server:
//! - Wire protocol for pushes and requests
//! - Websocket transport with bounded reconnect and keepalive
//! - HTTP request/response API (snapshots, legal actions, actions, turns)
//! - View synchronization controller (live vs. history, turn execution)
//! - Application context running the single-threaded event loop

pub mod api;
pub mod config;
pub mod context;
pub mod protocol;
pub mod sync;
pub mod transport;

pub use api::{ApiError, HttpGameApi, LiveState, SnapshotFrame};
pub use config::{ClientConfig, ConfigError};
pub use context::{AppContext, AppEvent, UiSink};
pub use protocol::{
    decode, ActionOutcome, ActionRequest, ClientMessage, GameFrame, GameStateWire, MessageKind,
    NextTurnOutcome, ProtocolError, ServerMessage, SpeedPreset, StatePush,
};
pub use sync::{Command, LivePush, ViewState, ViewSyncController};
pub use transport::{
    ConnectionStatus, Dispatcher, ReconnectPolicy, ReconnectSchedule, ReconnectStep, Transport,
    TransportError, TransportHandle,
};
