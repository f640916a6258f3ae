//! Application context: owns every component and runs the event loop
//!
//! All input (pushes, connection status, pointer gestures, navigation,
//! timers, finished requests) arrives as an [`AppEvent`] on one channel and
//! is handled to completion before the next one. Network round-trips are
//! spawned as tasks that post their result back as another event.

use std::future::Future;
use std::time::Instant;

use tokio::sync::mpsc;

use slay_core::{
    compose_frame, BoardSnapshot, DefaultPalette, GeometryEngine, HexCell, HexLayout, HighlightSet,
    InteractionState, LegalActionSet, PlayerId, Point, PurchasePanel, Region, RenderFrame, UnitType, Viewport,
};

use crate::api::{ApiError, HttpGameApi, LiveState, SnapshotFrame};
use crate::config::{ClientConfig, ConfigError};
use crate::protocol::{ActionOutcome, MessageKind, NextTurnOutcome, ServerMessage, SpeedPreset};
use crate::sync::{Command, LivePush, ViewState, ViewSyncController};
use crate::transport::{ConnectionStatus, Dispatcher, Transport, TransportError, TransportHandle};

/// Presentation collaborator driven by the context
pub trait UiSink {
    fn render(&mut self, board: &BoardSnapshot, highlights: &HighlightSet, frame: &RenderFrame);

    fn interaction_state_changed(&mut self, state: &InteractionState);

    fn connection_status_changed(&mut self, connected: bool);

    fn view_changed(&mut self, _view: &ViewState) {}

    fn show_purchase_panel(&mut self, _panel: &PurchasePanel) {}

    fn show_info_panel(&mut self, _cell: &HexCell) {}

    fn game_over(&mut self, _winner: PlayerId, _name: &str) {}
}

#[derive(Debug)]
pub enum AppEvent {
    // Server
    Push(ServerMessage),
    Connection(ConnectionStatus),

    // Pointer and viewport
    Click(Point),
    DragStart(Point),
    DragMove(Point),
    DragEnd,
    Zoom { factor: f64, anchor: Point },
    ResetView,
    Resize { width: f64, height: f64 },

    // Human turn
    BuyUnit { unit_type: UnitType, region: Region },
    Cancel,
    EndTurn,

    // Navigation and game control
    NavigateTo(u32),
    StepBack,
    StepForward,
    JumpToFirst,
    ReturnToLive,
    NextTurn,
    ConfirmExpired,
    Autoplay,
    Pause,
    SetSpeed(SpeedPreset),

    // Completed requests
    InitialState(Result<LiveState, ApiError>),
    SnapshotLoaded { target: u32, result: Result<SnapshotFrame, ApiError> },
    LegalActionsLoaded { epoch: u32, result: Result<LegalActionSet, ApiError> },
    ActionFinished { epoch: u32, result: Result<ActionOutcome, ApiError> },
    NextTurnFinished(Result<NextTurnOutcome, ApiError>),
    ControlFinished { what: &'static str, result: Result<(), ApiError> },

    Shutdown,
}

pub struct AppContext<S: UiSink> {
    config: ClientConfig,
    api: HttpGameApi,
    geometry: GeometryEngine,
    sync: ViewSyncController,
    sink: S,
    transport: Option<TransportHandle>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl<S: UiSink> AppContext<S> {
    pub fn new(config: ClientConfig, sink: S) -> Result<Self, ConfigError> {
        config.validate()?;
        let geometry = GeometryEngine::new(
            HexLayout::new(config.hex_size),
            Viewport::new(config.min_zoom, config.max_zoom),
            config.canvas_width,
            config.canvas_height,
        );
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            api: HttpGameApi::new(config.http_base()),
            sync: ViewSyncController::new(config.confirm_window),
            geometry,
            sink,
            transport: None,
            events_tx,
            events_rx,
            config,
        })
    }

    /// Channel for UI input
    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.events_tx.clone()
    }

    pub fn sync(&self) -> &ViewSyncController {
        &self.sync
    }

    pub fn geometry(&self) -> &GeometryEngine {
        &self.geometry
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Open the push connection and request the initial state
    pub fn connect(&mut self) -> Result<(), TransportError> {
        let url = self
            .config
            .ws_url()
            .map_err(|_| TransportError::InvalidUrl(self.config.server_url.clone()))?;

        let mut dispatcher = Dispatcher::new();
        for kind in MessageKind::ALL {
            let tx = self.events_tx.clone();
            dispatcher.on(kind, move |message| {
                if tx.send(AppEvent::Push(message.clone())).is_err() {
                    tracing::trace!("Event loop gone, push dropped");
                }
            });
        }

        let status_tx = self.events_tx.clone();
        let transport = Transport::new(url, self.config.reconnect, self.config.keepalive, dispatcher)?
            .on_status(move |status| {
                if status_tx.send(AppEvent::Connection(status)).is_err() {
                    tracing::trace!("Event loop gone, status dropped");
                }
            });
        self.transport = Some(transport.spawn());

        let api = self.api.clone();
        self.spawn(async move { AppEvent::InitialState(api.fetch_state().await) });
        Ok(())
    }

    /// Handle events until shutdown or until the connection is given up
    pub async fn run(&mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if !self.handle(event) {
                break;
            }
        }
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
    }

    // ========================================================================
    // EVENT HANDLING
    // ========================================================================

    /// Handle one event; false when the loop should stop
    pub fn handle(&mut self, event: AppEvent) -> bool {
        let commands = match event {
            AppEvent::Push(message) => self.on_push(message),
            AppEvent::Connection(status) => {
                self.sink.connection_status_changed(status.is_connected());
                if status == ConnectionStatus::Disconnected {
                    tracing::warn!("Connection to {} given up", self.config.server_url);
                    return false;
                }
                Vec::new()
            }

            AppEvent::Click(point) => {
                let hex = self.sync.view().board().and_then(|b| self.geometry.pick(point, b));
                self.sync.pick(hex)
            }
            AppEvent::DragStart(point) => {
                self.geometry.viewport_mut().begin_drag(point);
                Vec::new()
            }
            AppEvent::DragMove(point) => {
                self.geometry.viewport_mut().drag_to(point);
                vec![Command::Render]
            }
            AppEvent::DragEnd => {
                self.geometry.viewport_mut().end_drag();
                Vec::new()
            }
            AppEvent::Zoom { factor, anchor } => {
                self.geometry.viewport_mut().zoom_at(factor, anchor);
                vec![Command::Render]
            }
            AppEvent::ResetView => {
                self.geometry.viewport_mut().reset();
                vec![Command::Render]
            }
            AppEvent::Resize { width, height } => {
                self.geometry.resize(width, height);
                vec![Command::Render]
            }

            AppEvent::BuyUnit { unit_type, region } => self.sync.begin_placement(unit_type, &region),
            AppEvent::Cancel => self.sync.cancel_interaction(),
            AppEvent::EndTurn => self.sync.end_turn(),

            AppEvent::NavigateTo(target) => self.sync.navigate_to(target),
            AppEvent::StepBack => self.sync.step_back(),
            AppEvent::StepForward => self.sync.step_forward(),
            AppEvent::JumpToFirst => self.sync.jump_to_first(),
            AppEvent::ReturnToLive => self.sync.return_to_live(),
            AppEvent::NextTurn => self.sync.request_next_turn(Instant::now()),
            AppEvent::ConfirmExpired => self.sync.confirm_expired(Instant::now()),
            AppEvent::Autoplay => {
                let api = self.api.clone();
                self.spawn(async move {
                    AppEvent::ControlFinished { what: "autoplay", result: api.request_run_autoplay().await }
                });
                Vec::new()
            }
            AppEvent::Pause => {
                let api = self.api.clone();
                self.spawn(async move { AppEvent::ControlFinished { what: "pause", result: api.request_pause().await } });
                Vec::new()
            }
            AppEvent::SetSpeed(preset) => {
                let api = self.api.clone();
                self.spawn(async move { AppEvent::ControlFinished { what: "speed", result: api.set_speed(preset).await } });
                Vec::new()
            }

            AppEvent::InitialState(result) => match result {
                Ok(state) => self.sync.apply_initial_state(state),
                Err(e) => {
                    tracing::warn!("Initial state fetch failed: {}", e);
                    Vec::new()
                }
            },
            AppEvent::SnapshotLoaded { target, result } => match result {
                Ok(snapshot) => self.sync.snapshot_loaded(target, snapshot),
                Err(e) => {
                    tracing::warn!("Snapshot {} fetch failed: {}", target, e);
                    self.sync.snapshot_failed(target)
                }
            },
            AppEvent::LegalActionsLoaded { epoch, result } => match result {
                Ok(legal) => self.sync.legal_actions_loaded(epoch, legal),
                Err(e) => {
                    tracing::warn!("Legal action fetch failed: {}", e);
                    Vec::new()
                }
            },
            AppEvent::ActionFinished { epoch, result } => match result {
                Ok(outcome) => self.sync.action_finished(epoch, outcome.accepted),
                Err(e) => {
                    tracing::warn!("Action request failed: {}", e);
                    self.sync.action_finished(epoch, false)
                }
            },
            AppEvent::NextTurnFinished(result) => match result {
                Ok(outcome) => self.sync.next_turn_finished(Some(outcome)),
                Err(e) => {
                    tracing::warn!("Next turn request failed: {}", e);
                    self.sync.next_turn_finished(None)
                }
            },
            AppEvent::ControlFinished { what, result } => {
                match result {
                    Ok(()) => tracing::info!("{} request accepted", what),
                    Err(e) => tracing::warn!("{} request failed: {}", what, e),
                }
                Vec::new()
            }

            AppEvent::Shutdown => return false,
        };

        self.execute(commands);
        true
    }

    fn on_push(&mut self, message: ServerMessage) -> Vec<Command> {
        match message {
            ServerMessage::State(push) => match LivePush::from_wire(push) {
                Ok(push) => self.sync.apply_push(push),
                Err(e) => {
                    tracing::warn!("Dropping state push: {}", e);
                    Vec::new()
                }
            },
            ServerMessage::NewGame(push) => match push.state.into_frame() {
                Ok(frame) => self.sync.apply_new_game(frame),
                Err(e) => {
                    tracing::warn!("Dropping new_game push: {}", e);
                    Vec::new()
                }
            },
            ServerMessage::TurnStart(turn) => {
                tracing::info!("Turn {}: {} ({})", turn.turn, turn.player_name, turn.player_type);
                Vec::new()
            }
            ServerMessage::Action(action) => {
                tracing::debug!("Player {} acted: {}", action.player, action.action);
                Vec::new()
            }
            ServerMessage::TerritoryDeaths(deaths) => {
                tracing::info!("{} units starved", deaths.deaths.len());
                Vec::new()
            }
            ServerMessage::GameOver(over) => self.sync.apply_game_over(over.winner, over.winner_name),
            ServerMessage::Error(err) => {
                tracing::warn!("Server error: {}", err.message);
                Vec::new()
            }
            ServerMessage::Pong => {
                tracing::trace!("pong");
                Vec::new()
            }
        }
    }

    // ========================================================================
    // COMMAND EXECUTION
    // ========================================================================

    fn execute(&mut self, commands: Vec<Command>) {
        let mut render = false;
        for command in commands {
            match command {
                Command::FetchSnapshot { target } => {
                    let api = self.api.clone();
                    self.spawn(async move {
                        AppEvent::SnapshotLoaded { target, result: api.fetch_snapshot(target).await }
                    });
                }
                Command::FetchLegalActions { epoch } => {
                    let api = self.api.clone();
                    self.spawn(async move {
                        AppEvent::LegalActionsLoaded { epoch, result: api.fetch_legal_actions().await }
                    });
                }
                Command::SubmitAction { action, epoch } => {
                    let api = self.api.clone();
                    self.spawn(async move {
                        AppEvent::ActionFinished { epoch, result: api.submit_action(&action).await }
                    });
                }
                Command::RequestNextTurn => {
                    let api = self.api.clone();
                    self.spawn(async move { AppEvent::NextTurnFinished(api.request_next_turn().await) });
                }
                Command::ScheduleConfirmExpiry { deadline } => {
                    self.spawn(async move {
                        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
                        AppEvent::ConfirmExpired
                    });
                }
                Command::Render => render = true,
                Command::InteractionChanged => self.sink.interaction_state_changed(self.sync.interaction().state()),
                Command::ViewChanged => self.sink.view_changed(self.sync.view()),
                Command::OpenPurchasePanel(panel) => self.sink.show_purchase_panel(&panel),
                Command::OpenInfoPanel(cell) => self.sink.show_info_panel(&cell),
                Command::GameOver { winner, name } => self.sink.game_over(winner, &name),
            }
        }
        if render {
            self.render();
        }
    }

    fn render(&mut self) {
        let Some(frame) = self.sync.view().frame.as_ref() else {
            return;
        };
        let mut players: Vec<_> = frame.roster.players().iter().collect();
        players.sort_by_key(|p| p.id);
        let palette = DefaultPalette::from_server_colors(players.iter().map(|p| p.color.as_str()));

        let highlights = self.sync.highlights();
        let transform = self.geometry.transform(&frame.board);
        let shapes = compose_frame(&frame.board, &highlights, &transform, self.geometry.layout(), &palette);
        self.sink.render(&frame.board, &highlights, &shapes);
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            if tx.send(task.await).is_err() {
                tracing::trace!("Event loop gone, result dropped");
            }
        });
    }
}
