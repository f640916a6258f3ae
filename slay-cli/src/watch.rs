//! Watch command - follow a game headlessly
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: configure_client(), watch()
//! - Level 3: LogSink (UI collaborator that logs instead of drawing)
//! - Level 4: configuration validation

use anyhow::{Context, Result};
use clap::Args;

use slay_client::{AppContext, AppEvent, ClientConfig, SpeedPreset, UiSink, ViewState};
use slay_core::{BoardSnapshot, HexCell, HighlightSet, InteractionState, PlayerId, PurchasePanel, RenderFrame};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct WatchArgs {
    /// Game server base URL
    #[arg(long, default_value = "http://127.0.0.1:7000")]
    pub server: String,

    /// Ask the server to run the game loop
    #[arg(long)]
    pub autoplay: bool,

    /// Autoplay speed preset (fast, normal, slow)
    #[arg(long)]
    pub speed: Option<SpeedPreset>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run watch command
///
/// 1. Build the client configuration
/// 2. Connect and follow the game until ctrl-c or the connection is given up
pub fn run(args: WatchArgs) -> Result<()> {
    let config = configure_client(&args)?;
    tracing::info!("Watching {}", config.server_url);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    runtime.block_on(watch(config, &args))
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn configure_client(args: &WatchArgs) -> Result<ClientConfig> {
    let config = ClientConfig::default().with_server_url(args.server.clone());
    config
        .validate()
        .with_context(|| format!("invalid server URL {}", args.server))?;
    Ok(config)
}

async fn watch(config: ClientConfig, args: &WatchArgs) -> Result<()> {
    let mut ctx = AppContext::new(config, LogSink::default())?;
    ctx.connect().context("failed to open the push connection")?;

    let events = ctx.sender();
    if let Some(preset) = args.speed {
        if events.send(AppEvent::SetSpeed(preset)).is_err() {
            tracing::trace!("Event loop gone, speed request dropped");
        }
    }
    if args.autoplay {
        if events.send(AppEvent::Autoplay).is_err() {
            tracing::trace!("Event loop gone, autoplay request dropped");
        }
    }

    let stop = ctx.sender();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            if stop.send(AppEvent::Shutdown).is_err() {
                tracing::trace!("Event loop gone, shutdown dropped");
            }
        }
    });

    ctx.run().await;

    let sink = ctx.sink();
    tracing::info!("Stopped after {} renders", sink.renders);
    if let Some((winner, name)) = &sink.winner {
        tracing::info!("Winner: {} (player {})", name, winner);
    }
    Ok(())
}

// ============================================================================
// LEVEL 3 - LOG SINK
// ============================================================================

/// Logs every view change in place of a display
#[derive(Default)]
struct LogSink {
    renders: usize,
    last_turn: Option<(u32, u32)>,
    winner: Option<(PlayerId, String)>,
}

impl UiSink for LogSink {
    fn render(&mut self, board: &BoardSnapshot, highlights: &HighlightSet, frame: &RenderFrame) {
        self.renders += 1;
        tracing::debug!(
            "Frame: {} hexes, {} highlighted, zoom {:.2}",
            board.len(),
            highlights.len(),
            frame.zoom
        );
    }

    fn interaction_state_changed(&mut self, state: &InteractionState) {
        tracing::debug!("Interaction: {:?}", state);
    }

    fn connection_status_changed(&mut self, connected: bool) {
        if connected {
            tracing::info!("Connected");
        } else {
            tracing::info!("Not connected");
        }
    }

    fn view_changed(&mut self, view: &ViewState) {
        let position = (view.turn_index, view.max_turn_index);
        if self.last_turn == Some(position) {
            return;
        }
        self.last_turn = Some(position);

        let player = view
            .current_player()
            .zip(view.roster())
            .map(|(id, roster)| roster.name_of(id))
            .unwrap_or_else(|| "-".to_string());
        tracing::info!(
            "Turn {}/{}{}: {} to move{}",
            view.turn_index,
            view.max_turn_index,
            if view.is_live() { " (live)" } else { "" },
            player,
            if view.waiting_human.is_some() { ", waiting for human" } else { "" }
        );
    }

    fn show_purchase_panel(&mut self, panel: &PurchasePanel) {
        tracing::info!(
            "Region of {} hexes, gold {}: {} unit types affordable",
            panel.region.len(),
            panel.region.gold,
            panel.options.len()
        );
    }

    fn show_info_panel(&mut self, cell: &HexCell) {
        tracing::info!("Hex {}: {:?}", cell.coord, cell);
    }

    fn game_over(&mut self, winner: PlayerId, name: &str) {
        tracing::info!("Game over: {} wins", name);
        self.winner = Some((winner, name.to_string()));
    }
}

// ============================================================================
// TESTS
// ============================================================================
