//! Snapshot command - print one recorded turn
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: fetch_snapshot(), summarize()
//! - Level 3: (delegated to slay-client / slay-core)
//! - Level 4: argument validation

use anyhow::{Context, Result};
use clap::Args;
use serde_json::{json, Value};

use slay_client::{GameFrame, HttpGameApi, SnapshotFrame};
use slay_core::regions_of;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SnapshotArgs {
    /// Snapshot index (1 = first recorded turn)
    #[arg(long)]
    pub index: u32,

    /// Game server base URL
    #[arg(long, default_value = "http://127.0.0.1:7000")]
    pub server: String,

    /// Print the region summary as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run snapshot command
///
/// 1. Fetch the snapshot
/// 2. Print the board and the per-player region summary
pub fn run(args: SnapshotArgs) -> Result<()> {
    if args.index == 0 {
        anyhow::bail!("snapshot indices start at 1");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let snapshot = runtime.block_on(fetch_snapshot(&args))?;

    tracing::info!(
        "Snapshot {}/{} (game turn {})",
        snapshot.index,
        snapshot.max_snapshot,
        snapshot.frame.turn
    );

    if args.json {
        let text = serde_json::to_string_pretty(&summary_json(&snapshot.frame))?;
        println!("{}", text);
    } else {
        print!("{}", snapshot.frame.board.to_ascii());
        println!();
        print!("{}", summarize(&snapshot.frame));
    }
    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

async fn fetch_snapshot(args: &SnapshotArgs) -> Result<SnapshotFrame> {
    let api = HttpGameApi::new(&args.server);
    api.fetch_snapshot(args.index)
        .await
        .with_context(|| format!("failed to fetch snapshot {} from {}", args.index, args.server))
}

/// One line per player, then one indented line per region
fn summarize(frame: &GameFrame) -> String {
    let mut out = String::new();
    for player in frame.roster.players() {
        let ledger = frame.roster.ledger(player.id);
        let regions = regions_of(&frame.board, player.id, &ledger);
        let hexes: usize = regions.iter().map(|r| r.len()).sum();

        let marker = if player.id == frame.current_player { "*" } else { " " };
        let status = if player.eliminated { " (eliminated)" } else { "" };
        out.push_str(&format!(
            "{} {}{}: {} regions, {} hexes\n",
            marker,
            player.display_name(),
            status,
            regions.len(),
            hexes
        ));

        for region in &regions {
            let capital = region
                .capital
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            let buys: Vec<&str> = region.affordable_units().iter().map(|u| u.name()).collect();
            out.push_str(&format!(
                "    capital {:>7}  hexes {:>3}  gold {:>4}  income {:>3}  can buy: {}\n",
                capital,
                region.len(),
                region.gold,
                region.income,
                if buys.is_empty() { "-".to_string() } else { buys.join(", ") }
            ));
        }
    }
    out
}

fn summary_json(frame: &GameFrame) -> Value {
    let players: Vec<Value> = frame
        .roster
        .players()
        .iter()
        .map(|player| {
            let ledger = frame.roster.ledger(player.id);
            let regions: Vec<Value> = regions_of(&frame.board, player.id, &ledger)
                .iter()
                .map(|r| {
                    json!({
                        "capital": r.capital.map(|c| c.key()),
                        "hexes": r.len(),
                        "gold": r.gold,
                        "income": r.income,
                    })
                })
                .collect();
            json!({"id": player.id, "name": player.display_name(), "regions": regions})
        })
        .collect();
    json!({"turn": frame.turn, "current_player": frame.current_player, "players": players})
}

// ============================================================================
// TESTS
// ============================================================================
