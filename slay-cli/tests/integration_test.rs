//! Integration tests for the Slay client stack
//!
//! Drives wire decoding, the view controller, interaction and territory
//! aggregation together, without a server.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use slay_client::{decode, ActionRequest, Command, LivePush, ServerMessage, ViewSyncController};
use slay_core::{
    compose_frame, region_at, DefaultPalette, GeometryEngine, Hex, HexLayout, InteractionState,
    LegalActionSet, UnitType, ValidMove, ValidPurchase, Viewport,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Six hexes for player 0 around a capital with 25 gold; player 1 to the east
fn state_json(turn: u32, gold: i64, units: &[(i32, i32)]) -> Value {
    let mut hexes = serde_json::Map::new();
    let mine = [(0, 0), (1, 0), (0, 1), (-1, 1), (-1, 0), (0, -1)];
    for (q, r) in mine {
        let unit = if units.contains(&(q, r)) {
            json!({"type": "peasant", "owner": 0, "strength": 1, "has_moved": false})
        } else {
            Value::Null
        };
        hexes.insert(
            format!("{},{}", q, r),
            json!({"q": q, "r": r, "terrain": "land", "owner": 0, "unit": unit, "has_capital": (q, r) == (0, 0)}),
        );
    }
    for (q, r) in [(2, 0), (2, -1)] {
        hexes.insert(
            format!("{},{}", q, r),
            json!({"q": q, "r": r, "terrain": "land", "owner": 1, "unit": null, "has_capital": false}),
        );
    }
    hexes.insert("1,1".to_string(), json!({"q": 1, "r": 1, "terrain": "sea", "owner": null, "unit": null}));

    json!({
        "turn": turn,
        "current_player": 0,
        "board": {"width": 4, "height": 3, "hexes": hexes},
        "players": [
            {"id": 0, "color": "#F0A8A8", "color_name": "Rose", "region_gold": {"0,0": gold}},
            {"id": 1, "color": "#A8C8F0", "color_name": "Sky", "region_gold": {}}
        ],
        "actions_this_turn": []
    })
}

fn state_push(max: u32, gold: i64, units: &[(i32, i32)]) -> LivePush {
    let text = json!({
        "type": "state",
        "state": state_json(max, gold, units),
        "waiting_for_human": 0,
        "game_running": false,
        "max_snapshot": max
    })
    .to_string();
    match decode(&text).unwrap() {
        Some(ServerMessage::State(push)) => LivePush::from_wire(push).unwrap(),
        other => panic!("unexpected {:?}", other),
    }
}

fn submitted(commands: &[Command]) -> Vec<ActionRequest> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::SubmitAction { action, .. } => Some(action.clone()),
            _ => None,
        })
        .collect()
}

// ============================================================================
// HUMAN TURN
// ============================================================================

#[test]
fn test_purchase_then_region_gold_drops() {
    let mut sync = ViewSyncController::new(Duration::from_millis(1500));
    sync.apply_push(state_push(4, 25, &[]));
    assert!(sync.interaction().is_enabled());

    let board = sync.view().board().unwrap().clone();
    let ledger = sync.view().roster().unwrap().ledger(0);
    let region = region_at(&board, Hex::new(1, 0), 0, &ledger).unwrap();
    assert_eq!((region.gold, region.income, region.len()), (25, 6, 6));

    sync.legal_actions_loaded(
        4,
        LegalActionSet::new(
            vec![],
            vec![ValidPurchase { at: Hex::new(1, 0), unit_type: UnitType::Peasant, cost: 10, is_attack: false }],
        ),
    );

    // Clicking own empty territory opens the purchase panel
    let commands = sync.pick(Some(Hex::new(1, 0)));
    let panel = commands
        .iter()
        .find_map(|c| match c {
            Command::OpenPurchasePanel(panel) => Some(panel.clone()),
            _ => None,
        })
        .unwrap();
    assert!(panel.options.contains(&UnitType::Peasant));
    assert!(!panel.options.contains(&UnitType::Knight));

    sync.begin_placement(UnitType::Peasant, &panel.region);
    let commands = sync.pick(Some(Hex::new(1, 0)));
    assert_eq!(submitted(&commands), vec![ActionRequest::buy(UnitType::Peasant, Hex::new(1, 0))]);

    // Server accepts; the new unit is selected and a fresh board arrives
    sync.action_finished(4, true);
    assert_eq!(sync.interaction().state(), &InteractionState::UnitSelected { origin: Hex::new(1, 0) });
    sync.apply_push(state_push(4, 15, &[(1, 0)]));

    let board = sync.view().board().unwrap().clone();
    let ledger = sync.view().roster().unwrap().ledger(0);
    let region = region_at(&board, Hex::new(0, 0), 0, &ledger).unwrap();
    assert_eq!((region.gold, region.income), (15, 6));
}

#[test]
fn test_move_reselects_only_while_server_allows() {
    let mut sync = ViewSyncController::new(Duration::from_millis(1500));
    sync.apply_push(state_push(2, 25, &[(1, 0)]));
    sync.legal_actions_loaded(
        2,
        LegalActionSet::new(
            vec![ValidMove { from: Hex::new(1, 0), to: Hex::new(0, 1), is_attack: false }],
            vec![],
        ),
    );

    sync.pick(Some(Hex::new(1, 0)));
    let commands = sync.pick(Some(Hex::new(0, 1)));
    assert_eq!(submitted(&commands), vec![ActionRequest::move_unit(Hex::new(1, 0), Hex::new(0, 1))]);

    let commands = sync.action_finished(2, true);
    assert!(commands.contains(&Command::FetchLegalActions { epoch: 2 }));

    // Refreshed set still lists the new square as an origin
    sync.legal_actions_loaded(
        2,
        LegalActionSet::new(vec![ValidMove { from: Hex::new(0, 1), to: Hex::new(-1, 1), is_attack: false }], vec![]),
    );
    assert_eq!(sync.interaction().state(), &InteractionState::UnitSelected { origin: Hex::new(0, 1) });
}

// ============================================================================
// RENDERING
// ============================================================================

#[test]
fn test_frame_and_picking_share_one_transform() {
    let mut sync = ViewSyncController::new(Duration::from_millis(1500));
    sync.apply_push(state_push(1, 25, &[(1, 0)]));
    sync.legal_actions_loaded(
        1,
        LegalActionSet::new(
            vec![
                ValidMove { from: Hex::new(1, 0), to: Hex::new(2, 0), is_attack: true },
                ValidMove { from: Hex::new(1, 0), to: Hex::new(0, 1), is_attack: false },
            ],
            vec![],
        ),
    );
    sync.pick(Some(Hex::new(1, 0)));

    let board = sync.view().board().unwrap();
    let mut engine = GeometryEngine::new(HexLayout::new(24.0), Viewport::new(0.25, 4.0), 800.0, 600.0);
    engine.viewport_mut().zoom_at(1.5, slay_core::Point::new(400.0, 300.0));
    let transform = engine.transform(board);
    let frame = compose_frame(board, &sync.highlights(), &transform, engine.layout(), &DefaultPalette::default());

    assert_eq!(frame.shapes.len(), board.len());
    for shape in &frame.shapes {
        assert_eq!(engine.pick(shape.center, board), Some(shape.coord));
    }
    let selected: Vec<_> = frame.shapes.iter().filter(|s| s.outline.is_some()).map(|s| s.coord).collect();
    assert_eq!(selected, vec![Hex::new(1, 0)]);
    assert_eq!(frame.shapes.iter().filter(|s| s.overlay.is_some()).count(), 2);
}

#[test]
fn test_ascii_view_of_pushed_board() {
    let push = state_push(1, 25, &[]);
    let ascii = push.frame.unwrap().board.to_ascii();
    assert!(ascii.contains('0'));
    assert!(ascii.contains('1'));
    assert!(ascii.contains('~'));
}

// ============================================================================
// HISTORY
// ============================================================================

#[test]
fn test_history_review_and_turn_execution() {
    let mut sync = ViewSyncController::new(Duration::from_millis(1500));
    sync.apply_push(state_push(5, 25, &[]));

    assert!(sync.step_back().contains(&Command::FetchSnapshot { target: 4 }));
    // Still showing the live turn while the fetch is pending
    let t0 = Instant::now();
    assert!(!sync.request_next_turn(t0).contains(&Command::RequestNextTurn));

    sync.return_to_live();
    assert!(sync.view().is_live());
    assert!(sync.interaction().is_enabled());

    // Late snapshot for the abandoned target is dropped
    let late = sync.snapshot_failed(4);
    assert!(late.is_empty());
}
