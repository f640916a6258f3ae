//! Wire protocol: push messages, outbound frames and request/response bodies
//!
//! Push messages are JSON objects tagged by `"type"`. Decoding distinguishes
//! three cases: a known message, an unknown tag (ignored), and a known tag
//! whose body doesn't parse (dropped whole by the caller).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use slay_core::{BoardError, BoardSnapshot, Hex, PlayerId, PlayerInfo, Roster, UnitType};

/// Errors raised while decoding an inbound frame
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("frame has no \"type\" tag")]
    MissingTag,

    #[error("malformed {kind:?} message: {source}")]
    Malformed {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// PUSH MESSAGES
// ============================================================================

/// Tags of the push messages this client understands
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    State,
    NewGame,
    TurnStart,
    Action,
    TerritoryDeaths,
    GameOver,
    Error,
    Pong,
}

impl MessageKind {
    pub const ALL: [MessageKind; 8] = [
        MessageKind::State,
        MessageKind::NewGame,
        MessageKind::TurnStart,
        MessageKind::Action,
        MessageKind::TerritoryDeaths,
        MessageKind::GameOver,
        MessageKind::Error,
        MessageKind::Pong,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            MessageKind::State => "state",
            MessageKind::NewGame => "new_game",
            MessageKind::TurnStart => "turn_start",
            MessageKind::Action => "action",
            MessageKind::TerritoryDeaths => "territory_deaths",
            MessageKind::GameOver => "game_over",
            MessageKind::Error => "error",
            MessageKind::Pong => "pong",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.tag() == tag)
    }
}

/// Full game state as serialized by the server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameStateWire {
    pub turn: u32,
    /// Index of the player whose turn it is
    pub current_player: PlayerId,
    pub board: BoardSnapshot,
    pub players: Vec<PlayerInfo>,
    #[serde(default)]
    pub actions_this_turn: Vec<Value>,
}

impl GameStateWire {
    /// Validate the player ledgers and freeze the state for sharing
    pub fn into_frame(self) -> Result<GameFrame, BoardError> {
        Ok(GameFrame {
            turn: self.turn,
            current_player: self.current_player,
            board: Arc::new(self.board),
            roster: Arc::new(Roster::new(self.players)?),
        })
    }
}

/// Decoded, immutable game state ready for display
#[derive(Clone, Debug)]
pub struct GameFrame {
    pub turn: u32,
    pub current_player: PlayerId,
    pub board: Arc<BoardSnapshot>,
    pub roster: Arc<Roster>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatePush {
    pub state: Option<GameStateWire>,
    #[serde(default)]
    pub waiting_for_human: Option<PlayerId>,
    #[serde(default)]
    pub game_running: bool,
    /// Latest snapshot index; the live turn index
    #[serde(default)]
    pub max_snapshot: u32,
    #[serde(default)]
    pub snapshot_player_id: Option<PlayerId>,
    #[serde(default)]
    pub snapshot_player_name: Option<String>,
    #[serde(default)]
    pub undone_to: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewGamePush {
    pub state: GameStateWire,
    #[serde(default)]
    pub config: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TurnStartPush {
    pub turn: u32,
    pub player: PlayerId,
    pub player_name: String,
    pub player_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionPush {
    pub player: PlayerId,
    pub action: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerritoryDeathsPush {
    pub deaths: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameOverPush {
    pub winner: PlayerId,
    #[serde(default)]
    pub winner_name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorPush {
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    State(StatePush),
    NewGame(NewGamePush),
    TurnStart(TurnStartPush),
    Action(ActionPush),
    TerritoryDeaths(TerritoryDeathsPush),
    GameOver(GameOverPush),
    Error(ErrorPush),
    Pong,
}

impl ServerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerMessage::State(_) => MessageKind::State,
            ServerMessage::NewGame(_) => MessageKind::NewGame,
            ServerMessage::TurnStart(_) => MessageKind::TurnStart,
            ServerMessage::Action(_) => MessageKind::Action,
            ServerMessage::TerritoryDeaths(_) => MessageKind::TerritoryDeaths,
            ServerMessage::GameOver(_) => MessageKind::GameOver,
            ServerMessage::Error(_) => MessageKind::Error,
            ServerMessage::Pong => MessageKind::Pong,
        }
    }
}

/// Decode one text frame; `Ok(None)` for message types this client ignores
pub fn decode(text: &str) -> Result<Option<ServerMessage>, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingTag)?;
    let Some(kind) = MessageKind::from_tag(tag) else {
        return Ok(None);
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|source| ProtocolError::Malformed { kind, source })
}

/// Frames sent over the socket
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
}

// ============================================================================
// REQUEST / RESPONSE BODIES
// ============================================================================

/// Human action submitted to `/api/action`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Move {
        from_q: i32,
        from_r: i32,
        to_q: i32,
        to_r: i32,
    },
    Buy {
        unit_type: UnitType,
        q: i32,
        r: i32,
    },
    EndTurn,
}

impl ActionRequest {
    pub fn move_unit(from: Hex, to: Hex) -> Self {
        ActionRequest::Move {
            from_q: from.q,
            from_r: from.r,
            to_q: to.q,
            to_r: to.r,
        }
    }

    pub fn buy(unit_type: UnitType, at: Hex) -> Self {
        ActionRequest::Buy {
            unit_type,
            q: at.q,
            r: at.r,
        }
    }
}

/// Server verdict on a submitted action
#[derive(Clone, Debug, PartialEq)]
pub struct ActionOutcome {
    pub accepted: bool,
    pub message: Option<String>,
    pub details: Value,
}

impl ActionOutcome {
    /// Interpret the `/api/action` envelope
    ///
    /// `{"status":"ok","result":{..}}` carries the per-action `success` flag;
    /// `turn_complete`/`victory`/`waiting` acknowledge an end of turn;
    /// `error` is a rejection.
    pub fn from_response(body: Value) -> Self {
        let status = body.get("status").and_then(Value::as_str).unwrap_or("");
        let message = body
            .get("message")
            .or_else(|| body.get("result").and_then(|r| r.get("message")))
            .and_then(Value::as_str)
            .map(str::to_string);

        let accepted = match status {
            "ok" => body
                .get("result")
                .and_then(|r| r.get("success"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            "turn_complete" | "victory" | "waiting" => true,
            "error" => false,
            _ => body.get("success").and_then(Value::as_bool).unwrap_or(false),
        };

        Self {
            accepted,
            message,
            details: body,
        }
    }
}

/// Result of `/api/next-turn`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextTurnOutcome {
    /// The server advanced (possibly now waiting for a human)
    Advanced { waiting_for: Option<PlayerId> },
    GameOver { winner: Option<PlayerId> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotResponse {
    pub snapshot_id: u32,
    pub max_snapshot: u32,
    pub state: GameStateWire,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: GameStateWire,
    #[serde(default)]
    pub waiting_for_human: Option<PlayerId>,
    #[serde(default)]
    pub game_running: bool,
}

/// Autoplay speed presets understood by `/api/speed`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    Fast,
    Normal,
    Slow,
}

impl std::str::FromStr for SpeedPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fast" => Ok(SpeedPreset::Fast),
            "normal" => Ok(SpeedPreset::Normal),
            "slow" => Ok(SpeedPreset::Slow),
            other => Err(format!("unknown speed preset: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn board_json() -> Value {
        json!({
            "width": 1,
            "height": 1,
            "hexes": {"0,0": {"q": 0, "r": 0, "terrain": "land", "owner": 0, "unit": null, "has_capital": false}}
        })
    }

    #[test]
    fn test_decode_state_push() {
        let text = json!({
            "type": "state",
            "state": {
                "turn": 3,
                "current_player": 1,
                "board": board_json(),
                "players": [{"id": 0, "region_gold": {}}, {"id": 1}],
                "actions_this_turn": []
            },
            "waiting_for_human": 1,
            "game_running": false,
            "max_snapshot": 9
        })
        .to_string();

        match decode(&text).unwrap() {
            Some(ServerMessage::State(push)) => {
                assert_eq!(push.max_snapshot, 9);
                assert_eq!(push.waiting_for_human, Some(1));
                let state = push.state.unwrap();
                assert_eq!(state.turn, 3);
                assert_eq!(state.board.len(), 1);
                assert_eq!(state.players.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let text = json!({"type": "stats_update", "anything": 1}).to_string();
        assert!(decode(&text).unwrap().is_none());
    }

    #[test]
    fn test_malformed_known_type_is_error() {
        let text = json!({"type": "turn_start", "turn": "three"}).to_string();
        match decode(&text) {
            Err(ProtocolError::Malformed { kind, .. }) => assert_eq!(kind, MessageKind::TurnStart),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(decode("{\"turn\": 1}"), Err(ProtocolError::MissingTag)));
        assert!(matches!(decode("not json"), Err(ProtocolError::InvalidJson(_))));
    }

    #[test]
    fn test_pong_and_game_over() {
        assert!(matches!(decode(r#"{"type":"pong"}"#).unwrap(), Some(ServerMessage::Pong)));
        match decode(r#"{"type":"game_over","winner":2,"winner_name":"Mint"}"#).unwrap() {
            Some(ServerMessage::GameOver(g)) => assert_eq!(g.winner, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_outbound_frames() {
        assert_eq!(serde_json::to_value(ClientMessage::Ping).unwrap(), json!({"type": "ping"}));
        assert_eq!(
            serde_json::to_value(ActionRequest::move_unit(Hex::new(1, 2), Hex::new(2, 2))).unwrap(),
            json!({"type": "move", "from_q": 1, "from_r": 2, "to_q": 2, "to_r": 2})
        );
        assert_eq!(
            serde_json::to_value(ActionRequest::buy(UnitType::Castle, Hex::new(-1, 0))).unwrap(),
            json!({"type": "buy", "unit_type": "castle", "q": -1, "r": 0})
        );
        assert_eq!(serde_json::to_value(ActionRequest::EndTurn).unwrap(), json!({"type": "end_turn"}));
    }

    #[test]
    fn test_action_outcome() {
        let ok = ActionOutcome::from_response(json!({"status": "ok", "result": {"success": true, "message": "Moved"}}));
        assert!(ok.accepted);
        assert_eq!(ok.message.as_deref(), Some("Moved"));

        let illegal = ActionOutcome::from_response(json!({"status": "ok", "result": {"success": false, "message": "Too weak"}}));
        assert!(!illegal.accepted);

        let stale = ActionOutcome::from_response(json!({"status": "error", "message": "Not waiting for human input"}));
        assert!(!stale.accepted);
        assert_eq!(stale.message.as_deref(), Some("Not waiting for human input"));

        assert!(ActionOutcome::from_response(json!({"status": "turn_complete"})).accepted);
    }
}
