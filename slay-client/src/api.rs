//! HTTP request/response calls against the game server
//!
//! Every endpoint answers with a JSON envelope carrying `"status"`. An
//! `"error"` status becomes [`ApiError::Server`], except for `/api/action`
//! where it is the server's verdict on the action and is returned as a
//! rejected [`ActionOutcome`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use slay_core::{BoardError, LegalActionSet, PlayerId, ValidMove, ValidPurchase};

use crate::protocol::{
    ActionOutcome, ActionRequest, GameFrame, NextTurnOutcome, SnapshotResponse, SpeedPreset,
    StateResponse,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {path} failed: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("server reported an error: {0}")]
    Server(String),

    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid game state in response: {0}")]
    Board(#[from] BoardError),
}

/// A fetched history snapshot
#[derive(Clone, Debug)]
pub struct SnapshotFrame {
    pub index: u32,
    pub max_snapshot: u32,
    pub frame: GameFrame,
}

/// Current live state from `/api/state`
#[derive(Clone, Debug)]
pub struct LiveState {
    pub frame: GameFrame,
    pub waiting_for_human: Option<PlayerId>,
    pub game_running: bool,
}

#[derive(Clone, Debug)]
pub struct HttpGameApi {
    client: reqwest::Client,
    base: String,
}

impl HttpGameApi {
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base)
    }

    pub fn with_client(client: reqwest::Client, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { client, base }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    // ========================================================================
    // HISTORY & STATE
    // ========================================================================

    pub async fn fetch_snapshot(&self, index: u32) -> Result<SnapshotFrame, ApiError> {
        let path = format!("/api/snapshot/{}", index);
        let body = checked(self.get(&path).await?)?;
        let response: SnapshotResponse = decode_as(&path, body)?;
        Ok(SnapshotFrame {
            index: response.snapshot_id,
            max_snapshot: response.max_snapshot,
            frame: response.state.into_frame()?,
        })
    }

    pub async fn fetch_state(&self) -> Result<LiveState, ApiError> {
        let path = "/api/state";
        let body = checked(self.get(path).await?)?;
        let response: StateResponse = decode_as(path, body)?;
        Ok(LiveState {
            frame: response.state.into_frame()?,
            waiting_for_human: response.waiting_for_human,
            game_running: response.game_running,
        })
    }

    // ========================================================================
    // LEGAL ACTIONS
    // ========================================================================

    pub async fn fetch_legal_moves(&self) -> Result<Vec<ValidMove>, ApiError> {
        let path = "/api/valid-moves";
        let body = checked(self.get(path).await?)?;
        field(path, body, "moves")
    }

    pub async fn fetch_legal_purchases(&self) -> Result<Vec<ValidPurchase>, ApiError> {
        let path = "/api/valid-purchases";
        let body = checked(self.get(path).await?)?;
        field(path, body, "purchases")
    }

    /// Both lists, fetched concurrently
    pub async fn fetch_legal_actions(&self) -> Result<LegalActionSet, ApiError> {
        let (moves, purchases) = tokio::try_join!(self.fetch_legal_moves(), self.fetch_legal_purchases())?;
        Ok(LegalActionSet::new(moves, purchases))
    }

    // ========================================================================
    // ACTIONS & GAME CONTROL
    // ========================================================================

    pub async fn submit_action(&self, action: &ActionRequest) -> Result<ActionOutcome, ApiError> {
        let path = "/api/action";
        let payload = serde_json::to_value(action).map_err(|source| ApiError::Decode {
            path: path.to_string(),
            source,
        })?;
        let body = self.post(path, &payload).await?;
        let outcome = ActionOutcome::from_response(body);
        if !outcome.accepted {
            tracing::info!(
                "Action {:?} rejected: {}",
                action,
                outcome.message.as_deref().unwrap_or("no reason given")
            );
        }
        Ok(outcome)
    }

    pub async fn request_next_turn(&self) -> Result<NextTurnOutcome, ApiError> {
        let body = checked(self.post("/api/next-turn", &json!({})).await?)?;
        let player = |key: &str| body.get(key).and_then(Value::as_u64).map(|p| p as PlayerId);
        match body.get("status").and_then(Value::as_str) {
            // An AI turn that wins reports victory here before any push
            Some("game_over") | Some("victory") => Ok(NextTurnOutcome::GameOver { winner: player("winner") }),
            Some("waiting") => Ok(NextTurnOutcome::Advanced { waiting_for: player("player") }),
            _ => Ok(NextTurnOutcome::Advanced { waiting_for: None }),
        }
    }

    /// Start or resume the server's turn loop
    pub async fn request_run_autoplay(&self) -> Result<(), ApiError> {
        checked(self.post("/api/start", &json!({})).await?)?;
        Ok(())
    }

    pub async fn request_pause(&self) -> Result<(), ApiError> {
        checked(self.post("/api/pause", &json!({})).await?)?;
        Ok(())
    }

    pub async fn set_speed(&self, preset: SpeedPreset) -> Result<(), ApiError> {
        checked(self.post("/api/speed", &json!({ "preset": preset })).await?)?;
        Ok(())
    }

    // ========================================================================
    // PLUMBING
    // ========================================================================

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        tracing::trace!("GET {}", path);
        let response = self
            .client
            .get(format!("{}{}", self.base, path))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| http_error(path, source))?;
        response.json().await.map_err(|source| http_error(path, source))
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, ApiError> {
        tracing::trace!("POST {}", path);
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| http_error(path, source))?;
        response.json().await.map_err(|source| http_error(path, source))
    }
}

fn http_error(path: &str, source: reqwest::Error) -> ApiError {
    ApiError::Http {
        path: path.to_string(),
        source,
    }
}

/// Turn an `{"status":"error"}` envelope into [`ApiError::Server`]
fn checked(body: Value) -> Result<Value, ApiError> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ApiError::Server(message));
    }
    Ok(body)
}

fn decode_as<T: DeserializeOwned>(path: &str, body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|source| ApiError::Decode {
        path: path.to_string(),
        source,
    })
}

fn field<T: DeserializeOwned>(path: &str, mut body: Value, key: &str) -> Result<T, ApiError> {
    let value = body.get_mut(key).map(Value::take).unwrap_or(Value::Null);
    decode_as(path, value)
}
