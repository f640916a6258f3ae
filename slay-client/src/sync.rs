//! View synchronization controller
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: `ViewSyncController` input handlers (push, navigation, turn
//!   execution, pointer input, request completions)
//! - Level 2: live/history arbitration and interaction reconciliation
//! - Level 3: mapping interaction effects onto [`Command`]s
//! - Level 4: `ViewState` accessors
//!
//! The controller performs no I/O. Every handler runs to completion and
//! returns the commands its owner must execute; requests it issues are
//! tagged (snapshot target, turn epoch) so late answers can be recognized
//! and dropped when they come back.

use std::time::{Duration, Instant};

use slay_core::{
    BoardError, BoardSnapshot, CapitalLedger, Hex, HexCell, HighlightSet, InteractionEffect,
    InteractionMachine, LegalActionSet, PlayerId, PurchasePanel, Region, Roster, UnitType,
};

use crate::api::{LiveState, SnapshotFrame};
use crate::protocol::{ActionRequest, GameFrame, NextTurnOutcome, StatePush};

// ============================================================================
// VIEW STATE
// ============================================================================

/// What the user is looking at
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    pub turn_index: u32,
    pub max_turn_index: u32,
    pub frame: Option<GameFrame>,
    pub waiting_human: Option<PlayerId>,
    pub game_running: bool,
}

impl ViewState {
    pub fn is_live(&self) -> bool {
        self.turn_index == self.max_turn_index
    }

    pub fn board(&self) -> Option<&BoardSnapshot> {
        self.frame.as_ref().map(|f| f.board.as_ref())
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.frame.as_ref().map(|f| f.roster.as_ref())
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.frame.as_ref().map(|f| f.current_player)
    }
}

/// A decoded `state` push
#[derive(Clone, Debug)]
pub struct LivePush {
    pub frame: Option<GameFrame>,
    pub max_snapshot: u32,
    pub waiting_for_human: Option<PlayerId>,
    pub game_running: bool,
    /// Set when the server rolled history back
    pub undone_to: Option<u32>,
}

impl LivePush {
    pub fn from_wire(push: StatePush) -> Result<Self, BoardError> {
        Ok(Self {
            frame: push.state.map(|s| s.into_frame()).transpose()?,
            max_snapshot: push.max_snapshot,
            waiting_for_human: push.waiting_for_human,
            game_running: push.game_running,
            undone_to: push.undone_to,
        })
    }
}

/// Latest live state, kept while the user reviews history
#[derive(Clone, Debug, Default)]
struct LiveCache {
    frame: Option<GameFrame>,
    waiting_for_human: Option<PlayerId>,
}

/// Work the owner must carry out
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    FetchSnapshot { target: u32 },
    FetchLegalActions { epoch: u32 },
    SubmitAction { action: ActionRequest, epoch: u32 },
    RequestNextTurn,
    /// Deliver a confirm-expiry event at `deadline`
    ScheduleConfirmExpiry { deadline: Instant },
    Render,
    InteractionChanged,
    ViewChanged,
    OpenPurchasePanel(PurchasePanel),
    OpenInfoPanel(HexCell),
    GameOver { winner: PlayerId, name: String },
}

// ============================================================================
// CONTROLLER
// ============================================================================

pub struct ViewSyncController {
    view: ViewState,
    live: LiveCache,
    interaction: InteractionMachine,
    /// Epoch the interaction machine was enabled in
    interaction_epoch: Option<u32>,
    pending_target: Option<u32>,
    confirm_deadline: Option<Instant>,
    confirm_window: Duration,
    next_turn_in_flight: bool,
    /// Epoch an end-turn request was sent in, until it is answered
    end_turn_epoch: Option<u32>,
    winner: Option<PlayerId>,
}

impl ViewSyncController {
    pub fn new(confirm_window: Duration) -> Self {
        Self {
            view: ViewState::default(),
            live: LiveCache::default(),
            interaction: InteractionMachine::new(),
            interaction_epoch: None,
            pending_target: None,
            confirm_deadline: None,
            confirm_window,
            next_turn_in_flight: false,
            end_turn_epoch: None,
            winner: None,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn interaction(&self) -> &InteractionMachine {
        &self.interaction
    }

    /// Live turn number; requests issued under an older epoch are stale
    pub fn epoch(&self) -> u32 {
        self.view.max_turn_index
    }

    pub fn pending_target(&self) -> Option<u32> {
        self.pending_target
    }

    pub fn is_confirm_armed(&self) -> bool {
        self.confirm_deadline.is_some()
    }

    pub fn next_turn_in_flight(&self) -> bool {
        self.next_turn_in_flight
    }

    pub fn end_turn_pending(&self) -> bool {
        self.end_turn_epoch == Some(self.epoch())
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn highlights(&self) -> HighlightSet {
        self.interaction.highlights()
    }

    // ========================================================================
    // LEVEL 1: SERVER INPUT
    // ========================================================================

    /// A `state` push arrived
    pub fn apply_push(&mut self, push: LivePush) -> Vec<Command> {
        if push.undone_to.is_none() && push.max_snapshot < self.view.max_turn_index {
            tracing::debug!(
                "Ignoring push for snapshot {} (already at {})",
                push.max_snapshot,
                self.view.max_turn_index
            );
            return Vec::new();
        }

        let was_live = self.view.is_live() || push.undone_to.is_some();
        if push.max_snapshot != self.view.max_turn_index || push.undone_to.is_some() {
            // A confirmation armed on the previous turn does not carry over
            self.confirm_deadline = None;
            self.end_turn_epoch = None;
        }
        if push.frame.is_some() {
            self.live.frame = push.frame;
        }
        self.live.waiting_for_human = push.waiting_for_human;
        self.view.max_turn_index = push.max_snapshot;
        self.view.game_running = push.game_running;

        if !was_live {
            // Reviewing history: only the live end moves
            return vec![Command::ViewChanged];
        }

        if push.undone_to.is_some() {
            self.pending_target = None;
        }
        self.adopt_live()
    }

    /// A new game replaced the old one entirely
    pub fn apply_new_game(&mut self, frame: GameFrame) -> Vec<Command> {
        tracing::info!("New game started ({} hexes)", frame.board.len());
        self.view = ViewState::default();
        self.live = LiveCache {
            frame: Some(frame),
            waiting_for_human: None,
        };
        self.pending_target = None;
        self.confirm_deadline = None;
        self.next_turn_in_flight = false;
        self.end_turn_epoch = None;
        self.winner = None;
        self.adopt_live()
    }

    /// Initial state fetched over HTTP; ignored once a push has been seen
    pub fn apply_initial_state(&mut self, state: LiveState) -> Vec<Command> {
        if self.live.frame.is_some() {
            tracing::debug!("Initial state superseded by a push");
            return Vec::new();
        }
        self.live = LiveCache {
            frame: Some(state.frame),
            waiting_for_human: state.waiting_for_human,
        };
        self.view.game_running = state.game_running;
        if !self.view.is_live() {
            return vec![Command::ViewChanged];
        }
        self.adopt_live()
    }

    pub fn apply_game_over(&mut self, winner: PlayerId, name: Option<String>) -> Vec<Command> {
        self.winner = Some(winner);
        self.view.game_running = false;
        self.live.waiting_for_human = None;
        self.view.waiting_human = None;
        self.confirm_deadline = None;

        let name = name
            .or_else(|| self.view.roster().map(|r| r.name_of(winner)))
            .unwrap_or_else(|| format!("Player {}", winner));
        let mut commands = self.reconcile_interaction();
        commands.push(Command::GameOver { winner, name });
        commands.push(Command::ViewChanged);
        commands
    }

    // ========================================================================
    // LEVEL 1: NAVIGATION
    // ========================================================================

    /// Show snapshot `target` (1..=max)
    pub fn navigate_to(&mut self, target: u32) -> Vec<Command> {
        self.confirm_deadline = None;
        if target < 1 || target > self.view.max_turn_index {
            tracing::debug!("Snapshot {} out of range 1..={}", target, self.view.max_turn_index);
            return vec![Command::ViewChanged];
        }
        if target == self.view.max_turn_index && self.live.frame.is_some() {
            return self.return_to_live();
        }
        self.pending_target = Some(target);
        vec![Command::FetchSnapshot { target }, Command::ViewChanged]
    }

    pub fn step_back(&mut self) -> Vec<Command> {
        let from = self.navigation_base();
        if from <= 1 {
            return Vec::new();
        }
        self.navigate_to(from - 1)
    }

    pub fn step_forward(&mut self) -> Vec<Command> {
        let from = self.navigation_base();
        if from >= self.view.max_turn_index {
            return Vec::new();
        }
        self.navigate_to(from + 1)
    }

    pub fn jump_to_first(&mut self) -> Vec<Command> {
        self.navigate_to(1)
    }

    /// Follow the live game again, from the cached push when there is one
    pub fn return_to_live(&mut self) -> Vec<Command> {
        self.confirm_deadline = None;
        if self.live.frame.is_none() {
            let target = self.view.max_turn_index;
            if target == 0 {
                return Vec::new();
            }
            self.pending_target = Some(target);
            return vec![Command::FetchSnapshot { target }, Command::ViewChanged];
        }
        self.pending_target = None;
        self.adopt_live()
    }

    /// A snapshot fetch issued for `target` completed
    pub fn snapshot_loaded(&mut self, target: u32, snapshot: SnapshotFrame) -> Vec<Command> {
        if self.pending_target != Some(target) {
            tracing::debug!(
                "Discarding snapshot {} (pending target {:?})",
                target,
                self.pending_target
            );
            return Vec::new();
        }
        self.pending_target = None;

        if snapshot.max_snapshot > self.view.max_turn_index {
            self.view.max_turn_index = snapshot.max_snapshot;
        }
        if target > self.view.max_turn_index {
            return vec![Command::ViewChanged];
        }

        self.view.turn_index = target;
        self.view.frame = Some(snapshot.frame);
        self.view.waiting_human = if self.view.is_live() {
            self.live.waiting_for_human
        } else {
            None
        };

        let mut commands = self.reconcile_interaction();
        commands.push(Command::Render);
        commands.push(Command::ViewChanged);
        commands
    }

    /// A snapshot fetch failed; the view is left as it was
    pub fn snapshot_failed(&mut self, target: u32) -> Vec<Command> {
        if self.pending_target == Some(target) {
            self.pending_target = None;
            return vec![Command::ViewChanged];
        }
        Vec::new()
    }

    // ========================================================================
    // LEVEL 1: TURN EXECUTION
    // ========================================================================

    /// "Next turn" activation; the second one inside the window executes
    pub fn request_next_turn(&mut self, now: Instant) -> Vec<Command> {
        if !self.view.is_live() || self.winner.is_some() {
            tracing::debug!("Next turn ignored outside the live view");
            return Vec::new();
        }
        if self.next_turn_in_flight {
            return Vec::new();
        }

        match self.confirm_deadline {
            Some(deadline) if now < deadline => {
                self.confirm_deadline = None;
                self.next_turn_in_flight = true;
                vec![Command::RequestNextTurn, Command::ViewChanged]
            }
            _ => {
                let deadline = now + self.confirm_window;
                self.confirm_deadline = Some(deadline);
                vec![Command::ScheduleConfirmExpiry { deadline }, Command::ViewChanged]
            }
        }
    }

    /// Timer fired; a later re-arm is left alone
    pub fn confirm_expired(&mut self, now: Instant) -> Vec<Command> {
        match self.confirm_deadline {
            Some(deadline) if now >= deadline => {
                self.confirm_deadline = None;
                vec![Command::ViewChanged]
            }
            _ => Vec::new(),
        }
    }

    /// `/api/next-turn` answered; `None` if the request failed
    pub fn next_turn_finished(&mut self, outcome: Option<NextTurnOutcome>) -> Vec<Command> {
        self.next_turn_in_flight = false;
        match outcome {
            Some(NextTurnOutcome::GameOver { winner: Some(winner) }) if self.winner.is_none() => {
                self.apply_game_over(winner, None)
            }
            _ => vec![Command::ViewChanged],
        }
    }

    // ========================================================================
    // LEVEL 1: HUMAN INPUT
    // ========================================================================

    /// Pointer click resolved to a hex (or to nothing)
    pub fn pick(&mut self, hex: Option<Hex>) -> Vec<Command> {
        if self.end_turn_pending() {
            tracing::debug!("Ignoring pick while the turn is being ended");
            return Vec::new();
        }
        let Some(frame) = self.view.frame.as_ref() else {
            return Vec::new();
        };
        let ledger = self.active_ledger(&frame.roster);
        let effects = self.interaction.pick(hex, &frame.board, &ledger);
        self.map_effects(effects)
    }

    /// Purchase-panel choice
    pub fn begin_placement(&mut self, unit_type: UnitType, region: &Region) -> Vec<Command> {
        if self.end_turn_pending() {
            return Vec::new();
        }
        let effects = self.interaction.begin_placement(unit_type, region);
        self.map_effects(effects)
    }

    pub fn cancel_interaction(&mut self) -> Vec<Command> {
        let effects = self.interaction.cancel();
        self.map_effects(effects)
    }

    /// Human ends their turn
    pub fn end_turn(&mut self) -> Vec<Command> {
        if !self.interaction.is_enabled() || self.interaction.in_flight().is_some() || self.end_turn_pending() {
            return Vec::new();
        }
        self.end_turn_epoch = Some(self.epoch());
        let effects = self.interaction.cancel();
        let mut commands = self.map_effects(effects);
        commands.push(Command::SubmitAction {
            action: ActionRequest::EndTurn,
            epoch: self.epoch(),
        });
        commands
    }

    /// `/api/action` answered; `accepted` is false on rejection or failure
    pub fn action_finished(&mut self, epoch: u32, accepted: bool) -> Vec<Command> {
        if epoch != self.epoch() {
            tracing::debug!("Discarding action result from turn {} (now {})", epoch, self.epoch());
            return Vec::new();
        }
        if self.end_turn_epoch.take().is_some() {
            if !accepted {
                tracing::info!("Server rejected end of turn {}", epoch);
            }
            return vec![Command::ViewChanged];
        }
        let effects = self.interaction.action_resolved(accepted);
        self.map_effects(effects)
    }

    pub fn legal_actions_loaded(&mut self, epoch: u32, legal: LegalActionSet) -> Vec<Command> {
        if epoch != self.epoch() || self.interaction_epoch != Some(epoch) {
            tracing::debug!("Discarding legal actions from turn {}", epoch);
            return Vec::new();
        }
        let effects = self.interaction.set_legal_actions(legal);
        self.map_effects(effects)
    }

    // ========================================================================
    // LEVEL 2: ARBITRATION
    // ========================================================================

    fn navigation_base(&self) -> u32 {
        self.pending_target.unwrap_or(self.view.turn_index)
    }

    /// Jump the view to the live end and show the cached live frame
    fn adopt_live(&mut self) -> Vec<Command> {
        self.view.turn_index = self.view.max_turn_index;
        if let Some(frame) = &self.live.frame {
            self.view.frame = Some(frame.clone());
        }
        self.view.waiting_human = self.live.waiting_for_human;

        let mut commands = self.reconcile_interaction();
        commands.push(Command::Render);
        commands.push(Command::ViewChanged);
        commands
    }

    /// Interaction is enabled exactly while live with a human to move
    fn reconcile_interaction(&mut self) -> Vec<Command> {
        let wanted = if self.view.is_live() && self.winner.is_none() {
            self.view.waiting_human
        } else {
            None
        };
        let epoch = self.epoch();

        let effects = match (wanted, self.view.frame.as_ref()) {
            (Some(player), Some(frame)) => {
                let ledger = frame.roster.ledger(player);
                if self.interaction.player() == Some(player) && self.interaction_epoch == Some(epoch) {
                    self.interaction.board_changed(&frame.board, &ledger)
                } else {
                    tracing::info!("Interaction enabled for player {}", player);
                    self.interaction_epoch = Some(epoch);
                    self.interaction.enable(player, &frame.board, &ledger)
                }
            }
            _ => {
                self.interaction_epoch = None;
                self.interaction.disable()
            }
        };
        self.map_effects(effects)
    }

    fn active_ledger(&self, roster: &Roster) -> CapitalLedger {
        self.interaction
            .player()
            .map(|p| roster.ledger(p))
            .unwrap_or_default()
    }

    // ========================================================================
    // LEVEL 3: EFFECT MAPPING
    // ========================================================================

    fn map_effects(&self, effects: Vec<InteractionEffect>) -> Vec<Command> {
        let epoch = self.epoch();
        let mut commands = Vec::with_capacity(effects.len() + 1);
        for effect in effects {
            match effect {
                InteractionEffect::StateChanged => {
                    if !commands.contains(&Command::InteractionChanged) {
                        commands.push(Command::InteractionChanged);
                        commands.push(Command::Render);
                    }
                }
                InteractionEffect::OpenPurchasePanel(panel) => commands.push(Command::OpenPurchasePanel(panel)),
                InteractionEffect::OpenInfoPanel(cell) => commands.push(Command::OpenInfoPanel(cell)),
                InteractionEffect::SubmitMove { from, to } => commands.push(Command::SubmitAction {
                    action: ActionRequest::move_unit(from, to),
                    epoch,
                }),
                InteractionEffect::SubmitPurchase { unit_type, at } => commands.push(Command::SubmitAction {
                    action: ActionRequest::buy(unit_type, at),
                    epoch,
                }),
                InteractionEffect::RefreshLegalActions => commands.push(Command::FetchLegalActions { epoch }),
            }
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slay_core::{InteractionState, PlayerInfo, Terrain, Unit, ValidMove};
    use std::sync::Arc;

    const HUMAN: PlayerId = 0;

    // ========================================================================
    // TEST FIXTURES
    // ========================================================================

    fn frame(turn: u32) -> GameFrame {
        let cells = [
            HexCell::new(Hex::new(0, 0), Terrain::Land).owned_by(HUMAN).with_capital(),
            HexCell::new(Hex::new(1, 0), Terrain::Land)
                .owned_by(HUMAN)
                .with_unit(Unit::new(UnitType::Peasant, HUMAN)),
            HexCell::new(Hex::new(2, 0), Terrain::Land).owned_by(1),
        ];
        let mut me = PlayerInfo::new(HUMAN);
        me.region_gold.insert("0,0".to_string(), 25);
        GameFrame {
            turn,
            current_player: HUMAN,
            board: Arc::new(BoardSnapshot::new(3, 1, cells)),
            roster: Arc::new(Roster::new(vec![me, PlayerInfo::new(1)]).unwrap()),
        }
    }

    fn push(max: u32, waiting: Option<PlayerId>) -> LivePush {
        LivePush {
            frame: Some(frame(max)),
            max_snapshot: max,
            waiting_for_human: waiting,
            game_running: false,
            undone_to: None,
        }
    }

    fn snapshot(index: u32, max: u32) -> SnapshotFrame {
        SnapshotFrame {
            index,
            max_snapshot: max,
            frame: frame(index),
        }
    }

    fn controller_at(max: u32, waiting: Option<PlayerId>) -> ViewSyncController {
        let mut c = ViewSyncController::new(Duration::from_millis(1500));
        c.apply_push(push(max, waiting));
        c
    }

    fn review(c: &mut ViewSyncController, target: u32) {
        let max = c.view().max_turn_index;
        c.navigate_to(target);
        c.snapshot_loaded(target, snapshot(target, max));
    }

    // ========================================================================
    // LIVE PUSH ARBITRATION
    // ========================================================================

    #[test]
    fn test_live_push_advances_turn() {
        let mut c = controller_at(5, None);
        assert!(c.view().is_live());
        let commands = c.apply_push(push(6, None));
        assert_eq!(c.view().turn_index, 6);
        assert_eq!(c.view().max_turn_index, 6);
        assert!(commands.contains(&Command::Render));
    }

    #[test]
    fn test_push_while_reviewing_only_moves_max() {
        let mut c = controller_at(5, None);
        review(&mut c, 3);
        assert_eq!(c.view().turn_index, 3);
        let shown = c.view().frame.as_ref().unwrap().turn;

        let commands = c.apply_push(push(6, None));
        assert_eq!(c.view().turn_index, 3);
        assert_eq!(c.view().max_turn_index, 6);
        assert_eq!(c.view().frame.as_ref().unwrap().turn, shown);
        assert_eq!(commands, vec![Command::ViewChanged]);
    }

    #[test]
    fn test_older_push_is_ignored() {
        let mut c = controller_at(7, None);
        assert!(c.apply_push(push(6, None)).is_empty());
        assert_eq!(c.view().max_turn_index, 7);
    }

    #[test]
    fn test_undo_push_resets_to_live() {
        let mut c = controller_at(7, None);
        review(&mut c, 2);
        let mut undo = push(4, None);
        undo.undone_to = Some(4);
        c.apply_push(undo);
        assert_eq!(c.view().turn_index, 4);
        assert!(c.view().is_live());
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    #[test]
    fn test_navigation_fetches_and_applies() {
        let mut c = controller_at(5, None);
        let commands = c.navigate_to(2);
        assert!(commands.contains(&Command::FetchSnapshot { target: 2 }));
        assert_eq!(c.view().turn_index, 5);

        c.snapshot_loaded(2, snapshot(2, 5));
        assert_eq!(c.view().turn_index, 2);
        assert!(!c.view().is_live());
    }

    #[test]
    fn test_superseded_snapshot_is_discarded() {
        let mut c = controller_at(5, None);
        c.navigate_to(2);
        c.navigate_to(3);
        assert!(c.snapshot_loaded(2, snapshot(2, 5)).is_empty());
        assert_eq!(c.view().turn_index, 5);
        c.snapshot_loaded(3, snapshot(3, 5));
        assert_eq!(c.view().turn_index, 3);
    }

    #[test]
    fn test_rerequesting_same_target_is_not_discarded() {
        let mut c = controller_at(5, None);
        review(&mut c, 3);
        // Already showing 3; asking for it again must still apply
        c.navigate_to(3);
        let commands = c.snapshot_loaded(3, snapshot(3, 5));
        assert!(commands.contains(&Command::Render));
        assert_eq!(c.pending_target(), None);
    }

    #[test]
    fn test_out_of_range_navigation() {
        let mut c = controller_at(5, None);
        assert!(!c.navigate_to(0).iter().any(|cmd| matches!(cmd, Command::FetchSnapshot { .. })));
        assert!(!c.navigate_to(6).iter().any(|cmd| matches!(cmd, Command::FetchSnapshot { .. })));
    }

    #[test]
    fn test_step_helpers() {
        let mut c = controller_at(3, None);
        assert_eq!(c.step_forward(), Vec::new());
        assert!(c.step_back().contains(&Command::FetchSnapshot { target: 2 }));
        // Rapid second step builds on the pending target
        assert!(c.step_back().contains(&Command::FetchSnapshot { target: 1 }));
        assert_eq!(c.step_back(), Vec::new());
        assert!(c.jump_to_first().contains(&Command::FetchSnapshot { target: 1 }));
    }

    #[test]
    fn test_return_to_live_uses_cached_push() {
        let mut c = controller_at(5, None);
        review(&mut c, 2);
        c.apply_push(push(6, None));

        let commands = c.return_to_live();
        assert!(!commands.iter().any(|cmd| matches!(cmd, Command::FetchSnapshot { .. })));
        assert_eq!(c.view().turn_index, 6);
        assert_eq!(c.view().frame.as_ref().unwrap().turn, 6);
    }

    #[test]
    fn test_navigate_to_max_routes_to_live_cache() {
        let mut c = controller_at(5, None);
        review(&mut c, 2);
        let commands = c.navigate_to(5);
        assert!(!commands.iter().any(|cmd| matches!(cmd, Command::FetchSnapshot { .. })));
        assert!(c.view().is_live());
    }

    // ========================================================================
    // TURN EXECUTION
    // ========================================================================

    fn requests(commands: &[Command]) -> usize {
        commands.iter().filter(|c| **c == Command::RequestNextTurn).count()
    }

    #[test]
    fn test_double_confirm_executes_once() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();

        let first = c.request_next_turn(t0);
        assert_eq!(requests(&first), 0);
        assert!(c.is_confirm_armed());

        let second = c.request_next_turn(t0 + Duration::from_millis(500));
        assert_eq!(requests(&second), 1);
        assert!(!c.is_confirm_armed());
        assert!(c.next_turn_in_flight());

        // Rapid third activation while in flight does nothing
        assert!(c.request_next_turn(t0 + Duration::from_millis(600)).is_empty());
        c.next_turn_finished(Some(NextTurnOutcome::Advanced { waiting_for: None }));
        assert!(!c.next_turn_in_flight());
    }

    #[test]
    fn test_confirm_expires_and_rearms() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);

        // Timer event before the deadline (from an earlier arm) is ignored
        assert!(c.confirm_expired(t0 + Duration::from_millis(100)).is_empty());
        assert!(c.is_confirm_armed());

        c.confirm_expired(t0 + Duration::from_millis(1500));
        assert!(!c.is_confirm_armed());

        let later = c.request_next_turn(t0 + Duration::from_secs(3));
        assert_eq!(requests(&later), 0);
        assert!(c.is_confirm_armed());
    }

    #[test]
    fn test_late_second_click_rearms() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);
        let late = c.request_next_turn(t0 + Duration::from_secs(2));
        assert_eq!(requests(&late), 0);
        assert!(c.is_confirm_armed());
    }

    #[test]
    fn test_navigation_clears_confirm_and_blocks_next_turn() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);
        review(&mut c, 2);
        assert!(!c.is_confirm_armed());
        assert!(c.request_next_turn(t0 + Duration::from_millis(10)).is_empty());
    }

    #[test]
    fn test_live_push_to_new_turn_clears_confirm() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);
        assert!(c.is_confirm_armed());

        c.apply_push(push(6, None));
        assert!(!c.is_confirm_armed());

        // The next click on turn 6 only arms again
        let commands = c.request_next_turn(t0 + Duration::from_millis(200));
        assert!(!commands.contains(&Command::RequestNextTurn));
        assert!(c.is_confirm_armed());
    }

    #[test]
    fn test_same_turn_push_keeps_confirm() {
        let mut c = controller_at(5, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);
        c.apply_push(push(5, None));
        assert!(c.request_next_turn(t0 + Duration::from_millis(10)).contains(&Command::RequestNextTurn));
    }

    // ========================================================================
    // INTERACTION RECONCILIATION
    // ========================================================================

    #[test]
    fn test_leaving_live_disables_interaction() {
        let mut c = controller_at(5, Some(HUMAN));
        assert!(c.interaction().is_enabled());

        review(&mut c, 3);
        assert!(!c.interaction().is_enabled());

        c.return_to_live();
        assert!(c.interaction().is_enabled());
    }

    #[test]
    fn test_enable_requests_legal_actions() {
        let mut c = ViewSyncController::new(Duration::from_secs(1));
        let commands = c.apply_push(push(2, Some(HUMAN)));
        assert!(commands.contains(&Command::FetchLegalActions { epoch: 2 }));
    }

    #[test]
    fn test_move_roundtrip_and_stale_results() {
        let mut c = controller_at(4, Some(HUMAN));
        c.legal_actions_loaded(
            4,
            LegalActionSet::new(
                vec![ValidMove { from: Hex::new(1, 0), to: Hex::new(2, 0), is_attack: true }],
                vec![],
            ),
        );

        c.pick(Some(Hex::new(1, 0)));
        assert_eq!(c.interaction().state(), &InteractionState::UnitSelected { origin: Hex::new(1, 0) });

        let commands = c.pick(Some(Hex::new(2, 0)));
        assert!(commands.contains(&Command::SubmitAction {
            action: ActionRequest::move_unit(Hex::new(1, 0), Hex::new(2, 0)),
            epoch: 4,
        }));

        // Stale legal set from an older turn is dropped
        assert!(c.legal_actions_loaded(3, LegalActionSet::default()).is_empty());

        // Turn moves on before the answer arrives
        c.apply_push(push(5, Some(HUMAN)));
        assert!(c.action_finished(4, true).is_empty());
        assert!(c.interaction().in_flight().is_none());
    }

    #[test]
    fn test_rejected_action_refreshes_legal_set() {
        let mut c = controller_at(4, Some(HUMAN));
        c.legal_actions_loaded(
            4,
            LegalActionSet::new(
                vec![ValidMove { from: Hex::new(1, 0), to: Hex::new(2, 0), is_attack: true }],
                vec![],
            ),
        );
        c.pick(Some(Hex::new(1, 0)));
        c.pick(Some(Hex::new(2, 0)));

        let commands = c.action_finished(4, false);
        assert!(c.interaction().state().is_idle());
        assert!(commands.contains(&Command::FetchLegalActions { epoch: 4 }));
    }

    #[test]
    fn test_spectator_click_opens_info() {
        let mut c = controller_at(4, None);
        let commands = c.pick(Some(Hex::new(2, 0)));
        assert!(matches!(commands.as_slice(), [Command::OpenInfoPanel(_)]));
    }

    #[test]
    fn test_game_over_disables_everything() {
        let mut c = controller_at(4, Some(HUMAN));
        let commands = c.apply_game_over(1, None);
        assert!(!c.interaction().is_enabled());
        assert!(commands.iter().any(|cmd| matches!(cmd, Command::GameOver { winner: 1, .. })));
        assert!(c.request_next_turn(Instant::now()).is_empty());
    }

    #[test]
    fn test_next_turn_victory_reports_winner() {
        let mut c = controller_at(4, None);
        let t0 = Instant::now();
        c.request_next_turn(t0);
        c.request_next_turn(t0 + Duration::from_millis(10));

        let commands = c.next_turn_finished(Some(NextTurnOutcome::GameOver { winner: Some(2) }));
        assert_eq!(c.winner(), Some(2));
        assert!(commands.iter().any(|cmd| matches!(cmd, Command::GameOver { winner: 2, .. })));
    }

    #[test]
    fn test_end_turn_submits_once() {
        let mut c = controller_at(4, Some(HUMAN));
        let commands = c.end_turn();
        assert!(commands.contains(&Command::SubmitAction { action: ActionRequest::EndTurn, epoch: 4 }));

        let mut spectator = controller_at(4, None);
        assert!(spectator.end_turn().is_empty());
    }

    #[test]
    fn test_rapid_end_turn_submits_once() {
        let mut c = controller_at(4, Some(HUMAN));
        assert!(c.end_turn().contains(&Command::SubmitAction { action: ActionRequest::EndTurn, epoch: 4 }));
        assert!(c.end_turn_pending());
        assert!(c.end_turn().is_empty());
        assert!(c.pick(Some(Hex::new(0, 0))).is_empty());

        // Rejection allows another attempt
        c.action_finished(4, false);
        assert!(!c.end_turn_pending());
        assert!(c.end_turn().contains(&Command::SubmitAction { action: ActionRequest::EndTurn, epoch: 4 }));

        // The turn moving on releases the guard without an answer
        c.apply_push(push(5, Some(HUMAN)));
        assert!(!c.end_turn_pending());
        assert!(c.end_turn().contains(&Command::SubmitAction { action: ActionRequest::EndTurn, epoch: 5 }));
    }
}
