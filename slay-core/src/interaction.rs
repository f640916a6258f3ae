//! Interaction state machine for the local human player
//!
//! ## States
//!
//! - `Idle`: nothing selected
//! - `UnitSelected(origin)`: a unit is picked up, its destinations shown
//! - `PlacingUnit(type, eligible)`: a bought unit waits for a target hex
//!
//! Every transition is driven by a named method and returns the effects the
//! caller must carry out (requests to send, panels to open, re-renders). The
//! machine never decides legality: moves and placements are only offered when
//! the server's [`LegalActionSet`] lists them, and the server's answer to the
//! request is final.

use rustc_hash::FxHashSet;

use crate::board::{BoardSnapshot, Hex, HexCell, PlayerId, UnitType};
use crate::legal::LegalActionSet;
use crate::players::CapitalLedger;
use crate::render::{HighlightKind, HighlightSet};
use crate::territory::{affordable_hexes, region_at, Region};

/// A hex a purchased unit may be placed on
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlacementTarget {
    pub at: Hex,
    pub is_attack: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum InteractionState {
    #[default]
    Idle,
    UnitSelected {
        origin: Hex,
    },
    PlacingUnit {
        unit_type: UnitType,
        eligible: Vec<PlacementTarget>,
    },
}

impl InteractionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }

    pub fn selected(&self) -> Option<Hex> {
        match self {
            InteractionState::UnitSelected { origin } => Some(*origin),
            _ => None,
        }
    }
}

/// Contents of the purchase panel for one clicked region
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PurchasePanel {
    pub region: Region,
    pub options: Vec<UnitType>,
}

/// Request awaiting the server's verdict
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingAction {
    Move { from: Hex, to: Hex },
    Purchase { unit_type: UnitType, at: Hex },
}

/// Work the owner of the machine must perform after a transition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionEffect {
    /// State or highlights changed: re-render and notify listeners
    StateChanged,
    OpenPurchasePanel(PurchasePanel),
    OpenInfoPanel(HexCell),
    SubmitMove { from: Hex, to: Hex },
    SubmitPurchase { unit_type: UnitType, at: Hex },
    RefreshLegalActions,
}

#[derive(Clone, Debug, Default)]
pub struct InteractionMachine {
    state: InteractionState,
    player: Option<PlayerId>,
    legal: LegalActionSet,
    in_flight: Option<PendingAction>,
    /// Hex a unit just moved to; reselected if it can still move
    reselect: Option<Hex>,
    affordable: FxHashSet<Hex>,
}

impl InteractionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// Player the machine accepts input for, while enabled
    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn is_enabled(&self) -> bool {
        self.player.is_some()
    }

    pub fn legal_actions(&self) -> &LegalActionSet {
        &self.legal
    }

    pub fn in_flight(&self) -> Option<PendingAction> {
        self.in_flight
    }

    // ========================================================================
    // ENABLE / DISABLE
    // ========================================================================

    /// Start accepting input for `player`; the cached legal actions are dropped
    pub fn enable(
        &mut self,
        player: PlayerId,
        board: &BoardSnapshot,
        ledger: &CapitalLedger,
    ) -> Vec<InteractionEffect> {
        self.player = Some(player);
        self.state = InteractionState::Idle;
        self.legal = LegalActionSet::default();
        self.in_flight = None;
        self.reselect = None;
        self.affordable = affordable_hexes(board, player, ledger, UnitType::cheapest_cost());
        vec![InteractionEffect::StateChanged, InteractionEffect::RefreshLegalActions]
    }

    /// Turn end or spectator entry: discard any selection
    pub fn disable(&mut self) -> Vec<InteractionEffect> {
        let was_active = self.player.is_some() || !self.state.is_idle();
        self.player = None;
        self.state = InteractionState::Idle;
        self.legal = LegalActionSet::default();
        self.in_flight = None;
        self.reselect = None;
        self.affordable.clear();
        if was_active {
            vec![InteractionEffect::StateChanged]
        } else {
            Vec::new()
        }
    }

    /// A new board arrived for the same turn; refresh the affordable sweep
    pub fn board_changed(&mut self, board: &BoardSnapshot, ledger: &CapitalLedger) -> Vec<InteractionEffect> {
        let Some(player) = self.player else {
            return Vec::new();
        };
        self.affordable = affordable_hexes(board, player, ledger, UnitType::cheapest_cost());
        vec![InteractionEffect::StateChanged]
    }

    /// Adopt a freshly fetched legal-action set
    pub fn set_legal_actions(&mut self, legal: LegalActionSet) -> Vec<InteractionEffect> {
        self.legal = legal;
        if !self.is_enabled() {
            return Vec::new();
        }
        if let Some(hex) = self.reselect.take() {
            self.state = if self.legal.is_move_origin(hex) {
                InteractionState::UnitSelected { origin: hex }
            } else {
                InteractionState::Idle
            };
        }
        vec![InteractionEffect::StateChanged]
    }

    // ========================================================================
    // INPUT
    // ========================================================================

    /// Handle a click; `None` means the pointer missed the board
    pub fn pick(
        &mut self,
        hex: Option<Hex>,
        board: &BoardSnapshot,
        ledger: &CapitalLedger,
    ) -> Vec<InteractionEffect> {
        let Some(player) = self.player else {
            // Spectating: clicks only inspect
            return hex
                .and_then(|h| board.get(h))
                .map(|cell| vec![InteractionEffect::OpenInfoPanel(cell.clone())])
                .unwrap_or_default();
        };
        if self.in_flight.is_some() {
            tracing::debug!("Ignoring pick while a request is in flight");
            return Vec::new();
        }

        match (self.state.clone(), hex) {
            (InteractionState::Idle, None) => Vec::new(),
            (InteractionState::Idle, Some(h)) => self.pick_from_idle(h, player, board, ledger),
            (InteractionState::UnitSelected { origin }, Some(h)) => {
                self.pick_with_selection(origin, h, player, board)
            }
            (InteractionState::PlacingUnit { unit_type, eligible }, Some(h)) => {
                if eligible.iter().any(|t| t.at == h) {
                    self.in_flight = Some(PendingAction::Purchase { unit_type, at: h });
                    vec![InteractionEffect::SubmitPurchase { unit_type, at: h }]
                } else {
                    self.to_idle()
                }
            }
            (_, None) => self.to_idle(),
        }
    }

    fn pick_from_idle(
        &mut self,
        hex: Hex,
        player: PlayerId,
        board: &BoardSnapshot,
        ledger: &CapitalLedger,
    ) -> Vec<InteractionEffect> {
        let Some(cell) = board.get(hex) else {
            return Vec::new();
        };

        if cell.ready_unit_of(player).is_some() {
            self.state = InteractionState::UnitSelected { origin: hex };
            return vec![InteractionEffect::StateChanged];
        }

        if cell.owner == Some(player) {
            if let Some(region) = region_at(board, hex, player, ledger) {
                let options = region.affordable_units();
                return vec![InteractionEffect::OpenPurchasePanel(PurchasePanel { region, options })];
            }
        }

        vec![InteractionEffect::OpenInfoPanel(cell.clone())]
    }

    fn pick_with_selection(
        &mut self,
        origin: Hex,
        hex: Hex,
        player: PlayerId,
        board: &BoardSnapshot,
    ) -> Vec<InteractionEffect> {
        if hex == origin {
            return self.to_idle();
        }

        if self.legal.move_between(origin, hex).is_some() {
            self.in_flight = Some(PendingAction::Move { from: origin, to: hex });
            return vec![InteractionEffect::SubmitMove { from: origin, to: hex }];
        }

        if board.get(hex).is_some_and(|c| c.ready_unit_of(player).is_some()) {
            self.state = InteractionState::UnitSelected { origin: hex };
            return vec![InteractionEffect::StateChanged];
        }

        self.to_idle()
    }

    /// Purchase-panel action: choose where to place a `unit_type` for `region`
    ///
    /// Eligible hexes are the server's purchases of that type that lie in the
    /// region or are attack placements bordering it.
    pub fn begin_placement(&mut self, unit_type: UnitType, region: &Region) -> Vec<InteractionEffect> {
        if !self.is_enabled() || self.in_flight.is_some() {
            return Vec::new();
        }

        let eligible = self
            .legal
            .purchases_of(unit_type)
            .filter(|p| region.contains(p.at) || (p.is_attack && region.borders(p.at)))
            .map(|p| PlacementTarget {
                at: p.at,
                is_attack: p.is_attack,
            })
            .collect();

        self.state = InteractionState::PlacingUnit { unit_type, eligible };
        vec![InteractionEffect::StateChanged]
    }

    /// Explicit cancel (escape key, panel close)
    pub fn cancel(&mut self) -> Vec<InteractionEffect> {
        if self.state.is_idle() {
            return Vec::new();
        }
        self.to_idle()
    }

    // ========================================================================
    // SERVER VERDICTS
    // ========================================================================

    /// The server answered the in-flight request
    pub fn action_resolved(&mut self, success: bool) -> Vec<InteractionEffect> {
        let Some(pending) = self.in_flight.take() else {
            return Vec::new();
        };

        self.state = InteractionState::Idle;
        match (pending, success) {
            (PendingAction::Move { to, .. }, true) => {
                self.reselect = Some(to);
            }
            (PendingAction::Purchase { at, .. }, true) => {
                self.state = InteractionState::UnitSelected { origin: at };
            }
            (_, false) => {
                tracing::info!("Server rejected {:?}", pending);
            }
        }

        vec![InteractionEffect::StateChanged, InteractionEffect::RefreshLegalActions]
    }

    /// The in-flight request was superseded (turn moved on while awaiting it)
    pub fn abandon_in_flight(&mut self) -> Vec<InteractionEffect> {
        if self.in_flight.take().is_none() {
            return Vec::new();
        }
        self.to_idle()
    }

    // ========================================================================
    // HIGHLIGHTS
    // ========================================================================

    pub fn highlights(&self) -> HighlightSet {
        let mut set = HighlightSet::new();
        match &self.state {
            InteractionState::Idle => {
                set.mark_all(&self.affordable, HighlightKind::Affordable);
            }
            InteractionState::UnitSelected { origin } => {
                set.select(*origin);
                for m in self.legal.destinations_from(*origin) {
                    set.mark(m.to, HighlightKind::for_move(m.is_attack));
                }
            }
            InteractionState::PlacingUnit { eligible, .. } => {
                for target in eligible {
                    set.mark(target.at, HighlightKind::for_placement(target.is_attack));
                }
            }
        }
        set
    }

    fn to_idle(&mut self) -> Vec<InteractionEffect> {
        self.state = InteractionState::Idle;
        vec![InteractionEffect::StateChanged]
    }
}
