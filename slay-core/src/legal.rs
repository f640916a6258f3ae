//! Server-issued legal actions
//!
//! The client never derives legality itself; these lists are the only
//! authority consulted before sending a request.

use serde::{Deserialize, Serialize};

use crate::board::{Hex, UnitType};

/// A permitted move of the unit at `from`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireMove", into = "WireMove")]
pub struct ValidMove {
    pub from: Hex,
    pub to: Hex,
    pub is_attack: bool,
}

/// A permitted purchase placing `unit_type` at `at`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WirePurchase", into = "WirePurchase")]
pub struct ValidPurchase {
    pub at: Hex,
    pub unit_type: UnitType,
    pub cost: i64,
    pub is_attack: bool,
}

/// Everything the active human may currently do
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegalActionSet {
    pub moves: Vec<ValidMove>,
    pub purchases: Vec<ValidPurchase>,
}

impl LegalActionSet {
    pub fn new(moves: Vec<ValidMove>, purchases: Vec<ValidPurchase>) -> Self {
        Self { moves, purchases }
    }

    pub fn destinations_from(&self, origin: Hex) -> impl Iterator<Item = &ValidMove> {
        self.moves.iter().filter(move |m| m.from == origin)
    }

    pub fn move_between(&self, from: Hex, to: Hex) -> Option<&ValidMove> {
        self.moves.iter().find(|m| m.from == from && m.to == to)
    }

    pub fn is_move_origin(&self, hex: Hex) -> bool {
        self.moves.iter().any(|m| m.from == hex)
    }

    pub fn purchases_of(&self, unit_type: UnitType) -> impl Iterator<Item = &ValidPurchase> {
        self.purchases.iter().filter(move |p| p.unit_type == unit_type)
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.purchases.is_empty()
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Clone, Copy, Serialize, Deserialize)]
struct WireMove {
    from_q: i32,
    from_r: i32,
    to_q: i32,
    to_r: i32,
    #[serde(default)]
    is_attack: bool,
}

impl From<WireMove> for ValidMove {
    fn from(w: WireMove) -> Self {
        Self {
            from: Hex::new(w.from_q, w.from_r),
            to: Hex::new(w.to_q, w.to_r),
            is_attack: w.is_attack,
        }
    }
}

impl From<ValidMove> for WireMove {
    fn from(m: ValidMove) -> Self {
        Self {
            from_q: m.from.q,
            from_r: m.from.r,
            to_q: m.to.q,
            to_r: m.to.r,
            is_attack: m.is_attack,
        }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
struct WirePurchase {
    unit_type: UnitType,
    q: i32,
    r: i32,
    #[serde(default)]
    cost: i64,
    #[serde(default)]
    is_attack: bool,
}

impl From<WirePurchase> for ValidPurchase {
    fn from(w: WirePurchase) -> Self {
        Self {
            at: Hex::new(w.q, w.r),
            unit_type: w.unit_type,
            cost: w.cost,
            is_attack: w.is_attack,
        }
    }
}

impl From<ValidPurchase> for WirePurchase {
    fn from(p: ValidPurchase) -> Self {
        Self {
            unit_type: p.unit_type,
            q: p.at.q,
            r: p.at.r,
            cost: p.cost,
            is_attack: p.is_attack,
        }
    }
}
