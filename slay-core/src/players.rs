//! Player summaries and per-capital gold ledgers

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::board::{BoardError, Hex, PlayerId};

/// Player summary as pushed by the server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: PlayerId,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub color_name: String,
    #[serde(default)]
    pub eliminated: bool,
    #[serde(default)]
    pub total_gold: i64,
    #[serde(default)]
    pub total_territory: u32,
    #[serde(default)]
    pub total_units: u32,
    #[serde(default)]
    pub total_trees: u32,
    #[serde(default)]
    pub total_graves: u32,
    /// Gold per region, keyed by the region's capital ("q,r")
    #[serde(default)]
    pub region_gold: BTreeMap<String, i64>,
}

impl PlayerInfo {
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            color: String::new(),
            color_name: String::new(),
            eliminated: false,
            total_gold: 0,
            total_territory: 0,
            total_units: 0,
            total_trees: 0,
            total_graves: 0,
            region_gold: BTreeMap::new(),
        }
    }

    /// Display name, falling back to the numeric id
    pub fn display_name(&self) -> String {
        if self.color_name.is_empty() {
            format!("Player {}", self.id)
        } else {
            self.color_name.clone()
        }
    }

    pub fn ledger(&self) -> Result<CapitalLedger, BoardError> {
        let gold = self
            .region_gold
            .iter()
            .map(|(key, gold)| Ok((key.parse::<Hex>()?, *gold)))
            .collect::<Result<_, BoardError>>()?;
        Ok(CapitalLedger { gold })
    }
}

/// Mapping capital coordinate -> regional treasury
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapitalLedger {
    gold: FxHashMap<Hex, i64>,
}

impl CapitalLedger {
    pub fn new(entries: impl IntoIterator<Item = (Hex, i64)>) -> Self {
        Self {
            gold: entries.into_iter().collect(),
        }
    }

    pub fn gold_at(&self, capital: Hex) -> Option<i64> {
        self.gold.get(&capital).copied()
    }

    pub fn capitals(&self) -> impl Iterator<Item = (Hex, i64)> + '_ {
        self.gold.iter().map(|(h, g)| (*h, *g))
    }

    pub fn is_empty(&self) -> bool {
        self.gold.is_empty()
    }
}

/// All players of one game state, with their ledgers decoded
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Roster {
    players: Vec<PlayerInfo>,
    ledgers: FxHashMap<PlayerId, CapitalLedger>,
}

impl Roster {
    pub fn new(players: Vec<PlayerInfo>) -> Result<Self, BoardError> {
        let ledgers = players
            .iter()
            .map(|p| Ok((p.id, p.ledger()?)))
            .collect::<Result<_, BoardError>>()?;
        Ok(Self { players, ledgers })
    }

    pub fn players(&self) -> &[PlayerInfo] {
        &self.players
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerInfo> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Ledger for `id`; an unknown player has an empty ledger
    pub fn ledger(&self, id: PlayerId) -> CapitalLedger {
        self.ledgers.get(&id).cloned().unwrap_or_default()
    }

    pub fn name_of(&self, id: PlayerId) -> String {
        self.get(id)
            .map(PlayerInfo::display_name)
            .unwrap_or_else(|| format!("Player {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ledger_from_region_gold() {
        let player: PlayerInfo = serde_json::from_value(json!({
            "id": 2,
            "color": "#B8E0B0",
            "color_name": "Mint",
            "region_gold": {"3,4": 25, "-1,0": 7}
        }))
        .unwrap();

        let ledger = player.ledger().unwrap();
        assert_eq!(ledger.gold_at(Hex::new(3, 4)), Some(25));
        assert_eq!(ledger.gold_at(Hex::new(-1, 0)), Some(7));
        assert_eq!(ledger.gold_at(Hex::new(0, 0)), None);
        assert_eq!(player.display_name(), "Mint");
    }

    #[test]
    fn test_roster_rejects_bad_ledger_key() {
        let mut player = PlayerInfo::new(0);
        player.region_gold.insert("nope".to_string(), 3);
        assert!(Roster::new(vec![player]).is_err());
    }

    #[test]
    fn test_roster_unknown_player() {
        let roster = Roster::new(vec![PlayerInfo::new(0)]).unwrap();
        assert!(roster.ledger(9).is_empty());
        assert_eq!(roster.name_of(9), "Player 9");
    }
}
