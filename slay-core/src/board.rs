//! Hex board model with axial coordinates
//!
//! A [`BoardSnapshot`] is the client's copy of one authoritative board. It is
//! immutable once built: every server update replaces it wholesale.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Player index as assigned by the server
pub type PlayerId = u32;

/// Axial hex coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Hex {
    pub q: i32,
    pub r: i32,
}

impl Hex {
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    /// Third cube coordinate (q + r + s == 0)
    pub fn s(&self) -> i32 {
        -self.q - self.r
    }

    /// Distance between two hexes
    pub fn distance_to(&self, other: Hex) -> i32 {
        let dq = (self.q - other.q).abs();
        let dr = (self.r - other.r).abs();
        let ds = (self.s() - other.s()).abs();
        (dq + dr + ds) / 2
    }

    /// Get neighbor in direction (0-5)
    pub fn neighbor(&self, direction: usize) -> Hex {
        let (dq, dr) = DIRECTIONS[direction % 6];
        Hex::new(self.q + dq, self.r + dr)
    }

    /// All six neighbors, in [`DIRECTIONS`] order
    pub fn neighbors(&self) -> [Hex; 6] {
        std::array::from_fn(|d| self.neighbor(d))
    }

    pub fn is_adjacent(&self, other: Hex) -> bool {
        self.distance_to(other) == 1
    }

    /// Wire key used by the server for board and ledger maps ("q,r")
    pub fn key(&self) -> String {
        format!("{},{}", self.q, self.r)
    }
}

impl fmt::Display for Hex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

impl FromStr for Hex {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (q, r) = s
            .split_once(',')
            .ok_or_else(|| BoardError::InvalidKey(s.to_string()))?;
        let q = q.trim().parse().map_err(|_| BoardError::InvalidKey(s.to_string()))?;
        let r = r.trim().parse().map_err(|_| BoardError::InvalidKey(s.to_string()))?;
        Ok(Hex::new(q, r))
    }
}

/// Direction vectors in axial coordinates (dq, dr)
/// Index: 0=E, 1=NE, 2=NW, 3=W, 4=SW, 5=SE
pub const DIRECTIONS: [(i32, i32); 6] = [
    (1, 0),   // E
    (1, -1),  // NE
    (0, -1),  // NW
    (-1, 0),  // W
    (-1, 1),  // SW
    (0, 1),   // SE
];

// ============================================================================
// CELL CONTENTS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terrain {
    Land,
    Sea,
    Tree,
    Grave,
}

/// Unit catalogue
///
/// Cost and strength are display data mirrored from the server's rules; the
/// server alone decides what may be bought or moved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    Peasant,
    Spearman,
    Knight,
    Baron,
    Castle,
}

impl UnitType {
    pub const ALL: [UnitType; 5] = [
        UnitType::Peasant,
        UnitType::Spearman,
        UnitType::Knight,
        UnitType::Baron,
        UnitType::Castle,
    ];

    pub fn cost(self) -> i64 {
        match self {
            UnitType::Peasant => 10,
            UnitType::Spearman => 20,
            UnitType::Knight => 30,
            UnitType::Baron => 40,
            UnitType::Castle => 15,
        }
    }

    pub fn strength(self) -> u8 {
        match self {
            UnitType::Peasant => 1,
            UnitType::Spearman => 2,
            UnitType::Knight => 3,
            UnitType::Baron => 4,
            UnitType::Castle => 2,
        }
    }

    /// Cheapest purchasable unit; the affordable-territory threshold
    pub fn cheapest_cost() -> i64 {
        Self::ALL.iter().map(|u| u.cost()).min().unwrap_or(0)
    }

    pub fn symbol(self) -> char {
        match self {
            UnitType::Peasant => 'P',
            UnitType::Spearman => 'S',
            UnitType::Knight => 'K',
            UnitType::Baron => 'B',
            UnitType::Castle => 'C',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UnitType::Peasant => "peasant",
            UnitType::Spearman => "spearman",
            UnitType::Knight => "knight",
            UnitType::Baron => "baron",
            UnitType::Castle => "castle",
        }
    }
}

/// A unit standing on a hex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(rename = "type")]
    pub unit_type: UnitType,
    pub owner: PlayerId,
    #[serde(default)]
    pub has_moved: bool,
}

impl Unit {
    pub fn new(unit_type: UnitType, owner: PlayerId) -> Self {
        Self {
            unit_type,
            owner,
            has_moved: false,
        }
    }
}

/// One hex of the board
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HexCell {
    pub coord: Hex,
    pub terrain: Terrain,
    pub owner: Option<PlayerId>,
    pub unit: Option<Unit>,
    pub has_capital: bool,
}

impl HexCell {
    pub fn new(coord: Hex, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            owner: None,
            unit: None,
            has_capital: false,
        }
    }

    pub fn owned_by(mut self, owner: PlayerId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_capital(mut self) -> Self {
        self.has_capital = true;
        self
    }

    /// Unit belonging to `player` that has not acted this turn
    pub fn ready_unit_of(&self, player: PlayerId) -> Option<&Unit> {
        self.unit
            .as_ref()
            .filter(|u| u.owner == player && !u.has_moved)
    }
}

// ============================================================================
// BOARD SNAPSHOT
// ============================================================================

/// Errors raised while decoding a board from the wire
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("invalid coordinate key: {0:?}")]
    InvalidKey(String),

    #[error("hex keyed {key} reports coordinates {actual}")]
    CoordinateMismatch { key: Hex, actual: Hex },
}

/// Immutable mapping of axial coordinates to cells
///
/// Boards are sparse: only the hexes the server sends exist.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireBoard", into = "WireBoard")]
pub struct BoardSnapshot {
    width: i32,
    height: i32,
    cells: FxHashMap<Hex, HexCell>,
}

impl BoardSnapshot {
    pub fn new(width: i32, height: i32, cells: impl IntoIterator<Item = HexCell>) -> Self {
        Self {
            width,
            height,
            cells: cells.into_iter().map(|c| (c.coord, c)).collect(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn get(&self, hex: Hex) -> Option<&HexCell> {
        self.cells.get(&hex)
    }

    pub fn contains(&self, hex: Hex) -> bool {
        self.cells.contains_key(&hex)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &HexCell> {
        self.cells.values()
    }

    pub fn owner_of(&self, hex: Hex) -> Option<PlayerId> {
        self.get(hex).and_then(|c| c.owner)
    }

    /// Cells sorted row-major, for deterministic drawing and printing
    pub fn sorted_cells(&self) -> Vec<&HexCell> {
        let mut cells: Vec<&HexCell> = self.cells.values().collect();
        cells.sort_by_key(|c| (c.coord.r, c.coord.q));
        cells
    }

    /// ASCII representation for debugging
    pub fn to_ascii(&self) -> String {
        let mut lines = Vec::with_capacity(self.height.max(0) as usize);
        for r in 0..self.height {
            let r_offset = r / 2;
            let row: Vec<String> = (-r_offset..self.width - r_offset)
                .map(|q| {
                    let c = match self.get(Hex::new(q, r)) {
                        None => ' ',
                        Some(cell) if cell.terrain == Terrain::Sea => '~',
                        Some(cell) if cell.terrain == Terrain::Tree => 'T',
                        Some(cell) => match cell.owner {
                            Some(owner) => char::from_digit(owner % 36, 36).unwrap_or('?'),
                            None => '.',
                        },
                    };
                    c.to_string()
                })
                .collect();
            lines.push(format!("{}{}", " ".repeat(r_offset as usize), row.join(" ")));
        }
        lines.join("\n")
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

/// Board as serialized by the server: hexes keyed by "q,r"
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireBoard {
    pub width: i32,
    pub height: i32,
    pub hexes: BTreeMap<String, WireHex>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WireHex {
    pub q: i32,
    pub r: i32,
    pub terrain: Terrain,
    pub owner: Option<PlayerId>,
    pub unit: Option<Unit>,
    #[serde(default)]
    pub has_capital: bool,
}

impl TryFrom<WireBoard> for BoardSnapshot {
    type Error = BoardError;

    fn try_from(wire: WireBoard) -> Result<Self, Self::Error> {
        let mut cells = FxHashMap::default();
        cells.reserve(wire.hexes.len());

        for (key, hex) in wire.hexes {
            let keyed: Hex = key.parse()?;
            let actual = Hex::new(hex.q, hex.r);
            if keyed != actual {
                return Err(BoardError::CoordinateMismatch { key: keyed, actual });
            }
            cells.insert(
                actual,
                HexCell {
                    coord: actual,
                    terrain: hex.terrain,
                    owner: hex.owner,
                    unit: hex.unit,
                    has_capital: hex.has_capital,
                },
            );
        }

        Ok(Self {
            width: wire.width,
            height: wire.height,
            cells,
        })
    }
}

impl From<BoardSnapshot> for WireBoard {
    fn from(board: BoardSnapshot) -> Self {
        let hexes = board
            .cells
            .into_values()
            .map(|c| {
                (
                    c.coord.key(),
                    WireHex {
                        q: c.coord.q,
                        r: c.coord.r,
                        terrain: c.terrain,
                        owner: c.owner,
                        unit: c.unit,
                        has_capital: c.has_capital,
                    },
                )
            })
            .collect();
        Self {
            width: board.width,
            height: board.height,
            hexes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distance() {
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(0, 0)), 0);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(1, 0)), 1);
        assert_eq!(Hex::new(0, 0).distance_to(Hex::new(2, 2)), 4);
        assert_eq!(Hex::new(-1, 3).distance_to(Hex::new(2, -1)), 4);
    }

    #[test]
    fn test_neighbors_are_adjacent() {
        let center = Hex::new(3, -2);
        let neighbors = center.neighbors();
        for n in neighbors {
            assert!(center.is_adjacent(n));
        }
        assert_eq!(neighbors[0], Hex::new(4, -2));
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!("3,-4".parse::<Hex>().unwrap(), Hex::new(3, -4));
        assert_eq!(" -1 , 2 ".parse::<Hex>().unwrap(), Hex::new(-1, 2));
        assert!("3;4".parse::<Hex>().is_err());
        assert!("a,4".parse::<Hex>().is_err());
        assert_eq!(Hex::new(-7, 2).key(), "-7,2");
    }

    #[test]
    fn test_board_from_wire() {
        let board: BoardSnapshot = serde_json::from_value(json!({
            "width": 2,
            "height": 1,
            "hexes": {
                "0,0": {"q": 0, "r": 0, "terrain": "land", "owner": 1,
                        "unit": {"type": "knight", "owner": 1, "strength": 3, "has_moved": true},
                        "has_capital": true},
                "1,0": {"q": 1, "r": 0, "terrain": "sea", "owner": null, "unit": null}
            }
        }))
        .unwrap();

        assert_eq!(board.len(), 2);
        let cell = board.get(Hex::new(0, 0)).unwrap();
        assert_eq!(cell.owner, Some(1));
        assert!(cell.has_capital);
        assert_eq!(cell.unit.unwrap().unit_type, UnitType::Knight);
        assert!(cell.ready_unit_of(1).is_none());

        let sea = board.get(Hex::new(1, 0)).unwrap();
        assert_eq!(sea.terrain, Terrain::Sea);
        assert!(!sea.has_capital);
        assert!(board.get(Hex::new(5, 5)).is_none());
    }

    #[test]
    fn test_board_rejects_mismatched_key() {
        let result = serde_json::from_value::<BoardSnapshot>(json!({
            "width": 1,
            "height": 1,
            "hexes": {
                "0,0": {"q": 0, "r": 1, "terrain": "land", "owner": null, "unit": null}
            }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_ascii_rendering() {
        let board = BoardSnapshot::new(
            3,
            1,
            [
                HexCell::new(Hex::new(0, 0), Terrain::Sea),
                HexCell::new(Hex::new(1, 0), Terrain::Land).owned_by(2),
                HexCell::new(Hex::new(2, 0), Terrain::Tree),
            ],
        );
        assert_eq!(board.to_ascii(), "~ 2 T");
    }
}
