//! Territory aggregation
//!
//! Regions are derived, never stored: each query walks the current board
//! breadth-first over same-owner adjacency and reads the treasury from the
//! owner's capital ledger.

use std::collections::VecDeque;

use rustc_hash::FxHashSet;

use crate::board::{BoardSnapshot, Hex, PlayerId, UnitType};
use crate::players::CapitalLedger;

/// A maximal connected set of hexes owned by one player
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub owner: PlayerId,
    pub capital: Option<Hex>,
    pub members: FxHashSet<Hex>,
    pub gold: i64,
    /// One unit per member hex
    pub income: i64,
}

impl Region {
    pub fn contains(&self, hex: Hex) -> bool {
        self.members.contains(&hex)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True for hexes outside the region that touch one of its members
    pub fn borders(&self, hex: Hex) -> bool {
        !self.contains(hex) && hex.neighbors().iter().any(|n| self.contains(*n))
    }

    /// Unit types this region's treasury covers
    pub fn affordable_units(&self) -> Vec<UnitType> {
        UnitType::ALL
            .into_iter()
            .filter(|u| u.cost() <= self.gold)
            .collect()
    }
}

/// Raw result of one breadth-first walk
#[derive(Clone, Debug, Default)]
pub struct Traversal {
    /// Members in visit order
    pub members: Vec<Hex>,
    /// First member carrying a capital
    pub capital: Option<Hex>,
    /// Number of queue pops; equals `members.len()`
    pub dequeued: usize,
}

/// Walk all hexes owned by `owner` reachable from `start`
///
/// Coordinates are marked on enqueue so each one is visited at most once.
/// A start hex not owned by `owner` yields an empty traversal.
pub fn traverse(board: &BoardSnapshot, start: Hex, owner: PlayerId) -> Traversal {
    let mut out = Traversal::default();
    if board.owner_of(start) != Some(owner) {
        return out;
    }

    let mut seen = FxHashSet::default();
    let mut queue = VecDeque::new();
    seen.insert(start);
    queue.push_back(start);

    while let Some(hex) = queue.pop_front() {
        out.dequeued += 1;
        if out.capital.is_none() && board.get(hex).is_some_and(|c| c.has_capital) {
            out.capital = Some(hex);
        }
        out.members.push(hex);

        for n in hex.neighbors() {
            if board.owner_of(n) == Some(owner) && seen.insert(n) {
                queue.push_back(n);
            }
        }
    }

    out
}

/// Region of `owner` containing `start`, or `None` if `start` isn't theirs
pub fn region_at(
    board: &BoardSnapshot,
    start: Hex,
    owner: PlayerId,
    ledger: &CapitalLedger,
) -> Option<Region> {
    let walk = traverse(board, start, owner);
    if walk.members.is_empty() {
        return None;
    }

    let gold = match walk.capital {
        Some(capital) => ledger.gold_at(capital).unwrap_or(0),
        None => {
            tracing::debug!("Region at {} of player {} has no capital", start, owner);
            0
        }
    };

    Some(Region {
        owner,
        capital: walk.capital,
        income: walk.members.len() as i64,
        members: walk.members.into_iter().collect(),
        gold,
    })
}

/// All regions of `owner`, largest first
pub fn regions_of(board: &BoardSnapshot, owner: PlayerId, ledger: &CapitalLedger) -> Vec<Region> {
    let mut claimed = FxHashSet::default();
    let mut regions = Vec::new();

    for cell in board.sorted_cells() {
        if cell.owner != Some(owner) || claimed.contains(&cell.coord) {
            continue;
        }
        if let Some(region) = region_at(board, cell.coord, owner, ledger) {
            claimed.extend(region.members.iter().copied());
            regions.push(region);
        }
    }

    regions.sort_by(|a, b| b.len().cmp(&a.len()));
    regions
}

/// Union of every region of `owner` whose capital holds at least `threshold`
pub fn affordable_hexes(
    board: &BoardSnapshot,
    owner: PlayerId,
    ledger: &CapitalLedger,
    threshold: i64,
) -> FxHashSet<Hex> {
    let mut out = FxHashSet::default();
    for (capital, gold) in ledger.capitals() {
        if gold < threshold || out.contains(&capital) {
            continue;
        }
        out.extend(traverse(board, capital, owner).members);
    }
    out
}
