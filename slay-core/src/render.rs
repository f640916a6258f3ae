//! Render-frame composition
//!
//! Turns a board, a highlight set and a view transform into screen-space
//! polygons. Colors come from a [`ColorProvider`], so styling stays outside
//! the geometry code.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::board::{BoardSnapshot, Hex, PlayerId, Terrain, UnitType};
use crate::geometry::{HexLayout, Point, ViewTransform};

/// 24-bit color
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse "#RRGGBB"
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = s.strip_prefix('#')?;
        if digits.len() != 6 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Why a hex is highlighted; later variants draw over earlier ones
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HighlightKind {
    Affordable,
    Move,
    Attack,
    Placement,
    PlacementAttack,
}

impl HighlightKind {
    pub fn for_move(is_attack: bool) -> Self {
        if is_attack {
            HighlightKind::Attack
        } else {
            HighlightKind::Move
        }
    }

    pub fn for_placement(is_attack: bool) -> Self {
        if is_attack {
            HighlightKind::PlacementAttack
        } else {
            HighlightKind::Placement
        }
    }
}

/// Highlighted hexes plus the selection marker
///
/// The selection marker is drawn separately and does not count toward
/// [`HighlightSet::is_empty`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HighlightSet {
    selection: Option<Hex>,
    targets: FxHashMap<Hex, HighlightKind>,
}

impl HighlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, hex: Hex) {
        self.selection = Some(hex);
    }

    /// Add a highlight, keeping the stronger kind if one is already present
    pub fn mark(&mut self, hex: Hex, kind: HighlightKind) {
        let entry = self.targets.entry(hex).or_insert(kind);
        if kind > *entry {
            *entry = kind;
        }
    }

    pub fn mark_all(&mut self, hexes: &FxHashSet<Hex>, kind: HighlightKind) {
        for hex in hexes {
            self.mark(*hex, kind);
        }
    }

    pub fn selection(&self) -> Option<Hex> {
        self.selection
    }

    pub fn get(&self, hex: Hex) -> Option<HighlightKind> {
        self.targets.get(&hex).copied()
    }

    pub fn targets(&self) -> impl Iterator<Item = (Hex, HighlightKind)> + '_ {
        self.targets.iter().map(|(h, k)| (*h, *k))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

// ============================================================================
// COLORS
// ============================================================================

/// Styling capability queried by the frame composer
pub trait ColorProvider {
    fn terrain(&self, terrain: Terrain) -> Rgb;
    fn player(&self, player: PlayerId) -> Rgb;
    fn highlight(&self, kind: HighlightKind) -> Rgb;
    fn selection(&self) -> Rgb;
}

/// Pastel palette matching the server's player colors
#[derive(Clone, Debug)]
pub struct DefaultPalette {
    players: Vec<Rgb>,
}

const PLAYER_COLORS: [&str; 6] = ["#F0A8A8", "#A8C8F0", "#B8E0B0", "#F0E8A8", "#D8B8E8", "#F0C8A8"];

impl Default for DefaultPalette {
    fn default() -> Self {
        Self {
            players: PLAYER_COLORS.iter().filter_map(|c| Rgb::from_hex(c)).collect(),
        }
    }
}

impl DefaultPalette {
    /// Palette using the colors the server reports per player, in id order
    pub fn from_server_colors<'a>(colors: impl IntoIterator<Item = &'a str>) -> Self {
        let players: Vec<Rgb> = colors.into_iter().filter_map(Rgb::from_hex).collect();
        if players.is_empty() {
            Self::default()
        } else {
            Self { players }
        }
    }
}

impl ColorProvider for DefaultPalette {
    fn terrain(&self, terrain: Terrain) -> Rgb {
        match terrain {
            Terrain::Land => Rgb::new(0xE8, 0xE0, 0xD0),
            Terrain::Sea => Rgb::new(0x6C, 0x9C, 0xC8),
            Terrain::Tree => Rgb::new(0x4F, 0x8A, 0x4F),
            Terrain::Grave => Rgb::new(0x80, 0x80, 0x80),
        }
    }

    fn player(&self, player: PlayerId) -> Rgb {
        self.players
            .get(player as usize % self.players.len().max(1))
            .copied()
            .unwrap_or(Rgb::new(0xFF, 0xFF, 0xFF))
    }

    fn highlight(&self, kind: HighlightKind) -> Rgb {
        match kind {
            HighlightKind::Affordable => Rgb::new(0xFF, 0xD7, 0x00),
            HighlightKind::Move => Rgb::new(0x32, 0xCD, 0x32),
            HighlightKind::Attack => Rgb::new(0xDC, 0x14, 0x3C),
            HighlightKind::Placement => Rgb::new(0x1E, 0x90, 0xFF),
            HighlightKind::PlacementAttack => Rgb::new(0xFF, 0x8C, 0x00),
        }
    }

    fn selection(&self) -> Rgb {
        Rgb::new(0xFF, 0xFF, 0xFF)
    }
}

// ============================================================================
// FRAME
// ============================================================================

/// One hex ready to draw
#[derive(Clone, Debug, PartialEq)]
pub struct HexShape {
    pub coord: Hex,
    pub center: Point,
    pub corners: [Point; 6],
    pub fill: Rgb,
    /// Overlay for highlighted hexes
    pub overlay: Option<Rgb>,
    pub outline: Option<Rgb>,
    pub unit: Option<(UnitType, bool)>,
    pub capital: bool,
}

/// Screen-space draw list for one board
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderFrame {
    pub shapes: Vec<HexShape>,
    pub zoom: f64,
}

/// Compose a frame; shapes come out row-major so overlapping outlines are stable
pub fn compose_frame(
    board: &BoardSnapshot,
    highlights: &HighlightSet,
    transform: &ViewTransform,
    layout: &HexLayout,
    colors: &dyn ColorProvider,
) -> RenderFrame {
    let scaled = HexLayout::new(layout.size * transform.zoom);

    let shapes = board
        .sorted_cells()
        .into_iter()
        .map(|cell| {
            let center = transform.to_screen(layout.hex_to_pixel(cell.coord));
            let fill = match (cell.terrain, cell.owner) {
                (Terrain::Land, Some(owner)) => colors.player(owner),
                (terrain, _) => colors.terrain(terrain),
            };
            HexShape {
                coord: cell.coord,
                center,
                corners: scaled.corners(center),
                fill,
                overlay: highlights.get(cell.coord).map(|k| colors.highlight(k)),
                outline: (highlights.selection() == Some(cell.coord)).then(|| colors.selection()),
                unit: cell.unit.map(|u| (u.unit_type, u.has_moved)),
                capital: cell.has_capital,
            }
        })
        .collect();

    RenderFrame {
        shapes,
        zoom: transform.zoom,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::HexCell;

    #[test]
    fn test_rgb_parsing() {
        assert_eq!(Rgb::from_hex("#F0A8A8"), Some(Rgb::new(0xF0, 0xA8, 0xA8)));
        assert_eq!(Rgb::from_hex("F0A8A8"), None);
        assert_eq!(Rgb::from_hex("#F0A8"), None);
        assert_eq!(Rgb::from_hex("#GGGGGG"), None);
    }

    #[test]
    fn test_stronger_highlight_wins() {
        let mut set = HighlightSet::new();
        let hex = Hex::new(1, 1);
        set.mark(hex, HighlightKind::Attack);
        set.mark(hex, HighlightKind::Affordable);
        assert_eq!(set.get(hex), Some(HighlightKind::Attack));
        set.mark(hex, HighlightKind::PlacementAttack);
        assert_eq!(set.get(hex), Some(HighlightKind::PlacementAttack));
    }

    #[test]
    fn test_selection_not_counted() {
        let mut set = HighlightSet::new();
        set.select(Hex::new(0, 0));
        assert!(set.is_empty());
        assert_eq!(set.selection(), Some(Hex::new(0, 0)));
    }

    #[test]
    fn test_compose_frame_colors() {
        let board = BoardSnapshot::new(
            2,
            1,
            [
                HexCell::new(Hex::new(0, 0), Terrain::Land).owned_by(1),
                HexCell::new(Hex::new(1, 0), Terrain::Sea),
            ],
        );
        let mut highlights = HighlightSet::new();
        highlights.select(Hex::new(0, 0));
        highlights.mark(Hex::new(1, 0), HighlightKind::Move);

        let palette = DefaultPalette::default();
        let transform = ViewTransform {
            pan: Point::default(),
            zoom: 2.0,
            centering: Point::new(100.0, 100.0),
        };
        let frame = compose_frame(&board, &highlights, &transform, &HexLayout::new(10.0), &palette);

        assert_eq!(frame.shapes.len(), 2);
        let land = &frame.shapes[0];
        assert_eq!(land.coord, Hex::new(0, 0));
        assert_eq!(land.fill, palette.player(1));
        assert_eq!(land.outline, Some(palette.selection()));
        assert_eq!(land.center, Point::new(200.0, 200.0));
        assert!((land.corners[0].distance_to(land.center) - 20.0).abs() < 1e-9);

        let sea = &frame.shapes[1];
        assert_eq!(sea.fill, palette.terrain(Terrain::Sea));
        assert_eq!(sea.overlay, Some(palette.highlight(HighlightKind::Move)));
        assert_eq!(sea.outline, None);
    }
}
