//! Hex geometry, viewport and pointer picking
//!
//! Layout is pointy-top. Screen points map to board-local points through a
//! [`ViewTransform`]: `screen = (local + centering) * zoom + pan`. Drawing and
//! picking must use the same transform snapshot, so the engine hands one out
//! per frame instead of letting callers read the viewport piecemeal.

use crate::board::{BoardSnapshot, Hex};

const SQRT_3: f64 = 1.732_050_807_568_877_2;

/// A point in pixel space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

// ============================================================================
// LAYOUT
// ============================================================================

/// Pointy-top hex layout with a given circumradius
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HexLayout {
    pub size: f64,
}

impl HexLayout {
    pub fn new(size: f64) -> Self {
        Self { size }
    }

    /// Center of `hex` in board-local pixels
    pub fn hex_to_pixel(&self, hex: Hex) -> Point {
        let q = hex.q as f64;
        let r = hex.r as f64;
        Point::new(self.size * SQRT_3 * (q + r / 2.0), self.size * 1.5 * r)
    }

    /// Fractional axial coordinates of a board-local point
    pub fn pixel_to_fractional(&self, p: Point) -> (f64, f64) {
        let q = (SQRT_3 / 3.0 * p.x - p.y / 3.0) / self.size;
        let r = (2.0 / 3.0 * p.y) / self.size;
        (q, r)
    }

    /// Hex containing a board-local point (unbounded grid)
    pub fn pixel_to_hex(&self, p: Point) -> Hex {
        let (q, r) = self.pixel_to_fractional(p);
        cube_round(q, r)
    }

    /// Corner points around `center`, clockwise from the upper right
    pub fn corners(&self, center: Point) -> [Point; 6] {
        std::array::from_fn(|i| {
            let angle = (60.0 * i as f64 - 30.0).to_radians();
            Point::new(
                center.x + self.size * angle.cos(),
                center.y + self.size * angle.sin(),
            )
        })
    }
}

/// Round fractional axial coordinates to the containing hex
///
/// Rounds in cube space and rebuilds the component with the largest rounding
/// error from the other two, keeping `x + y + z == 0`.
pub fn cube_round(q: f64, r: f64) -> Hex {
    let (x, z) = (q, r);
    let y = -x - z;

    let mut rx = x.round();
    let mut ry = y.round();
    let mut rz = z.round();

    let dx = (rx - x).abs();
    let dy = (ry - y).abs();
    let dz = (rz - z).abs();

    if dx > dy && dx > dz {
        rx = -ry - rz;
    } else if dy > dz {
        ry = -rx - rz;
    } else {
        rz = -rx - ry;
    }
    debug_assert_eq!(rx + ry + rz, 0.0);

    Hex::new(rx as i32, rz as i32)
}

// ============================================================================
// VIEWPORT
// ============================================================================

/// Snapshot of the affine screen <-> board transform
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub pan: Point,
    pub zoom: f64,
    pub centering: Point,
}

impl ViewTransform {
    pub fn to_screen(&self, local: Point) -> Point {
        Point::new(
            (local.x + self.centering.x) * self.zoom + self.pan.x,
            (local.y + self.centering.y) * self.zoom + self.pan.y,
        )
    }

    /// Undo pan, then scale, then the board-centering offset
    pub fn to_local(&self, screen: Point) -> Point {
        Point::new(
            (screen.x - self.pan.x) / self.zoom - self.centering.x,
            (screen.y - self.pan.y) / self.zoom - self.centering.y,
        )
    }
}

/// Pan/zoom state, mutated only by user gestures
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    pan: Point,
    zoom: f64,
    min_zoom: f64,
    max_zoom: f64,
    drag_anchor: Option<Point>,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0.25, 4.0)
    }
}

impl Viewport {
    pub fn new(min_zoom: f64, max_zoom: f64) -> Self {
        Self {
            pan: Point::default(),
            zoom: 1.0,
            min_zoom,
            max_zoom,
            drag_anchor: None,
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_anchor.is_some()
    }

    pub fn begin_drag(&mut self, at: Point) {
        self.drag_anchor = Some(at);
    }

    pub fn drag_to(&mut self, at: Point) {
        if let Some(last) = self.drag_anchor {
            self.pan.x += at.x - last.x;
            self.pan.y += at.y - last.y;
            self.drag_anchor = Some(at);
        }
    }

    pub fn end_drag(&mut self) {
        self.drag_anchor = None;
    }

    /// Zoom by `factor` keeping the screen point `anchor` fixed
    pub fn zoom_at(&mut self, factor: f64, anchor: Point) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let new_zoom = (self.zoom * factor).clamp(self.min_zoom, self.max_zoom);
        let ratio = new_zoom / self.zoom;
        self.pan.x = anchor.x - (anchor.x - self.pan.x) * ratio;
        self.pan.y = anchor.y - (anchor.y - self.pan.y) * ratio;
        self.zoom = new_zoom;
    }

    pub fn reset(&mut self) {
        self.pan = Point::default();
        self.zoom = 1.0;
        self.drag_anchor = None;
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Layout + viewport + canvas: everything needed to draw and pick
#[derive(Clone, Debug)]
pub struct GeometryEngine {
    layout: HexLayout,
    viewport: Viewport,
    canvas: Point,
}

impl GeometryEngine {
    pub fn new(layout: HexLayout, viewport: Viewport, canvas_width: f64, canvas_height: f64) -> Self {
        Self {
            layout,
            viewport,
            canvas: Point::new(canvas_width, canvas_height),
        }
    }

    pub fn layout(&self) -> &HexLayout {
        &self.layout
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.canvas = Point::new(width, height);
    }

    /// Offset that centers the board's hex centers on the canvas
    pub fn centering_offset(&self, board: &BoardSnapshot) -> Point {
        let mut cells = board.cells();
        let Some(first) = cells.next() else {
            return Point::new(self.canvas.x / 2.0, self.canvas.y / 2.0);
        };
        let p = self.layout.hex_to_pixel(first.coord);
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (p.x, p.x, p.y, p.y);
        for cell in cells {
            let p = self.layout.hex_to_pixel(cell.coord);
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Point::new(
            self.canvas.x / 2.0 - (min_x + max_x) / 2.0,
            self.canvas.y / 2.0 - (min_y + max_y) / 2.0,
        )
    }

    /// Transform snapshot for one draw-or-pick pass over `board`
    pub fn transform(&self, board: &BoardSnapshot) -> ViewTransform {
        ViewTransform {
            pan: self.viewport.pan,
            zoom: self.viewport.zoom,
            centering: self.centering_offset(board),
        }
    }

    pub fn pick(&self, screen: Point, board: &BoardSnapshot) -> Option<Hex> {
        pick_with(&self.transform(board), &self.layout, screen, board)
    }
}

/// Resolve a screen point to a hex present on `board`
pub fn pick_with(
    transform: &ViewTransform,
    layout: &HexLayout,
    screen: Point,
    board: &BoardSnapshot,
) -> Option<Hex> {
    let local = transform.to_local(screen);
    let hex = layout.pixel_to_hex(local);
    board.contains(hex).then_some(hex)
}
