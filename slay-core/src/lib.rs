//! Slay Core - Board model and interaction logic
//!
//! This crate provides the I/O-free core of the Slay client:
//! - Board model (hex grid with axial coordinates) and its wire format
//! - Geometry: hex <-> pixel transforms, viewport, pointer picking
//! - Territory aggregation (regions, treasuries, affordable sweep)
//! - Server-issued legal actions
//! - Interaction state machine (select -> move, buy -> place)
//! - Render-frame composition behind a color provider

pub mod board;
pub mod players;
pub mod geometry;
pub mod territory;
pub mod legal;
pub mod interaction;
pub mod render;

// Re-exports for convenient access
pub use board::{BoardError, BoardSnapshot, Hex, HexCell, PlayerId, Terrain, Unit, UnitType, DIRECTIONS};
pub use players::{CapitalLedger, PlayerInfo, Roster};
pub use geometry::{GeometryEngine, HexLayout, Point, ViewTransform, Viewport};
pub use territory::{affordable_hexes, region_at, regions_of, Region};
pub use legal::{LegalActionSet, ValidMove, ValidPurchase};
pub use interaction::{InteractionEffect, InteractionMachine, InteractionState, PendingAction, PlacementTarget, PurchasePanel};
pub use render::{compose_frame, ColorProvider, DefaultPalette, HighlightKind, HighlightSet, RenderFrame, Rgb};
