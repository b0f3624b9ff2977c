//! A single battlefield cell.

use serde::{Deserialize, Serialize};

use crate::data::{DamageKind, PartId, PartSlot};
use crate::geometry::Position;
use crate::unit::UnitId;

/// Identifier of a loose item lying on a tile.
pub type ItemId = u32;

/// The three independent light layers of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightLayer {
    /// Sun or moon light.
    Ambient,
    /// Light from terrain sources and fires.
    Static,
    /// Light carried by units.
    Dynamic,
}

impl LightLayer {
    /// All layers in storage order.
    pub const ALL: [Self; 3] = [Self::Ambient, Self::Static, Self::Dynamic];
}

/// Faces of a tile that can be revealed to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    /// West wall face.
    West,
    /// North wall face.
    North,
    /// Floor and content.
    Floor,
}

/// One tile of the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    position: Position,
    parts: [Option<PartId>; 4],
    sliding_open: [bool; 4],
    light: [u8; 3],
    /// Smoke density.
    pub smoke: u8,
    /// Turns of fire left.
    pub fire: u8,
    explosive: u32,
    explosive_kind: DamageKind,
    danger: bool,
    discovered: [bool; 3],
    /// Unit standing in the tile.
    pub unit: Option<UnitId>,
    /// Loose items lying in the tile.
    pub items: Vec<ItemId>,
}

impl Tile {
    /// Empty tile at a position.
    #[must_use]
    pub fn new(position: Position) -> Self {
        Self {
            position,
            parts: [None; 4],
            sliding_open: [false; 4],
            light: [0; 3],
            smoke: 0,
            fire: 0,
            explosive: 0,
            explosive_kind: DamageKind::HighExplosive,
            danger: false,
            discovered: [false; 3],
            unit: None,
            items: Vec::new(),
        }
    }

    /// Tile-space position.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Part id in a slot.
    #[must_use]
    pub const fn part(&self, slot: PartSlot) -> Option<PartId> {
        self.parts[slot.index()]
    }

    pub(crate) fn set_part(&mut self, slot: PartSlot, part: Option<PartId>) {
        self.parts[slot.index()] = part;
        self.sliding_open[slot.index()] = false;
    }

    /// True when no part occupies any slot.
    #[must_use]
    pub fn has_no_parts(&self) -> bool {
        self.parts.iter().all(Option::is_none)
    }

    /// Whether the sliding door in a slot is currently open.
    #[must_use]
    pub const fn is_slid_open(&self, slot: PartSlot) -> bool {
        self.sliding_open[slot.index()]
    }

    pub(crate) fn set_slid_open(&mut self, slot: PartSlot, open: bool) {
        self.sliding_open[slot.index()] = open;
    }

    /// Combined light level: the maximum over all layers.
    #[must_use]
    pub fn light(&self) -> u8 {
        self.light.iter().copied().max().unwrap_or(0)
    }

    /// Light level of one layer.
    #[must_use]
    pub const fn light_layer(&self, layer: LightLayer) -> u8 {
        self.light[layer as usize]
    }

    /// Overwrite one light layer.
    pub fn set_light(&mut self, layer: LightLayer, level: u8) {
        self.light[layer as usize] = level;
    }

    /// Raise one light layer to at least `level`.
    pub fn raise_light(&mut self, layer: LightLayer, level: u8) {
        let slot = &mut self.light[layer as usize];
        *slot = (*slot).max(level);
    }

    /// Power accumulated by the current detonation pass.
    #[must_use]
    pub const fn explosive(&self) -> u32 {
        self.explosive
    }

    /// Damage kind of the accumulated power.
    #[must_use]
    pub const fn explosive_kind(&self) -> DamageKind {
        self.explosive_kind
    }

    /// Record power delivered by a blast ray, keeping the maximum.
    pub fn add_explosive(&mut self, power: u32, kind: DamageKind) {
        if power > self.explosive {
            self.explosive = power;
            self.explosive_kind = kind;
        }
    }

    /// Reset the accumulator after detonation.
    pub fn clear_explosive(&mut self) {
        self.explosive = 0;
    }

    /// Marked dangerous by the AI for the rest of the turn.
    #[must_use]
    pub const fn is_dangerous(&self) -> bool {
        self.danger
    }

    /// Set or clear the danger mark.
    pub fn set_dangerous(&mut self, danger: bool) {
        self.danger = danger;
    }

    /// Whether a face has been revealed to the player.
    #[must_use]
    pub const fn is_discovered(&self, face: Face) -> bool {
        self.discovered[face as usize]
    }

    /// Reveal a face.
    pub fn discover(&mut self, face: Face) {
        self.discovered[face as usize] = true;
    }

    pub(crate) fn snapshot_state(&self) -> TileState {
        TileState {
            light: self.light,
            smoke: self.smoke,
            fire: self.fire,
            danger: self.danger,
            discovered: self.discovered,
            sliding_open: self.sliding_open,
            parts: self.parts,
        }
    }

    pub(crate) fn restore_state(&mut self, state: &TileState) {
        self.light = state.light;
        self.smoke = state.smoke;
        self.fire = state.fire;
        self.danger = state.danger;
        self.discovered = state.discovered;
        self.sliding_open = state.sliding_open;
        self.parts = state.parts;
    }
}

/// Mutable per-tile state carried in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileState {
    /// Light layers.
    pub light: [u8; 3],
    /// Smoke density.
    pub smoke: u8,
    /// Fire turns.
    pub fire: u8,
    /// Danger mark.
    pub danger: bool,
    /// Revealed faces.
    pub discovered: [bool; 3],
    /// Sliding door flags.
    pub sliding_open: [bool; 4],
    /// Part ids, which change when doors open or parts are destroyed.
    pub parts: [Option<PartId>; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_is_layer_max() {
        let mut tile = Tile::new(Position::ZERO);
        tile.set_light(LightLayer::Ambient, 4);
        tile.set_light(LightLayer::Dynamic, 9);
        tile.raise_light(LightLayer::Static, 7);
        tile.raise_light(LightLayer::Dynamic, 3);
        assert_eq!(tile.light(), 9);
        assert_eq!(tile.light_layer(LightLayer::Static), 7);
    }

    #[test]
    fn test_explosive_accumulator_keeps_max() {
        let mut tile = Tile::new(Position::ZERO);
        tile.add_explosive(40, DamageKind::HighExplosive);
        tile.add_explosive(25, DamageKind::Stun);
        assert_eq!(tile.explosive(), 40);
        assert_eq!(tile.explosive_kind(), DamageKind::HighExplosive);
        tile.clear_explosive();
        assert_eq!(tile.explosive(), 0);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut tile = Tile::new(Position::new(1, 1, 0));
        tile.smoke = 3;
        tile.set_dangerous(true);
        tile.discover(Face::North);
        tile.set_part(PartSlot::Floor, Some(2));
        let state = tile.snapshot_state();

        let mut other = Tile::new(Position::new(1, 1, 0));
        other.restore_state(&state);
        assert_eq!(other, tile);
    }
}
