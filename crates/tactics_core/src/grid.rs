//! The 3D tile grid.
//!
//! Tiles live in one flat vector indexed `x + y * width + z * width * length`.
//! Everything that refers to a tile from elsewhere (path nodes, occupancy,
//! snapshots) stores that index or the tile-space position, never a
//! reference.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{BigWall, DoorKind, LoftLibrary, PartId, PartLibrary, PartSlot, TilePart};
use crate::error::{Result, TacticsError};
use crate::geometry::{Direction, Position};
use crate::tile::Tile;

/// Terrain level at or below which an object lifts its occupant onto the
/// next level up.
pub const STAIR_TERRAIN_LEVEL: i32 = -16;

/// What happened when a unit tried a door.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorOutcome {
    /// There is no door in that slot.
    NoDoor,
    /// A hinged door swapped to its open variant.
    OpenedHinged,
    /// A sliding door slid aside.
    OpenedSliding,
    /// The sliding door was already open.
    AlreadyOpen,
    /// A unit stands in the doorway of a sliding door.
    Blocked,
}

/// Battlefield tiles plus the rule libraries their parts refer to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileGrid {
    width: i32,
    length: i32,
    height: i32,
    tiles: Vec<Tile>,
    parts: PartLibrary,
    lofts: LoftLibrary,
}

impl TileGrid {
    /// Allocate an empty grid.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::InvalidDimensions`] unless every dimension is
    /// positive.
    pub fn new(
        width: i32,
        length: i32,
        height: i32,
        parts: PartLibrary,
        lofts: LoftLibrary,
    ) -> Result<Self> {
        if width <= 0 || length <= 0 || height <= 0 {
            return Err(TacticsError::InvalidDimensions {
                width,
                length,
                height,
            });
        }
        let count = (width * length * height) as usize;
        let mut tiles = Vec::with_capacity(count);
        for index in 0..count {
            tiles.push(Tile::new(Self::unflatten(width, length, index)));
        }
        Ok(Self {
            width,
            length,
            height,
            tiles,
            parts,
            lofts,
        })
    }

    fn unflatten(width: i32, length: i32, index: usize) -> Position {
        let index = index as i32;
        let layer = width * length;
        Position::new(index % width, (index % layer) / width, index / layer)
    }

    /// Tiles along x.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Tiles along y.
    #[must_use]
    pub const fn length(&self) -> i32 {
        self.length
    }

    /// Levels along z.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Total number of tiles.
    #[must_use]
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Part rules.
    #[must_use]
    pub const fn parts(&self) -> &PartLibrary {
        &self.parts
    }

    /// LOFT masks.
    #[must_use]
    pub const fn lofts(&self) -> &LoftLibrary {
        &self.lofts
    }

    /// Whether a tile-space position lies inside the grid.
    #[must_use]
    pub const fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.z >= 0
            && pos.x < self.width
            && pos.y < self.length
            && pos.z < self.height
    }

    /// Flat index of a position.
    #[must_use]
    pub fn index_of(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some((pos.x + pos.y * self.width + pos.z * self.width * self.length) as usize)
        } else {
            None
        }
    }

    /// Position of a flat index.
    #[must_use]
    pub fn position_of(&self, index: usize) -> Position {
        Self::unflatten(self.width, self.length, index)
    }

    /// Tile at a position.
    #[must_use]
    pub fn tile(&self, pos: Position) -> Option<&Tile> {
        self.index_of(pos).map(|i| &self.tiles[i])
    }

    /// Mutable tile at a position.
    pub fn tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        self.index_of(pos).map(move |i| &mut self.tiles[i])
    }

    /// Tile at a position, treating out-of-grid as a contract violation.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::OutOfGrid`] for positions outside the grid.
    pub fn tile_checked_mut(&mut self, pos: Position) -> Result<&mut Tile> {
        self.tile_mut(pos).ok_or(TacticsError::OutOfGrid(pos))
    }

    /// Tile by flat index.
    #[must_use]
    pub fn tile_at(&self, index: usize) -> &Tile {
        &self.tiles[index]
    }

    /// All tiles in index order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    /// All tiles in index order, mutably.
    pub fn tiles_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.iter_mut()
    }

    /// Neighbouring in-grid position one step away.
    #[must_use]
    pub fn neighbor(&self, pos: Position, direction: Direction) -> Option<Position> {
        let next = pos.step(direction);
        self.in_bounds(next).then_some(next)
    }

    /// Rule record of the part in a slot, as placed.
    #[must_use]
    pub fn part(&self, pos: Position, slot: PartSlot) -> Option<&TilePart> {
        self.tile(pos)
            .and_then(|t| t.part(slot))
            .and_then(|id| self.parts.get(id))
    }

    /// Rule record of the part in a slot as it currently stands in the way:
    /// an open sliding door no longer counts.
    #[must_use]
    pub fn active_part(&self, pos: Position, slot: PartSlot) -> Option<&TilePart> {
        let tile = self.tile(pos)?;
        if tile.is_slid_open(slot) {
            return None;
        }
        tile.part(slot).and_then(|id| self.parts.get(id))
    }

    /// Tile and slot of the edge a step from `from` crosses.
    ///
    /// Each tile owns its west and north edges, so a step east or south
    /// crosses the neighbour's wall. Diagonal and vertical steps return `None`.
    #[must_use]
    pub fn wall_edge(from: Position, direction: Direction) -> Option<(Position, PartSlot)> {
        match direction {
            Direction::North => Some((from, PartSlot::NorthWall)),
            Direction::West => Some((from, PartSlot::WestWall)),
            Direction::South => Some((from.step(direction), PartSlot::NorthWall)),
            Direction::East => Some((from.step(direction), PartSlot::WestWall)),
            _ => None,
        }
    }

    /// Wall standing between a tile and its orthogonal neighbour.
    #[must_use]
    pub fn wall_between(&self, from: Position, direction: Direction) -> Option<&TilePart> {
        let (tile, slot) = Self::wall_edge(from, direction)?;
        self.active_part(tile, slot)
    }

    /// Floor separating a tile from the level above or below.
    ///
    /// Horizontal steps return `None`.
    #[must_use]
    pub fn floor_between(&self, from: Position, direction: Direction) -> Option<&TilePart> {
        match direction {
            Direction::Up => self.part(from.step(direction), PartSlot::Floor),
            Direction::Down => self.part(from, PartSlot::Floor),
            _ => None,
        }
    }

    /// Place or clear a part.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::OutOfGrid`], [`TacticsError::UnknownPart`] or
    /// [`TacticsError::SlotMismatch`] when the request is malformed.
    pub fn set_part(&mut self, pos: Position, slot: PartSlot, part: Option<PartId>) -> Result<()> {
        if let Some(id) = part {
            let rule = self.parts.get(id).ok_or(TacticsError::UnknownPart(id))?;
            if rule.slot != slot {
                return Err(TacticsError::SlotMismatch {
                    part: rule.name.clone(),
                    slot: slot.to_string(),
                });
            }
        }
        self.tile_checked_mut(pos)?.set_part(slot, part);
        Ok(())
    }

    /// Place a part in every tile of the box spanned by two corners.
    ///
    /// # Errors
    ///
    /// Same as [`TileGrid::set_part`].
    pub fn fill(&mut self, from: Position, to: Position, part: PartId) -> Result<()> {
        let slot = self.parts.get(part).ok_or(TacticsError::UnknownPart(part))?.slot;
        for z in from.z.min(to.z)..=from.z.max(to.z) {
            for y in from.y.min(to.y)..=from.y.max(to.y) {
                for x in from.x.min(to.x)..=from.x.max(to.x) {
                    self.set_part(Position::new(x, y, z), slot, Some(part))?;
                }
            }
        }
        Ok(())
    }

    /// Standing-surface offset of a tile: the lowest terrain level of its
    /// floor and object.
    #[must_use]
    pub fn terrain_level(&self, pos: Position) -> i32 {
        [PartSlot::Floor, PartSlot::Object]
            .iter()
            .filter_map(|&slot| self.part(pos, slot))
            .map(|p| p.terrain_level)
            .min()
            .unwrap_or(0)
            .min(0)
    }

    /// Whether something holds a unit up in this tile: a floor, the ground
    /// level, or a stair top in the tile below.
    #[must_use]
    pub fn has_support(&self, pos: Position) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        if pos.z == 0 || self.part(pos, PartSlot::Floor).is_some() {
            return true;
        }
        let below = Position::new(pos.x, pos.y, pos.z - 1);
        self.terrain_level(below) <= STAIR_TERRAIN_LEVEL
    }

    /// Unbuilt tile: no parts and no occupant. Transparent to every trace.
    #[must_use]
    pub fn is_void(&self, pos: Position) -> bool {
        self.tile(pos)
            .is_some_and(|t| t.has_no_parts() && t.unit.is_none())
    }

    /// Big-wall tag of the object in a tile.
    #[must_use]
    pub fn big_wall(&self, pos: Position) -> BigWall {
        self.part(pos, PartSlot::Object)
            .map_or(BigWall::None, |p| p.big_wall)
    }

    /// Open the door in a wall or object slot.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::OutOfGrid`] for positions outside the grid.
    pub fn open_door(&mut self, pos: Position, slot: PartSlot) -> Result<DoorOutcome> {
        let index = self.index_of(pos).ok_or(TacticsError::OutOfGrid(pos))?;
        let Some(id) = self.tiles[index].part(slot) else {
            return Ok(DoorOutcome::NoDoor);
        };
        let Some(part) = self.parts.get(id) else {
            return Err(TacticsError::UnknownPart(id));
        };
        let outcome = match part.door {
            DoorKind::None => DoorOutcome::NoDoor,
            DoorKind::Hinged => match part.open_variant {
                Some(open) => {
                    self.tiles[index].set_part(slot, Some(open));
                    DoorOutcome::OpenedHinged
                }
                None => DoorOutcome::NoDoor,
            },
            DoorKind::Sliding => {
                let tile = &mut self.tiles[index];
                if tile.is_slid_open(slot) {
                    DoorOutcome::AlreadyOpen
                } else if slot == PartSlot::Object && tile.unit.is_some() {
                    DoorOutcome::Blocked
                } else {
                    tile.set_slid_open(slot, true);
                    DoorOutcome::OpenedSliding
                }
            }
        };
        debug!("Door at {} {}: {:?}", pos, slot, outcome);
        Ok(outcome)
    }

    /// Close every open sliding door whose doorway is empty.
    ///
    /// Returns how many doors closed.
    pub fn close_sliding_doors(&mut self) -> usize {
        let mut closed = 0;
        for tile in &mut self.tiles {
            if tile.unit.is_some() {
                continue;
            }
            for slot in PartSlot::ALL {
                if tile.is_slid_open(slot) {
                    tile.set_slid_open(slot, false);
                    closed += 1;
                }
            }
        }
        closed
    }

    /// Mark every tile within `radius` (same level, Euclidean) of `center`
    /// as dangerous.
    pub fn mark_danger_zone(&mut self, center: Position, radius: i32) {
        let r2 = radius * radius;
        for y in center.y - radius..=center.y + radius {
            for x in center.x - radius..=center.x + radius {
                let pos = Position::new(x, y, center.z);
                if pos.distance_sq_2d(center) > r2 {
                    continue;
                }
                if let Some(tile) = self.tile_mut(pos) {
                    tile.set_dangerous(true);
                }
            }
        }
    }

    /// Clear every danger mark.
    pub fn clear_danger_marks(&mut self) {
        for tile in &mut self.tiles {
            tile.set_dangerous(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MoveCosts;

    fn library() -> (PartLibrary, PartId, PartId, PartId, PartId) {
        let mut parts = PartLibrary::new();
        let floor = parts.add(TilePart::floor("floor"));
        let open = parts.add(
            TilePart::wall("door_open", PartSlot::WestWall)
                .with_tu(MoveCosts::FREE)
                .with_stop_los(false),
        );
        let door = parts.add(
            TilePart::door("door", PartSlot::WestWall, DoorKind::Hinged).with_open_variant(open),
        );
        let slide = parts.add(TilePart::door("hatch", PartSlot::NorthWall, DoorKind::Sliding));
        (parts, floor, open, door, slide)
    }

    fn grid() -> TileGrid {
        let (parts, ..) = library();
        TileGrid::new(4, 3, 2, parts, LoftLibrary::stock()).unwrap()
    }

    #[test]
    fn test_index_round_trip() {
        let grid = grid();
        assert_eq!(grid.tile_count(), 24);
        for index in 0..grid.tile_count() {
            let pos = grid.position_of(index);
            assert_eq!(grid.index_of(pos), Some(index));
            assert_eq!(grid.tile_at(index).position(), pos);
        }
        assert_eq!(grid.index_of(Position::new(3, 2, 1)), Some(23));
        assert_eq!(grid.index_of(Position::new(4, 0, 0)), None);
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = TileGrid::new(0, 3, 1, PartLibrary::new(), LoftLibrary::stock());
        assert!(matches!(result, Err(TacticsError::InvalidDimensions { .. })));
    }

    #[test]
    fn test_set_part_validates_slot() {
        let (parts, floor, ..) = library();
        let mut grid = TileGrid::new(2, 2, 1, parts, LoftLibrary::stock()).unwrap();
        assert!(grid.set_part(Position::ZERO, PartSlot::Floor, Some(floor)).is_ok());
        assert!(matches!(
            grid.set_part(Position::ZERO, PartSlot::Object, Some(floor)),
            Err(TacticsError::SlotMismatch { .. })
        ));
        assert!(matches!(
            grid.set_part(Position::new(5, 0, 0), PartSlot::Floor, Some(floor)),
            Err(TacticsError::OutOfGrid(_))
        ));
    }

    #[test]
    fn test_support_rules() {
        let (mut parts, floor, ..) = library();
        let stairs = parts.add(TilePart::object("stairs", 8).with_terrain_level(-16));
        let mut grid = TileGrid::new(3, 1, 2, parts, LoftLibrary::stock()).unwrap();
        grid.fill(Position::new(0, 0, 0), Position::new(2, 0, 0), floor).unwrap();
        grid.set_part(Position::new(1, 0, 0), PartSlot::Object, Some(stairs)).unwrap();

        assert!(grid.has_support(Position::new(0, 0, 0)));
        assert!(!grid.has_support(Position::new(0, 0, 1)));
        assert!(grid.has_support(Position::new(1, 0, 1)));
        assert_eq!(grid.terrain_level(Position::new(1, 0, 0)), -16);
        assert!(grid.is_void(Position::new(2, 0, 1)));
        assert!(!grid.is_void(Position::new(2, 0, 0)));
    }

    #[test]
    fn test_hinged_door_swaps_part() {
        let (parts, _, open, door, _) = library();
        let mut grid = TileGrid::new(2, 1, 1, parts, LoftLibrary::stock()).unwrap();
        let pos = Position::new(1, 0, 0);
        grid.set_part(pos, PartSlot::WestWall, Some(door)).unwrap();
        assert_eq!(grid.open_door(pos, PartSlot::WestWall).unwrap(), DoorOutcome::OpenedHinged);
        assert_eq!(grid.tile(pos).unwrap().part(PartSlot::WestWall), Some(open));
        assert_eq!(grid.open_door(pos, PartSlot::WestWall).unwrap(), DoorOutcome::NoDoor);
    }

    #[test]
    fn test_sliding_door_flag() {
        let (parts, _, _, _, slide) = library();
        let mut grid = TileGrid::new(1, 2, 1, parts, LoftLibrary::stock()).unwrap();
        let pos = Position::new(0, 1, 0);
        grid.set_part(pos, PartSlot::NorthWall, Some(slide)).unwrap();
        assert!(grid.active_part(pos, PartSlot::NorthWall).is_some());
        assert_eq!(grid.open_door(pos, PartSlot::NorthWall).unwrap(), DoorOutcome::OpenedSliding);
        assert!(grid.active_part(pos, PartSlot::NorthWall).is_none());
        assert!(grid.part(pos, PartSlot::NorthWall).is_some());
        assert_eq!(grid.open_door(pos, PartSlot::NorthWall).unwrap(), DoorOutcome::AlreadyOpen);
        assert_eq!(grid.close_sliding_doors(), 1);
        assert!(grid.active_part(pos, PartSlot::NorthWall).is_some());
    }

    #[test]
    fn test_wall_between_uses_owning_tile() {
        let (parts, _, _, door, slide) = library();
        let mut grid = TileGrid::new(3, 3, 1, parts, LoftLibrary::stock()).unwrap();
        let center = Position::new(1, 1, 0);
        grid.set_part(Position::new(2, 1, 0), PartSlot::WestWall, Some(door)).unwrap();
        grid.set_part(center, PartSlot::NorthWall, Some(slide)).unwrap();

        assert!(grid.wall_between(center, Direction::East).is_some());
        assert!(grid.wall_between(Position::new(2, 1, 0), Direction::West).is_some());
        assert!(grid.wall_between(center, Direction::North).is_some());
        assert!(grid.wall_between(Position::new(1, 0, 0), Direction::South).is_some());
        assert!(grid.wall_between(center, Direction::West).is_none());
        assert!(grid.wall_between(center, Direction::NorthEast).is_none());
        assert_eq!(
            TileGrid::wall_edge(center, Direction::South),
            Some((Position::new(1, 2, 0), PartSlot::NorthWall))
        );
        assert_eq!(TileGrid::wall_edge(center, Direction::Up), None);
    }

    #[test]
    fn test_danger_zone() {
        let mut grid = grid();
        grid.mark_danger_zone(Position::new(0, 0, 0), 1);
        assert!(grid.tile(Position::new(1, 0, 0)).unwrap().is_dangerous());
        assert!(!grid.tile(Position::new(1, 1, 0)).unwrap().is_dangerous());
        assert!(!grid.tile(Position::new(0, 0, 1)).unwrap().is_dangerous());
        grid.clear_danger_marks();
        assert!(grid.tiles().all(|t| !t.is_dangerous()));
    }
}
