//! The tactical encounter: grid, units, patrol graph and tuning.
//!
//! Units live in an arena indexed by [`UnitId`]; tiles refer to their
//! occupant by id. Every kernel operation takes the battlefield by
//! reference, so a full snapshot is just the mutable fields of both arenas.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::ai::AiBehavior;
use crate::config::TacticsConfig;
use crate::error::{Result, TacticsError};
use crate::geometry::Position;
use crate::grid::TileGrid;
use crate::tile::TileState;
use crate::unit::{Faction, MovementType, Unit, UnitId, UnitStatus};
use crate::waypoint::WaypointGraph;

/// Kind of mission being fought; shifts AI priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MissionKind {
    /// Any ordinary mission.
    #[default]
    Standard,
    /// Hostiles are assaulting the player's base and press the attack.
    BaseDefense,
}

/// A unit that dropped to a lower level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFell {
    /// Unit that fell.
    pub unit: UnitId,
    /// Position before falling.
    pub from: Position,
    /// Position after landing.
    pub to: Position,
}

/// Grid, units and everything the kernel needs to reason about them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battlefield {
    /// Tiles.
    pub grid: TileGrid,
    units: Vec<Unit>,
    /// Patrol graph.
    pub waypoints: WaypointGraph,
    /// Tuning.
    pub config: TacticsConfig,
    /// Mission being fought.
    pub mission: MissionKind,
    /// Turn counter, starting at 1.
    pub turn: u32,
}

impl Battlefield {
    /// Battlefield with no units.
    #[must_use]
    pub fn new(grid: TileGrid, config: TacticsConfig) -> Self {
        Self {
            grid,
            units: Vec::new(),
            waypoints: WaypointGraph::new(),
            config,
            mission: MissionKind::Standard,
            turn: 1,
        }
    }

    /// Add a unit, assigning its id.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::PlacementBlocked`] if the footprint leaves the
    /// grid or overlaps another unit.
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<UnitId> {
        let id = UnitId::try_from(self.units.len()).map_err(|_| TacticsError::PlacementBlocked {
            unit: UnitId::MAX,
            position: unit.position,
            reason: "unit arena is full".into(),
        })?;
        unit.id = id;
        self.check_footprint(&unit, unit.position)?;
        let tiles: Vec<Position> = unit.footprint().collect();
        let active = unit.is_active();
        debug!("Adding unit {} '{}' at {}", id, unit.name, unit.position);
        self.units.push(unit);
        if active {
            self.occupy(id, &tiles);
        }
        Ok(id)
    }

    fn check_footprint(&self, unit: &Unit, origin: Position) -> Result<()> {
        for tile in unit.footprint_at(origin) {
            let Some(t) = self.grid.tile(tile) else {
                return Err(TacticsError::PlacementBlocked {
                    unit: unit.id,
                    position: origin,
                    reason: format!("tile {tile} is outside the grid"),
                });
            };
            if t.unit.is_some_and(|other| other != unit.id) {
                return Err(TacticsError::PlacementBlocked {
                    unit: unit.id,
                    position: origin,
                    reason: format!("tile {tile} is occupied"),
                });
            }
        }
        Ok(())
    }

    fn occupy(&mut self, id: UnitId, tiles: &[Position]) {
        for &pos in tiles {
            if let Some(tile) = self.grid.tile_mut(pos) {
                tile.unit = Some(id);
            }
        }
    }

    fn vacate(&mut self, id: UnitId, tiles: &[Position]) {
        for &pos in tiles {
            if let Some(tile) = self.grid.tile_mut(pos) {
                if tile.unit == Some(id) {
                    tile.unit = None;
                }
            }
        }
    }

    /// Look up a unit.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(id as usize)
    }

    /// Look up a unit mutably.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(id as usize)
    }

    /// Look up a unit, treating an unknown id as a contract violation.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::UnknownUnit`] for ids not in the arena.
    pub fn get_unit(&self, id: UnitId) -> Result<&Unit> {
        self.unit(id).ok_or(TacticsError::UnknownUnit(id))
    }

    /// All units, in id order.
    #[must_use]
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    /// Active units of a faction.
    pub fn units_of(&self, faction: Faction) -> impl Iterator<Item = &Unit> {
        self.units
            .iter()
            .filter(move |u| u.faction == faction && u.is_active())
    }

    /// Active units hostile to `unit`.
    pub fn hostiles_of<'a>(&'a self, unit: &'a Unit) -> impl Iterator<Item = &'a Unit> {
        self.units
            .iter()
            .filter(move |u| u.is_active() && unit.is_hostile_to(u))
    }

    /// Unit occupying a tile.
    #[must_use]
    pub fn unit_at(&self, pos: Position) -> Option<UnitId> {
        self.grid.tile(pos).and_then(|t| t.unit)
    }

    /// Move a unit's footprint to a new origin.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::UnknownUnit`] or
    /// [`TacticsError::PlacementBlocked`].
    pub fn move_unit(&mut self, id: UnitId, to: Position) -> Result<()> {
        let unit = self.get_unit(id)?;
        self.check_footprint(unit, to)?;
        let old: Vec<Position> = unit.footprint().collect();
        let new: Vec<Position> = unit.footprint_at(to).collect();
        let active = unit.is_active();
        self.vacate(id, &old);
        if active {
            self.occupy(id, &new);
        }
        if let Some(unit) = self.unit_mut(id) {
            trace!("Unit {} moved {} -> {}", id, unit.position, to);
            unit.position = to;
        }
        Ok(())
    }

    /// Change a unit's fighting state; units that go down leave their tiles.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::UnknownUnit`] for ids not in the arena.
    pub fn set_status(&mut self, id: UnitId, status: UnitStatus) -> Result<()> {
        let unit = self.unit_mut(id).ok_or(TacticsError::UnknownUnit(id))?;
        unit.status = status;
        let tiles: Vec<Position> = unit.footprint().collect();
        if status == UnitStatus::Standing {
            self.occupy(id, &tiles);
        } else {
            self.vacate(id, &tiles);
        }
        Ok(())
    }

    /// Whether no footprint tile of a unit standing at `origin` has support.
    fn footprint_unsupported(&self, unit: &Unit, origin: Position) -> bool {
        unit.footprint_at(origin).all(|p| !self.grid.has_support(p))
    }

    /// Drop unsupported walkers and loose items to the first supported level.
    ///
    /// Flying units hold their altitude while conscious.
    pub fn apply_gravity(&mut self) -> Vec<UnitFell> {
        let mut falls = Vec::new();
        for index in 0..self.units.len() {
            let unit = &self.units[index];
            let floats = unit.movement == MovementType::Fly && unit.is_active();
            if floats || unit.status == UnitStatus::Dead {
                continue;
            }
            let from = unit.position;
            let mut to = from;
            while to.z > 0 && self.footprint_unsupported(unit, to) {
                let below = Position::new(to.x, to.y, to.z - 1);
                if self.check_footprint(unit, below).is_err() {
                    break;
                }
                to = below;
            }
            if to == from {
                continue;
            }
            let id = unit.id;
            let tiles: Vec<Position> = unit.footprint().collect();
            let landing: Vec<Position> = unit.footprint_at(to).collect();
            let active = unit.is_active();
            self.vacate(id, &tiles);
            if active {
                self.occupy(id, &landing);
            }
            self.units[index].position = to;
            debug!("Unit {} fell from {} to {}", id, from, to);
            falls.push(UnitFell { unit: id, from, to });
        }

        for index in 0..self.grid.tile_count() {
            let pos = self.grid.position_of(index);
            if pos.z == 0 || self.grid.tile_at(index).items.is_empty() || self.grid.has_support(pos)
            {
                continue;
            }
            let mut to = pos;
            while to.z > 0 && !self.grid.has_support(to) {
                to.z -= 1;
            }
            let items = self
                .grid
                .tile_mut(pos)
                .map(|t| std::mem::take(&mut t.items))
                .unwrap_or_default();
            trace!("{} items fell from {} to {}", items.len(), pos, to);
            if let Some(tile) = self.grid.tile_mut(to) {
                tile.items.extend(items);
            }
        }
        falls
    }

    /// Start-of-turn bookkeeping for one faction: restore its TU, age
    /// spotting memory and lift the danger marks left by the last turn.
    pub fn begin_turn(&mut self, faction: Faction) {
        self.grid.clear_danger_marks();
        for unit in &mut self.units {
            if unit.faction == faction && unit.is_active() {
                unit.tu = unit.max_tu;
            }
            if unit.faction != faction {
                unit.turns_since_spotted = (unit.turns_since_spotted + 1).min(Unit::NEVER_SPOTTED);
            }
        }
        if faction == Faction::Player {
            self.turn += 1;
        }
    }

    /// Capture the mutable state of tiles and units.
    #[must_use]
    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            turn: self.turn,
            tiles: self.grid.tiles().map(crate::tile::Tile::snapshot_state).collect(),
            units: self.units.iter().map(UnitState::capture).collect(),
        }
    }

    /// Apply a snapshot taken from this battlefield.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::SnapshotMismatch`] when the tile or unit counts
    /// differ from the live battlefield.
    pub fn restore_snapshot(&mut self, snapshot: &BattleSnapshot) -> Result<()> {
        if snapshot.tiles.len() != self.grid.tile_count() {
            return Err(TacticsError::SnapshotMismatch {
                expected: self.grid.tile_count(),
                actual: snapshot.tiles.len(),
            });
        }
        if snapshot.units.len() != self.units.len() {
            return Err(TacticsError::Snapshot(format!(
                "expected {} units, got {}",
                self.units.len(),
                snapshot.units.len()
            )));
        }

        #[cfg(feature = "debug-validation")]
        for state in &snapshot.tiles {
            for id in state.parts.iter().flatten() {
                if self.grid.parts().get(*id).is_none() {
                    return Err(TacticsError::UnknownPart(*id));
                }
            }
        }

        for (tile, state) in self.grid.tiles_mut().zip(&snapshot.tiles) {
            tile.restore_state(state);
            tile.unit = None;
        }
        for (unit, state) in self.units.iter_mut().zip(&snapshot.units) {
            state.apply(unit);
        }
        for index in 0..self.units.len() {
            let unit = &self.units[index];
            if unit.is_active() {
                let id = unit.id;
                let tiles: Vec<Position> = unit.footprint().collect();
                self.occupy(id, &tiles);
            }
        }
        self.turn = snapshot.turn;
        debug!("Restored snapshot for turn {}", self.turn);
        Ok(())
    }

    /// Encode a snapshot with bincode.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::Snapshot`] if encoding fails.
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.snapshot()).map_err(|e| TacticsError::Snapshot(e.to_string()))
    }

    /// Decode and apply a bincode snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`TacticsError::Snapshot`] for undecodable bytes, or any error
    /// of [`Battlefield::restore_snapshot`].
    pub fn restore_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let snapshot: BattleSnapshot =
            bincode::deserialize(bytes).map_err(|e| TacticsError::Snapshot(e.to_string()))?;
        self.restore_snapshot(&snapshot)
    }
}

/// Flat, versionless copy of the battlefield's mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    /// Turn counter.
    pub turn: u32,
    /// Per-tile state in index order.
    pub tiles: Vec<TileState>,
    /// Per-unit state in id order.
    pub units: Vec<UnitState>,
}

/// Mutable per-unit state carried in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    /// Footprint origin.
    pub position: Position,
    /// Facing.
    pub facing: crate::geometry::Direction,
    /// TU left.
    pub tu: u32,
    /// Health left.
    pub health: u32,
    /// Stun damage.
    pub stun: u32,
    /// Morale.
    pub morale: u32,
    /// Fighting state.
    pub status: UnitStatus,
    /// Visible units.
    pub visible_units: Vec<UnitId>,
    /// Spotting memory.
    pub turns_since_spotted: u32,
    /// Burning turns.
    pub on_fire: u8,
    /// AI record.
    pub ai: Option<AiBehavior>,
}

impl UnitState {
    fn capture(unit: &Unit) -> Self {
        Self {
            position: unit.position,
            facing: unit.facing,
            tu: unit.tu,
            health: unit.health,
            stun: unit.stun,
            morale: unit.morale,
            status: unit.status,
            visible_units: unit.visible_units.clone(),
            turns_since_spotted: unit.turns_since_spotted,
            on_fire: unit.on_fire,
            ai: unit.ai.clone(),
        }
    }

    fn apply(&self, unit: &mut Unit) {
        unit.position = self.position;
        unit.facing = self.facing;
        unit.tu = self.tu;
        unit.health = self.health;
        unit.stun = self.stun;
        unit.morale = self.morale;
        unit.status = self.status;
        unit.visible_units.clone_from(&self.visible_units);
        unit.turns_since_spotted = self.turns_since_spotted;
        unit.on_fire = self.on_fire;
        unit.ai.clone_from(&self.ai);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LoftLibrary, PartLibrary, PartSlot, TilePart};

    fn battlefield() -> (Battlefield, crate::data::PartId) {
        let mut parts = PartLibrary::new();
        let floor = parts.add(TilePart::floor("floor"));
        let mut grid = TileGrid::new(6, 6, 3, parts, LoftLibrary::stock()).unwrap();
        grid.fill(Position::new(0, 0, 0), Position::new(5, 5, 1), floor).unwrap();
        (Battlefield::new(grid, TacticsConfig::default()), floor)
    }

    #[test]
    fn test_add_unit_assigns_ids_and_occupancy() {
        let (mut bf, _) = battlefield();
        let a = bf.add_unit(Unit::new("a", Faction::Player, Position::new(1, 1, 0))).unwrap();
        let b = bf
            .add_unit(Unit::new("b", Faction::Hostile, Position::new(3, 3, 0)).large())
            .unwrap();
        assert_eq!((a, b), (0, 1));
        assert_eq!(bf.unit_at(Position::new(4, 4, 0)), Some(b));
        let clash = bf.add_unit(Unit::new("c", Faction::Player, Position::new(4, 3, 0)));
        assert!(matches!(clash, Err(TacticsError::PlacementBlocked { .. })));
    }

    #[test]
    fn test_move_and_down_units() {
        let (mut bf, _) = battlefield();
        let a = bf.add_unit(Unit::new("a", Faction::Player, Position::new(1, 1, 0))).unwrap();
        bf.move_unit(a, Position::new(2, 1, 0)).unwrap();
        assert_eq!(bf.unit_at(Position::new(1, 1, 0)), None);
        assert_eq!(bf.unit_at(Position::new(2, 1, 0)), Some(a));
        bf.set_status(a, UnitStatus::Dead).unwrap();
        assert_eq!(bf.unit_at(Position::new(2, 1, 0)), None);
        assert!(matches!(bf.move_unit(9, Position::ZERO), Err(TacticsError::UnknownUnit(9))));
    }

    #[test]
    fn test_gravity_drops_walkers_not_fliers() {
        let (mut bf, _) = battlefield();
        let walker = bf.add_unit(Unit::new("w", Faction::Player, Position::new(1, 1, 2))).unwrap();
        let flier = bf
            .add_unit(
                Unit::new("f", Faction::Hostile, Position::new(2, 2, 2))
                    .with_movement(MovementType::Fly),
            )
            .unwrap();
        bf.grid.set_part(Position::new(3, 3, 1), PartSlot::Floor, None).unwrap();
        bf.grid.tile_mut(Position::new(3, 3, 1)).unwrap().items.push(7);

        let falls = bf.apply_gravity();
        assert_eq!(falls.len(), 1);
        assert_eq!(falls[0].unit, walker);
        assert_eq!(bf.unit(walker).unwrap().position, Position::new(1, 1, 1));
        assert_eq!(bf.unit(flier).unwrap().position.z, 2);
        assert_eq!(bf.grid.tile(Position::new(3, 3, 0)).unwrap().items, vec![7]);
    }

    #[test]
    fn test_snapshot_restores_state() {
        let (mut bf, _) = battlefield();
        let a = bf.add_unit(Unit::new("a", Faction::Player, Position::new(1, 1, 0))).unwrap();
        let bytes = bf.snapshot_bytes().unwrap();

        bf.move_unit(a, Position::new(4, 4, 0)).unwrap();
        bf.unit_mut(a).unwrap().tu = 3;
        bf.grid.tile_mut(Position::new(2, 2, 0)).unwrap().smoke = 9;

        bf.restore_bytes(&bytes).unwrap();
        assert_eq!(bf.unit(a).unwrap().position, Position::new(1, 1, 0));
        assert_eq!(bf.unit(a).unwrap().tu, 60);
        assert_eq!(bf.unit_at(Position::new(1, 1, 0)), Some(a));
        assert_eq!(bf.unit_at(Position::new(4, 4, 0)), None);
        assert_eq!(bf.grid.tile(Position::new(2, 2, 0)).unwrap().smoke, 0);
        assert!(bf.restore_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_begin_turn() {
        let (mut bf, _) = battlefield();
        let a = bf.add_unit(Unit::new("a", Faction::Hostile, Position::new(1, 1, 0))).unwrap();
        let p = bf.add_unit(Unit::new("p", Faction::Player, Position::new(2, 1, 0))).unwrap();
        bf.unit_mut(a).unwrap().tu = 0;
        bf.unit_mut(p).unwrap().turns_since_spotted = 0;
        bf.grid.mark_danger_zone(Position::new(3, 3, 0), 1);
        bf.begin_turn(Faction::Hostile);
        assert_eq!(bf.unit(a).unwrap().tu, 60);
        assert_eq!(bf.unit(p).unwrap().turns_since_spotted, 1);
        assert!(bf.grid.tiles().all(|t| !t.is_dangerous()));
    }
}
