//! Test fixtures and helpers.
//!
//! Pre-built battlefields, parts, units and weapons for consistent
//! testing.

use fixed::types::I32F32;
use tactics_core::battlefield::Battlefield;
use tactics_core::config::TacticsConfig;
use tactics_core::data::{
    DamageKind, DoorKind, FireMode, LoftLibrary, MoveCosts, PartId, PartLibrary, PartSlot,
    TilePart, TuCost, WeaponKind, WeaponRule,
};
use tactics_core::geometry::Position;
use tactics_core::grid::TileGrid;
use tactics_core::lighting::calculate_lighting;
use tactics_core::unit::{Faction, Unit};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Ids of the parts in [`stock_parts`].
#[derive(Debug, Clone, Copy)]
pub struct StockParts {
    /// Plain floor.
    pub floor: PartId,
    /// Solid west wall.
    pub west_wall: PartId,
    /// Solid north wall.
    pub north_wall: PartId,
    /// Hinged west door.
    pub west_door: PartId,
    /// Open state of `west_door`.
    pub west_door_open: PartId,
    /// North wall that can be seen through but not shot through.
    pub north_window: PartId,
    /// Waist-high crate.
    pub crate_: PartId,
    /// Fuel barrel that explodes when destroyed.
    pub barrel: PartId,
}

/// A small part library covering the common test cases.
#[must_use]
pub fn stock_parts() -> (PartLibrary, StockParts) {
    let mut lib = PartLibrary::new();
    let floor = lib.add(TilePart::floor("floor"));
    let west_wall = lib.add(TilePart::wall("wall", PartSlot::WestWall));
    let north_wall = lib.add(TilePart::wall("wall", PartSlot::NorthWall));
    let west_door_open = lib.add(
        TilePart::wall("door (open)", PartSlot::WestWall)
            .with_tu(MoveCosts::FREE)
            .with_stop_los(false)
            .with_loft(LoftLibrary::EMPTY),
    );
    let west_door = lib.add(
        TilePart::door("door", PartSlot::WestWall, DoorKind::Hinged).with_open_variant(west_door_open),
    );
    let north_window = lib.add(TilePart::wall("window", PartSlot::NorthWall).with_stop_los(false));
    let crate_ = lib.add(TilePart::object("crate", 5));
    let barrel = lib.add(
        TilePart::object("barrel", 4)
            .with_armor(10)
            .with_explosive(60, DamageKind::HighExplosive)
            .with_fuel(4, 50),
    );
    let ids = StockParts {
        floor,
        west_wall,
        north_wall,
        west_door,
        west_door_open,
        north_window,
        crate_,
        barrel,
    };
    (lib, ids)
}

/// A lit single-level field with floor everywhere.
///
/// # Panics
///
/// Panics if the dimensions are not positive.
#[must_use]
pub fn open_ground(width: i32, length: i32) -> (Battlefield, StockParts) {
    let (lib, parts) = stock_parts();
    let mut grid = TileGrid::new(width, length, 1, lib, LoftLibrary::stock()).expect("valid dimensions");
    grid.fill(Position::new(0, 0, 0), Position::new(width - 1, length - 1, 0), parts.floor)
        .expect("fill in bounds");
    let mut bf = Battlefield::new(grid, TacticsConfig::default());
    calculate_lighting(&mut bf);
    (bf, parts)
}

/// A 20×20 field with a walled 8×8 room in the middle whose west side has
/// a door and whose north side has a window.
///
/// The room spans tiles (6, 6) to (13, 13). The door is on the west face of
/// (6, 9), the window on the north face of (9, 6).
#[must_use]
pub fn walled_room() -> (Battlefield, StockParts) {
    let (mut bf, parts) = open_ground(20, 20);
    for i in 6..=13 {
        let west = if i == 9 { parts.west_door } else { parts.west_wall };
        let north = if i == 9 { parts.north_window } else { parts.north_wall };
        set(&mut bf, Position::new(6, i, 0), PartSlot::WestWall, west);
        set(&mut bf, Position::new(14, i, 0), PartSlot::WestWall, parts.west_wall);
        set(&mut bf, Position::new(i, 6, 0), PartSlot::NorthWall, north);
        set(&mut bf, Position::new(i, 14, 0), PartSlot::NorthWall, parts.north_wall);
    }
    calculate_lighting(&mut bf);
    (bf, parts)
}

fn set(bf: &mut Battlefield, pos: Position, slot: PartSlot, part: PartId) {
    bf.grid.set_part(pos, slot, Some(part)).expect("fixture part in bounds");
}

/// A rifle with all three fire modes.
#[must_use]
pub fn rifle() -> WeaponRule {
    WeaponRule::firearm("rifle", 30)
        .with_snap(FireMode {
            tu: TuCost::Percent(25),
            accuracy: 60,
            shots: 1,
        })
        .with_auto(FireMode {
            tu: TuCost::Percent(35),
            accuracy: 35,
            shots: 3,
        })
        .with_aimed(FireMode {
            tu: TuCost::Percent(80),
            accuracy: 110,
            shots: 1,
        })
}

/// A high-explosive hand grenade.
#[must_use]
pub fn frag_grenade() -> WeaponRule {
    WeaponRule::special("frag grenade", WeaponKind::Grenade, 50, TuCost::Percent(25))
        .with_blast(3, DamageKind::HighExplosive)
}

/// A player soldier with a rifle.
#[must_use]
pub fn soldier(name: &str, pos: Position) -> Unit {
    Unit::new(name, Faction::Player, pos).with_weapon(rifle())
}

/// An AI-controlled hostile with a rifle.
#[must_use]
pub fn alien(name: &str, pos: Position) -> Unit {
    Unit::new(name, Faction::Hostile, pos).with_weapon(rifle()).with_ai()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_ground_is_lit_and_floored() {
        let (bf, parts) = open_ground(6, 4);
        let tile = bf.grid.tile(Position::new(5, 3, 0)).unwrap();
        assert_eq!(tile.part(PartSlot::Floor), Some(parts.floor));
        assert_eq!(tile.light(), bf.config.visibility.sun_light);
    }

    #[test]
    fn test_walled_room_layout() {
        let (bf, parts) = walled_room();
        assert_eq!(bf.grid.tile(Position::new(6, 9, 0)).unwrap().part(PartSlot::WestWall), Some(parts.west_door));
        assert_eq!(bf.grid.tile(Position::new(9, 6, 0)).unwrap().part(PartSlot::NorthWall), Some(parts.north_window));
        assert_eq!(bf.grid.tile(Position::new(14, 13, 0)).unwrap().part(PartSlot::WestWall), Some(parts.west_wall));
    }

    #[test]
    fn test_alien_has_ai_and_rifle() {
        let unit = alien("x", Position::ZERO);
        assert!(unit.ai.is_some());
        assert_eq!(unit.weapons[0].rule.snap.unwrap().tu.resolve(60), 15);
    }
}
