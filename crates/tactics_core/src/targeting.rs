//! Line-of-fire and line-of-sight queries between units and tiles.
//!
//! A unit is targetable when some voxel of its silhouette can be reached by
//! an unobstructed voxel trace. Candidate aim points are tried in a fixed
//! order: heights from the middle of the requested body band outwards, and
//! at each height a small spiral of horizontal offsets around the body axis.

use crate::battlefield::Battlefield;
use crate::data::Medium;
use crate::geometry::{Direction, Position, VOXEL_X, VOXEL_Y, VOXEL_Z};
use crate::grid::TileGrid;
use crate::trace::{in_silhouette, trace_arc, trace_tiles, trace_voxels, TraceOptions, VoxelHit};
use crate::unit::{Faction, Unit, UnitId};

/// Horizontal aim offsets tried at every height, nearest first.
const SPIRAL: [(i32, i32); 13] = [
    (0, 0),
    (-2, 0),
    (2, 0),
    (0, -2),
    (0, 2),
    (-2, -2),
    (2, 2),
    (-2, 2),
    (2, -2),
    (-4, 0),
    (4, 0),
    (0, -4),
    (0, 4),
];

/// Heights above the floor tried when aiming at a bare tile.
const TILE_AIM_HEIGHTS: [i32; 4] = [2, 8, 14, 20];

/// Where on its body a unit looks or shoots from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Eye level.
    Eyes,
    /// Weapon level.
    Muzzle,
}

/// Part of the body to aim at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitBand {
    /// Anywhere.
    #[default]
    Any,
    /// Lower third.
    Legs,
    /// Middle third.
    Torso,
    /// Upper third.
    Head,
}

impl HitBand {
    /// Voxel z range `[low, high)` of this band within a body span.
    #[must_use]
    pub const fn range(self, low: i32, high: i32) -> (i32, i32) {
        let third = (high - low) / 3;
        match self {
            Self::Any => (low, high),
            Self::Legs => (low, low + third),
            Self::Torso => (low + third, high - third),
            Self::Head => (high - third, high),
        }
    }
}

/// A confirmed aim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSolution {
    /// Voxel aimed at.
    pub aim_voxel: Position,
    /// Voxel where the trace first touched the target.
    pub impact_voxel: Position,
}

/// Voxel a unit looks or fires from: the centre of its footprint, a fixed
/// offset below the top of its body.
#[must_use]
pub fn origin_voxel(bf: &Battlefield, unit: &Unit, origin: Origin) -> Position {
    let offset = match origin {
        Origin::Eyes => bf.config.visibility.eye_offset,
        Origin::Muzzle => bf.config.visibility.muzzle_offset,
    };
    let terrain = bf.grid.terrain_level(unit.position);
    Position::new(
        unit.position.x * VOXEL_X + unit.size * VOXEL_X / 2,
        unit.position.y * VOXEL_Y + unit.size * VOXEL_Y / 2,
        unit.position.z * VOXEL_Z + unit.top_offset(terrain) - offset,
    )
}

/// Heights in `[low, high)` ordered from the middle outwards, two voxels apart.
fn heights_outward(low: i32, high: i32) -> Vec<i32> {
    let middle = (low + high) / 2;
    let mut heights = vec![middle];
    let mut step = 2;
    while middle - step >= low || middle + step < high {
        if middle + step < high {
            heights.push(middle + step);
        }
        if middle - step >= low {
            heights.push(middle - step);
        }
        step += 2;
    }
    heights
}

fn aim_at_unit(
    bf: &Battlefield,
    from: Position,
    target: &Unit,
    band: HitBand,
    options: &TraceOptions,
) -> Option<TargetSolution> {
    let (low, high) = target.voxel_span(bf.grid.terrain_level(target.position));
    let (band_low, band_high) = band.range(low, high);
    let centre_x = target.position.x * VOXEL_X + target.size * VOXEL_X / 2;
    let centre_y = target.position.y * VOXEL_Y + target.size * VOXEL_Y / 2;

    for z in heights_outward(band_low, band_high) {
        for (dx, dy) in SPIRAL {
            let aim = Position::new(centre_x + dx, centre_y + dy, z);
            if !in_silhouette(bf, target.id, aim) {
                continue;
            }
            let trace = trace_voxels(bf, from, aim, options);
            if trace.hit == VoxelHit::Unit(target.id) {
                return Some(TargetSolution {
                    aim_voxel: aim,
                    impact_voxel: trace.voxel,
                });
            }
        }
    }
    None
}

/// Find a voxel of `target` that `shooter` can hit from its muzzle.
#[must_use]
pub fn can_target_unit(
    bf: &Battlefield,
    shooter: &Unit,
    target: &Unit,
    band: HitBand,
) -> Option<TargetSolution> {
    let from = origin_voxel(bf, shooter, Origin::Muzzle);
    aim_at_unit(bf, from, target, band, &TraceOptions::fired_by(shooter.id))
}

/// Find a voxel in `tile` that `shooter` can hit from its muzzle.
///
/// A shot counts as reaching the tile if it arrives at the aim point or is
/// stopped by a part or unit inside that tile.
#[must_use]
pub fn can_target_tile(bf: &Battlefield, shooter: &Unit, tile: Position) -> Option<TargetSolution> {
    if !bf.grid.in_bounds(tile) {
        return None;
    }
    let from = origin_voxel(bf, shooter, Origin::Muzzle);
    let options = TraceOptions::fired_by(shooter.id);
    TILE_AIM_HEIGHTS.iter().find_map(|&height| {
        let aim = tile.tile_center_voxel(height);
        let trace = trace_voxels(bf, from, aim, &options);
        reaches_tile(bf, trace.hit, tile).then_some(TargetSolution {
            aim_voxel: aim,
            impact_voxel: trace.voxel,
        })
    })
}

fn reaches_tile(bf: &Battlefield, hit: VoxelHit, tile: Position) -> bool {
    match hit {
        VoxelHit::Empty => true,
        VoxelHit::Part { tile: at, .. } => at == tile,
        VoxelHit::Unit(id) => bf.unit(id).is_some_and(|u| u.covers(tile)),
        VoxelHit::OutOfBounds => false,
    }
}

/// Whether `shooter` has a line of fire onto `tile`, aiming at the unit
/// standing there if there is one.
#[must_use]
pub fn line_of_fire(bf: &Battlefield, shooter: &Unit, tile: Position) -> bool {
    match bf.unit_at(tile).and_then(|id| bf.unit(id)) {
        Some(target) if target.id != shooter.id => {
            can_target_unit(bf, shooter, target, HitBand::Any).is_some()
        }
        _ => can_target_tile(bf, shooter, tile).is_some(),
    }
}

/// Whether `observer` can see any part of `target`, looking through
/// transparent parts.
#[must_use]
pub fn line_of_sight(bf: &Battlefield, observer: &Unit, target: &Unit) -> bool {
    let from = origin_voxel(bf, observer, Origin::Eyes);
    aim_at_unit(bf, from, target, HitBand::Any, &TraceOptions::seen_by(observer.id)).is_some()
}

/// Whether `thrower` can lob something onto `tile` without hitting
/// anything on the way.
#[must_use]
pub fn validate_throw(bf: &Battlefield, thrower: &Unit, tile: Position, max_range: i32) -> bool {
    if !bf.grid.in_bounds(tile) || thrower.position.distance(tile) > max_range {
        return false;
    }
    let from = origin_voxel(bf, thrower, Origin::Muzzle);
    let to = tile.tile_center_voxel(2);
    let apex = (from.distance(to) / 3).clamp(VOXEL_Z / 2, VOXEL_Z * 2);
    let trace = trace_arc(bf, from, to, apex, &TraceOptions::fired_by(thrower.id));
    reaches_tile(bf, trace.hit, tile)
}

/// Active units hostile to `faction` that have an unblocked sight line
/// onto `tile` within view range.
#[must_use]
pub fn spotting_units(bf: &Battlefield, tile: Position, faction: Faction) -> Vec<UnitId> {
    let range = bf.config.visibility.max_view_distance;
    bf.units()
        .iter()
        .filter(|u| u.is_active() && u.faction.is_hostile_to(faction))
        .filter(|u| u.position.distance_sq(tile) <= range * range)
        .filter(|u| trace_tiles(&bf.grid, u.position, tile, Medium::Sight).reached)
        .map(|u| u.id)
        .collect()
}

/// Whether a unit standing on `tile` and facing `facing` looks out through
/// a window: an edge wall in front that does not stop sight.
#[must_use]
pub fn faces_window(grid: &TileGrid, tile: Position, facing: Direction) -> bool {
    let (a, b) = facing.components();
    [a, b]
        .into_iter()
        .filter_map(|dir| grid.wall_between(tile, dir))
        .any(|wall| !wall.stop_los)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TacticsConfig;
    use crate::data::{DoorKind, LoftLibrary, MoveCosts, PartLibrary, PartSlot, TilePart};

    fn field(lib: PartLibrary) -> Battlefield {
        let grid = TileGrid::new(12, 12, 2, lib, LoftLibrary::stock()).unwrap();
        Battlefield::new(grid, TacticsConfig::default())
    }

    #[test]
    fn test_heights_outward_order() {
        assert_eq!(heights_outward(0, 8), vec![4, 6, 2, 0]);
        assert_eq!(heights_outward(5, 6), vec![5]);
    }

    #[test]
    fn test_open_ground_targeting() {
        let mut bf = field(PartLibrary::new());
        let a = bf.add_unit(Unit::new("a", Faction::Hostile, Position::new(2, 2, 0))).unwrap();
        let b = bf.add_unit(Unit::new("b", Faction::Player, Position::new(8, 5, 0))).unwrap();
        let (shooter, target) = (bf.unit(a).unwrap(), bf.unit(b).unwrap());

        let solution = can_target_unit(&bf, shooter, target, HitBand::Torso).unwrap();
        assert!(in_silhouette(&bf, b, solution.impact_voxel));
        assert!(line_of_sight(&bf, shooter, target));
        assert!(line_of_fire(&bf, shooter, target.position));
        assert!(can_target_tile(&bf, shooter, Position::new(5, 9, 0)).is_some());
    }

    #[test]
    fn test_wall_blocks_until_door_opens() {
        let mut lib = PartLibrary::new();
        let open = lib.add(
            TilePart::wall("door open", PartSlot::WestWall)
                .with_tu(MoveCosts::FREE)
                .with_stop_los(false)
                .with_loft(LoftLibrary::EMPTY),
        );
        let door = lib.add(
            TilePart::door("door", PartSlot::WestWall, DoorKind::Hinged).with_open_variant(open),
        );
        let mut bf = field(lib);
        for y in 0..12 {
            bf.grid.set_part(Position::new(5, y, 0), PartSlot::WestWall, Some(door)).unwrap();
        }
        let a = bf.add_unit(Unit::new("a", Faction::Hostile, Position::new(3, 4, 0))).unwrap();
        let b = bf.add_unit(Unit::new("b", Faction::Player, Position::new(7, 4, 0))).unwrap();

        {
            let (shooter, target) = (bf.unit(a).unwrap(), bf.unit(b).unwrap());
            assert!(can_target_unit(&bf, shooter, target, HitBand::Any).is_none());
            assert!(!line_of_sight(&bf, shooter, target));
            assert!(spotting_units(&bf, target.position, Faction::Player).is_empty());
        }

        bf.grid.open_door(Position::new(5, 4, 0), PartSlot::WestWall).unwrap();
        let (shooter, target) = (bf.unit(a).unwrap(), bf.unit(b).unwrap());
        assert!(can_target_unit(&bf, shooter, target, HitBand::Any).is_some());
        assert!(line_of_sight(&bf, shooter, target));
        assert_eq!(spotting_units(&bf, target.position, Faction::Player), vec![a]);
    }

    #[test]
    fn test_window_sees_but_does_not_shoot_through() {
        let mut lib = PartLibrary::new();
        let window = lib.add(TilePart::wall("window", PartSlot::NorthWall).with_stop_los(false));
        let mut bf = field(lib);
        for x in 0..12 {
            bf.grid.set_part(Position::new(x, 5, 0), PartSlot::NorthWall, Some(window)).unwrap();
        }
        let a = bf.add_unit(Unit::new("a", Faction::Hostile, Position::new(4, 2, 0))).unwrap();
        let b = bf.add_unit(Unit::new("b", Faction::Player, Position::new(4, 8, 0))).unwrap();
        let (shooter, target) = (bf.unit(a).unwrap(), bf.unit(b).unwrap());

        assert!(line_of_sight(&bf, shooter, target));
        assert!(can_target_unit(&bf, shooter, target, HitBand::Any).is_none());
        assert!(faces_window(&bf.grid, Position::new(4, 5, 0), Direction::North));
        assert!(!faces_window(&bf.grid, Position::new(4, 6, 0), Direction::North));
    }

    #[test]
    fn test_throw_over_low_cover() {
        let mut lib = PartLibrary::new();
        let crate_part = lib.add(TilePart::object("crate", 5));
        let mut bf = field(lib);
        bf.grid.set_part(Position::new(5, 5, 0), PartSlot::Object, Some(crate_part)).unwrap();
        let a = bf.add_unit(Unit::new("a", Faction::Hostile, Position::new(2, 5, 0))).unwrap();
        let thrower = bf.unit(a).unwrap();

        assert!(validate_throw(&bf, thrower, Position::new(8, 5, 0), 12));
        assert!(!validate_throw(&bf, thrower, Position::new(8, 5, 0), 3));
        assert!(!validate_throw(&bf, thrower, Position::new(20, 5, 0), 40));
    }
}
