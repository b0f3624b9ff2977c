//! Line tracing through the battlefield.
//!
//! Two resolutions are offered. Voxel traces walk a 3D Bresenham line
//! through the 16×16×24 voxel lattice and test every voxel against the
//! LOFT masks of the parts and units it falls in; these decide whether a
//! shot connects. Tile traces walk whole tiles and score each step with
//! [`crate::blockage`]; these drive sight sweeps and blast rays.

use crate::battlefield::Battlefield;
use crate::blockage::{step_blockage, Blockage};
use crate::data::{Medium, PartSlot, LOFT_BANDS};
use crate::geometry::{Direction, Position, VOXEL_X, VOXEL_Y, VOXEL_Z};
use crate::grid::TileGrid;
use crate::unit::UnitId;

/// Voxels per LOFT band.
const BAND_HEIGHT: i32 = VOXEL_Z / LOFT_BANDS as i32;

/// Points of a 3D Bresenham line from `from` to `to`, both included.
///
/// With `corner_steps` every move changes a single axis: when the line
/// advances on several axes at once the minor axes are stepped first and
/// each intermediate point is emitted, so the line cannot slip diagonally
/// between two solid voxels.
#[must_use]
pub fn bresenham(from: Position, to: Position, corner_steps: bool) -> Vec<Position> {
    let delta = [to.x - from.x, to.y - from.y, to.z - from.z];
    let span = delta.map(i32::abs);
    let sign = delta.map(i32::signum);
    let major = if span[0] >= span[1] && span[0] >= span[2] {
        0
    } else if span[1] >= span[2] {
        1
    } else {
        2
    };
    let steps = span[major];

    let mut current = [from.x, from.y, from.z];
    let mut error = span.map(|s| 2 * s - steps);
    let per_step = if corner_steps { 3 } else { 1 };
    let mut points = Vec::with_capacity(steps as usize * per_step + 1);
    points.push(from);

    for _ in 0..steps {
        for axis in 0..3 {
            if axis == major {
                continue;
            }
            if error[axis] > 0 {
                current[axis] += sign[axis];
                error[axis] -= 2 * steps;
                if corner_steps {
                    points.push(Position::new(current[0], current[1], current[2]));
                }
            }
            error[axis] += 2 * span[axis];
        }
        current[major] += sign[major];
        points.push(Position::new(current[0], current[1], current[2]));
    }
    points
}

/// What occupies a voxel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoxelHit {
    /// Nothing solid.
    Empty,
    /// A tile part.
    Part {
        /// Tile holding the part.
        tile: Position,
        /// Slot of the part.
        slot: PartSlot,
    },
    /// A unit's silhouette.
    Unit(UnitId),
    /// Outside the grid.
    OutOfBounds,
}

impl VoxelHit {
    /// True for [`VoxelHit::Empty`].
    #[must_use]
    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Knobs for voxel traces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceOptions {
    /// Unit whose silhouette is ignored (usually the one shooting).
    pub ignore: Option<UnitId>,
    /// Look through parts that do not stop line of sight.
    pub see_through: bool,
}

impl TraceOptions {
    /// Options for a shot fired by `shooter`.
    #[must_use]
    pub const fn fired_by(shooter: UnitId) -> Self {
        Self {
            ignore: Some(shooter),
            see_through: false,
        }
    }

    /// Options for `observer` looking.
    #[must_use]
    pub const fn seen_by(observer: UnitId) -> Self {
        Self {
            ignore: Some(observer),
            see_through: true,
        }
    }
}

/// Offset of a voxel inside its tile.
const fn local(voxel: Position, tile: Position) -> Position {
    Position::new(
        voxel.x - tile.x * VOXEL_X,
        voxel.y - tile.y * VOXEL_Y,
        voxel.z - tile.z * VOXEL_Z,
    )
}

/// Whether a voxel lies inside a unit's silhouette.
#[must_use]
pub fn in_silhouette(bf: &Battlefield, unit_id: UnitId, voxel: Position) -> bool {
    let Some(unit) = bf.unit(unit_id) else {
        return false;
    };
    let tile = voxel.to_tile();
    let (low, high) = unit.voxel_span(bf.grid.terrain_level(unit.position));
    if !(low..high).contains(&voxel.z) {
        return false;
    }
    let footprint_tile = Position::new(tile.x, tile.y, unit.position.z);
    if !unit.covers(footprint_tile) {
        return false;
    }
    let offset = local(voxel, tile);
    bf.grid.lofts().is_solid(unit.loft, offset.x, offset.y)
}

/// Classify a single voxel.
#[must_use]
pub fn voxel_check(bf: &Battlefield, voxel: Position, options: &TraceOptions) -> VoxelHit {
    let grid = &bf.grid;
    let tile = voxel.to_tile();
    if !grid.in_bounds(tile) {
        // Open sky above the map.
        let below_top = Position::new(tile.x, tile.y, grid.height() - 1);
        if tile.z >= grid.height() && grid.in_bounds(below_top) {
            return VoxelHit::Empty;
        }
        return VoxelHit::OutOfBounds;
    }
    let offset = local(voxel, tile);
    let band = (offset.z / BAND_HEIGHT) as usize;

    for slot in PartSlot::ALL {
        let Some(part) = grid.active_part(tile, slot) else {
            continue;
        };
        if options.see_through && !part.stop_los {
            continue;
        }
        if grid.lofts().is_solid(part.loft[band], offset.x, offset.y) {
            return VoxelHit::Part { tile, slot };
        }
    }

    // Units raised by stairs poke into the level above their tile.
    let below = tile.step(Direction::Down);
    for candidate in [tile, below] {
        let Some(id) = bf.unit_at(candidate) else {
            continue;
        };
        if options.ignore == Some(id) {
            continue;
        }
        if in_silhouette(bf, id, voxel) {
            return VoxelHit::Unit(id);
        }
    }
    VoxelHit::Empty
}

/// Outcome of a voxel trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelTrace {
    /// First non-empty voxel, or [`VoxelHit::Empty`] if the end was reached.
    pub hit: VoxelHit,
    /// Voxel where the trace stopped.
    pub voxel: Position,
}

/// Walk a voxel line until something is hit. The start voxel is skipped.
#[must_use]
pub fn trace_voxels(
    bf: &Battlefield,
    from: Position,
    to: Position,
    options: &TraceOptions,
) -> VoxelTrace {
    for voxel in bresenham(from, to, true).into_iter().skip(1) {
        let hit = voxel_check(bf, voxel, options);
        if !hit.is_empty() {
            return VoxelTrace { hit, voxel };
        }
    }
    VoxelTrace {
        hit: VoxelHit::Empty,
        voxel: to,
    }
}

/// Walk a parabolic arc peaking `apex` voxels above the straight line.
///
/// The arc is cut into chords no longer than one tile and each chord is
/// traced like a straight line.
#[must_use]
pub fn trace_arc(
    bf: &Battlefield,
    from: Position,
    to: Position,
    apex: i32,
    options: &TraceOptions,
) -> VoxelTrace {
    let span = from.distance(to).max(1);
    let segments = (span / VOXEL_X).max(8);
    let point = |i: i32| {
        let lerp = |a: i32, b: i32| a + (b - a) * i / segments;
        let lift = 4 * apex * i * (segments - i) / (segments * segments);
        Position::new(lerp(from.x, to.x), lerp(from.y, to.y), lerp(from.z, to.z) + lift)
    };

    let mut previous = from;
    for i in 1..=segments {
        let next = point(i);
        let chord = trace_voxels(bf, previous, next, options);
        if !chord.hit.is_empty() {
            return chord;
        }
        previous = next;
    }
    VoxelTrace {
        hit: VoxelHit::Empty,
        voxel: to,
    }
}

/// Outcome of a tile trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileTrace {
    /// The end tile was entered.
    pub reached: bool,
    /// Tile the trace failed to enter.
    pub blocked_at: Option<Position>,
    /// Soft blockage absorbed on the way.
    pub absorbed: u32,
    /// Smoke density summed over the tiles entered.
    pub smoke: u32,
}

/// Walk whole tiles from `from` to `to`, scoring every step for `medium`.
#[must_use]
pub fn trace_tiles(grid: &TileGrid, from: Position, to: Position, medium: Medium) -> TileTrace {
    let mut trace = TileTrace {
        reached: true,
        blocked_at: None,
        absorbed: 0,
        smoke: 0,
    };
    let line = bresenham(from, to, false);
    for pair in line.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        match step_blockage(grid, a, b, medium) {
            Blockage::Hard => {
                trace.reached = false;
                trace.blocked_at = Some(b);
                return trace;
            }
            Blockage::Soft(value) => trace.absorbed = trace.absorbed.saturating_add(value),
        }
        if let Some(tile) = grid.tile(b) {
            trace.smoke += u32::from(tile.smoke);
        }
    }
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TacticsConfig;
    use crate::data::{LoftLibrary, PartLibrary, TilePart};
    use crate::unit::{Faction, Unit};

    fn open_field() -> Battlefield {
        let grid = TileGrid::new(8, 8, 2, PartLibrary::new(), LoftLibrary::stock()).unwrap();
        Battlefield::new(grid, TacticsConfig::default())
    }

    #[test]
    fn test_bresenham_endpoints_and_length() {
        let a = Position::new(0, 0, 0);
        let b = Position::new(7, 3, -2);
        let line = bresenham(a, b, false);
        assert_eq!(line.first(), Some(&a));
        assert_eq!(line.last(), Some(&b));
        assert_eq!(line.len(), 8);
    }

    #[test]
    fn test_corner_steps_are_single_axis() {
        let line = bresenham(Position::new(0, 0, 0), Position::new(5, 4, 3), true);
        assert_eq!(line.last(), Some(&Position::new(5, 4, 3)));
        for pair in line.windows(2) {
            let d = pair[1] - pair[0];
            assert_eq!(d.x.abs() + d.y.abs() + d.z.abs(), 1, "{pair:?}");
        }
    }

    #[test]
    fn test_empty_field_trace_never_hits() {
        let bf = open_field();
        let from = Position::new(1, 1, 0).tile_center_voxel(12);
        let to = Position::new(6, 5, 1).tile_center_voxel(6);
        let trace = trace_voxels(&bf, from, to, &TraceOptions::default());
        assert_eq!(trace.hit, VoxelHit::Empty);
        assert_eq!(trace.voxel, to);
    }

    #[test]
    fn test_wall_voxels_stop_trace() {
        let mut lib = PartLibrary::new();
        let wall = lib.add(TilePart::wall("wall", PartSlot::WestWall));
        let mut grid = TileGrid::new(8, 8, 1, lib, LoftLibrary::stock()).unwrap();
        grid.set_part(Position::new(4, 2, 0), PartSlot::WestWall, Some(wall)).unwrap();
        let bf = Battlefield::new(grid, TacticsConfig::default());

        let from = Position::new(1, 2, 0).tile_center_voxel(12);
        let to = Position::new(6, 2, 0).tile_center_voxel(12);
        let trace = trace_voxels(&bf, from, to, &TraceOptions::default());
        assert_eq!(
            trace.hit,
            VoxelHit::Part {
                tile: Position::new(4, 2, 0),
                slot: PartSlot::WestWall
            }
        );
        assert_eq!(trace.voxel.to_tile(), Position::new(4, 2, 0));
    }

    #[test]
    fn test_unit_silhouette_and_ignore() {
        let mut bf = open_field();
        let id = bf
            .add_unit(Unit::new("target", Faction::Player, Position::new(5, 5, 0)))
            .unwrap();
        let chest = Position::new(5, 5, 0).tile_center_voxel(12);
        assert_eq!(voxel_check(&bf, chest, &TraceOptions::default()), VoxelHit::Unit(id));
        assert_eq!(voxel_check(&bf, chest, &TraceOptions::fired_by(id)), VoxelHit::Empty);
        // Above the head.
        let above = Position::new(5, 5, 0).tile_center_voxel(23);
        assert_eq!(voxel_check(&bf, above, &TraceOptions::default()), VoxelHit::Empty);
        assert_eq!(
            voxel_check(&bf, Position::new(-1, 0, 0), &TraceOptions::default()),
            VoxelHit::OutOfBounds
        );
        let sky = Position::new(5, 5, bf.grid.height()).tile_center_voxel(4);
        assert_eq!(voxel_check(&bf, sky, &TraceOptions::default()), VoxelHit::Empty);
    }

    #[test]
    fn test_arc_clears_low_obstacle() {
        let mut lib = PartLibrary::new();
        let crate_part = lib.add(TilePart::object("crate", 6));
        let mut grid = TileGrid::new(10, 3, 2, lib, LoftLibrary::stock()).unwrap();
        grid.set_part(Position::new(4, 1, 0), PartSlot::Object, Some(crate_part)).unwrap();
        let bf = Battlefield::new(grid, TacticsConfig::default());

        let from = Position::new(1, 1, 0).tile_center_voxel(18);
        let to = Position::new(8, 1, 0).tile_center_voxel(1);
        let straight = trace_voxels(&bf, from, to, &TraceOptions::default());
        assert!(matches!(straight.hit, VoxelHit::Part { .. }));
        let lobbed = trace_arc(&bf, from, to, 24, &TraceOptions::default());
        assert_eq!(lobbed.hit, VoxelHit::Empty);
    }

    #[test]
    fn test_tile_trace_reports_block_and_smoke() {
        let mut lib = PartLibrary::new();
        let wall = lib.add(TilePart::wall("wall", PartSlot::WestWall));
        let mut grid = TileGrid::new(8, 3, 1, lib, LoftLibrary::stock()).unwrap();
        grid.tile_mut(Position::new(2, 1, 0)).unwrap().smoke = 5;
        grid.set_part(Position::new(5, 1, 0), PartSlot::WestWall, Some(wall)).unwrap();

        let clear = trace_tiles(&grid, Position::new(0, 1, 0), Position::new(4, 1, 0), Medium::Sight);
        assert!(clear.reached);
        assert_eq!(clear.smoke, 5);

        let blocked = trace_tiles(&grid, Position::new(0, 1, 0), Position::new(7, 1, 0), Medium::Sight);
        assert!(!blocked.reached);
        assert_eq!(blocked.blocked_at, Some(Position::new(5, 1, 0)));
    }
}
