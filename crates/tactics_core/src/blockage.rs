//! Tile-to-tile blockage scoring.
//!
//! Every query asks how much of a [`Medium`] survives one step between
//! neighbouring tiles. Sight is all-or-nothing: any crossed part with
//! `stop_los` is a hard stop. The other media lose the summed block values
//! of the crossed parts, and a full 255 block is a hard stop.

use crate::data::{BigWall, Crossing, Medium, PartSlot, TilePart};
use crate::geometry::{Direction, Position};
use crate::grid::TileGrid;

/// Result of a blockage query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blockage {
    /// Partial absorption (0 = unobstructed).
    Soft(u32),
    /// Nothing gets through.
    Hard,
}

impl Blockage {
    /// Nothing in the way.
    pub const CLEAR: Self = Self::Soft(0);

    /// Whether this is a full stop.
    #[must_use]
    pub const fn is_hard(self) -> bool {
        matches!(self, Self::Hard)
    }

    /// Absorbed amount, with a hard stop counted as `max`.
    #[must_use]
    pub const fn value(self, max: u32) -> u32 {
        match self {
            Self::Soft(v) => if v > max { max } else { v },
            Self::Hard => max,
        }
    }

    /// Combine two blockages met one after the other.
    #[must_use]
    pub const fn then(self, other: Self) -> Self {
        match (self, other) {
            (Self::Soft(a), Self::Soft(b)) => Self::Soft(a.saturating_add(b)),
            _ => Self::Hard,
        }
    }

    /// Blockage of a single part for a medium.
    #[must_use]
    pub const fn of_part(part: &TilePart, medium: Medium) -> Self {
        match medium {
            Medium::Sight => {
                if part.stop_los {
                    Self::Hard
                } else {
                    Self::CLEAR
                }
            }
            _ => {
                let value = part.block.get(medium);
                if value >= 255 {
                    Self::Hard
                } else {
                    Self::Soft(value)
                }
            }
        }
    }
}

fn of(part: Option<&TilePart>, medium: Medium) -> Blockage {
    part.map_or(Blockage::CLEAR, |p| Blockage::of_part(p, medium))
}

/// Blockage of the big wall in a tile against a step, if it is in the way.
fn big_wall_blockage(
    grid: &TileGrid,
    tile: Position,
    direction: Direction,
    crossing: Crossing,
    medium: Medium,
) -> Blockage {
    match grid.part(tile, PartSlot::Object) {
        Some(object)
            if object.big_wall != BigWall::None && object.big_wall.obstructs(direction, crossing) =>
        {
            Blockage::of_part(object, medium)
        }
        _ => Blockage::CLEAR,
    }
}

/// Content of the destination tile that a step runs into.
fn content_blockage(grid: &TileGrid, tile: Position, medium: Medium) -> Blockage {
    match grid.part(tile, PartSlot::Object) {
        Some(object) if object.big_wall == BigWall::None => Blockage::of_part(object, medium),
        _ => Blockage::CLEAR,
    }
}

/// Edge wall crossed by an orthogonal step.
fn edge(grid: &TileGrid, from: Position, direction: Direction, medium: Medium) -> Blockage {
    if grid.in_bounds(from.step(direction)) {
        of(grid.wall_between(from, direction), medium)
    } else {
        Blockage::Hard
    }
}

fn orthogonal(grid: &TileGrid, from: Position, direction: Direction, medium: Medium) -> Blockage {
    let to = from.step(direction);
    edge(grid, from, direction, medium)
        .then(big_wall_blockage(grid, from, direction, Crossing::Leaving, medium))
        .then(big_wall_blockage(grid, to, direction, Crossing::Entering, medium))
        .then(content_blockage(grid, to, medium))
}

/// One orthogonal detour round a corner: edge, corner tile, edge.
fn detour(
    grid: &TileGrid,
    from: Position,
    first: Direction,
    second: Direction,
    medium: Medium,
) -> Blockage {
    let corner = from.step(first);
    edge(grid, from, first, medium)
        .then(big_wall_blockage(grid, corner, first, Crossing::Entering, medium))
        .then(big_wall_blockage(grid, corner, second, Crossing::Leaving, medium))
        .then(edge(grid, corner, second, medium))
}

/// Blockage of a horizontal step.
///
/// A diagonal step is scored along both orthogonal detours around the
/// corner. If both are hard the step is hard; if one is hard the medium
/// flows round through the other; otherwise the two are averaged. Big walls
/// in the end tiles are then checked against the diagonal itself, which is
/// what lets power slip along a diagonal wall but not across it.
#[must_use]
pub fn horizontal_blockage(
    grid: &TileGrid,
    from: Position,
    direction: Direction,
    medium: Medium,
) -> Blockage {
    if direction.is_vertical() {
        return vertical_blockage(grid, from, direction, medium);
    }
    if !direction.is_diagonal() {
        return orthogonal(grid, from, direction, medium);
    }

    let to = from.step(direction);
    if !grid.in_bounds(to) {
        return Blockage::Hard;
    }
    let (a, b) = direction.components();
    let around = match (detour(grid, from, a, b, medium), detour(grid, from, b, a, medium)) {
        (Blockage::Hard, Blockage::Hard) => Blockage::Hard,
        (Blockage::Hard, soft) | (soft, Blockage::Hard) => soft,
        (Blockage::Soft(x), Blockage::Soft(y)) => Blockage::Soft((x + y) / 2),
    };
    around
        .then(big_wall_blockage(grid, from, direction, Crossing::Leaving, medium))
        .then(big_wall_blockage(grid, to, direction, Crossing::Entering, medium))
        .then(content_blockage(grid, to, medium))
}

/// Blockage of an up or down step: the floor between the two levels.
#[must_use]
pub fn vertical_blockage(
    grid: &TileGrid,
    from: Position,
    direction: Direction,
    medium: Medium,
) -> Blockage {
    let to = from.step(direction);
    if !direction.is_vertical() || !grid.in_bounds(to) {
        return Blockage::Hard;
    }
    of(grid.floor_between(from, direction), medium)
        .then(big_wall_blockage(grid, to, direction, Crossing::Entering, medium))
}

/// Blockage of a step between any two touching tiles, horizontal part first.
#[must_use]
pub fn step_blockage(grid: &TileGrid, from: Position, to: Position, medium: Medium) -> Blockage {
    let dz = to.z - from.z;
    let mut here = from;
    let mut total = Blockage::CLEAR;
    if let Some(direction) = Direction::from_delta(to.x - from.x, to.y - from.y) {
        total = total.then(horizontal_blockage(grid, here, direction, medium));
        here = here.step(direction);
    }
    if dz != 0 && !total.is_hard() {
        let vertical = if dz > 0 { Direction::Up } else { Direction::Down };
        total = total.then(vertical_blockage(grid, here, vertical, medium));
    }
    total
}
