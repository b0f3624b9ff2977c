//! Field of view.
//!
//! Every tile within sight range is tested with a tile-resolution sight
//! trace from the observer. Darkness shortens sight: a tile darker than the
//! threshold is only seen from close by unless it is burning. Units in view
//! additionally need a voxel-level line of sight to part of their body.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::battlefield::Battlefield;
use crate::data::Medium;
use crate::error::{Result, TacticsError};
use crate::geometry::{Direction, Position};
use crate::grid::TileGrid;
use crate::targeting::line_of_sight;
use crate::tile::Face;
use crate::trace::trace_tiles;
use crate::unit::{Faction, Unit, UnitId};

/// What one observer saw.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FovReport {
    /// The observer.
    pub observer: UnitId,
    /// Tiles in view.
    pub tiles: Vec<Position>,
    /// Units in view, by id.
    pub units: Vec<UnitId>,
    /// Units in view that were not in view before this pass.
    pub newly_spotted: Vec<UnitId>,
}

fn sight_reaches(bf: &Battlefield, from: Position, to: Position) -> bool {
    let trace = trace_tiles(&bf.grid, from, to, Medium::Sight);
    trace.reached && trace.smoke < bf.config.visibility.smoke_sight_limit
}

/// Whether darkness hides something at `distance_sq` on a tile.
fn hidden_by_darkness(bf: &Battlefield, tile: Position, distance_sq: i32, burning: bool) -> bool {
    let vis = &bf.config.visibility;
    let Some(t) = bf.grid.tile(tile) else {
        return true;
    };
    !burning
        && t.fire == 0
        && t.light() < vis.darkness_threshold
        && distance_sq > vis.dark_view_distance * vis.dark_view_distance
}

/// Tiles `observer` can see, in grid order.
#[must_use]
pub fn visible_tiles(bf: &Battlefield, observer: &Unit) -> Vec<Position> {
    let range = bf.config.visibility.max_view_distance;
    let eye = observer.position;
    let mut seen = Vec::new();
    for z in 0..bf.grid.height() {
        for y in (eye.y - range).max(0)..=(eye.y + range).min(bf.grid.length() - 1) {
            for x in (eye.x - range).max(0)..=(eye.x + range).min(bf.grid.width() - 1) {
                let tile = Position::new(x, y, z);
                let distance_sq = eye.distance_sq_2d(tile);
                if distance_sq > range * range || hidden_by_darkness(bf, tile, distance_sq, false) {
                    continue;
                }
                if observer.covers(tile) || sight_reaches(bf, eye, tile) {
                    seen.push(tile);
                }
            }
        }
    }
    seen
}

/// Other standing units `observer` can see, by id.
#[must_use]
pub fn visible_units(bf: &Battlefield, observer: &Unit) -> Vec<UnitId> {
    let range = bf.config.visibility.max_view_distance;
    bf.units()
        .iter()
        .filter(|u| u.id != observer.id && u.is_active())
        .filter(|u| {
            let distance_sq = observer.position.distance_sq(u.position);
            distance_sq <= range * range
                && !hidden_by_darkness(bf, u.position, distance_sq, u.on_fire > 0)
                && sight_reaches(bf, observer.position, u.position)
                && line_of_sight(bf, observer, u)
        })
        .map(|u| u.id)
        .collect()
}

/// Mark a seen tile and the walls bordering it as discovered.
fn reveal(grid: &mut TileGrid, tile: Position) {
    if let Some(t) = grid.tile_mut(tile) {
        t.discover(Face::Floor);
        t.discover(Face::West);
        t.discover(Face::North);
    }
    if let Some(east) = grid.tile_mut(tile.step(Direction::East)) {
        east.discover(Face::West);
    }
    if let Some(south) = grid.tile_mut(tile.step(Direction::South)) {
        south.discover(Face::North);
    }
}

/// Recompute what one unit sees and apply the side effects: its
/// visible-unit list, discovery for the player's side, and spotting marks
/// on enemies in view.
///
/// # Errors
///
/// Returns [`TacticsError::UnknownUnit`] if the observer does not exist.
pub fn calculate_fov(bf: &mut Battlefield, observer_id: UnitId) -> Result<FovReport> {
    let observer = bf.get_unit(observer_id)?;
    if !observer.is_active() {
        return Ok(FovReport {
            observer: observer_id,
            ..FovReport::default()
        });
    }
    let tiles = visible_tiles(bf, observer);
    let units = visible_units(bf, observer);
    let previous: HashSet<UnitId> = observer.visible_units.iter().copied().collect();
    let newly_spotted: Vec<UnitId> = units.iter().copied().filter(|id| !previous.contains(id)).collect();
    let faction = observer.faction;

    if faction == Faction::Player {
        for &tile in &tiles {
            reveal(&mut bf.grid, tile);
        }
    }
    for &id in &units {
        let unit = bf.unit_mut(id).ok_or(TacticsError::UnknownUnit(id))?;
        if faction.is_hostile_to(unit.faction) {
            unit.turns_since_spotted = 0;
        }
    }
    let observer = bf.unit_mut(observer_id).ok_or(TacticsError::UnknownUnit(observer_id))?;
    observer.visible_units.clone_from(&units);

    debug!(
        "Unit {} sees {} tiles, {} units ({} new)",
        observer_id,
        tiles.len(),
        units.len(),
        newly_spotted.len()
    );
    Ok(FovReport {
        observer: observer_id,
        tiles,
        units,
        newly_spotted,
    })
}

/// Recompute field of view for every standing unit.
///
/// # Errors
///
/// Propagates errors from [`calculate_fov`].
pub fn calculate_all_fov(bf: &mut Battlefield) -> Result<Vec<FovReport>> {
    let ids: Vec<UnitId> = bf.units().iter().filter(|u| u.is_active()).map(|u| u.id).collect();
    ids.into_iter().map(|id| calculate_fov(bf, id)).collect()
}
