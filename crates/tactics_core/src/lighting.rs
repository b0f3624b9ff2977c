//! Three-layer tile lighting.
//!
//! Ambient light comes from the sky and is shaded by every floor above a
//! tile. Static light comes from lamps built into the terrain and from
//! burning tiles. Dynamic light comes from units: carried lights and units
//! on fire. A tile's effective light is the brightest of the three.

use tracing::debug;

use crate::battlefield::Battlefield;
use crate::config::VisibilityConfig;
use crate::data::PartSlot;
use crate::geometry::Position;
use crate::grid::TileGrid;
use crate::tile::LightLayer;

/// Raise `layer` around `center` on its level, losing one step per tile.
fn spread(grid: &mut TileGrid, layer: LightLayer, center: Position, level: u8, radius: i32) {
    for y in center.y - radius..=center.y + radius {
        for x in center.x - radius..=center.x + radius {
            let pos = Position::new(x, y, center.z);
            let distance = center.distance(pos);
            if distance > radius {
                continue;
            }
            let Ok(lost) = u8::try_from(distance) else {
                continue;
            };
            if let Some(tile) = grid.tile_mut(pos) {
                tile.raise_light(layer, level.saturating_sub(lost));
            }
        }
    }
}

/// Recompute ambient light from the sun, column by column.
pub fn calculate_sun_shading(grid: &mut TileGrid, config: &VisibilityConfig) {
    for y in 0..grid.length() {
        for x in 0..grid.width() {
            let mut roofs: u8 = 0;
            for z in (0..grid.height()).rev() {
                let pos = Position::new(x, y, z);
                let shade = config.roof_shade.saturating_mul(roofs);
                let has_floor = grid.part(pos, PartSlot::Floor).is_some();
                if let Some(tile) = grid.tile_mut(pos) {
                    tile.set_light(LightLayer::Ambient, config.sun_light.saturating_sub(shade));
                }
                if has_floor {
                    roofs = roofs.saturating_add(1);
                }
            }
        }
    }
}

/// Recompute static light from lamps and fires.
pub fn calculate_terrain_lighting(grid: &mut TileGrid, config: &VisibilityConfig) {
    let mut sources = Vec::new();
    for (index, tile) in grid.tiles().enumerate() {
        let pos = grid.position_of(index);
        let lamp = PartSlot::ALL
            .iter()
            .filter_map(|&slot| grid.part(pos, slot))
            .map(|part| part.light_source)
            .max()
            .unwrap_or(0);
        let fire = if tile.fire > 0 { config.fire_light } else { 0 };
        let level = lamp.max(fire).min(config.max_light);
        if level > 0 {
            sources.push((pos, level));
        }
    }

    for tile in grid.tiles_mut() {
        tile.set_light(LightLayer::Static, 0);
    }
    for &(pos, level) in &sources {
        spread(grid, LightLayer::Static, pos, level, i32::from(level));
    }
    debug!("Terrain lighting: {} sources", sources.len());
}

/// Recompute dynamic light from units.
pub fn calculate_unit_lighting(bf: &mut Battlefield) {
    let config = bf.config.visibility.clone();
    let sources: Vec<(Position, u8, i32)> = bf
        .units()
        .iter()
        .filter_map(|unit| {
            if unit.on_fire > 0 {
                Some((unit.position, config.fire_light, i32::from(config.fire_light)))
            } else if unit.light_radius > 0 && unit.is_active() {
                Some((unit.position, config.max_light, unit.light_radius))
            } else {
                None
            }
        })
        .collect();

    for tile in bf.grid.tiles_mut() {
        tile.set_light(LightLayer::Dynamic, 0);
    }
    for (pos, level, radius) in sources {
        spread(&mut bf.grid, LightLayer::Dynamic, pos, level, radius);
    }
}

/// Recompute all three layers.
pub fn calculate_lighting(bf: &mut Battlefield) {
    let config = bf.config.visibility.clone();
    calculate_sun_shading(&mut bf.grid, &config);
    calculate_terrain_lighting(&mut bf.grid, &config);
    calculate_unit_lighting(bf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TacticsConfig;
    use crate::data::{LoftLibrary, PartLibrary, TilePart};
    use crate::unit::{Faction, Unit};

    fn roofed() -> TileGrid {
        let mut lib = PartLibrary::new();
        let floor = lib.add(TilePart::floor("floor"));
        let lamp = lib.add(TilePart::object("lamp", 4).with_light(5));
        let mut grid = TileGrid::new(10, 10, 3, lib, LoftLibrary::stock()).unwrap();
        grid.fill(Position::new(0, 0, 0), Position::new(9, 9, 0), floor).unwrap();
        grid.fill(Position::new(0, 0, 1), Position::new(4, 9, 1), floor).unwrap();
        grid.set_part(Position::new(7, 7, 0), PartSlot::Object, Some(lamp)).unwrap();
        grid
    }

    #[test]
    fn test_sun_shading_counts_roofs() {
        let mut grid = roofed();
        let config = VisibilityConfig::default();
        calculate_sun_shading(&mut grid, &config);
        let light = |x, y, z| grid.tile(Position::new(x, y, z)).unwrap().light_layer(LightLayer::Ambient);
        assert_eq!(light(2, 2, 2), 15);
        // Own floor does not shade, the floor above does.
        assert_eq!(light(2, 2, 1), 15);
        assert_eq!(light(2, 2, 0), 9);
        assert_eq!(light(8, 2, 0), 15);
    }

    #[test]
    fn test_lamp_and_fire_falloff() {
        let mut grid = roofed();
        let config = VisibilityConfig::default();
        calculate_terrain_lighting(&mut grid, &config);
        let light = |g: &TileGrid, x, y| g.tile(Position::new(x, y, 0)).unwrap().light_layer(LightLayer::Static);
        assert_eq!(light(&grid, 7, 7), 5);
        assert_eq!(light(&grid, 7, 9), 3);
        assert_eq!(light(&grid, 0, 0), 0);

        grid.tile_mut(Position::new(1, 1, 0)).unwrap().fire = 3;
        calculate_terrain_lighting(&mut grid, &config);
        assert_eq!(light(&grid, 1, 1), 15);
        assert_eq!(light(&grid, 4, 1), 12);
    }

    #[test]
    fn test_unit_light_moves_with_unit() {
        let grid = TileGrid::new(10, 10, 1, PartLibrary::new(), LoftLibrary::stock()).unwrap();
        let mut bf = Battlefield::new(grid, TacticsConfig::default());
        let mut torch = Unit::new("torch", Faction::Player, Position::new(2, 2, 0));
        torch.light_radius = 3;
        let id = bf.add_unit(torch).unwrap();

        calculate_unit_lighting(&mut bf);
        let dynamic = |bf: &Battlefield, x, y| {
            bf.grid.tile(Position::new(x, y, 0)).unwrap().light_layer(LightLayer::Dynamic)
        };
        assert_eq!(dynamic(&bf, 2, 2), 15);
        assert_eq!(dynamic(&bf, 5, 2), 12);
        assert_eq!(dynamic(&bf, 7, 2), 0);

        bf.move_unit(id, Position::new(7, 7, 0)).unwrap();
        calculate_unit_lighting(&mut bf);
        assert_eq!(dynamic(&bf, 2, 2), 0);
        assert_eq!(dynamic(&bf, 7, 7), 15);
    }
}
