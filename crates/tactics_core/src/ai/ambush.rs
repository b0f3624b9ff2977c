//! Ambush mode: wait out of sight along the target's way in.

use crate::action::{ActionKind, BattleAction};
use crate::data::{Medium, WeaponKind};
use crate::geometry::{Direction, Position};
use crate::pathfinding::{PathOptions, Pathfinding};
use crate::targeting::{faces_window, spotting_units};
use crate::trace::trace_tiles;

use super::ThinkContext;

/// Tiles the target would cross coming for us, in order, excluding its
/// own tile.
fn approach_path(ctx: &ThinkContext<'_>) -> Option<Vec<Position>> {
    let target = ctx.target()?;
    let mut pathfinding = Pathfinding::new();
    Direction::HORIZONTAL.into_iter().find_map(|dir| {
        let goal = ctx.bf.grid.neighbor(ctx.unit.position, dir)?;
        pathfinding
            .calculate_path(ctx.bf, target, goal, PathOptions::default())
            .map(|route| route.positions().into_iter().skip(1).collect())
    })
}

/// Propose a hidden tile overlooking the target's approach, facing it.
pub(super) fn evaluate(ctx: &ThinkContext<'_>) -> Option<BattleAction> {
    let unit = ctx.unit;
    let index = unit.weapon_index(|w| w.kind == WeaponKind::Firearm)?;
    let range = unit.weapons[index].rule.max_range;
    let path = approach_path(ctx)?;
    if path.is_empty() {
        return None;
    }
    let grid = &ctx.bf.grid;

    ctx.reachable(PathOptions::default())
        .into_iter()
        .filter(|r| r.position != unit.position)
        .filter(|r| spotting_units(ctx.bf, r.position, unit.faction).is_empty())
        .filter_map(|r| {
            let (step, seen) = path.iter().enumerate().find(|(_, p)| {
                **p != r.position
                    && p.distance(r.position) <= range
                    && trace_tiles(grid, r.position, **p, Medium::Sight).reached
            })?;
            let facing = Direction::towards(r.position, *seen).unwrap_or(unit.facing);
            let key = (faces_window(grid, r.position, facing), step, r.cost);
            Some((key, r, facing))
        })
        .min_by_key(|(key, _, _)| *key)
        .map(|(_, r, facing)| {
            BattleAction::new(unit.id, ActionKind::Walk, r.position, r.cost).facing(Some(facing))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiBehavior;
    use crate::battlefield::Battlefield;
    use crate::config::TacticsConfig;
    use crate::data::{FireMode, LoftLibrary, PartLibrary, PartSlot, TilePart, WeaponRule};
    use crate::grid::TileGrid;
    use crate::unit::{Faction, Unit};

    /// A north-south corridor wall with a gap; the target waits beyond it.
    fn corridor() -> Battlefield {
        let mut lib = PartLibrary::new();
        let wall = lib.add(TilePart::wall("wall", PartSlot::WestWall));
        let mut grid = TileGrid::new(16, 16, 1, lib, LoftLibrary::stock()).unwrap();
        for y in 0..16 {
            if y != 8 {
                grid.set_part(Position::new(8, y, 0), PartSlot::WestWall, Some(wall)).unwrap();
            }
        }
        Battlefield::new(grid, TacticsConfig::default())
    }

    #[test]
    fn test_ambush_hides_and_faces_approach() {
        let mut bf = corridor();
        let rifle = WeaponRule::firearm("rifle", 30).with_snap(FireMode::flat(10, 60));
        let id = bf
            .add_unit(Unit::new("alien", Faction::Hostile, Position::new(4, 8, 0)).with_weapon(rifle))
            .unwrap();
        let target = bf.add_unit(Unit::new("soldier", Faction::Player, Position::new(13, 8, 0))).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let record = AiBehavior {
            target: Some(target),
            ..AiBehavior::default()
        };
        let ctx = ThinkContext { bf: &bf, unit: &unit, record: &record };

        let action = evaluate(&ctx).unwrap();
        assert_eq!(action.kind, ActionKind::Walk);
        assert!(action.final_facing.is_some());
        assert!(spotting_units(&bf, action.target, Faction::Hostile).is_empty());
        assert!(action.target.x < 8);
    }

    #[test]
    fn test_ambush_needs_a_gun() {
        let mut bf = corridor();
        let id = bf
            .add_unit(Unit::new("alien", Faction::Hostile, Position::new(4, 8, 0)))
            .unwrap();
        let target = bf.add_unit(Unit::new("soldier", Faction::Player, Position::new(13, 8, 0))).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let record = AiBehavior {
            target: Some(target),
            ..AiBehavior::default()
        };
        let ctx = ThinkContext { bf: &bf, unit: &unit, record: &record };
        assert!(evaluate(&ctx).is_none());
    }
}
