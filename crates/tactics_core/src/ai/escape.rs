//! Escape mode: fall back to the safest tile in reach.

use crate::action::{ActionKind, BattleAction};
use crate::geometry::Position;
use crate::pathfinding::PathOptions;
use crate::targeting::spotting_units;
use crate::unit::Unit;

use super::ThinkContext;

const DISTANCE_WEIGHT: i32 = 10;
const SPOTTER_WEIGHT: i32 = 25;
const SMOKE_WEIGHT: i32 = 2;
const DANGER_WEIGHT: i32 = 40;

/// Safety score of a tile; higher is safer.
fn safety(ctx: &ThinkContext<'_>, threats: &[&Unit], tile: Position, cost: u32) -> i32 {
    let nearest = threats
        .iter()
        .map(|t| t.position.distance(tile))
        .min()
        .unwrap_or(0);
    let spotters = spotting_units(ctx.bf, tile, ctx.unit.faction).len() as i32;
    let (smoke, danger) = ctx
        .bf
        .grid
        .tile(tile)
        .map_or((0, false), |t| (i32::from(t.smoke), t.is_dangerous()));
    DISTANCE_WEIGHT * nearest - SPOTTER_WEIGHT * spotters + SMOKE_WEIGHT * smoke
        - DANGER_WEIGHT * i32::from(danger)
        - (cost / 4) as i32
}

/// Propose a walk to the reachable tile furthest from threats and out of
/// sight. Nothing is proposed if staying put is already best.
pub(super) fn evaluate(ctx: &ThinkContext<'_>) -> Option<BattleAction> {
    let unit = ctx.unit;
    let threats: Vec<&Unit> = ctx
        .bf
        .hostiles_of(unit)
        .filter(|u| u.turns_since_spotted <= ctx.config().intelligence || ctx.sees(u))
        .collect();
    if threats.is_empty() {
        return None;
    }

    let options = PathOptions {
        avoid_hazards: true,
        ..PathOptions::default()
    };
    let (best, score) = ctx
        .reachable(options)
        .into_iter()
        .map(|r| (r, safety(ctx, &threats, r.position, r.cost)))
        .fold(None, |best: Option<(super::Reachable, i32)>, (r, score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((r, score)),
        })?;
    let here = safety(ctx, &threats, unit.position, 0);
    (best.position != unit.position && score > here)
        .then(|| BattleAction::new(unit.id, ActionKind::Walk, best.position, best.cost))
}
