//! Patrol mode: wander the waypoint graph.

use rand::Rng;

use crate::action::{ActionKind, BattleAction};
use crate::pathfinding::{PathOptions, Pathfinding};
use crate::waypoint::NodeId;

use super::ThinkContext;

/// Propose a walk to the next patrol node.
///
/// Candidates are the links of the node the unit last reached (or the
/// nearest node, plus that node itself if the unit is not on it). Nodes
/// not yet visited win over visited ones, then higher priority, then the
/// shorter trip; remaining ties are broken at random.
pub(super) fn evaluate<R: Rng + ?Sized>(ctx: &ThinkContext<'_>, rng: &mut R) -> Option<BattleAction> {
    let graph = &ctx.bf.waypoints;
    let unit = ctx.unit;
    let record = ctx.record;
    let current = record.from_node.or_else(|| graph.nearest(unit.position))?;
    let node = graph.get(current)?;

    let mut options: Vec<NodeId> = node.links.clone();
    if node.position != unit.position {
        options.push(current);
    }

    let mut pathfinding = Pathfinding::new();
    let mut scored: Vec<((bool, std::cmp::Reverse<u32>, u32), NodeId, u32)> = options
        .into_iter()
        .filter_map(|id| {
            let candidate = graph.get(id)?;
            if !candidate.admits(record.scout, unit.size) || candidate.position == unit.position {
                return None;
            }
            let route = pathfinding.calculate_path(ctx.bf, unit, candidate.position, PathOptions::default())?;
            let key = (
                record.visited_nodes.contains(&id),
                std::cmp::Reverse(candidate.priority),
                route.tu_cost,
            );
            Some((key, id, route.tu_cost))
        })
        .collect();

    let best = scored.iter().map(|(key, _, _)| *key).min()?;
    scored.retain(|(key, _, _)| *key == best);
    let (_, id, tu) = scored[rng.gen_range(0..scored.len())];
    let position = graph.get(id)?.position;
    Some(BattleAction::new(unit.id, ActionKind::Walk, position, tu))
}
