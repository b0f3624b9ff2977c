//! Unit AI.
//!
//! Every think cycle an AI unit rescans its situation, lets each of the
//! four modes propose an action, draws a mode from weighted odds, and then
//! walks the fallback chain from the drawn mode until some mode has a
//! proposal. When none does the unit passes with a think action.
//!
//! The behaviour record lives on the unit and persists across cycles, so
//! mode stickiness, the current target, patrol progress and a melee charge
//! carry over.

mod ambush;
mod behavior;
mod combat;
mod escape;
mod patrol;

pub use behavior::{AiBehavior, AiMode, ModeCandidates, ModeOdds, Situation};

use rand::Rng;
use tracing::debug;

use crate::action::{ActionKind, BattleAction};
use crate::battlefield::{Battlefield, MissionKind};
use crate::config::AiConfig;
use crate::data::WeaponKind;
use crate::error::{Result, TacticsError};
use crate::geometry::Position;
use crate::pathfinding::{PathOptions, Pathfinding};
use crate::targeting::spotting_units;
use crate::unit::{Unit, UnitId};

/// A tile the unit could walk to this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Reachable {
    /// Tile.
    pub position: Position,
    /// TU to get there.
    pub cost: u32,
}

/// Read-only view the mode evaluators work from.
pub(crate) struct ThinkContext<'a> {
    pub bf: &'a Battlefield,
    pub unit: &'a Unit,
    pub record: &'a AiBehavior,
}

impl<'a> ThinkContext<'a> {
    pub fn config(&self) -> &'a AiConfig {
        &self.bf.config.ai
    }

    /// The current target, if it is still standing.
    pub fn target(&self) -> Option<&'a Unit> {
        self.record
            .target
            .and_then(|id| self.bf.unit(id))
            .filter(|u| u.is_active())
    }

    pub fn sees(&self, other: &Unit) -> bool {
        self.unit.visible_units.contains(&other.id)
    }

    /// Tiles reachable with the unit's remaining TU inside the search
    /// radius, cheapest first. The start tile is included at cost 0.
    pub fn reachable(&self, options: PathOptions) -> Vec<Reachable> {
        let radius = self.config().search_radius;
        let mut pathfinding = Pathfinding::new();
        let settled = pathfinding.find_reachable(self.bf, self.unit, self.unit.tu, options);
        settled
            .into_iter()
            .filter_map(|index| {
                let position = self.bf.grid.position_of(index);
                let cost = pathfinding.cost_to(index)?;
                (position.distance(self.unit.position) <= radius).then_some(Reachable { position, cost })
            })
            .collect()
    }
}

/// Refresh the scan results, target and patrol bookkeeping of a record.
fn scan(bf: &Battlefield, unit: &Unit, record: &mut AiBehavior) {
    let intelligence = bf.config.ai.intelligence;
    let weapon = |kind: WeaponKind| unit.weapon_index(|w| w.kind == kind).is_some();

    let visible: Vec<&Unit> = unit
        .visible_units
        .iter()
        .filter_map(|&id| bf.unit(id))
        .filter(|u| u.is_active() && unit.is_hostile_to(u))
        .collect();
    let exposed: Vec<&Unit> = bf
        .hostiles_of(unit)
        .filter(|u| u.turns_since_spotted <= intelligence)
        .collect();

    record.situation = Situation {
        has_ranged: weapon(WeaponKind::Firearm),
        has_melee: weapon(WeaponKind::Melee),
        has_guided: weapon(WeaponKind::GuidedLauncher),
        has_grenade: weapon(WeaponKind::Grenade),
        has_psi: unit.psi_skill > 0 && weapon(WeaponKind::PsiAmp),
        visible_hostiles: visible.len() as u32,
        exposed_hostiles: exposed.len() as u32,
        spotters: spotting_units(bf, unit.position, unit.faction).len() as u32,
        closest_hostile: visible.iter().map(|u| unit.position.distance(u.position)).min(),
    };
    record.scout = exposed.is_empty();

    // Nearest hostile, preferring ones in view.
    record.target = visible
        .iter()
        .map(|u| (false, u))
        .chain(exposed.iter().map(|u| (true, u)))
        .min_by_key(|(unseen, u)| (*unseen, unit.position.distance_sq(u.position), u.id))
        .map(|(_, u)| u.id);
    if record.target.is_none() {
        record.charging = false;
    }

    if let Some((id, _)) = bf.waypoints.iter().find(|(_, n)| n.position == unit.position) {
        record.from_node = Some(id);
        if record.to_node == Some(id) {
            record.to_node = None;
        }
        if !record.visited_nodes.contains(&id) {
            record.visited_nodes.push(id);
        }
    }
    if !bf.waypoints.is_empty() && record.visited_nodes.len() >= bf.waypoints.len() {
        record.visited_nodes.clear();
    }
}

/// Weighted odds of each mode for this cycle.
#[must_use]
pub fn mode_odds(bf: &Battlefield, unit: &Unit, record: &AiBehavior) -> ModeOdds {
    let config = &bf.config.ai;
    let situation = &record.situation;
    let mut odds = ModeOdds {
        patrol: config.patrol_odds * 100,
        combat: config.combat_odds * 100,
        ambush: config.ambush_odds * 100,
        escape: config.escape_odds * 100,
    };

    if situation.visible_hostiles > 0 {
        odds.patrol /= 2;
    }
    if situation.spotters > 0 {
        odds.patrol = 0;
    }
    if !situation.has_ranged {
        odds.ambush = 0;
    }

    odds.scale(record.mode, 110);

    let health = unit.health * 3;
    if health < unit.max_health {
        odds.scale(AiMode::Escape, 170);
        odds.scale(AiMode::Combat, 60);
        odds.scale(AiMode::Ambush, 75);
    } else if health < unit.max_health * 2 {
        odds.scale(AiMode::Escape, 140);
        odds.scale(AiMode::Combat, 80);
        odds.scale(AiMode::Ambush, 80);
    } else if unit.health < unit.max_health {
        odds.scale(AiMode::Escape, 110);
    }

    match unit.aggression {
        0 => {
            odds.scale(AiMode::Escape, 140);
            odds.scale(AiMode::Combat, 70);
        }
        1 => odds.scale(AiMode::Ambush, 110),
        _ => {
            odds.scale(AiMode::Combat, 140);
            odds.scale(AiMode::Escape, 70);
        }
    }

    if unit.morale < 30 {
        odds.scale(AiMode::Escape, 150);
        odds.scale(AiMode::Combat, 70);
    }

    if situation.spotters > 0 {
        odds.scale(AiMode::Escape, (situation.spotters + 10) * 10);
        odds.scale(AiMode::Combat, (situation.spotters + 20) * 5);
    } else {
        odds.escape /= 2;
    }

    if situation.visible_hostiles > 0 {
        odds.scale(AiMode::Combat, (situation.visible_hostiles + 10) * 10);
        if situation.closest_hostile.is_some_and(|d| d < 5) {
            odds.ambush = 0;
        }
    }

    let difficulty = (100 + 10 * config.difficulty).max(10);
    odds.scale(AiMode::Combat, difficulty.unsigned_abs());

    if bf.mission == MissionKind::BaseDefense {
        odds.scale(AiMode::Escape, 75);
        odds.scale(AiMode::Ambush, 60);
    }

    if !situation.armed() {
        odds.combat = 0;
        odds.ambush = 0;
    }
    if record.charging {
        odds.escape = 0;
    }
    odds
}

/// Whether the unit may lob an explosive onto itself.
pub(crate) fn desperate(unit: &Unit) -> bool {
    unit.morale < 30 || unit.health * 3 < unit.max_health
}

/// Decide one action for an AI unit.
///
/// Units without a behaviour record get a fresh one. Fallen units pass.
/// The chosen action is never applied here; the only side effects are the
/// updated behaviour record and, for throws, danger marks on the blast
/// area.
///
/// # Errors
///
/// Returns [`TacticsError::UnknownUnit`] if the unit does not exist.
pub fn think<R: Rng + ?Sized>(
    bf: &mut Battlefield,
    unit_id: UnitId,
    rng: &mut R,
) -> Result<BattleAction> {
    let unit = bf.get_unit(unit_id)?;
    if !unit.is_active() {
        return Ok(BattleAction::think(unit_id, unit.position));
    }

    let mut record = unit.ai.clone().unwrap_or_default();
    scan(bf, unit, &mut record);

    let candidates = {
        let ctx = ThinkContext {
            bf: &*bf,
            unit,
            record: &record,
        };
        ModeCandidates {
            patrol: patrol::evaluate(&ctx, rng),
            combat: combat::evaluate(&ctx),
            ambush: ambush::evaluate(&ctx),
            escape: escape::evaluate(&ctx),
        }
    };

    let odds = mode_odds(bf, unit, &record);
    // An affordable attack on a hostile in view is taken unless the unit is
    // close to breaking.
    let attack_ready = !desperate(unit)
        && record.target.is_some_and(|id| unit.visible_units.contains(&id))
        && candidates
            .get(AiMode::Combat)
            .is_some_and(|action| action.kind.is_attack() && action.tu <= unit.tu);
    let drawn = if record.charging || attack_ready {
        AiMode::Combat
    } else if odds.total() == 0 {
        record.mode
    } else {
        odds.pick(rng.gen_range(0..odds.total()))
    };

    let chosen = drawn
        .fallback_chain()
        .into_iter()
        .find_map(|mode| candidates.get(mode).map(|action| (mode, action.clone())));
    let position = unit.position;
    let action = match chosen {
        Some((mode, action)) => {
            record.mode = mode;
            action
        }
        None => BattleAction::think(unit_id, position),
    };

    record.charging = record.mode == AiMode::Combat
        && action.kind == ActionKind::Walk
        && action
            .weapon
            .and_then(|i| unit.weapons.get(i))
            .is_some_and(|w| w.rule.kind == WeaponKind::Melee);
    if record.mode == AiMode::Patrol && action.kind == ActionKind::Walk {
        record.to_node = bf
            .waypoints
            .iter()
            .find(|(_, n)| n.position == action.target)
            .map(|(id, _)| id);
    }
    let blast = action
        .weapon
        .and_then(|i| unit.weapons.get(i))
        .map_or(0, |w| w.rule.blast_radius);

    debug!(
        "Unit {} odds {:?} drew {} -> {} {} at {} ({} TU)",
        unit_id,
        odds,
        drawn,
        record.mode,
        action.kind,
        action.target,
        action.tu
    );

    record.odds = odds;
    record.candidates = candidates;
    if action.kind == ActionKind::Throw && blast > 0 {
        bf.grid.mark_danger_zone(action.target, blast);
    }
    let unit = bf.unit_mut(unit_id).ok_or(TacticsError::UnknownUnit(unit_id))?;
    unit.ai = Some(record);
    Ok(action)
}

/// Run [`think`] for every standing AI unit of a faction, in id order.
///
/// # Errors
///
/// Propagates errors from [`think`].
pub fn think_all<R: Rng + ?Sized>(
    bf: &mut Battlefield,
    faction: crate::unit::Faction,
    rng: &mut R,
) -> Result<Vec<BattleAction>> {
    let ids: Vec<UnitId> = bf
        .units_of(faction)
        .filter(|u| u.ai.is_some())
        .map(|u| u.id)
        .collect();
    ids.into_iter().map(|id| think(bf, id, rng)).collect()
}
