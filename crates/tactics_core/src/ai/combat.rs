//! Combat mode: pick an attack on the current target.
//!
//! Options are tried from the most to the least decisive: psionics, a
//! guided missile, a grenade, a gun, a melee strike or charge. When none
//! is possible from where the unit stands it looks for a nearby tile with
//! a clear shot.

use crate::action::{ActionKind, BattleAction};
use crate::data::{FireMode, WeaponKind, WeaponRule};
use crate::geometry::Position;
use crate::pathfinding::{PathOptions, Pathfinding, Route};
use crate::targeting::{line_of_fire, validate_throw};
use crate::unit::Unit;

use super::{desperate, ThinkContext};

pub(super) fn evaluate(ctx: &ThinkContext<'_>) -> Option<BattleAction> {
    let target = ctx.target()?;
    psionic(ctx, target)
        .or_else(|| guided(ctx, target))
        .or_else(|| grenade(ctx, target))
        .or_else(|| firearm(ctx, target))
        .or_else(|| melee(ctx, target))
        .or_else(|| fire_point(ctx, target))
}

/// Weapon of a kind together with the TU its single attack costs.
fn weapon_of(unit: &Unit, kind: WeaponKind) -> Option<(usize, &WeaponRule, u32)> {
    let index = unit.weapon_index(|w| w.kind == kind)?;
    let rule = &unit.weapons[index].rule;
    let tu = rule.attack_tu.resolve(unit.max_tu);
    Some((index, rule, tu))
}

fn psionic(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    if !ctx.record.situation.has_psi || !ctx.sees(target) {
        return None;
    }
    let (index, _, tu) = weapon_of(unit, WeaponKind::PsiAmp)?;
    if tu > unit.tu {
        return None;
    }
    let contest = unit.psi_skill + target.psi_strength;
    if contest == 0 {
        return None;
    }
    let score = i32::try_from(unit.psi_skill * 100 / contest).ok()?;
    let kind = if score >= ctx.config().mind_control_threshold {
        ActionKind::MindControl
    } else if score >= ctx.config().psi_threshold {
        ActionKind::Panic
    } else {
        return None;
    };
    Some(BattleAction::new(unit.id, kind, target.position, tu).with_weapon(index))
}

/// Tiles where a route turns, ending with its destination.
fn turning_points(route: &Route) -> Vec<Position> {
    let mut points: Vec<Position> = route
        .steps
        .windows(2)
        .filter(|pair| pair[0].direction != pair[1].direction)
        .map(|pair| pair[0].position)
        .collect();
    points.extend(route.steps.last().map(|s| s.position));
    points
}

fn guided(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    let (index, rule, tu) = weapon_of(unit, WeaponKind::GuidedLauncher)?;
    if tu > unit.tu || rule.max_waypoints == 0 {
        return None;
    }
    let route = Pathfinding::new().calculate_path(ctx.bf, unit, target.position, PathOptions::missile())?;
    let waypoints = turning_points(&route);
    if waypoints.is_empty() || waypoints.len() > rule.max_waypoints {
        return None;
    }
    let mut action = BattleAction::new(unit.id, ActionKind::Launch, target.position, tu).with_weapon(index);
    action.waypoints = waypoints;
    Some(action)
}

fn grenade(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    let (index, rule, tu) = weapon_of(unit, WeaponKind::Grenade)?;
    if tu > unit.tu {
        return None;
    }
    let tile = target.position;
    let radius = rule.blast_radius.max(1);
    let in_blast = |u: &Unit| u.position.z == tile.z && u.position.distance(tile) <= radius;

    if in_blast(unit) && !desperate(unit) {
        return None;
    }
    let enemies = ctx.bf.hostiles_of(unit).filter(|&u| in_blast(u)).count() as i32;
    let friendlies = ctx.bf.units_of(unit.faction).filter(|&u| in_blast(u)).count() as i32;
    let efficacy = enemies - 2 * friendlies + ctx.config().difficulty;
    let worth_it = efficacy >= 2 || (efficacy >= 1 && !ctx.record.situation.has_ranged);
    if !worth_it || !validate_throw(ctx.bf, unit, tile, rule.max_range) {
        return None;
    }
    Some(BattleAction::new(unit.id, ActionKind::Throw, tile, tu).with_weapon(index))
}

/// Fire modes in order of preference at a given range.
fn fire_modes(rule: &WeaponRule, distance: i32, auto_range: i32, aimed_range: i32) -> Vec<(ActionKind, FireMode)> {
    let snap = rule.snap.map(|m| (ActionKind::SnapShot, m));
    let auto = rule.auto.map(|m| (ActionKind::AutoShot, m));
    let aimed = rule.aimed.map(|m| (ActionKind::AimedShot, m));
    let preferred = if distance < auto_range {
        auto
    } else if distance > aimed_range {
        aimed
    } else {
        snap
    };
    [preferred, snap, aimed, auto].into_iter().flatten().collect()
}

fn firearm(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    if !ctx.sees(target) {
        return None;
    }
    let index = unit.weapon_index(|w| w.kind == WeaponKind::Firearm)?;
    let rule = &unit.weapons[index].rule;
    let distance = unit.position.distance(target.position);
    if distance > rule.max_range || !line_of_fire(ctx.bf, unit, target.position) {
        return None;
    }
    let config = ctx.config();
    fire_modes(rule, distance, config.auto_fire_range, config.aimed_fire_range)
        .into_iter()
        .map(|(kind, mode)| (kind, mode.tu.resolve(unit.max_tu)))
        .find(|&(_, tu)| tu <= unit.tu)
        .map(|(kind, tu)| BattleAction::new(unit.id, kind, target.position, tu).with_weapon(index))
}

/// Whether footprints at `origin` (for `unit`) and of `target` touch.
fn adjacent(unit: &Unit, origin: Position, target: &Unit) -> bool {
    unit.footprint_at(origin).any(|a| {
        target
            .footprint()
            .any(|b| a.z == b.z && (a.x - b.x).abs() <= 1 && (a.y - b.y).abs() <= 1)
    })
}

fn melee(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    let (index, _, tu) = weapon_of(unit, WeaponKind::Melee)?;
    if adjacent(unit, unit.position, target) {
        return (tu <= unit.tu)
            .then(|| BattleAction::new(unit.id, ActionKind::Melee, target.position, tu).with_weapon(index));
    }
    // Charge: the cheapest tile next to the target.
    ctx.reachable(PathOptions::default())
        .into_iter()
        .find(|r| r.position != unit.position && adjacent(unit, r.position, target))
        .map(|r| BattleAction::new(unit.id, ActionKind::Walk, r.position, r.cost).with_weapon(index))
}

fn fire_point(ctx: &ThinkContext<'_>, target: &Unit) -> Option<BattleAction> {
    let unit = ctx.unit;
    let index = unit.weapon_index(|w| w.kind == WeaponKind::Firearm)?;
    let rule = &unit.weapons[index].rule;
    let cheapest_shot = [rule.snap, rule.aimed, rule.auto]
        .into_iter()
        .flatten()
        .map(|m| m.tu.resolve(unit.max_tu))
        .min()?;

    let mut shooter = unit.clone();
    ctx.reachable(PathOptions::default())
        .into_iter()
        .filter(|r| r.position != unit.position && r.cost + cheapest_shot <= unit.tu)
        .filter(|r| r.position.distance(target.position) <= rule.max_range)
        .find(|r| {
            shooter.position = r.position;
            line_of_fire(ctx.bf, &shooter, target.position)
        })
        .map(|r| BattleAction::new(unit.id, ActionKind::Walk, r.position, r.cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::AiBehavior;
    use crate::battlefield::Battlefield;
    use crate::config::TacticsConfig;
    use crate::data::{DamageKind, LoftLibrary, PartLibrary, PartSlot, TilePart, TuCost};
    use crate::geometry::Direction;
    use crate::grid::TileGrid;
    use crate::pathfinding::PathStep;
    use crate::unit::Faction;

    fn field() -> Battlefield {
        let grid = TileGrid::new(20, 20, 1, PartLibrary::new(), LoftLibrary::stock()).unwrap();
        Battlefield::new(grid, TacticsConfig::default())
    }

    fn context<'a>(bf: &'a Battlefield, unit: &'a Unit, record: &'a AiBehavior) -> ThinkContext<'a> {
        ThinkContext { bf, unit, record }
    }

    #[test]
    fn test_fire_mode_preference() {
        let rule = WeaponRule::firearm("rifle", 30)
            .with_snap(FireMode::flat(10, 60))
            .with_auto(FireMode::flat(15, 35))
            .with_aimed(FireMode::flat(20, 110));
        let kinds = |d| -> Vec<ActionKind> { fire_modes(&rule, d, 4, 12).into_iter().map(|(k, _)| k).collect() };
        assert_eq!(kinds(2)[0], ActionKind::AutoShot);
        assert_eq!(kinds(8)[0], ActionKind::SnapShot);
        assert_eq!(kinds(15)[0], ActionKind::AimedShot);
        assert_eq!(kinds(15)[1], ActionKind::SnapShot);
    }

    #[test]
    fn test_turning_points() {
        let step = |direction, x, y| PathStep {
            direction,
            position: Position::new(x, y, 0),
            tu: 4,
        };
        let route = Route {
            start: Position::ZERO,
            steps: vec![
                step(Direction::East, 1, 0),
                step(Direction::East, 2, 0),
                step(Direction::South, 2, 1),
                step(Direction::South, 2, 2),
            ],
            tu_cost: 16,
        };
        assert_eq!(turning_points(&route), vec![Position::new(2, 0, 0), Position::new(2, 2, 0)]);
    }

    #[test]
    fn test_psionic_picks_by_score() {
        let mut bf = field();
        let mut psion = Unit::new("psion", Faction::Hostile, Position::new(2, 2, 0))
            .with_weapon(WeaponRule::special("amp", WeaponKind::PsiAmp, 0, TuCost::Percent(25)));
        psion.psi_skill = 90;
        let id = bf.add_unit(psion).unwrap();
        let mut weak = Unit::new("weak", Faction::Player, Position::new(9, 2, 0));
        weak.psi_strength = 10;
        let weak = bf.add_unit(weak).unwrap();
        let strong = bf.add_unit(Unit::new("strong", Faction::Player, Position::new(9, 9, 0))).unwrap();
        bf.unit_mut(id).unwrap().visible_units = vec![weak, strong];

        let unit = bf.unit(id).unwrap().clone();
        let mut record = AiBehavior::default();
        record.situation.has_psi = true;
        record.target = Some(weak);
        let action = psionic(&context(&bf, &unit, &record), bf.unit(weak).unwrap()).unwrap();
        assert_eq!(action.kind, ActionKind::MindControl);
        assert_eq!(action.tu, 15);

        // 90 * 100 / 120 = 75: panic only.
        let action = psionic(&context(&bf, &unit, &record), bf.unit(strong).unwrap()).unwrap();
        assert_eq!(action.kind, ActionKind::Panic);
    }

    #[test]
    fn test_grenade_needs_a_crowd_and_spares_friends() {
        let mut bf = field();
        let frag = WeaponRule::special("frag", WeaponKind::Grenade, 50, TuCost::Flat(20))
            .with_blast(2, DamageKind::HighExplosive);
        let rifle = WeaponRule::firearm("rifle", 30).with_snap(FireMode::flat(10, 60));
        let id = bf
            .add_unit(
                Unit::new("alien", Faction::Hostile, Position::new(2, 2, 0))
                    .with_weapon(frag)
                    .with_weapon(rifle),
            )
            .unwrap();
        let a = bf.add_unit(Unit::new("a", Faction::Player, Position::new(8, 2, 0))).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let mut record = AiBehavior::default();
        record.situation.has_ranged = true;
        record.target = Some(a);

        // One enemy is not worth a grenade when a gun is at hand.
        assert!(grenade(&context(&bf, &unit, &record), bf.unit(a).unwrap()).is_none());

        bf.add_unit(Unit::new("b", Faction::Player, Position::new(9, 2, 0))).unwrap();
        let action = grenade(&context(&bf, &unit, &record), bf.unit(a).unwrap()).unwrap();
        assert_eq!(action.kind, ActionKind::Throw);
        assert_eq!(action.weapon, Some(0));

        bf.add_unit(Unit::new("buddy", Faction::Hostile, Position::new(8, 3, 0))).unwrap();
        assert!(grenade(&context(&bf, &unit, &record), bf.unit(a).unwrap()).is_none());
    }

    #[test]
    fn test_melee_strike_or_charge() {
        let mut bf = field();
        let claws = WeaponRule::special("claws", WeaponKind::Melee, 40, TuCost::Flat(10));
        let id = bf
            .add_unit(Unit::new("beast", Faction::Hostile, Position::new(2, 2, 0)).with_weapon(claws))
            .unwrap();
        let prey = bf.add_unit(Unit::new("prey", Faction::Player, Position::new(6, 2, 0))).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let mut record = AiBehavior::default();
        record.target = Some(prey);

        let action = evaluate(&context(&bf, &unit, &record)).unwrap();
        assert_eq!(action.kind, ActionKind::Walk);
        assert_eq!(action.weapon, Some(0));
        assert_eq!(action.target.distance(Position::new(6, 2, 0)), 1);

        bf.move_unit(id, Position::new(5, 3, 0)).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let action = evaluate(&context(&bf, &unit, &record)).unwrap();
        assert_eq!(action.kind, ActionKind::Melee);
        assert_eq!(action.target, Position::new(6, 2, 0));
    }

    #[test]
    fn test_fire_point_steps_around_wall() {
        let mut lib = PartLibrary::new();
        let wall = lib.add(TilePart::wall("wall", PartSlot::WestWall));
        let mut grid = TileGrid::new(20, 20, 1, lib, LoftLibrary::stock()).unwrap();
        // Wall between x=4 and x=5 on rows 0..=4 only.
        for y in 0..=4 {
            grid.set_part(Position::new(5, y, 0), PartSlot::WestWall, Some(wall)).unwrap();
        }
        let mut bf = Battlefield::new(grid, TacticsConfig::default());
        let rifle = WeaponRule::firearm("rifle", 30).with_snap(FireMode::flat(10, 60));
        let id = bf
            .add_unit(Unit::new("alien", Faction::Hostile, Position::new(4, 2, 0)).with_weapon(rifle))
            .unwrap();
        let target = bf.add_unit(Unit::new("soldier", Faction::Player, Position::new(8, 2, 0))).unwrap();
        let unit = bf.unit(id).unwrap().clone();
        let mut record = AiBehavior::default();
        record.target = Some(target);
        let ctx = context(&bf, &unit, &record);

        assert!(firearm(&ctx, bf.unit(target).unwrap()).is_none());
        let action = evaluate(&ctx).unwrap();
        assert_eq!(action.kind, ActionKind::Walk);
        assert!(action.tu + 10 <= unit.tu);
        let mut moved = unit.clone();
        moved.position = action.target;
        assert!(line_of_fire(&bf, &moved, Position::new(8, 2, 0)));
    }

    #[test]
    fn test_no_target_no_combat() {
        let bf = field();
        let unit = Unit::new("alien", Faction::Hostile, Position::ZERO)
            .with_weapon(WeaponRule::firearm("rifle", 30).with_snap(FireMode::flat(10, 60)));
        let record = AiBehavior::default();
        assert!(evaluate(&context(&bf, &unit, &record)).is_none());
    }
}
