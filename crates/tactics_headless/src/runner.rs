//! Headless session: a built scenario, a seeded generator and the
//! operations the command line exposes.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tactics_core::action::{ActionKind, BattleAction};
use tactics_core::ai::think;
use tactics_core::battlefield::Battlefield;
use tactics_core::data::{DamageKind, PartSlot};
use tactics_core::explosion::{explode, Explosion};
use tactics_core::fov::{calculate_all_fov, calculate_fov};
use tactics_core::geometry::Position;
use tactics_core::grid::TileGrid;
use tactics_core::pathfinding::{PathOptions, Pathfinding};
use tactics_core::unit::{Faction, UnitId, UnitStatus};
use tracing::{debug, info, warn};

use crate::protocol::{Effect, Record};
use crate::scenario::{Scenario, ScenarioError};

/// One running scenario.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    bf: Battlefield,
    rng: ChaCha8Rng,
    pathfinding: Pathfinding,
    round: u32,
}

impl Session {
    /// Build the scenario and seed the generator.
    pub fn new(scenario: &Scenario, seed: u64) -> Result<Self, ScenarioError> {
        let bf = scenario.build()?;
        info!("Session '{}' seeded with {}", scenario.name, seed);
        Ok(Self {
            name: scenario.name.clone(),
            bf,
            rng: ChaCha8Rng::seed_from_u64(seed),
            pathfinding: Pathfinding::new(),
            round: 0,
        })
    }

    /// The battlefield as it stands.
    pub fn battlefield(&self) -> &Battlefield {
        &self.bf
    }

    /// Rounds played so far.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Header record describing the scenario.
    pub fn header(&self) -> Record {
        Record::Scenario {
            name: self.name.clone(),
            width: self.bf.grid.width(),
            length: self.bf.grid.length(),
            height: self.bf.grid.height(),
            units: self.bf.units().len(),
        }
    }

    /// Id of the unit with the given name.
    pub fn unit_id(&self, name: &str) -> Result<UnitId, ScenarioError> {
        self.bf
            .units()
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.id)
            .ok_or_else(|| ScenarioError::UnknownUnit(name.to_string()))
    }

    /// Play one AI round for a faction: refresh sight, then let every AI
    /// unit think and carry out its decision in id order.
    pub fn play_round(&mut self, faction: Faction) -> Result<Vec<Record>, ScenarioError> {
        self.round += 1;
        self.bf.begin_turn(faction);
        calculate_all_fov(&mut self.bf)?;
        let ids: Vec<UnitId> = self
            .bf
            .units_of(faction)
            .filter(|u| u.ai.is_some())
            .map(|u| u.id)
            .collect();

        let mut records = Vec::with_capacity(ids.len() * 2);
        for id in ids {
            let action = think(&mut self.bf, id, &mut self.rng)?;
            let unit = self.bf.get_unit(id)?;
            let record = unit.ai.clone().unwrap_or_default();
            records.push(Record::Decision {
                round: self.round,
                unit: id,
                name: unit.name.clone(),
                mode: record.mode,
                action: action.clone(),
                odds: record.odds,
            });
            if action.is_think() {
                continue;
            }
            let effect = self.apply(&action)?;
            records.push(Record::Outcome {
                round: self.round,
                unit: id,
                effect,
            });
        }
        Ok(records)
    }

    /// Carry out a decided action. Walks follow the searched route as far
    /// as the unit's TU allow; throws detonate on the target tile. Other
    /// attacks only spend their TU.
    fn apply(&mut self, action: &BattleAction) -> Result<Effect, ScenarioError> {
        let unit = self.bf.get_unit(action.actor)?.clone();
        match action.kind {
            ActionKind::Walk => {
                let Some(route) = self
                    .pathfinding
                    .calculate_path(&self.bf, &unit, action.target, PathOptions::default())
                else {
                    return Ok(Effect::Held {
                        reason: "no path".to_string(),
                    });
                };
                let mut spent = 0;
                let mut at = unit.position;
                for step in &route.steps {
                    if spent + step.tu > unit.tu {
                        break;
                    }
                    // The route already paid for any door on the way.
                    if let Some((tile, slot)) = TileGrid::wall_edge(at, step.direction) {
                        self.bf.grid.open_door(tile, slot)?;
                    }
                    self.bf.grid.open_door(step.position, PartSlot::Object)?;
                    if let Err(err) = self.bf.move_unit(action.actor, step.position) {
                        debug!("Walk of unit {} stopped: {}", action.actor, err);
                        break;
                    }
                    spent += step.tu;
                    at = step.position;
                }
                self.spend(action, spent);
                if at == unit.position {
                    return Ok(Effect::Held {
                        reason: "not enough time units".to_string(),
                    });
                }
                Ok(Effect::Moved { to: at })
            }
            ActionKind::Throw => {
                let Some(rule) = action.weapon.and_then(|i| unit.weapons.get(i)).map(|w| w.rule.clone()) else {
                    warn!("Unit {} threw without a weapon", action.actor);
                    return Ok(Effect::Held {
                        reason: "no weapon".to_string(),
                    });
                };
                self.spend(action, action.tu);
                let blast = Explosion::at_tile(action.target, rule.damage, rule.damage_kind, rule.blast_radius)
                    .from_unit(action.actor);
                let report = explode(&mut self.bf, &blast, &mut self.rng)?;
                Ok(Effect::Detonated {
                    at: action.target,
                    destroyed: report.destroyed.len(),
                    casualties: report.casualties.iter().map(|c| c.unit).collect(),
                })
            }
            _ => {
                self.spend(action, action.tu);
                Ok(Effect::Unresolved)
            }
        }
    }

    fn spend(&mut self, action: &BattleAction, tu: u32) {
        if let Some(unit) = self.bf.unit_mut(action.actor) {
            unit.tu = unit.tu.saturating_sub(tu);
            if let Some(facing) = action.final_facing {
                unit.facing = facing;
            }
        }
    }

    /// Cheapest route for a named unit.
    pub fn path(&mut self, unit: &str, goal: Position) -> Result<Record, ScenarioError> {
        let id = self.unit_id(unit)?;
        let walker = self.bf.get_unit(id)?;
        let route = self
            .pathfinding
            .calculate_path(&self.bf, walker, goal, PathOptions::default());
        Ok(Record::Path { unit: id, goal, route })
    }

    /// Tiles a named unit can reach with `budget` TU, or its current TU.
    pub fn reachable(&mut self, unit: &str, budget: Option<u32>) -> Result<Record, ScenarioError> {
        let id = self.unit_id(unit)?;
        let walker = self.bf.get_unit(id)?;
        let budget = budget.unwrap_or(walker.tu);
        let indices = self
            .pathfinding
            .find_reachable(&self.bf, walker, budget, PathOptions::default());
        let tiles = indices
            .into_iter()
            .filter_map(|i| {
                self.pathfinding
                    .cost_to(i)
                    .map(|cost| (self.bf.grid.position_of(i), cost))
            })
            .collect();
        Ok(Record::Reachable { unit: id, budget, tiles })
    }

    /// Detonate a blast centred on a tile.
    pub fn blast(&mut self, at: Position, power: u32, radius: i32, kind: DamageKind) -> Result<Record, ScenarioError> {
        let blast = Explosion::at_tile(at, power, kind, radius);
        let report = explode(&mut self.bf, &blast, &mut self.rng)?;
        Ok(Record::Blast {
            center: at,
            power,
            radius,
            kind,
            report,
        })
    }

    /// Field of view of a named unit.
    pub fn fov(&mut self, unit: &str) -> Result<Record, ScenarioError> {
        let id = self.unit_id(unit)?;
        let report = calculate_fov(&mut self.bf, id)?;
        Ok(Record::Fov {
            name: unit.to_string(),
            report,
        })
    }

    /// Units that are dead or unconscious.
    pub fn fallen(&self) -> u32 {
        self.bf
            .units()
            .iter()
            .filter(|u| u.status != UnitStatus::Standing)
            .count() as u32
    }

    /// Hash of the battlefield snapshot.
    pub fn state_hash(&self) -> Result<u64, ScenarioError> {
        let bytes = self.bf.snapshot_bytes()?;
        let mut hasher = DefaultHasher::new();
        bytes.hash(&mut hasher);
        Ok(hasher.finish())
    }
}
