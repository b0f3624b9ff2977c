//! JSON-lines output of the headless runner.
//!
//! Every record is one JSON object on its own line, tagged by `type`:
//!
//! ```text
//! {"type":"scenario","name":"breach","width":20,"length":20,"height":1,"units":5}
//! {"type":"decision","round":1,"unit":2,"name":"guard","mode":"Combat","action":{...},"odds":{...}}
//! {"type":"outcome","round":1,"unit":2,"effect":{"kind":"moved","to":{"x":7,"y":9,"z":0}}}
//! {"type":"path","unit":0,"goal":{...},"route":{...}}
//! {"type":"blast","center":{...},"power":80,"radius":4,"report":{...}}
//! ```
//!
//! Human-readable logs go to stderr.

use serde::{Deserialize, Serialize};
use tactics_core::action::BattleAction;
use tactics_core::ai::{AiMode, ModeOdds};
use tactics_core::data::DamageKind;
use tactics_core::explosion::ExplosionReport;
use tactics_core::fov::FovReport;
use tactics_core::geometry::Position;
use tactics_core::pathfinding::Route;
use tactics_core::unit::UnitId;

/// Records written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// Emitted once after the scenario is built.
    Scenario {
        name: String,
        width: i32,
        length: i32,
        height: i32,
        units: usize,
    },

    /// What an AI unit decided.
    Decision {
        round: u32,
        unit: UnitId,
        name: String,
        mode: AiMode,
        action: BattleAction,
        odds: ModeOdds,
    },

    /// What carrying out a decision did to the battlefield.
    Outcome { round: u32, unit: UnitId, effect: Effect },

    /// Route search result; `route` is null when the goal cannot be reached.
    Path {
        unit: UnitId,
        goal: Position,
        route: Option<Route>,
    },

    /// Tiles reachable within a TU budget, with their cost.
    Reachable {
        unit: UnitId,
        budget: u32,
        tiles: Vec<(Position, u32)>,
    },

    /// Result of a detonation.
    Blast {
        center: Position,
        power: u32,
        radius: i32,
        kind: DamageKind,
        report: ExplosionReport,
    },

    /// Field of view of one unit.
    Fov { name: String, report: FovReport },

    /// One run of a seed sweep.
    Run(RunSummary),

    /// Totals over a seed sweep.
    Batch(BatchSummary),

    /// A request that could not be served.
    Error { message: String },
}

/// Effect of one applied action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    /// Unit moved to a tile.
    Moved { to: Position },
    /// A thrown charge went off.
    Detonated {
        at: Position,
        destroyed: usize,
        casualties: Vec<UnitId>,
    },
    /// Shots, strikes and psionics are reported but not resolved.
    Unresolved,
    /// Nothing happened; the reason says why.
    Held { reason: String },
}

/// Outcome of one seeded run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Seed of the run.
    pub seed: u64,
    /// Hash of the final battlefield snapshot.
    pub hash: u64,
    /// Actions decided, by kind name.
    pub actions: Vec<(String, u32)>,
    /// Units that ended the run dead or unconscious.
    pub fallen: u32,
}

/// Totals over every run in a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Runs completed.
    pub runs: u32,
    /// Runs that failed.
    pub failed: u32,
    /// Distinct final hashes.
    pub distinct_outcomes: usize,
    /// Actions decided across all runs, by kind name.
    pub actions: Vec<(String, u32)>,
    /// Average fallen units per run.
    pub mean_fallen: f64,
}

impl Record {
    /// Serialize as a single JSON line.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"serialization failed: {e}"}}"#)
        })
    }

    /// Parse a JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}
