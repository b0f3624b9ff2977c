//! Tuning knobs for the kernel.
//!
//! Every section carries its own defaults, so a RON file only needs to
//! list the values it overrides:
//!
//! ```ron
//! TacticsConfig(
//!     visibility: VisibilityConfig(max_view_distance: 18),
//!     ai: AiConfig(search_radius: 8),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TacticsError};

/// Movement cost constants and search tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfindingConfig {
    /// Step cost at or above which a move is impossible.
    pub impassable_cost: u32,
    /// Diagonal step multiplier, as a numerator over 2.
    ///
    /// The default of 3 makes a diagonal step cost 3/2 of the straight step.
    pub diagonal_numerator: u32,
    /// Cost of one Up/Down step when flying or riding a gravity lift.
    pub vertical_cost: u32,
    /// Extra cost for stepping through a closed door.
    pub door_cost: u32,
    /// Extra cost for entering a burning or danger-marked tile when hazards
    /// are avoided.
    pub hazard_penalty: u32,
    /// A* heuristic cost per tile of horizontal distance.
    ///
    /// Must not exceed the cheapest straight step or routes lose optimality.
    pub heuristic_scale: u32,
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self {
            impassable_cost: 255,
            diagonal_numerator: 3,
            vertical_cost: 8,
            door_cost: 4,
            hazard_penalty: 32,
            heuristic_scale: 4,
        }
    }
}

/// Sight and lighting parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Maximum sight distance in tiles.
    pub max_view_distance: i32,
    /// Sight distance into tiles darker than `darkness_threshold`.
    pub dark_view_distance: i32,
    /// Light level below which a tile counts as dark.
    pub darkness_threshold: u8,
    /// Brightest light level.
    pub max_light: u8,
    /// Light emitted by a burning tile.
    pub fire_light: u8,
    /// Ambient light level under open sky.
    pub sun_light: u8,
    /// Ambient light lost per covering floor above a tile.
    pub roof_shade: u8,
    /// Voxels below the top of a unit where its eyes sit.
    pub eye_offset: i32,
    /// Voxels below the top of a unit where it holds a weapon.
    pub muzzle_offset: i32,
    /// Summed smoke density along a sight line that blinds it.
    pub smoke_sight_limit: u32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            max_view_distance: 20,
            dark_view_distance: 9,
            darkness_threshold: 6,
            max_light: 15,
            fire_light: 15,
            sun_light: 15,
            roof_shade: 6,
            eye_offset: 2,
            muzzle_offset: 4,
            smoke_sight_limit: 20,
        }
    }
}

/// Blast propagation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplosionConfig {
    /// Power lost per tile stepped.
    pub falloff_per_tile: u32,
    /// Upper bound of the random extra loss on a diagonal step, in percent.
    pub diagonal_loss_percent: u32,
    /// Rays stop once power drops below this.
    pub min_power: u32,
    /// Blockage values are clamped to this before being subtracted.
    pub max_blockage: u32,
    /// Divisor turning remaining power into smoke density.
    pub smoke_divisor: u32,
    /// Smoke density cap.
    pub max_smoke: u8,
    /// Fire duration cap in turns.
    pub max_fire: u8,
}

impl Default for ExplosionConfig {
    fn default() -> Self {
        Self {
            falloff_per_tile: 10,
            diagonal_loss_percent: 10,
            min_power: 1,
            max_blockage: 255,
            smoke_divisor: 10,
            max_smoke: 15,
            max_fire: 12,
        }
    }
}

/// Base odds and search limits for the unit AI.
///
/// Odds are integer weights; modifiers are applied as percentages so a
/// decision replays identically everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Base weight of the patrol mode.
    pub patrol_odds: u32,
    /// Base weight of the ambush mode.
    pub ambush_odds: u32,
    /// Base weight of the combat mode.
    pub combat_odds: u32,
    /// Base weight of the escape mode.
    pub escape_odds: u32,
    /// Tile radius searched for ambush, escape and fire points.
    pub search_radius: i32,
    /// Turns a spotted hostile stays "exposed" to the AI.
    pub intelligence: u32,
    /// Added to grenade efficacy; higher throws more readily.
    pub difficulty: i32,
    /// Minimum psionic attack score before the AI tries one.
    pub psi_threshold: i32,
    /// Psionic score above which mind control is chosen over panic.
    pub mind_control_threshold: i32,
    /// Ranges (tiles) at which the AI prefers auto fire and aimed fire.
    pub auto_fire_range: i32,
    /// See `auto_fire_range`.
    pub aimed_fire_range: i32,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            patrol_odds: 30,
            ambush_odds: 13,
            combat_odds: 20,
            escape_odds: 13,
            search_radius: 10,
            intelligence: 2,
            difficulty: 0,
            psi_threshold: 25,
            mind_control_threshold: 85,
            auto_fire_range: 4,
            aimed_fire_range: 12,
        }
    }
}

/// Complete kernel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticsConfig {
    /// Movement costs.
    pub pathfinding: PathfindingConfig,
    /// Sight and light.
    pub visibility: VisibilityConfig,
    /// Blast propagation.
    pub explosion: ExplosionConfig,
    /// Unit AI.
    pub ai: AiConfig,
}

impl TacticsConfig {
    /// Parse a configuration from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        Ok(ron::from_str(ron)?)
    }

    /// Load a configuration from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| TacticsError::DataRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_ron_str(&contents)
    }
}
