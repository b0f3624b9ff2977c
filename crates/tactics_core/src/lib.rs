//! # Tactics Core
//!
//! Deterministic kernel of a turn-based squad tactics game played on a
//! voxel-subdivided 3D tile grid.
//!
//! The kernel answers three questions every time a unit acts:
//! - What can this unit see or hit? (visibility, targeting, blast)
//! - How can it get somewhere? (TU-costed pathfinding)
//! - What should a computer-controlled unit do next? (AI)
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO apart from loading configuration
//! - No hidden randomness: every random draw goes through an injected
//!   [`rand::Rng`]
//! - Integer and fixed-point arithmetic only
//!
//! ## Crate Structure
//!
//! - [`geometry`] - Positions, directions and fixed-point helpers
//! - [`data`] - Tile part, LOFT, damage and weapon rules
//! - [`grid`] - The tile grid and its structural queries
//! - [`battlefield`] - Grid, units and patrol graph together, with snapshots
//! - [`pathfinding`] - A* routes and reachability under TU budgets
//! - [`trace`], [`blockage`] - Voxel and tile traces
//! - [`targeting`], [`fov`], [`lighting`] - What units can see and hit
//! - [`explosion`] - Blast propagation and terrain destruction
//! - [`ai`] - Per-unit behaviour and action choice

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod action;
pub mod ai;
pub mod battlefield;
pub mod blockage;
pub mod config;
pub mod data;
pub mod error;
pub mod explosion;
pub mod fov;
pub mod geometry;
pub mod grid;
pub mod lighting;
pub mod pathfinding;
pub mod targeting;
pub mod tile;
pub mod trace;
pub mod unit;
pub mod waypoint;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::action::{ActionFailure, ActionKind, BattleAction};
    pub use crate::ai::{think, AiBehavior, AiMode};
    pub use crate::battlefield::{Battlefield, MissionKind};
    pub use crate::config::TacticsConfig;
    pub use crate::data::{
        DamageKind, LoftLibrary, Medium, PartLibrary, PartSlot, TilePart, WeaponKind, WeaponRule,
    };
    pub use crate::error::{Result, TacticsError};
    pub use crate::explosion::{explode, Explosion, ExplosionReport};
    pub use crate::fov::{calculate_all_fov, calculate_fov};
    pub use crate::geometry::{Direction, Fixed, Position};
    pub use crate::grid::TileGrid;
    pub use crate::lighting::calculate_lighting;
    pub use crate::pathfinding::{PathOptions, Pathfinding, Route};
    pub use crate::unit::{Faction, Unit, UnitId};
    pub use crate::waypoint::{Waypoint, WaypointGraph};
}
