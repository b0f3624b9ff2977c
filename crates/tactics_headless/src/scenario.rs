//! Scenario loading and battlefield construction.
//!
//! Scenarios are RON files describing a grid, the parts laid on it, the
//! units standing in it and the patrol graph the AI walks. Parts are
//! declared once and then placed by name over boxes of tiles.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tactics_core::battlefield::{Battlefield, MissionKind};
use tactics_core::config::TacticsConfig;
use tactics_core::data::{
    DamageKind, DoorKind, FireMode, LoftLibrary, MoveCosts, PartLibrary, PartSlot, TilePart, TuCost,
    WeaponKind, WeaponRule,
};
use tactics_core::error::TacticsError;
use tactics_core::geometry::Position;
use tactics_core::grid::TileGrid;
use tactics_core::lighting::calculate_lighting;
use tactics_core::unit::{Faction, MovementType, Unit};
use tactics_core::waypoint::Waypoint;
use thiserror::Error;
use tracing::{debug, info};

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// A placement names a part that was never declared.
    #[error("Unknown part '{0}'")]
    UnknownPart(String),
    /// A command names a unit the scenario does not contain.
    #[error("Unknown unit '{0}'")]
    UnknownUnit(String),
    /// A waypoint link points past the end of the node list.
    #[error("Waypoint {from} links to missing node {to}")]
    BadLink {
        /// Node holding the link.
        from: usize,
        /// Missing target.
        to: usize,
    },
    /// The kernel rejected part of the layout.
    #[error("Kernel error: {0}")]
    Kernel(#[from] TacticsError),
}

/// Tile coordinates written as `(x, y, z)`.
pub type Coords = (i32, i32, i32);

fn position((x, y, z): Coords) -> Position {
    Position::new(x, y, z)
}

/// A part declaration. The shorthand variants use the stock rules for their
/// kind of part; `Custom` takes a full rule record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartSpec {
    /// Walkable floor.
    Floor(String),
    /// Solid wall.
    Wall {
        /// Part name.
        name: String,
        /// `WestWall` or `NorthWall`.
        slot: PartSlot,
    },
    /// Door; hinged doors get an open variant named `"<name> (open)"`.
    Door {
        /// Part name.
        name: String,
        /// `WestWall` or `NorthWall`.
        slot: PartSlot,
        /// Hinged or sliding.
        kind: DoorKind,
    },
    /// Wall that can be seen through but not walked or shot through.
    Window {
        /// Part name.
        name: String,
        /// `WestWall` or `NorthWall`.
        slot: PartSlot,
    },
    /// Impassable object filling `bands` LOFT bands.
    Object {
        /// Part name.
        name: String,
        /// Height in bands.
        bands: usize,
    },
    /// Object that explodes and burns when destroyed.
    Barrel {
        /// Part name.
        name: String,
        /// Power of the secondary blast.
        power: u32,
        /// Turns the wreck burns.
        fuel: u8,
    },
    /// Full rule record.
    Custom(TilePart),
}

impl PartSpec {
    fn name(&self) -> &str {
        match self {
            Self::Floor(name) => name,
            Self::Wall { name, .. }
            | Self::Door { name, .. }
            | Self::Window { name, .. }
            | Self::Object { name, .. }
            | Self::Barrel { name, .. } => name,
            Self::Custom(part) => &part.name,
        }
    }

    /// Add the part, and any variant it needs, to a library.
    fn register(&self, lib: &mut PartLibrary) {
        match self {
            Self::Floor(name) => {
                lib.add(TilePart::floor(name));
            }
            Self::Wall { name, slot } => {
                lib.add(TilePart::wall(name, *slot));
            }
            Self::Door { name, slot, kind } => {
                let mut door = TilePart::door(name, *slot, *kind);
                if *kind == DoorKind::Hinged {
                    let open = lib.add(
                        TilePart::wall(&format!("{name} (open)"), *slot)
                            .with_tu(MoveCosts::FREE)
                            .with_stop_los(false)
                            .with_loft(LoftLibrary::EMPTY),
                    );
                    door = door.with_open_variant(open);
                }
                lib.add(door);
            }
            Self::Window { name, slot } => {
                lib.add(TilePart::wall(name, *slot).with_stop_los(false));
            }
            Self::Object { name, bands } => {
                lib.add(TilePart::object(name, *bands));
            }
            Self::Barrel { name, power, fuel } => {
                lib.add(
                    TilePart::object(name, 4)
                        .with_armor(10)
                        .with_explosive(*power, DamageKind::HighExplosive)
                        .with_fuel(*fuel, 50),
                );
            }
            Self::Custom(part) => {
                lib.add(part.clone());
            }
        }
    }
}

/// A declared part laid over the box between two corners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// Name of a declared part.
    pub part: String,
    /// First corner.
    pub from: Coords,
    /// Opposite corner; defaults to `from`.
    #[serde(default)]
    pub to: Option<Coords>,
}

impl Placement {
    /// Place a part on a single tile.
    pub fn tile(part: &str, at: Coords) -> Self {
        Self {
            part: part.to_string(),
            from: at,
            to: None,
        }
    }

    /// Place a part over a box.
    pub fn area(part: &str, from: Coords, to: Coords) -> Self {
        Self {
            part: part.to_string(),
            from,
            to: Some(to),
        }
    }
}

/// One unit to place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSetup {
    /// Name used on the command line.
    pub name: String,
    /// Side.
    pub faction: Faction,
    /// North-west corner of the footprint.
    pub position: Coords,
    /// Carried weapons, first one preferred.
    #[serde(default)]
    pub weapons: Vec<WeaponRule>,
    /// Controlled by the AI.
    #[serde(default)]
    pub ai: bool,
    /// TU per turn; defaults to the kernel's 60.
    #[serde(default)]
    pub tu: Option<u32>,
    /// Hit points; defaults to the kernel's 40.
    #[serde(default)]
    pub health: Option<u32>,
    /// Locomotion.
    #[serde(default)]
    pub movement: MovementType,
    /// 2×2 footprint.
    #[serde(default)]
    pub large: bool,
    /// Aggression 0..=3.
    #[serde(default)]
    pub aggression: Option<u32>,
    /// Psionic skill; 0 for none.
    #[serde(default)]
    pub psi_skill: u32,
}

impl UnitSetup {
    /// A unit with kernel defaults.
    pub fn new(name: &str, faction: Faction, position: Coords) -> Self {
        Self {
            name: name.to_string(),
            faction,
            position,
            weapons: Vec::new(),
            ai: false,
            tu: None,
            health: None,
            movement: MovementType::Walk,
            large: false,
            aggression: None,
            psi_skill: 0,
        }
    }

    fn to_unit(&self) -> Unit {
        let mut unit = Unit::new(&self.name, self.faction, position(self.position)).with_movement(self.movement);
        for rule in &self.weapons {
            unit = unit.with_weapon(rule.clone());
        }
        if self.ai {
            unit = unit.with_ai();
        }
        if let Some(tu) = self.tu {
            unit = unit.with_tu(tu);
        }
        if self.large {
            unit = unit.large();
        }
        if let Some(health) = self.health {
            unit.health = health;
            unit.max_health = health;
        }
        if let Some(aggression) = self.aggression {
            unit.aggression = aggression;
        }
        unit.psi_skill = self.psi_skill;
        unit
    }
}

/// One patrol node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaypointSetup {
    /// Tile of the node.
    pub position: Coords,
    /// Indices of linked nodes; links are made both ways.
    #[serde(default)]
    pub links: Vec<usize>,
    /// Only scouts may pick the node.
    #[serde(default)]
    pub scout_only: bool,
    /// Preference weight.
    #[serde(default)]
    pub priority: u32,
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Grid dimensions (width, length, height) in tiles.
    pub size: Coords,
    /// Declared parts.
    pub parts: Vec<PartSpec>,
    /// Part placements, applied in order.
    #[serde(default)]
    pub placements: Vec<Placement>,
    /// Units, in id order.
    #[serde(default)]
    pub units: Vec<UnitSetup>,
    /// Patrol graph.
    #[serde(default)]
    pub waypoints: Vec<WaypointSetup>,
    /// Kernel tuning; defaults when absent.
    #[serde(default)]
    pub config: Option<TacticsConfig>,
    /// Mission kind.
    #[serde(default)]
    pub mission: MissionKind,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::breach()
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let scenario: Scenario = ron::from_str(&contents)?;
        Ok(scenario)
    }

    /// Parse a scenario from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        Ok(ron::from_str(ron)?)
    }

    /// A built-in scenario by name, or a scenario file by path.
    pub fn resolve(name_or_path: &str) -> Result<Self, ScenarioError> {
        match name_or_path {
            "breach" => Ok(Self::breach()),
            "patrol" => Ok(Self::patrol()),
            path => Self::load(path),
        }
    }

    /// A 20×20 field with a walled room. Two soldiers stand outside the
    /// west door, three hostiles hold the room and its surroundings.
    pub fn breach() -> Self {
        let mut placements = vec![Placement::area("floor", (0, 0, 0), (19, 19, 0))];
        for i in 6..=13 {
            let west = if i == 9 { "door" } else { "west wall" };
            let north = if i == 9 { "window" } else { "north wall" };
            placements.push(Placement::tile(west, (6, i, 0)));
            placements.push(Placement::tile("west wall", (14, i, 0)));
            placements.push(Placement::tile(north, (i, 6, 0)));
            placements.push(Placement::tile("north wall", (i, 14, 0)));
        }
        placements.push(Placement::tile("barrel", (11, 11, 0)));
        placements.push(Placement::area("crate", (3, 14, 0), (4, 14, 0)));

        let mut rookie = UnitSetup::new("rookie", Faction::Player, (2, 9, 0));
        rookie.weapons = vec![rifle(), frag_grenade()];
        let mut veteran = UnitSetup::new("veteran", Faction::Player, (3, 16, 0));
        veteran.weapons = vec![rifle()];
        let mut guard = UnitSetup::new("guard", Faction::Hostile, (9, 9, 0));
        guard.weapons = vec![rifle(), frag_grenade()];
        guard.ai = true;
        let mut lurker = UnitSetup::new("lurker", Faction::Hostile, (12, 12, 0));
        lurker.weapons = vec![claw()];
        lurker.ai = true;
        lurker.aggression = Some(3);
        let mut sentry = UnitSetup::new("sentry", Faction::Hostile, (16, 3, 0));
        sentry.weapons = vec![rifle()];
        sentry.ai = true;

        Self {
            name: "breach".to_string(),
            description: "Clear a walled room through its only door".to_string(),
            size: (20, 20, 1),
            parts: stock_specs(),
            placements,
            units: vec![rookie, veteran, guard, lurker, sentry],
            waypoints: vec![
                WaypointSetup {
                    position: (16, 3, 0),
                    links: vec![1],
                    scout_only: false,
                    priority: 0,
                },
                WaypointSetup {
                    position: (16, 16, 0),
                    links: vec![2],
                    scout_only: false,
                    priority: 0,
                },
                WaypointSetup {
                    position: (3, 3, 0),
                    links: vec![0],
                    scout_only: false,
                    priority: 0,
                },
            ],
            config: None,
            mission: MissionKind::Standard,
        }
    }

    /// Open ground with a four-node loop and two unarmed drones walking it.
    pub fn patrol() -> Self {
        let corners = [(4, 4, 0), (11, 4, 0), (11, 11, 0), (4, 11, 0)];
        let waypoints = corners
            .iter()
            .enumerate()
            .map(|(i, &position)| WaypointSetup {
                position,
                links: vec![(i + 1) % corners.len()],
                scout_only: false,
                priority: 0,
            })
            .collect();
        let mut units = Vec::new();
        for (name, at) in [("drone-1", (1, 1, 0)), ("drone-2", (14, 14, 0))] {
            let mut drone = UnitSetup::new(name, Faction::Hostile, at);
            drone.ai = true;
            units.push(drone);
        }

        Self {
            name: "patrol".to_string(),
            description: "Unarmed drones walking a square beat".to_string(),
            size: (16, 16, 1),
            parts: vec![PartSpec::Floor("floor".to_string())],
            placements: vec![Placement::area("floor", (0, 0, 0), (15, 15, 0))],
            units,
            waypoints,
            config: None,
            mission: MissionKind::Standard,
        }
    }

    /// Build the battlefield the scenario describes, lit and with every
    /// unit placed in declaration order.
    pub fn build(&self) -> Result<Battlefield, ScenarioError> {
        let mut lib = PartLibrary::new();
        for spec in &self.parts {
            spec.register(&mut lib);
        }
        let (width, length, height) = self.size;
        let mut grid = TileGrid::new(width, length, height, lib, LoftLibrary::stock())?;
        for placement in &self.placements {
            let id = grid
                .parts()
                .find(&placement.part)
                .ok_or_else(|| ScenarioError::UnknownPart(placement.part.clone()))?;
            let from = position(placement.from);
            let to = position(placement.to.unwrap_or(placement.from));
            grid.fill(from, to, id)?;
        }

        let mut bf = Battlefield::new(grid, self.config.clone().unwrap_or_default());
        bf.mission = self.mission;

        for setup in &self.units {
            let id = bf.add_unit(setup.to_unit())?;
            debug!("Placed '{}' as unit {}", setup.name, id);
        }

        let ids: Vec<usize> = self
            .waypoints
            .iter()
            .map(|w| {
                let mut node = Waypoint::new(position(w.position));
                node.scout_only = w.scout_only;
                node.priority = w.priority;
                bf.waypoints.add(node)
            })
            .collect();
        for (from, w) in self.waypoints.iter().enumerate() {
            for &to in &w.links {
                let target = *ids.get(to).ok_or(ScenarioError::BadLink { from, to })?;
                bf.waypoints.link(ids[from], target);
            }
        }

        calculate_lighting(&mut bf);
        info!(
            "Built scenario '{}': {}x{}x{} tiles, {} units, {} waypoints",
            self.name,
            width,
            length,
            height,
            bf.units().len(),
            bf.waypoints.len()
        );
        Ok(bf)
    }

    /// Part names as declared, for diagnostics.
    pub fn part_names(&self) -> Vec<&str> {
        self.parts.iter().map(PartSpec::name).collect()
    }
}

fn stock_specs() -> Vec<PartSpec> {
    vec![
        PartSpec::Floor("floor".to_string()),
        PartSpec::Wall {
            name: "west wall".to_string(),
            slot: PartSlot::WestWall,
        },
        PartSpec::Wall {
            name: "north wall".to_string(),
            slot: PartSlot::NorthWall,
        },
        PartSpec::Door {
            name: "door".to_string(),
            slot: PartSlot::WestWall,
            kind: DoorKind::Hinged,
        },
        PartSpec::Window {
            name: "window".to_string(),
            slot: PartSlot::NorthWall,
        },
        PartSpec::Object {
            name: "crate".to_string(),
            bands: 5,
        },
        PartSpec::Barrel {
            name: "barrel".to_string(),
            power: 60,
            fuel: 4,
        },
    ]
}

fn rifle() -> WeaponRule {
    WeaponRule::firearm("rifle", 30)
        .with_snap(FireMode {
            tu: TuCost::Percent(25),
            accuracy: 60,
            shots: 1,
        })
        .with_aimed(FireMode {
            tu: TuCost::Percent(80),
            accuracy: 110,
            shots: 1,
        })
}

fn frag_grenade() -> WeaponRule {
    WeaponRule::special("frag grenade", WeaponKind::Grenade, 50, TuCost::Percent(25))
        .with_blast(3, DamageKind::HighExplosive)
}

fn claw() -> WeaponRule {
    WeaponRule::special("claw", WeaponKind::Melee, 40, TuCost::Flat(12))
}
