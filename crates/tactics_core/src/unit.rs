//! Battle units as seen by the kernel.
//!
//! The unit/stats collaborator owns the real soldier and alien records.
//! This view carries only what movement, sight, targeting and the AI read,
//! plus the few fields they write back (TU ledger, visibility memory, the
//! AI behaviour record).

use serde::{Deserialize, Serialize};

use crate::ai::AiBehavior;
use crate::data::{LoftId, LoftLibrary, WeaponRule};
use crate::geometry::{Direction, Position, VOXEL_Z};

/// Unit identifier; also the unit's index in the battlefield arena.
pub type UnitId = u32;

/// Side a unit fights for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Faction {
    /// Player-controlled squad.
    Player,
    /// Computer-controlled attackers.
    Hostile,
    /// Civilians.
    Neutral,
}

impl Faction {
    /// Whether units of this faction will attack units of `other`.
    #[must_use]
    pub const fn is_hostile_to(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Player, Self::Hostile) | (Self::Hostile, Self::Player | Self::Neutral)
        )
    }
}

/// Locomotion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MovementType {
    /// Walks on floors and climbs stairs.
    #[default]
    Walk,
    /// Flies; may move vertically through open air.
    Fly,
    /// Slides along the ground.
    Slide,
}

/// Whether a unit is still in the fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitStatus {
    /// Able to act.
    #[default]
    Standing,
    /// Knocked out by stun damage.
    Unconscious,
    /// Killed.
    Dead,
}

/// A weapon carried by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarriedWeapon {
    /// Weapon rules.
    pub rule: WeaponRule,
    /// Rounds left; `None` for weapons that need no ammunition.
    #[serde(default)]
    pub ammo: Option<u32>,
}

impl CarriedWeapon {
    /// Weapon without an ammunition counter.
    #[must_use]
    pub const fn new(rule: WeaponRule) -> Self {
        Self { rule, ammo: None }
    }

    /// Whether the weapon can be used right now.
    #[must_use]
    pub fn has_ammo(&self) -> bool {
        self.ammo.map_or(true, |rounds| rounds > 0)
    }
}

/// A unit on the battlefield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Arena id, assigned when the unit is added to a battlefield.
    pub id: UnitId,
    /// Display name.
    pub name: String,
    /// Side.
    pub faction: Faction,
    /// Locomotion.
    pub movement: MovementType,
    /// Footprint edge in tiles (1 or 2).
    pub size: i32,
    /// Silhouette mask for every band the unit fills.
    pub loft: LoftId,
    /// Standing height in voxels.
    pub height: i32,
    /// Voxels the unit floats above its standing surface.
    pub float_height: i32,
    /// Tile position of the footprint's north-west corner.
    pub position: Position,
    /// Facing.
    pub facing: Direction,
    /// Time units left this turn.
    pub tu: u32,
    /// Time units at the start of a turn.
    pub max_tu: u32,
    /// Hit points left.
    pub health: u32,
    /// Hit points when unhurt.
    pub max_health: u32,
    /// Accumulated stun damage.
    pub stun: u32,
    /// Morale, 0..=100.
    pub morale: u32,
    /// Armor subtracted from incoming damage.
    pub armor: u32,
    /// Psionic strength (defence).
    pub psi_strength: u32,
    /// Psionic skill (attack); 0 means no psionic ability.
    pub psi_skill: u32,
    /// Fighting state.
    pub status: UnitStatus,
    /// Carried weapons.
    pub weapons: Vec<CarriedWeapon>,
    /// AI behaviour record for computer-controlled units.
    pub ai: Option<AiBehavior>,
    /// Units seen by the last field-of-view pass.
    pub visible_units: Vec<UnitId>,
    /// Turns since an enemy faction last saw this unit.
    pub turns_since_spotted: u32,
    /// Turns left burning.
    pub on_fire: u8,
    /// Radius of a carried light; 0 for none.
    pub light_radius: i32,
    /// Aggression 0..=3; higher prefers combat over caution.
    pub aggression: u32,
}

impl Unit {
    /// Value of `turns_since_spotted` for units never seen.
    pub const NEVER_SPOTTED: u32 = 255;

    /// A man-sized walking unit with default stats.
    #[must_use]
    pub fn new(name: &str, faction: Faction, position: Position) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            faction,
            movement: MovementType::Walk,
            size: 1,
            loft: LoftLibrary::UNIT,
            height: 22,
            float_height: 0,
            position,
            facing: Direction::South,
            tu: 60,
            max_tu: 60,
            health: 40,
            max_health: 40,
            stun: 0,
            morale: 100,
            armor: 10,
            psi_strength: 30,
            psi_skill: 0,
            status: UnitStatus::Standing,
            weapons: Vec::new(),
            ai: None,
            visible_units: Vec::new(),
            turns_since_spotted: Self::NEVER_SPOTTED,
            on_fire: 0,
            light_radius: 0,
            aggression: 1,
        }
    }

    /// Attach an AI record.
    #[must_use]
    pub fn with_ai(mut self) -> Self {
        self.ai = Some(AiBehavior::default());
        self
    }

    /// Add a weapon.
    #[must_use]
    pub fn with_weapon(mut self, rule: WeaponRule) -> Self {
        self.weapons.push(CarriedWeapon::new(rule));
        self
    }

    /// Set both current and maximum TU.
    #[must_use]
    pub fn with_tu(mut self, tu: u32) -> Self {
        self.tu = tu;
        self.max_tu = tu;
        self
    }

    /// Set the locomotion mode.
    #[must_use]
    pub fn with_movement(mut self, movement: MovementType) -> Self {
        self.movement = movement;
        self
    }

    /// Make the unit occupy a 2×2 footprint.
    #[must_use]
    pub fn large(mut self) -> Self {
        self.size = 2;
        self
    }

    /// Able to act.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, UnitStatus::Standing)
    }

    /// Whether `other` is an enemy of this unit.
    #[must_use]
    pub const fn is_hostile_to(&self, other: &Self) -> bool {
        self.faction.is_hostile_to(other.faction)
    }

    /// Tiles covered by the footprint when standing at `origin`.
    pub fn footprint_at(&self, origin: Position) -> impl Iterator<Item = Position> {
        let size = self.size.max(1);
        (0..size).flat_map(move |dy| {
            (0..size).map(move |dx| Position::new(origin.x + dx, origin.y + dy, origin.z))
        })
    }

    /// Tiles currently covered by the footprint.
    pub fn footprint(&self) -> impl Iterator<Item = Position> {
        self.footprint_at(self.position)
    }

    /// Whether the footprint covers `tile`.
    #[must_use]
    pub fn covers(&self, tile: Position) -> bool {
        tile.z == self.position.z
            && (self.position.x..self.position.x + self.size).contains(&tile.x)
            && (self.position.y..self.position.y + self.size).contains(&tile.y)
    }

    /// Health as a percentage of the maximum.
    #[must_use]
    pub fn health_percent(&self) -> u32 {
        if self.max_health == 0 {
            return 0;
        }
        self.health * 100 / self.max_health
    }

    /// Voxel height of the unit's top above its tile base, given the
    /// terrain level under it.
    #[must_use]
    pub const fn top_offset(&self, terrain_level: i32) -> i32 {
        -terrain_level + self.float_height + self.height
    }

    /// Voxel z range `[low, high)` the unit fills when standing on a tile
    /// with the given terrain level.
    #[must_use]
    pub const fn voxel_span(&self, terrain_level: i32) -> (i32, i32) {
        let base = self.position.z * VOXEL_Z - terrain_level + self.float_height;
        (base, base + self.height)
    }

    /// Index of the first usable weapon matching a predicate.
    #[must_use]
    pub fn weapon_index(&self, predicate: impl Fn(&WeaponRule) -> bool) -> Option<usize> {
        self.weapons
            .iter()
            .position(|w| w.has_ammo() && predicate(&w.rule))
    }
}
