//! Tile part definitions.
//!
//! A tile holds up to four parts, one per [`PartSlot`]. Each part is a
//! shared rule record stored once in a [`PartLibrary`] and referenced by
//! [`PartId`].
//!
//! Example RON:
//! ```ron
//! TilePart(
//!     name: "brick_wall",
//!     slot: WestWall,
//!     tu: MoveCosts(walk: 255, fly: 255, slide: 255),
//!     block: BlockValues(light: 255, sight: 255, explosive: 50, smoke: 255, fire: 255),
//!     stop_los: true,
//!     armor: 40,
//!     destroyed_variant: Some(7),
//!     loft: (2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2),
//! )
//! ```

use serde::{Deserialize, Serialize};

use super::damage_data::{DamageKind, Medium};
use super::loft_data::{LoftId, LoftLibrary, LOFT_BANDS};
use crate::geometry::Direction;
use crate::unit::MovementType;

/// Index into a [`PartLibrary`].
pub type PartId = u16;

/// Which of the four part positions of a tile a part occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartSlot {
    /// Ground plate.
    Floor,
    /// Wall along the west edge.
    WestWall,
    /// Wall along the north edge.
    NorthWall,
    /// Content standing on the floor.
    Object,
}

impl PartSlot {
    /// All slots in storage order.
    pub const ALL: [Self; 4] = [Self::Floor, Self::WestWall, Self::NorthWall, Self::Object];

    /// Storage index of the slot.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// True for the two wall slots.
    #[must_use]
    pub const fn is_wall(self) -> bool {
        matches!(self, Self::WestWall | Self::NorthWall)
    }
}

impl std::fmt::Display for PartSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// How strongly a part stops each medium. 255 is a full stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockValues {
    /// Light attenuation.
    pub light: u32,
    /// Sight attenuation; non-zero values only matter with `stop_los`.
    pub sight: u32,
    /// Blast power absorbed when crossing.
    pub explosive: u32,
    /// Smoke attenuation.
    pub smoke: u32,
    /// Fire attenuation.
    pub fire: u32,
}

impl BlockValues {
    /// Blocks everything completely.
    pub const FULL: Self = Self {
        light: 255,
        sight: 255,
        explosive: 255,
        smoke: 255,
        fire: 255,
    };

    /// Value for one medium.
    #[must_use]
    pub const fn get(&self, medium: Medium) -> u32 {
        match medium {
            Medium::Light => self.light,
            Medium::Sight => self.sight,
            Medium::Explosive => self.explosive,
            Medium::Smoke => self.smoke,
            Medium::Fire => self.fire,
        }
    }
}

/// TU cost of entering a part per locomotion mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCosts {
    /// Walking units.
    pub walk: u32,
    /// Flying units.
    pub fly: u32,
    /// Sliding (crawling, hovering close to the ground) units.
    pub slide: u32,
}

impl MoveCosts {
    /// Free to cross for every mode.
    pub const FREE: Self = Self::uniform(0);
    /// Never crossable.
    pub const IMPASSABLE: Self = Self::uniform(255);

    /// Same cost for every mode.
    #[must_use]
    pub const fn uniform(cost: u32) -> Self {
        Self {
            walk: cost,
            fly: cost,
            slide: cost,
        }
    }

    /// Cost for a given locomotion mode.
    #[must_use]
    pub const fn get(&self, movement: MovementType) -> u32 {
        match movement {
            MovementType::Walk => self.walk,
            MovementType::Fly => self.fly,
            MovementType::Slide => self.slide,
        }
    }
}

impl Default for MoveCosts {
    fn default() -> Self {
        Self::FREE
    }
}

/// Door behaviour of a wall or object part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DoorKind {
    /// Not a door.
    #[default]
    None,
    /// Swings open by swapping to the part's `open_variant`.
    Hinged,
    /// Slides aside; the tile keeps the part and flips an open flag.
    Sliding,
}

/// Orientation tag for object parts that behave like walls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BigWall {
    /// Ordinary object.
    #[default]
    None,
    /// Fills the whole tile.
    Block,
    /// Diagonal from the north-east corner to the south-west corner.
    Nesw,
    /// Diagonal from the north-west corner to the south-east corner.
    Nwse,
    /// Along the west edge.
    West,
    /// Along the north edge.
    North,
    /// Along the east edge.
    East,
    /// Along the south edge.
    South,
    /// Along both the east and south edges.
    EastSouth,
    /// Along both the west and north edges.
    WestNorth,
}

/// Whether a step is going into or out of the tile holding a big wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// The step ends in the tile.
    Entering,
    /// The step starts in the tile.
    Leaving,
}

impl BigWall {
    /// True for the kinds that make the whole tile unusable for movement.
    #[must_use]
    pub const fn fills_tile(self) -> bool {
        matches!(self, Self::Block | Self::Nesw | Self::Nwse)
    }

    /// Whether this wall stands in the way of a step travelling in
    /// `travel`.
    ///
    /// Diagonal walls let a step through along their own axis. When leaving
    /// a tile the mover is taken to stand on the west side of the
    /// diagonal, so only steps heading across it are stopped.
    #[must_use]
    pub fn obstructs(self, travel: Direction, crossing: Crossing) -> bool {
        use Direction as D;

        if travel.is_vertical() {
            return self == Self::Block && crossing == Crossing::Entering;
        }
        match self {
            Self::None => false,
            Self::Block => crossing == Crossing::Entering,
            Self::Nesw => match crossing {
                Crossing::Entering => !matches!(travel, D::NorthEast | D::SouthWest),
                Crossing::Leaving => matches!(travel, D::East | D::SouthEast | D::South),
            },
            Self::Nwse => match crossing {
                Crossing::Entering => !matches!(travel, D::NorthWest | D::SouthEast),
                Crossing::Leaving => matches!(travel, D::North | D::NorthEast | D::East),
            },
            Self::West => edge_obstructs(D::West, travel, crossing),
            Self::North => edge_obstructs(D::North, travel, crossing),
            Self::East => edge_obstructs(D::East, travel, crossing),
            Self::South => edge_obstructs(D::South, travel, crossing),
            Self::EastSouth => {
                edge_obstructs(D::East, travel, crossing) || edge_obstructs(D::South, travel, crossing)
            }
            Self::WestNorth => {
                edge_obstructs(D::West, travel, crossing) || edge_obstructs(D::North, travel, crossing)
            }
        }
    }
}

/// A wall on `side` stops steps entering from that side and steps leaving
/// through it.
fn edge_obstructs(side: Direction, travel: Direction, crossing: Crossing) -> bool {
    let (a, b) = travel.components();
    let through = match crossing {
        Crossing::Entering => side.opposite(),
        Crossing::Leaving => side,
    };
    a == through || b == through
}

/// Rule record for one kind of tile part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePart {
    /// Name used in logs and scenario files.
    pub name: String,
    /// Slot this part occupies.
    pub slot: PartSlot,
    /// TU cost of moving onto (floor, object) or through (wall) this part.
    #[serde(default)]
    pub tu: MoveCosts,
    /// Attenuation per medium.
    #[serde(default)]
    pub block: BlockValues,
    /// Fully stops line of sight and line of fire.
    #[serde(default)]
    pub stop_los: bool,
    /// Terrain power needed to destroy the part.
    #[serde(default)]
    pub armor: u32,
    /// Power of the secondary blast released when destroyed.
    #[serde(default)]
    pub explosive: u32,
    /// Damage kind of that secondary blast.
    #[serde(default)]
    pub explosive_kind: DamageKind,
    /// Turns a fire burns on this part.
    #[serde(default)]
    pub fuel: u8,
    /// Ignition resistance; 255 never burns.
    #[serde(default = "default_flammable")]
    pub flammable: u8,
    /// Door behaviour.
    #[serde(default)]
    pub door: DoorKind,
    /// Part a hinged door swaps to when opened.
    #[serde(default)]
    pub open_variant: Option<PartId>,
    /// Part left behind when destroyed; `None` leaves the slot empty.
    #[serde(default)]
    pub destroyed_variant: Option<PartId>,
    /// Wall-like orientation of an object part.
    #[serde(default)]
    pub big_wall: BigWall,
    /// Voxel offset of the standing surface; negative lifts the occupant.
    #[serde(default)]
    pub terrain_level: i32,
    /// Light emitted by the part.
    #[serde(default)]
    pub light_source: u8,
    /// Lets walking units move straight up and down.
    #[serde(default)]
    pub grav_lift: bool,
    /// One LOFT mask per vertical band, bottom first.
    #[serde(default)]
    pub loft: [LoftId; LOFT_BANDS],
}

fn default_flammable() -> u8 {
    255
}

impl TilePart {
    fn base(name: &str, slot: PartSlot) -> Self {
        Self {
            name: name.to_string(),
            slot,
            tu: MoveCosts::FREE,
            block: BlockValues::default(),
            stop_los: false,
            armor: 0,
            explosive: 0,
            explosive_kind: DamageKind::HighExplosive,
            fuel: 0,
            flammable: default_flammable(),
            door: DoorKind::None,
            open_variant: None,
            destroyed_variant: None,
            big_wall: BigWall::None,
            terrain_level: 0,
            light_source: 0,
            grav_lift: false,
            loft: [LoftLibrary::EMPTY; LOFT_BANDS],
        }
    }

    /// Plain floor: 4 TU to cross, stops sight and smoke vertically.
    #[must_use]
    pub fn floor(name: &str) -> Self {
        let mut part = Self::base(name, PartSlot::Floor);
        part.tu = MoveCosts::uniform(4);
        part.block = BlockValues {
            light: 0,
            sight: 255,
            explosive: 20,
            smoke: 255,
            fire: 255,
        };
        part.stop_los = true;
        part.armor = 50;
        part.loft[0] = LoftLibrary::SOLID;
        part
    }

    /// Solid wall in the given wall slot.
    #[must_use]
    pub fn wall(name: &str, slot: PartSlot) -> Self {
        let mut part = Self::base(name, slot);
        part.tu = MoveCosts::IMPASSABLE;
        part.block = BlockValues {
            explosive: 60,
            ..BlockValues::FULL
        };
        part.stop_los = true;
        part.armor = 60;
        let mask = if slot == PartSlot::NorthWall {
            LoftLibrary::NORTH_WALL
        } else {
            LoftLibrary::WEST_WALL
        };
        part.loft = [mask; LOFT_BANDS];
        part
    }

    /// Closed door in the given wall slot.
    #[must_use]
    pub fn door(name: &str, slot: PartSlot, kind: DoorKind) -> Self {
        let mut part = Self::wall(name, slot);
        part.door = kind;
        part.armor = 30;
        part.block.explosive = 30;
        part
    }

    /// Impassable object that fills the tile up to `bands` LOFT bands.
    #[must_use]
    pub fn object(name: &str, bands: usize) -> Self {
        let mut part = Self::base(name, PartSlot::Object);
        part.tu = MoveCosts::IMPASSABLE;
        part.block.explosive = 20;
        part.armor = 30;
        for band in part.loft.iter_mut().take(bands.min(LOFT_BANDS)) {
            *band = LoftLibrary::SOLID;
        }
        part
    }

    /// Override movement costs.
    #[must_use]
    pub fn with_tu(mut self, tu: MoveCosts) -> Self {
        self.tu = tu;
        self
    }

    /// Override block values.
    #[must_use]
    pub fn with_block(mut self, block: BlockValues) -> Self {
        self.block = block;
        self
    }

    /// Override armor.
    #[must_use]
    pub fn with_armor(mut self, armor: u32) -> Self {
        self.armor = armor;
        self
    }

    /// Set whether the part stops sight.
    #[must_use]
    pub fn with_stop_los(mut self, stop_los: bool) -> Self {
        self.stop_los = stop_los;
        self
    }

    /// Set the big-wall orientation.
    #[must_use]
    pub fn with_big_wall(mut self, big_wall: BigWall) -> Self {
        self.big_wall = big_wall;
        self
    }

    /// Set the part swapped in when a hinged door opens.
    #[must_use]
    pub fn with_open_variant(mut self, id: PartId) -> Self {
        self.open_variant = Some(id);
        self
    }

    /// Set the part left behind on destruction.
    #[must_use]
    pub fn with_destroyed_variant(mut self, id: PartId) -> Self {
        self.destroyed_variant = Some(id);
        self
    }

    /// Set the secondary blast released on destruction.
    #[must_use]
    pub fn with_explosive(mut self, power: u32, kind: DamageKind) -> Self {
        self.explosive = power;
        self.explosive_kind = kind;
        self
    }

    /// Make the part burnable.
    #[must_use]
    pub fn with_fuel(mut self, fuel: u8, flammable: u8) -> Self {
        self.fuel = fuel;
        self.flammable = flammable;
        self
    }

    /// Set the standing-surface offset.
    #[must_use]
    pub fn with_terrain_level(mut self, level: i32) -> Self {
        self.terrain_level = level;
        self
    }

    /// Set the emitted light.
    #[must_use]
    pub fn with_light(mut self, light: u8) -> Self {
        self.light_source = light;
        self
    }

    /// Turn the part into a gravity lift.
    #[must_use]
    pub fn as_grav_lift(mut self) -> Self {
        self.grav_lift = true;
        self
    }

    /// Replace every LOFT band with one mask.
    #[must_use]
    pub fn with_loft(mut self, loft: LoftId) -> Self {
        self.loft = [loft; LOFT_BANDS];
        self
    }

    /// True when units cannot cross this part in the given mode.
    #[must_use]
    pub const fn is_impassable(&self, movement: MovementType, impassable_cost: u32) -> bool {
        self.tu.get(movement) >= impassable_cost
    }
}

/// Owned table of tile parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartLibrary {
    parts: Vec<TilePart>,
}

impl PartLibrary {
    /// Create an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a part and return its id.
    pub fn add(&mut self, part: TilePart) -> PartId {
        self.parts.push(part);
        PartId::try_from(self.parts.len() - 1).unwrap_or(PartId::MAX)
    }

    /// Look up a part.
    #[must_use]
    pub fn get(&self, id: PartId) -> Option<&TilePart> {
        self.parts.get(usize::from(id))
    }

    /// Find a part id by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PartId> {
        self.parts
            .iter()
            .position(|p| p.name == name)
            .and_then(|i| PartId::try_from(i).ok())
    }

    /// Number of parts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True when no parts are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Iterate over `(id, part)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PartId, &TilePart)> {
        self.parts
            .iter()
            .enumerate()
            .map(|(i, p)| (PartId::try_from(i).unwrap_or(PartId::MAX), p))
    }
}
