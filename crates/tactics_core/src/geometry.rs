//! Coordinate spaces and fixed-point math utilities.
//!
//! The battlefield is addressed in two spaces that share the [`Position`]
//! type: tile-space (one unit per grid cell) and voxel-space, where every
//! tile is subdivided into [`VOXEL_X`] × [`VOXEL_Y`] × [`VOXEL_Z`] cells.
//! Conversion between them is a pure scale/floor operation.
//!
//! Anything that needs fractions (search heuristics, blast ray directions)
//! uses fixed-point arithmetic so results are identical on every platform.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all fractional kernel math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Pi as raw I32F32 bits.
const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// Voxels per tile along the x axis.
pub const VOXEL_X: i32 = 16;
/// Voxels per tile along the y axis.
pub const VOXEL_Y: i32 = 16;
/// Voxels per tile along the z axis.
pub const VOXEL_Z: i32 = 24;

/// An integer triple in either tile-space or voxel-space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    /// East-west axis (grows east).
    pub x: i32,
    /// North-south axis (grows south).
    pub y: i32,
    /// Vertical axis (grows up).
    pub z: i32,
}

impl Position {
    /// Origin.
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Create a new position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Convert a tile-space position to the voxel at its lower corner.
    #[must_use]
    pub const fn to_voxel(self) -> Self {
        Self::new(self.x * VOXEL_X, self.y * VOXEL_Y, self.z * VOXEL_Z)
    }

    /// Convert a voxel-space position to the tile containing it.
    ///
    /// Uses floor division so negative voxels land in negative tiles.
    #[must_use]
    pub const fn to_tile(self) -> Self {
        Self::new(
            self.x.div_euclid(VOXEL_X),
            self.y.div_euclid(VOXEL_Y),
            self.z.div_euclid(VOXEL_Z),
        )
    }

    /// Voxel at the horizontal center of a tile, `height` voxels above its base.
    #[must_use]
    pub const fn tile_center_voxel(self, height: i32) -> Self {
        Self::new(
            self.x * VOXEL_X + VOXEL_X / 2,
            self.y * VOXEL_Y + VOXEL_Y / 2,
            self.z * VOXEL_Z + height,
        )
    }

    /// Position offset by a direction step.
    #[must_use]
    pub const fn step(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// Squared Euclidean distance in the x/y plane.
    #[must_use]
    pub const fn distance_sq_2d(self, other: Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Squared Euclidean distance in all three axes.
    #[must_use]
    pub const fn distance_sq(self, other: Self) -> i32 {
        let dz = self.z - other.z;
        self.distance_sq_2d(other) + dz * dz
    }

    /// Rounded horizontal tile distance, the range measure used for weapons
    /// and sight.
    #[must_use]
    pub fn distance(self, other: Self) -> i32 {
        let sq = Fixed::from_num(self.distance_sq_2d(other));
        fixed_sqrt(sq).round().to_num::<i32>()
    }

    /// Exact horizontal Euclidean distance as a fixed-point number.
    #[must_use]
    pub fn distance_fixed(self, other: Self) -> Fixed {
        fixed_sqrt(Fixed::from_num(self.distance_sq_2d(other)))
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A movement or facing direction.
///
/// The eight compass directions are numbered clockwise from north, with
/// north pointing to decreasing y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    /// y - 1.
    North,
    /// x + 1, y - 1.
    NorthEast,
    /// x + 1.
    East,
    /// x + 1, y + 1.
    SouthEast,
    /// y + 1.
    South,
    /// x - 1, y + 1.
    SouthWest,
    /// x - 1.
    West,
    /// x - 1, y - 1.
    NorthWest,
    /// z + 1.
    Up,
    /// z - 1.
    Down,
}

impl Direction {
    /// The eight horizontal directions in clockwise order.
    pub const HORIZONTAL: [Self; 8] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
    ];

    /// All ten directions, horizontal first.
    pub const ALL: [Self; 10] = [
        Self::North,
        Self::NorthEast,
        Self::East,
        Self::SouthEast,
        Self::South,
        Self::SouthWest,
        Self::West,
        Self::NorthWest,
        Self::Up,
        Self::Down,
    ];

    /// Tile offset for one step in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32, i32) {
        match self {
            Self::North => (0, -1, 0),
            Self::NorthEast => (1, -1, 0),
            Self::East => (1, 0, 0),
            Self::SouthEast => (1, 1, 0),
            Self::South => (0, 1, 0),
            Self::SouthWest => (-1, 1, 0),
            Self::West => (-1, 0, 0),
            Self::NorthWest => (-1, -1, 0),
            Self::Up => (0, 0, 1),
            Self::Down => (0, 0, -1),
        }
    }

    /// Clockwise index 0..=7 for horizontal directions, 8/9 for up/down.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Direction for a clockwise index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::ALL.len() {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// True for the four diagonal compass directions.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }

    /// True for up and down.
    #[must_use]
    pub const fn is_vertical(self) -> bool {
        matches!(self, Self::Up | Self::Down)
    }

    /// The direction pointing the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
            _ => Self::HORIZONTAL[(self as usize + 4) % 8],
        }
    }

    /// Split a diagonal into its two orthogonal components (y component first).
    ///
    /// Orthogonal directions return themselves twice.
    #[must_use]
    pub const fn components(self) -> (Self, Self) {
        match self {
            Self::NorthEast => (Self::North, Self::East),
            Self::SouthEast => (Self::South, Self::East),
            Self::SouthWest => (Self::South, Self::West),
            Self::NorthWest => (Self::North, Self::West),
            other => (other, other),
        }
    }

    /// Horizontal direction from a tile offset, ignoring magnitude.
    ///
    /// Returns `None` when both horizontal components are zero.
    #[must_use]
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, 1) => Some(Self::SouthEast),
            (0, 1) => Some(Self::South),
            (-1, 1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, -1) => Some(Self::NorthWest),
            _ => None,
        }
    }

    /// Closest of the eight compass directions from one tile towards another.
    ///
    /// Uses octant sectors rather than sign so long shallow lines resolve to
    /// the orthogonal direction.
    #[must_use]
    pub fn towards(from: Position, to: Position) -> Option<Self> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx == 0 && dy == 0 {
            return None;
        }
        // tan(22.5 degrees) ~ 0.4142 separates orthogonal from diagonal sectors.
        let ax = i64::from(dx.abs());
        let ay = i64::from(dy.abs());
        let sx = if ax * 1000 < ay * 414 { 0 } else { dx.signum() };
        let sy = if ay * 1000 < ax * 414 { 0 } else { dy.signum() };
        Self::from_delta(sx, sy)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Sine of an angle given in whole degrees.
///
/// Reduces to the first quadrant and evaluates a Taylor series, which is
/// accurate to well below one voxel over any battlefield-sized radius.
#[must_use]
pub fn fixed_sin_deg(degrees: i32) -> Fixed {
    let d = degrees.rem_euclid(360);
    let (reduced, negate) = match d {
        0..=90 => (d, false),
        91..=180 => (180 - d, false),
        181..=270 => (d - 180, true),
        _ => (360 - d, true),
    };
    let rad = Fixed::from_num(reduced) * PI / Fixed::from_num(180);
    let rad_sq = rad * rad;

    // x - x^3/3! + x^5/5! - ... up to x^13
    let mut term = rad;
    let mut sum = rad;
    for n in 1..=6 {
        let denom = Fixed::from_num((2 * n) * (2 * n + 1));
        term = -term * rad_sq / denom;
        sum += term;
    }

    if negate {
        -sum
    } else {
        sum
    }
}

/// Cosine of an angle given in whole degrees.
#[must_use]
pub fn fixed_cos_deg(degrees: i32) -> Fixed {
    fixed_sin_deg(degrees + 90)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_round_trip_floors() {
        let tile = Position::new(3, 4, 1);
        assert_eq!(tile.to_voxel(), Position::new(48, 64, 24));
        assert_eq!(Position::new(63, 79, 47).to_tile(), tile);
        assert_eq!(Position::new(-1, 0, 0).to_tile(), Position::new(-1, 0, 0));
    }

    #[test]
    fn test_tile_center_voxel() {
        let v = Position::new(1, 2, 0).tile_center_voxel(12);
        assert_eq!(v, Position::new(24, 40, 12));
        assert_eq!(v.to_tile(), Position::new(1, 2, 0));
    }

    #[test]
    fn test_direction_offsets_and_opposites() {
        for dir in Direction::ALL {
            let (dx, dy, dz) = dir.offset();
            let (ox, oy, oz) = dir.opposite().offset();
            assert_eq!((dx + ox, dy + oy, dz + oz), (0, 0, 0), "{dir:?}");
        }
        assert!(Direction::SouthWest.is_diagonal());
        assert!(!Direction::Up.is_diagonal());
        assert_eq!(Direction::from_index(3), Some(Direction::SouthEast));
    }

    #[test]
    fn test_direction_towards() {
        let o = Position::ZERO;
        assert_eq!(Direction::towards(o, Position::new(5, 0, 0)), Some(Direction::East));
        assert_eq!(Direction::towards(o, Position::new(5, 1, 0)), Some(Direction::East));
        assert_eq!(Direction::towards(o, Position::new(4, 4, 0)), Some(Direction::SouthEast));
        assert_eq!(Direction::towards(o, Position::new(0, -3, 0)), Some(Direction::North));
        assert_eq!(Direction::towards(o, o), None);
    }

    #[test]
    fn test_distance() {
        let a = Position::new(0, 0, 0);
        assert_eq!(a.distance(Position::new(3, 4, 0)), 5);
        assert_eq!(a.distance(Position::new(1, 1, 0)), 1);
        assert_eq!(a.distance_sq(Position::new(1, 2, 2)), 9);
    }

    #[test]
    fn test_fixed_sqrt() {
        assert_eq!(fixed_sqrt(Fixed::from_num(25)).round(), Fixed::from_num(5));
        assert_eq!(fixed_sqrt(Fixed::ZERO), Fixed::ZERO);
        let two = fixed_sqrt(Fixed::from_num(2));
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((two * two - Fixed::from_num(2)).abs() < epsilon);
    }

    #[test]
    fn test_fixed_trig() {
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((fixed_sin_deg(0)).abs() < epsilon);
        assert!((fixed_sin_deg(90) - Fixed::ONE).abs() < epsilon);
        assert!((fixed_cos_deg(180) + Fixed::ONE).abs() < epsilon);
        assert!((fixed_sin_deg(270) + Fixed::ONE).abs() < epsilon);
        let half = Fixed::ONE / Fixed::from_num(2);
        assert!((fixed_sin_deg(30) - half).abs() < epsilon);
        assert!((fixed_cos_deg(-60) - half).abs() < epsilon);
    }
}
