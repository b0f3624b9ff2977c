//! LOFT masks: per-band solidity tables for tile parts and units.
//!
//! A tile is [`VOXEL_Z`](crate::geometry::VOXEL_Z) voxels tall and is cut
//! into [`LOFT_BANDS`] horizontal bands, two voxels each. Every part and
//! every unit names one mask per band; a mask is sixteen rows of sixteen
//! bits, row `y` bit `x` set when the voxel is solid.

use serde::{Deserialize, Serialize};

/// Index into a [`LoftLibrary`].
pub type LoftId = u16;

/// Sixteen rows (y) of sixteen bits (x).
pub type LoftMask = [u16; 16];

/// Number of vertical bands per tile.
pub const LOFT_BANDS: usize = 12;

/// Table of LOFT masks.
///
/// The first entries are always the stock masks listed as associated
/// constants, so rule data can refer to them without loading anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoftLibrary {
    masks: Vec<LoftMask>,
}

impl LoftLibrary {
    /// Nothing solid.
    pub const EMPTY: LoftId = 0;
    /// Every voxel solid.
    pub const SOLID: LoftId = 1;
    /// Two-voxel strip along the west edge.
    pub const WEST_WALL: LoftId = 2;
    /// Two-voxel strip along the north edge.
    pub const NORTH_WALL: LoftId = 3;
    /// Round body of a man-sized unit.
    pub const UNIT: LoftId = 4;
    /// Narrow body, used for heads and thin units.
    pub const UNIT_SLIM: LoftId = 5;
    /// Diagonal wall from the north-east corner to the south-west corner.
    pub const NESW: LoftId = 6;
    /// Diagonal wall from the north-west corner to the south-east corner.
    pub const NWSE: LoftId = 7;

    /// Library holding only the stock masks.
    #[must_use]
    pub fn stock() -> Self {
        let mut masks = vec![[0u16; 16], [0xFFFF; 16], [0b11; 16]];

        let mut north = [0u16; 16];
        north[0] = 0xFFFF;
        north[1] = 0xFFFF;
        masks.push(north);

        masks.push(disc(5));
        masks.push(disc(3));

        let mut nesw = [0u16; 16];
        let mut nwse = [0u16; 16];
        for y in 0..16i32 {
            for x in 0..16i32 {
                if (x + y - 15).abs() <= 1 {
                    nesw[y as usize] |= 1 << x;
                }
                if (x - y).abs() <= 1 {
                    nwse[y as usize] |= 1 << x;
                }
            }
        }
        masks.push(nesw);
        masks.push(nwse);

        Self { masks }
    }

    /// Append a custom mask and return its id.
    pub fn add(&mut self, mask: LoftMask) -> LoftId {
        self.masks.push(mask);
        LoftId::try_from(self.masks.len() - 1).unwrap_or(LoftId::MAX)
    }

    /// Look up a mask.
    #[must_use]
    pub fn get(&self, id: LoftId) -> Option<&LoftMask> {
        self.masks.get(usize::from(id))
    }

    /// Number of masks, stock ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Always false: the stock masks are never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Whether voxel column (`x`, `y`) within a tile is solid in mask `id`.
    ///
    /// Coordinates are taken modulo the tile size; unknown ids are empty.
    #[must_use]
    pub fn is_solid(&self, id: LoftId, x: i32, y: i32) -> bool {
        let Some(mask) = self.get(id) else {
            return false;
        };
        let row = mask[y.rem_euclid(16) as usize];
        row & (1 << x.rem_euclid(16)) != 0
    }
}

impl Default for LoftLibrary {
    fn default() -> Self {
        Self::stock()
    }
}

/// Filled circle of the given radius centred on the tile.
fn disc(radius: i32) -> LoftMask {
    let mut mask = [0u16; 16];
    // Doubled coordinates keep the centre at (7.5, 7.5) in integers.
    let r2 = (2 * radius) * (2 * radius);
    for y in 0..16i32 {
        for x in 0..16i32 {
            let dx = 2 * x - 15;
            let dy = 2 * y - 15;
            if dx * dx + dy * dy <= r2 {
                mask[y as usize] |= 1 << x;
            }
        }
    }
    mask
}
