//! Rule data structures consumed by the kernel.
//!
//! This module contains pure data structures for tile parts, unit
//! silhouettes (LOFT masks), weapons and damage kinds. All structs are
//! designed to be deserialized from RON files.
//!
//! **Note:** This module contains no IO - it only defines data types.
//! File loading is handled by the scenario layer.

mod damage_data;
mod loft_data;
mod part_data;
mod weapon_data;

pub use damage_data::{DamageKind, DamageProfile, Medium};
pub use loft_data::{LoftId, LoftLibrary, LoftMask, LOFT_BANDS};
pub use part_data::{
    BigWall, BlockValues, Crossing, DoorKind, MoveCosts, PartId, PartLibrary, PartSlot, TilePart,
};
pub use weapon_data::{FireMode, TuCost, WeaponKind, WeaponRule};
