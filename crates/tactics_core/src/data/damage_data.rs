//! Damage kinds and the media they travel through.

use serde::{Deserialize, Serialize};

/// What a blockage query is asking about.
///
/// Each tile part carries one block value per medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Medium {
    /// Light spreading from sources.
    Light,
    /// Line of sight and line of fire.
    Sight,
    /// Blast power (high explosive, incendiary and stun blasts).
    Explosive,
    /// Drifting smoke.
    Smoke,
    /// Spreading fire.
    Fire,
}

/// Damage classification for weapons and blasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DamageKind {
    /// Armour-piercing rounds.
    ArmorPiercing,
    /// Incendiary rounds and grenades: leave fire, spare structures.
    Incendiary,
    /// High explosive: full blast, wrecks terrain.
    #[default]
    HighExplosive,
    /// Laser beams.
    Laser,
    /// Plasma bolts.
    Plasma,
    /// Stun gas and stun rods: knock out, never destroy.
    Stun,
    /// Close combat.
    Melee,
    /// Acid spit.
    Acid,
    /// Smoke grenades: concealment only.
    Smoke,
}

/// How a damage kind divides between units and terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageProfile {
    /// Lowest percentage of power applied to a unit.
    pub unit_min_percent: u32,
    /// Highest percentage of power applied to a unit.
    pub unit_max_percent: u32,
    /// Percentage of power applied to tile parts (0 = terrain untouched).
    pub terrain_percent: u32,
    /// Medium whose block values attenuate this kind, if any.
    pub medium: Option<Medium>,
    /// Damage goes to the stun pool instead of health.
    pub stuns: bool,
    /// Leaves fire on tiles it reaches.
    pub ignites: bool,
    /// Leaves smoke on tiles it reaches.
    pub smokes: bool,
}

impl DamageKind {
    /// Look up the unit/terrain split for this kind.
    #[must_use]
    pub const fn profile(self) -> DamageProfile {
        use DamageKind::*;

        let (unit_min_percent, unit_max_percent, terrain_percent) = match self {
            HighExplosive => (50, 150, 50),
            Incendiary => (50, 100, 0),
            Stun => (50, 150, 0),
            Smoke => (0, 0, 0),
            ArmorPiercing | Laser | Plasma | Acid => (50, 200, 100),
            Melee => (50, 150, 0),
        };
        let medium = match self {
            HighExplosive | Incendiary | Stun => Some(Medium::Explosive),
            Smoke => Some(Medium::Smoke),
            _ => None,
        };

        DamageProfile {
            unit_min_percent,
            unit_max_percent,
            terrain_percent,
            medium,
            stuns: matches!(self, Stun),
            ignites: matches!(self, Incendiary),
            smokes: matches!(self, Smoke | HighExplosive),
        }
    }

    /// True if blasts of this kind can destroy tile parts.
    #[must_use]
    pub const fn destroys_terrain(self) -> bool {
        self.profile().terrain_percent > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exempt_kinds_spare_terrain() {
        assert!(DamageKind::HighExplosive.destroys_terrain());
        assert!(!DamageKind::Incendiary.destroys_terrain());
        assert!(!DamageKind::Stun.destroys_terrain());
        assert!(!DamageKind::Smoke.destroys_terrain());
    }

    #[test]
    fn test_explosive_terrain_split_is_half() {
        let p = DamageKind::HighExplosive.profile();
        assert_eq!(p.terrain_percent, 50);
        assert_eq!(p.medium, Some(Medium::Explosive));
        assert!(!p.stuns);
        assert!(DamageKind::Stun.profile().stuns);
        assert!(DamageKind::Incendiary.profile().ignites);
    }
}
