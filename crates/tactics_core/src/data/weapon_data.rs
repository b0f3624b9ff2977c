//! Weapon rules as seen by targeting and the AI.
//!
//! Only the fields the kernel reasons about are modelled: range bands, TU
//! costs per fire mode, blast radius and damage. Inventory, ammo types and
//! pricing live with the rule-data collaborator.
//!
//! Example RON:
//! ```ron
//! WeaponRule(
//!     name: "rifle",
//!     kind: Firearm,
//!     damage: 30,
//!     damage_kind: ArmorPiercing,
//!     snap: Some(FireMode(tu: Percent(25), accuracy: 60)),
//!     aimed: Some(FireMode(tu: Percent(80), accuracy: 110)),
//!     max_range: 30,
//! )
//! ```

use serde::{Deserialize, Serialize};

use super::damage_data::DamageKind;

/// What sort of attack a weapon makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WeaponKind {
    /// Direct-fire gun with snap/auto/aimed modes.
    #[default]
    Firearm,
    /// Close combat weapon, hits adjacent tiles only.
    Melee,
    /// Thrown explosive.
    Grenade,
    /// Launcher whose projectile follows a list of waypoints.
    GuidedLauncher,
    /// Psionic amplifier.
    PsiAmp,
}

/// TU cost of an action, flat or relative to the unit's maximum TU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TuCost {
    /// Fixed amount.
    Flat(u32),
    /// Percentage of the unit's maximum TU.
    Percent(u32),
}

impl TuCost {
    /// Resolve to TU for a unit with the given maximum.
    #[must_use]
    pub const fn resolve(self, max_tu: u32) -> u32 {
        match self {
            Self::Flat(tu) => tu,
            Self::Percent(pct) => max_tu * pct / 100,
        }
    }
}

impl Default for TuCost {
    fn default() -> Self {
        Self::Flat(0)
    }
}

/// Cost and accuracy of one fire mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireMode {
    /// TU spent per use.
    pub tu: TuCost,
    /// Accuracy in percent.
    #[serde(default)]
    pub accuracy: u32,
    /// Rounds fired per use.
    #[serde(default = "one")]
    pub shots: u32,
}

fn one() -> u32 {
    1
}

impl FireMode {
    /// Single-shot mode with a flat TU cost.
    #[must_use]
    pub const fn flat(tu: u32, accuracy: u32) -> Self {
        Self {
            tu: TuCost::Flat(tu),
            accuracy,
            shots: 1,
        }
    }
}

/// Rule record for a weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponRule {
    /// Name used in logs.
    pub name: String,
    /// Attack style.
    #[serde(default)]
    pub kind: WeaponKind,
    /// Damage power.
    #[serde(default)]
    pub damage: u32,
    /// Damage classification.
    #[serde(default)]
    pub damage_kind: DamageKind,
    /// Blast radius in tiles; 0 for direct hits.
    #[serde(default)]
    pub blast_radius: i32,
    /// Snap fire mode.
    #[serde(default)]
    pub snap: Option<FireMode>,
    /// Burst fire mode.
    #[serde(default)]
    pub auto: Option<FireMode>,
    /// Aimed fire mode.
    #[serde(default)]
    pub aimed: Option<FireMode>,
    /// Cost of non-firearm attacks (throw, strike, launch, psi).
    #[serde(default)]
    pub attack_tu: TuCost,
    /// Maximum useful range in tiles.
    #[serde(default = "default_range")]
    pub max_range: i32,
    /// Waypoints a guided projectile accepts.
    #[serde(default)]
    pub max_waypoints: usize,
}

fn default_range() -> i32 {
    20
}

impl WeaponRule {
    /// A firearm with the given damage and no fire modes yet.
    #[must_use]
    pub fn firearm(name: &str, damage: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: WeaponKind::Firearm,
            damage,
            damage_kind: DamageKind::ArmorPiercing,
            blast_radius: 0,
            snap: None,
            auto: None,
            aimed: None,
            attack_tu: TuCost::Flat(0),
            max_range: default_range(),
            max_waypoints: 0,
        }
    }

    /// A non-firearm weapon with a single attack cost.
    #[must_use]
    pub fn special(name: &str, kind: WeaponKind, damage: u32, attack_tu: TuCost) -> Self {
        Self {
            kind,
            attack_tu,
            damage_kind: match kind {
                WeaponKind::Melee => DamageKind::Melee,
                WeaponKind::PsiAmp => DamageKind::Stun,
                _ => DamageKind::HighExplosive,
            },
            max_range: match kind {
                WeaponKind::Melee => 1,
                _ => default_range(),
            },
            ..Self::firearm(name, damage)
        }
    }

    /// Set the snap fire mode.
    #[must_use]
    pub fn with_snap(mut self, mode: FireMode) -> Self {
        self.snap = Some(mode);
        self
    }

    /// Set the auto fire mode.
    #[must_use]
    pub fn with_auto(mut self, mode: FireMode) -> Self {
        self.auto = Some(mode);
        self
    }

    /// Set the aimed fire mode.
    #[must_use]
    pub fn with_aimed(mut self, mode: FireMode) -> Self {
        self.aimed = Some(mode);
        self
    }

    /// Set the blast radius and damage kind.
    #[must_use]
    pub fn with_blast(mut self, radius: i32, kind: DamageKind) -> Self {
        self.blast_radius = radius;
        self.damage_kind = kind;
        self
    }

    /// Set the guided waypoint allowance.
    #[must_use]
    pub fn with_waypoints(mut self, count: usize) -> Self {
        self.max_waypoints = count;
        self
    }

    /// True for weapons that shoot along a straight line.
    #[must_use]
    pub const fn is_ranged(&self) -> bool {
        matches!(self.kind, WeaponKind::Firearm | WeaponKind::GuidedLauncher)
    }

    /// True for area weapons.
    #[must_use]
    pub const fn is_explosive(&self) -> bool {
        self.blast_radius > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tu_cost_resolves() {
        assert_eq!(TuCost::Flat(12).resolve(80), 12);
        assert_eq!(TuCost::Percent(25).resolve(80), 20);
    }

    #[test]
    fn test_special_weapon_defaults() {
        let knife = WeaponRule::special("knife", WeaponKind::Melee, 20, TuCost::Flat(8));
        assert_eq!(knife.max_range, 1);
        assert_eq!(knife.damage_kind, DamageKind::Melee);
        assert!(!knife.is_ranged());

        let grenade = WeaponRule::special("grenade", WeaponKind::Grenade, 50, TuCost::Flat(20))
            .with_blast(3, DamageKind::HighExplosive);
        assert!(grenade.is_explosive());
    }

    #[test]
    fn test_weapon_from_ron() {
        let ron = r#"
            WeaponRule(
                name: "rifle",
                damage: 30,
                snap: Some(FireMode(tu: Percent(25), accuracy: 60)),
                max_range: 30,
            )
        "#;
        let rule: WeaponRule = ron::from_str(ron).unwrap();
        assert_eq!(rule.kind, WeaponKind::Firearm);
        assert_eq!(rule.snap.map(|m| m.shots), Some(1));
        assert!(rule.aimed.is_none());
    }
}
