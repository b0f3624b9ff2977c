//! The value passed from the AI to whoever carries actions out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Direction, Position};
use crate::unit::UnitId;

/// What a unit intends to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Do nothing this cycle.
    #[default]
    Think,
    /// Move to the target tile.
    Walk,
    /// Quick shot.
    SnapShot,
    /// Burst.
    AutoShot,
    /// Careful shot.
    AimedShot,
    /// Lob a grenade onto the target tile.
    Throw,
    /// Strike an adjacent unit.
    Melee,
    /// Fire a guided projectile along the waypoints.
    Launch,
    /// Psionic attack that breaks morale.
    Panic,
    /// Psionic attack that takes control.
    MindControl,
}

impl ActionKind {
    /// Whether the action attacks something.
    #[must_use]
    pub const fn is_attack(self) -> bool {
        !matches!(self, Self::Think | Self::Walk)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Think => "think",
            Self::Walk => "walk",
            Self::SnapShot => "snap shot",
            Self::AutoShot => "auto shot",
            Self::AimedShot => "aimed shot",
            Self::Throw => "throw",
            Self::Melee => "melee",
            Self::Launch => "launch",
            Self::Panic => "panic",
            Self::MindControl => "mind control",
        };
        f.write_str(name)
    }
}

/// Why an action cannot be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionFailure {
    /// Not enough time units left.
    NotEnoughTu,
    /// Nothing can reach the target from here.
    NoLineOfFire,
    /// Target is beyond the weapon's reach.
    OutOfRange,
    /// Weapon is empty.
    NoAmmo,
    /// No route to the target tile.
    NoPath,
    /// Nothing to act on.
    NoTarget,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NotEnoughTu => "not enough time units",
            Self::NoLineOfFire => "no line of fire",
            Self::OutOfRange => "out of range",
            Self::NoAmmo => "no ammunition",
            Self::NoPath => "no path",
            Self::NoTarget => "no target",
        };
        f.write_str(message)
    }
}

/// One decided action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleAction {
    /// Acting unit.
    pub actor: UnitId,
    /// What to do.
    pub kind: ActionKind,
    /// Tile acted on.
    pub target: Position,
    /// Index into the actor's weapons.
    pub weapon: Option<usize>,
    /// TU the action costs.
    pub tu: u32,
    /// Intermediate points for guided projectiles.
    #[serde(default)]
    pub waypoints: Vec<Position>,
    /// Facing to turn to once done.
    #[serde(default)]
    pub final_facing: Option<Direction>,
    /// Filled in by the executor when the action fails.
    #[serde(default)]
    pub result: Option<ActionFailure>,
}

impl BattleAction {
    /// A no-op for `actor`.
    #[must_use]
    pub const fn think(actor: UnitId, at: Position) -> Self {
        Self::new(actor, ActionKind::Think, at, 0)
    }

    /// A bare action with no weapon or waypoints.
    #[must_use]
    pub const fn new(actor: UnitId, kind: ActionKind, target: Position, tu: u32) -> Self {
        Self {
            actor,
            kind,
            target,
            weapon: None,
            tu,
            waypoints: Vec::new(),
            final_facing: None,
            result: None,
        }
    }

    /// Attach the weapon used.
    #[must_use]
    pub fn with_weapon(mut self, index: usize) -> Self {
        self.weapon = Some(index);
        self
    }

    /// Attach a facing to end on.
    #[must_use]
    pub fn facing(mut self, direction: Option<Direction>) -> Self {
        self.final_facing = direction;
        self
    }

    /// True for the no-op.
    #[must_use]
    pub const fn is_think(&self) -> bool {
        matches!(self.kind, ActionKind::Think)
    }

    /// Check the action against what the actor can still afford, filling
    /// in `result` on failure.
    pub fn check_tu(&mut self, available: u32) -> bool {
        if self.tu > available {
            self.result = Some(ActionFailure::NotEnoughTu);
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_is_free_noop() {
        let action = BattleAction::think(3, Position::new(1, 2, 0));
        assert!(action.is_think());
        assert_eq!(action.tu, 0);
        assert!(!action.kind.is_attack());
    }

    #[test]
    fn test_check_tu_sets_result() {
        let mut action = BattleAction::new(0, ActionKind::SnapShot, Position::ZERO, 12).with_weapon(0);
        assert!(action.check_tu(20));
        assert_eq!(action.result, None);
        assert!(!action.check_tu(8));
        assert_eq!(action.result, Some(ActionFailure::NotEnoughTu));
        assert_eq!(action.result.unwrap().to_string(), "not enough time units");
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ActionKind::SnapShot.to_string(), "snap shot");
        assert!(ActionKind::MindControl.is_attack());
    }
}
