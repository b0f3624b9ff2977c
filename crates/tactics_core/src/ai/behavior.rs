//! Per-unit AI state that survives between think cycles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::BattleAction;
use crate::unit::UnitId;
use crate::waypoint::NodeId;

/// The four behaviour modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiMode {
    /// Walk the waypoint graph.
    #[default]
    Patrol,
    /// Engage a target.
    Combat,
    /// Lie in wait along the target's approach.
    Ambush,
    /// Get away from threats.
    Escape,
}

impl AiMode {
    /// Order in which a mode with nothing to offer hands over to the next.
    pub const FALLBACK_ORDER: [Self; 4] = [Self::Patrol, Self::Combat, Self::Ambush, Self::Escape];

    /// Every mode, starting with `self` and continuing round the fallback order.
    #[must_use]
    pub fn fallback_chain(self) -> [Self; 4] {
        let start = Self::FALLBACK_ORDER
            .iter()
            .position(|&m| m == self)
            .unwrap_or(0);
        std::array::from_fn(|i| Self::FALLBACK_ORDER[(start + i) % 4])
    }
}

impl fmt::Display for AiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Patrol => "patrol",
            Self::Combat => "combat",
            Self::Ambush => "ambush",
            Self::Escape => "escape",
        };
        f.write_str(name)
    }
}

/// Weights of the mode draw, in hundredths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeOdds {
    /// Patrol weight.
    pub patrol: u32,
    /// Combat weight.
    pub combat: u32,
    /// Ambush weight.
    pub ambush: u32,
    /// Escape weight.
    pub escape: u32,
}

impl ModeOdds {
    /// Weight of one mode.
    #[must_use]
    pub const fn get(&self, mode: AiMode) -> u32 {
        match mode {
            AiMode::Patrol => self.patrol,
            AiMode::Combat => self.combat,
            AiMode::Ambush => self.ambush,
            AiMode::Escape => self.escape,
        }
    }

    /// Mutable weight of one mode.
    pub fn get_mut(&mut self, mode: AiMode) -> &mut u32 {
        match mode {
            AiMode::Patrol => &mut self.patrol,
            AiMode::Combat => &mut self.combat,
            AiMode::Ambush => &mut self.ambush,
            AiMode::Escape => &mut self.escape,
        }
    }

    /// Scale one mode's weight by a percentage.
    pub fn scale(&mut self, mode: AiMode, percent: u32) {
        let odds = self.get_mut(mode);
        *odds = *odds * percent / 100;
    }

    /// Sum of all weights.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.patrol + self.combat + self.ambush + self.escape
    }

    /// Mode selected by a roll in `0..total()`.
    #[must_use]
    pub fn pick(&self, roll: u32) -> AiMode {
        let mut threshold = 0;
        for mode in AiMode::FALLBACK_ORDER {
            threshold += self.get(mode);
            if roll < threshold {
                return mode;
            }
        }
        AiMode::Patrol
    }
}

/// The action each mode proposed on the last cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCandidates {
    /// Patrol proposal.
    pub patrol: Option<BattleAction>,
    /// Combat proposal.
    pub combat: Option<BattleAction>,
    /// Ambush proposal.
    pub ambush: Option<BattleAction>,
    /// Escape proposal.
    pub escape: Option<BattleAction>,
}

impl ModeCandidates {
    /// Proposal of one mode.
    #[must_use]
    pub const fn get(&self, mode: AiMode) -> Option<&BattleAction> {
        match mode {
            AiMode::Patrol => self.patrol.as_ref(),
            AiMode::Combat => self.combat.as_ref(),
            AiMode::Ambush => self.ambush.as_ref(),
            AiMode::Escape => self.escape.as_ref(),
        }
    }
}

/// What the unit knows about its situation, rebuilt every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    /// Carries a loaded firearm.
    pub has_ranged: bool,
    /// Carries a melee weapon.
    pub has_melee: bool,
    /// Carries a loaded guided launcher.
    pub has_guided: bool,
    /// Carries a grenade.
    pub has_grenade: bool,
    /// Has psionic skill and an amplifier.
    pub has_psi: bool,
    /// Hostiles seen right now.
    pub visible_hostiles: u32,
    /// Hostiles seen recently enough to be remembered.
    pub exposed_hostiles: u32,
    /// Hostiles that can see this unit's tile.
    pub spotters: u32,
    /// Distance to the nearest visible hostile.
    pub closest_hostile: Option<i32>,
}

impl Situation {
    /// Whether the unit has any means of attack.
    #[must_use]
    pub const fn armed(&self) -> bool {
        self.has_ranged || self.has_melee || self.has_guided || self.has_grenade || self.has_psi
    }
}

/// Behaviour record owned by an AI-controlled unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBehavior {
    /// Mode chosen on the last cycle.
    pub mode: AiMode,
    /// Current target.
    pub target: Option<UnitId>,
    /// Closing in to strike in melee.
    pub charging: bool,
    /// Picks scout-only patrol nodes.
    pub scout: bool,
    /// Patrol node the unit last reached.
    pub from_node: Option<NodeId>,
    /// Patrol node the unit is heading for.
    pub to_node: Option<NodeId>,
    /// Patrol nodes already reached, oldest first.
    pub visited_nodes: Vec<NodeId>,
    /// Scan results from the last cycle.
    pub situation: Situation,
    /// Proposals from the last cycle.
    pub candidates: ModeCandidates,
    /// Odds used by the last draw.
    pub odds: ModeOdds,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_chain_wraps() {
        assert_eq!(
            AiMode::Ambush.fallback_chain(),
            [AiMode::Ambush, AiMode::Escape, AiMode::Patrol, AiMode::Combat]
        );
        assert_eq!(AiMode::Patrol.fallback_chain(), AiMode::FALLBACK_ORDER);
    }

    #[test]
    fn test_pick_walks_cumulative_weights() {
        let odds = ModeOdds {
            patrol: 10,
            combat: 0,
            ambush: 5,
            escape: 5,
        };
        assert_eq!(odds.total(), 20);
        assert_eq!(odds.pick(0), AiMode::Patrol);
        assert_eq!(odds.pick(9), AiMode::Patrol);
        assert_eq!(odds.pick(10), AiMode::Ambush);
        assert_eq!(odds.pick(19), AiMode::Escape);
    }

    #[test]
    fn test_scale() {
        let mut odds = ModeOdds {
            escape: 1300,
            ..ModeOdds::default()
        };
        odds.scale(AiMode::Escape, 170);
        assert_eq!(odds.escape, 2210);
    }
}
