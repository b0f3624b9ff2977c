//! ASCII rendering of one battlefield level for quick terminal review.
//!
//! One character per tile, north at the top. Units win over parts, parts
//! over hazards:
//!
//! ```text
//! a-z  player unit      A-Z  hostile unit     ?  neutral unit
//! #    object           %    explosive object
//! |    west wall        -    north wall        +  both
//! D    door             :    window
//! *    fire             ~    smoke             .  floor
//! ```

use std::collections::BTreeSet;

use tactics_core::battlefield::Battlefield;
use tactics_core::data::{DoorKind, MoveCosts, PartSlot, TilePart};
use tactics_core::geometry::Position;
use tactics_core::unit::{Faction, UnitStatus};

/// ASCII visualization configuration.
#[derive(Debug, Clone)]
pub struct AsciiConfig {
    /// Level to draw.
    pub level: i32,
    /// Append a unit list below the map.
    pub show_legend: bool,
    /// Use colored output (ANSI).
    pub use_color: bool,
}

impl Default for AsciiConfig {
    fn default() -> Self {
        Self {
            level: 0,
            show_legend: true,
            use_color: true,
        }
    }
}

/// ANSI color codes.
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const BLUE: &str = "\x1b[34m";
    pub const RED: &str = "\x1b[31m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const WHITE: &str = "\x1b[37m";
    pub const GRAY: &str = "\x1b[90m";
}

fn faction_color(faction: Faction) -> &'static str {
    match faction {
        Faction::Player => colors::BLUE,
        Faction::Hostile => colors::RED,
        Faction::Neutral => colors::WHITE,
    }
}

fn unit_char(name: &str, faction: Faction) -> char {
    let initial = name.chars().next().unwrap_or('u');
    match faction {
        Faction::Player => initial.to_ascii_lowercase(),
        Faction::Hostile => initial.to_ascii_uppercase(),
        Faction::Neutral => '?',
    }
}

fn wall_mark(part: &TilePart, plain: char) -> Option<char> {
    if part.door != DoorKind::None {
        Some('D')
    } else if part.tu == MoveCosts::FREE {
        // Open doorway.
        None
    } else if !part.stop_los {
        Some(':')
    } else {
        Some(plain)
    }
}

fn wall_char(west: Option<&TilePart>, north: Option<&TilePart>) -> Option<char> {
    let west = west.and_then(|p| wall_mark(p, '|'));
    let north = north.and_then(|p| wall_mark(p, '-'));
    match (west, north) {
        (Some('|'), Some('-')) => Some('+'),
        (Some('|'), Some(n)) => Some(n),
        (w, n) => w.or(n),
    }
}

/// Render one level. Tiles outside `visible`, when given, are left blank.
pub fn render_level(bf: &Battlefield, config: &AsciiConfig, visible: Option<&[Position]>) -> String {
    let visible: Option<BTreeSet<Position>> = visible.map(|tiles| tiles.iter().copied().collect());
    let paint = |text: String, color: &str| {
        if config.use_color {
            format!("{color}{text}{}", colors::RESET)
        } else {
            text
        }
    };

    let mut output = String::new();
    output.push_str(&paint(
        format!(
            "Level {} of {}x{}x{} | turn {}\n",
            config.level,
            bf.grid.width(),
            bf.grid.length(),
            bf.grid.height(),
            bf.turn
        ),
        colors::BOLD,
    ));

    for y in 0..bf.grid.length() {
        for x in 0..bf.grid.width() {
            let pos = Position::new(x, y, config.level);
            if visible.as_ref().is_some_and(|seen| !seen.contains(&pos)) {
                output.push(' ');
                continue;
            }
            let Some(tile) = bf.grid.tile(pos) else {
                output.push(' ');
                continue;
            };

            if let Some(unit) = tile.unit.and_then(|id| bf.unit(id)) {
                output.push_str(&paint(unit_char(&unit.name, unit.faction).to_string(), faction_color(unit.faction)));
                continue;
            }
            if let Some(object) = bf.grid.active_part(pos, PartSlot::Object) {
                let ch = if object.explosive > 0 { '%' } else { '#' };
                output.push_str(&paint(ch.to_string(), colors::YELLOW));
                continue;
            }
            let walls = wall_char(
                bf.grid.active_part(pos, PartSlot::WestWall),
                bf.grid.active_part(pos, PartSlot::NorthWall),
            );
            if let Some(ch) = walls {
                output.push_str(&paint(ch.to_string(), colors::WHITE));
            } else if tile.fire > 0 {
                output.push_str(&paint("*".to_string(), colors::RED));
            } else if tile.smoke > 0 {
                output.push_str(&paint("~".to_string(), colors::GRAY));
            } else if bf.grid.part(pos, PartSlot::Floor).is_some() {
                output.push('.');
            } else {
                output.push(' ');
            }
        }
        output.push('\n');
    }

    if config.show_legend {
        for unit in bf.units().iter().filter(|u| u.position.z == config.level) {
            let state = match unit.status {
                UnitStatus::Standing => format!("{}/{} TU, {}/{} HP", unit.tu, unit.max_tu, unit.health, unit.max_health),
                UnitStatus::Unconscious => "unconscious".to_string(),
                UnitStatus::Dead => "dead".to_string(),
            };
            output.push_str(&format!(
                "{} {:<10} {:?} at ({}, {}) {}\n",
                unit_char(&unit.name, unit.faction),
                unit.name,
                unit.faction,
                unit.position.x,
                unit.position.y,
                state
            ));
        }
    }
    output
}
