//! Ray-cast blast propagation and detonation.
//!
//! An explosion fans rays out from its centre across the whole sphere. The
//! angular step shrinks with the blast radius so the gaps between
//! neighbouring rays never open wider than a tile. Each ray walks in
//! quarter-tile increments and, on entering a new tile, pays the per-tile
//! falloff, a random extra loss on diagonal steps and the blockage of
//! whatever it crossed. Every tile keeps the strongest power any ray
//! delivered.
//!
//! Detonation then applies each tile's power exactly once: to the unit
//! standing there, to the parts of the tile and the walls and floor that
//! border it, and as fire or smoke. Parts carrying their own charge go off
//! as secondary explosions once the wave is done.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::battlefield::{Battlefield, UnitFell};
use crate::blockage::{step_blockage, Blockage};
use crate::config::ExplosionConfig;
use crate::data::{DamageKind, Medium, PartSlot};
use crate::error::{Result, TacticsError};
use crate::geometry::{fixed_cos_deg, fixed_sin_deg, Direction, Fixed, Position, VOXEL_X, VOXEL_Y, VOXEL_Z};
use crate::grid::TileGrid;
use crate::unit::{UnitId, UnitStatus};

/// Quarter-tile sampling along a ray.
const SAMPLES_PER_TILE: i32 = 4;

/// Upper bound on chained explosions set off by one blast.
const MAX_CHAIN: usize = 64;

/// Largest radius given to a secondary explosion.
const MAX_SECONDARY_RADIUS: i32 = 12;

/// One blast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explosion {
    /// Voxel the blast is centred on.
    pub center: Position,
    /// Power at the centre.
    pub power: u32,
    /// Damage kind.
    pub kind: DamageKind,
    /// Reach in tiles.
    pub radius: i32,
    /// Unit responsible, if any.
    pub source: Option<UnitId>,
}

impl Explosion {
    /// Blast centred on a voxel.
    #[must_use]
    pub const fn new(center: Position, power: u32, kind: DamageKind, radius: i32) -> Self {
        Self {
            center,
            power,
            kind,
            radius,
            source: None,
        }
    }

    /// Blast centred in a tile, a little above its floor.
    #[must_use]
    pub const fn at_tile(tile: Position, power: u32, kind: DamageKind, radius: i32) -> Self {
        Self::new(tile.tile_center_voxel(VOXEL_Z / 2), power, kind, radius)
    }

    /// Attribute the blast to a unit.
    #[must_use]
    pub const fn from_unit(mut self, unit: UnitId) -> Self {
        self.source = Some(unit);
        self
    }
}

/// A part removed by a blast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyedPart {
    /// Tile that held it.
    pub tile: Position,
    /// Slot it occupied.
    pub slot: PartSlot,
    /// Its name.
    pub name: String,
}

/// A unit hurt by a blast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Casualty {
    /// The unit.
    pub unit: UnitId,
    /// Damage taken (health, or stun for stun blasts).
    pub damage: u32,
    /// State afterwards.
    pub status: UnitStatus,
}

/// Everything a blast changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionReport {
    /// Tiles reached, with the power delivered, in grid order per wave.
    pub tiles: Vec<(Position, u32)>,
    /// Parts destroyed.
    pub destroyed: Vec<DestroyedPart>,
    /// Units damaged.
    pub casualties: Vec<Casualty>,
    /// Tiles set burning.
    pub fires: Vec<Position>,
    /// Tiles filled with smoke.
    pub smoke: Vec<Position>,
    /// Centres of chained explosions.
    pub secondary: Vec<Position>,
    /// Units that fell when their support went.
    pub falls: Vec<UnitFell>,
}

/// Azimuth and elevation step in degrees for a blast radius.
#[must_use]
pub const fn angular_steps(radius: i32) -> (i32, i32) {
    let r = if radius < 1 { 1 } else { radius };
    (clamp(50 / r, 1, 3), clamp(75 / r, 1, 5))
}

const fn clamp(value: i32, low: i32, high: i32) -> i32 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

/// Tile containing a point given in tile units.
fn tile_of(x: Fixed, y: Fixed, z: Fixed) -> Position {
    Position::new(x.floor().to_num(), y.floor().to_num(), z.floor().to_num())
}

/// Walk one ray and return the tiles it entered with the power left on
/// entry. The centre tile comes first with the full power.
pub fn cast_ray<R: Rng + ?Sized>(
    grid: &TileGrid,
    config: &ExplosionConfig,
    explosion: &Explosion,
    azimuth: i32,
    elevation: i32,
    rng: &mut R,
) -> Vec<(Position, u32)> {
    let medium = explosion.kind.profile().medium.unwrap_or(Medium::Explosive);
    let ox = Fixed::from_num(explosion.center.x) / Fixed::from_num(VOXEL_X);
    let oy = Fixed::from_num(explosion.center.y) / Fixed::from_num(VOXEL_Y);
    let oz = Fixed::from_num(explosion.center.z) / Fixed::from_num(VOXEL_Z);
    let flat = fixed_cos_deg(elevation);
    let dx = flat * fixed_cos_deg(azimuth);
    let dy = flat * fixed_sin_deg(azimuth);
    let dz = fixed_sin_deg(elevation);

    let mut previous = tile_of(ox, oy, oz);
    if !grid.in_bounds(previous) {
        return Vec::new();
    }
    let mut power = explosion.power;
    let mut reached = vec![(previous, power)];

    for sample in 1..=explosion.radius * SAMPLES_PER_TILE {
        let distance = Fixed::from_num(sample) / Fixed::from_num(SAMPLES_PER_TILE);
        let tile = tile_of(ox + dx * distance, oy + dy * distance, oz + dz * distance);
        if tile == previous {
            continue;
        }
        if !grid.in_bounds(tile) {
            break;
        }

        power = power.saturating_sub(config.falloff_per_tile);
        if tile.x != previous.x && tile.y != previous.y && config.diagonal_loss_percent > 0 {
            let loss = rng.gen_range(0..=config.diagonal_loss_percent);
            power = power.saturating_sub(power * loss / 100);
        }
        match step_blockage(grid, previous, tile, medium) {
            Blockage::Hard => break,
            Blockage::Soft(block) => power = power.saturating_sub(block.min(config.max_blockage)),
        }
        if power < config.min_power.max(1) {
            break;
        }
        reached.push((tile, power));
        previous = tile;
    }
    reached
}

/// Strongest power every tile receives from a blast, by grid index.
pub fn blast_footprint<R: Rng + ?Sized>(
    grid: &TileGrid,
    config: &ExplosionConfig,
    explosion: &Explosion,
    rng: &mut R,
) -> BTreeMap<usize, u32> {
    let mut best: BTreeMap<usize, u32> = BTreeMap::new();
    if explosion.power == 0 {
        return best;
    }
    let (azimuth_step, elevation_step) = angular_steps(explosion.radius);
    let mut elevation = -90;
    while elevation <= 90 {
        let mut azimuth = 0;
        while azimuth < 360 {
            for (tile, power) in cast_ray(grid, config, explosion, azimuth, elevation, rng) {
                if let Some(index) = grid.index_of(tile) {
                    let entry = best.entry(index).or_insert(0);
                    *entry = (*entry).max(power);
                }
            }
            azimuth += azimuth_step;
        }
        elevation += elevation_step;
    }
    best
}

/// Detonate a blast: propagate it, apply its effects, set off chained
/// blasts, and drop anything left without support.
///
/// # Errors
///
/// Returns an error if a destroyed part names a replacement that does not
/// fit its slot.
pub fn explode<R: Rng + ?Sized>(
    bf: &mut Battlefield,
    explosion: &Explosion,
    rng: &mut R,
) -> Result<ExplosionReport> {
    let mut report = ExplosionReport::default();
    let mut queue = vec![explosion.clone()];
    let mut fired = 0;

    while let Some(blast) = queue.pop() {
        fired += 1;
        if fired > MAX_CHAIN {
            debug!("Chain limit reached, {} blasts dropped", queue.len() + 1);
            break;
        }
        let config = bf.config.explosion.clone();
        // A unit takes one hit per blast, but a chained blast hits it again.
        let mut hit_units = HashSet::new();
        let footprint = blast_footprint(&bf.grid, &config, &blast, rng);
        for (&index, &power) in &footprint {
            let pos = bf.grid.position_of(index);
            if let Some(tile) = bf.grid.tile_mut(pos) {
                tile.add_explosive(power, blast.kind);
            }
        }
        for &index in footprint.keys() {
            let pos = bf.grid.position_of(index);
            let chained = detonate_tile(bf, pos, &config, rng, &mut hit_units, &mut report)?;
            queue.extend(chained);
        }
        debug!(
            "Blast at {} power {} reached {} tiles",
            blast.center.to_tile(),
            blast.power,
            footprint.len()
        );
    }

    report.falls = bf.apply_gravity();
    info!(
        "Explosion at {}: {} tiles, {} parts destroyed, {} casualties, {} chained",
        explosion.center.to_tile(),
        report.tiles.len(),
        report.destroyed.len(),
        report.casualties.len(),
        report.secondary.len()
    );
    Ok(report)
}

/// Apply the power accumulated in one tile and clear it.
///
/// A tile with nothing accumulated is left alone, so detonating twice in a
/// pass has no further effect. Returns the chained blasts released by
/// destroyed parts.
///
/// # Errors
///
/// Returns an error if a destroyed part's replacement does not fit its slot.
pub fn detonate_tile<R: Rng + ?Sized>(
    bf: &mut Battlefield,
    pos: Position,
    config: &ExplosionConfig,
    rng: &mut R,
    hit_units: &mut HashSet<UnitId>,
    report: &mut ExplosionReport,
) -> Result<Vec<Explosion>> {
    let tile = bf.grid.tile_checked_mut(pos)?;
    let power = tile.explosive();
    let kind = tile.explosive_kind();
    if power == 0 {
        return Ok(Vec::new());
    }
    tile.clear_explosive();
    report.tiles.push((pos, power));
    let profile = kind.profile();

    if let Some(id) = bf.unit_at(pos) {
        if hit_units.insert(id) && profile.unit_max_percent > 0 {
            damage_unit(bf, id, power, kind, rng, report)?;
        }
    }

    let mut chained = Vec::new();
    if profile.terrain_percent > 0 {
        let terrain_power = power * profile.terrain_percent / 100;
        let targets = [
            (pos, PartSlot::Object),
            (pos, PartSlot::WestWall),
            (pos, PartSlot::NorthWall),
            (pos.step(Direction::East), PartSlot::WestWall),
            (pos.step(Direction::South), PartSlot::NorthWall),
            (pos.step(Direction::Up), PartSlot::Floor),
        ];
        for (tile, slot) in targets {
            damage_part(bf, tile, slot, terrain_power, config, report, &mut chained)?;
        }
        // The floor is shielded by whatever still stands on it.
        if bf.grid.part(pos, PartSlot::Object).is_none() {
            damage_part(bf, pos, PartSlot::Floor, terrain_power, config, report, &mut chained)?;
        }
    }

    if profile.ignites {
        ignite(bf, pos, config, report);
    }
    if profile.smokes && config.smoke_divisor > 0 {
        let density = u8::try_from(power / config.smoke_divisor)
            .unwrap_or(u8::MAX)
            .min(config.max_smoke);
        if density > 0 {
            if let Some(tile) = bf.grid.tile_mut(pos) {
                tile.smoke = tile.smoke.max(density);
                report.smoke.push(pos);
            }
        }
    }
    Ok(chained)
}

fn damage_unit<R: Rng + ?Sized>(
    bf: &mut Battlefield,
    id: UnitId,
    power: u32,
    kind: DamageKind,
    rng: &mut R,
    report: &mut ExplosionReport,
) -> Result<()> {
    let profile = kind.profile();
    let percent = rng.gen_range(profile.unit_min_percent..=profile.unit_max_percent);
    let raw = power * percent / 100;
    let burn = if profile.ignites { rng.gen_range(1..=4) } else { 0 };

    let unit = bf.unit_mut(id).ok_or(TacticsError::UnknownUnit(id))?;
    let damage = if profile.stuns {
        unit.stun = unit.stun.saturating_add(raw);
        raw
    } else {
        let damage = raw.saturating_sub(unit.armor);
        unit.health = unit.health.saturating_sub(damage);
        damage
    };
    unit.on_fire = unit.on_fire.max(burn);
    let status = if unit.health == 0 {
        UnitStatus::Dead
    } else if unit.stun >= unit.health {
        UnitStatus::Unconscious
    } else {
        unit.status
    };
    let changed = status != unit.status;
    report.casualties.push(Casualty {
        unit: id,
        damage,
        status,
    });
    if changed {
        bf.set_status(id, status)?;
        debug!("Unit {} is now {:?}", id, status);
    }
    Ok(())
}

fn damage_part(
    bf: &mut Battlefield,
    tile: Position,
    slot: PartSlot,
    terrain_power: u32,
    config: &ExplosionConfig,
    report: &mut ExplosionReport,
    chained: &mut Vec<Explosion>,
) -> Result<()> {
    let Some(part) = bf.grid.part(tile, slot) else {
        return Ok(());
    };
    if terrain_power == 0 || part.armor >= 255 || terrain_power < part.armor {
        return Ok(());
    }
    let name = part.name.clone();
    let variant = part.destroyed_variant;
    let (charge, charge_kind) = (part.explosive, part.explosive_kind);
    let fuel = part.fuel;

    bf.grid.set_part(tile, slot, variant)?;
    debug!("Destroyed {} ({}) at {}", name, slot, tile);
    report.destroyed.push(DestroyedPart { tile, slot, name });

    if charge > 0 {
        let radius = i32::try_from(charge / config.falloff_per_tile.max(1))
            .unwrap_or(MAX_SECONDARY_RADIUS)
            .clamp(1, MAX_SECONDARY_RADIUS);
        report.secondary.push(tile);
        chained.push(Explosion::at_tile(tile, charge, charge_kind, radius));
    }
    if fuel > 0 {
        if let Some(t) = bf.grid.tile_mut(tile) {
            t.fire = t.fire.max(fuel.min(config.max_fire));
            report.fires.push(tile);
        }
    }
    Ok(())
}

/// Set a tile burning, for as long as its most flammable part can feed it.
fn ignite(bf: &mut Battlefield, pos: Position, config: &ExplosionConfig, report: &mut ExplosionReport) {
    let fuel = PartSlot::ALL
        .iter()
        .filter_map(|&slot| bf.grid.part(pos, slot))
        .filter(|part| part.flammable < 255)
        .map(|part| part.fuel)
        .max()
        .unwrap_or(0)
        .max(1)
        .min(config.max_fire);
    if let Some(tile) = bf.grid.tile_mut(pos) {
        tile.fire = tile.fire.max(fuel);
        report.fires.push(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TacticsConfig;
    use crate::data::{BlockValues, LoftLibrary, PartLibrary, TilePart};
    use crate::unit::{Faction, Unit};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    /// A 12×12 field with a weak wall on the west edge of (6,5).
    fn walled_field() -> Battlefield {
        let mut lib = PartLibrary::new();
        let wall = lib.add(
            TilePart::wall("fence", PartSlot::WestWall)
                .with_armor(40)
                .with_block(BlockValues {
                    explosive: 50,
                    ..BlockValues::FULL
                }),
        );
        let mut grid = TileGrid::new(12, 12, 1, lib, LoftLibrary::stock()).unwrap();
        grid.set_part(Position::new(6, 5, 0), PartSlot::WestWall, Some(wall)).unwrap();
        Battlefield::new(grid, TacticsConfig::default())
    }

    #[test]
    fn test_angular_steps() {
        assert_eq!(angular_steps(1), (3, 5));
        assert_eq!(angular_steps(25), (2, 3));
        assert_eq!(angular_steps(100), (1, 1));
        assert_eq!(angular_steps(0), (3, 5));
    }

    #[test]
    fn test_ray_power_only_falls() {
        let bf = walled_field();
        let blast = Explosion::at_tile(Position::new(2, 2, 0), 200, DamageKind::HighExplosive, 8);
        let ray = cast_ray(&bf.grid, &bf.config.explosion, &blast, 45, 0, &mut rng());
        assert_eq!(ray[0], (Position::new(2, 2, 0), 200));
        assert!(ray.len() > 4);
        for pair in ray.windows(2) {
            assert!(pair[1].1 < pair[0].1);
        }
    }

    #[test]
    fn test_wall_absorbs_then_falls() {
        let mut bf = walled_field();
        let blast = Explosion::at_tile(Position::new(5, 5, 0), 100, DamageKind::HighExplosive, 6);
        let footprint = blast_footprint(&bf.grid, &bf.config.explosion, &blast, &mut rng());
        let at = |x, y| footprint.get(&bf.grid.index_of(Position::new(x, y, 0)).unwrap()).copied();
        assert_eq!(at(5, 5), Some(100));
        assert_eq!(at(4, 5), Some(90));
        assert_eq!(at(6, 5), Some(40));

        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        assert!(report.destroyed.iter().any(|d| d.tile == Position::new(6, 5, 0) && d.slot == PartSlot::WestWall));
        assert!(bf.grid.part(Position::new(6, 5, 0), PartSlot::WestWall).is_none());
        // Accumulators are spent.
        assert!(bf.grid.tiles().all(|t| t.explosive() == 0));
    }

    #[test]
    fn test_exempt_kinds_leave_terrain() {
        let mut bf = walled_field();
        let blast = Explosion::at_tile(Position::new(5, 5, 0), 100, DamageKind::Incendiary, 4);
        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        assert!(report.destroyed.is_empty());
        assert!(bf.grid.part(Position::new(6, 5, 0), PartSlot::WestWall).is_some());
        assert!(report.fires.contains(&Position::new(5, 5, 0)));
        assert!(bf.grid.tile(Position::new(5, 5, 0)).unwrap().fire > 0);
    }

    #[test]
    fn test_units_hit_once_per_blast() {
        let mut bf = walled_field();
        let mut tank = Unit::new("tank", Faction::Player, Position::new(2, 2, 0)).large();
        tank.health = 200;
        tank.max_health = 200;
        let big = bf.add_unit(tank).unwrap();
        let blast = Explosion::at_tile(Position::new(3, 3, 0), 60, DamageKind::HighExplosive, 4);
        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        let hits: Vec<_> = report.casualties.iter().filter(|c| c.unit == big).collect();
        assert_eq!(hits.len(), 1);
        let unit = bf.unit(big).unwrap();
        assert_eq!(unit.max_health - unit.health, hits[0].damage);
        // 150% of the strongest tile, less armor.
        assert!(hits[0].damage <= 60 * 150 / 100 - unit.armor);
    }

    #[test]
    fn test_stun_blast_spares_health() {
        let mut bf = walled_field();
        let id = bf.add_unit(Unit::new("guard", Faction::Hostile, Position::new(8, 8, 0))).unwrap();
        let blast = Explosion::at_tile(Position::new(8, 8, 0), 100, DamageKind::Stun, 3);
        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        let unit = bf.unit(id).unwrap();
        assert_eq!(unit.health, unit.max_health);
        assert!(unit.stun >= 50);
        assert_eq!(unit.status, UnitStatus::Unconscious);
        assert_eq!(report.casualties[0].status, UnitStatus::Unconscious);
        assert_eq!(bf.unit_at(Position::new(8, 8, 0)), None);
    }

    #[test]
    fn test_secondary_explosion_and_smoke() {
        let mut lib = PartLibrary::new();
        let barrel = lib.add(TilePart::object("barrel", 6).with_explosive(80, DamageKind::HighExplosive));
        let mut grid = TileGrid::new(12, 12, 1, lib, LoftLibrary::stock()).unwrap();
        grid.set_part(Position::new(6, 6, 0), PartSlot::Object, Some(barrel)).unwrap();
        let mut bf = Battlefield::new(grid, TacticsConfig::default());

        let blast = Explosion::at_tile(Position::new(5, 6, 0), 120, DamageKind::HighExplosive, 5);
        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        assert_eq!(report.secondary, vec![Position::new(6, 6, 0)]);
        assert!(bf.grid.part(Position::new(6, 6, 0), PartSlot::Object).is_none());
        assert!(bf.grid.tile(Position::new(5, 6, 0)).unwrap().smoke > 0);
    }

    #[test]
    fn test_blown_floor_drops_unit() {
        let mut lib = PartLibrary::new();
        let floor = lib.add(TilePart::floor("planks"));
        let mut grid = TileGrid::new(8, 8, 2, lib, LoftLibrary::stock()).unwrap();
        grid.fill(Position::new(0, 0, 1), Position::new(7, 7, 1), floor).unwrap();
        let mut bf = Battlefield::new(grid, TacticsConfig::default());
        let mut sniper = Unit::new("sniper", Faction::Player, Position::new(4, 4, 1));
        sniper.armor = 500;
        let id = bf.add_unit(sniper).unwrap();

        let blast = Explosion::at_tile(Position::new(4, 4, 0), 100, DamageKind::HighExplosive, 3);
        let report = explode(&mut bf, &blast, &mut rng()).unwrap();
        assert!(report.destroyed.iter().any(|d| d.tile == Position::new(4, 4, 1)));
        assert_eq!(report.falls.len(), 1);
        assert_eq!(bf.unit(id).unwrap().position, Position::new(4, 4, 0));
    }

    #[test]
    fn test_detonation_is_idempotent() {
        let mut bf = walled_field();
        let config = bf.config.explosion.clone();
        let pos = Position::new(1, 1, 0);
        bf.grid.tile_mut(pos).unwrap().add_explosive(30, DamageKind::HighExplosive);
        let mut hit = HashSet::new();
        let mut report = ExplosionReport::default();
        detonate_tile(&mut bf, pos, &config, &mut rng(), &mut hit, &mut report).unwrap();
        detonate_tile(&mut bf, pos, &config, &mut rng(), &mut hit, &mut report).unwrap();
        assert_eq!(report.tiles, vec![(pos, 30)]);
    }
}
