//! Blast propagation and detonation tests.

use std::collections::HashSet;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tactics_core::data::{DamageKind, Medium, PartSlot};
use tactics_core::explosion::{blast_footprint, cast_ray, detonate_tile, explode, Explosion, ExplosionReport};
use tactics_core::geometry::Position;
use tactics_core::trace::trace_tiles;
use tactics_core::unit::UnitStatus;
use tactics_test_utils::determinism::strategies::{arb_power, arb_seed, arb_tile, arb_walls};
use tactics_test_utils::fixtures::{open_ground, soldier, walled_room};
use tactics_test_utils::proptest::prelude::*;

fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

#[test]
fn test_blast_opens_the_door() {
    let (mut bf, _) = walled_room();
    let door = Position::new(6, 9, 0);
    let blast = Explosion::at_tile(Position::new(9, 9, 0), 100, DamageKind::HighExplosive, 6);

    let report = explode(&mut bf, &blast, &mut rng(1)).unwrap();
    assert!(report
        .destroyed
        .iter()
        .any(|d| d.tile == door && d.slot == PartSlot::WestWall && d.name == "door"));
    assert!(bf.grid.part(door, PartSlot::WestWall).is_none());
    // Solid walls either side hold.
    assert!(bf.grid.part(Position::new(6, 8, 0), PartSlot::WestWall).is_some());
    assert!(bf.grid.part(Position::new(6, 10, 0), PartSlot::WestWall).is_some());
    assert!(trace_tiles(&bf.grid, Position::new(3, 9, 0), Position::new(9, 9, 0), Medium::Sight).reached);
    assert!(!report.smoke.is_empty());
}

#[test]
fn test_barrel_chains_and_burns() {
    let (mut bf, parts) = open_ground(14, 14);
    let barrel = Position::new(7, 5, 0);
    bf.grid.set_part(barrel, PartSlot::Object, Some(parts.barrel)).unwrap();
    let blast = Explosion::at_tile(Position::new(5, 5, 0), 100, DamageKind::HighExplosive, 4);

    let report = explode(&mut bf, &blast, &mut rng(2)).unwrap();
    assert!(report.destroyed.iter().any(|d| d.tile == barrel && d.name == "barrel"));
    assert!(report.secondary.contains(&barrel));
    assert!(report.fires.contains(&barrel));
    assert!(bf.grid.tile(barrel).unwrap().fire > 0);
    assert!(bf.grid.part(barrel, PartSlot::Object).is_none());
}

#[test]
fn test_chained_blast_hits_survivors_again() {
    let (mut bf, parts) = open_ground(14, 14);
    let barrel = Position::new(6, 6, 0);
    bf.grid.set_part(barrel, PartSlot::Object, Some(parts.barrel)).unwrap();
    let mut tough = soldier("tough", Position::new(5, 6, 0));
    tough.health = 1000;
    tough.max_health = 1000;
    let tough = bf.add_unit(tough).unwrap();
    let blast = Explosion::at_tile(Position::new(5, 5, 0), 100, DamageKind::HighExplosive, 4);

    let report = explode(&mut bf, &blast, &mut rng(5)).unwrap();
    assert!(report.secondary.contains(&barrel));
    let hits = report.casualties.iter().filter(|c| c.unit == tough).count();
    assert_eq!(hits, 2);
    assert_eq!(bf.unit(tough).unwrap().status, UnitStatus::Standing);
}

#[test]
fn test_point_blank_blast_kills_and_clears_tile() {
    let (mut bf, _) = open_ground(10, 10);
    let centre = Position::new(4, 4, 0);
    let victim = bf.add_unit(soldier("victim", centre)).unwrap();
    let blast = Explosion::at_tile(centre, 100, DamageKind::HighExplosive, 4).from_unit(victim);

    let report = explode(&mut bf, &blast, &mut rng(3)).unwrap();
    let hit: Vec<_> = report.casualties.iter().filter(|c| c.unit == victim).collect();
    assert_eq!(hit.len(), 1);
    assert_eq!(hit[0].status, UnitStatus::Dead);
    assert_eq!(bf.unit(victim).unwrap().status, UnitStatus::Dead);
    assert_eq!(bf.unit_at(centre), None);
}

#[test]
fn test_second_detonation_does_nothing() {
    let (mut bf, _) = open_ground(10, 10);
    let centre = Position::new(4, 4, 0);
    let blast = Explosion::at_tile(centre, 80, DamageKind::HighExplosive, 3);
    explode(&mut bf, &blast, &mut rng(4)).unwrap();
    assert!(bf.grid.tiles().all(|t| t.explosive() == 0));

    let before = bf.snapshot_bytes().unwrap();
    let mut report = ExplosionReport::default();
    let config = bf.config.explosion.clone();
    let chained = detonate_tile(&mut bf, centre, &config, &mut rng(5), &mut HashSet::new(), &mut report).unwrap();
    assert!(chained.is_empty());
    assert_eq!(report, ExplosionReport::default());
    assert_eq!(bf.snapshot_bytes().unwrap(), before);
}

#[test]
fn test_same_seed_same_blast() {
    let run = |seed| {
        let (mut bf, parts) = walled_room();
        bf.grid.set_part(Position::new(10, 10, 0), PartSlot::Object, Some(parts.barrel)).unwrap();
        let blast = Explosion::at_tile(Position::new(9, 9, 0), 110, DamageKind::HighExplosive, 6);
        let report = explode(&mut bf, &blast, &mut rng(seed)).unwrap();
        (report, bf.snapshot_bytes().unwrap())
    };
    assert_eq!(run(9), run(9));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Along any ray, power never rises from one tile to the next.
    #[test]
    fn prop_ray_power_never_rises(
        walls in arb_walls(16, 16, 40),
        centre in arb_tile(16, 16),
        power in arb_power(),
        radius in 1i32..10,
        azimuth in 0i32..360,
        elevation in -30i32..=30,
        seed in arb_seed(),
    ) {
        let (mut bf, parts) = open_ground(16, 16);
        for (tile, west) in walls {
            let (slot, part) = if west {
                (PartSlot::WestWall, parts.west_wall)
            } else {
                (PartSlot::NorthWall, parts.north_wall)
            };
            bf.grid.set_part(tile, slot, Some(part)).unwrap();
        }
        let blast = Explosion::at_tile(centre, power, DamageKind::HighExplosive, radius);
        let ray = cast_ray(&bf.grid, &bf.config.explosion, &blast, azimuth, elevation, &mut rng(seed));

        prop_assert_eq!(ray.first().copied(), Some((centre, power)));
        for pair in ray.windows(2) {
            prop_assert!(pair[1].1 <= pair[0].1);
        }
    }

    /// On open ground every tile well inside the radius is reached.
    #[test]
    fn prop_blast_covers_its_radius(
        centre in arb_tile(20, 20),
        radius in 2i32..=6,
        seed in arb_seed(),
    ) {
        let (bf, _) = open_ground(20, 20);
        let blast = Explosion::at_tile(centre, 200, DamageKind::HighExplosive, radius);
        let footprint = blast_footprint(&bf.grid, &bf.config.explosion, &blast, &mut rng(seed));
        let inner = (radius - 1) * (radius - 1);
        for y in 0..20 {
            for x in 0..20 {
                let tile = Position::new(x, y, 0);
                if centre.distance_sq_2d(tile) <= inner {
                    let index = bf.grid.index_of(tile).unwrap();
                    prop_assert!(footprint.contains_key(&index), "{} missed by radius {} blast at {}", tile, radius, centre);
                }
            }
        }
    }
}
