//! Seeded map generation: parity, spawn safety, resource ranges.

use skirmish_server::game::map::{self, MapError, TileKind};
use skirmish_server::game::types::ResourceKind;

const W: u32 = 60;
const H: u32 = 60;
const TILE: f32 = 40.0;

#[test]
fn identical_seeds_yield_identical_maps() {
    let (map_a, nodes_a) = map::generate(W, H, TILE, 424242).unwrap();
    let (map_b, nodes_b) = map::generate(W, H, TILE, 424242).unwrap();

    assert_eq!(
        serde_json::to_value(&map_a).unwrap(),
        serde_json::to_value(&map_b).unwrap()
    );
    assert_eq!(nodes_a, nodes_b);
}

#[test]
fn different_seeds_differ() {
    let (map_a, _) = map::generate(W, H, TILE, 1).unwrap();
    let (map_b, _) = map::generate(W, H, TILE, 2).unwrap();
    assert_ne!(
        serde_json::to_value(&map_a).unwrap(),
        serde_json::to_value(&map_b).unwrap()
    );
}

#[test]
fn zero_seed_is_rejected() {
    assert_eq!(
        map::generate(W, H, TILE, 0).unwrap_err(),
        MapError::BadSeed
    );
}

#[test]
fn spawn_squares_are_grass() {
    let (map, _) = map::generate(W, H, TILE, 424242).unwrap();
    for (cx, cy) in [(9u32, 9u32), (51, 51)] {
        for dy in -3i64..=3 {
            for dx in -3i64..=3 {
                let tx = (cx as i64 + dx) as u32;
                let ty = (cy as i64 + dy) as u32;
                assert_eq!(
                    map.tile(tx, ty),
                    Some(TileKind::Grass),
                    "tile ({tx},{ty}) inside a spawn square must be grass"
                );
            }
        }
    }
}

#[test]
fn resource_amounts_are_in_range() {
    let (_, nodes) = map::generate(W, H, TILE, 99).unwrap();
    assert!(!nodes.is_empty());
    for node in nodes {
        match node.kind {
            ResourceKind::Gold => {
                assert!((1500.0..=3000.0).contains(&node.amount), "{}", node.amount)
            }
            ResourceKind::Wood => {
                assert!((800.0..=1500.0).contains(&node.amount), "{}", node.amount)
            }
        }
    }
}

#[test]
fn water_and_mountain_are_impassable() {
    assert!(!TileKind::Water.is_passable());
    assert!(!TileKind::Mountain.is_passable());
    assert!(TileKind::Grass.is_passable());
    assert!(TileKind::Forest.is_passable());
}
