//! Snapshot assembly and fog filtering.

use skirmish_server::game::engine::GameEngine;
use skirmish_server::game::map::GameMap;
use skirmish_server::game::types::{BuildingKind, Difficulty, Team, UnitKind, Vec2};
use skirmish_server::protocol::ServerMsg;
use uuid::Uuid;

const HOST: Uuid = Uuid::from_u128(1);
const GUEST: Uuid = Uuid::from_u128(2);

fn arena() -> GameEngine {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(HOST, "alice", Team::Host, "blue");
    eng.add_player(GUEST, "bob", Team::Guest, "red");
    eng.spawn_building(HOST, BuildingKind::Base, Vec2::new(400.0, 400.0), true);
    eng.spawn_building(GUEST, BuildingKind::Base, Vec2::new(2000.0, 2000.0), true);
    eng
}

#[test]
fn full_snapshot_contains_everything() {
    let mut eng = arena();
    eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(500.0, 400.0));
    eng.tick();

    let snap = eng.snapshot();
    assert_eq!(snap.buildings.len(), 2);
    assert_eq!(snap.units.len(), 1);
    assert_eq!(snap.players.len(), 2);
    assert!(!snap.game_over);
}

#[test]
fn fog_filters_undiscovered_enemies() {
    let mut eng = arena();
    eng.tick();

    let host_view = eng.snapshot_for(HOST);
    // Own base is always visible; the far enemy base has never been seen.
    assert_eq!(host_view.buildings.len(), 1);
    assert_eq!(host_view.buildings[0].owner, HOST);

    // Both player entries stay visible (scoreboard data, not map state).
    assert_eq!(host_view.players.len(), 2);
}

#[test]
fn enemies_in_discovered_tiles_are_included() {
    let mut eng = arena();
    // A guest soldier walks right next to the host base.
    eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(480.0, 400.0));
    eng.tick();

    let host_view = eng.snapshot_for(HOST);
    assert!(
        host_view.units.iter().any(|u| u.owner == GUEST),
        "enemy inside host vision must appear in the snapshot"
    );
}

#[test]
fn snapshot_ticks_are_monotonic() {
    let mut eng = arena();
    let mut last = 0;
    for _ in 0..50 {
        eng.tick();
        let snap = eng.snapshot_for(HOST);
        assert!(snap.tick >= last);
        last = snap.tick;
    }
}

#[test]
fn snapshot_serializes_with_a_type_tag() {
    let mut eng = arena();
    eng.tick();
    let msg = ServerMsg::Snapshot {
        snapshot: eng.snapshot(),
    };
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["type"], "snapshot");
    assert!(json["tick"].is_u64());
    assert!(json["units"].is_array());
    assert!(json["players"].is_object());
}
