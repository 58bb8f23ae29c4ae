//! Elimination, forfeit and draw detection.

use skirmish_server::game::engine::GameEngine;
use skirmish_server::game::map::GameMap;
use skirmish_server::game::types::{BuildingKind, Difficulty, Team, Vec2};
use uuid::Uuid;

const HOST: Uuid = Uuid::from_u128(1);
const GUEST: Uuid = Uuid::from_u128(2);

fn match_engine() -> (GameEngine, String, String) {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(HOST, "alice", Team::Host, "blue");
    eng.add_player(GUEST, "bob", Team::Guest, "red");
    let host_base = eng.spawn_building(HOST, BuildingKind::Base, Vec2::new(400.0, 400.0), true);
    let guest_base = eng.spawn_building(GUEST, BuildingKind::Base, Vec2::new(2000.0, 2000.0), true);
    (eng, host_base, guest_base)
}

#[test]
fn destroying_the_last_base_ends_the_match() {
    let (mut eng, host_base, _) = match_engine();
    eng.tick();
    assert!(!eng.state().game_over);

    eng.state_mut().buildings.get_mut(&host_base).unwrap().hp = 0.0;
    eng.tick();

    let state = eng.state();
    assert!(state.game_over);
    assert_eq!(state.winner, Some(GUEST));
    let reason = state.end_reason.as_deref().unwrap();
    assert!(reason.contains("elimination"), "reason: {reason}");
    assert!(reason.contains("bob"), "reason: {reason}");
}

#[test]
fn simultaneous_elimination_is_a_draw() {
    let (mut eng, host_base, guest_base) = match_engine();
    eng.state_mut().buildings.get_mut(&host_base).unwrap().hp = 0.0;
    eng.state_mut().buildings.get_mut(&guest_base).unwrap().hp = 0.0;
    eng.tick();

    let state = eng.state();
    assert!(state.game_over);
    assert_eq!(state.winner, None);
    assert_eq!(state.end_reason.as_deref(), Some("draw"));
}

#[test]
fn surrender_forfeits_the_match() {
    let (mut eng, _, _) = match_engine();
    eng.submit(HOST, skirmish_server::game::types::Action::Surrender {});
    eng.tick();

    assert!(eng.state().game_over);
    assert_eq!(eng.state().winner, Some(GUEST));
}

#[test]
fn injected_forfeit_is_honored() {
    let (mut eng, _, _) = match_engine();
    eng.forfeit(GUEST);
    eng.tick();

    assert!(eng.state().game_over);
    assert_eq!(eng.state().winner, Some(HOST));
}

#[test]
fn game_over_is_latched_once() {
    let (mut eng, host_base, _) = match_engine();
    eng.state_mut().buildings.get_mut(&host_base).unwrap().hp = 0.0;
    eng.tick();
    assert!(eng.state().game_over);
    let decided_at = eng.state().tick;
    let winner = eng.state().winner;

    // Further ticks must not re-decide or advance the match.
    for _ in 0..10 {
        eng.tick();
    }
    assert_eq!(eng.state().tick, decided_at);
    assert_eq!(eng.state().winner, winner);
}

#[test]
fn a_lone_player_never_wins_by_default() {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(HOST, "alice", Team::Host, "blue");
    for _ in 0..10 {
        eng.tick();
    }
    assert!(!eng.state().game_over);
}
