//! Melee, ranged, tower and splash combat.

use assert_approx_eq::assert_approx_eq;
use skirmish_server::game::engine::GameEngine;
use skirmish_server::game::map::GameMap;
use skirmish_server::game::types::{
    Action, BuildingKind, Difficulty, ProjectileKind, Team, UnitKind, Vec2,
};
use uuid::Uuid;

const HOST: Uuid = Uuid::from_u128(1);
const GUEST: Uuid = Uuid::from_u128(2);

/// Two players with far-apart bases so elimination never triggers.
fn arena() -> GameEngine {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(HOST, "host", Team::Host, "blue");
    eng.add_player(GUEST, "guest", Team::Guest, "red");
    eng.spawn_building(HOST, BuildingKind::Base, Vec2::new(200.0, 200.0), true);
    eng.spawn_building(GUEST, BuildingKind::Base, Vec2::new(2200.0, 2200.0), true);
    eng
}

#[test]
fn melee_exchange_kills_the_defender_in_eight_hits() {
    let mut eng = arena();
    let attacker = eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(1000.0, 1000.0));
    let defender = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(1020.0, 1000.0));

    eng.submit(
        HOST,
        Action::Attack {
            unit_id: attacker.clone(),
            target_id: defender.clone(),
        },
    );

    // First hit lands on the first tick: max(1, 10 + 0 - 0) = 10 damage.
    eng.tick();
    assert_approx_eq!(eng.state().units[&defender].hp, 70.0, 0.01);
    assert!(eng.state().units[&defender].under_attack);

    // One swing per 60-tick cooldown; the eighth lands by tick 480.
    for _ in 0..480 {
        eng.tick();
    }
    assert!(
        !eng.state().units.contains_key(&defender),
        "defender should be dead after eight hits"
    );
    // The defender traded back while alive but cannot have landed eight.
    let surviving = &eng.state().units[&attacker];
    assert!(surviving.hp > 0.0);
}

#[test]
fn defense_upgrade_reduces_melee_damage() {
    let mut eng = arena();
    eng.state_mut().players.get_mut(&GUEST).unwrap().upgrades.defense = 2;
    let attacker = eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(1000.0, 1000.0));
    let defender = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(1020.0, 1000.0));

    eng.submit(
        HOST,
        Action::Attack {
            unit_id: attacker,
            target_id: defender.clone(),
        },
    );
    eng.tick();
    // max(1, 10 + 0 - 2*2) = 6
    assert_approx_eq!(eng.state().units[&defender].hp, 74.0, 0.01);
}

#[test]
fn archer_attack_spawns_a_projectile_that_lands() {
    let mut eng = arena();
    let archer = eng.spawn_unit(HOST, UnitKind::Archer, Vec2::new(1000.0, 1000.0));
    let target = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(1100.0, 1000.0));

    eng.submit(
        HOST,
        Action::Attack {
            unit_id: archer,
            target_id: target.clone(),
        },
    );
    eng.tick();
    assert_eq!(eng.state().projectiles.len(), 1);
    let arrow = eng.state().projectiles.values().next().unwrap();
    assert_eq!(arrow.kind, ProjectileKind::Arrow);
    assert_eq!(arrow.owner, HOST);

    // 100 px at 6 px/tick lands within 17 further ticks.
    for _ in 0..20 {
        eng.tick();
    }
    assert!(eng.state().units[&target].hp < 80.0);
}

#[test]
fn tower_auto_fires_at_the_nearest_hostile_unit() {
    let mut eng = arena();
    eng.spawn_building(HOST, BuildingKind::Tower, Vec2::new(500.0, 500.0), true);
    let near = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(600.0, 500.0));
    let far = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(640.0, 500.0));

    for _ in 0..30 {
        eng.tick();
    }
    let near_hp = eng.state().units[&near].hp;
    let far_hp = eng.state().units[&far].hp;
    assert!(near_hp < 80.0, "nearest hostile should be hit first");
    assert_approx_eq!(far_hp, 80.0, 0.01);
}

#[test]
fn out_of_range_hostiles_are_ignored_by_towers() {
    let mut eng = arena();
    eng.spawn_building(HOST, BuildingKind::Tower, Vec2::new(500.0, 500.0), true);
    // 200 px away, beyond the 150 px base range.
    let soldier = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(700.0, 500.0));

    for _ in 0..60 {
        eng.tick();
    }
    assert_approx_eq!(eng.state().units[&soldier].hp, 80.0, 0.01);
    assert!(eng.state().projectiles.is_empty());
}

#[test]
fn boulder_splash_falls_off_with_distance() {
    let mut eng = arena();
    let catapult = eng.spawn_unit(HOST, UnitKind::Catapult, Vec2::new(500.0, 500.0));
    let at_impact = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(650.0, 500.0));
    let nearby = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(680.0, 500.0));

    eng.submit(
        HOST,
        Action::AttackGround {
            unit_id: catapult,
            target: Vec2::new(650.0, 500.0),
        },
    );
    // Flight: 150 px at 4 px/tick ≈ 38 ticks.
    for _ in 0..45 {
        eng.tick();
    }

    // Full 30 at the impact point, 30 * (1 - 30/60/2) = 22.5 at 30 px out.
    assert_approx_eq!(eng.state().units[&at_impact].hp, 50.0, 0.01);
    assert_approx_eq!(eng.state().units[&nearby].hp, 57.5, 0.01);
}

#[test]
fn healer_projectile_restores_hit_points() {
    let mut eng = arena();
    let healer = eng.spawn_unit(HOST, UnitKind::Healer, Vec2::new(1000.0, 1000.0));
    let hurt = eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(1050.0, 1000.0));
    eng.state_mut().units.get_mut(&hurt).unwrap().hp = 40.0;

    eng.submit(
        HOST,
        Action::Heal {
            unit_id: healer,
            target_id: hurt.clone(),
        },
    );
    for _ in 0..20 {
        eng.tick();
    }
    let hp = eng.state().units[&hurt].hp;
    assert!(hp > 40.0 && hp <= 80.0, "heal should land: hp = {hp}");
}

#[test]
fn idle_healer_auto_heals_injured_allies() {
    let mut eng = arena();
    eng.spawn_unit(HOST, UnitKind::Healer, Vec2::new(1000.0, 1000.0));
    let hurt = eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(1050.0, 1000.0));
    eng.state_mut().units.get_mut(&hurt).unwrap().hp = 40.0;

    for _ in 0..30 {
        eng.tick();
    }
    assert!(eng.state().units[&hurt].hp > 40.0);
}

#[test]
fn attack_move_engages_hostiles_on_the_way() {
    let mut eng = arena();
    let soldier = eng.spawn_unit(HOST, UnitKind::Soldier, Vec2::new(900.0, 1000.0));
    let blocker = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(1000.0, 1000.0));

    eng.submit(
        HOST,
        Action::AttackMove {
            unit_id: soldier.clone(),
            target: Vec2::new(1200.0, 1000.0),
        },
    );

    // Walks until the blocker enters acquisition range, then fights it out;
    // afterwards it resumes toward the attack-move target.
    for _ in 0..1200 {
        eng.tick();
    }
    assert!(
        !eng.state().units.contains_key(&blocker),
        "hostile on the way should have been engaged and killed"
    );
    let unit = &eng.state().units[&soldier];
    assert!(
        unit.pos.distance(Vec2::new(1200.0, 1000.0)) <= 5.0,
        "attack-move resumes after the fight: at {:?}",
        unit.pos
    );
}

#[test]
fn projectiles_never_outlive_their_flight() {
    let mut eng = arena();
    let archer = eng.spawn_unit(HOST, UnitKind::Archer, Vec2::new(1000.0, 1000.0));
    let target = eng.spawn_unit(GUEST, UnitKind::Soldier, Vec2::new(1100.0, 1000.0));

    eng.submit(
        HOST,
        Action::Attack {
            unit_id: archer,
            target_id: target.clone(),
        },
    );
    eng.tick();
    assert_eq!(eng.state().projectiles.len(), 1);

    // Kill the target mid-flight; the arrow flies to the cached position
    // and despawns there.
    eng.state_mut().units.get_mut(&target).unwrap().hp = 0.0;
    for _ in 0..60 {
        eng.tick();
    }
    assert!(eng.state().projectiles.is_empty());
}
